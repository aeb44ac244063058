//! The store facade the presentation layer talks to
//!
//! One `CryptoStore` is constructed per session with its dependencies
//! injected (data source, clock, snapshot store, config) and passed by
//! reference to the UI. It composes the per-resource caches, the multi-coin
//! batch cache, and the persistence adapter; presentation code never bypasses
//! it to reach the API client or mutate cache state.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{
    CacheEntry, Clock, FetchError, PersistedSnapshot, ResourceCache, SeriesCache, SnapshotStore,
    StoreConfig, SystemClock,
};
use crate::data::{CoinListEntry, CoinSeries, MarketDataSource, MarketEntry};

/// Cached, deduplicated, error-annotated access to market data
pub struct CryptoStore {
    api: Arc<dyn MarketDataSource>,
    config: StoreConfig,
    persist: Option<SnapshotStore>,
    market: ResourceCache<Vec<MarketEntry>>,
    coins: ResourceCache<Vec<CoinListEntry>>,
    /// Series cache behind the coin detail view; not persisted
    detail: SeriesCache,
    /// Series cache behind the comparison view; persisted across sessions
    multi: SeriesCache,
    refreshing: AtomicBool,
}

impl CryptoStore {
    /// Creates a store with the real clock, disk snapshot, and default config
    #[allow(dead_code)]
    pub fn new(api: Arc<dyn MarketDataSource>) -> Self {
        Self::with_parts(
            api,
            Arc::new(SystemClock),
            SnapshotStore::new(),
            StoreConfig::default(),
        )
    }

    /// Creates a store from explicit parts
    ///
    /// This is the seam tests use to inject a pinned clock, a fake data
    /// source, or a temp-dir snapshot store.
    pub fn with_parts(
        api: Arc<dyn MarketDataSource>,
        clock: Arc<dyn Clock>,
        persist: Option<SnapshotStore>,
        config: StoreConfig,
    ) -> Self {
        let market = ResourceCache::new(
            config.market_ttl,
            config.fetch_deadline,
            Arc::clone(&clock),
        );
        let coins = ResourceCache::new(
            config.coin_list_ttl,
            config.fetch_deadline,
            Arc::clone(&clock),
        );
        let detail = SeriesCache::new(
            config.series_ttl,
            config.fetch_deadline,
            config.series_capacity,
            Arc::clone(&clock),
        );
        let multi = SeriesCache::new(
            config.series_ttl,
            config.fetch_deadline,
            config.series_capacity,
            clock,
        );

        let store = Self {
            api,
            config,
            persist,
            market,
            coins,
            detail,
            multi,
            refreshing: AtomicBool::new(false),
        };
        store.restore();
        store
    }

    /// Primes the caches from the persisted snapshot, if one exists
    fn restore(&self) {
        let Some(ref persist) = self.persist else {
            return;
        };
        let snapshot = persist.load();
        if let Some(fetched_at) = snapshot.coin_list_fetched_at {
            if !snapshot.coin_list.is_empty() {
                debug!(
                    entries = snapshot.coin_list.len(),
                    "restored coin list from snapshot"
                );
                self.coins.prime(snapshot.coin_list, fetched_at);
            }
        }
        if !snapshot.multi_coin_cache.is_empty() {
            debug!(
                entries = snapshot.multi_coin_cache.len(),
                "restored multi-coin cache from snapshot"
            );
            self.multi.prime(snapshot.multi_coin_cache);
        }
    }

    /// Writes the durable projection of the current cache state
    fn save_snapshot(&self) {
        let Some(ref persist) = self.persist else {
            return;
        };
        let snapshot = PersistedSnapshot {
            coin_list: self.coins.cached().unwrap_or_default(),
            coin_list_fetched_at: self.coins.fetched_at(),
            multi_coin_cache: self.multi.entries_snapshot(),
        };
        persist.save(&snapshot);
    }

    /// Returns the market overview rows, fetching when stale or forced
    pub async fn market_data(&self, force: bool) -> Result<Vec<MarketEntry>, FetchError> {
        let api = Arc::clone(&self.api);
        self.market
            .get(force, async move {
                api.market_snapshot().await.map_err(FetchError::from)
            })
            .await
    }

    /// Returns the coin list, fetching when stale or forced
    pub async fn coin_list(&self, force: bool) -> Result<Vec<CoinListEntry>, FetchError> {
        let before = self.coins.fetched_at();
        let api = Arc::clone(&self.api);
        let result = self
            .coins
            .get(force, async move {
                api.coin_list().await.map_err(FetchError::from)
            })
            .await;
        if result.is_ok() && self.coins.fetched_at() != before {
            self.save_snapshot();
        }
        result
    }

    /// Returns the historical series for one coin (detail view)
    pub async fn coin_series(&self, id: &str, force: bool) -> Result<CoinSeries, FetchError> {
        let api = Arc::clone(&self.api);
        let owned_id = id.to_string();
        let days = self.config.days_window;
        self.detail
            .get_one(id, force, async move {
                api.coin_series(&owned_id, days).await.map_err(FetchError::from)
            })
            .await
    }

    /// Returns series for a comparison set, tolerating per-id failures
    ///
    /// The set is deduplicated and truncated to the configured comparison
    /// bound. Failed ids are absent from the map (or served stale when a
    /// previous entry exists); details are in [`compare_errors`].
    ///
    /// [`compare_errors`]: CryptoStore::compare_errors
    pub async fn multi_coin_series(
        &self,
        ids: &[String],
        force: bool,
    ) -> HashMap<String, CoinSeries> {
        let mut seen = HashSet::new();
        let ids: Vec<String> = ids
            .iter()
            .filter(|id| seen.insert((*id).clone()))
            .take(self.config.max_compare)
            .cloned()
            .collect();

        let days = self.config.days_window;
        let before = self.multi.generation();
        let result = self
            .multi
            .get_many(&ids, force, |id| {
                let api = Arc::clone(&self.api);
                let id = id.to_string();
                async move { api.coin_series(&id, days).await.map_err(FetchError::from) }
            })
            .await;
        if self.multi.generation() != before {
            self.save_snapshot();
        }
        result
    }

    /// Resolves a search query to a coin id
    ///
    /// Trimmed, case-insensitive exact match against the cached coin list's
    /// names and symbols; no fuzzy matching. Returns `None` on a miss or
    /// when the coin list has not been loaded yet.
    pub fn find_coin_id(&self, query: &str) -> Option<String> {
        let list = self.coins.cached()?;
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }
        list.iter()
            .find(|coin| {
                coin.name.to_lowercase() == query || coin.symbol.to_lowercase() == query
            })
            .map(|coin| coin.id.clone())
    }

    /// Force-refreshes the market snapshot and coin list concurrently
    ///
    /// Runs under the `is_refreshing` flag so the UI can show a background
    /// refresh affordance instead of a loading skeleton. Per-coin caches are
    /// not touched. Failures stay in the per-resource error fields.
    pub async fn refresh_all(&self) {
        self.refreshing.store(true, Ordering::SeqCst);
        let (market, coins) = tokio::join!(self.market_data(true), self.coin_list(true));
        if market.is_err() || coins.is_err() {
            debug!("refresh finished with errors");
        }
        self.refreshing.store(false, Ordering::SeqCst);
    }

    /// True while `refresh_all` is running
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    /// Cached market rows, fresh or stale
    pub fn market_cached(&self) -> Option<Vec<MarketEntry>> {
        self.market.cached()
    }

    /// When the market rows were fetched
    pub fn market_fetched_at(&self) -> Option<DateTime<Utc>> {
        self.market.fetched_at()
    }

    /// Last market fetch error, cleared on the next success
    pub fn market_error(&self) -> Option<String> {
        self.market.error()
    }

    /// Cached coin list, fresh or stale
    pub fn coin_list_cached(&self) -> Option<Vec<CoinListEntry>> {
        self.coins.cached()
    }

    /// Last coin list fetch error, cleared on the next success
    pub fn coin_list_error(&self) -> Option<String> {
        self.coins.error()
    }

    /// Cached detail series for one id, fresh or stale
    pub fn series_cached(&self, id: &str) -> Option<CoinSeries> {
        self.detail.cached(id)
    }

    /// Last detail fetch error for one id
    #[allow(dead_code)]
    pub fn series_error(&self, id: &str) -> Option<String> {
        self.detail.error_for(id)
    }

    /// Per-id errors from the comparison cache
    pub fn compare_errors(&self) -> HashMap<String, String> {
        self.multi.errors()
    }

    /// True while any fetch is outstanding anywhere in the store
    pub fn is_loading(&self) -> bool {
        self.market.is_loading()
            || self.coins.is_loading()
            || self.detail.is_loading()
            || self.multi.is_loading()
    }

    /// The multi-coin entries as persisted, exposed for tests
    #[allow(dead_code)]
    pub fn multi_entries_snapshot(&self) -> HashMap<String, CacheEntry<CoinSeries>> {
        self.multi.entries_snapshot()
    }
}
