//! Keyed cache for per-coin historical series
//!
//! Backs both the comparison view (fan-out over many ids) and the coin
//! detail view (one id). Each id has its own single-flight slot, so two
//! overlapping batches never fetch the same coin twice, and one id's failure
//! never aborts or delays the others.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use futures::future::{self, BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use super::freshness::is_fresh;
use super::single::run_with_deadline;
use super::{CacheEntry, Clock, FetchError};
use crate::data::CoinSeries;

type SharedFetch = Shared<BoxFuture<'static, Result<CoinSeries, FetchError>>>;

/// One retained series plus the recency stamp used for eviction
struct SeriesSlot {
    entry: CacheEntry<CoinSeries>,
    last_used: DateTime<Utc>,
}

struct SeriesState {
    entries: HashMap<String, SeriesSlot>,
    errors: HashMap<String, String>,
    inflight: HashMap<String, SharedFetch>,
    /// Highest applied sequence number per id
    applied: HashMap<String, u64>,
    next_seq: u64,
    /// Bumped whenever a fetched series is stored, for change detection
    generation: u64,
}

/// Bounded, keyed series cache with per-id request coalescing
pub struct SeriesCache {
    ttl: Duration,
    deadline: Option<std::time::Duration>,
    capacity: usize,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<SeriesState>>,
}

impl SeriesCache {
    /// Creates an empty cache bounded to `capacity` retained ids
    pub fn new(
        ttl: Duration,
        deadline: Option<std::time::Duration>,
        capacity: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ttl,
            deadline,
            capacity,
            clock,
            state: Arc::new(Mutex::new(SeriesState {
                entries: HashMap::new(),
                errors: HashMap::new(),
                inflight: HashMap::new(),
                applied: HashMap::new(),
                next_seq: 0,
                generation: 0,
            })),
        }
    }

    /// Fetches series for many ids, tolerating per-id failures
    ///
    /// Fresh entries are served from the cache; stale or missing ids fan out
    /// as one independent fetch each, and the call returns only after all of
    /// them have settled. Failed ids fall back to their previous entry when
    /// one exists and are otherwise absent from the result; the error detail
    /// is available via [`errors`]. The call itself never fails because an
    /// id failed.
    ///
    /// [`errors`]: SeriesCache::errors
    pub async fn get_many<F, Fut>(
        &self,
        ids: &[String],
        force: bool,
        make_fetch: F,
    ) -> HashMap<String, CoinSeries>
    where
        F: Fn(&str) -> Fut,
        Fut: Future<Output = Result<CoinSeries, FetchError>> + Send + 'static,
    {
        let mut results: HashMap<String, CoinSeries> = HashMap::new();
        let mut pending: Vec<(String, SharedFetch)> = Vec::new();

        {
            let mut state = self.state.lock().unwrap();
            let now = self.clock.now();

            for id in ids {
                if results.contains_key(id) || pending.iter().any(|(p, _)| p == id) {
                    continue;
                }

                if !force {
                    if let Some(slot) = state.entries.get_mut(id) {
                        if is_fresh(Some(slot.entry.fetched_at), self.ttl, now) {
                            slot.last_used = now;
                            results.insert(id.clone(), slot.entry.value.clone());
                            continue;
                        }
                    }
                }

                let shared = match state.inflight.get(id).cloned() {
                    Some(inflight) => inflight,
                    None => self.spawn_fetch(&mut state, id, make_fetch(id)),
                };
                pending.push((id.clone(), shared));
            }
        }

        let outcomes = future::join_all(pending.iter().map(|(_, fut)| fut.clone())).await;

        let mut state = self.state.lock().unwrap();
        let now = self.clock.now();
        for ((id, _), outcome) in pending.into_iter().zip(outcomes) {
            match outcome {
                Ok(series) => {
                    results.insert(id, series);
                }
                Err(_) => {
                    // Best-effort stale fallback; absent means "no data yet"
                    if let Some(slot) = state.entries.get_mut(&id) {
                        slot.last_used = now;
                        results.insert(id, slot.entry.value.clone());
                    }
                }
            }
        }

        results
    }

    /// Fetches the series for a single id, propagating its error
    ///
    /// Shares slot mechanics with [`get_many`], so a detail view and a
    /// running comparison batch coalesce on the same in-flight fetch.
    ///
    /// [`get_many`]: SeriesCache::get_many
    pub async fn get_one<Fut>(
        &self,
        id: &str,
        force: bool,
        fetch: Fut,
    ) -> Result<CoinSeries, FetchError>
    where
        Fut: Future<Output = Result<CoinSeries, FetchError>> + Send + 'static,
    {
        let shared = {
            let mut state = self.state.lock().unwrap();
            let now = self.clock.now();

            if !force {
                if let Some(slot) = state.entries.get_mut(id) {
                    if is_fresh(Some(slot.entry.fetched_at), self.ttl, now) {
                        slot.last_used = now;
                        return Ok(slot.entry.value.clone());
                    }
                }
            }

            match state.inflight.get(id).cloned() {
                Some(inflight) => inflight,
                None => self.spawn_fetch(&mut state, id, fetch),
            }
        };

        shared.await
    }

    /// Returns the cached series for an id, fresh or stale
    pub fn cached(&self, id: &str) -> Option<CoinSeries> {
        let mut state = self.state.lock().unwrap();
        let now = self.clock.now();
        state.entries.get_mut(id).map(|slot| {
            slot.last_used = now;
            slot.entry.value.clone()
        })
    }

    /// Last recorded error per id, cleared on that id's next success
    pub fn errors(&self) -> HashMap<String, String> {
        self.state.lock().unwrap().errors.clone()
    }

    /// Last recorded error for one id
    pub fn error_for(&self, id: &str) -> Option<String> {
        self.state.lock().unwrap().errors.get(id).cloned()
    }

    /// True while any fetch is outstanding
    pub fn is_loading(&self) -> bool {
        !self.state.lock().unwrap().inflight.is_empty()
    }

    /// Number of retained entries
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    /// True when no entries are retained
    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Monotonic counter bumped on every stored fetch result
    pub fn generation(&self) -> u64 {
        self.state.lock().unwrap().generation
    }

    /// The retained entries as a persistable map
    pub fn entries_snapshot(&self) -> HashMap<String, CacheEntry<CoinSeries>> {
        let state = self.state.lock().unwrap();
        state
            .entries
            .iter()
            .map(|(id, slot)| (id.clone(), slot.entry.clone()))
            .collect()
    }

    /// Seeds the cache from a previously persisted map
    ///
    /// Restored entries keep their fetch timestamps; recency starts at the
    /// fetch time so long-unused restores are first in line for eviction.
    pub fn prime(&self, entries: HashMap<String, CacheEntry<CoinSeries>>) {
        let mut state = self.state.lock().unwrap();
        for (id, entry) in entries {
            let last_used = entry.fetched_at;
            state.entries.insert(id, SeriesSlot { entry, last_used });
        }
        self.evict_over_capacity(&mut state);
    }

    /// Builds and spawns the shared fetch for one id
    fn spawn_fetch<Fut>(&self, state: &mut SeriesState, id: &str, fetch: Fut) -> SharedFetch
    where
        Fut: Future<Output = Result<CoinSeries, FetchError>> + Send + 'static,
    {
        state.next_seq += 1;
        let seq = state.next_seq;

        let id = id.to_string();
        let shared_state = Arc::clone(&self.state);
        let clock = Arc::clone(&self.clock);
        let deadline = self.deadline;
        let capacity = self.capacity;

        let shared = {
            let id = id.clone();
            async move {
                let result = run_with_deadline(deadline, fetch).await;

                let mut state = shared_state.lock().unwrap();
                state.inflight.remove(&id);
                match &result {
                    Ok(series) => {
                        let applied = state.applied.get(&id).copied().unwrap_or(0);
                        if seq > applied {
                            state.applied.insert(id.clone(), seq);
                            let now = clock.now();
                            state.entries.insert(
                                id.clone(),
                                SeriesSlot {
                                    entry: CacheEntry {
                                        value: series.clone(),
                                        fetched_at: now,
                                    },
                                    last_used: now,
                                },
                            );
                            state.errors.remove(&id);
                            state.generation += 1;
                            evict_lru(&mut state, capacity);
                        } else {
                            debug!(%id, seq, "discarded out-of-order series completion");
                        }
                    }
                    Err(err) => {
                        warn!(%id, error = %err, "series fetch failed");
                        state.errors.insert(id.clone(), err.to_string());
                    }
                }
                result
            }
            .boxed()
            .shared()
        };

        state.inflight.insert(id, shared.clone());
        tokio::spawn(shared.clone().map(|_| ()));
        shared
    }

    fn evict_over_capacity(&self, state: &mut SeriesState) {
        evict_lru(state, self.capacity);
    }
}

/// Drops least-recently-used entries until the bound is respected
fn evict_lru(state: &mut SeriesState, capacity: usize) {
    while state.entries.len() > capacity {
        let oldest = state
            .entries
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(id, _)| id.clone());
        match oldest {
            Some(id) => {
                debug!(%id, "evicting least-recently-used series entry");
                state.entries.remove(&id);
            }
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SeriesPoint;
    use crate::store::ManualClock;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap(),
        ))
    }

    fn cache_with(clock: Arc<ManualClock>, capacity: usize) -> SeriesCache {
        SeriesCache::new(Duration::minutes(3), None, capacity, clock)
    }

    fn series(id: &str, price: f64) -> CoinSeries {
        CoinSeries {
            id: id.to_string(),
            prices: vec![SeriesPoint {
                time: Utc.with_ymd_and_hms(2026, 8, 1, 11, 0, 0).unwrap(),
                value: price,
            }],
            market_caps: Vec::new(),
            total_volumes: Vec::new(),
        }
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    /// Per-id fetcher that counts calls and fails ids listed in `failing`
    fn fetcher(
        counter: Arc<AtomicUsize>,
        failing: &'static [&'static str],
    ) -> impl Fn(&str) -> BoxFuture<'static, Result<CoinSeries, FetchError>> {
        move |id: &str| {
            let id = id.to_string();
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                if failing.contains(&id.as_str()) {
                    Err(FetchError::Transport(format!("fetch failed for {}", id)))
                } else {
                    Ok(series(&id, 100.0))
                }
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_get_many_fetches_all_missing_ids() {
        let cache = cache_with(test_clock(), 32);
        let counter = Arc::new(AtomicUsize::new(0));

        let result = cache
            .get_many(&ids(&["bitcoin", "ethereum"]), false, fetcher(Arc::clone(&counter), &[]))
            .await;

        assert_eq!(result.len(), 2);
        assert!(result.contains_key("bitcoin"));
        assert!(result.contains_key("ethereum"));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_get_many_skips_fresh_ids() {
        let clock = test_clock();
        let cache = cache_with(Arc::clone(&clock), 32);
        let counter = Arc::new(AtomicUsize::new(0));

        cache
            .get_many(&ids(&["bitcoin"]), false, fetcher(Arc::clone(&counter), &[]))
            .await;
        clock.advance(Duration::minutes(1));

        let result = cache
            .get_many(
                &ids(&["bitcoin", "ethereum"]),
                false,
                fetcher(Arc::clone(&counter), &[]),
            )
            .await;

        assert_eq!(result.len(), 2);
        assert_eq!(
            counter.load(Ordering::SeqCst),
            2,
            "Only the missing id should be fetched"
        );
    }

    #[tokio::test]
    async fn test_partial_failure_is_isolated() {
        let cache = cache_with(test_clock(), 32);
        let counter = Arc::new(AtomicUsize::new(0));

        let result = cache
            .get_many(
                &ids(&["btc", "eth", "sol"]),
                false,
                fetcher(Arc::clone(&counter), &["eth"]),
            )
            .await;

        assert_eq!(result.len(), 2, "Failed id is absent, others succeed");
        assert!(result.contains_key("btc"));
        assert!(result.contains_key("sol"));
        assert!(!result.contains_key("eth"));

        let errors = cache.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors.get("eth").expect("eth error recorded").contains("eth"));
    }

    #[tokio::test]
    async fn test_failed_id_falls_back_to_stale_entry() {
        let clock = test_clock();
        let cache = cache_with(Arc::clone(&clock), 32);
        let counter = Arc::new(AtomicUsize::new(0));

        cache
            .get_many(&ids(&["eth"]), false, fetcher(Arc::clone(&counter), &[]))
            .await;

        // Entry goes stale, then the refetch fails
        clock.advance(Duration::minutes(5));
        let result = cache
            .get_many(&ids(&["eth"]), false, fetcher(Arc::clone(&counter), &["eth"]))
            .await;

        assert!(
            result.contains_key("eth"),
            "Stale entry is returned as best-effort fallback"
        );
        assert!(cache.error_for("eth").is_some());
    }

    #[tokio::test]
    async fn test_error_cleared_on_next_success() {
        let clock = test_clock();
        let cache = cache_with(Arc::clone(&clock), 32);
        let counter = Arc::new(AtomicUsize::new(0));

        cache
            .get_many(&ids(&["eth"]), false, fetcher(Arc::clone(&counter), &["eth"]))
            .await;
        assert!(cache.error_for("eth").is_some());

        cache
            .get_many(&ids(&["eth"]), false, fetcher(Arc::clone(&counter), &[]))
            .await;
        assert!(cache.error_for("eth").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_ids_fetch_once() {
        let cache = cache_with(test_clock(), 32);
        let counter = Arc::new(AtomicUsize::new(0));

        let result = cache
            .get_many(
                &ids(&["btc", "btc", "btc"]),
                false,
                fetcher(Arc::clone(&counter), &[]),
            )
            .await;

        assert_eq!(result.len(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_overlapping_batches_coalesce_per_id() {
        let cache = Arc::new(cache_with(test_clock(), 32));
        let counter = Arc::new(AtomicUsize::new(0));

        let first_ids = ids(&["btc", "eth"]);
        let second_ids = ids(&["eth", "sol"]);
        let (first, second) = tokio::join!(
            cache.get_many(&first_ids, false, fetcher(Arc::clone(&counter), &[])),
            cache.get_many(&second_ids, false, fetcher(Arc::clone(&counter), &[])),
        );

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(
            counter.load(Ordering::SeqCst),
            3,
            "The overlapping id must be fetched only once"
        );
    }

    #[tokio::test]
    async fn test_get_one_propagates_error() {
        let cache = cache_with(test_clock(), 32);
        let counter = Arc::new(AtomicUsize::new(0));

        let result = cache
            .get_one("eth", false, fetcher(Arc::clone(&counter), &["eth"])("eth"))
            .await;

        assert!(result.is_err());
        assert!(cache.error_for("eth").is_some());
    }

    #[tokio::test]
    async fn test_get_one_serves_fresh_entry_without_fetch() {
        let cache = cache_with(test_clock(), 32);
        let counter = Arc::new(AtomicUsize::new(0));

        cache
            .get_one("btc", false, fetcher(Arc::clone(&counter), &[])("btc"))
            .await
            .expect("First fetch should succeed");

        let make = fetcher(Arc::clone(&counter), &[]);
        cache
            .get_one("btc", false, make("btc"))
            .await
            .expect("Cached get should succeed");

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lru_eviction_respects_capacity() {
        let clock = test_clock();
        let cache = cache_with(Arc::clone(&clock), 2);
        let counter = Arc::new(AtomicUsize::new(0));

        cache
            .get_many(&ids(&["a"]), false, fetcher(Arc::clone(&counter), &[]))
            .await;
        clock.advance(Duration::seconds(10));
        cache
            .get_many(&ids(&["b"]), false, fetcher(Arc::clone(&counter), &[]))
            .await;
        clock.advance(Duration::seconds(10));

        // Touch "a" so "b" becomes the eviction candidate
        assert!(cache.cached("a").is_some());
        clock.advance(Duration::seconds(10));

        cache
            .get_many(&ids(&["c"]), false, fetcher(Arc::clone(&counter), &[]))
            .await;

        assert_eq!(cache.len(), 2);
        assert!(cache.cached("a").is_some(), "Recently used entry survives");
        assert!(cache.cached("b").is_none(), "LRU entry is evicted");
        assert!(cache.cached("c").is_some());
    }

    #[tokio::test]
    async fn test_prime_restores_entries_and_ttl_applies() {
        let clock = test_clock();
        let cache = cache_with(Arc::clone(&clock), 32);
        let counter = Arc::new(AtomicUsize::new(0));

        let mut entries = HashMap::new();
        entries.insert(
            "btc".to_string(),
            CacheEntry {
                value: series("btc", 50.0),
                fetched_at: clock.now() - Duration::minutes(1),
            },
        );
        cache.prime(entries);

        let result = cache
            .get_many(&ids(&["btc"]), false, fetcher(Arc::clone(&counter), &[]))
            .await;

        assert_eq!(result.len(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 0, "Restored entry is fresh");
    }

    #[tokio::test]
    async fn test_generation_bumps_on_stored_fetch_only() {
        let cache = cache_with(test_clock(), 32);
        let counter = Arc::new(AtomicUsize::new(0));

        assert_eq!(cache.generation(), 0);
        cache
            .get_many(&ids(&["btc"]), false, fetcher(Arc::clone(&counter), &[]))
            .await;
        assert_eq!(cache.generation(), 1);

        // Fresh hit does not store anything
        cache
            .get_many(&ids(&["btc"]), false, fetcher(Arc::clone(&counter), &[]))
            .await;
        assert_eq!(cache.generation(), 1);

        // Failed fetch does not store anything either
        cache
            .get_many(&ids(&["eth"]), false, fetcher(Arc::clone(&counter), &["eth"]))
            .await;
        assert_eq!(cache.generation(), 1);
    }

    #[tokio::test]
    async fn test_entries_snapshot_round_trips_through_prime() {
        let cache = cache_with(test_clock(), 32);
        let counter = Arc::new(AtomicUsize::new(0));

        cache
            .get_many(&ids(&["btc", "eth"]), false, fetcher(Arc::clone(&counter), &[]))
            .await;

        let snapshot = cache.entries_snapshot();
        assert_eq!(snapshot.len(), 2);

        let restored = cache_with(test_clock(), 32);
        restored.prime(snapshot.clone());
        assert_eq!(restored.entries_snapshot(), snapshot);
    }
}
