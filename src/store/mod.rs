//! Cache and data-access layer
//!
//! Everything the presentation layer knows about market data goes through
//! this module: per-resource TTL caches with request coalescing, a keyed
//! multi-coin cache with per-id failure isolation, and a disk snapshot that
//! restores the coin list and multi-coin cache across sessions. The UI never
//! talks to the API client directly.

mod batch;
mod clock;
mod facade;
mod freshness;
mod persist;
mod single;

pub use batch::SeriesCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use facade::CryptoStore;
pub use freshness::is_fresh;
pub use persist::{PersistedSnapshot, SnapshotStore};
pub use single::ResourceCache;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::ApiError;

/// A cached value together with the time it was fetched
///
/// Entries are replaced wholesale on refetch, never mutated in place, and a
/// failed refetch leaves the previous entry untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The cached value
    pub value: T,
    /// When the value was fetched
    pub fetched_at: DateTime<Utc>,
}

/// Errors surfaced by the cache layer to its callers
///
/// Cloneable so that every caller attached to a coalesced in-flight fetch
/// receives the same outcome.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Network or remote failure, including bad responses
    #[error("request failed: {0}")]
    Transport(String),

    /// The requested coin id does not exist
    #[error("coin not found: {0}")]
    NotFound(String),

    /// The fetch exceeded the configured deadline
    #[error("request timed out after {0}s")]
    Timeout(u64),
}

impl From<ApiError> for FetchError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NotFound(id) => FetchError::NotFound(id),
            other => FetchError::Transport(other.to_string()),
        }
    }
}

/// Tunable knobs of the cache layer
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long a market snapshot stays fresh
    pub market_ttl: Duration,
    /// How long the coin list stays fresh
    pub coin_list_ttl: Duration,
    /// How long a per-coin series stays fresh
    pub series_ttl: Duration,
    /// Trailing window requested for historical series, in days
    pub days_window: u32,
    /// Maximum number of coins in one comparison
    pub max_compare: usize,
    /// Bound on retained multi-coin cache entries before LRU eviction
    pub series_capacity: usize,
    /// Optional upper bound on a single fetch; `None` disables the deadline
    pub fetch_deadline: Option<std::time::Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            market_ttl: Duration::minutes(5),
            coin_list_ttl: Duration::minutes(60),
            series_ttl: Duration::minutes(3),
            days_window: 7,
            max_compare: 5,
            series_capacity: 32,
            fetch_deadline: Some(std::time::Duration::from_secs(30)),
        }
    }
}
