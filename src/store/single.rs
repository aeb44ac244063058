//! Single-resource cache with request coalescing
//!
//! Guards one external read operation (market snapshot, coin list) behind a
//! TTL check and a single-flight slot: while a fetch is outstanding, every
//! concurrent caller attaches to the same shared future and receives its
//! result instead of issuing a second request.

use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use super::freshness::is_fresh;
use super::{CacheEntry, Clock, FetchError};

/// The one outstanding fetch for a resource, awaitable by any number of callers
type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, FetchError>>>;

/// Mutable cache state, shared between callers and the in-flight fetch task
struct CacheState<T> {
    entry: Option<CacheEntry<T>>,
    error: Option<String>,
    loading: bool,
    inflight: Option<SharedFetch<T>>,
    /// Sequence number handed to the most recently issued fetch
    next_seq: u64,
    /// Highest sequence number whose result has been applied
    applied_seq: u64,
}

/// TTL cache around one fetchable resource
///
/// The cache owns no fetcher; callers pass the fetch future into [`get`],
/// which keeps the type generic and lets tests inject counting fakes.
///
/// [`get`]: ResourceCache::get
pub struct ResourceCache<T> {
    ttl: Duration,
    deadline: Option<std::time::Duration>,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<CacheState<T>>>,
}

impl<T> ResourceCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates an empty cache with the given TTL and optional fetch deadline
    pub fn new(ttl: Duration, deadline: Option<std::time::Duration>, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            deadline,
            clock,
            state: Arc::new(Mutex::new(CacheState {
                entry: None,
                error: None,
                loading: false,
                inflight: None,
                next_seq: 0,
                applied_seq: 0,
            })),
        }
    }

    /// Seeds the cache with a previously persisted value
    ///
    /// The restored entry keeps its original fetch timestamp so the normal
    /// freshness policy decides whether it is still usable.
    pub fn prime(&self, value: T, fetched_at: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        state.entry = Some(CacheEntry { value, fetched_at });
    }

    /// Returns the cached value, fresh or stale, if one exists
    pub fn cached(&self) -> Option<T> {
        let state = self.state.lock().unwrap();
        state.entry.as_ref().map(|entry| entry.value.clone())
    }

    /// Returns when the cached value was fetched, if one exists
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        let state = self.state.lock().unwrap();
        state.entry.as_ref().map(|entry| entry.fetched_at)
    }

    /// Returns the last recorded fetch error, cleared on the next success
    pub fn error(&self) -> Option<String> {
        self.state.lock().unwrap().error.clone()
    }

    /// True while a fetch for this resource is outstanding
    pub fn is_loading(&self) -> bool {
        self.state.lock().unwrap().loading
    }

    /// Returns the cached value or fetches a new one
    ///
    /// With `force` false a fresh cached value is returned without any I/O.
    /// Otherwise the caller either attaches to the outstanding fetch or
    /// issues a new one. A failed fetch records the error and leaves any
    /// previously cached value untouched.
    pub async fn get<F>(&self, force: bool, fetch: F) -> Result<T, FetchError>
    where
        F: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let shared = {
            let mut state = self.state.lock().unwrap();

            if !force {
                if let Some(entry) = &state.entry {
                    if is_fresh(Some(entry.fetched_at), self.ttl, self.clock.now()) {
                        return Ok(entry.value.clone());
                    }
                }
            }

            match state.inflight.clone() {
                Some(inflight) => inflight,
                None => {
                    state.next_seq += 1;
                    state.loading = true;
                    let shared = self.spawn_fetch(state.next_seq, fetch);
                    state.inflight = Some(shared.clone());
                    shared
                }
            }
        };

        shared.await
    }

    /// Builds the shared in-flight future and spawns it to completion
    ///
    /// Spawning means the fetch finishes and its result is cached even if
    /// every interested caller goes away first.
    fn spawn_fetch<F>(&self, seq: u64, fetch: F) -> SharedFetch<T>
    where
        F: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let clock = Arc::clone(&self.clock);
        let deadline = self.deadline;

        let shared = async move {
            let result = run_with_deadline(deadline, fetch).await;

            let mut state = state.lock().unwrap();
            state.loading = false;
            state.inflight = None;
            match &result {
                Ok(value) => {
                    // Only the highest-numbered fetch may write its result
                    if seq > state.applied_seq {
                        state.applied_seq = seq;
                        state.entry = Some(CacheEntry {
                            value: value.clone(),
                            fetched_at: clock.now(),
                        });
                        state.error = None;
                    } else {
                        debug!(seq, "discarded out-of-order fetch completion");
                    }
                }
                Err(err) => {
                    warn!(error = %err, "fetch failed, keeping previous cache entry");
                    state.error = Some(err.to_string());
                }
            }
            result
        }
        .boxed()
        .shared();

        tokio::spawn(shared.clone().map(|_| ()));
        shared
    }
}

/// Runs a fetch under the optional deadline
pub(super) async fn run_with_deadline<T, F>(
    deadline: Option<std::time::Duration>,
    fetch: F,
) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    match deadline {
        Some(limit) => match tokio::time::timeout(limit, fetch).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(limit.as_secs())),
        },
        None => fetch.await,
    }
}
