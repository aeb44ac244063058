//! Freshness policy for cached resources
//!
//! A cached value is usable while its age is strictly below the resource's
//! TTL. The boundary is exclusive: a value whose age equals the TTL is stale
//! and triggers a refetch. No jitter, no sliding expiration.

use chrono::{DateTime, Duration, Utc};

/// Returns true iff a value fetched at `fetched_at` is still fresh at `now`
///
/// `None` means the resource has never been fetched and is always stale.
pub fn is_fresh(fetched_at: Option<DateTime<Utc>>, ttl: Duration, now: DateTime<Utc>) -> bool {
    match fetched_at {
        Some(fetched_at) => now - fetched_at < ttl,
        None => false,
    }
}
