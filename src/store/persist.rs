//! Disk snapshot of the durable cache projection
//!
//! Persists the coin list (with its fetch timestamp) and the multi-coin
//! series cache to a JSON file in an XDG-compliant cache directory, and
//! restores them at startup. The market snapshot and the detail-view series
//! cache are intentionally not persisted; their TTLs are too short for a
//! restore to be worth anything.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::CacheEntry;
use crate::data::{CoinListEntry, CoinSeries};

/// File name of the snapshot record inside the cache directory
const SNAPSHOT_FILE: &str = "snapshot.json";

/// The durable projection of the cache state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    /// The full coin list used for search resolution
    pub coin_list: Vec<CoinListEntry>,
    /// When the coin list was fetched, if ever
    pub coin_list_fetched_at: Option<DateTime<Utc>>,
    /// Retained multi-coin series entries keyed by coin id
    pub multi_coin_cache: HashMap<String, CacheEntry<CoinSeries>>,
}

/// Reads and writes the snapshot record
///
/// Storage failures are absorbed here: `save` silently no-ops when the
/// directory is unavailable or unwritable, and `load` turns absent or
/// corrupt data into the empty default. Neither ever interrupts normal
/// cache operation.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Creates a store using the XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g. no
    /// home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "coindeck")?;
        let dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { dir })
    }

    /// Creates a store with a custom directory
    ///
    /// Useful for testing or when a specific location is needed.
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    /// Writes the snapshot, swallowing any storage failure
    pub fn save(&self, snapshot: &PersistedSnapshot) {
        if let Err(err) = self.try_save(snapshot) {
            warn!(error = %err, "failed to persist cache snapshot");
        }
    }

    fn try_save(&self, snapshot: &PersistedSnapshot) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(self.snapshot_path(), json)
    }

    /// Reads the snapshot, yielding the empty default on any failure
    pub fn load(&self) -> PersistedSnapshot {
        let path = self.snapshot_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => return PersistedSnapshot::default(),
        };
        match serde_json::from_str(&content) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "ignoring corrupt cache snapshot");
                PersistedSnapshot::default()
            }
        }
    }
}
