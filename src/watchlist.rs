//! Persisted watchlist of coin ids
//!
//! A deliberately simple unordered id-set store, independent of the cache
//! engine: its own JSON record under the XDG data directory, storage
//! failures swallowed, corrupt data treated as an empty list.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use tracing::warn;

/// File name of the watchlist record inside the data directory
const WATCHLIST_FILE: &str = "watchlist.json";

/// Stores the set of watched coin ids on disk
#[derive(Debug, Clone)]
pub struct Watchlist {
    dir: Option<PathBuf>,
    ids: HashSet<String>,
}

impl Watchlist {
    /// Loads the watchlist from the XDG data directory
    ///
    /// When the directory cannot be determined the watchlist still works for
    /// the session; it just never persists.
    pub fn load() -> Self {
        let dir = ProjectDirs::from("", "", "coindeck")
            .map(|dirs| dirs.data_dir().to_path_buf());
        Self::load_from(dir)
    }

    /// Loads the watchlist from a custom directory (for testing)
    pub fn load_from(dir: Option<PathBuf>) -> Self {
        let ids = dir
            .as_ref()
            .and_then(|dir| fs::read_to_string(dir.join(WATCHLIST_FILE)).ok())
            .and_then(|content| serde_json::from_str::<Vec<String>>(&content).ok())
            .map(|list| list.into_iter().collect())
            .unwrap_or_default();
        Self { dir, ids }
    }

    /// True when the id is on the watchlist
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Number of watched ids
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when nothing is watched
    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The watched ids in unspecified order
    #[allow(dead_code)]
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Adds an id; a duplicate add is a no-op
    pub fn add(&mut self, id: &str) {
        if self.ids.insert(id.to_string()) {
            self.save();
        }
    }

    /// Removes an id; removing an absent id is a no-op
    pub fn remove(&mut self, id: &str) {
        if self.ids.remove(id) {
            self.save();
        }
    }

    /// Adds the id if absent, removes it if present; returns the new state
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            self.remove(id);
            false
        } else {
            self.add(id);
            true
        }
    }

    fn save(&self) {
        let Some(ref dir) = self.dir else {
            return;
        };
        if let Err(err) = self.try_save(dir) {
            warn!(error = %err, "failed to persist watchlist");
        }
    }

    fn try_save(&self, dir: &PathBuf) -> std::io::Result<()> {
        fs::create_dir_all(dir)?;
        let mut list: Vec<&str> = self.ids.iter().map(String::as_str).collect();
        list.sort_unstable();
        let json = serde_json::to_string_pretty(&list)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(dir.join(WATCHLIST_FILE), json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_watchlist() -> (Watchlist, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let watchlist = Watchlist::load_from(Some(temp_dir.path().to_path_buf()));
        (watchlist, temp_dir)
    }

    #[test]
    fn test_empty_on_first_load() {
        let (watchlist, _temp_dir) = create_test_watchlist();
        assert!(watchlist.is_empty());
        assert!(!watchlist.contains("bitcoin"));
    }

    #[test]
    fn test_add_remove_contains() {
        let (mut watchlist, _temp_dir) = create_test_watchlist();

        watchlist.add("bitcoin");
        watchlist.add("ethereum");
        assert!(watchlist.contains("bitcoin"));
        assert!(watchlist.contains("ethereum"));
        assert_eq!(watchlist.len(), 2);

        watchlist.remove("bitcoin");
        assert!(!watchlist.contains("bitcoin"));
        assert_eq!(watchlist.len(), 1);
    }

    #[test]
    fn test_duplicate_add_is_noop() {
        let (mut watchlist, _temp_dir) = create_test_watchlist();
        watchlist.add("bitcoin");
        watchlist.add("bitcoin");
        assert_eq!(watchlist.len(), 1);
    }

    #[test]
    fn test_toggle_flips_membership() {
        let (mut watchlist, _temp_dir) = create_test_watchlist();

        assert!(watchlist.toggle("bitcoin"));
        assert!(watchlist.contains("bitcoin"));

        assert!(!watchlist.toggle("bitcoin"));
        assert!(!watchlist.contains("bitcoin"));
    }

    #[test]
    fn test_persists_across_loads() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = Some(temp_dir.path().to_path_buf());

        {
            let mut watchlist = Watchlist::load_from(dir.clone());
            watchlist.add("bitcoin");
            watchlist.add("solana");
        }

        let watchlist = Watchlist::load_from(dir);
        assert_eq!(watchlist.len(), 2);
        assert!(watchlist.contains("bitcoin"));
        assert!(watchlist.contains("solana"));
    }

    #[test]
    fn test_corrupt_file_yields_empty_set() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join(WATCHLIST_FILE), "{ not a list ]")
            .expect("Should write corrupt file");

        let watchlist = Watchlist::load_from(Some(temp_dir.path().to_path_buf()));
        assert!(watchlist.is_empty());
    }

    #[test]
    fn test_without_directory_works_in_memory() {
        let mut watchlist = Watchlist::load_from(None);
        watchlist.add("bitcoin");
        assert!(watchlist.contains("bitcoin"));
    }
}
