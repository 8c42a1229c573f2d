use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::model::{Category, CategoryItem};

pub const STALENESS_WINDOW_HOURS: i64 = 7 * 24;

const SNAPSHOT_FILE: &str = "categories.json";
const TIMESTAMP_FILE: &str = "last_scan.txt";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to write cache: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The persisted slice of a category. Path, name, and color always come
/// from the current catalog, so only scan results are stored.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotCategory {
    id: String,
    size: u64,
    items: Vec<CategoryItem>,
}

/// Persists the last completed scan so the next launch can show numbers
/// immediately. Snapshot and timestamp are separate artifacts; losing
/// either one degrades to a cache miss, never an error.
pub struct ResultCache {
    dir: PathBuf,
}

impl ResultCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("tidyscan")
    }

    pub fn save(&self, categories: &[Category], now: DateTime<Utc>) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)?;

        let snapshot: Vec<SnapshotCategory> = categories
            .iter()
            .map(|c| SnapshotCategory {
                id: c.id.clone(),
                size: c.size,
                items: c.items.clone(),
            })
            .collect();

        fs::write(self.dir.join(SNAPSHOT_FILE), serde_json::to_string(&snapshot)?)?;
        fs::write(self.dir.join(TIMESTAMP_FILE), now.to_rfc3339())?;
        Ok(())
    }

    /// Merges the stored snapshot onto a freshly built catalog by id.
    /// Categories absent from the snapshot keep their zero state; a
    /// missing or corrupt snapshot returns the catalog untouched.
    pub fn load(&self, mut fresh: Vec<Category>) -> (Vec<Category>, Option<DateTime<Utc>>) {
        let snapshot = match self.read_snapshot() {
            Some(snapshot) => snapshot,
            None => return (fresh, None),
        };

        for saved in snapshot {
            if let Some(cat) = fresh.iter_mut().find(|c| c.id == saved.id) {
                cat.size = saved.size;
                cat.items = saved.items;
            }
        }

        (fresh, self.read_timestamp())
    }

    fn read_snapshot(&self) -> Option<Vec<SnapshotCategory>> {
        let raw = fs::read_to_string(self.dir.join(SNAPSHOT_FILE)).ok()?;
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                debug!("discarding corrupt snapshot: {err}");
                None
            }
        }
    }

    fn read_timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = fs::read_to_string(self.dir.join(TIMESTAMP_FILE)).ok()?;
        DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }
}

/// A cache is worth showing only if it is recent and actually measured
/// something. All-zero snapshots are invalid at any age.
pub fn is_valid(
    categories: &[Category],
    timestamp: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    let Some(ts) = timestamp else {
        return false;
    };

    if !categories.iter().any(|c| c.size > 0) {
        return false;
    }

    now.signed_duration_since(ts) < Duration::hours(STALENESS_WINDOW_HOURS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use std::path::Path;

    fn fresh_categories() -> Vec<Category> {
        catalog::build_categories(Path::new("/Users/test"))
    }

    fn populated_categories() -> Vec<Category> {
        let mut categories = fresh_categories();
        categories[0].size = 4096;
        categories[0].items = vec![CategoryItem::new(
            PathBuf::from("/Users/test/Library/Caches/blob"),
            4096,
            true,
            catalog::color_for("system_junk"),
        )];
        categories
    }

    #[test]
    fn test_round_trip_preserves_sizes_and_items() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path().to_path_buf());
        let now = Utc::now();

        cache.save(&populated_categories(), now).unwrap();
        let (loaded, timestamp) = cache.load(fresh_categories());

        assert_eq!(loaded[0].size, 4096);
        assert_eq!(loaded[0].items.len(), 1);
        assert_eq!(loaded[0].items[0].name, "blob");
        assert_eq!(timestamp.unwrap().timestamp(), now.timestamp());
    }

    #[test]
    fn test_missing_cache_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path().join("never-written"));

        let (loaded, timestamp) = cache.load(fresh_categories());
        assert!(loaded.iter().all(|c| c.size == 0 && c.items.is_empty()));
        assert!(timestamp.is_none());
    }

    #[test]
    fn test_corrupt_snapshot_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path().to_path_buf());
        std::fs::create_dir_all(dir.path()).unwrap();
        std::fs::write(cache.snapshot_path(), "{not json").unwrap();

        let (loaded, timestamp) = cache.load(fresh_categories());
        assert!(loaded.iter().all(|c| c.size == 0));
        assert!(timestamp.is_none());
    }

    #[test]
    fn test_unknown_snapshot_ids_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::new(dir.path().to_path_buf());

        let mut retired = fresh_categories();
        retired[0].id = "retired_category".to_string();
        retired[0].size = 999;
        cache.save(&retired, Utc::now()).unwrap();

        let (loaded, _) = cache.load(fresh_categories());
        assert!(loaded.iter().all(|c| c.id != "retired_category"));
        assert_eq!(loaded.iter().map(|c| c.size).sum::<u64>(), 0);
    }

    #[test]
    fn test_recent_nonzero_cache_is_valid() {
        let categories = populated_categories();
        let scanned = Utc::now() - Duration::hours(1);
        assert!(is_valid(&categories, Some(scanned), Utc::now()));
    }

    #[test]
    fn test_stale_cache_is_invalid() {
        let categories = populated_categories();
        let scanned = Utc::now() - Duration::hours(STALENESS_WINDOW_HOURS + 1);
        assert!(!is_valid(&categories, Some(scanned), Utc::now()));
    }

    #[test]
    fn test_all_zero_cache_is_invalid_at_any_age() {
        let categories = fresh_categories();
        let scanned = Utc::now() - Duration::minutes(1);
        assert!(!is_valid(&categories, Some(scanned), Utc::now()));
    }

    #[test]
    fn test_missing_timestamp_is_invalid() {
        assert!(!is_valid(&populated_categories(), None, Utc::now()));
    }
}
