//! Snapshot persistence for the working set.
//!
//! One JSON file in the data directory holds the last successful pipeline
//! result together with the derived filter state. Writes go to a sibling
//! temporary file that is renamed over the snapshot, so a reader never sees a
//! half-written file.

use crate::error::{ObservatoryError, Result};
use crate::filter::DateBounds;
use crate::paper::{Paper, Source};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Snapshot file name inside the data directory
pub const SNAPSHOT_FILE: &str = "foodSafetyAI-Observatory.json";

/// Snapshots older than this are refreshed in the background.
pub const FRESHNESS_HOURS: i64 = 12;

/// Persisted working set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub papers: Vec<Paper>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub date_range: DateBounds,
    #[serde(default)]
    pub selected_categories: Vec<String>,
    #[serde(default = "all_sources")]
    pub selected_sources: Vec<Source>,
}

fn all_sources() -> Vec<Source> {
    Source::ALL.to_vec()
}

impl Snapshot {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.timestamp
    }

    /// True when the snapshot is strictly older than `threshold`.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.age(now) > threshold
    }
}

/// Default snapshot directory: `<local data dir>/food-observatory`
pub fn default_data_dir() -> Result<PathBuf> {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .map(|p| p.join("food-observatory"))
        .ok_or_else(|| ObservatoryError::Config("Cannot determine data directory".to_string()))
}

/// Reads and writes the snapshot file
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    /// Store whose snapshot lives in `data_dir`
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SNAPSHOT_FILE),
        }
    }

    /// Store with an explicit snapshot file path
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot.
    ///
    /// `Ok(None)` when no snapshot exists, `CacheCorrupt` when it does not parse.
    pub fn read(&self) -> Result<Option<Snapshot>> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = ?self.path, "Snapshot not found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|e| ObservatoryError::CacheCorrupt(e.to_string()))
    }

    /// Read the snapshot, discarding it if it is corrupt.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        match self.read() {
            Ok(Some(snapshot)) => {
                info!(count = snapshot.papers.len(), path = ?self.path, "Loaded snapshot");
                Ok(Some(snapshot))
            }
            Ok(None) => Ok(None),
            Err(ObservatoryError::CacheCorrupt(reason)) => {
                warn!(path = ?self.path, reason = %reason, "Discarding corrupt snapshot");
                self.clear()?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Replace the snapshot atomically.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        info!(count = snapshot.papers.len(), path = ?self.path, "Saved snapshot");
        Ok(())
    }

    /// Remove the snapshot, if any
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = ?self.path, "Cleared snapshot");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        default_data_dir()
            .map(|dir| Self::new(&dir))
            .unwrap_or_else(|_| Self::with_path(PathBuf::from(SNAPSHOT_FILE)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::{NO_ABSTRACT, NO_LINK};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn snapshot_at(timestamp: DateTime<Utc>) -> Snapshot {
        let paper = Paper {
            title: "Grain blockchain".to_string(),
            authors: vec!["Ada Lovelace".to_string()],
            date: NaiveDate::from_ymd_opt(2024, 3, 1),
            abstract_text: NO_ABSTRACT.to_string(),
            url: NO_LINK.to_string(),
            doi: Some("10.1234/grain".to_string()),
            source: Source::Crossref,
            categories: vec!["Traceability & Supply Chain".to_string()],
        };
        let papers = vec![paper];
        Snapshot {
            timestamp,
            categories: vec!["Traceability & Supply Chain".to_string()],
            date_range: DateBounds::from_papers(&papers),
            selected_categories: vec!["Traceability & Supply Chain".to_string()],
            selected_sources: all_sources(),
            papers,
        }
    }

    #[test]
    fn test_load_missing() -> Result<()> {
        let dir = TempDir::new()?;
        let store = CacheStore::new(dir.path());
        assert!(store.load()?.is_none());
        Ok(())
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let dir = TempDir::new()?;
        let store = CacheStore::new(&dir.path().join("nested"));
        let snapshot = snapshot_at(Utc::now());

        store.save(&snapshot)?;
        assert!(!store.path().with_extension("json.tmp").exists());
        assert_eq!(store.load()?, Some(snapshot));
        Ok(())
    }

    #[test]
    fn test_snapshot_json_keys() -> Result<()> {
        let json = serde_json::to_value(snapshot_at(Utc::now()))?;
        for key in ["timestamp", "papers", "categories", "dateRange", "selectedCategories", "selectedSources"] {
            assert!(json.get(key).is_some(), "missing key {}", key);
        }
        assert_eq!(json["dateRange"]["minDate"], "2024-03-01");
        assert_eq!(json["papers"][0]["abstract"], NO_ABSTRACT);
        Ok(())
    }

    #[test]
    fn test_corrupt_snapshot_is_removed() -> Result<()> {
        let dir = TempDir::new()?;
        let store = CacheStore::new(dir.path());
        std::fs::write(store.path(), "{ not json")?;

        assert!(matches!(store.read(), Err(ObservatoryError::CacheCorrupt(_))));
        assert!(store.load()?.is_none());
        assert!(!store.path().exists());
        Ok(())
    }

    #[test]
    fn test_non_utf8_snapshot_is_removed() -> Result<()> {
        let dir = TempDir::new()?;
        let store = CacheStore::new(dir.path());
        std::fs::write(store.path(), [0xff, 0xfe, 0x00, 0x7b])?;

        assert!(matches!(store.read(), Err(ObservatoryError::CacheCorrupt(_))));
        assert!(store.load()?.is_none());
        assert!(!store.path().exists());
        Ok(())
    }

    #[test]
    fn test_failed_save_leaves_no_temp_file() -> Result<()> {
        let dir = TempDir::new()?;
        let target = dir.path().join("snapshot");
        std::fs::create_dir(&target)?;
        std::fs::write(target.join("occupied"), "x")?;
        let store = CacheStore::with_path(target);

        assert!(store.save(&snapshot_at(Utc::now())).is_err());
        assert!(!store.path().with_extension("json.tmp").exists());
        Ok(())
    }

    #[test]
    fn test_staleness_threshold() {
        let now = Utc::now();
        let threshold = Duration::hours(FRESHNESS_HOURS);
        assert!(snapshot_at(now - Duration::hours(13)).is_stale(now, threshold));
        assert!(!snapshot_at(now - Duration::hours(1)).is_stale(now, threshold));
    }

    #[test]
    fn test_clear_is_idempotent() -> Result<()> {
        let dir = TempDir::new()?;
        let store = CacheStore::new(dir.path());
        store.save(&snapshot_at(Utc::now()))?;
        store.clear()?;
        store.clear()?;
        assert!(!store.path().exists());
        Ok(())
    }
}
