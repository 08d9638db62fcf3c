//! File-based snapshot cache.
//!
//! The last complete scan is kept as a single JSON file and served back
//! while it is younger than the configured TTL, bypassing discovery and
//! update checks entirely.
//!
//! # Cache Location
//!
//! The snapshot is stored in platform-specific directories:
//! - Linux: `~/.cache/sysupdate/snapshot.json`
//! - macOS: `~/Library/Caches/sysupdate/snapshot.json`
//! - Windows: `%LOCALAPPDATA%\sysupdate\snapshot.json`
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use sysupdate::{InstalledItem, ItemSource, SnapshotCache};
//!
//! let cache = SnapshotCache::open(sysupdate::platform::cache_dir(), Duration::from_secs(7200))?;
//! cache.save(&[InstalledItem::new("git", "2.43.0", ItemSource::Path)]);
//!
//! let snapshot = cache.load().expect("fresh snapshot");
//! assert_eq!(snapshot.total_count, 1);
//! # Ok::<(), sysupdate::Error>(())
//! ```

use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::model::{InstalledItem, ScanSnapshot, SNAPSHOT_SCHEMA_VERSION};

const SNAPSHOT_FILE: &str = "snapshot.json";

/// A single-file scan cache with TTL support.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    path: PathBuf,
    ttl: Duration,
}

impl SnapshotCache {
    /// Opens the cache in `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheDir`] if the directory cannot be created; this is
    /// the one cache failure that reaches the caller.
    pub fn open(dir: impl Into<PathBuf>, ttl: Duration) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| Error::CacheDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self::with_path(dir.join(SNAPSHOT_FILE), ttl))
    }

    /// Uses `path` as the snapshot file without touching the filesystem.
    pub fn with_path(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_valid(&self) -> bool {
        self.read().is_some()
    }

    /// Returns the snapshot if it exists, parses, carries the current schema
    /// tag and is within the TTL.
    pub fn load(&self) -> Option<ScanSnapshot> {
        self.read()
    }

    fn read(&self) -> Option<ScanSnapshot> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "unreadable snapshot");
                return None;
            }
        };

        let snapshot: ScanSnapshot = match serde_json::from_str(&content) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "corrupt snapshot ignored");
                return None;
            }
        };

        if snapshot.version != SNAPSHOT_SCHEMA_VERSION {
            tracing::debug!(found = %snapshot.version, "snapshot schema mismatch");
            return None;
        }

        let age = Utc::now().signed_duration_since(snapshot.timestamp);
        match age.to_std() {
            Ok(age) if age < self.ttl => Some(snapshot),
            // a timestamp in the future counts as fresh
            Err(_) => Some(snapshot),
            Ok(_) => {
                tracing::debug!("snapshot expired");
                None
            }
        }
    }

    /// Replaces the snapshot with `items`, stamped now.
    ///
    /// Write failures are logged and otherwise ignored.
    pub fn save(&self, items: &[InstalledItem]) {
        let snapshot = ScanSnapshot::new(items.to_vec());
        if let Err(err) = self.write(&snapshot) {
            tracing::error!(path = %self.path.display(), error = %err, "failed to write snapshot");
        }
    }

    fn write(&self, snapshot: &ScanSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Deletes the snapshot file. A missing file is not an error.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
