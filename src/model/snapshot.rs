use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::InstalledItem;

/// Schema tag written into every snapshot; a mismatch is read as a cache miss.
pub const SNAPSHOT_SCHEMA_VERSION: &str = "1";

/// A complete scan result as persisted by the snapshot cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSnapshot {
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub total_count: usize,
    pub items: Vec<InstalledItem>,
}

impl ScanSnapshot {
    pub fn new(items: Vec<InstalledItem>) -> Self {
        Self {
            timestamp: Utc::now(),
            version: SNAPSHOT_SCHEMA_VERSION.to_string(),
            total_count: items.len(),
            items,
        }
    }

    pub fn update_count(&self) -> usize {
        self.items.iter().filter(|i| i.has_update()).count()
    }
}
