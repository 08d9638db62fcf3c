//! Canonical record types shared by every source adapter.
//!
//! - [`InstalledItem`] - one discovered package or tool
//! - [`ItemSource`] - the adapter an item came from
//! - [`UpdateStatus`] - reconciliation verdict for an item
//! - [`Platform`] - operating system platform
//! - [`ScanSnapshot`] - a timestamped scan as stored by the cache
//!
//! # Example
//!
//! ```
//! use sysupdate::{InstalledItem, ItemSource, UpdateStatus};
//!
//! let mut item = InstalledItem::new("typescript", "5.3.3", ItemSource::Npm);
//! item.record_latest("5.4.2");
//!
//! assert_eq!(item.status, UpdateStatus::UpdateAvailable);
//! ```

mod item;
mod snapshot;

pub use item::*;
pub use snapshot::*;
