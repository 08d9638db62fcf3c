//! Inventory of installed software across package managers, with update
//! checks and per-source upgrades.
//!
//! - [`adapter`] - one [`SourceAdapter`] per package source
//! - [`scan`] - concurrent discovery and merge
//! - [`checker`] - latest-version resolution and status reconciliation
//! - [`cache`] - snapshot of the last full scan
//! - [`dispatch`] - native upgrade execution
//! - [`engine`] - [`SystemUpdate`], the facade over all of the above

pub mod adapter;
pub mod cache;
pub mod checker;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod model;
pub mod output;
pub mod platform;
pub mod process;
pub mod scan;

#[cfg(test)]
mod testing;

pub use adapter::{AdapterSet, SourceAdapter};
pub use cache::SnapshotCache;
pub use checker::UpdateResolver;
pub use config::Config;
pub use dispatch::{BatchSummary, UpdateDispatcher};
pub use engine::{
    select_target, update_readiness, RefreshEvent, RefreshOutcome, Selection, SystemUpdate,
    UpdateReadiness,
};
pub use error::{Error, Result};
pub use model::{InstalledItem, ItemSource, Platform, ScanSnapshot, UpdateStatus};
pub use process::{CommandRunner, SystemRunner};
pub use scan::{ScanOrchestrator, ScanOutcome, SourceReport};
