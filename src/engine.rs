//! The reconciliation engine.
//!
//! [`SystemUpdate`] wires the adapters, scan orchestrator, update resolver,
//! snapshot cache and dispatcher together from one [`Config`], and is the
//! only type a front end needs.
//!
//! # Example
//!
//! ```no_run
//! use sysupdate::{Config, SystemUpdate};
//!
//! # async fn run() -> sysupdate::Result<()> {
//! let engine = SystemUpdate::new(Config::load()?)?;
//! let outcome = engine.refresh(true, None, |_| {}).await;
//! println!("{} items, {} updates", outcome.items.len(), outcome.update_count);
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::adapter::{AdapterContext, AdapterSet};
use crate::cache::SnapshotCache;
use crate::checker::{HttpReleaseFeed, ReleaseFeed, UpdateResolver};
use crate::config::Config;
use crate::dispatch::{BatchSummary, UpdateDispatcher};
use crate::error::Result;
use crate::model::{InstalledItem, ItemSource, ScanSnapshot, UpdateStatus};
use crate::platform::cache_dir;
use crate::process::{CommandRunner, SystemRunner};
use crate::scan::{ScanOrchestrator, SourceReport};

/// Progress of a [`SystemUpdate::refresh`].
#[derive(Debug, Clone)]
pub enum RefreshEvent {
    /// One source finished discovery.
    Source(SourceReport),
    /// Discovery is done; update checks are starting.
    Checking { items: usize },
}

/// Result of a [`SystemUpdate::refresh`].
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub items: Vec<InstalledItem>,
    pub update_count: usize,
    pub from_cache: bool,
    pub scanned_at: DateTime<Utc>,
}

/// Outcome of looking an item up by name for a manual update.
#[derive(Debug)]
pub enum Selection<'a> {
    NotFound,
    /// Several sources carry the name and none was specified.
    Ambiguous(Vec<&'a InstalledItem>),
    Found(&'a InstalledItem),
}

/// Finds the item named `name` (case-insensitive), optionally within one source.
pub fn select_target<'a>(
    items: &'a [InstalledItem],
    name: &str,
    source: Option<ItemSource>,
) -> Selection<'a> {
    let matches: Vec<&InstalledItem> = items
        .iter()
        .filter(|item| item.name.eq_ignore_ascii_case(name))
        .filter(|item| source.map_or(true, |s| item.source == s))
        .collect();

    match matches.len() {
        0 => Selection::NotFound,
        1 => Selection::Found(matches[0]),
        // with a source given, the first match in scan order is taken
        _ if source.is_some() => Selection::Found(matches[0]),
        _ => Selection::Ambiguous(matches),
    }
}

/// Whether a manually selected item needs upgrading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateReadiness {
    /// An update is available, or a version was pinned.
    Ready,
    /// The check found the installed version current.
    Current,
    /// No check verdict; upgrading would be a forced reinstall.
    Unverified,
}

/// Decides whether `item` should be upgraded without forcing.
pub fn update_readiness(item: &InstalledItem, pinned_version: Option<&str>) -> UpdateReadiness {
    if pinned_version.is_some_and(|v| !v.is_empty()) || item.has_update() {
        UpdateReadiness::Ready
    } else if item.status == UpdateStatus::UpToDate {
        UpdateReadiness::Current
    } else {
        UpdateReadiness::Unverified
    }
}

pub struct SystemUpdate {
    config: Config,
    adapters: AdapterSet,
    orchestrator: ScanOrchestrator,
    resolver: UpdateResolver,
    dispatcher: UpdateDispatcher,
    cache: SnapshotCache,
}

impl SystemUpdate {
    /// Builds the engine over real processes, the public release endpoints and
    /// the platform cache directory.
    ///
    /// # Errors
    ///
    /// Fails only if the cache directory cannot be created.
    pub fn new(config: Config) -> Result<Self> {
        let cache = SnapshotCache::open(cache_dir(), config.cache.ttl())?;
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
        let feed: Arc<dyn ReleaseFeed> =
            Arc::new(HttpReleaseFeed::new(config.performance.network_timeout()));
        Ok(Self::with_parts(config, runner, feed, cache))
    }

    pub fn with_parts(
        config: Config,
        runner: Arc<dyn CommandRunner>,
        feed: Arc<dyn ReleaseFeed>,
        cache: SnapshotCache,
    ) -> Self {
        let ctx = AdapterContext::new(Arc::clone(&runner), feed)
            .with_timeout(config.performance.command_timeout());
        Self::from_adapters(config, AdapterSet::new(ctx), runner, cache)
    }

    pub fn from_adapters(
        config: Config,
        adapters: AdapterSet,
        runner: Arc<dyn CommandRunner>,
        cache: SnapshotCache,
    ) -> Self {
        let orchestrator = ScanOrchestrator::new(adapters.clone(), &config);
        let resolver = UpdateResolver::new(adapters.clone());
        let dispatcher = UpdateDispatcher::new(
            adapters.clone(),
            runner,
            config.performance.upgrade_timeout(),
        );
        Self {
            config,
            adapters,
            orchestrator,
            resolver,
            dispatcher,
            cache,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn adapters(&self) -> &AdapterSet {
        &self.adapters
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub fn dispatcher(&self) -> &UpdateDispatcher {
        &self.dispatcher
    }

    pub async fn scan<F>(&self, filter: Option<ItemSource>, progress: F) -> Vec<InstalledItem>
    where
        F: FnMut(&SourceReport),
    {
        self.orchestrator.scan(filter, progress).await
    }

    /// Checks every item and returns them with the number of available updates.
    pub async fn check_updates(&self, items: Vec<InstalledItem>) -> (Vec<InstalledItem>, usize) {
        self.resolver.resolve(items).await
    }

    /// The cached snapshot, if caching is enabled and the snapshot is fresh.
    pub fn load_cache(&self) -> Option<ScanSnapshot> {
        if !self.config.cache.enabled {
            return None;
        }
        self.cache.load()
    }

    pub fn save_cache(&self, items: &[InstalledItem]) {
        if self.config.cache.enabled {
            self.cache.save(items);
        }
    }

    pub fn clear_cache(&self) -> Result<()> {
        self.cache.clear()
    }

    pub async fn dispatch_update(
        &self,
        item: &InstalledItem,
        target_version: Option<&str>,
        dry_run: bool,
    ) -> bool {
        self.dispatcher.execute(item, target_version, dry_run).await
    }

    pub async fn dispatch_batch<F>(
        &self,
        items: &[InstalledItem],
        dry_run: bool,
        on_result: F,
    ) -> BatchSummary
    where
        F: FnMut(&InstalledItem, bool),
    {
        self.dispatcher.execute_batch(items, dry_run, on_result).await
    }

    /// Returns checked items, from the cache when allowed and fresh, otherwise
    /// by scanning and checking.
    ///
    /// The cache always holds a full scan: a filtered refresh reads it but
    /// never replaces it.
    pub async fn refresh<F>(
        &self,
        use_cache: bool,
        filter: Option<ItemSource>,
        mut progress: F,
    ) -> RefreshOutcome
    where
        F: FnMut(RefreshEvent),
    {
        if use_cache {
            if let Some(snapshot) = self.load_cache() {
                tracing::info!(items = snapshot.total_count, "using cached scan");
                let items: Vec<InstalledItem> = snapshot
                    .items
                    .into_iter()
                    .filter(|item| filter.map_or(true, |s| item.source == s))
                    .collect();
                let update_count = items.iter().filter(|i| i.has_update()).count();
                return RefreshOutcome {
                    items,
                    update_count,
                    from_cache: true,
                    scanned_at: snapshot.timestamp,
                };
            }
        }

        let discovered = self
            .scan(filter, |report| progress(RefreshEvent::Source(report.clone())))
            .await;
        progress(RefreshEvent::Checking {
            items: discovered.len(),
        });
        let (items, update_count) = self.check_updates(discovered).await;

        if filter.is_none() {
            self.save_cache(&items);
        }

        RefreshOutcome {
            items,
            update_count,
            from_cache: false,
            scanned_at: Utc::now(),
        }
    }
}
