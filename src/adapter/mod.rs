//! Source adapters.
//!
//! This module provides the [`SourceAdapter`] trait and one implementation per
//! package source. Each adapter discovers installed items, resolves their
//! latest published version and builds the native upgrade command.
//!
//! # Available Adapters
//!
//! | Adapter | Source | Platforms | Update check |
//! |---------|--------|-----------|--------------|
//! | [`WingetAdapter`] | `winget list` | Windows | `winget upgrade` table |
//! | [`ChocolateyAdapter`] | `choco list` | Windows | `choco outdated` |
//! | [`NpmAdapter`] | `npm list -g` | All | `npm outdated -g --json` |
//! | [`PnpmAdapter`] | `pnpm list -g` | All | `pnpm outdated -g --json` |
//! | [`BunAdapter`] | `bun pm ls -g` | All | npm registry, per item |
//! | [`YarnAdapter`] | `yarn global list` | All | npm registry, per item |
//! | [`PipAdapter`] | `pip list` | All | `pip list --outdated` |
//! | [`PathAdapter`] | tools on `PATH` | All | per tool |
//! | [`RegistryAdapter`] | Uninstall registry keys | Windows | joined with winget upgrades |

mod bun;
mod chocolatey;
mod npm;
mod path;
mod pip;
mod pnpm;
mod registry;
pub(crate) mod table;
mod winget;
mod yarn;

pub use bun::BunAdapter;
pub use chocolatey::ChocolateyAdapter;
pub use npm::NpmAdapter;
pub use path::{PathAdapter, PATH_TOOLS};
pub use pip::PipAdapter;
pub use pnpm::PnpmAdapter;
pub use registry::RegistryAdapter;
pub use winget::{UpgradeRow, WingetAdapter};
pub use yarn::YarnAdapter;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use crate::checker::ReleaseFeed;
use crate::model::{InstalledItem, ItemSource, Platform};
use crate::process::{CommandRunner, CommandSpec, DEFAULT_TIMEOUT};

/// Per-item network lookups in flight at once within one adapter.
pub(crate) const LOOKUP_CONCURRENCY: usize = 8;

/// Discovery, update check and upgrade command for one package source.
///
/// Adapters contain their own failures: a missing tool or unparsable output
/// yields zero items or zero updates, not an error. An `Err` is reserved for
/// genuinely unexpected conditions and is still contained by the caller.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Returns the source this adapter handles.
    fn source(&self) -> ItemSource;

    /// Returns the human-readable name of this adapter.
    fn name(&self) -> &'static str;

    /// Returns the platforms this adapter supports.
    fn supported_platforms(&self) -> &[Platform];

    /// Returns true if this adapter is supported on the current platform.
    fn is_supported(&self) -> bool {
        let current = Platform::current();
        self.supported_platforms().contains(&current)
    }

    /// Whether a completed check is a definitive verdict for every item.
    ///
    /// Manifest, table and registry sources list every outdated item, so an
    /// item they did not mention is current. Sources that probe items one by
    /// one may legitimately learn nothing and override this with `false`.
    fn exhaustive_check(&self) -> bool {
        true
    }

    /// Discovers installed items. Items start with status `Unknown`.
    async fn discover(&self) -> Result<Vec<InstalledItem>>;

    /// Resolves latest versions for `items`, all of which belong to this source.
    ///
    /// Returns the number of items found to have an update.
    async fn check_updates(&self, items: &mut [InstalledItem]) -> Result<usize>;

    /// Builds the native upgrade command, or `None` if this item cannot be upgraded.
    fn upgrade_command(&self, item: &InstalledItem, target_version: Option<&str>)
        -> Option<Vec<String>>;
}

/// Collaborators shared by every adapter.
#[derive(Clone)]
pub struct AdapterContext {
    pub runner: Arc<dyn CommandRunner>,
    pub feed: Arc<dyn ReleaseFeed>,
    pub timeout: Duration,
}

impl AdapterContext {
    pub fn new(runner: Arc<dyn CommandRunner>, feed: Arc<dyn ReleaseFeed>) -> Self {
        Self {
            runner,
            feed,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Starts a command spec carrying the configured timeout.
    pub fn command(&self, program: &str) -> CommandSpec {
        CommandSpec::new(program).timeout(self.timeout)
    }

    pub async fn run(&self, spec: CommandSpec) -> Option<String> {
        self.runner.run(&spec).await
    }
}

/// Name of the Python interpreter used to drive pip.
pub(crate) fn python_command() -> &'static str {
    if cfg!(windows) {
        "python"
    } else {
        "python3"
    }
}

/// Appends `@<version>` when a target is pinned.
pub(crate) fn at_version(name: &str, target_version: Option<&str>) -> String {
    match target_version {
        Some(version) if !version.is_empty() => format!("{name}@{version}"),
        _ => name.to_string(),
    }
}

pub(crate) fn argv<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Looks every item up on the npm registry, a bounded number at a time.
///
/// Used by package managers that have no outdated listing of their own.
pub(crate) async fn check_against_npm_registry(
    ctx: &AdapterContext,
    items: &mut [InstalledItem],
) -> usize {
    let lookups: Vec<_> = items
        .iter()
        .map(|item| {
            let feed = Arc::clone(&ctx.feed);
            let name = item.name.clone();
            async move { feed.npm_latest(&name).await }
        })
        .collect();
    let latest: Vec<Option<String>> = stream::iter(lookups)
        .buffered(LOOKUP_CONCURRENCY)
        .collect()
        .await;

    let mut updates = 0;
    for (item, latest) in items.iter_mut().zip(latest) {
        if let Some(latest) = latest {
            item.record_latest(&latest);
            if item.has_update() {
                updates += 1;
            }
        }
    }
    updates
}

/// The registered adapters, one per source.
#[derive(Clone)]
pub struct AdapterSet {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl AdapterSet {
    /// Builds every adapter. The registry adapter shares the winget adapter
    /// so it can join against winget's upgrade list.
    pub fn new(ctx: AdapterContext) -> Self {
        let winget = Arc::new(WingetAdapter::new(ctx.clone()));
        Self {
            adapters: vec![
                winget.clone(),
                Arc::new(ChocolateyAdapter::new(ctx.clone())),
                Arc::new(NpmAdapter::new(ctx.clone())),
                Arc::new(PnpmAdapter::new(ctx.clone())),
                Arc::new(BunAdapter::new(ctx.clone())),
                Arc::new(YarnAdapter::new(ctx.clone())),
                Arc::new(PipAdapter::new(ctx.clone())),
                Arc::new(PathAdapter::new(ctx.clone())),
                Arc::new(RegistryAdapter::new(ctx, winget)),
            ],
        }
    }

    pub fn from_adapters(adapters: Vec<Arc<dyn SourceAdapter>>) -> Self {
        Self { adapters }
    }

    pub fn get(&self, source: ItemSource) -> Option<&Arc<dyn SourceAdapter>> {
        self.adapters.iter().find(|a| a.source() == source)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SourceAdapter>> {
        self.adapters.iter()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedFeed, ScriptedRunner};

    #[test]
    fn set_has_one_adapter_per_source() {
        let ctx = AdapterContext::new(
            Arc::new(ScriptedRunner::new()),
            Arc::new(ScriptedFeed::new()),
        );
        let set = AdapterSet::new(ctx);
        assert_eq!(set.len(), ItemSource::ALL.len());
        for source in ItemSource::ALL {
            assert_eq!(set.get(source).unwrap().source(), source);
        }
    }

    #[test]
    fn only_path_checks_are_inconclusive() {
        let ctx = AdapterContext::new(
            Arc::new(ScriptedRunner::new()),
            Arc::new(ScriptedFeed::new()),
        );
        let set = AdapterSet::new(ctx);
        let inconclusive: Vec<_> = set
            .iter()
            .filter(|a| !a.exhaustive_check())
            .map(|a| a.source())
            .collect();
        assert_eq!(inconclusive, vec![ItemSource::Path]);
    }

    #[test]
    fn at_version_only_with_target() {
        assert_eq!(at_version("typescript", Some("5.4.2")), "typescript@5.4.2");
        assert_eq!(at_version("typescript", Some("")), "typescript");
        assert_eq!(at_version("typescript", None), "typescript");
    }
}
