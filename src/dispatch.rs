//! Upgrade execution.
//!
//! The dispatcher asks the item's own adapter for the native upgrade command
//! and runs it through the shared [`CommandRunner`]. It holds no per-source
//! knowledge of its own.

use std::sync::Arc;
use std::time::Duration;

use crate::adapter::AdapterSet;
use crate::model::InstalledItem;
use crate::process::{CommandRunner, CommandSpec};

/// Pause between items in a dry run, so a preview reads like a real run.
pub const DRY_RUN_PAUSE: Duration = Duration::from_millis(300);

/// Totals of one [`UpdateDispatcher::execute_batch`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub attempted: usize,
    pub succeeded: usize,
}

impl BatchSummary {
    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }
}

pub struct UpdateDispatcher {
    adapters: AdapterSet,
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
    dry_run_pause: Duration,
}

impl UpdateDispatcher {
    pub fn new(adapters: AdapterSet, runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self {
            adapters,
            runner,
            timeout,
            dry_run_pause: DRY_RUN_PAUSE,
        }
    }

    pub fn with_dry_run_pause(mut self, pause: Duration) -> Self {
        self.dry_run_pause = pause;
        self
    }

    /// Builds the upgrade argv for `item`, or `None` if its source has no
    /// known upgrade procedure for it.
    pub fn build_command(
        &self,
        item: &InstalledItem,
        target_version: Option<&str>,
    ) -> Option<Vec<String>> {
        self.adapters
            .get(item.source)?
            .upgrade_command(item, target_version)
    }

    /// Upgrades one item.
    ///
    /// Without an explicit `target_version` the item's known latest version is
    /// targeted. A dry run only logs the command and always succeeds; a real
    /// run succeeds iff the command produced output.
    pub async fn execute(
        &self,
        item: &InstalledItem,
        target_version: Option<&str>,
        dry_run: bool,
    ) -> bool {
        let target = effective_target(item, target_version);
        let command = self.build_command(item, target);

        if dry_run {
            match &command {
                Some(argv) => tracing::info!(item = %item.name, command = %argv.join(" "), "dry run"),
                None => tracing::info!(item = %item.name, "dry run, no upgrade command"),
            }
            return true;
        }

        let Some(spec) = command.as_deref().and_then(CommandSpec::from_argv) else {
            tracing::warn!(item = %item.name, source = %item.source, "no upgrade command");
            return false;
        };
        let spec = spec.timeout(self.timeout);

        tracing::info!(item = %item.name, command = %spec.display(), "upgrading");
        let succeeded = self.runner.run(&spec).await.is_some();
        if !succeeded {
            tracing::warn!(item = %item.name, command = %spec.display(), "upgrade failed");
        }
        succeeded
    }

    /// Upgrades `items` one by one; a failure never stops the rest.
    ///
    /// `on_result` sees every item with its outcome as soon as it is known.
    pub async fn execute_batch<F>(
        &self,
        items: &[InstalledItem],
        dry_run: bool,
        mut on_result: F,
    ) -> BatchSummary
    where
        F: FnMut(&InstalledItem, bool),
    {
        let mut summary = BatchSummary::default();
        for item in items {
            if dry_run && !self.dry_run_pause.is_zero() {
                tokio::time::sleep(self.dry_run_pause).await;
            }
            let succeeded = self.execute(item, None, dry_run).await;
            summary.attempted += 1;
            if succeeded {
                summary.succeeded += 1;
            }
            on_result(item, succeeded);
        }
        summary
    }
}

fn effective_target<'a>(item: &'a InstalledItem, explicit: Option<&'a str>) -> Option<&'a str> {
    explicit
        .filter(|v| !v.is_empty())
        .or_else(|| Some(item.latest_version.as_str()).filter(|v| !v.is_empty()))
}
