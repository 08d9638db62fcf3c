//! Concurrent discovery across sources.
//!
//! Every enabled adapter's `discover` runs on its own task, at most
//! `max_workers` at a time. Results are merged once all tasks finish, so no
//! item list is shared between tasks.

use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::adapter::{AdapterSet, SourceAdapter};
use crate::config::{Config, IgnoreConfig, SourcesConfig};
use crate::model::{InstalledItem, ItemSource};

/// How one source's discovery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Found(usize),
    Failed(String),
}

impl ScanOutcome {
    /// Items contributed; a failed source contributes none.
    pub fn count(&self) -> usize {
        match self {
            ScanOutcome::Found(count) => *count,
            ScanOutcome::Failed(_) => 0,
        }
    }
}

/// Progress event emitted as each source finishes, in completion order.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: ItemSource,
    pub name: &'static str,
    pub outcome: ScanOutcome,
}

pub struct ScanOrchestrator {
    adapters: AdapterSet,
    workers: usize,
    sources: SourcesConfig,
    ignore: IgnoreConfig,
}

impl ScanOrchestrator {
    pub fn new(adapters: AdapterSet, config: &Config) -> Self {
        Self {
            adapters,
            workers: config.performance.workers(),
            sources: config.sources.clone(),
            ignore: config.ignore.clone(),
        }
    }

    /// Adapters that will run: enabled, supported here and matching `filter`.
    pub fn active_adapters(&self, filter: Option<ItemSource>) -> Vec<Arc<dyn SourceAdapter>> {
        self.adapters
            .iter()
            .filter(|a| filter.map_or(true, |source| a.source() == source))
            .filter(|a| self.sources.is_enabled(a.source()))
            .filter(|a| a.is_supported())
            .cloned()
            .collect()
    }

    /// Discovers items from every active source.
    ///
    /// Returns items deduplicated by `(name, version)` (first seen, in adapter
    /// registration order, wins) and sorted by source then name.
    pub async fn scan<F>(&self, filter: Option<ItemSource>, mut progress: F) -> Vec<InstalledItem>
    where
        F: FnMut(&SourceReport),
    {
        let adapters = self.active_adapters(filter);
        let semaphore = Arc::new(Semaphore::new(self.workers));

        let mut pending: FuturesUnordered<_> = adapters
            .iter()
            .enumerate()
            .map(|(slot, adapter)| {
                let adapter = Arc::clone(adapter);
                let semaphore = Arc::clone(&semaphore);
                let task = tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| anyhow::anyhow!("scan worker pool closed"))?;
                    adapter.discover().await
                });
                async move { (slot, task.await) }
            })
            .collect();

        let mut discovered: Vec<Vec<InstalledItem>> = adapters.iter().map(|_| Vec::new()).collect();

        while let Some((slot, joined)) = pending.next().await {
            let adapter = &adapters[slot];
            let outcome = match joined {
                Ok(Ok(items)) => {
                    let count = items.len();
                    discovered[slot] = items;
                    ScanOutcome::Found(count)
                }
                Ok(Err(err)) => {
                    tracing::warn!(source = %adapter.source(), error = %err, "discovery failed");
                    ScanOutcome::Failed(err.to_string())
                }
                Err(err) => {
                    tracing::warn!(source = %adapter.source(), error = %err, "discovery task aborted");
                    ScanOutcome::Failed(format!("discovery task aborted: {err}"))
                }
            };
            progress(&SourceReport {
                source: adapter.source(),
                name: adapter.name(),
                outcome,
            });
        }

        let items = self.merge(discovered);
        tracing::info!(sources = adapters.len(), items = items.len(), "scan finished");
        items
    }

    fn merge(&self, discovered: Vec<Vec<InstalledItem>>) -> Vec<InstalledItem> {
        let mut seen = HashSet::new();
        let mut items: Vec<InstalledItem> = discovered
            .into_iter()
            .flatten()
            .filter(|item| !self.ignore.should_ignore_package(&item.name))
            .filter(|item| {
                let (name, version) = item.dedup_key();
                seen.insert((name.to_string(), version.to_string()))
            })
            .collect();

        items.sort_by(|a, b| {
            a.source
                .display_name()
                .cmp(b.source.display_name())
                .then_with(|| a.name.cmp(&b.name))
        });
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{stub_set, StubAdapter};

    fn orchestrator(adapters: Vec<StubAdapter>, config: &Config) -> ScanOrchestrator {
        ScanOrchestrator::new(stub_set(adapters), config)
    }

    #[tokio::test]
    async fn dedups_by_name_and_version_first_seen_wins() {
        let scan = orchestrator(
            vec![
                StubAdapter::new(ItemSource::Npm)
                    .item("typescript", "5.3.3")
                    .item("eslint", "8.56.0"),
                StubAdapter::new(ItemSource::Pnpm)
                    .item("typescript", "5.3.3")
                    .item("typescript", "5.4.2"),
            ],
            &Config::default(),
        );

        let items = scan.scan(None, |_| {}).await;
        assert_eq!(items.len(), 3);
        let ts: Vec<_> = items.iter().filter(|i| i.name == "typescript").collect();
        assert_eq!(ts.len(), 2);
        assert!(ts
            .iter()
            .any(|i| i.version == "5.3.3" && i.source == ItemSource::Npm));
    }

    #[tokio::test]
    async fn sorts_by_source_then_name() {
        let scan = orchestrator(
            vec![
                StubAdapter::new(ItemSource::Pip).item("black", "24.1.0"),
                StubAdapter::new(ItemSource::Npm)
                    .item("typescript", "5.3.3")
                    .item("eslint", "8.56.0"),
            ],
            &Config::default(),
        );

        let items = scan.scan(None, |_| {}).await;
        let order: Vec<_> = items
            .iter()
            .map(|i| (i.source.display_name(), i.name.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![("NPM", "eslint"), ("NPM", "typescript"), ("PIP", "black")]
        );
    }

    #[tokio::test]
    async fn failing_sources_do_not_sink_the_scan() {
        let scan = orchestrator(
            vec![
                StubAdapter::new(ItemSource::Npm).item("typescript", "5.3.3"),
                StubAdapter::new(ItemSource::Bun).failing_discovery(),
                StubAdapter::new(ItemSource::Yarn).panicking_discovery(),
            ],
            &Config::default(),
        );

        let mut reports = Vec::new();
        let items = scan.scan(None, |report| reports.push(report.clone())).await;

        assert_eq!(items.len(), 1);
        assert_eq!(reports.len(), 3);
        for report in &reports {
            match report.source {
                ItemSource::Npm => assert_eq!(report.outcome, ScanOutcome::Found(1)),
                _ => {
                    assert!(matches!(report.outcome, ScanOutcome::Failed(_)));
                    assert_eq!(report.outcome.count(), 0);
                }
            }
        }
    }

    #[tokio::test]
    async fn honours_filter_disabled_sources_and_ignore_list() {
        let mut config = Config::default();
        config.sources.pip = false;
        config.ignore.packages = vec!["corepack".to_string()];
        let adapters = vec![
            StubAdapter::new(ItemSource::Npm)
                .item("corepack", "0.23.0")
                .item("typescript", "5.3.3"),
            StubAdapter::new(ItemSource::Pip).item("black", "24.1.0"),
            StubAdapter::new(ItemSource::Bun).item("prettier", "3.1.1"),
        ];
        let scan = orchestrator(adapters, &config);

        let all = scan.scan(None, |_| {}).await;
        let names: Vec<_> = all.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["prettier", "typescript"]);

        let filtered = scan.scan(Some(ItemSource::Bun), |_| {}).await;
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].source, ItemSource::Bun);

        assert!(scan.scan(Some(ItemSource::Pip), |_| {}).await.is_empty());
    }

    #[tokio::test]
    async fn sequential_scan_still_visits_every_source() {
        let mut config = Config::default();
        config.performance.parallel_scan = false;
        let scan = orchestrator(
            vec![
                StubAdapter::new(ItemSource::Npm).item("typescript", "5.3.3"),
                StubAdapter::new(ItemSource::Pip).item("black", "24.1.0"),
            ],
            &config,
        );

        let mut count = 0;
        let items = scan.scan(None, |_| count += 1).await;
        assert_eq!(items.len(), 2);
        assert_eq!(count, 2);
    }
}
