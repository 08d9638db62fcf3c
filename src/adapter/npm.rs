use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::{argv, at_version, AdapterContext, SourceAdapter};
use crate::model::{InstalledItem, ItemSource, Platform, ALL_PLATFORMS};

const NPM: &str = "npm";

pub struct NpmAdapter {
    ctx: AdapterContext,
}

#[derive(Deserialize)]
pub(crate) struct ListOutput {
    #[serde(default)]
    pub dependencies: BTreeMap<String, ListedPackage>,
}

#[derive(Deserialize)]
pub(crate) struct ListedPackage {
    pub version: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct OutdatedEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub wanted: Option<String>,
    #[serde(default)]
    pub latest: Option<String>,
}

impl NpmAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SourceAdapter for NpmAdapter {
    fn source(&self) -> ItemSource {
        ItemSource::Npm
    }

    fn name(&self) -> &'static str {
        "NPM Global Packages"
    }

    fn supported_platforms(&self) -> &[Platform] {
        ALL_PLATFORMS
    }

    async fn discover(&self) -> Result<Vec<InstalledItem>> {
        let spec = self
            .ctx
            .command(NPM)
            .args(["list", "-g", "--depth=0", "--json", "--silent"])
            // exits 1 on peer dependency problems but still prints the tree
            .allow_nonzero_exit();
        let Some(output) = self.ctx.run(spec).await else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<ListOutput>(&output) {
            Ok(list) => Ok(listed_items(list, ItemSource::Npm)),
            Err(err) => {
                tracing::warn!(error = %err, "unparsable npm list output");
                Ok(Vec::new())
            }
        }
    }

    async fn check_updates(&self, items: &mut [InstalledItem]) -> Result<usize> {
        // npm exits 1 whenever something is outdated
        let spec = self
            .ctx
            .command(NPM)
            .args(["outdated", "-g", "--json"])
            .allow_nonzero_exit();
        let Some(output) = self.ctx.run(spec).await else {
            return Ok(0);
        };

        let outdated: BTreeMap<String, OutdatedEntry> = match serde_json::from_str(&output) {
            Ok(outdated) => outdated,
            Err(err) => {
                tracing::warn!(error = %err, "unparsable npm outdated output");
                return Ok(0);
            }
        };

        Ok(apply_outdated(
            items,
            outdated
                .iter()
                .filter_map(|(name, entry)| Some((name.as_str(), entry.latest.as_deref()?))),
        ))
    }

    fn upgrade_command(
        &self,
        item: &InstalledItem,
        target_version: Option<&str>,
    ) -> Option<Vec<String>> {
        let package = at_version(&item.name, target_version);
        Some(argv([NPM, "install", "-g", package.as_str()]))
    }
}

/// Converts a `dependencies` map into items, keeping packages without a version.
pub(crate) fn listed_items(list: ListOutput, source: ItemSource) -> Vec<InstalledItem> {
    list.dependencies
        .into_iter()
        .map(|(name, pkg)| {
            let version = pkg.version.unwrap_or_else(|| "N/A".to_string());
            InstalledItem::new(&name, version, source).with_source_id(&name)
        })
        .collect()
}

/// Records `(name, latest)` pairs onto items with that exact name.
pub(crate) fn apply_outdated<'a>(
    items: &mut [InstalledItem],
    outdated: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> usize {
    let mut updates = 0;
    for (name, latest) in outdated {
        for item in items.iter_mut().filter(|i| i.name == name) {
            item.record_latest(latest);
            if item.has_update() {
                updates += 1;
            }
        }
    }
    updates
}
