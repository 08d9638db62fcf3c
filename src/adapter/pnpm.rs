use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::npm::{apply_outdated, listed_items, ListOutput, OutdatedEntry};
use super::{argv, at_version, AdapterContext, SourceAdapter};
use crate::model::{InstalledItem, ItemSource, Platform, ALL_PLATFORMS};

const PNPM: &str = "pnpm";

/// pnpm prints one list object per global project, wrapped in an array.
#[derive(Deserialize)]
#[serde(untagged)]
enum PnpmList {
    Projects(Vec<ListOutput>),
    Single(ListOutput),
}

/// Depending on version, `pnpm outdated --json` is keyed by name or a plain array.
#[derive(Deserialize)]
#[serde(untagged)]
enum PnpmOutdated {
    ByName(BTreeMap<String, OutdatedEntry>),
    Rows(Vec<OutdatedEntry>),
}

impl PnpmOutdated {
    /// `(name, latest-or-wanted)` pairs.
    fn candidates(&self) -> Vec<(&str, &str)> {
        fn pick(entry: &OutdatedEntry) -> Option<&str> {
            entry
                .latest
                .as_deref()
                .filter(|v| !v.is_empty())
                .or(entry.wanted.as_deref())
        }

        match self {
            PnpmOutdated::ByName(map) => map
                .iter()
                .filter_map(|(name, entry)| Some((name.as_str(), pick(entry)?)))
                .collect(),
            PnpmOutdated::Rows(rows) => rows
                .iter()
                .filter_map(|entry| Some((entry.name.as_deref()?, pick(entry)?)))
                .collect(),
        }
    }
}

pub struct PnpmAdapter {
    ctx: AdapterContext,
}

impl PnpmAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SourceAdapter for PnpmAdapter {
    fn source(&self) -> ItemSource {
        ItemSource::Pnpm
    }

    fn name(&self) -> &'static str {
        "PNPM Global Packages"
    }

    fn supported_platforms(&self) -> &[Platform] {
        ALL_PLATFORMS
    }

    async fn discover(&self) -> Result<Vec<InstalledItem>> {
        let spec = self
            .ctx
            .command(PNPM)
            .args(["list", "-g", "--depth=0", "--json"])
            .allow_nonzero_exit();
        let Some(output) = self.ctx.run(spec).await else {
            return Ok(Vec::new());
        };

        let list = match serde_json::from_str::<PnpmList>(&output) {
            Ok(PnpmList::Single(list)) => Some(list),
            Ok(PnpmList::Projects(projects)) => projects.into_iter().next(),
            Err(err) => {
                tracing::warn!(error = %err, "unparsable pnpm list output");
                None
            }
        };

        Ok(list
            .map(|list| listed_items(list, ItemSource::Pnpm))
            .unwrap_or_default())
    }

    async fn check_updates(&self, items: &mut [InstalledItem]) -> Result<usize> {
        let spec = self
            .ctx
            .command(PNPM)
            .args(["outdated", "-g", "--json"])
            .allow_nonzero_exit();
        let Some(output) = self.ctx.run(spec).await else {
            return Ok(0);
        };

        match serde_json::from_str::<PnpmOutdated>(&output) {
            Ok(outdated) => Ok(apply_outdated(items, outdated.candidates())),
            Err(err) => {
                tracing::warn!(error = %err, "unparsable pnpm outdated output");
                Ok(0)
            }
        }
    }

    fn upgrade_command(
        &self,
        item: &InstalledItem,
        target_version: Option<&str>,
    ) -> Option<Vec<String>> {
        let package = at_version(&item.name, target_version);
        Some(argv([PNPM, "add", "-g", package.as_str()]))
    }
}
