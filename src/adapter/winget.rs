use anyhow::Result;
use async_trait::async_trait;

use super::table::parse_table;
use super::{argv, AdapterContext, SourceAdapter};
use crate::model::{InstalledItem, ItemSource, Platform};

const WINGET: &str = "winget";
const ACCEPT_SOURCE: &str = "--accept-source-agreements";
const ACCEPT_PACKAGE: &str = "--accept-package-agreements";

/// One row of `winget upgrade`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRow {
    pub name: String,
    pub id: String,
    pub available: String,
}

pub struct WingetAdapter {
    ctx: AdapterContext,
}

impl WingetAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }

    /// Runs `winget upgrade` and returns every row with an available version.
    ///
    /// winget exits non-zero when it has nothing to upgrade, so the exit code
    /// is not treated as failure here.
    pub async fn list_upgrades(&self) -> Vec<UpgradeRow> {
        let spec = self
            .ctx
            .command(WINGET)
            .args(["upgrade", ACCEPT_SOURCE])
            .allow_nonzero_exit();
        match self.ctx.run(spec).await {
            Some(output) => parse_upgrade_rows(&output),
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl SourceAdapter for WingetAdapter {
    fn source(&self) -> ItemSource {
        ItemSource::Winget
    }

    fn name(&self) -> &'static str {
        "Winget Packages"
    }

    fn supported_platforms(&self) -> &[Platform] {
        &[Platform::Windows]
    }

    async fn discover(&self) -> Result<Vec<InstalledItem>> {
        let spec = self.ctx.command(WINGET).args(["list", ACCEPT_SOURCE]);
        Ok(self
            .ctx
            .run(spec)
            .await
            .map(|output| parse_winget_list(&output))
            .unwrap_or_default())
    }

    async fn check_updates(&self, items: &mut [InstalledItem]) -> Result<usize> {
        let upgrades = self.list_upgrades().await;
        let mut updates = 0;

        for item in items.iter_mut() {
            let Some(id) = item.source_id.as_deref() else {
                continue;
            };
            if let Some(row) = upgrades.iter().find(|row| row.id.eq_ignore_ascii_case(id)) {
                item.record_latest(&row.available);
                if item.has_update() {
                    updates += 1;
                }
            }
        }

        Ok(updates)
    }

    fn upgrade_command(
        &self,
        item: &InstalledItem,
        target_version: Option<&str>,
    ) -> Option<Vec<String>> {
        let id = item.source_id.as_deref()?;
        Some(winget_upgrade_argv(id, target_version))
    }
}

/// `winget upgrade --id <id> ...`, shared with registry items joined to a winget id.
pub(crate) fn winget_upgrade_argv(id: &str, target_version: Option<&str>) -> Vec<String> {
    let mut cmd = argv([WINGET, "upgrade", "--id", id, ACCEPT_SOURCE, ACCEPT_PACKAGE]);
    if let Some(version) = target_version.filter(|v| !v.is_empty()) {
        cmd.extend(argv(["-v", version]));
    }
    cmd
}

fn parse_winget_list(output: &str) -> Vec<InstalledItem> {
    parse_table(output, &["Name", "Id", "Version"], &["Available", "Source"])
        .into_iter()
        .filter_map(|row| {
            let name = row.get("Name")?;
            let id = row.get("Id")?;
            let version = row.get("Version")?;
            Some(InstalledItem::new(name, version, ItemSource::Winget).with_source_id(id))
        })
        .collect()
}

pub(crate) fn parse_upgrade_rows(output: &str) -> Vec<UpgradeRow> {
    parse_table(output, &["Name", "Id", "Version"], &["Available", "Source"])
        .into_iter()
        .filter_map(|row| {
            Some(UpgradeRow {
                name: row.get("Name")?.to_string(),
                id: row.get("Id")?.to_string(),
                available: row.get("Available")?.to_string(),
            })
        })
        .collect()
}
