use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::winget::winget_upgrade_argv;
use super::{AdapterContext, SourceAdapter, WingetAdapter};
use crate::model::{InstalledItem, ItemSource, Platform};

/// Lists every uninstallable application with a display name and version,
/// skipping system components, as JSON.
const UNINSTALL_QUERY: &str = r#"
$paths = @(
    'HKLM:\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\*',
    'HKCU:\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\*',
    'HKLM:\SOFTWARE\Wow6432Node\Microsoft\Windows\CurrentVersion\Uninstall\*'
)
Get-ItemProperty -Path $paths -ErrorAction SilentlyContinue |
    Where-Object { $_.DisplayName -and $_.DisplayVersion -and !$_.SystemComponent } |
    Select-Object @{n='Name';e={$_.DisplayName}},
                  @{n='Version';e={$_.DisplayVersion}},
                  @{n='InstallLocation';e={$_.InstallLocation}} |
    ConvertTo-Json
"#;

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UninstallEntry {
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    install_location: Option<String>,
}

/// `ConvertTo-Json` emits a bare object when there is exactly one result.
#[derive(Deserialize)]
#[serde(untagged)]
enum UninstallEntries {
    Many(Vec<UninstallEntry>),
    One(UninstallEntry),
}

/// Applications registered under the Windows Uninstall keys.
///
/// The registry carries no upgrade information of its own. Updates are found
/// by joining against `winget upgrade` by display name, since winget builds its
/// own list from the same keys.
pub struct RegistryAdapter {
    ctx: AdapterContext,
    winget: Arc<WingetAdapter>,
}

impl RegistryAdapter {
    pub fn new(ctx: AdapterContext, winget: Arc<WingetAdapter>) -> Self {
        Self { ctx, winget }
    }
}

#[async_trait]
impl SourceAdapter for RegistryAdapter {
    fn source(&self) -> ItemSource {
        ItemSource::Registry
    }

    fn name(&self) -> &'static str {
        "Windows Registry"
    }

    fn supported_platforms(&self) -> &[Platform] {
        &[Platform::Windows]
    }

    async fn discover(&self) -> Result<Vec<InstalledItem>> {
        if !cfg!(windows) {
            return Ok(Vec::new());
        }

        let spec = self
            .ctx
            .command("powershell")
            .args(["-NoProfile", "-Command", UNINSTALL_QUERY]);
        Ok(self
            .ctx
            .run(spec)
            .await
            .map(|output| parse_uninstall_entries(&output))
            .unwrap_or_default())
    }

    async fn check_updates(&self, items: &mut [InstalledItem]) -> Result<usize> {
        let upgrades = self.winget.list_upgrades().await;
        if upgrades.is_empty() {
            tracing::debug!("no winget upgrade data, registry entries treated as current");
            return Ok(0);
        }

        let by_name: HashMap<String, _> = upgrades
            .iter()
            .map(|row| (row.name.to_lowercase(), row))
            .collect();

        let mut updates = 0;
        for item in items.iter_mut() {
            let Some(row) = by_name.get(&item.name.to_lowercase()) else {
                continue;
            };
            item.source_id = Some(row.id.clone());
            item.record_latest(&row.available);
            if item.has_update() {
                updates += 1;
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

/// Parses the query output, dropping `name|version` duplicates across hives.
fn parse_uninstall_entries(output: &str) -> Vec<InstalledItem> {
    let entries = match serde_json::from_str::<UninstallEntries>(output) {
        Ok(UninstallEntries::Many(entries)) => entries,
        Ok(UninstallEntries::One(entry)) => vec![entry],
        Err(err) => {
            tracing::warn!(error = %err, "unparsable registry query output");
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let mut items: Vec<InstalledItem> = entries
        .into_iter()
        .filter_map(|entry| {
            let name = entry.name.filter(|n| !n.trim().is_empty())?;
            let version = entry.version.filter(|v| !v.trim().is_empty())?;
            if !seen.insert(format!("{name}|{version}")) {
                return None;
            }
            let mut item = InstalledItem::new(name, version, ItemSource::Registry);
            if let Some(location) = entry.install_location.filter(|l| !l.trim().is_empty()) {
                item = item.with_path(location);
            }
            Some(item)
        })
        .collect();

    items.sort_by(|a, b| a.name.cmp(&b.name));
    items
}
