use anyhow::Result;
use async_trait::async_trait;

use super::{argv, AdapterContext, SourceAdapter};
use crate::model::{InstalledItem, ItemSource, Platform};

const CHOCO: &str = "choco";

pub struct ChocolateyAdapter {
    ctx: AdapterContext,
}

impl ChocolateyAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SourceAdapter for ChocolateyAdapter {
    fn source(&self) -> ItemSource {
        ItemSource::Chocolatey
    }

    fn name(&self) -> &'static str {
        "Chocolatey Packages"
    }

    fn supported_platforms(&self) -> &[Platform] {
        &[Platform::Windows]
    }

    async fn discover(&self) -> Result<Vec<InstalledItem>> {
        let spec = self
            .ctx
            .command(CHOCO)
            .args(["list", "--local-only", "--limit-output"]);
        Ok(self
            .ctx
            .run(spec)
            .await
            .map(|output| parse_choco_list(&output))
            .unwrap_or_default())
    }

    async fn check_updates(&self, items: &mut [InstalledItem]) -> Result<usize> {
        let spec = self.ctx.command(CHOCO).args(["outdated", "--limit-output"]);
        let Some(output) = self.ctx.run(spec).await else {
            return Ok(0);
        };

        let mut updates = 0;
        for (name, available) in parse_choco_outdated(&output) {
            for item in items.iter_mut().filter(|i| i.name == name) {
                item.record_latest(available);
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
        let mut cmd = argv([CHOCO, "upgrade", item.name.as_str(), "-y"]);
        if let Some(version) = target_version.filter(|v| !v.is_empty()) {
            cmd.extend(argv(["--version", version]));
        }
        Some(cmd)
    }
}

/// `name|version` per line.
fn parse_choco_list(output: &str) -> Vec<InstalledItem> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split('|').map(str::trim).filter(|p| !p.is_empty());
            let name = parts.next()?;
            let version = parts.next()?;
            Some(InstalledItem::new(name, version, ItemSource::Chocolatey).with_source_id(name))
        })
        .collect()
}

/// `name|current|available|pinned` per line.
fn parse_choco_outdated(output: &str) -> Vec<(&str, &str)> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('|').map(str::trim).collect();
            match parts.as_slice() {
                [name, _current, available, ..] if !name.is_empty() && !available.is_empty() => {
                    Some((*name, *available))
                }
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UpdateStatus;
    use crate::testing::{context, ScriptedRunner};
    use std::sync::Arc;

    #[test]
    fn parses_limit_output_list() {
        let items = parse_choco_list("git|2.43.0\nnodejs-lts|20.10.0\nChocolatey v2.2.2\n\n");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "git");
        assert_eq!(items[0].version, "2.43.0");
        assert_eq!(items[1].source_id.as_deref(), Some("nodejs-lts"));
    }

    #[tokio::test]
    async fn outdated_rows_update_matching_items() {
        let runner = Arc::new(ScriptedRunner::new().with_output(
            "choco outdated --limit-output",
            "git|2.43.0|2.44.0|false\nbroken-line\n",
        ));
        let adapter = ChocolateyAdapter::new(context(runner));
        let mut items = vec![
            InstalledItem::new("git", "2.43.0", ItemSource::Chocolatey),
            InstalledItem::new("7zip", "23.1.0", ItemSource::Chocolatey),
        ];

        assert_eq!(adapter.check_updates(&mut items).await.unwrap(), 1);
        assert_eq!(items[0].status, UpdateStatus::UpdateAvailable);
        assert_eq!(items[0].latest_version, "2.44.0");
        assert_eq!(items[1].status, UpdateStatus::Unknown);
    }

    #[test]
    fn upgrade_command_with_and_without_target() {
        let adapter = ChocolateyAdapter::new(context(Arc::new(ScriptedRunner::new())));
        let item = InstalledItem::new("git", "2.43.0", ItemSource::Chocolatey);
        assert_eq!(
            adapter.upgrade_command(&item, None).unwrap(),
            vec!["choco", "upgrade", "git", "-y"]
        );
        assert_eq!(
            adapter.upgrade_command(&item, Some("2.44.0")).unwrap(),
            vec!["choco", "upgrade", "git", "-y", "--version", "2.44.0"]
        );
    }
}
