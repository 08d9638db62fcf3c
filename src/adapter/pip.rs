use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use super::{argv, python_command, AdapterContext, SourceAdapter};
use crate::model::{InstalledItem, ItemSource, Platform, ALL_PLATFORMS};

pub struct PipAdapter {
    ctx: AdapterContext,
}

#[derive(Deserialize)]
struct PipPackage {
    name: String,
    version: String,
    #[serde(default)]
    latest_version: Option<String>,
}

impl PipAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }

    async fn pip_list(&self, outdated: bool) -> Option<Vec<PipPackage>> {
        let mut spec = self.ctx.command(python_command()).args(["-m", "pip", "list"]);
        if outdated {
            spec = spec.arg("--outdated").allow_nonzero_exit();
        }
        let output = self.ctx.run(spec.arg("--format=json")).await?;

        match serde_json::from_str(&output) {
            Ok(packages) => Some(packages),
            Err(err) => {
                tracing::warn!(error = %err, outdated, "unparsable pip list output");
                None
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for PipAdapter {
    fn source(&self) -> ItemSource {
        ItemSource::Pip
    }

    fn name(&self) -> &'static str {
        "PIP Packages"
    }

    fn supported_platforms(&self) -> &[Platform] {
        ALL_PLATFORMS
    }

    async fn discover(&self) -> Result<Vec<InstalledItem>> {
        Ok(self
            .pip_list(false)
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|pkg| InstalledItem::new(&pkg.name, pkg.version, ItemSource::Pip).with_source_id(pkg.name))
            .collect())
    }

    async fn check_updates(&self, items: &mut [InstalledItem]) -> Result<usize> {
        let Some(outdated) = self.pip_list(true).await else {
            return Ok(0);
        };

        let mut updates = 0;
        for pkg in &outdated {
            let Some(latest) = pkg.latest_version.as_deref() else {
                continue;
            };
            // pip normalizes case in some outputs but not others
            for item in items
                .iter_mut()
                .filter(|i| i.name.eq_ignore_ascii_case(&pkg.name))
            {
                item.record_latest(latest);
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
        let mut cmd = argv([python_command(), "-m", "pip", "install"]);
        match target_version.filter(|v| !v.is_empty()) {
            Some(version) => cmd.push(format!("{}=={version}", item.name)),
            None => {
                cmd.push(item.name.clone());
                cmd.push("--upgrade".to_string());
            }
        }
        Some(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UpdateStatus;
    use crate::testing::{context, ScriptedRunner};
    use std::sync::Arc;

    fn list_cmd(extra: &str) -> String {
        format!("{} -m pip list{extra} --format=json", python_command())
    }

    #[tokio::test]
    async fn discovers_and_checks_packages() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .with_output(
                    &list_cmd(""),
                    r#"[{"name":"requests","version":"2.31.0"},{"name":"PyYAML","version":"6.0.1"}]"#,
                )
                .with_output(
                    &list_cmd(" --outdated"),
                    r#"[{"name":"requests","version":"2.31.0","latest_version":"2.32.3","latest_filetype":"wheel"}]"#,
                ),
        );
        let adapter = PipAdapter::new(context(runner));

        let mut items = adapter.discover().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].name, "PyYAML");

        assert_eq!(adapter.check_updates(&mut items).await.unwrap(), 1);
        assert_eq!(items[0].latest_version, "2.32.3");
        assert_eq!(items[0].status, UpdateStatus::UpdateAvailable);
        assert_eq!(items[1].status, UpdateStatus::Unknown);
    }

    #[tokio::test]
    async fn garbage_output_is_contained() {
        let runner = Arc::new(ScriptedRunner::new().with_output(&list_cmd(""), "ERROR: no pip"));
        assert!(PipAdapter::new(context(runner)).discover().await.unwrap().is_empty());
    }

    #[test]
    fn upgrade_command_pins_or_upgrades() {
        let adapter = PipAdapter::new(context(Arc::new(ScriptedRunner::new())));
        let item = InstalledItem::new("requests", "2.31.0", ItemSource::Pip);

        let pinned = adapter.upgrade_command(&item, Some("2.32.3")).unwrap();
        assert_eq!(pinned[1..], ["-m", "pip", "install", "requests==2.32.3"]);

        let latest = adapter.upgrade_command(&item, None).unwrap();
        assert_eq!(latest[1..], ["-m", "pip", "install", "requests", "--upgrade"]);
    }
}
