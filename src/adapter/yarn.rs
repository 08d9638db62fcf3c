use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use super::{argv, at_version, check_against_npm_registry, AdapterContext, SourceAdapter};
use crate::model::{InstalledItem, ItemSource, Platform, ALL_PLATFORMS};

const YARN: &str = "yarn";

static INFO_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^info "(@?[^@"]+)@([^"]+)""#).expect("valid yarn info regex")
});

pub struct YarnAdapter {
    ctx: AdapterContext,
}

impl YarnAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SourceAdapter for YarnAdapter {
    fn source(&self) -> ItemSource {
        ItemSource::Yarn
    }

    fn name(&self) -> &'static str {
        "Yarn Global Packages"
    }

    fn supported_platforms(&self) -> &[Platform] {
        ALL_PLATFORMS
    }

    async fn discover(&self) -> Result<Vec<InstalledItem>> {
        let spec = self.ctx.command(YARN).args(["global", "list"]);
        Ok(self
            .ctx
            .run(spec)
            .await
            .map(|output| parse_yarn_list(&output))
            .unwrap_or_default())
    }

    async fn check_updates(&self, items: &mut [InstalledItem]) -> Result<usize> {
        Ok(check_against_npm_registry(&self.ctx, items).await)
    }

    fn upgrade_command(
        &self,
        item: &InstalledItem,
        target_version: Option<&str>,
    ) -> Option<Vec<String>> {
        let package = at_version(&item.name, target_version);
        Some(argv([YARN, "global", "add", package.as_str()]))
    }
}

/// Only the `info "<pkg>@<ver>" has binaries:` lines name installed packages.
fn parse_yarn_list(output: &str) -> Vec<InstalledItem> {
    output
        .lines()
        .filter_map(|line| {
            let caps = INFO_LINE.captures(line.trim_start())?;
            let name = caps.get(1)?.as_str();
            let version = caps.get(2)?.as_str();
            Some(InstalledItem::new(name, version, ItemSource::Yarn).with_source_id(name))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, ScriptedRunner};
    use std::sync::Arc;

    const LIST: &str = r#"yarn global v1.22.19
info "@vue/cli@5.0.8" has binaries:
   - vue
info "typescript@5.3.3" has binaries:
   - tsc
   - tsserver
Done in 0.21s.
"#;

    #[tokio::test]
    async fn discovers_packages_from_info_lines() {
        let runner = Arc::new(ScriptedRunner::new().with_output("yarn global list", LIST));
        let items = YarnAdapter::new(context(runner)).discover().await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "@vue/cli");
        assert_eq!(items[0].version, "5.0.8");
        assert_eq!(items[1].name, "typescript");
    }

    #[test]
    fn upgrade_command_uses_global_add() {
        let adapter = YarnAdapter::new(context(Arc::new(ScriptedRunner::new())));
        let item = InstalledItem::new("typescript", "5.3.3", ItemSource::Yarn);
        assert_eq!(
            adapter.upgrade_command(&item, Some("5.4.2")).unwrap(),
            vec!["yarn", "global", "add", "typescript@5.4.2"]
        );
    }
}
