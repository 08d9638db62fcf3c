use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use super::{argv, at_version, check_against_npm_registry, AdapterContext, SourceAdapter};
use crate::model::{InstalledItem, ItemSource, Platform, ALL_PLATFORMS};

const BUN: &str = "bun";

// `├── @scope/name@1.2.3`, tree glyphs optional
static PACKAGE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(@?[^\s@]+)@(\S+)\s*$").expect("valid bun package regex")
});

pub struct BunAdapter {
    ctx: AdapterContext,
}

impl BunAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SourceAdapter for BunAdapter {
    fn source(&self) -> ItemSource {
        ItemSource::Bun
    }

    fn name(&self) -> &'static str {
        "Bun Global Packages"
    }

    fn supported_platforms(&self) -> &[Platform] {
        ALL_PLATFORMS
    }

    async fn discover(&self) -> Result<Vec<InstalledItem>> {
        let spec = self.ctx.command(BUN).args(["pm", "ls", "-g"]);
        Ok(self
            .ctx
            .run(spec)
            .await
            .map(|output| parse_bun_list(&output))
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
        Some(argv([BUN, "add", "-g", package.as_str()]))
    }
}

fn parse_bun_list(output: &str) -> Vec<InstalledItem> {
    output
        .lines()
        .filter_map(|line| {
            let caps = PACKAGE_LINE.captures(line)?;
            let name = caps.get(1)?.as_str();
            let version = caps.get(2)?.as_str();
            Some(InstalledItem::new(name, version, ItemSource::Bun).with_source_id(name))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UpdateStatus;
    use crate::testing::{context, context_with_feed, ScriptedFeed, ScriptedRunner};
    use std::sync::Arc;

    const LIST: &str = "\
/home/dev/.bun/install/global node_modules (3)
├── @biomejs/biome@1.4.1
├── prettier@3.1.1
└── typescript@5.3.3
";

    #[test]
    fn parses_tree_output_with_scoped_names() {
        let items = parse_bun_list(LIST);
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["@biomejs/biome", "prettier", "typescript"]);
        assert_eq!(items[0].version, "1.4.1");
    }

    #[tokio::test]
    async fn checks_each_item_against_registry() {
        let feed = Arc::new(
            ScriptedFeed::new()
                .with_npm("prettier", "3.2.0")
                .with_npm("typescript", "5.3.3"),
        );
        let adapter = BunAdapter::new(context_with_feed(Arc::new(ScriptedRunner::new()), feed.clone()));
        let mut items = vec![
            InstalledItem::new("prettier", "3.1.1", ItemSource::Bun),
            InstalledItem::new("typescript", "5.3.3", ItemSource::Bun),
            InstalledItem::new("left-pad", "1.3.0", ItemSource::Bun),
        ];

        assert_eq!(adapter.check_updates(&mut items).await.unwrap(), 1);
        assert_eq!(items[0].status, UpdateStatus::UpdateAvailable);
        assert_eq!(items[1].status, UpdateStatus::UpToDate);
        assert_eq!(items[2].status, UpdateStatus::Unknown);
        assert_eq!(feed.lookups().len(), 3);
    }

    #[test]
    fn upgrade_command_adds_globally() {
        let adapter = BunAdapter::new(context(Arc::new(ScriptedRunner::new())));
        let item = InstalledItem::new("prettier", "3.1.1", ItemSource::Bun);
        assert_eq!(
            adapter.upgrade_command(&item, None).unwrap(),
            vec!["bun", "add", "-g", "prettier"]
        );
    }
}
