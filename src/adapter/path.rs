use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use regex::Regex;
use std::sync::LazyLock;

use super::{argv, at_version, AdapterContext, SourceAdapter, LOOKUP_CONCURRENCY};
use crate::checker::extract_version;
use crate::model::{InstalledItem, ItemSource, Platform, ALL_PLATFORMS};

/// Executables probed on `PATH`, in report order.
pub const PATH_TOOLS: [&str; 14] = [
    "node", "npm", "pnpm", "yarn", "python", "git", "go", "bun", "deno", "rustc", "cargo",
    "dotnet", "java", "pwsh",
];

static BUN_RELEASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Bun v([0-9.]+)\s+is out!").expect("valid bun regex"));
static DENO_RELEASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Found latest stable version\s+v?([0-9.]+)").expect("valid deno regex")
});
static GIT_WINDOWS_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v?([0-9.]+?)\.windows").expect("valid git tag regex"));
static WINGET_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Version:\s+([0-9.]+)").expect("valid winget show regex"));
static RUSTUP_AVAILABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"->\s*([0-9][0-9.]*)").expect("valid rustup regex"));

const DOTNET_SDK_ID: &str = "Microsoft.DotNet.SDK.9";
const PWSH_INSTALLER: &str = r#"iex "& { $(irm https://aka.ms/install-powershell.ps1) }""#;

/// Developer tools found directly on `PATH`.
///
/// Each tool has its own way of learning the newest release, and several
/// have none at all, so a check that learns nothing leaves the item
/// `Unknown` rather than declaring it current.
pub struct PathAdapter {
    ctx: AdapterContext,
}

impl PathAdapter {
    pub fn new(ctx: AdapterContext) -> Self {
        Self { ctx }
    }

    async fn probe(&self, tool: &'static str) -> Option<InstalledItem> {
        let location = self.ctx.runner.locate(tool)?;
        let output = self.ctx.run(self.ctx.command(tool).arg("--version")).await?;
        let Some(version) = extract_version(&output) else {
            tracing::debug!(tool, "no version in --version output");
            return None;
        };
        Some(InstalledItem::new(tool, version, ItemSource::Path).with_path(location))
    }

    async fn latest_for(&self, item: &InstalledItem) -> Option<String> {
        let feed = &self.ctx.feed;
        match item.name.as_str() {
            "bun" => {
                let output = self.upgrade_dry_run("bun").await?;
                Some(first_capture(&BUN_RELEASE, &output).unwrap_or_else(|| item.version.clone()))
            }
            "deno" => {
                let output = self.upgrade_dry_run("deno").await?;
                Some(first_capture(&DENO_RELEASE, &output).unwrap_or_else(|| item.version.clone()))
            }
            "npm" | "pnpm" | "yarn" => feed.npm_latest(&item.name).await,
            "node" => feed.github_latest_tag("nodejs/node").await,
            "python" => Some(
                feed.github_latest_tag("python/cpython")
                    .await
                    .unwrap_or_else(|| item.version.clone()),
            ),
            "git" => {
                let tag = feed.github_latest_tag("git-for-windows/git").await?;
                Some(first_capture(&GIT_WINDOWS_TAG, &tag).unwrap_or_else(|| tag.replace('v', "")))
            }
            "pwsh" => {
                let tag = feed.github_latest_tag("PowerShell/PowerShell").await?;
                Some(tag.replace('v', ""))
            }
            "dotnet" => {
                let spec = self
                    .ctx
                    .command("winget")
                    .args(["show", DOTNET_SDK_ID, "--accept-source-agreements"]);
                let output = self.ctx.run(spec).await?;
                first_capture(&WINGET_VERSION, &output)
            }
            "rustc" | "cargo" => {
                let output = self.ctx.run(self.ctx.command("rustup").arg("check")).await?;
                rustup_stable_latest(&output, &item.version)
            }
            _ => None,
        }
    }

    async fn upgrade_dry_run(&self, tool: &str) -> Option<String> {
        let spec = self
            .ctx
            .command(tool)
            .args(["upgrade", "--dry-run"])
            .allow_nonzero_exit()
            .combine_stderr();
        self.ctx.run(spec).await
    }
}

#[async_trait]
impl SourceAdapter for PathAdapter {
    fn source(&self) -> ItemSource {
        ItemSource::Path
    }

    fn name(&self) -> &'static str {
        "PATH Executables"
    }

    fn supported_platforms(&self) -> &[Platform] {
        ALL_PLATFORMS
    }

    fn exhaustive_check(&self) -> bool {
        false
    }

    async fn discover(&self) -> Result<Vec<InstalledItem>> {
        let probes: Vec<_> = PATH_TOOLS.iter().map(|&tool| self.probe(tool)).collect();
        let found: Vec<Option<InstalledItem>> = stream::iter(probes)
            .buffered(LOOKUP_CONCURRENCY)
            .collect()
            .await;
        Ok(found.into_iter().flatten().collect())
    }

    async fn check_updates(&self, items: &mut [InstalledItem]) -> Result<usize> {
        let lookups: Vec<_> = items.iter().map(|item| self.latest_for(item)).collect();
        let latest: Vec<Option<String>> = stream::iter(lookups)
            .buffered(LOOKUP_CONCURRENCY)
            .collect()
            .await;

        let mut updates = 0;
        for (item, latest) in items.iter_mut().zip(latest) {
            let Some(latest) = latest else {
                tracing::debug!(tool = %item.name, "no release information");
                continue;
            };
            item.record_latest(&latest);
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
        match item.name.as_str() {
            "bun" => Some(argv(["bun", "upgrade"])),
            "deno" => {
                let mut cmd = argv(["deno", "upgrade"]);
                if let Some(version) = target_version.filter(|v| !v.is_empty()) {
                    cmd.extend(argv(["--version", version]));
                }
                Some(cmd)
            }
            "git" => Some(argv(["git", "update-git-for-windows", "-y"])),
            "pwsh" => Some(argv(["powershell", "-Command", PWSH_INSTALLER])),
            "npm" | "pnpm" | "yarn" => {
                let package = at_version(&item.name, target_version);
                Some(argv(["npm", "install", "-g", package.as_str()]))
            }
            "rustc" | "cargo" => Some(argv(["rustup", "update", "stable"])),
            _ => None,
        }
    }
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches('.').to_string())
        .filter(|v| !v.is_empty())
}

/// Reads the stable toolchain line of `rustup check`.
fn rustup_stable_latest(output: &str, current: &str) -> Option<String> {
    let line = output.lines().find(|line| line.trim_start().starts_with("stable"))?;
    if line.contains("Update available") {
        first_capture(&RUSTUP_AVAILABLE, line)
    } else if line.contains("Up to date") {
        Some(current.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UpdateStatus;
    use crate::testing::{context, context_with_feed, ScriptedFeed, ScriptedRunner};
    use std::sync::Arc;

    #[tokio::test]
    async fn discovers_only_located_tools_with_versions() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .with_executable("git")
                .with_executable("go")
                .with_executable("java")
                .with_output("git --version", "git version 2.43.0")
                .with_output("go --version", "flag provided but not defined: -version"),
        );
        let items = PathAdapter::new(context(runner)).discover().await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "git");
        assert_eq!(items[0].version, "2.43.0");
        assert_eq!(
            items[0].install_path.as_deref(),
            Some(std::path::Path::new("/usr/bin/git"))
        );
    }

    #[tokio::test]
    async fn bun_dry_run_announces_release() {
        let runner = Arc::new(ScriptedRunner::new().with_output(
            "bun upgrade --dry-run",
            "Bun v1.1.0 is out! You're on v1.0.25",
        ));
        let adapter = PathAdapter::new(context(runner));
        let mut items = vec![InstalledItem::new("bun", "1.0.25", ItemSource::Path)];

        assert_eq!(adapter.check_updates(&mut items).await.unwrap(), 1);
        assert_eq!(items[0].latest_version, "1.1.0");
    }

    #[tokio::test]
    async fn deno_without_announcement_is_current() {
        let runner = Arc::new(
            ScriptedRunner::new().with_output("deno upgrade --dry-run", "Looking up stable version"),
        );
        let adapter = PathAdapter::new(context(runner));
        let mut items = vec![InstalledItem::new("deno", "1.40.2", ItemSource::Path)];

        assert_eq!(adapter.check_updates(&mut items).await.unwrap(), 0);
        assert_eq!(items[0].status, UpdateStatus::UpToDate);
    }

    #[tokio::test]
    async fn git_windows_tag_is_trimmed() {
        let feed = Arc::new(ScriptedFeed::new().with_github("git-for-windows/git", "v2.44.0.windows.1"));
        let adapter = PathAdapter::new(context_with_feed(Arc::new(ScriptedRunner::new()), feed));
        let mut items = vec![InstalledItem::new("git", "2.43.0", ItemSource::Path)];

        adapter.check_updates(&mut items).await.unwrap();
        assert_eq!(items[0].latest_version, "2.44.0");
        assert_eq!(items[0].status, UpdateStatus::UpdateAvailable);
    }

    #[tokio::test]
    async fn tools_without_probe_stay_unknown() {
        let adapter = PathAdapter::new(context(Arc::new(ScriptedRunner::new())));
        let mut items = vec![
            InstalledItem::new("java", "21.0.1", ItemSource::Path),
            InstalledItem::new("go", "1.21.5", ItemSource::Path),
        ];

        assert_eq!(adapter.check_updates(&mut items).await.unwrap(), 0);
        assert!(items.iter().all(|i| i.status == UpdateStatus::Unknown));
    }

    #[tokio::test]
    async fn node_uses_github_releases() {
        let feed = Arc::new(ScriptedFeed::new().with_github("nodejs/node", "v21.6.1"));
        let adapter = PathAdapter::new(context_with_feed(Arc::new(ScriptedRunner::new()), feed.clone()));
        let mut items = vec![InstalledItem::new("node", "20.11.0", ItemSource::Path)];

        assert_eq!(adapter.check_updates(&mut items).await.unwrap(), 1);
        assert_eq!(items[0].latest_version, "21.6.1");
        assert_eq!(feed.lookups(), vec!["github:nodejs/node"]);
    }

    #[test]
    fn rustup_check_lines() {
        let outdated = "stable-x86_64-unknown-linux-gnu - Update available : 1.75.0 (82e1608df 2023-12-21) -> 1.76.0 (07dca489a 2024-02-04)\nrustup - Up to date : 1.26.0";
        assert_eq!(rustup_stable_latest(outdated, "1.75.0").as_deref(), Some("1.76.0"));

        let current = "stable-x86_64-unknown-linux-gnu - Up to date : 1.76.0 (07dca489a 2024-02-04)";
        assert_eq!(rustup_stable_latest(current, "1.76.0").as_deref(), Some("1.76.0"));

        assert_eq!(rustup_stable_latest("rustup - Up to date : 1.26.0", "1.76.0"), None);
    }

    #[test]
    fn upgrade_commands_per_tool() {
        let adapter = PathAdapter::new(context(Arc::new(ScriptedRunner::new())));
        let cmd = |name: &str, target: Option<&str>| {
            adapter.upgrade_command(&InstalledItem::new(name, "1.0.0", ItemSource::Path), target)
        };

        assert_eq!(cmd("bun", Some("1.1.0")).unwrap(), vec!["bun", "upgrade"]);
        assert_eq!(
            cmd("deno", Some("1.41.0")).unwrap(),
            vec!["deno", "upgrade", "--version", "1.41.0"]
        );
        assert_eq!(
            cmd("yarn", Some("1.22.21")).unwrap(),
            vec!["npm", "install", "-g", "yarn@1.22.21"]
        );
        assert_eq!(cmd("cargo", None).unwrap(), vec!["rustup", "update", "stable"]);
        assert!(cmd("java", None).is_none());
        assert!(cmd("node", None).is_none());
    }
}
