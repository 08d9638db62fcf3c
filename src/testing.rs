//! Scripted collaborators for unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::adapter::{at_version, AdapterContext, AdapterSet, SourceAdapter};
use crate::checker::ReleaseFeed;
use crate::model::{InstalledItem, ItemSource, Platform, ALL_PLATFORMS};
use crate::process::{CommandRunner, CommandSpec};

/// Replays canned output keyed by the full command line.
#[derive(Default)]
pub struct ScriptedRunner {
    outputs: HashMap<String, String>,
    failed_outputs: HashMap<String, String>,
    on_path: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers output for `command` (argv joined by single spaces).
    pub fn with_output(mut self, command: &str, output: &str) -> Self {
        self.outputs.insert(command.to_string(), output.to_string());
        self
    }

    /// Registers output printed by `command` before it exited non-zero; only
    /// specs that allow a non-zero exit see it.
    pub fn with_failed_output(mut self, command: &str, output: &str) -> Self {
        self.failed_outputs
            .insert(command.to_string(), output.to_string());
        self
    }

    /// Makes `program` resolvable through [`CommandRunner::locate`].
    pub fn with_executable(mut self, program: &str) -> Self {
        self.on_path.insert(program.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Option<String> {
        let command = spec.display();
        self.calls.lock().unwrap().push(command.clone());
        let failed = self
            .failed_outputs
            .get(&command)
            .filter(|_| spec.allow_nonzero_exit);
        self.outputs
            .get(&command)
            .or(failed)
            .map(|out| out.trim().to_string())
            .filter(|out| !out.is_empty())
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        self.on_path
            .contains(program)
            .then(|| PathBuf::from(format!("/usr/bin/{program}")))
    }
}

/// Answers release lookups from fixed tables.
#[derive(Default)]
pub struct ScriptedFeed {
    npm: HashMap<String, String>,
    github: HashMap<String, String>,
    lookups: Mutex<Vec<String>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_npm(mut self, package: &str, version: &str) -> Self {
        self.npm.insert(package.to_string(), version.to_string());
        self
    }

    pub fn with_github(mut self, repo: &str, tag: &str) -> Self {
        self.github.insert(repo.to_string(), tag.to_string());
        self
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReleaseFeed for ScriptedFeed {
    async fn npm_latest(&self, package: &str) -> Option<String> {
        self.lookups.lock().unwrap().push(format!("npm:{package}"));
        self.npm.get(package).cloned()
    }

    async fn github_latest_tag(&self, repo: &str) -> Option<String> {
        self.lookups.lock().unwrap().push(format!("github:{repo}"));
        self.github.get(repo).cloned()
    }
}

/// Adapter context over a scripted runner and an empty feed.
pub fn context(runner: Arc<ScriptedRunner>) -> AdapterContext {
    context_with_feed(runner, Arc::new(ScriptedFeed::new()))
}

pub fn context_with_feed(runner: Arc<ScriptedRunner>, feed: Arc<ScriptedFeed>) -> AdapterContext {
    AdapterContext::new(runner, feed)
}

/// A source adapter driven entirely by its builder.
///
/// Upgrades are `<source> upgrade <name>[@<version>]` unless disabled.
pub struct StubAdapter {
    source: ItemSource,
    exhaustive: bool,
    discovered: Vec<(&'static str, &'static str)>,
    latest: HashMap<&'static str, &'static str>,
    fail_discover: bool,
    panic_discover: bool,
    fail_check: bool,
    upgradable: bool,
}

impl StubAdapter {
    pub fn new(source: ItemSource) -> Self {
        Self {
            source,
            exhaustive: true,
            discovered: Vec::new(),
            latest: HashMap::new(),
            fail_discover: false,
            panic_discover: false,
            fail_check: false,
            upgradable: true,
        }
    }

    pub fn item(mut self, name: &'static str, version: &'static str) -> Self {
        self.discovered.push((name, version));
        self
    }

    pub fn latest(mut self, name: &'static str, version: &'static str) -> Self {
        self.latest.insert(name, version);
        self
    }

    pub fn inexhaustive(mut self) -> Self {
        self.exhaustive = false;
        self
    }

    /// Update checks fail with "registry unreachable".
    pub fn failing(mut self) -> Self {
        self.fail_check = true;
        self
    }

    pub fn failing_discovery(mut self) -> Self {
        self.fail_discover = true;
        self
    }

    pub fn panicking_discovery(mut self) -> Self {
        self.panic_discover = true;
        self
    }

    pub fn not_upgradable(mut self) -> Self {
        self.upgradable = false;
        self
    }
}

#[async_trait]
impl SourceAdapter for StubAdapter {
    fn source(&self) -> ItemSource {
        self.source
    }

    fn name(&self) -> &'static str {
        "Stub"
    }

    fn supported_platforms(&self) -> &[Platform] {
        ALL_PLATFORMS
    }

    fn exhaustive_check(&self) -> bool {
        self.exhaustive
    }

    async fn discover(&self) -> anyhow::Result<Vec<InstalledItem>> {
        if self.panic_discover {
            panic!("stub discovery panicked");
        }
        if self.fail_discover {
            anyhow::bail!("malformed output");
        }
        Ok(self
            .discovered
            .iter()
            .map(|(name, version)| InstalledItem::new(*name, *version, self.source))
            .collect())
    }

    async fn check_updates(&self, items: &mut [InstalledItem]) -> anyhow::Result<usize> {
        if self.fail_check {
            anyhow::bail!("registry unreachable");
        }
        for item in items.iter_mut() {
            if let Some(latest) = self.latest.get(item.name.as_str()) {
                item.record_latest(latest);
            }
        }
        Ok(items.iter().filter(|i| i.has_update()).count())
    }

    fn upgrade_command(
        &self,
        item: &InstalledItem,
        target_version: Option<&str>,
    ) -> Option<Vec<String>> {
        if !self.upgradable {
            return None;
        }
        Some(vec![
            self.source.as_str().to_string(),
            "upgrade".to_string(),
            at_version(&item.name, target_version),
        ])
    }
}

pub fn stub_set(adapters: Vec<StubAdapter>) -> AdapterSet {
    AdapterSet::from_adapters(
        adapters
            .into_iter()
            .map(|a| Arc::new(a) as Arc<dyn SourceAdapter>)
            .collect(),
    )
}
