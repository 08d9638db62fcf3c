use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::checker::is_update;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemSource {
    Winget,
    Chocolatey,
    Npm,
    Pnpm,
    Bun,
    Yarn,
    Pip,
    Path,
    Registry,
}

impl ItemSource {
    /// Every source, in the order adapters are registered and checked.
    pub const ALL: [ItemSource; 9] = [
        ItemSource::Winget,
        ItemSource::Chocolatey,
        ItemSource::Npm,
        ItemSource::Pnpm,
        ItemSource::Bun,
        ItemSource::Yarn,
        ItemSource::Pip,
        ItemSource::Path,
        ItemSource::Registry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemSource::Winget => "winget",
            ItemSource::Chocolatey => "chocolatey",
            ItemSource::Npm => "npm",
            ItemSource::Pnpm => "pnpm",
            ItemSource::Bun => "bun",
            ItemSource::Yarn => "yarn",
            ItemSource::Pip => "pip",
            ItemSource::Path => "path",
            ItemSource::Registry => "registry",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ItemSource::Winget => "Winget",
            ItemSource::Chocolatey => "Chocolatey",
            ItemSource::Npm => "NPM",
            ItemSource::Pnpm => "PNPM",
            ItemSource::Bun => "Bun",
            ItemSource::Yarn => "Yarn",
            ItemSource::Pip => "PIP",
            ItemSource::Path => "PATH",
            ItemSource::Registry => "Registry",
        }
    }
}

impl std::fmt::Display for ItemSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for ItemSource {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "winget" => Ok(ItemSource::Winget),
            "chocolatey" | "choco" => Ok(ItemSource::Chocolatey),
            "npm" => Ok(ItemSource::Npm),
            "pnpm" => Ok(ItemSource::Pnpm),
            "bun" => Ok(ItemSource::Bun),
            "yarn" => Ok(ItemSource::Yarn),
            "pip" => Ok(ItemSource::Pip),
            "path" => Ok(ItemSource::Path),
            "registry" => Ok(ItemSource::Registry),
            _ => Err(crate::Error::UnknownSource(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    MacOS,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        #[cfg(target_os = "windows")]
        return Platform::Windows;
        #[cfg(target_os = "macos")]
        return Platform::MacOS;
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        return Platform::Linux;
    }
}

/// Every platform; used by adapters whose tool exists everywhere.
pub const ALL_PLATFORMS: &[Platform] = &[Platform::Linux, Platform::MacOS, Platform::Windows];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    UpToDate,
    UpdateAvailable,
    #[default]
    Unknown,
    Error,
    Vulnerable,
    SecurityUpdateAvailable,
}

impl UpdateStatus {
    pub fn label(&self) -> &'static str {
        match self {
            UpdateStatus::UpToDate => "up to date",
            UpdateStatus::UpdateAvailable => "update available",
            UpdateStatus::Unknown => "unknown",
            UpdateStatus::Error => "error",
            UpdateStatus::Vulnerable => "vulnerable",
            UpdateStatus::SecurityUpdateAvailable => "security update",
        }
    }

    /// True once an adapter has reached a verdict the resolver must not override.
    pub fn is_definitive(&self) -> bool {
        matches!(self, UpdateStatus::UpToDate | UpdateStatus::UpdateAvailable)
    }
}

impl std::fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One package or tool found by a source adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstalledItem {
    pub name: String,
    pub source: ItemSource,
    pub version: String,
    #[serde(default)]
    pub latest_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default)]
    pub status: UpdateStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_path: Option<PathBuf>,
    pub discovered_at: DateTime<Utc>,
}

impl InstalledItem {
    pub fn new(name: impl Into<String>, version: impl Into<String>, source: ItemSource) -> Self {
        Self {
            name: name.into(),
            source,
            version: version.into(),
            latest_version: String::new(),
            source_id: None,
            status: UpdateStatus::Unknown,
            error_message: None,
            install_path: None,
            discovered_at: Utc::now(),
        }
    }

    pub fn with_source_id(mut self, id: impl Into<String>) -> Self {
        self.source_id = Some(id.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.install_path = Some(path.into());
        self
    }

    /// Records the newest published version and derives the status from it.
    ///
    /// `UpdateAvailable` is only ever set here, so it always implies a
    /// non-empty `latest_version` that [`is_update`] accepts.
    pub fn record_latest(&mut self, latest: &str) {
        let latest = strip_version_prefix(latest);
        if latest.is_empty() {
            return;
        }
        self.status = if is_update(&self.version, latest) {
            UpdateStatus::UpdateAvailable
        } else {
            UpdateStatus::UpToDate
        };
        self.latest_version = latest.to_string();
    }

    /// Pins the version a manual update should install.
    ///
    /// The pinned text is kept verbatim for the upgrade command; the status is
    /// re-derived against it. An empty pin changes nothing.
    pub fn pin_target(&mut self, version: impl Into<String>) {
        let version = version.into();
        if version.trim().is_empty() {
            return;
        }
        self.status = if is_update(&self.version, &version) {
            UpdateStatus::UpdateAvailable
        } else {
            UpdateStatus::UpToDate
        };
        self.latest_version = version;
    }

    pub fn has_update(&self) -> bool {
        self.status == UpdateStatus::UpdateAvailable
    }

    /// Identifier handed to the native manager; falls back to the display name.
    pub fn native_id(&self) -> &str {
        self.source_id.as_deref().unwrap_or(&self.name)
    }

    pub fn dedup_key(&self) -> (&str, &str) {
        (&self.name, &self.version)
    }
}

/// Drops any leading non-digit characters (`v1.2`, `go1.21`, `Bun v1.1`).
pub fn strip_version_prefix(version: &str) -> &str {
    version
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .trim()
}
