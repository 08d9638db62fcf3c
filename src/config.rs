//! Configuration file handling.
//!
//! This module provides loading and saving of sysupdate configuration
//! from a TOML file.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/sysupdate/config.toml`
//! - macOS: `~/Library/Application Support/sysupdate/config.toml`
//! - Windows: `%APPDATA%\sysupdate\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_hours = 2
//!
//! [performance]
//! parallel_scan = true
//! max_workers = 6
//!
//! [sources]
//! registry = false
//!
//! [ignore]
//! packages = ["@types/*"]
//! updates = ["python"]
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::model::ItemSource;
use crate::platform::config_dir;

/// Application configuration.
///
/// Missing sections and keys take their defaults, so a partial file is valid.
///
/// # Example
///
/// ```no_run
/// use sysupdate::Config;
///
/// let config = Config::load()?;
/// println!("Cache TTL: {} hours", config.cache.ttl_hours);
/// # Ok::<(), sysupdate::Error>(())
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub performance: PerformanceConfig,
    pub sources: SourcesConfig,
    pub export: ExportConfig,
    pub ignore: IgnoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve a recent scan from disk instead of rescanning.
    ///
    /// Default: true
    pub enabled: bool,

    /// How long a saved scan stays valid, in hours.
    ///
    /// Default: 2 hours
    pub ttl_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_hours: 2,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours * 3600)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Run source discovery concurrently.
    ///
    /// Default: true
    pub parallel_scan: bool,

    /// Upper bound on sources discovered at once.
    ///
    /// Default: 6
    pub max_workers: usize,

    /// Timeout for each discovery or check command, in seconds.
    ///
    /// Default: 45
    pub timeout_seconds: u64,

    /// Timeout for each upgrade command, in seconds.
    ///
    /// Default: 600
    pub upgrade_timeout_seconds: u64,

    /// Timeout for each release lookup over HTTP, in seconds.
    ///
    /// Default: 10
    pub network_timeout_seconds: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            parallel_scan: true,
            max_workers: 6,
            timeout_seconds: 45,
            upgrade_timeout_seconds: 600,
            network_timeout_seconds: 10,
        }
    }
}

impl PerformanceConfig {
    /// Discovery width; 1 when parallel scanning is off.
    pub fn workers(&self) -> usize {
        if self.parallel_scan {
            self.max_workers.max(1)
        } else {
            1
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn upgrade_timeout(&self) -> Duration {
        Duration::from_secs(self.upgrade_timeout_seconds)
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_seconds)
    }
}

/// Per-source switches. All sources are enabled by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub winget: bool,
    pub chocolatey: bool,
    pub npm: bool,
    pub pnpm: bool,
    pub bun: bool,
    pub yarn: bool,
    pub pip: bool,
    pub path: bool,
    pub registry: bool,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            winget: true,
            chocolatey: true,
            npm: true,
            pnpm: true,
            bun: true,
            yarn: true,
            pip: true,
            path: true,
            registry: true,
        }
    }
}

impl SourcesConfig {
    pub fn is_enabled(&self, source: ItemSource) -> bool {
        match source {
            ItemSource::Winget => self.winget,
            ItemSource::Chocolatey => self.chocolatey,
            ItemSource::Npm => self.npm,
            ItemSource::Pnpm => self.pnpm,
            ItemSource::Bun => self.bun,
            ItemSource::Yarn => self.yarn,
            ItemSource::Pip => self.pip,
            ItemSource::Path => self.path,
            ItemSource::Registry => self.registry,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Format used by `scan --export` when none is given: "json" or "csv".
    pub default_format: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_format: "json".to_string(),
        }
    }
}

/// Configuration for ignoring specific packages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Item names dropped from scan results.
    ///
    /// Supports glob patterns (e.g., "lodash*", "@types/*").
    pub packages: Vec<String>,

    /// Item names never upgraded by `update --all`.
    ///
    /// Useful for tools intentionally pinned to older versions.
    pub updates: Vec<String>,
}

impl IgnoreConfig {
    pub fn should_ignore_package(&self, name: &str) -> bool {
        matches_any(&self.packages, name)
    }

    pub fn should_ignore_update(&self, name: &str) -> bool {
        matches_any(&self.updates, name)
    }
}

fn matches_any(patterns: &[String], name: &str) -> bool {
    patterns.iter().any(|pattern| {
        if pattern.contains('*') {
            glob_match(pattern, name)
        } else {
            pattern == name
        }
    })
}

/// Simple glob matching (supports * as wildcard).
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();

    if parts.len() == 1 {
        return pattern == text;
    }

    let mut remaining = text;

    // prefix before the first *
    if !parts[0].is_empty() {
        if !remaining.starts_with(parts[0]) {
            return false;
        }
        remaining = &remaining[parts[0].len()..];
    }

    // suffix after the last *
    let last_part = parts[parts.len() - 1];
    if !last_part.is_empty() {
        if !remaining.ends_with(last_part) {
            return false;
        }
        remaining = &remaining[..remaining.len() - last_part.len()];
    }

    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }

    true
}

impl Config {
    /// Loads configuration from the config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Saves the configuration to the config file.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    pub fn config_path() -> PathBuf {
        config_dir().join("config.toml")
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}
