//! Presentation and export of checked items.
//!
//! - [`print_items_table`] / [`print_summary`] - terminal rendering
//! - [`export`] - JSON or CSV files

mod cli;
mod csv;
mod json;

pub use cli::{print_items_table, print_summary, ScanSummary};

use chrono::{DateTime, Local, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::model::InstalledItem;

/// File format for `scan --export`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// `{scan_time, total_count, items}` document
    Json,
    /// `Name,Source,Version,Latest,Status` rows
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}

/// Renders `items` in `format` without touching the filesystem.
pub fn format_export(
    items: &[InstalledItem],
    format: ExportFormat,
    scan_time: DateTime<Utc>,
) -> Result<String> {
    match format {
        ExportFormat::Json => json::to_json_string(items, scan_time),
        ExportFormat::Csv => Ok(csv::to_csv_string(items)),
    }
}

/// `sysupdate_<YYYYmmdd_HHMMSS>.<ext>`, stamped in local time.
pub fn default_export_name(format: ExportFormat, at: DateTime<Local>) -> String {
    format!(
        "sysupdate_{}.{}",
        at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// Writes `items` to `path`, or to a timestamped file in the working
/// directory, and returns where it went.
pub fn export(
    items: &[InstalledItem],
    format: ExportFormat,
    scan_time: DateTime<Utc>,
    path: Option<&Path>,
) -> Result<PathBuf> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(default_export_name(format, Local::now())),
    };
    let content = format_export(items, format, scan_time)?;
    fs::write(&path, content)?;
    tracing::info!(path = %path.display(), items = items.len(), "exported");
    Ok(path)
}
