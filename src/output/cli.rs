use std::collections::BTreeMap;
use std::time::Duration;

use tabled::{settings::Style, Table, Tabled};

use crate::model::{InstalledItem, ItemSource, UpdateStatus};

#[derive(Tabled)]
struct ItemRow {
    #[tabled(rename = "Package")]
    name: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Latest")]
    latest: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&InstalledItem> for ItemRow {
    fn from(item: &InstalledItem) -> Self {
        Self {
            name: truncate(&item.name, 40),
            source: item.source.display_name().to_string(),
            version: format_version(&item.version),
            latest: format_version(&item.latest_version),
            status: item.status.label().to_string(),
        }
    }
}

/// Figures shown under the item table.
#[derive(Debug, Clone)]
pub struct ScanSummary<'a> {
    pub items: &'a [InstalledItem],
    pub update_count: usize,
    pub elapsed: Duration,
    pub from_cache: bool,
}

impl ScanSummary<'_> {
    fn vulnerable(&self) -> usize {
        self.items
            .iter()
            .filter(|i| {
                matches!(
                    i.status,
                    UpdateStatus::Vulnerable | UpdateStatus::SecurityUpdateAvailable
                )
            })
            .count()
    }

    fn by_source(&self) -> BTreeMap<ItemSource, usize> {
        let mut counts = BTreeMap::new();
        for item in self.items {
            *counts.entry(item.source).or_default() += 1;
        }
        counts
    }
}

pub fn print_items_table(items: &[InstalledItem]) {
    println!();
    if items.is_empty() {
        println!("No packages found.");
        return;
    }

    let rows: Vec<ItemRow> = items.iter().map(ItemRow::from).collect();
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

pub fn print_summary(summary: &ScanSummary<'_>) {
    println!();
    println!("Summary:");
    println!("  Total packages: {}", summary.items.len());

    let by_source = summary.by_source();
    if by_source.len() > 1 {
        let parts: Vec<String> = by_source
            .iter()
            .map(|(source, count)| format!("{} {}", count, source.display_name()))
            .collect();
        println!("  By source: {}", parts.join(", "));
    }

    println!("  Updates available: {}", summary.update_count);
    let vulnerable = summary.vulnerable();
    if vulnerable > 0 {
        println!("  Vulnerable: {}", vulnerable);
    }

    let origin = if summary.from_cache { " (cached)" } else { "" };
    println!("  Elapsed: {:.1}s{}", summary.elapsed.as_secs_f64(), origin);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

fn format_version(version: &str) -> String {
    if version.is_empty() {
        "-".to_string()
    } else {
        version.to_string()
    }
}
