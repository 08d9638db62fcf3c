use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::model::InstalledItem;

#[derive(Serialize)]
struct ExportDocument<'a> {
    scan_time: DateTime<Utc>,
    total_count: usize,
    items: &'a [InstalledItem],
}

pub fn to_json_string(items: &[InstalledItem], scan_time: DateTime<Utc>) -> Result<String> {
    let document = ExportDocument {
        scan_time,
        total_count: items.len(),
        items,
    };
    Ok(serde_json::to_string_pretty(&document)?)
}
