use crate::model::InstalledItem;

const HEADER: &str = "Name,Source,Version,Latest,Status";

pub fn to_csv_string(items: &[InstalledItem]) -> String {
    let mut out = String::from(HEADER);
    out.push_str("\r\n");
    for item in items {
        let fields = [
            item.name.as_str(),
            item.source.display_name(),
            item.version.as_str(),
            item.latest_version.as_str(),
            item.status.label(),
        ];
        let row: Vec<String> = fields.iter().map(|f| quote(f)).collect();
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }
    out
}

/// RFC 4180: quote fields containing a comma, quote or line break.
fn quote(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemSource;

    #[test]
    fn rows_follow_header() {
        let mut item = InstalledItem::new("typescript", "5.3.3", ItemSource::Npm);
        item.record_latest("5.4.2");
        let csv = to_csv_string(&[item]);

        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "typescript,NPM,5.3.3,5.4.2,update available");
    }

    #[test]
    fn quotes_awkward_fields() {
        assert_eq!(quote("Microsoft Visual C++ 2015, x64"), "\"Microsoft Visual C++ 2015, x64\"");
        assert_eq!(quote("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(quote("plain"), "plain");
    }
}
