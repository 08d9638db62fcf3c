//! Fixed-width table parsing for managers that print aligned text tables.
//!
//! Column widths depend on content, so spans are derived from the header
//! line: each column runs from its header offset to the next column's.
//! Offsets are counted in characters, not bytes.

use std::collections::HashMap;

/// Lines between the header and the first data row (the `-----` rule).
const SEPARATOR_LINES: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    fields: HashMap<&'static str, String>,
}

impl TableRow {
    /// Non-empty trimmed value of `column`.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug)]
struct Layout {
    /// Start offset of every header column, requested or not, ascending.
    boundaries: Vec<usize>,
    /// Requested column name and its index into `boundaries`.
    columns: Vec<(&'static str, usize)>,
}

impl Layout {
    /// Builds a layout if `header` names every `required` column in order.
    ///
    /// Every header word bounds the column before it, so a column the caller
    /// does not read still ends the span of the one it follows.
    fn from_header(
        header: &str,
        required: &[&'static str],
        optional: &[&'static str],
    ) -> Option<Self> {
        let tokens = header_tokens(header);
        let index_of = |name: &str| tokens.iter().position(|(token, _)| *token == name);

        let mut columns = Vec::with_capacity(required.len() + optional.len());
        let mut last = None;
        for name in required {
            let index = index_of(name)?;
            if last.is_some_and(|prev| index <= prev) {
                return None;
            }
            last = Some(index);
            columns.push((*name, index));
        }
        for name in optional {
            if let Some(index) = index_of(name) {
                columns.push((*name, index));
            }
        }

        let mut boundaries: Vec<usize> = tokens.iter().map(|(_, offset)| *offset).collect();
        if let Some(first) = boundaries.first_mut() {
            *first = 0;
        }
        Some(Self {
            boundaries,
            columns,
        })
    }

    /// Slices `line` into fields; `None` if text runs across a column boundary,
    /// which only happens for prose such as a trailing summary line.
    fn slice(&self, line: &str) -> Option<TableRow> {
        let chars: Vec<char> = line.chars().collect();
        let straddles = self
            .boundaries
            .iter()
            .any(|&start| start > 0 && start < chars.len() && !chars[start - 1].is_whitespace());
        if straddles {
            return None;
        }

        let mut fields = HashMap::with_capacity(self.columns.len());

        for &(name, index) in &self.columns {
            let start = self.boundaries[index].min(chars.len());
            let end = self
                .boundaries
                .get(index + 1)
                .copied()
                .unwrap_or(chars.len())
                .min(chars.len());
            let value: String = if start < end {
                chars[start..end].iter().collect()
            } else {
                String::new()
            };
            fields.insert(name, value.trim().to_string());
        }

        Some(TableRow { fields })
    }
}

/// Whitespace-separated words of a header with their character offsets.
fn header_tokens(header: &str) -> Vec<(&str, usize)> {
    let mut tokens = Vec::new();
    let mut start: Option<(usize, usize)> = None;

    for (char_idx, (byte_idx, c)) in header.char_indices().enumerate() {
        match (c.is_whitespace(), start) {
            (false, None) => start = Some((byte_idx, char_idx)),
            (true, Some((byte_start, char_start))) => {
                tokens.push((&header[byte_start..byte_idx], char_start));
                start = None;
            }
            _ => {}
        }
    }
    if let Some((byte_start, char_start)) = start {
        tokens.push((&header[byte_start..], char_start));
    }
    tokens
}

/// Keeps only what a terminal would show after carriage returns.
///
/// Progress spinners redraw with `\r`, leaving junk before the real text.
fn visible_line(raw: &str) -> &str {
    let line = raw.strip_suffix('\r').unwrap_or(raw);
    match line.rfind('\r') {
        Some(pos) => &line[pos + 1..],
        None => line,
    }
}

/// Parses every data row of the first table whose header names `required`
/// columns in order. Rows missing any required field are dropped.
pub fn parse_table(
    output: &str,
    required: &[&'static str],
    optional: &[&'static str],
) -> Vec<TableRow> {
    let lines: Vec<&str> = output.lines().map(visible_line).collect();

    let Some((header_idx, layout)) = lines.iter().enumerate().find_map(|(idx, line)| {
        Layout::from_header(line, required, optional).map(|layout| (idx, layout))
    }) else {
        return Vec::new();
    };

    lines
        .iter()
        .skip(header_idx + 1 + SEPARATOR_LINES)
        .filter(|line| !line.trim().is_empty() && !line.starts_with('-'))
        .filter_map(|line| layout.slice(line))
        .filter(|row| required.iter().all(|column| row.get(column).is_some()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: &str = "\
Name                       Id                      Version      Available   Source
-----------------------------------------------------------------------------------
Git                        Git.Git                 2.43.0       2.44.0      winget
Microsoft Visual Studio C… Microsoft.VisualStudioC 1.86.2                   winget
7-Zip 23.01 (x64)          7zip.7zip               23.01
";

    #[test]
    fn slices_rows_by_header_offsets() {
        let rows = parse_table(LIST, &["Name", "Id", "Version"], &["Available", "Source"]);
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].get("Name"), Some("Git"));
        assert_eq!(rows[0].get("Id"), Some("Git.Git"));
        assert_eq!(rows[0].get("Version"), Some("2.43.0"));
        assert_eq!(rows[0].get("Available"), Some("2.44.0"));
        assert_eq!(rows[0].get("Source"), Some("winget"));

        assert_eq!(rows[1].get("Name"), Some("Microsoft Visual Studio C…"));
        assert_eq!(rows[1].get("Available"), None);

        assert_eq!(rows[2].get("Id"), Some("7zip.7zip"));
        assert_eq!(rows[2].get("Source"), None);
    }

    #[test]
    fn strips_spinner_noise_before_header() {
        let output = format!("   - \r   \\ \r{LIST}");
        let rows = parse_table(&output, &["Name", "Id", "Version"], &[]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("Name"), Some("Git"));
    }

    #[test]
    fn crlf_line_endings_are_tolerated() {
        let output = LIST.replace('\n', "\r\n");
        let rows = parse_table(&output, &["Name", "Id", "Version"], &[]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("Version"), Some("2.43.0"));
    }

    #[test]
    fn unrequested_columns_still_bound_spans() {
        let output = "\
Name      Id          Version   Match           Source
-------------------------------------------------------
Node.js   OpenJS.Node 20.11.0   Moniker: node   winget
";
        let rows = parse_table(output, &["Name", "Id", "Version"], &["Source"]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Version"), Some("20.11.0"));
        assert_eq!(rows[0].get("Source"), Some("winget"));
        assert_eq!(rows[0].get("Match"), None);
    }

    #[test]
    fn rows_missing_required_fields_are_dropped() {
        let output = "\
Name      Id        Version
---------------------------
Good      Good.Id   1.0
NoId
3 upgrades available.
";
        let rows = parse_table(output, &["Name", "Id", "Version"], &[]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Id"), Some("Good.Id"));
    }

    #[test]
    fn header_must_name_columns_in_order() {
        let output = "Version  Id  Name\n-----\n1.0  X  Y\n";
        assert!(parse_table(output, &["Name", "Id", "Version"], &[]).is_empty());
    }

    #[test]
    fn missing_header_yields_nothing() {
        assert!(parse_table("No installed package found.", &["Name", "Id"], &[]).is_empty());
    }

    #[test]
    fn multibyte_names_keep_alignment() {
        let output = "\
Name      Id        Version
---------------------------
Café Ünï  Cafe.App  1.2.3
";
        let rows = parse_table(output, &["Name", "Id", "Version"], &[]);
        assert_eq!(rows[0].get("Name"), Some("Café Ünï"));
        assert_eq!(rows[0].get("Id"), Some("Cafe.App"));
        assert_eq!(rows[0].get("Version"), Some("1.2.3"));
    }
}
