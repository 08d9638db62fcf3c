use regex::Regex;
use std::sync::LazyLock;

use crate::model::strip_version_prefix;

static DOTTED_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+(?:\.\d+)+(?:[-+][0-9A-Za-z][0-9A-Za-z.]*)?").expect("valid version regex")
});

/// Decides whether `candidate` is a newer release than `installed`.
///
/// Versions are opaque strings: both sides lose any non-digit prefix
/// (`v1.2.3`, `go1.21`) and are compared for inequality. A candidate that
/// appears verbatim inside the installed string (`1.2.3` vs `1.2.3.windows.1`)
/// is not new.
pub fn is_update(installed: &str, candidate: &str) -> bool {
    let latest = strip_version_prefix(candidate);
    if latest.is_empty() {
        return false;
    }
    let current = strip_version_prefix(installed);
    latest != current && !installed.contains(latest)
}

/// Extracts the first dotted version (`2.43.0`, `1.2.3-beta.1`) from tool output.
pub fn extract_version(output: &str) -> Option<String> {
    DOTTED_VERSION
        .find(output)
        .map(|m| m.as_str().trim_end_matches('.').to_string())
}
