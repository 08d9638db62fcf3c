//! Cross-platform path resolution.
//!
//! Locations of sysupdate's own files, plus executable lookup on `PATH`
//! (honouring `PATHEXT` on Windows so `npm` resolves to `npm.cmd`).

use std::ffi::OsString;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "sysupdate";

/// Returns the cache directory for sysupdate.
///
/// Platform-specific locations:
/// - Linux: `~/.cache/sysupdate/`
/// - macOS: `~/Library/Caches/sysupdate/`
/// - Windows: `%LOCALAPPDATA%\sysupdate\`
///
/// Falls back to the system temp directory if no cache directory can be determined.
pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

/// Returns the configuration directory for sysupdate.
///
/// - Linux: `~/.config/sysupdate/`
/// - macOS: `~/Library/Application Support/sysupdate/`
/// - Windows: `%APPDATA%\sysupdate\`
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Finds `program` on `PATH`, returning the first executable match.
///
/// Names containing a path separator are checked as given.
pub fn find_executable(program: &str) -> Option<PathBuf> {
    if program.trim().is_empty() {
        return None;
    }

    if program.contains('/') || program.contains('\\') {
        let path = PathBuf::from(program);
        return is_executable(&path).then_some(path);
    }

    let path_var = std::env::var_os("PATH")?;
    let extensions = executable_extensions();

    std::env::split_paths(&path_var).find_map(|dir| {
        extensions.iter().find_map(|ext| {
            let mut file_name = OsString::from(program);
            file_name.push(ext);
            let candidate = dir.join(file_name);
            is_executable(&candidate).then_some(candidate)
        })
    })
}

#[cfg(windows)]
fn executable_extensions() -> Vec<String> {
    let pathext = std::env::var("PATHEXT").unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string());
    std::iter::once(String::new())
        .chain(
            pathext
                .split(';')
                .filter(|ext| !ext.is_empty())
                .map(|ext| ext.to_lowercase()),
        )
        .collect()
}

#[cfg(not(windows))]
fn executable_extensions() -> Vec<String> {
    vec![String::new()]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_program_is_not_found() {
        assert!(find_executable("").is_none());
        assert!(find_executable("   ").is_none());
    }

    #[test]
    fn missing_program_is_not_found() {
        assert!(find_executable("sysupdate-no-such-tool-xyz").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn finds_shell_on_path() {
        let sh = find_executable("sh").expect("sh should be on PATH");
        assert!(sh.ends_with("sh"));
    }

    #[test]
    fn app_dirs_end_with_app_name() {
        assert!(cache_dir().ends_with(APP_DIR));
        assert!(config_dir().ends_with(APP_DIR));
    }
}
