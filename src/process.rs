//! External command execution.
//!
//! Every adapter talks to its package manager through a [`CommandRunner`].
//! The runner collapses all failure modes (missing executable, timeout,
//! non-zero exit, empty output) into `None`, so callers treat "tool absent"
//! and "tool too slow" identically.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::platform::find_executable;

/// Default timeout for discovery and check commands.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);

/// One command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    pub allow_nonzero_exit: bool,
    pub combine_stderr: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            allow_nonzero_exit: false,
            combine_stderr: false,
        }
    }

    /// Builds a spec from a full argv; `None` when argv is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone()).args(args.iter().cloned()))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Return captured output even when the process exits non-zero.
    pub fn allow_nonzero_exit(mut self) -> Self {
        self.allow_nonzero_exit = true;
        self
    }

    /// Append stderr to stdout in the returned text, one newline between them.
    pub fn combine_stderr(mut self) -> Self {
        self.combine_stderr = true;
        self
    }

    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    pub fn display(&self) -> String {
        self.argv().join(" ")
    }
}

/// Runs external commands on behalf of adapters and the dispatcher.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the command and returns its trimmed output, or `None` if it is
    /// missing, timed out, exited non-zero (unless allowed) or printed nothing.
    async fn run(&self, spec: &CommandSpec) -> Option<String>;

    /// Locates an executable on PATH.
    fn locate(&self, program: &str) -> Option<PathBuf>;
}

/// Runs real processes with `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> Option<String> {
        let program = self
            .locate(&spec.program)
            .unwrap_or_else(|| PathBuf::from(&spec.program));

        let child = Command::new(&program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(spec.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                tracing::debug!(command = %spec.display(), error = %err, "command could not be started");
                return None;
            }
            Err(_) => {
                tracing::warn!(
                    command = %spec.display(),
                    timeout_secs = spec.timeout.as_secs(),
                    "command timed out"
                );
                return None;
            }
        };

        if !output.status.success() && !spec.allow_nonzero_exit {
            tracing::debug!(
                command = %spec.display(),
                status = ?output.status.code(),
                "command exited unsuccessfully"
            );
            return None;
        }

        let stdout = decode_lossy(&output.stdout);
        let text = if spec.combine_stderr {
            format!("{}\n{}", stdout.trim_end(), decode_lossy(&output.stderr).trim())
        } else {
            stdout
        };

        non_empty(text.trim())
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        find_executable(program)
    }
}

/// Decodes UTF-8, dropping undecodable bytes instead of failing.
pub fn decode_lossy(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_drops_invalid_bytes() {
        let bytes = b"caf\xff\xfe\xc3\xa9 ok";
        assert_eq!(decode_lossy(bytes), "café ok");
    }

    #[test]
    fn spec_builder_collects_argv() {
        let spec = CommandSpec::new("npm")
            .args(["outdated", "-g"])
            .arg("--json")
            .allow_nonzero_exit();
        assert_eq!(spec.argv(), vec!["npm", "outdated", "-g", "--json"]);
        assert!(spec.allow_nonzero_exit);
        assert!(!spec.combine_stderr);
        assert_eq!(spec.display(), "npm outdated -g --json");
    }

    #[test]
    fn from_argv_rejects_empty() {
        assert!(CommandSpec::from_argv(&[]).is_none());
        let spec = CommandSpec::from_argv(&["bun".to_string(), "upgrade".to_string()]).unwrap();
        assert_eq!(spec.program, "bun");
        assert_eq!(spec.args, vec!["upgrade"]);
    }

    #[tokio::test]
    async fn missing_executable_yields_none() {
        let spec = CommandSpec::new("sysupdate-definitely-not-installed").arg("--version");
        assert!(SystemRunner.run(&spec).await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_none_unless_allowed() {
        let failing = CommandSpec::new("sh").args(["-c", "echo partial; exit 3"]);
        assert!(SystemRunner.run(&failing).await.is_none());

        let allowed = failing.clone().allow_nonzero_exit();
        assert_eq!(SystemRunner.run(&allowed).await.as_deref(), Some("partial"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn combine_stderr_appends_stderr() {
        let spec = CommandSpec::new("sh")
            .args(["-c", "echo out; echo err 1>&2"])
            .combine_stderr();
        assert_eq!(SystemRunner.run(&spec).await.as_deref(), Some("out\nerr"));

        let stderr_only = CommandSpec::new("sh")
            .args(["-c", "echo err 1>&2; exit 1"])
            .allow_nonzero_exit()
            .combine_stderr();
        assert_eq!(SystemRunner.run(&stderr_only).await.as_deref(), Some("err"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_yields_none() {
        let spec = CommandSpec::new("sh")
            .args(["-c", "sleep 5"])
            .timeout(Duration::from_millis(100));
        assert!(SystemRunner.run(&spec).await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn empty_output_is_none() {
        let spec = CommandSpec::new("sh").args(["-c", "true"]);
        assert!(SystemRunner.run(&spec).await.is_none());
    }
}
