use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for the few operations allowed to fail past a single adapter.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures that propagate to the caller.
///
/// Adapter, parse and command failures never appear here; they are contained
/// as empty results, per-source reports or item statuses.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot create cache directory {}: {source}", path.display())]
    CacheDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("config serialization: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
    #[error("unknown source `{0}`; expected one of winget, chocolatey, npm, pnpm, bun, yarn, pip, path, registry")]
    UnknownSource(String),
    #[error("unknown export format `{0}`; use json or csv")]
    UnknownFormat(String),
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}
