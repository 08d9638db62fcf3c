//! Update checking.
//!
//! - [`is_update`] - the one rule deciding whether a candidate version is new
//! - [`ReleaseFeed`] - published-version lookups over HTTP
//! - [`UpdateResolver`] - runs each source's check and reconciles statuses

mod remote;
mod resolver;
mod version;

pub use remote::{HttpReleaseFeed, ReleaseFeed, DEFAULT_NETWORK_TIMEOUT};
pub use resolver::{reconcile, UpdateResolver};
pub use version::{extract_version, is_update};
