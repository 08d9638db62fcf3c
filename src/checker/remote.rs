//! Published-version lookups against public HTTP endpoints.
//!
//! Response shapes are third-party contracts; any deviation degrades to
//! `None` for that one lookup.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Default per-request timeout for release lookups.
pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(10);

const NPM_REGISTRY: &str = "https://registry.npmjs.org";
const GITHUB_API: &str = "https://api.github.com";

/// Source of "latest published version" answers.
#[async_trait]
pub trait ReleaseFeed: Send + Sync {
    /// `dist-tags.latest` of an npm package.
    async fn npm_latest(&self, package: &str) -> Option<String>;

    /// `tag_name` of the latest release of a GitHub repository (`owner/repo`).
    async fn github_latest_tag(&self, repo: &str) -> Option<String>;
}

pub struct HttpReleaseFeed {
    client: reqwest::Client,
    npm_registry: String,
    github_api: String,
}

impl HttpReleaseFeed {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sysupdate/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            client,
            npm_registry: NPM_REGISTRY.to_string(),
            github_api: GITHUB_API.to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Option<T> {
        let response = match self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(url, error = %err, "release lookup failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!(url, status = %response.status(), "release lookup rejected");
            return None;
        }

        response.json().await.ok()
    }
}

impl Default for HttpReleaseFeed {
    fn default() -> Self {
        Self::new(DEFAULT_NETWORK_TIMEOUT)
    }
}

#[async_trait]
impl ReleaseFeed for HttpReleaseFeed {
    async fn npm_latest(&self, package: &str) -> Option<String> {
        #[derive(Deserialize)]
        struct NpmPackageInfo {
            #[serde(rename = "dist-tags")]
            dist_tags: Option<DistTags>,
        }

        #[derive(Deserialize)]
        struct DistTags {
            latest: Option<String>,
        }

        let url = format!("{}/{}", self.npm_registry, npm_package_path(package));
        let info: NpmPackageInfo = self.get_json(&url).await?;
        info.dist_tags?.latest.filter(|v| !v.is_empty())
    }

    async fn github_latest_tag(&self, repo: &str) -> Option<String> {
        #[derive(Deserialize)]
        struct Release {
            tag_name: Option<String>,
        }

        let url = format!("{}/repos/{}/releases/latest", self.github_api, repo);
        let release: Release = self.get_json(&url).await?;
        release.tag_name.filter(|t| !t.is_empty())
    }
}

/// Scoped packages keep their `@` but escape the slash.
fn npm_package_path(package: &str) -> String {
    package.replace('/', "%2F")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_package_path_is_escaped() {
        assert_eq!(npm_package_path("@angular/cli"), "@angular%2Fcli");
        assert_eq!(npm_package_path("typescript"), "typescript");
    }
}
