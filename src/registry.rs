//! Upstream release registry client.
//!
//! Maps a project identifier to its latest published release tag. Every
//! query triggers a fresh upstream call; a cache can wrap the trait without
//! changing the contract.

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::RegistryConfig;
use crate::error::{ResolveError, ServiceError};

/// Lookup of a project's latest published version.
#[async_trait]
pub trait ReleaseResolver: Send + Sync {
    /// Return the latest release tag for `project`.
    async fn latest(&self, project: &str) -> Result<String, ResolveError>;
}

/// Response shape of the latest-release endpoint; only the tag matters.
#[derive(Debug, Deserialize)]
struct LatestRelease {
    tag_name: Option<String>,
}

/// [`ReleaseResolver`] backed by the GitHub releases API.
pub struct GithubReleaseResolver {
    http: reqwest::Client,
    api_url: String,
    owner: String,
    token: Option<String>,
    timeout: Duration,
}

impl GithubReleaseResolver {
    /// Build a resolver from configuration. Anonymous access (no token) is
    /// valid, subject to the registry's rate limits.
    pub fn new(config: &RegistryConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("usage-dns/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            token: config.token.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

#[async_trait]
impl ReleaseResolver for GithubReleaseResolver {
    async fn latest(&self, project: &str) -> Result<String, ResolveError> {
        let url = format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_url, self.owner, project
        );

        let mut request = self
            .http
            .get(&url)
            .header(header::ACCEPT, "application/vnd.github+json")
            .timeout(self.timeout);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|source| ResolveError::Upstream {
            project: project.to_string(),
            source,
        })?;

        match response.status() {
            // 404 covers both "project unknown" and "no releases yet".
            StatusCode::NOT_FOUND => Err(ResolveError::NotFound {
                project: project.to_string(),
            }),
            status if !status.is_success() => Err(ResolveError::Status {
                project: project.to_string(),
                status: status.as_u16(),
            }),
            _ => {
                let release: LatestRelease =
                    response.json().await.map_err(|source| ResolveError::Upstream {
                        project: project.to_string(),
                        source,
                    })?;

                match release.tag_name {
                    Some(tag) if !tag.is_empty() => {
                        debug!(project, tag = %tag, "resolved latest release");
                        Ok(tag)
                    }
                    _ => Err(ResolveError::NoReleases {
                        project: project.to_string(),
                    }),
                }
            }
        }
    }
}
