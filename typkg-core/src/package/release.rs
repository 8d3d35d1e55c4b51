//! Release lookup and archive retrieval.
//!
//! `ReleaseProvider` is the seam between the pipeline and the hosting
//! service. `GitHubReleases` talks to the GitHub REST API.

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use tracing::{debug, info};

use super::downloader::{download_file, DownloadProgress};
use super::error::InstallError;
use super::types::{ArchiveFormat, ReleaseInfo, RepoRef};
use crate::config::InstallerConfig;

/// Label used when a release has no tag.
pub const DEFAULT_VERSION_LABEL: &str = "latest";

// ============================================================================
// Provider Trait
// ============================================================================

/// A hosting service that publishes releases with source archives.
#[async_trait]
pub trait ReleaseProvider: Send + Sync {
    /// Looks up the latest release of `repo`.
    ///
    /// A release without an archive URL is `Ok` with `archive_url: None`.
    async fn latest_release(&self, repo: &RepoRef) -> Result<ReleaseInfo, InstallError>;

    /// Downloads `url` to `dest`, returning the number of bytes written.
    async fn fetch_archive(
        &self,
        url: &str,
        dest: &Path,
        progress: &(dyn Fn(DownloadProgress) + Send + Sync),
    ) -> Result<u64, InstallError>;
}

// ============================================================================
// GitHub
// ============================================================================

/// Subset of the GitHub release object we read.
#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: Option<String>,
    zipball_url: Option<String>,
}

/// Parses a `releases/latest` response body.
///
/// `zipball_url` always serves a zip, whatever its tag looks like.
pub fn parse_release(body: &str) -> Result<ReleaseInfo, serde_json::Error> {
    let release: GitHubRelease = serde_json::from_str(body)?;

    Ok(ReleaseInfo {
        archive_url: release.zipball_url.filter(|u| !u.trim().is_empty()),
        archive_format: ArchiveFormat::Zip,
        version_label: release
            .tag_name
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_VERSION_LABEL.to_string()),
    })
}

/// Release provider backed by the GitHub REST API.
pub struct GitHubReleases {
    /// Client for API calls; carries the token if one is configured.
    api: reqwest::Client,
    /// Client for archive downloads, which may be served from other hosts.
    downloads: reqwest::Client,
    api_base_url: String,
}

impl GitHubReleases {
    /// Builds the HTTP clients from the installer configuration.
    pub fn new(config: &InstallerConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );

        if let Some(token) = &config.github_token {
            let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))?;
            auth.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth);
        }

        let api = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()?;

        let downloads = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            api,
            downloads,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `GET /repos/{owner}/{repo}/releases/latest`
    pub fn latest_release_url(&self, repo: &RepoRef) -> String {
        format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_base_url,
            repo.namespace(),
            repo.name()
        )
    }
}

#[async_trait]
impl ReleaseProvider for GitHubReleases {
    async fn latest_release(&self, repo: &RepoRef) -> Result<ReleaseInfo, InstallError> {
        let lookup_failed = |reason: String| InstallError::ReleaseLookupFailed {
            repo: repo.to_string(),
            reason,
        };

        let url = self.latest_release_url(repo);
        info!("Querying release API: {}", url);

        let response = self
            .api
            .get(&url)
            .send()
            .await
            .map_err(|e| lookup_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(lookup_failed(format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| lookup_failed(e.to_string()))?;
        let release = parse_release(&body)
            .map_err(|e| lookup_failed(format!("invalid response: {}", e)))?;

        debug!(?release, "Latest release of {}", repo);
        Ok(release)
    }

    async fn fetch_archive(
        &self,
        url: &str,
        dest: &Path,
        progress: &(dyn Fn(DownloadProgress) + Send + Sync),
    ) -> Result<u64, InstallError> {
        download_file(&self.downloads, url, dest, progress)
            .await
            .map_err(|e| InstallError::DownloadFailed {
                url: url.to_string(),
                reason: format!("{:#}", e),
            })
    }
}
