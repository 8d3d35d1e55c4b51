//! Async archive downloader with progress reporting.
//!
//! This module provides streaming download functionality using reqwest,
//! with progress callbacks and URL validation. A download is a single
//! attempt: there is no retry and no timeout.

use anyhow::{Context, Result};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use super::types::ArchiveFormat;

// ============================================================================
// URL Validation
// ============================================================================

/// Rejects anything that is not a plain HTTP(S) URL with a host.
pub(crate) fn validate_url(url_str: &str) -> Result<()> {
    let url = Url::parse(url_str).with_context(|| format!("Invalid URL: {}", url_str))?;

    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("URL must use HTTP(S): {}", url_str);
    }

    if url.host_str().is_none() {
        anyhow::bail!("URL must have a host: {}", url_str);
    }

    Ok(())
}

// ============================================================================
// Download Progress
// ============================================================================

/// Progress information during a download.
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    /// Bytes downloaded so far.
    pub bytes_downloaded: u64,
    /// Total bytes expected (if known from Content-Length header).
    pub total_bytes: Option<u64>,
    /// Progress percentage (0.0 to 100.0), or None if total is unknown.
    pub percent: Option<f32>,
}

impl DownloadProgress {
    pub(crate) fn new(bytes_downloaded: u64, total_bytes: Option<u64>) -> Self {
        let percent = total_bytes.map(|total| {
            if total > 0 {
                (bytes_downloaded as f32 / total as f32) * 100.0
            } else {
                0.0
            }
        });

        Self {
            bytes_downloaded,
            total_bytes,
            percent,
        }
    }
}

// ============================================================================
// Archive File Naming
// ============================================================================

/// Builds `<name>-<version>.<ext>` inside the working directory.
///
/// Release tags may contain characters that are not valid in file names
/// (e.g. `release/1.0`); those are replaced with `-`.
pub fn archive_path(work_dir: &Path, name: &str, version: &str, format: ArchiveFormat) -> PathBuf {
    let version: String = version
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();

    work_dir.join(format!("{}-{}.{}", name, version, format.extension()))
}

// ============================================================================
// Download Function
// ============================================================================

/// Downloads a file from a URL with streaming and progress reporting.
///
/// Returns the total number of bytes written.
///
/// # Errors
///
/// Returns an error if:
/// - The URL is not HTTP(S).
/// - The network request fails.
/// - The server returns a non-success status code.
/// - The file cannot be created or written.
pub async fn download_file<F>(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    progress_cb: F,
) -> Result<u64>
where
    F: Fn(DownloadProgress),
{
    info!("Downloading {} to {}", url, dest.display());

    validate_url(url)?;

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to start download from {}", url))?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!(
            "Download failed with status {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown error")
        );
    }

    let total_bytes = response.content_length();
    debug!("Content-Length: {:?}", total_bytes);

    let mut file = File::create(dest)
        .await
        .with_context(|| format!("Failed to create file: {}", dest.display()))?;

    let mut stream = response.bytes_stream();
    let mut bytes_downloaded: u64 = 0;

    progress_cb(DownloadProgress::new(0, total_bytes));

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.context("Failed to read chunk from response stream")?;

        file.write_all(&chunk)
            .await
            .context("Failed to write chunk to file")?;

        bytes_downloaded += chunk.len() as u64;
        progress_cb(DownloadProgress::new(bytes_downloaded, total_bytes));
    }

    file.flush().await.context("Failed to flush file")?;

    info!(
        "Download complete: {} bytes written to {}",
        bytes_downloaded,
        dest.display()
    );

    Ok(bytes_downloaded)
}
