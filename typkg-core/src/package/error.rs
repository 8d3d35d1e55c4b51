//! Error taxonomy for the install pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Every way a single install invocation can end without success.
///
/// Errors are fatal to the current invocation only. Components return them
/// unchanged and the pipeline routes the first one to the presentation layer.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Could not extract owner/repository from the URL: {url}")]
    InvalidReference { url: String },

    #[error("Release lookup for {repo} failed: {reason}")]
    ReleaseLookupFailed { repo: String, reason: String },

    #[error("The latest release of {repo} has no downloadable source archive ('zipball_url' missing)")]
    NoDownloadableArchive { repo: String },

    #[error("Download of {url} failed: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Could not extract {}: {reason}", archive.display())]
    Extraction { archive: PathBuf, reason: String },

    #[error("Could not find the top-level folder in {}", archive.display())]
    NoTopLevelDirectory { archive: PathBuf },

    #[error("Could not install the package to {}: {reason}", destination.display())]
    InstallMoveFailed { destination: PathBuf, reason: String },
}

impl InstallError {
    /// Whether the user can correct the input and try again in the same session.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidReference { .. } | Self::NoDownloadableArchive { .. }
        )
    }
}
