//! Package installation from hosted releases.
//!
//! This module installs the latest release of a repository into the local
//! package root. Components, in pipeline order:
//!
//! - `types`: `RepoRef` parsing, release metadata, requests and outcomes
//! - `gate`: Pre-flight overwrite confirmation (interaction thread)
//! - `release`: `ReleaseProvider` trait and the GitHub implementation
//! - `downloader`: Streaming archive download with progress reporting
//! - `extractor`: Archive extraction (zip, tar.gz) and package folder lookup
//! - `installer`: Replacing `<package_root>/<name>` with the extracted folder
//! - `pipeline`: Sequencing the above off the interaction thread
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use typkg_core::{GateDecision, InstallRequest, InstallerConfig, Pipeline, RepoRef};
//!
//! let pipeline = Arc::new(Pipeline::github(InstallerConfig::from_env()?)?);
//! let url = "https://github.com/acme/widgets";
//! let repo = RepoRef::parse(url)?;
//!
//! if let GateDecision::Proceed { overwrite } = pipeline.gate().check(&repo, |_, _| true) {
//!     let mut pending = pipeline.spawn(&runtime.handle(), InstallRequest::new(repo, url, overwrite));
//!     // ... later, from the UI loop:
//!     if let Some(outcome) = pending.poll() {
//!         println!("{:?}", outcome);
//!     }
//! }
//! ```

pub mod downloader;
pub mod error;
pub mod extractor;
pub mod gate;
pub mod installer;
pub mod pipeline;
pub mod release;
pub mod types;

#[cfg(test)]
mod test_server;

pub use downloader::DownloadProgress;
pub use error::InstallError;
pub use gate::{ConflictGate, GateDecision};
pub use installer::Installer;
pub use pipeline::{PendingInstall, Pipeline};
pub use release::{parse_release, GitHubReleases, ReleaseProvider, DEFAULT_VERSION_LABEL};
pub use types::{ArchiveFormat, InstallOutcome, InstallRequest, ReleaseInfo, RepoRef, Stage};
