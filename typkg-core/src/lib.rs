//! typkg Core Library
//!
//! This crate provides the core functionality for typkg, a small installer
//! that places the latest GitHub release of a Typst package into the local
//! package directory. It includes:
//!
//! - Configuration resolved from the environment
//! - Repository URL parsing and release lookup
//! - Archive download and extraction
//! - Conflict detection and package placement
//! - A pipeline coordinator that runs installs off the UI thread

pub mod config;
pub mod package;

// Re-exports for convenience
pub use config::{ConfigError, InstallerConfig, DEFAULT_API_BASE_URL};

pub use package::{
    ArchiveFormat, ConflictGate, DownloadProgress, GateDecision, GitHubReleases, InstallError,
    InstallOutcome, InstallRequest, Installer, PendingInstall, Pipeline, ReleaseInfo,
    ReleaseProvider, RepoRef, Stage,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
