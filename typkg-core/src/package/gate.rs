//! Pre-flight overwrite confirmation.
//!
//! Runs on the interaction thread before any network I/O. The prompt itself is
//! supplied by the caller so the GUI can show a native dialog and tests can
//! answer programmatically.

use std::path::{Path, PathBuf};

use tracing::info;

use super::types::RepoRef;

/// Result of the conflict check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Start the pipeline. `overwrite` is true if an existing package will be replaced.
    Proceed { overwrite: bool },
    /// The user declined; do nothing.
    Abort,
}

#[derive(Debug, Clone)]
pub struct ConflictGate {
    package_root: PathBuf,
}

impl ConflictGate {
    pub fn new(package_root: impl Into<PathBuf>) -> Self {
        Self {
            package_root: package_root.into(),
        }
    }

    /// Checks whether `repo` is already installed and, if so, asks `confirm`.
    ///
    /// `confirm` receives the repository and the existing destination and
    /// blocks until the user answers. It is not called when nothing exists.
    pub fn check<F>(&self, repo: &RepoRef, confirm: F) -> GateDecision
    where
        F: FnOnce(&RepoRef, &Path) -> bool,
    {
        let destination = self.package_root.join(repo.name());

        if destination.symlink_metadata().is_err() {
            return GateDecision::Proceed { overwrite: false };
        }

        if confirm(repo, &destination) {
            info!(repo = %repo, "Overwrite of {} confirmed", destination.display());
            GateDecision::Proceed { overwrite: true }
        } else {
            info!(repo = %repo, "Installation cancelled by user");
            GateDecision::Abort
        }
    }
}
