//! Places an extracted package into the package root.
//!
//! Replacement is remove-then-move and therefore not crash-safe: a failure
//! after the old package was removed leaves no package at the destination.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::error::InstallError;

/// Moves extracted packages to `<package_root>/<name>`.
#[derive(Debug, Clone)]
pub struct Installer {
    package_root: PathBuf,
}

impl Installer {
    pub fn new(package_root: impl Into<PathBuf>) -> Self {
        Self {
            package_root: package_root.into(),
        }
    }

    pub fn package_root(&self) -> &Path {
        &self.package_root
    }

    /// Final location of a package with the given name.
    pub fn destination_for(&self, name: &str) -> PathBuf {
        self.package_root.join(name)
    }

    /// Installs `extracted` as package `name`, returning the destination path.
    ///
    /// An existing destination is always replaced. `overwrite` records whether
    /// the caller confirmed that; an unconfirmed replacement is logged.
    pub fn install(
        &self,
        extracted: &Path,
        name: &str,
        overwrite: bool,
    ) -> Result<PathBuf, InstallError> {
        let destination = self.destination_for(name);
        let failed = |reason: String| InstallError::InstallMoveFailed {
            destination: destination.clone(),
            reason,
        };

        fs::create_dir_all(&self.package_root).map_err(|e| {
            failed(format!(
                "could not create package root {}: {}",
                self.package_root.display(),
                e
            ))
        })?;

        if destination.symlink_metadata().is_ok() {
            if !overwrite {
                warn!(
                    "Replacing {} without confirmation; it appeared after the conflict check",
                    destination.display()
                );
            }

            info!("Removing existing package at {}", destination.display());
            remove_path(&destination)
                .map_err(|e| failed(format!("could not remove existing package: {}", e)))?;
        }

        move_dir(extracted, &destination).map_err(|e| failed(e.to_string()))?;

        info!("Package installed to {}", destination.display());
        Ok(destination)
    }
}

/// Removes a directory tree, or a plain file/symlink occupying the path.
fn remove_path(path: &Path) -> io::Result<()> {
    if path.symlink_metadata()?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Renames `src` to `dest`, copying across filesystems when rename fails.
fn move_dir(src: &Path, dest: &Path) -> io::Result<()> {
    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(
                "Rename {} -> {} failed ({}), falling back to copy",
                src.display(),
                dest.display(),
                e
            );

            if let Err(copy_err) = copy_dir_all(src, dest) {
                // Don't leave a half-copied package behind
                if let Err(cleanup_err) = fs::remove_dir_all(dest) {
                    warn!(
                        "Failed to clean up partial copy at {}: {}",
                        dest.display(),
                        cleanup_err
                    );
                }
                return Err(copy_err);
            }

            fs::remove_dir_all(src)
        }
    }
}

fn copy_dir_all(src: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir_all(dest)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}
