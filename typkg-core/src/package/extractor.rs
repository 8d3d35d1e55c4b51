//! Archive extraction for downloaded release archives.
//!
//! This module unpacks zip and tar.gz archives into the pipeline's working
//! directory and locates the single top-level folder that becomes the
//! installed package.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::error::InstallError;
use super::types::ArchiveFormat;

// ============================================================================
// Package Extraction
// ============================================================================

/// Unpacks `archive_path` into `work_dir` and returns the extracted package folder.
///
/// Source archives from GitHub wrap everything in one folder named after the
/// commit (`acme-widgets-1a2b3c4/`). When several top-level folders exist the
/// first one in file-name order is used.
pub fn extract_package(
    archive_path: &Path,
    work_dir: &Path,
    format: ArchiveFormat,
) -> Result<PathBuf, InstallError> {
    extract_archive(archive_path, work_dir, format).map_err(|e| InstallError::Extraction {
        archive: archive_path.to_path_buf(),
        reason: format!("{:#}", e),
    })?;

    find_top_level_dir(work_dir)
        .map_err(|e| InstallError::Extraction {
            archive: archive_path.to_path_buf(),
            reason: format!("{:#}", e),
        })?
        .ok_or_else(|| InstallError::NoTopLevelDirectory {
            archive: archive_path.to_path_buf(),
        })
}

/// Returns the first immediate child directory of `dir`, by file name.
fn find_top_level_dir(dir: &Path) -> Result<Option<PathBuf>> {
    let mut candidates = Vec::new();

    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            candidates.push(entry.path());
        }
    }

    candidates.sort();

    if candidates.len() > 1 {
        warn!(
            "Archive has {} top-level folders, using {}",
            candidates.len(),
            candidates[0].display()
        );
    }

    Ok(candidates.into_iter().next())
}

// ============================================================================
// Archive Extraction
// ============================================================================

/// Extracts an archive to a destination directory.
///
/// # Errors
///
/// Returns an error if the archive cannot be read or an entry cannot be written.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path, format: ArchiveFormat) -> Result<()> {
    info!(
        "Extracting {:?} archive {} to {}",
        format,
        archive_path.display(),
        dest_dir.display()
    );

    fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create directory: {}", dest_dir.display()))?;

    match format {
        ArchiveFormat::Zip => extract_zip(archive_path, dest_dir),
        ArchiveFormat::TarGz => extract_tar_gz(archive_path, dest_dir),
    }
}

// ============================================================================
// ZIP Extraction
// ============================================================================

fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open zip: {}", archive_path.display()))?;

    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read zip: {}", archive_path.display()))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => path.to_owned(),
            None => {
                warn!("Skipping unsafe path in zip: {}", entry.name());
                continue;
            }
        };

        let dest_path = dest_dir.join(&entry_path);

        if entry.is_dir() {
            fs::create_dir_all(&dest_path)?;
        } else {
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut outfile = File::create(&dest_path)
                .with_context(|| format!("Failed to create: {}", dest_path.display()))?;

            io::copy(&mut entry, &mut outfile)?;

            #[cfg(unix)]
            set_unix_permissions(&dest_path, entry.unix_mode())?;
        }
    }

    debug!("ZIP extraction complete");
    Ok(())
}

// ============================================================================
// TAR.GZ Extraction
// ============================================================================

fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open tar.gz: {}", archive_path.display()))?;

    let decoder = flate2::read::GzDecoder::new(BufReader::new(file));
    extract_tar(decoder, dest_dir)
}

fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let entry_type = entry.header().entry_type();

        // Links could point outside dest_dir
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            warn!("Skipping symlink/hardlink in tar archive");
            continue;
        }

        let path = entry.path()?.into_owned();

        if path.is_absolute()
            || path
                .components()
                .any(|c| c == std::path::Component::ParentDir)
        {
            warn!("Skipping unsafe path in tar: {:?}", path);
            continue;
        }

        let dest_path = dest_dir.join(&path);

        if entry_type.is_dir() {
            fs::create_dir_all(&dest_path)?;
        } else if entry_type.is_file() {
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut outfile = File::create(&dest_path)
                .with_context(|| format!("Failed to create: {}", dest_path.display()))?;
            io::copy(&mut entry, &mut outfile)?;
            outfile.flush()?;

            #[cfg(unix)]
            {
                if let Ok(mode) = entry.header().mode() {
                    set_unix_permissions(&dest_path, Some(mode))?;
                }
            }
        } else {
            debug!("Skipping tar entry of type {:?}: {:?}", entry_type, path);
        }
    }

    debug!("TAR extraction complete");
    Ok(())
}

// ============================================================================
// Unix Permissions
// ============================================================================

#[cfg(unix)]
fn set_unix_permissions(path: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if let Some(mode) = mode {
        if mode & 0o111 != 0 {
            let permissions = fs::Permissions::from_mode(mode | 0o755);
            fs::set_permissions(path, permissions)
                .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
        }
    }

    Ok(())
}
