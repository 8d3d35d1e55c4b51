//! Core types for the install pipeline.
//!
//! This module defines the values that flow between pipeline components:
//! repository references, release metadata, install requests, and outcomes.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;
use url::Url;

use super::error::InstallError;

// ============================================================================
// Repository Reference
// ============================================================================

/// The `(namespace, name)` identity of a hosted repository.
///
/// Both fields are always non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    namespace: String,
    name: String,
}

impl RepoRef {
    /// Parses a repository URL such as `https://github.com/acme/widgets`.
    ///
    /// The first two non-empty path segments, percent-decoded, become
    /// namespace and name. Query strings, fragments, trailing slashes and a
    /// trailing `.git` on the name are ignored. Only `http`/`https` URLs are
    /// accepted, and both segments must be usable as a single directory name.
    pub fn parse(input: &str) -> Result<Self, InstallError> {
        let invalid = || InstallError::InvalidReference {
            url: input.to_string(),
        };

        let url = Url::parse(input.trim()).map_err(|_| invalid())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid());
        }

        let mut segments = url
            .path()
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| percent_decode_str(s).decode_utf8().map(|d| d.into_owned()));

        let namespace = segments.next().ok_or_else(invalid)?.map_err(|_| invalid())?;
        let name = segments.next().ok_or_else(invalid)?.map_err(|_| invalid())?;
        let name = name.strip_suffix(".git").unwrap_or(&name).to_string();

        if !is_plain_dir_name(&namespace) || !is_plain_dir_name(&name) {
            return Err(invalid());
        }

        Ok(Self { namespace, name })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Repository name; also the installed package's directory name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// True if `segment` names exactly one directory below its parent on every
/// platform: no separators, drive prefixes, dot segments or reserved characters.
fn is_plain_dir_name(segment: &str) -> bool {
    if segment.is_empty() || segment.ends_with('.') || segment.ends_with(' ') {
        return false;
    }

    if segment.chars().any(|c| {
        c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
    }) {
        return false;
    }

    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// ============================================================================
// Release Metadata
// ============================================================================

/// Supported source archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    /// File extension used for the downloaded archive.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
        }
    }
}

/// The latest release of a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    /// Source archive URL. `None` means the release has nothing to download.
    pub archive_url: Option<String>,
    /// Format of the archive behind `archive_url`, known from the field it came from.
    pub archive_format: ArchiveFormat,
    /// Tag of the release, `"latest"` when the API omits it.
    pub version_label: String,
}

// ============================================================================
// Requests and Outcomes
// ============================================================================

/// One unit of work submitted to the pipeline.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub repo: RepoRef,
    pub source_url: String,
    /// Set by the conflict gate when the user agreed to replace an existing package.
    pub overwrite: bool,
}

impl InstallRequest {
    pub fn new(repo: RepoRef, source_url: impl Into<String>, overwrite: bool) -> Self {
        Self {
            repo,
            source_url: source_url.into(),
            overwrite,
        }
    }
}

/// Pipeline stage, for logging and status display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolving,
    LookingUpRelease,
    Downloading,
    Extracting,
    Installing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Resolving => "resolving",
            Self::LookingUpRelease => "looking up release",
            Self::Downloading => "downloading",
            Self::Extracting => "extracting",
            Self::Installing => "installing",
        };
        f.write_str(label)
    }
}

/// Final result of one invocation, handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Success {
        package_name: String,
        destination: PathBuf,
    },
    Failure {
        message: String,
        /// True when the session should stay open for another attempt.
        recoverable: bool,
    },
}

impl InstallOutcome {
    pub fn from_result(repo: &RepoRef, result: Result<PathBuf, InstallError>) -> Self {
        match result {
            Ok(destination) => Self::Success {
                package_name: repo.name().to_string(),
                destination,
            },
            Err(e) => Self::Failure {
                message: e.to_string(),
                recoverable: e.is_recoverable(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}
