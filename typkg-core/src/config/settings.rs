//! Installer configuration.
//!
//! Everything here is fixed for the lifetime of the process. The package root
//! is derived from the platform's user data directory:
//!
//! - Linux: `~/.local/share/typst/packages/local`
//! - macOS: `~/Library/Application Support/typst/packages/local`
//! - Windows: `%APPDATA%\typst\packages\local`

use std::path::{Path, PathBuf};

use thiserror::Error;

/// GitHub REST API root.
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Environment variable holding an optional GitHub token.
const GITHUB_TOKEN_VAR: &str = "GITHUB_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine the user data directory for this platform")]
    NoDataDir,
}

// =============================================================================
// Installer Configuration
// =============================================================================

/// Process-wide installer settings, injected into the pipeline at construction.
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    /// Directory holding one subdirectory per installed package.
    pub package_root: PathBuf,

    /// Base URL of the release API.
    pub api_base_url: String,

    /// User-Agent sent with every request (GitHub rejects requests without one).
    pub user_agent: String,

    /// Bearer token for the release API, if any.
    pub github_token: Option<String>,

    /// Parent directory for scoped working directories. `None` uses the OS temp dir.
    pub scratch_dir: Option<PathBuf>,
}

impl InstallerConfig {
    /// Create a configuration rooted at an explicit package directory.
    pub fn new(package_root: impl Into<PathBuf>) -> Self {
        Self {
            package_root: package_root.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            user_agent: format!("typkg/{}", crate::VERSION),
            github_token: None,
            scratch_dir: None,
        }
    }

    /// Resolve the configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
        let mut config = Self::new(Self::package_root_under(&data_dir));

        config.github_token = std::env::var(GITHUB_TOKEN_VAR)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Ok(config)
    }

    /// Typst's local package namespace below a user data directory.
    pub fn package_root_under(data_dir: &Path) -> PathBuf {
        data_dir.join("typst").join("packages").join("local")
    }

    pub fn with_package_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.package_root = root.into();
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }
}
