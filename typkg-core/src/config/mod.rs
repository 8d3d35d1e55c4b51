//! Configuration module for typkg.
//!
//! Configuration is resolved once at startup from the environment.

mod settings;

pub use settings::{ConfigError, InstallerConfig, DEFAULT_API_BASE_URL};
