//! Configuration file loading and parsing.
//!
//! This module handles loading the configuration file from disk and parsing
//! it into validated, type-safe structures.
//!
//! # Configuration File Locations
//!
//! The configuration file is searched in the following order:
//!
//! 1. Path given as the `CONFIG_FILE` CLI argument (must exist)
//! 2. Default location, if present:
//!    - **Linux/macOS:** `~/.simple-mcp-server/config.json`
//!    - **Windows:** `%USERPROFILE%\.simple-mcp-server\config.json`
//! 3. Built-in defaults
//!
//! # Example Configuration
//!
//! See `config/example-config.json` for a complete example.

mod settings;

pub use settings::{
    Config, DatabaseConfig, HttpConfig, LoggingConfig, NotificationsConfig, ResourcesConfig,
    TransportMode,
};

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Returns the default configuration directory.
///
/// - **Linux/macOS:** `~/.simple-mcp-server/`
/// - **Windows:** `%USERPROFILE%\.simple-mcp-server\`
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".simple-mcp-server"))
}

/// Returns the platform-specific default configuration file path.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("config.json"))
}

/// Loads the configuration.
///
/// An explicit `path` must exist. Without one, the default location is used
/// when a file is present there, and built-in defaults otherwise.
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly given configuration file cannot be found
/// - The file cannot be read
/// - The JSON is malformed
/// - Any field is invalid
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => match default_config_path().filter(|p| p.exists()) {
            Some(p) => p,
            None => return Ok(Config::default()),
        },
    };

    if !config_path.exists() {
        return Err(ConfigError::NotFound { path: config_path });
    }

    let contents = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;

    let config: Config = serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: config_path.clone(),
        source: e,
    })?;

    config.validate()?;

    Ok(config)
}
