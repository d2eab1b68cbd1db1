//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::ConfigError;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Transport to serve on. Overridden by `--mode` / `MCP_SERVER_MODE`.
    #[serde(default)]
    pub mode: Option<TransportMode>,

    /// HTTP transport settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Resource source settings.
    #[serde(default)]
    pub resources: ResourcesConfig,

    /// MySQL connection. Absent means no database resources.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Server-initiated notification settings.
    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.queue_capacity == 0 {
            return Err(ConfigError::ValidationError {
                message: "http.queue_capacity must be at least 1".to_string(),
            });
        }

        if self.http.bind.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid http.bind address '{}'. Expected host:port, e.g. 0.0.0.0:8000",
                    self.http.bind
                ),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                ),
            });
        }

        if let Some(ref db) = self.database {
            if db.host.is_empty() || db.database.is_empty() {
                return Err(ConfigError::ValidationError {
                    message: "database.host and database.database must not be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    /// The transport to run, given an optional command-line override.
    #[must_use]
    pub fn effective_mode(&self, cli: Option<TransportMode>) -> TransportMode {
        cli.or(self.mode).unwrap_or_default()
    }
}

/// Which transport the server speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Newline-delimited JSON over stdin/stdout.
    #[default]
    Stdio,
    /// `POST /mcp` plus an SSE stream at `GET /mcp/stream`.
    Http,
}

/// HTTP transport configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    /// Listen address.
    /// Default: "0.0.0.0:8000"
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Capacity of each of the inbound and outbound message queues.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

const fn default_queue_capacity() -> usize {
    crate::mcp::transport::http::DEFAULT_QUEUE_CAPACITY
}

/// Resource source configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourcesConfig {
    /// Directory whose regular files are exposed as `file://local/...`.
    #[serde(default)]
    pub files_dir: Option<PathBuf>,

    /// Seed an `example` note the first time an empty store is listed.
    #[serde(default)]
    pub seed_example_note: bool,
}

/// MySQL connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Server host name.
    #[serde(default = "default_db_host")]
    pub host: String,

    /// Server port.
    #[serde(default = "default_db_port")]
    pub port: u16,

    /// User name.
    #[serde(default = "default_db_user")]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Database whose tables are listed.
    pub database: String,

    /// Seconds to wait for a connection before giving up.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_db_host() -> String {
    "localhost".to_string()
}

const fn default_db_port() -> u16 {
    3306
}

fn default_db_user() -> String {
    "root".to_string()
}

const fn default_connect_timeout() -> u64 {
    2
}

/// Server-initiated notification configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationsConfig {
    /// Offer `resourceListChanged` notifications to clients.
    #[serde(default = "default_true")]
    pub resource_list_changed: bool,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            resource_list_changed: default_true(),
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
