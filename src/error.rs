//! Error types for simple-mcp-server.
//!
//! Provider errors are rendered verbatim into JSON-RPC error messages, so
//! their `Display` output is part of the wire contract.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Failures raised by resource, tool and prompt providers.
///
/// The dispatcher reports all of these as application errors (`-32000`)
/// carrying the `Display` text.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The addressed note, file, table or prompt does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Arguments did not satisfy the tool's schema, or the tool is unknown.
    #[error("{0}")]
    InvalidArgument(String),

    /// The URI is well formed but no provider handles it.
    #[error("{0}")]
    Unsupported(String),

    /// Reading backing content failed.
    #[error("{context}: {source}")]
    Io {
        /// What was being read.
        context: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors that end a transport session.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The underlying stream failed (broken pipe, reset).
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An outbound message could not be serialised.
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    /// The peer side of the channel has gone away.
    #[error("transport channel closed")]
    Closed,
}
