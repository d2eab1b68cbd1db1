//! simple-mcp-server: a small MCP server for notes, files and database tables
//!
//! The server speaks MCP (JSON-RPC 2.0) over either process stdio or HTTP,
//! where inbound messages are POSTed and outbound messages stream back as
//! server-sent events.
//!
//! # Architecture
//!
//! - **Codec**: strict JSON-RPC 2.0 message classification and encoding
//! - **Transports**: stdio lines, or an HTTP POST + SSE duplex channel
//! - **Dispatcher**: session lifecycle, capability negotiation and routing
//! - **Providers**: notes, a file directory and MySQL tables as resources,
//!   the `add-note` tool and the `summarize-notes` prompt
//!
//! # Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Error types
//! - [`mcp`]: MCP protocol implementation
//! - [`providers`]: Resource, tool and prompt providers

pub mod config;
pub mod error;
pub mod mcp;
pub mod providers;
