//! Model Context Protocol (MCP) server implementation.
//!
//! This module implements the MCP message model over JSON-RPC 2.0 and the
//! two transports it can be served on. The dispatcher never knows which
//! transport it is talking to.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          MCP Server                          │
//! │                                                              │
//! │   ┌──────────────┐    ┌──────────────┐    ┌──────────────┐   │
//! │   │  Transport   │───▶│    Server    │───▶│  Providers   │   │
//! │   │ (stdio/http) │◀───│ (dispatcher) │◀───│ (notes, ...) │   │
//! │   └──────────────┘    └──────────────┘    └──────────────┘   │
//! │          │                   │                               │
//! │          ▼                   ▼                               │
//! │   ┌──────────────────────────────────────────┐               │
//! │   │        JSON-RPC Messages (codec)         │               │
//! │   └──────────────────────────────────────────┘               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2024-11-05.

pub mod protocol;
pub mod server;
pub mod transport;

pub use protocol::{decode, encode, DecodeError, ErrorResponse, Message, MCP_PROTOCOL_VERSION};
pub use server::{McpServer, ServerOptions, SessionState};
pub use transport::{HttpTransport, Inbound, StdioTransport, Transport};
