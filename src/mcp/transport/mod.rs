//! Transports carrying MCP messages between the dispatcher and a client.
//!
//! Two implementations share the [`Transport`] trait:
//!
//! - [`StdioTransport`]: newline-delimited JSON over stdin/stdout
//! - [`HttpTransport`]: `POST /mcp` for inbound messages, an SSE stream at
//!   `GET /mcp/stream` for outbound ones
//!
//! A transport instance serves exactly one session and cannot be restarted.

pub mod http;
pub mod stdio;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::mcp::protocol::{DecodeError, Message};

/// One inbound item: a decoded message, or the reason it failed to decode.
pub type Inbound = Result<Message, DecodeError>;

/// A bidirectional message channel to a single client.
#[async_trait]
pub trait Transport: Send {
    /// Delivers a message to the peer.
    ///
    /// May suspend while the outbound path applies backpressure.
    ///
    /// # Errors
    ///
    /// Any error is fatal to the session.
    async fn send(&mut self, message: &Message) -> Result<(), TransportError>;

    /// Waits for the next inbound message.
    ///
    /// Returns `Ok(None)` once the channel has closed.
    ///
    /// # Errors
    ///
    /// Any error is fatal to the session.
    async fn recv(&mut self) -> Result<Option<Inbound>, TransportError>;
}
