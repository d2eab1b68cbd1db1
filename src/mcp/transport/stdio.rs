//! stdio transport for MCP server.
//!
//! This module implements the stdio transport as specified by MCP:
//!
//! - Messages are UTF-8 encoded JSON-RPC
//! - Messages are delimited by newlines
//! - Messages must not contain embedded newlines
//! - stdin: receives messages from client
//! - stdout: sends messages to client
//! - stderr: may be used for logging (not MCP messages)
//!
//! The reader and writer are generic so the same framing can run over any
//! async byte stream, which is how the tests drive it.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::TransportError;
use crate::mcp::protocol::{decode_slice, encode, Message};
use crate::mcp::transport::{Inbound, Transport};

/// A line-delimited MCP transport, by default over the process's stdio.
pub struct StdioTransport<R = BufReader<tokio::io::Stdin>, W = tokio::io::Stdout> {
    /// Buffered reader for inbound lines.
    reader: R,
    /// Sink for outbound lines.
    writer: W,
}

impl StdioTransport {
    /// Creates a new stdio transport.
    #[must_use]
    pub fn new() -> Self {
        Self::with_io(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Creates a transport over an arbitrary reader/writer pair.
    pub const fn with_io(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Reads the next message line as raw bytes.
    ///
    /// Returns `None` if the input is closed (EOF). Bytes are not checked
    /// for UTF-8 here; the codec reports invalid text as a parse error.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    pub async fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        let bytes_read = self.reader.read_until(b'\n', &mut line).await?;

        if bytes_read == 0 {
            // EOF - stdin closed
            return Ok(None);
        }

        // Remove the trailing newline
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }

        Ok(Some(line))
    }

    /// Writes a raw JSON string with newline termination and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    async fn write_raw(&mut self, json: &str) -> io::Result<()> {
        // MCP stdio framing forbids embedded newlines
        debug_assert!(
            !json.contains('\n'),
            "JSON message must not contain embedded newlines"
        );

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }
}

#[async_trait]
impl<R, W> Transport for StdioTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        let json = encode(message)?;
        self.write_raw(&json).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Inbound>, TransportError> {
        loop {
            let Some(line) = self.read_line().await? else {
                return Ok(None);
            };
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(Some(decode_slice(&line)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::{ErrorResponse, RequestId, Response};
    use tokio::io::AsyncReadExt;

    #[test]
    fn transport_default() {
        // Just ensure Default is implemented and doesn't panic
        let _transport = StdioTransport::default();
    }

    #[tokio::test]
    async fn recv_skips_blank_lines_and_handles_crlf() {
        let input: &[u8] = b"\n  \r\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\r\n";
        let mut transport = StdioTransport::with_io(input, Vec::new());

        let msg = transport.recv().await.unwrap().unwrap().unwrap();
        assert_eq!(msg.method(), Some("ping"));
        assert!(transport.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recv_surfaces_decode_errors_without_closing() {
        let input: &[u8] = b"garbage\n{\"jsonrpc\":\"2.0\",\"method\":\"x\"}\n";
        let mut transport = StdioTransport::with_io(input, Vec::new());

        assert!(transport.recv().await.unwrap().unwrap().is_err());
        assert!(transport.recv().await.unwrap().unwrap().is_ok());
    }

    #[tokio::test]
    async fn invalid_utf8_line_is_answered_and_session_continues() {
        use crate::mcp::server::{McpServer, ServerOptions, SessionState};
        use crate::providers::Workspace;

        let (client, server_io) = tokio::io::duplex(4096);
        let (server_read, server_write) = tokio::io::split(server_io);
        let transport = StdioTransport::with_io(BufReader::new(server_read), server_write);
        let mut server = McpServer::new(transport, Workspace::new(), ServerOptions::default());

        let (mut client_read, mut client_write) = tokio::io::split(client);
        let input: &[u8] = b"{\"jsonrpc\":\"2.0\",\"id\":0,\"method\":\"initialize\"}\n\
            \xff\xfe garbage\n\
            {\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n";
        client_write.write_all(input).await.unwrap();
        client_write.shutdown().await.unwrap();

        server.run().await.unwrap();
        assert_eq!(server.state(), SessionState::Closed);
        drop(server);

        let mut written = String::new();
        client_read.read_to_string(&mut written).await.unwrap();
        let replies: Vec<serde_json::Value> = written
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0]["id"], 0);
        assert_eq!(replies[1]["id"], serde_json::Value::Null);
        assert_eq!(replies[1]["error"]["code"], -32700);
        assert_eq!(replies[2]["id"], 1);
        assert_eq!(replies[2]["result"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn send_writes_one_line_per_message() {
        let (client, server) = tokio::io::duplex(1024);
        let mut transport = StdioTransport::with_io(BufReader::new(tokio::io::empty()), server);

        let response = Message::Response(Response::new(
            RequestId::from(1),
            serde_json::json!({
                "message": "hello world",
                "nested": {"key": "value"}
            }),
        ));
        transport.send(&response).await.unwrap();
        let error = Message::Error(ErrorResponse::method_not_found(
            RequestId::from(2),
            "test/method",
        ));
        transport.send(&error).await.unwrap();
        drop(transport);

        let mut written = String::new();
        let mut client = client;
        client.read_to_string(&mut written).await.unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#""id":1"#));
        assert!(lines[1].contains(r#""code":-32601"#));
    }

    #[tokio::test]
    async fn send_to_closed_pipe_is_an_error() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);
        let mut transport = StdioTransport::with_io(BufReader::new(tokio::io::empty()), server);

        let response = Message::Response(Response::new(RequestId::from(1), serde_json::json!({})));
        let err = transport.send(&response).await.unwrap_err();
        assert!(matches!(err, TransportError::Io(_)));
    }

    #[tokio::test]
    async fn exchange_with_scripted_peer() {
        let peer = tokio_test::io::Builder::new()
            .read(b"{\"jsonrpc\":\"2.0\",\"id\":7,\"method\":\"ping\"}\n")
            .write(b"{\"jsonrpc\":\"2.0\",\"id\":7,\"result\":{}}\n")
            .build();
        let (reader, writer) = tokio::io::split(peer);
        let mut transport = StdioTransport::with_io(BufReader::new(reader), writer);

        let Message::Request(req) = transport.recv().await.unwrap().unwrap().unwrap() else {
            panic!("expected a request");
        };
        let reply = Message::Response(Response::new(req.id, serde_json::json!({})));
        transport.send(&reply).await.unwrap();
    }
}
