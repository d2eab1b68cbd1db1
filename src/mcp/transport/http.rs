//! HTTP duplex transport.
//!
//! One logical duplex channel is split across two HTTP interactions:
//!
//! ```text
//!   POST /mcp ──▶ inbound queue ──▶ HttpTransport::recv ──▶ dispatcher
//!                                                               │
//!   GET /mcp/stream ◀── SSE ◀── outbound queue ◀── HttpTransport::send
//! ```
//!
//! Both queues are bounded. A POST is acknowledged with `{"status":"ok"}` as
//! soon as its message is queued, before the dispatcher has looked at it;
//! protocol-level replies, including errors, only ever travel on the SSE
//! stream.
//!
//! Exactly one SSE consumer may be attached at a time. Outbound delivery is
//! best-effort per connected consumer: a message taken off the queue for a
//! stream that then disconnects is lost, and nothing is replayed.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::mcp::protocol::{decode_slice, encode, Message};
use crate::mcp::transport::{Inbound, Transport};

/// Path accepting one inbound message per POST.
pub const MESSAGE_PATH: &str = "/mcp";

/// Path serving the outbound server-sent-event stream.
pub const STREAM_PATH: &str = "/mcp/stream";

/// Default capacity of each queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Dispatcher side of the HTTP duplex channel.
pub struct HttpTransport {
    /// Messages posted by clients, in arrival order.
    inbound: mpsc::Receiver<Inbound>,
    /// Encoded messages waiting for the SSE consumer.
    outbound: mpsc::Sender<String>,
}

/// State shared by the axum handlers.
#[derive(Clone)]
struct HttpState {
    inbound: mpsc::Sender<Inbound>,
    /// Held for the lifetime of the one attached SSE stream.
    outbound: Arc<Mutex<mpsc::Receiver<String>>>,
}

/// Creates one HTTP session: the transport the dispatcher owns and the
/// router that feeds it.
///
/// `capacity` bounds both queues; zero is treated as one.
#[must_use]
pub fn channel(capacity: usize) -> (HttpTransport, Router) {
    let capacity = capacity.max(1);
    let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
    let (outbound_tx, outbound_rx) = mpsc::channel(capacity);

    let state = HttpState {
        inbound: inbound_tx,
        outbound: Arc::new(Mutex::new(outbound_rx)),
    };

    let router = Router::new()
        .route(MESSAGE_PATH, post(message_handler))
        .route(STREAM_PATH, get(stream_handler))
        .with_state(state)
        .layer(CorsLayer::permissive());

    let transport = HttpTransport {
        inbound: inbound_rx,
        outbound: outbound_tx,
    };

    (transport, router)
}

/// Serves `router` on `listener` until `shutdown` resolves.
///
/// Open SSE streams end once their [`HttpTransport`] is dropped, which lets
/// the graceful shutdown complete.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "MCP HTTP transport listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        let frame = encode(message)?;
        self.outbound
            .send(frame)
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Result<Option<Inbound>, TransportError> {
        Ok(self.inbound.recv().await)
    }
}

/// `POST /mcp`: queue one message and acknowledge it.
async fn message_handler(State(state): State<HttpState>, body: Bytes) -> Response {
    debug!(bytes = body.len(), "Received POST request to {MESSAGE_PATH}");

    let inbound = decode_slice(&body);
    if state.inbound.send(inbound).await.is_err() {
        warn!("Dispatcher has stopped, rejecting message");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "closed" })),
        )
            .into_response();
    }

    Json(json!({ "status": "ok" })).into_response()
}

/// `GET /mcp/stream`: drain the outbound queue as server-sent events.
async fn stream_handler(State(state): State<HttpState>) -> Response {
    let Ok(receiver) = Arc::clone(&state.outbound).try_lock_owned() else {
        warn!("Rejecting SSE connection, a consumer is already attached");
        return (StatusCode::CONFLICT, Json(json!({ "status": "busy" }))).into_response();
    };

    debug!("New SSE connection established");

    // Dropping the response drops the pending recv and the guard with it.
    let events = stream::unfold(receiver, |mut receiver| async move {
        let frame = receiver.recv().await?;
        Some((Ok::<_, Infallible>(Event::default().data(frame)), receiver))
    });

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}
