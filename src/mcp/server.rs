//! Transport-agnostic MCP dispatcher.
//!
//! This module implements the session lifecycle:
//!
//! 1. **Uninitialised**: only `initialize` and `ping` are served
//! 2. **Ready**: resources, prompts and tools are served
//! 3. **Closed**: the transport has gone away; nothing is answered
//!
//! Every inbound request produces exactly one response or error response.
//! A tool call that changes the resource list is followed, before its
//! response, by a `notifications/resources/list_changed` notification when
//! that capability was negotiated.

use std::collections::HashMap;
use std::future::{self, Future};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{ProviderError, TransportError};
use crate::mcp::protocol::{
    ErrorResponse, Message, Notification, Request, RequestId, Response, MCP_PROTOCOL_VERSION,
    SERVER_NAME,
};
use crate::mcp::transport::{Inbound, Transport};
use crate::providers::{Providers, Workspace};

/// Session state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for `initialize`.
    Uninitialised,
    /// Ready for normal operation.
    Ready,
    /// The transport closed or failed.
    Closed,
}

/// Every method the dispatcher understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `initialize`
    Initialize,
    /// `ping`
    Ping,
    /// `listResources` / `resources/list`
    ListResources,
    /// `readResource` / `resources/read`
    ReadResource,
    /// `listPrompts` / `prompts/list`
    ListPrompts,
    /// `getPrompt` / `prompts/get`
    GetPrompt,
    /// `listTools` / `tools/list`
    ListTools,
    /// `callTool` / `tools/call`
    CallTool,
}

impl Method {
    /// Resolves a wire method name, accepting the slash-form aliases.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let method = match name {
            "initialize" => Self::Initialize,
            "ping" => Self::Ping,
            "listResources" | "resources/list" => Self::ListResources,
            "readResource" | "resources/read" => Self::ReadResource,
            "listPrompts" | "prompts/list" => Self::ListPrompts,
            "getPrompt" | "prompts/get" => Self::GetPrompt,
            "listTools" | "tools/list" => Self::ListTools,
            "callTool" | "tools/call" => Self::CallTool,
            _ => return None,
        };
        Some(method)
    }

    /// Whether the method may be called before `initialize`.
    #[must_use]
    pub const fn allowed_before_init(self) -> bool {
        matches!(self, Self::Initialize | Self::Ping)
    }
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerCapabilities {
    /// Resource capabilities.
    pub resources: EmptyCapability,
    /// Prompt capabilities.
    pub prompts: EmptyCapability,
    /// Tool capabilities.
    pub tools: EmptyCapability,
    /// Server-initiated notifications.
    pub notifications: NotificationCapabilities,
}

/// A capability with no options, serialised as `{}`.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EmptyCapability {}

/// Notification capabilities.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationCapabilities {
    /// Whether `notifications/resources/list_changed` will be sent.
    pub resource_list_changed: bool,
}

/// Server information for initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by client.
    #[serde(default)]
    pub protocol_version: Option<String>,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

impl InitializeParams {
    /// False only if the client explicitly declined list-changed notifications.
    fn accepts_resource_list_changed(&self) -> bool {
        self.capabilities
            .pointer("/notifications/resourceListChanged")
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }
}

#[derive(Debug, Deserialize)]
struct ReadResourceParams {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct GetPromptParams {
    name: String,
    #[serde(default)]
    arguments: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Server-side settings that shape capability negotiation.
#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    /// Offer `resourceListChanged` notifications.
    pub resource_list_changed: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            resource_list_changed: true,
        }
    }
}

/// One MCP session over one transport.
pub struct McpServer<T: Transport, P: Providers = Workspace> {
    /// Current session state.
    state: SessionState,
    /// The transport layer.
    transport: T,
    /// Resources, tools and prompts.
    providers: P,
    /// Server-side settings.
    options: ServerOptions,
    /// Capabilities fixed at `initialize`.
    capabilities: ServerCapabilities,
}

impl<T: Transport, P: Providers> McpServer<T, P> {
    /// Creates a session in the `Uninitialised` state.
    pub fn new(transport: T, providers: P, options: ServerOptions) -> Self {
        Self {
            state: SessionState::Uninitialised,
            transport,
            providers,
            options,
            capabilities: ServerCapabilities::default(),
        }
    }

    /// Returns the current session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// The providers this session dispatches to.
    #[must_use]
    pub const fn providers(&self) -> &P {
        &self.providers
    }

    /// Runs the session until the transport closes.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails.
    pub async fn run(&mut self) -> Result<(), TransportError> {
        self.run_until(future::pending()).await
    }

    /// Runs the session until the transport closes or `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails; the session is closed either
    /// way.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<(), TransportError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let inbound = tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested, closing session");
                    self.state = SessionState::Closed;
                    return Ok(());
                }

                inbound = self.transport.recv() => inbound,
            };

            let inbound = match inbound {
                Ok(Some(inbound)) => inbound,
                Ok(None) => {
                    info!("Transport closed");
                    self.state = SessionState::Closed;
                    return Ok(());
                }
                Err(e) => {
                    self.state = SessionState::Closed;
                    return Err(e);
                }
            };

            // A full outbound queue must not outlive a shutdown request
            for message in self.handle(inbound).await {
                let sent = tokio::select! {
                    () = &mut shutdown => {
                        info!("Shutdown requested while sending, closing session");
                        self.state = SessionState::Closed;
                        return Ok(());
                    }

                    sent = self.transport.send(&message) => sent,
                };
                if let Err(e) = sent {
                    warn!(error = %e, "Failed to send message, closing session");
                    self.state = SessionState::Closed;
                    return Err(e);
                }
            }
        }
    }

    /// Processes one inbound item and returns the messages to send, in order.
    pub async fn handle(&mut self, inbound: Inbound) -> Vec<Message> {
        if self.state == SessionState::Closed {
            return Vec::new();
        }

        match inbound {
            Err(e) => {
                warn!(error = %e, "Failed to decode inbound message");
                vec![ErrorResponse::from_decode_error(&e).into()]
            }
            Ok(Message::Request(req)) => self.handle_request(req).await,
            Ok(Message::Notification(notif)) => {
                Self::handle_notification(&notif);
                Vec::new()
            }
            Ok(Message::Response(resp)) => {
                debug!(id = %resp.id, "Ignoring unsolicited response");
                Vec::new()
            }
            Ok(Message::Error(err)) => {
                debug!(error = ?err.error, "Ignoring unsolicited error response");
                Vec::new()
            }
        }
    }

    /// Handles an incoming request.
    async fn handle_request(&mut self, req: Request) -> Vec<Message> {
        debug!(id = %req.id, method = %req.method, "Handling request");

        let Some(method) = Method::parse(&req.method) else {
            return vec![ErrorResponse::method_not_found(req.id, &req.method).into()];
        };

        if let Err(e) = self.require_ready(method, &req.id) {
            return vec![e.into()];
        }

        let mut outbox = Vec::new();
        let reply = match method {
            Method::Initialize => self.handle_initialize(&req),
            Method::Ping => Ok(json!({})),
            Method::ListResources => Ok(json!({
                "resources": self.providers.list_resources().await,
            })),
            Method::ReadResource => self.handle_read_resource(&req).await,
            Method::ListPrompts => Ok(json!({ "prompts": self.providers.list_prompts() })),
            Method::GetPrompt => self.handle_get_prompt(&req),
            Method::ListTools => Ok(json!({ "tools": self.providers.list_tools() })),
            Method::CallTool => self.handle_call_tool(&req, &mut outbox),
        };

        outbox.push(match reply {
            Ok(result) => Response::new(req.id, result).into(),
            Err(error) => error.into(),
        });
        outbox
    }

    /// Handles an incoming notification.
    fn handle_notification(notif: &Notification) {
        if notif.method == "notifications/initialized" {
            debug!("Client confirmed initialisation");
        } else {
            debug!(method = %notif.method, "Ignoring notification");
        }
    }

    /// Handles the initialize request.
    fn handle_initialize(&mut self, req: &Request) -> Result<Value, ErrorResponse> {
        if self.state != SessionState::Uninitialised {
            return Err(ErrorResponse::invalid_request(
                req.id.clone(),
                "Server already initialised",
            ));
        }

        let params: InitializeParams = match &req.params {
            Some(_) => parse_params(req)?,
            None => InitializeParams::default(),
        };

        self.capabilities.notifications.resource_list_changed =
            self.options.resource_list_changed && params.accepts_resource_list_changed();
        self.state = SessionState::Ready;

        info!(
            client = params.client_info.as_ref().map_or("unknown", |c| c.name.as_str()),
            client_protocol = params.protocol_version.as_deref().unwrap_or("unspecified"),
            resource_list_changed = self.capabilities.notifications.resource_list_changed,
            "Session initialised"
        );

        Ok(json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": self.capabilities,
            "serverInfo": ServerInfo::default(),
        }))
    }

    /// Handles the readResource request.
    async fn handle_read_resource(&mut self, req: &Request) -> Result<Value, ErrorResponse> {
        let params: ReadResourceParams = parse_params(req)?;
        let contents = self
            .providers
            .read_resource(&params.uri)
            .await
            .map_err(|e| provider_error(&req.id, &e))?;

        Ok(json!({ "contents": [contents] }))
    }

    /// Handles the getPrompt request.
    fn handle_get_prompt(&self, req: &Request) -> Result<Value, ErrorResponse> {
        let params: GetPromptParams = parse_params(req)?;
        let arguments = params.arguments.unwrap_or_default();
        let result = self
            .providers
            .get_prompt(&params.name, &arguments)
            .map_err(|e| provider_error(&req.id, &e))?;

        Ok(json!(result))
    }

    /// Handles the callTool request. Notifications go to `outbox`.
    fn handle_call_tool(
        &mut self,
        req: &Request,
        outbox: &mut Vec<Message>,
    ) -> Result<Value, ErrorResponse> {
        let params: CallToolParams = parse_params(req)?;
        let outcome = self
            .providers
            .call_tool(&params.name, &params.arguments)
            .map_err(|e| provider_error(&req.id, &e))?;

        if outcome.resources_changed && self.capabilities.notifications.resource_list_changed {
            outbox.push(Notification::resource_list_changed().into());
        }

        Ok(json!({ "content": outcome.content }))
    }

    /// Ensures the session may serve `method`.
    fn require_ready(&self, method: Method, id: &RequestId) -> Result<(), ErrorResponse> {
        if self.state == SessionState::Uninitialised && !method.allowed_before_init() {
            return Err(ErrorResponse::not_initialised(id.clone()));
        }
        Ok(())
    }
}

/// Deserialises `req.params`, treating absent params as `null`.
fn parse_params<T: DeserializeOwned>(req: &Request) -> Result<T, ErrorResponse> {
    let params = req.params.clone().unwrap_or(Value::Null);
    serde_json::from_value(params).map_err(|e| {
        let message = format!("Invalid params for {}: {e}", req.method);
        ErrorResponse::application(req.id.clone(), message)
    })
}

fn provider_error(id: &RequestId, err: &ProviderError) -> ErrorResponse {
    warn!(id = %id, error = %err, "Provider error");
    ErrorResponse::application(id.clone(), err.to_string())
}

#[cfg(test)]
mod tests {
    use tokio::io::{Empty, Sink};

    use super::*;
    use crate::mcp::protocol::{decode, ErrorCode};
    use crate::mcp::transport::StdioTransport;

    type TestServer = McpServer<StdioTransport<Empty, Sink>>;

    fn server() -> TestServer {
        server_with(ServerOptions::default())
    }

    fn server_with(options: ServerOptions) -> TestServer {
        let transport = StdioTransport::with_io(tokio::io::empty(), tokio::io::sink());
        McpServer::new(transport, Workspace::new(), options)
    }

    async fn send(server: &mut TestServer, line: &str) -> Vec<Message> {
        server.handle(decode(line)).await
    }

    async fn initialise(server: &mut TestServer) {
        let out = send(
            server,
            r#"{"jsonrpc":"2.0","id":0,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{}}}"#,
        )
        .await;
        assert!(matches!(out.as_slice(), [Message::Response(_)]));
    }

    fn error_code(message: &Message) -> i32 {
        match message {
            Message::Error(e) => e.error.code,
            other => panic!("expected error, got {other:?}"),
        }
    }

    fn result(message: &Message) -> &Value {
        match message {
            Message::Response(r) => &r.result,
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn server_initial_state() {
        let server = server();
        assert_eq!(server.state(), SessionState::Uninitialised);
    }

    #[test]
    fn method_aliases() {
        assert_eq!(Method::parse("listResources"), Some(Method::ListResources));
        assert_eq!(Method::parse("resources/list"), Some(Method::ListResources));
        assert_eq!(Method::parse("tools/call"), Some(Method::CallTool));
        assert_eq!(Method::parse("getPrompt"), Some(Method::GetPrompt));
        assert_eq!(Method::parse("resources/delete"), None);
    }

    #[tokio::test]
    async fn initialize_reports_capabilities() {
        let mut server = server();
        let out = send(
            &mut server,
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
        )
        .await;

        let result = result(&out[0]);
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert_eq!(
            result["capabilities"]["notifications"]["resourceListChanged"],
            true
        );
        assert!(result["capabilities"]["tools"].is_object());
        assert_eq!(server.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn second_initialize_is_rejected() {
        let mut server = server();
        initialise(&mut server).await;

        let out = send(&mut server, r#"{"jsonrpc":"2.0","id":2,"method":"initialize"}"#).await;
        assert_eq!(error_code(&out[0]), ErrorCode::InvalidRequest.code());
    }

    #[tokio::test]
    async fn calls_before_initialize_are_refused() {
        let mut server = server();

        let out = send(&mut server, r#"{"jsonrpc":"2.0","id":1,"method":"listTools"}"#).await;
        assert_eq!(error_code(&out[0]), -32002);

        let out = send(&mut server, r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#).await;
        assert_eq!(result(&out[0]), &json!({}));
    }

    #[tokio::test]
    async fn unknown_method_names_the_method() {
        let mut server = server();
        let out = send(&mut server, r#"{"jsonrpc":"2.0","id":"x","method":"frobnicate"}"#).await;

        match &out[0] {
            Message::Error(e) => {
                assert_eq!(e.id, Some(RequestId::from("x")));
                assert_eq!(e.error.code, -32601);
                assert!(e.error.message.contains("frobnicate"));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn add_note_notifies_before_responding() {
        let mut server = server();
        initialise(&mut server).await;

        let out = send(
            &mut server,
            r#"{"jsonrpc":"2.0","id":3,"method":"callTool","params":{"name":"add-note","arguments":{"name":"n","content":"c"}}}"#,
        )
        .await;

        assert_eq!(out.len(), 2);
        assert_eq!(
            out[0],
            Message::Notification(Notification::resource_list_changed())
        );
        assert_eq!(
            result(&out[1]),
            &json!({"content": [{"type": "text", "text": "Added note 'n' with content: c"}]})
        );
        assert_eq!(server.providers().notes().get("n"), Some("c"));
    }

    #[tokio::test]
    async fn declined_notifications_are_not_sent() {
        let mut server = server();
        let out = send(
            &mut server,
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"capabilities":{"notifications":{"resourceListChanged":false}}}}"#,
        )
        .await;
        assert_eq!(
            result(&out[0])["capabilities"]["notifications"]["resourceListChanged"],
            false
        );

        let out = send(
            &mut server,
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"add-note","arguments":{"name":"n","content":"c"}}}"#,
        )
        .await;
        assert!(matches!(out.as_slice(), [Message::Response(_)]));
    }

    #[tokio::test]
    async fn disabled_notifications_are_not_offered() {
        let mut server = server_with(ServerOptions {
            resource_list_changed: false,
        });
        let out = send(&mut server, r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#).await;
        assert_eq!(
            result(&out[0])["capabilities"]["notifications"]["resourceListChanged"],
            false
        );
    }

    #[tokio::test]
    async fn provider_errors_are_application_errors() {
        let mut server = server();
        initialise(&mut server).await;

        let out = send(
            &mut server,
            r#"{"jsonrpc":"2.0","id":4,"method":"readResource","params":{"uri":"note://internal/missing"}}"#,
        )
        .await;
        match &out[0] {
            Message::Error(e) => {
                assert_eq!(e.error.code, -32000);
                assert_eq!(e.error.message, "Note not found: missing");
            }
            other => panic!("expected error, got {other:?}"),
        }

        let out = send(
            &mut server,
            r#"{"jsonrpc":"2.0","id":5,"method":"callTool","params":{"name":"add-note","arguments":{"name":"n"}}}"#,
        )
        .await;
        assert_eq!(out.len(), 1);
        assert_eq!(error_code(&out[0]), -32000);
    }

    #[tokio::test]
    async fn malformed_params_are_application_errors() {
        let mut server = server();
        initialise(&mut server).await;

        let out = send(&mut server, r#"{"jsonrpc":"2.0","id":6,"method":"readResource"}"#).await;
        assert_eq!(error_code(&out[0]), -32000);
    }

    #[tokio::test]
    async fn decode_errors_are_answered() {
        let mut server = server();
        let out = send(&mut server, "{not json").await;

        match &out[0] {
            Message::Error(e) => {
                assert_eq!(e.id, None);
                assert_eq!(e.error.code, -32700);
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn notifications_and_responses_are_not_answered() {
        let mut server = server();
        initialise(&mut server).await;

        let out = send(
            &mut server,
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        )
        .await;
        assert!(out.is_empty());

        let out = send(&mut server, r#"{"jsonrpc":"2.0","id":9,"result":{}}"#).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn run_closes_on_eof() {
        let mut server = server();
        server.run().await.unwrap();
        assert_eq!(server.state(), SessionState::Closed);

        let out = send(&mut server, r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn get_prompt_renders_notes() {
        let mut server = server();
        initialise(&mut server).await;
        send(
            &mut server,
            r#"{"jsonrpc":"2.0","id":1,"method":"callTool","params":{"name":"add-note","arguments":{"name":"a","content":"b"}}}"#,
        )
        .await;

        let out = send(
            &mut server,
            r#"{"jsonrpc":"2.0","id":2,"method":"getPrompt","params":{"name":"summarize-notes","arguments":{"style":"detailed"}}}"#,
        )
        .await;
        let text = result(&out[0])["messages"][0]["content"]["text"]
            .as_str()
            .unwrap();
        assert!(text.contains("Give extensive details."));
        assert!(text.ends_with("- a: b"));
    }
}
