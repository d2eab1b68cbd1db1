//! JSON-RPC 2.0 message codec for the MCP protocol.
//!
//! All four envelope kinds share one wire shape and are told apart by which
//! keys are present, never by key order:
//!
//! - **Request**: has `id` and `method`
//! - **Response**: has `id` and `result`, no `method`
//! - **Error response**: has `id` (possibly `null`) and `error`, no `method`
//! - **Notification**: has `method`, no `id`
//!
//! # MCP-Specific Constraints
//!
//! - Request IDs must be strings or numbers (never `null` on a request)
//! - Request IDs are echoed back exactly as received

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// The MCP protocol version this implementation supports.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name for capability negotiation.
pub const SERVER_NAME: &str = "simple-mcp-server";

/// The only accepted value of the `jsonrpc` field.
pub const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC 2.0 request ID.
///
/// Numbers are held as [`serde_json::Number`] so that `7`, `-3` and `1.5`
/// all come back out byte-for-byte as they went in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric request ID.
    Number(Number),
    /// String request ID.
    String(String),
}

impl RequestId {
    fn from_value(value: &Value) -> Result<Option<Self>, DecodeError> {
        match value {
            Value::Null => Ok(None),
            Value::Number(n) => Ok(Some(Self::Number(n.clone()))),
            Value::String(s) => Ok(Some(Self::String(s.clone()))),
            _ => Err(DecodeError::InvalidId),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// A request expecting exactly one response.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Correlation token chosen by the caller.
    pub id: RequestId,
    /// The method to invoke.
    pub method: String,
    /// Optional method parameters.
    pub params: Option<Value>,
}

/// A successful reply to a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// The request ID this response corresponds to.
    pub id: RequestId,
    /// The result of the method call.
    pub result: Value,
}

impl Response {
    /// Creates a new success response.
    #[must_use]
    pub const fn new(id: RequestId, result: Value) -> Self {
        Self { id, result }
    }
}

/// A one-way message; never answered.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// The notification method.
    pub method: String,
    /// Optional parameters.
    pub params: Option<Value>,
}

impl Notification {
    /// Creates a new notification.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// The notification announcing that the resource list has changed.
    #[must_use]
    pub fn resource_list_changed() -> Self {
        Self::new("notifications/resources/list_changed", None)
    }
}

/// Standard JSON-RPC 2.0 error codes plus the server-defined ones in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid JSON was received by the server.
    ParseError,
    /// The JSON sent is not a valid Request object.
    InvalidRequest,
    /// The method does not exist or is not available.
    MethodNotFound,
    /// Invalid method parameters.
    InvalidParams,
    /// Internal JSON-RPC error.
    InternalError,
    /// A request other than `initialize` arrived before `initialize`.
    ServerNotInitialised,
    /// A provider failed; the message carries its text.
    ApplicationError,
}

impl ErrorCode {
    /// Returns the numeric code for this error.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerNotInitialised => -32002,
            Self::ApplicationError => -32000,
        }
    }

    /// Returns the default message for this error code.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::ServerNotInitialised => "Server not initialised",
            Self::ApplicationError => "Server error",
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// The error code.
    pub code: i32,

    /// A short description of the error.
    pub message: String,

    /// Additional information about the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    /// Creates a new error from an error code.
    #[must_use]
    pub fn from_code(code: ErrorCode) -> Self {
        Self::with_message(code, code.default_message())
    }

    /// Creates a new error with a custom message.
    #[must_use]
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    /// Adds additional data to the error.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// An error reply. `id` is `None` only when the request ID could not be read.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    /// The request ID this error corresponds to (if known).
    pub id: Option<RequestId>,
    /// The error details.
    pub error: ErrorObject,
}

impl ErrorResponse {
    /// Creates a new error response.
    #[must_use]
    pub const fn new(id: Option<RequestId>, error: ErrorObject) -> Self {
        Self { id, error }
    }

    /// Creates a method not found error response naming the method.
    #[must_use]
    pub fn method_not_found(id: RequestId, method: &str) -> Self {
        Self::new(
            Some(id),
            ErrorObject::with_message(
                ErrorCode::MethodNotFound,
                format!("Method {method} not found"),
            ),
        )
    }

    /// Creates an invalid request error response.
    #[must_use]
    pub fn invalid_request(id: RequestId, message: impl Into<String>) -> Self {
        Self::new(
            Some(id),
            ErrorObject::with_message(ErrorCode::InvalidRequest, message),
        )
    }

    /// Creates the error returned for calls made before `initialize`.
    #[must_use]
    pub fn not_initialised(id: RequestId) -> Self {
        Self::new(Some(id), ErrorObject::from_code(ErrorCode::ServerNotInitialised))
    }

    /// Creates an application error carrying a provider message verbatim.
    #[must_use]
    pub fn application(id: RequestId, message: impl Into<String>) -> Self {
        Self::new(
            Some(id),
            ErrorObject::with_message(ErrorCode::ApplicationError, message),
        )
    }

    /// Creates the reply for an inbound message that failed to decode.
    #[must_use]
    pub fn from_decode_error(err: &DecodeError) -> Self {
        let code = err.code();
        Self::new(
            err.id().cloned(),
            ErrorObject::with_message(code, format!("{}: {err}", code.default_message())),
        )
    }
}

/// Any message that can travel over a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A request expecting a response.
    Request(Request),
    /// A successful response.
    Response(Response),
    /// An error response.
    Error(ErrorResponse),
    /// A notification (no response expected).
    Notification(Notification),
}

impl Message {
    /// Returns the method name for requests and notifications.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(req) => Some(&req.method),
            Self::Notification(notif) => Some(&notif.method),
            Self::Response(_) | Self::Error(_) => None,
        }
    }

    /// Returns the correlation ID, if the message carries one.
    #[must_use]
    pub const fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(req) => Some(&req.id),
            Self::Response(resp) => Some(&resp.id),
            Self::Error(err) => err.id.as_ref(),
            Self::Notification(_) => None,
        }
    }
}

impl From<Response> for Message {
    fn from(resp: Response) -> Self {
        Self::Response(resp)
    }
}

impl From<ErrorResponse> for Message {
    fn from(err: ErrorResponse) -> Self {
        Self::Error(err)
    }
}

impl From<Notification> for Message {
    fn from(notif: Notification) -> Self {
        Self::Notification(notif)
    }
}

/// Flat wire form shared by every message kind.
#[derive(Serialize)]
struct Envelope<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Option<&'a RequestId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a ErrorObject>,
}

impl Envelope<'_> {
    const fn empty() -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: None,
            method: None,
            params: None,
            result: None,
            error: None,
        }
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let envelope = match self {
            Self::Request(req) => Envelope {
                id: Some(Some(&req.id)),
                method: Some(&req.method),
                params: req.params.as_ref(),
                ..Envelope::empty()
            },
            Self::Response(resp) => Envelope {
                id: Some(Some(&resp.id)),
                result: Some(&resp.result),
                ..Envelope::empty()
            },
            // The id key is always present on an error, `null` when unknown
            Self::Error(err) => Envelope {
                id: Some(err.id.as_ref()),
                error: Some(&err.error),
                ..Envelope::empty()
            },
            Self::Notification(notif) => Envelope {
                method: Some(&notif.method),
                params: notif.params.as_ref(),
                ..Envelope::empty()
            },
        };
        envelope.serialize(serializer)
    }
}

/// Reasons an inbound message could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The text is not JSON.
    #[error("invalid JSON: {0}")]
    Syntax(#[source] serde_json::Error),

    /// The JSON is not an object.
    #[error("message must be a JSON object")]
    NotAnObject,

    /// The `id` field is neither a string, a number, nor `null`.
    #[error("id must be a string or a number")]
    InvalidId,

    /// The `jsonrpc` field is missing or not `"2.0"`.
    #[error("jsonrpc field must be \"2.0\"")]
    Version {
        /// The ID of the offending message, if readable.
        id: Option<RequestId>,
    },

    /// A field is present but has the wrong shape.
    #[error("invalid {field} field")]
    InvalidField {
        /// The ID of the offending message, if readable.
        id: Option<RequestId>,
        /// The offending field name.
        field: &'static str,
    },

    /// The message has an `id` but no `method`, `result` or `error`.
    #[error("response carries neither result nor error")]
    MissingResultOrError {
        /// The ID of the offending message, if readable.
        id: Option<RequestId>,
    },

    /// The message has neither `id` nor `method`.
    #[error("message has neither id nor method")]
    Unclassifiable,
}

impl DecodeError {
    /// The JSON-RPC error code to answer this failure with.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Syntax(_) => ErrorCode::ParseError,
            _ => ErrorCode::InvalidRequest,
        }
    }

    /// The request ID of the offending message, if it could be read.
    #[must_use]
    pub const fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Version { id }
            | Self::InvalidField { id, .. }
            | Self::MissingResultOrError { id } => id.as_ref(),
            Self::Syntax(_) | Self::NotAnObject | Self::InvalidId | Self::Unclassifiable => None,
        }
    }
}

/// Serialises a message to single-line JSON.
///
/// # Errors
///
/// Returns an error if serialisation fails.
pub fn encode(message: &Message) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

/// Decodes a message from JSON text.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the text is not a well-formed message.
pub fn decode(text: &str) -> Result<Message, DecodeError> {
    let value: Value = serde_json::from_str(text).map_err(DecodeError::Syntax)?;
    decode_value(value)
}

/// Decodes a message from raw JSON bytes.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the bytes are not a well-formed message.
pub fn decode_slice(bytes: &[u8]) -> Result<Message, DecodeError> {
    let value: Value = serde_json::from_slice(bytes).map_err(DecodeError::Syntax)?;
    decode_value(value)
}

/// Decodes a message from an already-parsed JSON value.
///
/// The presence of `id` alone separates requests from notifications;
/// `result` and `error` are only consulted when there is no `method`.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the value is not a well-formed message.
pub fn decode_value(value: Value) -> Result<Message, DecodeError> {
    let Value::Object(mut obj) = value else {
        return Err(DecodeError::NotAnObject);
    };

    let id = obj.get("id").map(RequestId::from_value).transpose()?;

    if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(DecodeError::Version { id: id.flatten() });
    }

    let method = obj
        .remove("method")
        .map(|m| match m {
            Value::String(s) if !s.is_empty() => Ok(s),
            _ => Err(DecodeError::InvalidField {
                id: id.clone().flatten(),
                field: "method",
            }),
        })
        .transpose()?;

    match (id, method) {
        (Some(id), Some(method)) => {
            let Some(id) = id else {
                return Err(DecodeError::InvalidField { id: None, field: "id" });
            };
            let params = take_params(&mut obj, Some(&id))?;
            Ok(Message::Request(Request { id, method, params }))
        }
        (None, Some(method)) => {
            let params = take_params(&mut obj, None)?;
            Ok(Message::Notification(Notification { method, params }))
        }
        (Some(id), None) => {
            if let Some(error) = obj.remove("error") {
                let error: ErrorObject =
                    serde_json::from_value(error).map_err(|_| DecodeError::InvalidField {
                        id: id.clone(),
                        field: "error",
                    })?;
                return Ok(Message::Error(ErrorResponse { id, error }));
            }
            let Some(result) = obj.remove("result") else {
                return Err(DecodeError::MissingResultOrError { id });
            };
            let Some(id) = id else {
                return Err(DecodeError::InvalidField { id: None, field: "id" });
            };
            Ok(Message::Response(Response { id, result }))
        }
        (None, None) => Err(DecodeError::Unclassifiable),
    }
}

fn take_params(
    obj: &mut Map<String, Value>,
    id: Option<&RequestId>,
) -> Result<Option<Value>, DecodeError> {
    match obj.remove("params") {
        None | Some(Value::Null) => Ok(None),
        Some(params @ (Value::Object(_) | Value::Array(_))) => Ok(Some(params)),
        Some(_) => Err(DecodeError::InvalidField {
            id: id.cloned(),
            field: "params",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_valid_request() {
        let json = r#"{"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}"#;
        let msg = decode(json).unwrap();

        let Message::Request(req) = msg else {
            panic!("Expected Request, got {msg:?}");
        };
        assert_eq!(req.id, RequestId::from(1));
        assert_eq!(req.method, "initialize");
    }

    #[test]
    fn decode_valid_notification() {
        let json = r#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#;
        let msg = decode(json).unwrap();

        let Message::Notification(notif) = msg else {
            panic!("Expected Notification, got {msg:?}");
        };
        assert_eq!(notif.method, "notifications/initialized");
    }

    #[test]
    fn decode_string_id() {
        let json = r#"{"jsonrpc": "2.0", "id": "abc-123", "method": "test"}"#;
        let msg = decode(json).unwrap();
        assert_eq!(msg.id(), Some(&RequestId::from("abc-123")));
    }

    #[test]
    fn numeric_and_string_ids_are_not_coerced() {
        let number = decode(r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#).unwrap();
        let string = decode(r#"{"jsonrpc":"2.0","id":"7","method":"ping"}"#).unwrap();
        assert_ne!(number.id(), string.id());

        let reply = Message::Response(Response::new(number.id().unwrap().clone(), Value::Null));
        assert!(encode(&reply).unwrap().contains(r#""id":7"#));
        let reply = Message::Response(Response::new(string.id().unwrap().clone(), Value::Null));
        assert!(encode(&reply).unwrap().contains(r#""id":"7""#));
    }

    #[test]
    fn fractional_id_survives() {
        let msg = decode(r#"{"jsonrpc":"2.0","id":1.5,"method":"ping"}"#).unwrap();
        let reply = Message::Response(Response::new(msg.id().unwrap().clone(), Value::Null));
        assert!(encode(&reply).unwrap().contains(r#""id":1.5"#));
    }

    #[test]
    fn request_with_result_key_is_still_a_request() {
        let json = r#"{"result": {}, "method": "listTools", "id": 3, "jsonrpc": "2.0"}"#;
        assert!(matches!(decode(json).unwrap(), Message::Request(_)));
    }

    #[test]
    fn decode_response_and_error() {
        let resp = decode(r#"{"jsonrpc":"2.0","id":4,"result":{"ok":true}}"#).unwrap();
        assert!(matches!(resp, Message::Response(_)));

        let err =
            decode(r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32700,"message":"x"}}"#).unwrap();
        let Message::Error(err) = err else {
            panic!("Expected Error, got {err:?}");
        };
        assert_eq!(err.id, None);
        assert_eq!(err.error.code, -32700);
    }

    #[test]
    fn response_without_result_or_error_is_rejected() {
        let err = decode(r#"{"jsonrpc":"2.0","id":9}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingResultOrError { .. }));
        assert_eq!(err.id(), Some(&RequestId::from(9)));
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[test]
    fn decode_invalid_json() {
        let err = decode("not valid json").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ParseError);
        let reply = ErrorResponse::from_decode_error(&err);
        assert_eq!(reply.id, None);
        assert_eq!(reply.error.code, -32700);
    }

    #[test]
    fn decode_missing_jsonrpc() {
        let err = decode(r#"{"id": 1, "method": "test"}"#).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
        assert_eq!(err.id(), Some(&RequestId::from(1)));
    }

    #[test]
    fn decode_wrong_jsonrpc_version() {
        let err = decode(r#"{"jsonrpc": "1.0", "id": 1, "method": "test"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Version { .. }));
    }

    #[test]
    fn decode_rejects_scalar_params() {
        let err = decode(r#"{"jsonrpc":"2.0","id":1,"method":"x","params":3}"#).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidField { field: "params", .. }));
    }

    #[test]
    fn decode_rejects_null_id_on_request() {
        let err = decode(r#"{"jsonrpc":"2.0","id":null,"method":"x"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidField { field: "id", .. }));
    }

    #[test]
    fn encode_success_response() {
        let response = Message::Response(Response::new(
            RequestId::from(1),
            serde_json::json!({"ok": true}),
        ));
        let json = encode(&response).unwrap();
        assert!(json.contains(r#""jsonrpc":"2.0""#));
        assert!(json.contains(r#""id":1"#));
        assert!(json.contains(r#""result":{"ok":true}"#));
        assert!(!json.contains("method"));
    }

    #[test]
    fn encode_error_response() {
        let error = Message::Error(ErrorResponse::method_not_found(
            RequestId::from(1),
            "unknown/method",
        ));
        let json = encode(&error).unwrap();
        assert!(json.contains(r#""code":-32601"#));
        assert!(json.contains("Method unknown/method not found"));
    }

    #[test]
    fn encode_error_without_id_writes_null() {
        let error = Message::Error(ErrorResponse::new(
            None,
            ErrorObject::from_code(ErrorCode::ParseError),
        ));
        assert!(encode(&error).unwrap().contains(r#""id":null"#));
    }

    #[test]
    fn encode_notification_has_no_id() {
        let json = encode(&Notification::resource_list_changed().into()).unwrap();
        assert_eq!(
            json,
            r#"{"jsonrpc":"2.0","method":"notifications/resources/list_changed"}"#
        );
    }

    #[test]
    fn request_id_display() {
        assert_eq!(format!("{}", RequestId::from(42)), "42");
        assert_eq!(format!("{}", RequestId::from("abc")), "abc");
    }
}
