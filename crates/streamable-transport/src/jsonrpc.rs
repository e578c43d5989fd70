use crate::error::{TransportError, TransportResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A JSON-RPC 2.0 request id: either a number or a string, per spec.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&Value> for Option<RequestId> {
    fn from(value: &Value) -> Self {
        match value {
            Value::Number(n) => n.as_i64().map(RequestId::Number),
            Value::String(s) => Some(RequestId::String(s.clone())),
            _ => None,
        }
    }
}

/// A single JSON-RPC 2.0 message, kept as the original parsed [`Value`] so
/// routing never mutates or re-serializes the payload.
///
/// Classification mirrors how the upstream SDK inspects raw JSON rather than
/// deserializing into a strict typed enum: a message with both `id` and
/// `method` is a request, `id` with `result`/`error` is a response, `method`
/// alone is a notification. This keeps the codec forgiving of unknown or
/// vendor-specific fields, which a stricter enum would reject.
#[derive(Debug, Clone)]
pub struct JsonRpcMessage {
    raw: Value,
}

impl JsonRpcMessage {
    pub fn from_value(raw: Value) -> TransportResult<Self> {
        if !raw.is_object() {
            return Err(TransportError::InvalidRequest(
                "a JSON-RPC message must be a JSON object".into(),
            ));
        }
        Ok(Self { raw })
    }

    /// Parses a POST body, accepting either a single message or a batch
    /// (JSON array). Batch decoding fails as a whole on any element error.
    pub fn parse_body(body: &str) -> TransportResult<Vec<Self>> {
        let value: Value = serde_json::from_str(body)
            .map_err(|err| TransportError::ParseError(err.to_string()))?;
        match value {
            Value::Array(items) => items.into_iter().map(Self::from_value).collect(),
            other => Ok(vec![Self::from_value(other)?]),
        }
    }

    pub fn into_value(self) -> Value {
        self.raw
    }

    pub fn as_value(&self) -> &Value {
        &self.raw
    }

    pub fn id(&self) -> Option<RequestId> {
        self.raw.get("id").and_then(Option::<RequestId>::from)
    }

    pub fn method(&self) -> Option<&str> {
        self.raw.get("method").and_then(Value::as_str)
    }

    pub fn is_request(&self) -> bool {
        self.raw.get("id").is_some() && self.raw.get("method").is_some()
    }

    pub fn is_notification(&self) -> bool {
        self.raw.get("id").is_none() && self.raw.get("method").is_some()
    }

    pub fn is_response(&self) -> bool {
        self.raw.get("id").is_some() && self.raw.get("result").is_some()
    }

    pub fn is_error(&self) -> bool {
        self.raw.get("id").is_some() && self.raw.get("error").is_some()
    }

    pub fn is_initialize_request(&self) -> bool {
        self.is_request() && self.method() == Some("initialize")
    }
}

/// Builds the JSON-RPC 2.0 error envelope used for all transport-level
/// failures (parse errors, bad session, invariant breaches).
pub fn error_envelope(code: i64, message: &str, id: Option<&RequestId>) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "error": {
            "code": code,
            "message": message,
        },
        "id": id.map(|id| match id {
            RequestId::Number(n) => Value::from(*n),
            RequestId::String(s) => Value::from(s.clone()),
        }).unwrap_or(Value::Null),
    })
}

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const TRANSPORT_ERROR: i64 = -32000;
pub const SESSION_NOT_FOUND: i64 = -32001;
