use http::StatusCode;
use streamable_transport::{
    error_envelope, RequestId, TransportError, INVALID_REQUEST, SESSION_NOT_FOUND, TRANSPORT_ERROR,
};
use thiserror::Error;

pub type TransportServerResult<T> = std::result::Result<T, TransportServerError>;

/// Errors raised while dispatching HTTP requests through the transport
/// state machine.
///
/// Each variant carries enough information to produce both the wire-level
/// JSON-RPC error envelope (§7) and the matching HTTP status code, mirroring
/// how the teacher crate's `TransportServerError` maps onto an `IntoResponse`
/// impl at the HTTP edge.
#[derive(Debug, Error)]
pub enum TransportServerError {
    #[error("Bad Request: Server not initialized")]
    NotInitialized,

    #[error("Bad Request: Mcp-Session-Id header is required")]
    SessionIdMissing,

    #[error("Not Found: Session not found")]
    SessionNotFound,

    #[error("Bad Request: Invalid request: server already initialized")]
    AlreadyInitialized,

    #[error("Bad Request: Invalid request: a batch may not contain more than one initialize request")]
    BatchInitializeNotAllowed,

    #[error("Not Acceptable: {0}")]
    NotAcceptable(String),

    #[error("Unsupported Media Type: {0}")]
    UnsupportedMediaType(String),

    #[error("Conflict: Only one SSE stream is allowed per session")]
    DuplicateStandaloneStream,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error(transparent)]
    Codec(#[from] TransportError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("start() called more than once")]
    AlreadyStarted,
}

impl TransportServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotInitialized
            | Self::SessionIdMissing
            | Self::AlreadyInitialized
            | Self::BatchInitializeNotAllowed
            | Self::Codec(_) => StatusCode::BAD_REQUEST,
            Self::SessionNotFound => StatusCode::NOT_FOUND,
            Self::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::DuplicateStandaloneStream => StatusCode::CONFLICT,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Internal(_) | Self::AlreadyStarted => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn json_rpc_code(&self) -> i64 {
        match self {
            Self::SessionNotFound => SESSION_NOT_FOUND,
            Self::Codec(TransportError::ParseError(_)) => streamable_transport::PARSE_ERROR,
            Self::Codec(_) => INVALID_REQUEST,
            _ => TRANSPORT_ERROR,
        }
    }

    /// Renders the JSON-RPC error envelope used as the HTTP body for every
    /// protocol-violation failure (§7). Invariant breaches and transient I/O
    /// never reach this — those are surfaced via `TransportHandler::on_error`
    /// or silently treated as disconnects instead.
    pub fn to_json_rpc_error(&self, id: Option<&RequestId>) -> serde_json::Value {
        error_envelope(self.json_rpc_code(), &self.to_string(), id)
    }
}
