use thiserror::Error;

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Errors raised by the JSON-RPC codec, SSE framer, and event-store
/// primitives in this crate.
///
/// Session/stream correlation errors live in `streamable-server`'s own
/// `TransportServerError`; this enum only covers the framework-agnostic
/// pieces owned here.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Serialization failure: {0}")]
    SerializationFailure(#[from] serde_json::Error),

    #[error("Event store error: {0}")]
    EventStore(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
