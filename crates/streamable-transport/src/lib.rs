//! Transport-level primitives for the MCP Streamable HTTP transport.
//!
//! This crate is deliberately HTTP-framework-agnostic: it owns the JSON-RPC
//! codec, the SSE wire format, and the event-log abstraction used for
//! resumable streams. The session/stream correlation state machine that ties
//! these primitives to a concrete HTTP server lives in `streamable-server`.

mod error;
mod event_store;
mod ids;
mod jsonrpc;
mod sse;

pub use error::{TransportError, TransportResult};
pub use event_store::{in_memory_event_store::InMemoryEventStore, EventStore, ReplayedEvents};
pub use ids::{EventId, SessionId, StreamId, GET_STREAM_ID};
pub use jsonrpc::{
    error_envelope, JsonRpcMessage, RequestId, INVALID_REQUEST, PARSE_ERROR, SESSION_NOT_FOUND,
    TRANSPORT_ERROR,
};
pub use sse::{keep_alive_comment, SseEvent, KEEP_ALIVE_COMMENT_PREFIX};
