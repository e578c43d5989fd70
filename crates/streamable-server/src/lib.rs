//! Session-aware Streamable HTTP transport for MCP servers.
//!
//! Wires the framework-agnostic primitives in `streamable-transport`
//! (JSON-RPC codec, SSE framing, event log) into a concrete HTTP-method
//! dispatch and request/stream correlation state machine, with thin
//! adapters at the edges: a generic [`http`]-crate adapter usable from any
//! hyper-based service, and an `axum` `Router` built on top of it.

mod adapter;
#[cfg(feature = "axum")]
pub mod axum_routes;
mod config;
mod error;
pub mod http_adapter;
mod session;
mod transport;

pub use adapter::{RequestContext, ResponseSink};
pub use config::TransportConfig;
pub use error::{TransportServerError, TransportServerResult};
pub use session::{SessionIdGenerator, SessionState, UuidSessionIdGenerator};
pub use transport::{StreamableHttpTransport, TransportHandler};
