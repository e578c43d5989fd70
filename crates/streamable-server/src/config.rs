use crate::session::{SessionIdGenerator, UuidSessionIdGenerator};
use std::sync::Arc;
use std::time::Duration;
use streamable_transport::EventStore;

/// Default keep-alive period (§4.6.5), chosen to sit comfortably under most
/// intermediary proxies' idle-connection timeouts.
const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(25);

/// Construction parameters for a [`crate::StreamableHttpTransport`] (§6).
///
/// A plain struct with a `Default` impl, in the style of the teacher's own
/// `HyperServerOptions`: no external builder crate, just public fields and
/// `..Default::default()`.
pub struct TransportConfig {
    /// `None` selects stateless mode: no session id is generated or
    /// validated. `Some` selects stateful mode.
    pub session_id_generator: Option<Arc<dyn SessionIdGenerator>>,
    /// Emit a single buffered JSON response instead of an SSE stream for
    /// POSTs that carry at least one JSON-RPC request.
    pub enable_json_response: bool,
    /// When set, SSE frames are assigned event ids and `Last-Event-ID`
    /// reconnection is supported.
    pub event_store: Option<Arc<dyn EventStore>>,
    /// Period between keep-alive comments on open SSE streams. `None` or a
    /// non-positive duration disables keep-alives entirely.
    pub keep_alive_interval: Option<Duration>,
    /// `Host` header allowlist for DNS-rebinding protection. `None` or an
    /// empty list disables the check; a non-empty list rejects any request
    /// whose `Host` header isn't in it.
    pub allowed_hosts: Option<Vec<String>>,
    /// `Origin` header allowlist, checked the same way as `allowed_hosts`.
    pub allowed_origins: Option<Vec<String>>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            session_id_generator: Some(Arc::new(UuidSessionIdGenerator)),
            enable_json_response: false,
            event_store: None,
            keep_alive_interval: Some(DEFAULT_KEEP_ALIVE_INTERVAL),
            allowed_hosts: None,
            allowed_origins: None,
        }
    }
}

impl TransportConfig {
    pub fn stateless() -> Self {
        Self {
            session_id_generator: None,
            ..Default::default()
        }
    }
}
