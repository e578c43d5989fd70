//! Test doubles shared across the integration suite: a recording
//! [`ResponseSink`] and a recording [`TransportHandler`], in place of a real
//! socket — matching the event-store/adapter interfaces the spec describes
//! as meant to be faked in tests (SPEC_FULL.md §10.6).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use streamable_server::{ResponseSink, SessionIdGenerator, TransportHandler, TransportServerError};
use streamable_transport::{JsonRpcMessage, SessionId};
use tokio::sync::{Mutex, Notify};

/// A [`SessionIdGenerator`] that always returns the same fixed id, for
/// scenarios that need a predictable `mcp-session-id` (SPEC_FULL.md §8 S1).
pub struct FixedSessionIdGenerator(pub &'static str);

impl SessionIdGenerator for FixedSessionIdGenerator {
    fn generate(&self) -> SessionId {
        self.0.to_string()
    }
}

/// Records every status/header/write/close call a transport makes, and
/// lets a test fire a simulated client disconnect on demand.
#[derive(Default)]
pub struct MockSink {
    status: Mutex<u16>,
    headers: Mutex<Vec<(String, String)>>,
    writes: Mutex<Vec<String>>,
    closed: AtomicBool,
    flush_count: Mutex<u32>,
    disconnect: Notify,
}

impl MockSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn status(&self) -> u16 {
        *self.status.lock().await
    }

    pub async fn header(&self, name: &str) -> Option<String> {
        self.headers
            .lock()
            .await
            .iter()
            .find(|(header_name, _)| header_name.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }

    pub async fn writes(&self) -> Vec<String> {
        self.writes.lock().await.clone()
    }

    pub async fn body(&self) -> String {
        self.writes.lock().await.concat()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Simulates the client going away: `wait_disconnected` resolves for
    /// whoever is awaiting it.
    pub fn disconnect(&self) {
        self.disconnect.notify_waiters();
    }
}

#[async_trait]
impl ResponseSink for MockSink {
    async fn set_status(&self, status: u16) {
        *self.status.lock().await = status;
    }

    async fn set_header(&self, name: &str, value: &str) {
        self.headers
            .lock()
            .await
            .push((name.to_string(), value.to_string()));
    }

    async fn write(&self, chunk: &str) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        self.writes.lock().await.push(chunk.to_string());
        true
    }

    async fn flush(&self) {
        *self.flush_count.lock().await += 1;
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    async fn wait_disconnected(&self) {
        self.disconnect.notified().await;
    }
}

/// Records what the transport hands up to the "upper MCP layer": inbound
/// messages, session-initialized notifications, close, and invariant-breach
/// errors.
#[derive(Default)]
pub struct RecordingHandler {
    pub messages: Mutex<Vec<JsonRpcMessage>>,
    pub initialized_sessions: Mutex<Vec<SessionId>>,
    pub closed: AtomicBool,
    pub errors: Mutex<Vec<String>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn message_count(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportHandler for RecordingHandler {
    async fn on_message(&self, message: JsonRpcMessage, _session_id: Option<SessionId>) {
        self.messages.lock().await.push(message);
    }

    async fn on_session_initialized(&self, session_id: &SessionId) {
        self.initialized_sessions
            .lock()
            .await
            .push(session_id.clone());
    }

    async fn on_close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    async fn on_error(&self, error: &TransportServerError) {
        self.errors.lock().await.push(error.to_string());
    }
}

pub fn json_headers() -> Vec<(&'static str, &'static str)> {
    vec![
        ("accept", "application/json, text/event-stream"),
        ("content-type", "application/json"),
    ]
}

pub fn header_map(pairs: Vec<(&str, &str)>) -> http::HeaderMap {
    let mut headers = http::HeaderMap::new();
    for (name, value) in pairs {
        headers.insert(
            http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
            http::HeaderValue::from_str(value).unwrap(),
        );
    }
    headers
}
