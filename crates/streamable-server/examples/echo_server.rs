//! A minimal Streamable HTTP server: answers `initialize` with a trivial
//! capabilities result and echoes back whatever `params` every other
//! request carries, demonstrating the `TransportHandler` +
//! `axum_routes::routes` wiring a real embedder would use.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use streamable_server::{
    axum_routes, StreamableHttpTransport, TransportConfig, TransportHandler, TransportServerError,
};
use streamable_transport::{InMemoryEventStore, JsonRpcMessage, RequestId, SessionId};

struct EchoHandler {
    transport: std::sync::OnceLock<Arc<StreamableHttpTransport<EchoHandler>>>,
}

impl EchoHandler {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            transport: std::sync::OnceLock::new(),
        })
    }
}

#[async_trait]
impl TransportHandler for EchoHandler {
    async fn on_message(&self, message: JsonRpcMessage, _session_id: Option<SessionId>) {
        let Some(request_id) = message.id() else {
            return; // notifications have nothing to reply to
        };

        let result = if message.method() == Some("initialize") {
            json!({
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "serverInfo": { "name": "echo-server", "version": env!("CARGO_PKG_VERSION") },
            })
        } else {
            message.as_value().get("params").cloned().unwrap_or(Value::Null)
        };

        let response = JsonRpcMessage::from_value(json!({
            "jsonrpc": "2.0",
            "id": match &request_id {
                RequestId::Number(n) => Value::from(*n),
                RequestId::String(s) => Value::from(s.clone()),
            },
            "result": result,
        }))
        .expect("a well-formed JSON-RPC response always parses back");

        if let Some(transport) = self.transport.get() {
            let _ = transport.send(response, Some(request_id)).await;
        }
    }

    async fn on_session_initialized(&self, session_id: &SessionId) {
        tracing::info!(%session_id, "session initialized");
    }

    async fn on_error(&self, error: &TransportServerError) {
        tracing::warn!(%error, "transport invariant breach");
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let handler = EchoHandler::new();
    let config = TransportConfig {
        event_store: Some(Arc::new(InMemoryEventStore::new())),
        ..Default::default()
    };
    let transport = StreamableHttpTransport::new(config, handler.clone());
    transport.start().expect("first and only start() call");
    let _ = handler.transport.set(transport.clone());

    let router = axum_routes::routes("/mcp", transport);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:8080")
        .await
        .expect("bind 127.0.0.1:8080");
    tracing::info!("listening on http://127.0.0.1:8080/mcp");
    axum::serve(listener, router)
        .await
        .expect("server exited unexpectedly");
}
