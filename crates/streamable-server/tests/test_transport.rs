//! Integration tests for the transport state machine (C6) against the
//! literal scenarios and invariants in SPEC_FULL.md §8, driven directly
//! through [`StreamableHttpTransport::handle`]/`send` against the recording
//! test doubles in `tests/common` rather than a real socket.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{header_map, json_headers, FixedSessionIdGenerator, MockSink, RecordingHandler};
use http::Method;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use streamable_server::{RequestContext, StreamableHttpTransport, TransportConfig};
use streamable_transport::{InMemoryEventStore, JsonRpcMessage};
use tokio::time::sleep;

fn post_ctx(body: Value, extra_headers: Vec<(&str, &str)>) -> RequestContext {
    let mut headers = json_headers();
    headers.extend(extra_headers);
    RequestContext::new(Method::POST, header_map(headers), body.to_string())
}

fn get_ctx(extra_headers: Vec<(&str, &str)>) -> RequestContext {
    let mut headers = vec![("accept", "text/event-stream")];
    headers.extend(extra_headers);
    RequestContext::new(Method::GET, header_map(headers), String::new())
}

async fn init_session(
    transport: &Arc<StreamableHttpTransport<RecordingHandler>>,
    header_pairs: Vec<(&str, &str)>,
) -> Arc<MockSink> {
    let sink = MockSink::new();
    let ctx = post_ctx(
        json!({"jsonrpc": "2.0", "id": 0, "method": "initialize", "params": {}}),
        header_pairs,
    );
    transport
        .handle(ctx, sink.clone())
        .await
        .expect("initialization POST always succeeds on a fresh transport");
    sink
}

/// S1: stateful initialization. First SSE frame carries the response to the
/// init request's own id, with the freshly minted session id echoed back as
/// a header, and the stream closes once that lone response lands.
#[tokio::test]
async fn s1_stateful_initialization() {
    let handler = RecordingHandler::new();
    let config = TransportConfig {
        session_id_generator: Some(Arc::new(FixedSessionIdGenerator("S-1"))),
        ..Default::default()
    };
    let transport = StreamableHttpTransport::new(config, handler.clone());

    let sink = MockSink::new();
    let ctx = post_ctx(
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        vec![],
    );
    transport.handle(ctx, sink.clone()).await.unwrap();

    assert_eq!(sink.status().await, 200);
    assert_eq!(sink.header("mcp-session-id").await.as_deref(), Some("S-1"));
    assert_eq!(handler.message_count().await, 1);
    assert_eq!(transport.session_id().await.as_deref(), Some("S-1"));

    let response =
        JsonRpcMessage::from_value(json!({"jsonrpc": "2.0", "id": 1, "result": {"ok": true}}))
            .unwrap();
    transport.send(response, None).await.unwrap();

    let frames = sink.writes().await;
    assert_eq!(frames.len(), 1);
    assert_eq!(
        frames[0],
        "event: message\ndata: {\"id\":1,\"jsonrpc\":\"2.0\",\"result\":{\"ok\":true}}\n\n"
    );
    assert!(sink.is_closed());
}

/// S2: a non-init POST with no `mcp-session-id` header is rejected before
/// ever reaching the upper layer.
#[tokio::test]
async fn s2_missing_session_header() {
    let handler = RecordingHandler::new();
    let config = TransportConfig {
        session_id_generator: Some(Arc::new(FixedSessionIdGenerator("S-1"))),
        ..Default::default()
    };
    let transport = StreamableHttpTransport::new(config, handler.clone());
    init_session(&transport, vec![]).await;

    let sink = MockSink::new();
    let ctx = post_ctx(json!({"jsonrpc": "2.0", "id": 2, "method": "ping"}), vec![]);
    let err = transport.handle(ctx, sink.clone()).await.unwrap_err();

    assert_eq!(sink.status().await, 400);
    assert!(err.to_string().contains("Mcp-Session-Id header is required"));
    let body = sink.body().await;
    assert!(body.contains("\"code\":-32000"));
    assert!(body.contains("Bad Request: Mcp-Session-Id header is required"));
}

/// S3: a mismatched `mcp-session-id` header yields 404 / -32001.
#[tokio::test]
async fn s3_wrong_session_header() {
    let handler = RecordingHandler::new();
    let config = TransportConfig {
        session_id_generator: Some(Arc::new(FixedSessionIdGenerator("S-1"))),
        ..Default::default()
    };
    let transport = StreamableHttpTransport::new(config, handler.clone());
    init_session(&transport, vec![]).await;

    let sink = MockSink::new();
    let ctx = post_ctx(
        json!({"jsonrpc": "2.0", "id": 2, "method": "ping"}),
        vec![("mcp-session-id", "WRONG")],
    );
    transport.handle(ctx, sink.clone()).await.unwrap_err();

    assert_eq!(sink.status().await, 404);
    assert!(sink.body().await.contains("\"code\":-32001"));
}

/// S4: only one standalone GET stream is allowed per session.
#[tokio::test]
async fn s4_duplicate_get_stream_conflicts() {
    let handler = RecordingHandler::new();
    let transport = StreamableHttpTransport::new(TransportConfig::stateless(), handler.clone());
    init_session(&transport, vec![]).await;

    let first = MockSink::new();
    transport.handle(get_ctx(vec![]), first.clone()).await.unwrap();
    assert_eq!(first.status().await, 200);
    assert!(!first.is_closed());

    let second = MockSink::new();
    let err = transport
        .handle(get_ctx(vec![]), second.clone())
        .await
        .unwrap_err();

    assert_eq!(second.status().await, 409);
    assert!(second
        .body()
        .await
        .contains("Conflict: Only one SSE stream is allowed per session"));
    assert!(second.body().await.contains("\"code\":-32000"));
    assert!(err.to_string().contains("Only one SSE stream"));
}

/// S5: a JSON-mode batch response preserves input order regardless of the
/// order `send` is called in, and is delivered as a single HTTP response.
#[tokio::test]
async fn s5_batch_json_mode_preserves_input_order() {
    let handler = RecordingHandler::new();
    let config = TransportConfig {
        session_id_generator: None,
        enable_json_response: true,
        ..Default::default()
    };
    let transport = StreamableHttpTransport::new(config, handler.clone());
    init_session(&transport, vec![]).await;

    let sink = MockSink::new();
    let ctx = post_ctx(
        json!([
            {"jsonrpc": "2.0", "id": 10, "method": "a"},
            {"jsonrpc": "2.0", "id": 11, "method": "b"},
        ]),
        vec![],
    );
    transport.handle(ctx, sink.clone()).await.unwrap();
    assert_eq!(sink.status().await, 200);
    assert!(!sink.is_closed());

    let resp11 =
        JsonRpcMessage::from_value(json!({"jsonrpc": "2.0", "id": 11, "result": {"v": "b"}}))
            .unwrap();
    let resp10 =
        JsonRpcMessage::from_value(json!({"jsonrpc": "2.0", "id": 10, "result": {"v": "a"}}))
            .unwrap();
    transport.send(resp11, None).await.unwrap();
    assert!(!sink.is_closed(), "batch isn't complete after only one response");
    transport.send(resp10, None).await.unwrap();

    assert!(sink.is_closed());
    assert_eq!(
        sink.header("Content-Type").await.as_deref(),
        Some("application/json")
    );
    let body: Value = serde_json::from_str(&sink.body().await).unwrap();
    let array = body.as_array().unwrap();
    assert_eq!(array.len(), 2);
    assert_eq!(array[0]["id"], 10);
    assert_eq!(array[1]["id"], 11);
}

/// S6: reconnecting with `Last-Event-ID` replays everything stored after
/// it, in order, and leaves the stream open for further events.
#[tokio::test]
async fn s6_resume_replays_events_after_last_event_id() {
    let store = Arc::new(InMemoryEventStore::new());
    let stream_x = "X".to_string();
    let e1 = store.store_event(&stream_x, "\"one\"".to_string()).await.unwrap();
    let e2 = store.store_event(&stream_x, "\"two\"".to_string()).await.unwrap();
    let e3 = store.store_event(&stream_x, "\"three\"".to_string()).await.unwrap();

    let handler = RecordingHandler::new();
    let config = TransportConfig {
        session_id_generator: None,
        event_store: Some(store),
        ..Default::default()
    };
    let transport = StreamableHttpTransport::new(config, handler.clone());
    init_session(&transport, vec![]).await;

    let sink = MockSink::new();
    transport
        .handle(get_ctx(vec![("last-event-id", &e1)]), sink.clone())
        .await
        .unwrap();

    assert_eq!(sink.status().await, 200);
    let frames = sink.writes().await;
    assert_eq!(frames.len(), 2);
    assert!(frames[0].contains(&format!("id: {e2}")));
    assert!(frames[0].contains("\"two\""));
    assert!(frames[1].contains(&format!("id: {e3}")));
    assert!(frames[1].contains("\"three\""));
    assert!(!sink.is_closed(), "a resumed stream stays open for further events");
}

#[tokio::test]
async fn unknown_method_returns_405_with_allow_header() {
    let handler = RecordingHandler::new();
    let transport = StreamableHttpTransport::new(TransportConfig::stateless(), handler);
    let sink = MockSink::new();
    let ctx = RequestContext::new(Method::PUT, header_map(vec![]), String::new());
    transport.handle(ctx, sink.clone()).await.unwrap_err();

    assert_eq!(sink.status().await, 405);
    assert_eq!(
        sink.header("Allow").await.as_deref(),
        Some("GET, POST, DELETE")
    );
}

#[tokio::test]
async fn post_without_both_accept_types_is_rejected() {
    let handler = RecordingHandler::new();
    let transport = StreamableHttpTransport::new(TransportConfig::stateless(), handler);
    let sink = MockSink::new();
    let ctx = RequestContext::new(
        Method::POST,
        header_map(vec![
            ("accept", "application/json"),
            ("content-type", "application/json"),
        ]),
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}).to_string(),
    );
    transport.handle(ctx, sink.clone()).await.unwrap_err();
    assert_eq!(sink.status().await, 406);
}

#[tokio::test]
async fn post_with_non_json_content_type_is_rejected() {
    let handler = RecordingHandler::new();
    let transport = StreamableHttpTransport::new(TransportConfig::stateless(), handler);
    let sink = MockSink::new();
    let ctx = RequestContext::new(
        Method::POST,
        header_map(vec![
            ("accept", "application/json, text/event-stream"),
            ("content-type", "text/plain"),
        ]),
        "not json".to_string(),
    );
    transport.handle(ctx, sink.clone()).await.unwrap_err();
    assert_eq!(sink.status().await, 415);
}

/// A POST carrying only notifications/responses gets an immediate 202 and
/// every message still reaches the upper layer (§8 invariant list).
#[tokio::test]
async fn post_with_no_requests_returns_202_and_dispatches() {
    let handler = RecordingHandler::new();
    let transport = StreamableHttpTransport::new(TransportConfig::stateless(), handler.clone());
    init_session(&transport, vec![]).await;

    let sink = MockSink::new();
    let ctx = post_ctx(
        json!({"jsonrpc": "2.0", "method": "notifications/progress", "params": {}}),
        vec![],
    );
    transport.handle(ctx, sink.clone()).await.unwrap();

    assert_eq!(sink.status().await, 202);
    assert!(sink.is_closed());
    assert_eq!(handler.message_count().await, 1);
}

/// A batch containing an initialize request alongside anything else is
/// rejected outright (§3 invariant 3).
#[tokio::test]
async fn batch_with_initialize_and_other_messages_is_rejected() {
    let handler = RecordingHandler::new();
    let transport = StreamableHttpTransport::new(TransportConfig::stateless(), handler);
    let sink = MockSink::new();
    let ctx = post_ctx(
        json!([
            {"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}},
            {"jsonrpc": "2.0", "id": 2, "method": "ping"},
        ]),
        vec![],
    );
    transport.handle(ctx, sink.clone()).await.unwrap_err();
    assert_eq!(sink.status().await, 400);
}

/// Re-initializing an already-initialized session is rejected.
#[tokio::test]
async fn reinitialize_after_initialized_is_rejected() {
    let handler = RecordingHandler::new();
    let config = TransportConfig {
        session_id_generator: Some(Arc::new(FixedSessionIdGenerator("S-1"))),
        ..Default::default()
    };
    let transport = StreamableHttpTransport::new(config, handler.clone());
    init_session(&transport, vec![]).await;

    let sink = MockSink::new();
    let ctx = post_ctx(
        json!({"jsonrpc": "2.0", "id": 99, "method": "initialize", "params": {}}),
        vec![],
    );
    transport.handle(ctx, sink.clone()).await.unwrap_err();
    assert_eq!(sink.status().await, 400);
}

/// A stateless-mode POST before the first initialize still gets rejected —
/// the `initialized` flag gates every non-init request regardless of
/// session mode (SPEC_FULL.md §9 open question).
#[tokio::test]
async fn stateless_mode_still_requires_initialization_first() {
    let handler = RecordingHandler::new();
    let transport = StreamableHttpTransport::new(TransportConfig::stateless(), handler);
    let sink = MockSink::new();
    let ctx = post_ctx(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}), vec![]);
    transport.handle(ctx, sink.clone()).await.unwrap_err();
    assert_eq!(sink.status().await, 400);
}

/// Client disconnect tears the stream down, freeing the standalone-stream
/// slot for a subsequent GET (§5 cancellation).
#[tokio::test]
async fn disconnect_frees_the_standalone_stream_slot() {
    let handler = RecordingHandler::new();
    let transport = StreamableHttpTransport::new(TransportConfig::stateless(), handler.clone());
    init_session(&transport, vec![]).await;

    let first = MockSink::new();
    transport.handle(get_ctx(vec![]), first.clone()).await.unwrap();

    first.disconnect();
    sleep(Duration::from_millis(50)).await;
    assert!(first.is_closed());

    let second = MockSink::new();
    transport.handle(get_ctx(vec![]), second.clone()).await.unwrap();
    assert_eq!(second.status().await, 200);
}

/// `send` for a request id whose stream already disconnected surfaces via
/// `on_error` instead of panicking (§7 internal invariant breach).
#[tokio::test]
async fn send_for_orphaned_request_id_surfaces_on_error() {
    let handler = RecordingHandler::new();
    let config = TransportConfig {
        session_id_generator: Some(Arc::new(FixedSessionIdGenerator("S-1"))),
        ..Default::default()
    };
    let transport = StreamableHttpTransport::new(config, handler.clone());

    let sink = MockSink::new();
    let ctx = post_ctx(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}), vec![]);
    transport.handle(ctx, sink.clone()).await.unwrap();

    sink.disconnect();
    sleep(Duration::from_millis(50)).await;

    let response =
        JsonRpcMessage::from_value(json!({"jsonrpc": "2.0", "id": 1, "result": {}})).unwrap();
    transport.send(response, None).await.unwrap_err();
    assert_eq!(handler.errors.lock().await.len(), 1);
}

/// `close()` tears down every open stream exactly once and fires
/// `on_close` (§4.6.6, §8 invariant list).
#[tokio::test]
async fn close_shuts_down_every_open_stream_once() {
    let handler = RecordingHandler::new();
    let transport = StreamableHttpTransport::new(TransportConfig::stateless(), handler.clone());
    init_session(&transport, vec![]).await;

    let standalone = MockSink::new();
    transport
        .handle(get_ctx(vec![]), standalone.clone())
        .await
        .unwrap();
    assert!(!standalone.is_closed());

    transport.close().await;
    assert!(standalone.is_closed());
    assert!(handler.is_closed());

    // idempotent: a second close doesn't panic or double-fire on_close.
    transport.close().await;
}

/// A request whose `Host` header isn't on the configured allowlist is
/// rejected as a DNS-rebinding attempt before it ever reaches routing.
#[tokio::test]
async fn dns_rebinding_protection_rejects_unknown_host() {
    let handler = RecordingHandler::new();
    let config = TransportConfig {
        allowed_hosts: Some(vec!["localhost".to_string(), "127.0.0.1".to_string()]),
        ..TransportConfig::stateless()
    };
    let transport = StreamableHttpTransport::new(config, handler.clone());

    let sink = MockSink::new();
    let ctx = post_ctx(
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}),
        vec![("host", "evil.example.com")],
    );
    transport.handle(ctx, sink.clone()).await.unwrap_err();
    assert_eq!(sink.status().await, 403);
    assert_eq!(handler.message_count().await, 0);

    let sink_ok = MockSink::new();
    let ctx_ok = post_ctx(
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}),
        vec![("host", "localhost")],
    );
    transport.handle(ctx_ok, sink_ok.clone()).await.unwrap();
    assert_eq!(sink_ok.status().await, 200);
}

#[tokio::test]
async fn start_twice_is_rejected() {
    let handler = RecordingHandler::new();
    let transport = StreamableHttpTransport::new(TransportConfig::stateless(), handler);
    transport.start().unwrap();
    assert!(transport.start().is_err());
}
