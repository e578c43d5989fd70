use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use http::Method;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use streamable_transport::{
    keep_alive_comment, JsonRpcMessage, RequestId, SessionId, SseEvent, StreamId, GET_STREAM_ID,
};

use crate::adapter::{RequestContext, ResponseSink};
use crate::config::TransportConfig;
use crate::error::{TransportServerError, TransportServerResult};
use crate::session::{validate_session, SessionState};

/// Callbacks the upper MCP layer registers with a transport instance (§6).
///
/// `on_message` is the transport's half of the cyclic `on_message` / `send`
/// relationship described in §9: it is always invoked with the internal
/// state lock released, so an upper-layer handler is free to call back into
/// [`StreamableHttpTransport::send`] from within it without deadlocking.
#[async_trait]
pub trait TransportHandler: Send + Sync + 'static {
    /// Called once per inbound JSON-RPC message (request, notification,
    /// response, or error) after routing has been established.
    async fn on_message(&self, message: JsonRpcMessage, session_id: Option<SessionId>);

    /// Called exactly once, right after a stateful session is assigned an
    /// id by the initialization handshake.
    async fn on_session_initialized(&self, _session_id: &SessionId) {}

    /// Called once shutdown completes, after every sink has been closed.
    async fn on_close(&self) {}

    /// Called for internal invariant breaches (§7): a `send` for a request
    /// id whose stream has already disconnected, or whose sink vanished.
    /// The transport keeps running; only the affected message is lost.
    async fn on_error(&self, _error: &TransportServerError) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamMode {
    Sse,
    Json,
}

struct PendingEntry {
    /// Request ids routed to this stream, in arrival order — needed so a
    /// completed JSON-mode batch can be serialized back in input order.
    order: Vec<RequestId>,
    responses: HashMap<RequestId, Value>,
}

impl PendingEntry {
    fn is_complete(&self) -> bool {
        self.order.iter().all(|id| self.responses.contains_key(id))
    }
}

struct Inner {
    state: SessionState,
    session_id: Option<SessionId>,
    stream_sinks: HashMap<StreamId, Arc<dyn ResponseSink>>,
    stream_mode: HashMap<StreamId, StreamMode>,
    request_to_stream: HashMap<RequestId, StreamId>,
    pending: HashMap<StreamId, PendingEntry>,
    keep_alive_timers: HashMap<StreamId, JoinHandle<()>>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            state: SessionState::Uninitialized,
            session_id: None,
            stream_sinks: HashMap::new(),
            stream_mode: HashMap::new(),
            request_to_stream: HashMap::new(),
            pending: HashMap::new(),
            keep_alive_timers: HashMap::new(),
        }
    }
}

/// The transport state machine (C6): HTTP method dispatch, session gating,
/// request→stream correlation, SSE/JSON response routing, keep-alives, and
/// shutdown, all serialized through one internal lock (§5).
///
/// Always constructed behind an `Arc` ([`StreamableHttpTransport::new`])
/// because keep-alive timers and disconnect watchers are background tasks
/// that hold their own clone of it.
pub struct StreamableHttpTransport<H: TransportHandler> {
    inner: Mutex<Inner>,
    config: TransportConfig,
    handler: Arc<H>,
    started: AtomicBool,
    closing: AtomicBool,
}

impl<H: TransportHandler> StreamableHttpTransport<H> {
    pub fn new(config: TransportConfig, handler: Arc<H>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner::default()),
            config,
            handler,
            started: AtomicBool::new(false),
            closing: AtomicBool::new(false),
        })
    }

    /// Marks the transport as running. Calling this twice is a programmer
    /// error in the embedding server, not a protocol violation (§7).
    pub fn start(&self) -> TransportServerResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(TransportServerError::AlreadyStarted);
        }
        Ok(())
    }

    pub async fn session_id(&self) -> Option<SessionId> {
        self.inner.lock().await.session_id.clone()
    }

    /// Single entry point adapters dispatch every incoming request through.
    pub async fn handle(
        self: &Arc<Self>,
        ctx: RequestContext,
        sink: Arc<dyn ResponseSink>,
    ) -> TransportServerResult<()> {
        if let Err(err) = self.check_dns_rebinding(&ctx) {
            self.respond_error(&sink, &err, None).await;
            return Err(err);
        }

        match ctx.method {
            Method::POST => self.handle_post(ctx, sink).await,
            Method::GET => self.handle_get(ctx, sink).await,
            Method::DELETE => self.handle_delete(ctx, sink).await,
            _ => {
                let err = TransportServerError::MethodNotAllowed;
                sink.set_header("Allow", "GET, POST, DELETE").await;
                self.respond_error(&sink, &err, None).await;
                Err(err)
            }
        }
    }

    /// Rejects requests whose `Host`/`Origin` headers aren't on the
    /// configured allowlist, guarding a locally-bound server against DNS
    /// rebinding. A no-op whenever both lists are unset or empty.
    fn check_dns_rebinding(&self, ctx: &RequestContext) -> TransportServerResult<()> {
        if let Some(allowed_hosts) = self.config.allowed_hosts.as_ref().filter(|h| !h.is_empty()) {
            let host = ctx.header("host");
            let ok = host
                .as_deref()
                .is_some_and(|host| allowed_hosts.iter().any(|allowed| allowed.eq_ignore_ascii_case(host)));
            if !ok {
                let shown = host.as_deref().unwrap_or("unknown");
                return Err(TransportServerError::Forbidden(format!(
                    "Invalid Host header: \"{shown}\""
                )));
            }
        }

        if let Some(allowed_origins) = self
            .config
            .allowed_origins
            .as_ref()
            .filter(|o| !o.is_empty())
        {
            let origin = ctx.header("origin");
            let ok = origin.as_deref().is_some_and(|origin| {
                allowed_origins
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(origin))
            });
            if !ok {
                let shown = origin.as_deref().unwrap_or("unknown");
                return Err(TransportServerError::Forbidden(format!(
                    "Invalid Origin header: \"{shown}\""
                )));
            }
        }

        Ok(())
    }

    // ---- §4.6.1 POST ----------------------------------------------------

    async fn handle_post(
        self: &Arc<Self>,
        ctx: RequestContext,
        sink: Arc<dyn ResponseSink>,
    ) -> TransportServerResult<()> {
        if !ctx.accept_contains("application/json") || !ctx.accept_contains("text/event-stream") {
            let err = TransportServerError::NotAcceptable(
                "Accept header must contain both application/json and text/event-stream".into(),
            );
            self.respond_error(&sink, &err, None).await;
            return Err(err);
        }
        if !ctx.content_type_is_json() {
            let err = TransportServerError::UnsupportedMediaType(
                "Content-Type must be application/json".into(),
            );
            self.respond_error(&sink, &err, None).await;
            return Err(err);
        }

        let messages = match JsonRpcMessage::parse_body(&ctx.body) {
            Ok(messages) => messages,
            Err(parse_err) => {
                let err = TransportServerError::Codec(parse_err);
                self.respond_error(&sink, &err, None).await;
                return Err(err);
            }
        };

        let init_count = messages.iter().filter(|m| m.is_initialize_request()).count();
        if init_count > 0 {
            if messages.len() > 1 {
                let err = TransportServerError::BatchInitializeNotAllowed;
                self.respond_error(&sink, &err, None).await;
                return Err(err);
            }
            if let Err(err) = self.initialize_session().await {
                self.respond_error(&sink, &err, None).await;
                return Err(err);
            }
        } else {
            let (state, session_id) = {
                let inner = self.inner.lock().await;
                (inner.state, inner.session_id.clone())
            };
            let header_session_id = ctx.header("mcp-session-id");
            if let Err(err) =
                validate_session(state, session_id.as_ref(), header_session_id.as_deref())
            {
                self.respond_error(&sink, &err, None).await;
                return Err(err);
            }
        }

        let has_requests = messages.iter().any(JsonRpcMessage::is_request);
        if !has_requests {
            sink.set_status(202).await;
            sink.close().await;
            for message in messages {
                self.dispatch_message(message).await;
            }
            return Ok(());
        }

        self.open_response_stream(messages, sink).await
    }

    async fn initialize_session(self: &Arc<Self>) -> TransportServerResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != SessionState::Uninitialized {
            return Err(TransportServerError::AlreadyInitialized);
        }
        let session_id = self
            .config
            .session_id_generator
            .as_ref()
            .map(|generator| generator.generate());
        inner.session_id = session_id.clone();
        inner.state = SessionState::Initialized;
        drop(inner);

        if let Some(session_id) = session_id {
            self.handler.on_session_initialized(&session_id).await;
        }
        Ok(())
    }

    /// Allocates a fresh `stream_id`, registers every request id in the
    /// batch under it, sends the response headers for the chosen mode, and
    /// fans every message out to the upper layer (§4.6.1 steps 7–8).
    async fn open_response_stream(
        self: &Arc<Self>,
        messages: Vec<JsonRpcMessage>,
        sink: Arc<dyn ResponseSink>,
    ) -> TransportServerResult<()> {
        let stream_id = uuid::Uuid::new_v4().to_string();
        let request_ids: Vec<RequestId> = messages
            .iter()
            .filter(|m| m.is_request())
            .filter_map(JsonRpcMessage::id)
            .collect();

        let session_id = self.inner.lock().await.session_id.clone();
        let mode = if self.config.enable_json_response {
            StreamMode::Json
        } else {
            StreamMode::Sse
        };

        sink.set_status(200).await;
        match mode {
            StreamMode::Sse => {
                sink.set_header("Content-Type", "text/event-stream").await;
                sink.set_header("Cache-Control", "no-cache, no-transform")
                    .await;
                sink.set_header("Connection", "keep-alive").await;
            }
            StreamMode::Json => {
                sink.set_header("Content-Type", "application/json").await;
            }
        }
        if let Some(session_id) = &session_id {
            sink.set_header("mcp-session-id", session_id).await;
        }
        if mode == StreamMode::Sse {
            sink.flush().await;
        }

        {
            let mut inner = self.inner.lock().await;
            inner.stream_sinks.insert(stream_id.clone(), sink.clone());
            inner.stream_mode.insert(stream_id.clone(), mode);
            inner.pending.insert(
                stream_id.clone(),
                PendingEntry {
                    order: request_ids.clone(),
                    responses: HashMap::new(),
                },
            );
            for request_id in &request_ids {
                inner
                    .request_to_stream
                    .insert(request_id.clone(), stream_id.clone());
            }
        }

        if mode == StreamMode::Sse {
            self.arm_keep_alive(stream_id.clone(), sink.clone()).await;
        }
        self.watch_disconnect(stream_id.clone(), sink).await;

        for message in messages {
            self.dispatch_message(message).await;
        }
        Ok(())
    }

    // ---- §4.6.2 GET -------------------------------------------------------

    async fn handle_get(
        self: &Arc<Self>,
        ctx: RequestContext,
        sink: Arc<dyn ResponseSink>,
    ) -> TransportServerResult<()> {
        if !ctx.accept_contains("text/event-stream") {
            let err = TransportServerError::NotAcceptable(
                "Accept header must contain text/event-stream".into(),
            );
            self.respond_error(&sink, &err, None).await;
            return Err(err);
        }

        let (state, session_id) = {
            let inner = self.inner.lock().await;
            (inner.state, inner.session_id.clone())
        };
        let header_session_id = ctx.header("mcp-session-id");
        if let Err(err) =
            validate_session(state, session_id.as_ref(), header_session_id.as_deref())
        {
            self.respond_error(&sink, &err, None).await;
            return Err(err);
        }

        if let Some(last_event_id) = ctx.header("last-event-id") {
            if let Some(store) = &self.config.event_store {
                if let Some(replay) = store.replay_events_after(&last_event_id).await {
                    return self
                        .open_replay_stream(replay, session_id, sink)
                        .await;
                }
                tracing::warn!(%last_event_id, "Last-Event-ID unknown to event store");
            }
        }

        self.open_standalone_stream(session_id, sink).await
    }

    async fn open_replay_stream(
        self: &Arc<Self>,
        replay: streamable_transport::ReplayedEvents,
        session_id: Option<SessionId>,
        sink: Arc<dyn ResponseSink>,
    ) -> TransportServerResult<()> {
        let stream_id = replay.stream_id;

        sink.set_status(200).await;
        sink.set_header("Content-Type", "text/event-stream").await;
        sink.set_header("Cache-Control", "no-cache, no-transform")
            .await;
        sink.set_header("Connection", "keep-alive").await;
        if let Some(session_id) = &session_id {
            sink.set_header("mcp-session-id", session_id).await;
        }
        sink.flush().await;

        {
            let mut inner = self.inner.lock().await;
            inner.stream_sinks.insert(stream_id.clone(), sink.clone());
            inner.stream_mode.insert(stream_id.clone(), StreamMode::Sse);
        }

        for (event_id, message) in replay.events {
            let data: Value = serde_json::from_str(&message).unwrap_or(Value::Null);
            let frame = SseEvent::new(data).with_id(event_id);
            if !sink.write(&frame.to_string()).await {
                self.teardown_stream(&stream_id).await;
                return Ok(());
            }
            sink.flush().await;
        }

        self.arm_keep_alive(stream_id.clone(), sink.clone()).await;
        self.watch_disconnect(stream_id, sink).await;
        Ok(())
    }

    async fn open_standalone_stream(
        self: &Arc<Self>,
        session_id: Option<SessionId>,
        sink: Arc<dyn ResponseSink>,
    ) -> TransportServerResult<()> {
        {
            let mut inner = self.inner.lock().await;
            if inner.stream_sinks.contains_key(GET_STREAM_ID) {
                drop(inner);
                let err = TransportServerError::DuplicateStandaloneStream;
                self.respond_error(&sink, &err, None).await;
                return Err(err);
            }
            // Reserve the slot before any await so a concurrent GET can't
            // also pass this check before either registers (§3 invariant 1).
            inner
                .stream_sinks
                .insert(GET_STREAM_ID.to_string(), sink.clone());
            inner
                .stream_mode
                .insert(GET_STREAM_ID.to_string(), StreamMode::Sse);
        }

        sink.set_status(200).await;
        sink.set_header("Content-Type", "text/event-stream").await;
        sink.set_header("Cache-Control", "no-cache, no-transform")
            .await;
        sink.set_header("Connection", "keep-alive").await;
        if let Some(session_id) = &session_id {
            sink.set_header("mcp-session-id", session_id).await;
        }
        sink.flush().await;

        self.arm_keep_alive(GET_STREAM_ID.to_string(), sink.clone())
            .await;
        self.watch_disconnect(GET_STREAM_ID.to_string(), sink).await;
        Ok(())
    }

    // ---- §4.6.3 DELETE ------------------------------------------------

    async fn handle_delete(
        self: &Arc<Self>,
        ctx: RequestContext,
        sink: Arc<dyn ResponseSink>,
    ) -> TransportServerResult<()> {
        let (state, session_id) = {
            let inner = self.inner.lock().await;
            (inner.state, inner.session_id.clone())
        };
        let header_session_id = ctx.header("mcp-session-id");
        if let Err(err) =
            validate_session(state, session_id.as_ref(), header_session_id.as_deref())
        {
            self.respond_error(&sink, &err, None).await;
            return Err(err);
        }

        self.close().await;
        sink.set_status(200).await;
        sink.close().await;
        Ok(())
    }

    // ---- §4.6.4 send ----------------------------------------------------

    /// Routes a message produced by the upper layer onto the correct sink
    /// (§4.6.4). `related_request_id` is ignored for responses/errors,
    /// whose routing key is always their own `id`.
    pub async fn send(
        self: &Arc<Self>,
        message: JsonRpcMessage,
        related_request_id: Option<RequestId>,
    ) -> TransportServerResult<()> {
        let is_terminal = message.is_response() || message.is_error();
        let key = if is_terminal {
            message.id()
        } else {
            related_request_id
        };

        match key {
            None => self.send_to_standalone(message).await,
            Some(request_id) => self.send_to_stream(request_id, message).await,
        }
    }

    async fn send_to_standalone(self: &Arc<Self>, message: JsonRpcMessage) -> TransportServerResult<()> {
        if message.is_response() || message.is_error() {
            let err = TransportServerError::Internal(
                "a response or error may never be routed onto the standalone GET stream".into(),
            );
            self.handler.on_error(&err).await;
            return Err(err);
        }

        let sink = {
            let inner = self.inner.lock().await;
            inner.stream_sinks.get(GET_STREAM_ID).cloned()
        };
        let Some(sink) = sink else {
            tracing::debug!("no standalone GET stream subscribed; dropping message");
            return Ok(());
        };

        if !self.write_sse_frame(GET_STREAM_ID, &sink, &message).await {
            self.teardown_stream(GET_STREAM_ID).await;
        }
        Ok(())
    }

    async fn send_to_stream(
        self: &Arc<Self>,
        request_id: RequestId,
        message: JsonRpcMessage,
    ) -> TransportServerResult<()> {
        let stream_id = {
            let inner = self.inner.lock().await;
            inner.request_to_stream.get(&request_id).cloned()
        };
        let Some(stream_id) = stream_id else {
            let err = TransportServerError::Internal(format!(
                "send() for request id {request_id} whose stream is gone"
            ));
            self.handler.on_error(&err).await;
            return Err(err);
        };

        let (mode, sink) = {
            let inner = self.inner.lock().await;
            (
                inner.stream_mode.get(&stream_id).copied(),
                inner.stream_sinks.get(&stream_id).cloned(),
            )
        };
        let (Some(mode), Some(sink)) = (mode, sink) else {
            let err = TransportServerError::Internal(format!(
                "stream {stream_id} has no registered sink"
            ));
            self.handler.on_error(&err).await;
            return Err(err);
        };

        let is_terminal = message.is_response() || message.is_error();
        match mode {
            StreamMode::Sse => {
                if !self.write_sse_frame(&stream_id, &sink, &message).await {
                    self.teardown_stream(&stream_id).await;
                    return Ok(());
                }
                if is_terminal {
                    self.complete_sse_response(&stream_id, request_id, message)
                        .await;
                }
            }
            StreamMode::Json => {
                if is_terminal {
                    self.complete_json_response(&stream_id, request_id, message)
                        .await;
                } else {
                    tracing::warn!(
                        %stream_id,
                        "dropping non-terminal message on a buffered JSON-mode stream"
                    );
                }
            }
        }
        Ok(())
    }

    async fn write_sse_frame(
        &self,
        stream_id: &str,
        sink: &Arc<dyn ResponseSink>,
        message: &JsonRpcMessage,
    ) -> bool {
        let mut event = SseEvent::new(message.as_value().clone());
        if let Some(store) = &self.config.event_store {
            let stream_id = stream_id.to_string();
            match store.store_event(&stream_id, message.as_value().to_string()).await {
                Ok(event_id) => event = event.with_id(event_id),
                Err(err) => tracing::warn!(%err, "event store failed to record event"),
            }
        }
        let ok = sink.write(&event.to_string()).await;
        if ok {
            sink.flush().await;
        }
        ok
    }

    async fn complete_sse_response(
        &self,
        stream_id: &str,
        request_id: RequestId,
        message: JsonRpcMessage,
    ) {
        let complete = {
            let mut inner = self.inner.lock().await;
            let Some(pending) = inner.pending.get_mut(stream_id) else {
                return;
            };
            pending.responses.insert(request_id, message.into_value());
            pending.is_complete()
        };
        if complete {
            self.teardown_stream(stream_id).await;
        }
    }

    async fn complete_json_response(
        &self,
        stream_id: &str,
        request_id: RequestId,
        message: JsonRpcMessage,
    ) {
        let ready = {
            let mut inner = self.inner.lock().await;
            let Some(pending) = inner.pending.get_mut(stream_id) else {
                return;
            };
            pending.responses.insert(request_id, message.into_value());
            if !pending.is_complete() {
                return;
            }
            let ordered: Vec<Value> = pending
                .order
                .iter()
                .filter_map(|id| pending.responses.remove(id))
                .collect();
            let sink = inner.stream_sinks.get(stream_id).cloned();
            let session_id = inner.session_id.clone();
            sink.map(|sink| (ordered, sink, session_id))
        };

        let Some((ordered, sink, session_id)) = ready else {
            return;
        };

        let body = if ordered.len() == 1 {
            serde_json::to_string(&ordered[0])
        } else {
            serde_json::to_string(&Value::Array(ordered))
        }
        .unwrap_or_else(|_| "null".to_string());

        sink.set_header("Content-Type", "application/json").await;
        if let Some(session_id) = &session_id {
            sink.set_header("mcp-session-id", session_id).await;
        }
        sink.write(&body).await;
        self.teardown_stream(stream_id).await;
    }

    async fn dispatch_message(&self, message: JsonRpcMessage) {
        let session_id = self.inner.lock().await.session_id.clone();
        self.handler.on_message(message, session_id).await;
    }

    // ---- keep-alive & disconnect (§4.6.5) ------------------------------

    async fn arm_keep_alive(self: &Arc<Self>, stream_id: StreamId, sink: Arc<dyn ResponseSink>) {
        let Some(interval) = self
            .config
            .keep_alive_interval
            .filter(|interval| !interval.is_zero())
        else {
            return;
        };

        let transport = Arc::clone(self);
        let sid = stream_id.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                let ok = sink.write(&keep_alive_comment()).await;
                if !ok {
                    tracing::debug!(stream_id = %sid, "keep-alive write failed, dropping stream");
                    transport.teardown_stream(&sid).await;
                    break;
                }
                sink.flush().await;
            }
        });

        let mut inner = self.inner.lock().await;
        inner.keep_alive_timers.insert(stream_id, handle);
    }

    async fn watch_disconnect(self: &Arc<Self>, stream_id: StreamId, sink: Arc<dyn ResponseSink>) {
        let transport = Arc::clone(self);
        tokio::spawn(async move {
            sink.wait_disconnected().await;
            tracing::debug!(%stream_id, "client disconnected");
            transport.teardown_stream(&stream_id).await;
        });
    }

    /// Removes every trace of `stream_id` from the maps and closes its
    /// sink. Used both for normal completion and for disconnect/write
    /// failure teardown — always safe to call more than once.
    async fn teardown_stream(&self, stream_id: &str) {
        let (sink, timer) = {
            let mut inner = self.inner.lock().await;
            let sink = inner.stream_sinks.remove(stream_id);
            inner.stream_mode.remove(stream_id);
            inner.pending.remove(stream_id);
            inner
                .request_to_stream
                .retain(|_, mapped_stream_id| mapped_stream_id != stream_id);
            let timer = inner.keep_alive_timers.remove(stream_id);
            (sink, timer)
        };
        if let Some(timer) = timer {
            timer.abort();
        }
        if let Some(sink) = sink {
            sink.close().await;
        }
        if let Some(store) = &self.config.event_store {
            store.clear_stream(&stream_id.to_string()).await;
        }
    }

    // ---- §4.6.6 shutdown ------------------------------------------------

    /// Idempotent: the first caller drains every map and closes every sink
    /// exactly once (snapshot-then-iterate, §4.6.6); later callers no-op.
    pub async fn close(self: &Arc<Self>) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }

        let (stream_ids, sinks, timers) = {
            let mut inner = self.inner.lock().await;
            inner.state = SessionState::Closed;
            let stream_ids: Vec<_> = inner.stream_sinks.keys().cloned().collect();
            let sinks: Vec<_> = inner.stream_sinks.drain().map(|(_, sink)| sink).collect();
            inner.stream_mode.clear();
            inner.request_to_stream.clear();
            inner.pending.clear();
            let timers: Vec<_> = inner.keep_alive_timers.drain().map(|(_, h)| h).collect();
            (stream_ids, sinks, timers)
        };

        for timer in timers {
            timer.abort();
        }
        for sink in sinks {
            sink.close().await;
        }
        if let Some(store) = &self.config.event_store {
            for stream_id in stream_ids {
                store.clear_stream(&stream_id).await;
            }
        }
        self.handler.on_close().await;
    }

    async fn respond_error(
        &self,
        sink: &Arc<dyn ResponseSink>,
        err: &TransportServerError,
        id: Option<&RequestId>,
    ) {
        tracing::warn!(%err, "rejecting request");
        sink.set_status(err.status_code().as_u16()).await;
        sink.set_header("Content-Type", "application/json").await;
        let body = err.to_json_rpc_error(id);
        sink.write(&serde_json::to_string(&body).unwrap_or_default())
            .await;
        sink.close().await;
    }
}
