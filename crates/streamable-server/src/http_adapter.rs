//! Framework-agnostic concrete [`ResponseSink`] (§4.1, §10.4) built directly
//! on the `http` crate and a channel-backed streaming body, so any
//! hyper-based service can drive a [`StreamableHttpTransport`] without
//! pulling in axum. The `axum` feature's [`crate::axum_routes`] module is a
//! thin wrapper around [`respond`] below.
//!
//! Grounded in the teacher crate's own `mcp_http::http_utils` module, which
//! pipes transport output through a channel/pipe wrapped by
//! `tokio_stream`'s stream adapters and fed into an `http_body_util::StreamBody`;
//! this adapter uses an unbounded mpsc channel in place of the teacher's
//! `tokio::io::duplex`, since the transport only ever writes (never reads
//! back) from its own sink.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderName, HeaderValue, Response, StatusCode};
use http_body::Frame;
use http_body_util::{combinators::BoxBody, BodyExt, StreamBody};
use tokio::sync::{mpsc, oneshot, Mutex, Notify};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{Stream, StreamExt};

/// The boxed body type every adapter in this crate hands back to its
/// framework: `Bytes` chunks, never erroring once past construction.
pub type GenericBody = BoxBody<Bytes, Infallible>;

/// Wraps the channel stream feeding a response body so its `Drop` can
/// double as the client-disconnect signal (§4.1 `wait_disconnected`):
/// hyper/axum drop the response body when the underlying connection goes
/// away mid-stream, which is exactly the moment `disconnected` needs to
/// fire.
///
/// Uses `notify_one` rather than `notify_waiters`: the latter only wakes
/// waiters already registered at the moment it's called and stores no
/// permit, so a drop racing ahead of `wait_disconnected`'s first poll would
/// be missed entirely and the stream would leak until some unrelated write
/// failure tore it down. `notify_one` stores a single permit when nobody is
/// waiting yet, which is exactly what this one-shot, single-waiter signal
/// needs.
struct DisconnectOnDrop {
    inner: UnboundedReceiverStream<Bytes>,
    disconnected: Arc<Notify>,
}

impl Stream for DisconnectOnDrop {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for DisconnectOnDrop {
    fn drop(&mut self) {
        self.disconnected.notify_one();
    }
}

fn streaming_body(
    receiver: mpsc::UnboundedReceiver<Bytes>,
    disconnected: Arc<Notify>,
) -> GenericBody {
    let stream = DisconnectOnDrop {
        inner: UnboundedReceiverStream::new(receiver),
        disconnected,
    };
    StreamBody::new(stream.map(|chunk| Ok::<_, Infallible>(Frame::data(chunk)))).boxed()
}

/// Channel-backed [`ResponseSink`]: writes become chunks on an unbounded
/// channel feeding the response's [`GenericBody`]; status/header mutations
/// buffer in memory until the adapter is ready to commit them.
///
/// "Ready to commit" is signalled once via `ready_tx`, fired at whichever
/// comes first: the transport's first [`ResponseSink::flush`] (streaming
/// mode) or its [`ResponseSink::close`] (buffered mode) — mirroring the two
/// response semantics in §4.1 without the adapter needing to know which one
/// the transport picked.
pub struct ChannelResponseSink {
    status: Mutex<StatusCode>,
    headers: Mutex<Vec<(HeaderName, HeaderValue)>>,
    sender: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    disconnected: Arc<Notify>,
    ready_tx: Mutex<Option<oneshot::Sender<()>>>,
    closed: AtomicBool,
}

impl ChannelResponseSink {
    /// Builds a fresh sink along with its body half and a one-shot signal
    /// that resolves once status/headers are ready to send.
    pub fn new() -> (Arc<Self>, GenericBody, oneshot::Receiver<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let disconnected = Arc::new(Notify::new());
        let (ready_tx, ready_rx) = oneshot::channel();

        let sink = Arc::new(Self {
            status: Mutex::new(StatusCode::OK),
            headers: Mutex::new(Vec::new()),
            sender: Mutex::new(Some(sender)),
            disconnected: Arc::clone(&disconnected),
            ready_tx: Mutex::new(Some(ready_tx)),
            closed: AtomicBool::new(false),
        });
        let body = streaming_body(receiver, disconnected);
        (sink, body, ready_rx)
    }

    async fn signal_ready(&self) {
        if let Some(tx) = self.ready_tx.lock().await.take() {
            let _ = tx.send(());
        }
    }

    /// Snapshot of the status/headers as they stand right now. Called by
    /// [`respond`] once `ready_rx` resolves.
    pub async fn head(&self) -> (StatusCode, Vec<(HeaderName, HeaderValue)>) {
        (*self.status.lock().await, self.headers.lock().await.clone())
    }
}

#[async_trait]
impl ResponseSink for ChannelResponseSink {
    async fn set_status(&self, status: u16) {
        if let Ok(code) = StatusCode::from_u16(status) {
            *self.status.lock().await = code;
        } else {
            tracing::warn!(status, "ignoring out-of-range HTTP status code");
        }
    }

    async fn set_header(&self, name: &str, value: &str) {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => self.headers.lock().await.push((name, value)),
            _ => tracing::warn!(name, value, "dropping malformed response header"),
        }
    }

    async fn write(&self, chunk: &str) -> bool {
        let sender = self.sender.lock().await;
        match sender.as_ref() {
            Some(sender) => sender.send(Bytes::copy_from_slice(chunk.as_bytes())).is_ok(),
            None => false,
        }
    }

    async fn flush(&self) {
        self.signal_ready().await;
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.signal_ready().await;
        self.sender.lock().await.take();
    }

    async fn wait_disconnected(&self) {
        self.disconnected.notified().await;
    }
}

fn fallback_response() -> Response<GenericBody> {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .body(http_body_util::Empty::new().boxed())
        .expect("a response with no headers and a fixed status always builds")
}

/// Drives one HTTP request through `transport` and returns the finished
/// [`http::Response`], streaming or buffered depending on what the
/// transport chose (§4.1).
///
/// Spawns the actual `transport.handle(..)` call as a background task so
/// this function can return as soon as status/headers are ready, while the
/// body continues streaming independently through the channel.
pub async fn respond<H: TransportHandler>(
    transport: Arc<StreamableHttpTransport<H>>,
    ctx: RequestContext,
) -> Response<GenericBody> {
    let (sink, body, ready_rx) = ChannelResponseSink::new();
    let dyn_sink: Arc<dyn ResponseSink> = sink.clone();

    tokio::spawn(async move {
        if let Err(err) = transport.handle(ctx, dyn_sink).await {
            tracing::debug!(%err, "streamable HTTP request ended in a handled error");
        }
    });

    if ready_rx.await.is_err() {
        tracing::error!("response sink dropped before committing status/headers");
        return fallback_response();
    }

    let (status, headers) = sink.head().await;
    let mut builder = Response::builder().status(status);
    for (name, value) in headers {
        builder = builder.header(name, value);
    }
    match builder.body(body) {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(%err, "failed to build HTTP response");
            fallback_response()
        }
    }
}
