use async_trait::async_trait;
use http::{HeaderMap, Method};

/// The minimal request-side view the transport needs: method, a
/// case-insensitive header map, and the fully-read UTF-8 body. JSON-RPC
/// bodies are parsed whole, so the transport never needs partial reads.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: String,
}

impl RequestContext {
    pub fn new(method: Method, headers: HeaderMap, body: String) -> Self {
        Self {
            method,
            headers,
            body,
        }
    }

    /// Case-insensitive header lookup; non-UTF8 header values are treated
    /// as absent rather than erroring, since every caller here only cares
    /// about plain ASCII tokens (`Accept`, `mcp-session-id`, ...).
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }

    /// True if the `Accept` header is present and contains `needle` as a
    /// substring (case-insensitive). Good enough for the two fixed media
    /// types (`application/json`, `text/event-stream`) this transport ever
    /// checks for; it does not parse quality values or wildcards.
    pub fn accept_contains(&self, needle: &str) -> bool {
        self.header("accept")
            .map(|accept| accept.to_ascii_lowercase().contains(needle))
            .unwrap_or(false)
    }

    /// True if `Content-Type`'s MIME type (ignoring `; charset=...`) is
    /// exactly `application/json`.
    pub fn content_type_is_json(&self) -> bool {
        self.header("content-type")
            .map(|content_type| {
                content_type
                    .split(';')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .eq_ignore_ascii_case("application/json")
            })
            .unwrap_or(false)
    }
}

/// The response-side contract a concrete HTTP stack must provide.
///
/// Two usage patterns are supported by the same trait: *buffered* (set
/// status/headers, call `write` any number of times, then `close` sends
/// everything at once) and *streaming* (`flush` commits status/headers
/// immediately, each `write` pushes a chunk to the wire right away). The
/// transport picks the pattern per response based on content type; an
/// adapter that can't distinguish them may always flush eagerly.
#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn set_status(&self, status: u16);

    async fn set_header(&self, name: &str, value: &str);

    /// Appends `chunk` to the response body.
    async fn write(&self, chunk: &str) -> bool;

    /// Best-effort push of buffered output to the wire. For a purely
    /// buffered adapter this may be a no-op until `close`.
    async fn flush(&self);

    /// Ends the response. Idempotent from the transport's point of view:
    /// it is only ever called once per sink, but an adapter should not
    /// panic if invoked twice defensively.
    async fn close(&self);

    /// Resolves once the client has disconnected. Used to tear down
    /// stream bookkeeping and cancel keep-alive timers promptly.
    async fn wait_disconnected(&self);

    /// Hint that subsequent `write` calls should (or should not) be
    /// coalesced into a single buffered send rather than streamed chunk by
    /// chunk. Adapters that can't distinguish the two response semantics
    /// (§4.1) are free to ignore this entirely; the default no-op does
    /// exactly that.
    async fn buffer_output(&self, _buffered: bool) {}
}
