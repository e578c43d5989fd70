pub mod in_memory_event_store;

use crate::error::TransportResult;
use crate::ids::{EventId, StreamId};
use async_trait::async_trait;

/// A batch of events replayed for a reconnecting client, in order.
#[derive(Debug, Clone)]
pub struct ReplayedEvents {
    pub stream_id: StreamId,
    pub events: Vec<(EventId, String)>,
}

/// Append-only log of outbound messages, keyed by stream, used to support
/// `Last-Event-ID` resumption.
///
/// The spec describes replay as the store invoking a `send` callback for
/// each recovered event; this trait returns the ordered batch instead so
/// callers can frame and dispatch events without holding a closure live
/// across an `.await` point. The observable behavior — an in-order replay
/// that ends exactly at "caught up" — is identical.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends `message` to `stream_id`'s log and returns the id assigned to
    /// it. Ids are strictly increasing within a stream.
    async fn store_event(&self, stream_id: &StreamId, message: String) -> TransportResult<EventId>;

    /// Returns every event stored strictly after `last_event_id`, in order,
    /// together with the stream id they belong to. Returns `None` if
    /// `last_event_id` is unknown to this store.
    async fn replay_events_after(&self, last_event_id: &EventId) -> Option<ReplayedEvents>;

    /// Drops every event recorded for `stream_id`. Called when a stream
    /// closes or its session is torn down.
    async fn clear_stream(&self, stream_id: &StreamId);
}
