use super::{EventStore, ReplayedEvents};
use crate::error::{TransportError, TransportResult};
use crate::ids::{EventId, StreamId};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

const ID_SEPARATOR: &str = "-.-";

/// Caps the number of retained events per stream; oldest events are evicted
/// once a stream exceeds this, matching the bounded-replay-window behavior
/// real MCP clients expect (unbounded growth would otherwise leak memory for
/// long-lived sessions with no reconnects).
const MAX_EVENTS_PER_STREAM: usize = 256;

struct EventEntry {
    seq: u64,
    message: String,
}

/// In-memory [`EventStore`] suitable for a single-process server or tests.
///
/// Event ids are `"<stream_id>-.-<sequence>"`, a monotonic per-stream
/// counter rather than a timestamp: it sidesteps clock-resolution collisions
/// when many events are stored in the same instant, at the cost of the id
/// no longer doubling as a wall-clock marker.
#[derive(Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamId, VecDeque<EventEntry>>>,
    counters: RwLock<HashMap<StreamId, AtomicU64>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn format_id(stream_id: &StreamId, seq: u64) -> EventId {
        format!("{stream_id}{ID_SEPARATOR}{seq}")
    }

    fn parse_id(event_id: &EventId) -> TransportResult<(StreamId, u64)> {
        let (stream_id, seq) = event_id.rsplit_once(ID_SEPARATOR).ok_or_else(|| {
            TransportError::EventStore(format!("malformed event id: {event_id}"))
        })?;
        let seq: u64 = seq
            .parse()
            .map_err(|_| TransportError::EventStore(format!("malformed event id: {event_id}")))?;
        Ok((stream_id.to_string(), seq))
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn store_event(
        &self,
        stream_id: &StreamId,
        message: String,
    ) -> TransportResult<EventId> {
        let seq = {
            let mut counters = self.counters.write().await;
            let counter = counters
                .entry(stream_id.clone())
                .or_insert_with(|| AtomicU64::new(0));
            counter.fetch_add(1, Ordering::SeqCst) + 1
        };

        tracing::trace!(%stream_id, seq, "storing event");

        let mut streams = self.streams.write().await;
        let entries = streams.entry(stream_id.clone()).or_default();
        if entries.len() >= MAX_EVENTS_PER_STREAM {
            entries.pop_front();
        }
        entries.push_back(EventEntry { seq, message });

        Ok(Self::format_id(stream_id, seq))
    }

    async fn replay_events_after(&self, last_event_id: &EventId) -> Option<ReplayedEvents> {
        let (stream_id, seq) = Self::parse_id(last_event_id).ok().or_else(|| {
            tracing::warn!(%last_event_id, "malformed event id, cannot resume");
            None
        })?;
        let streams = self.streams.read().await;
        let Some(entries) = streams.get(&stream_id) else {
            tracing::warn!(%stream_id, "could not find stream in the store");
            return None;
        };

        let events: Vec<_> = entries
            .iter()
            .filter(|entry| entry.seq > seq)
            .map(|entry| (Self::format_id(&stream_id, entry.seq), entry.message.clone()))
            .collect();

        tracing::trace!(%stream_id, count = events.len(), "replaying events after {last_event_id}");

        Some(ReplayedEvents { stream_id, events })
    }

    async fn clear_stream(&self, stream_id: &StreamId) {
        self.streams.write().await.remove(stream_id);
        self.counters.write().await.remove(stream_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_events_with_increasing_ids() {
        let store = InMemoryEventStore::new();
        let stream = "s1".to_string();
        let id1 = store.store_event(&stream, "a".into()).await.unwrap();
        let id2 = store.store_event(&stream, "b".into()).await.unwrap();
        assert_ne!(id1, id2);
    }

    #[tokio::test]
    async fn replays_events_after_given_id() {
        let store = InMemoryEventStore::new();
        let stream = "s1".to_string();
        let id1 = store.store_event(&stream, "a".into()).await.unwrap();
        store.store_event(&stream, "b".into()).await.unwrap();
        store.store_event(&stream, "c".into()).await.unwrap();

        let replay = store.replay_events_after(&id1).await.unwrap();
        assert_eq!(replay.stream_id, stream);
        assert_eq!(replay.events.len(), 2);
        assert_eq!(replay.events[0].1, "b");
        assert_eq!(replay.events[1].1, "c");
    }

    #[tokio::test]
    async fn unknown_event_id_returns_none() {
        let store = InMemoryEventStore::new();
        assert!(store
            .replay_events_after(&"nonexistent-.-1".to_string())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn evicts_oldest_events_past_capacity() {
        let store = InMemoryEventStore::new();
        let stream = "s1".to_string();
        let mut first_id = None;
        for i in 0..MAX_EVENTS_PER_STREAM + 10 {
            let id = store.store_event(&stream, i.to_string()).await.unwrap();
            if i == 0 {
                first_id = Some(id);
            }
        }
        let replay = store.replay_events_after(&first_id.unwrap()).await;
        assert!(replay.is_none() || replay.unwrap().events.len() <= MAX_EVENTS_PER_STREAM);
    }

    #[tokio::test]
    async fn clear_stream_removes_all_events() {
        let store = InMemoryEventStore::new();
        let stream = "s1".to_string();
        let id = store.store_event(&stream, "a".into()).await.unwrap();
        store.clear_stream(&stream).await;
        assert!(store.replay_events_after(&id).await.is_none());
    }
}
