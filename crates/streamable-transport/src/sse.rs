use chrono::Utc;
use serde_json::Value;
use std::fmt;

pub const KEEP_ALIVE_COMMENT_PREFIX: &str = ": keep-alive ";

/// A single `event: message` SSE frame, with an optional resumability id.
///
/// Mirrors the wire format the spec mandates exactly:
///
/// ```text
/// event: message
/// id: <event-id>        (only when present)
/// data: <compact-json>
///
/// ```
#[derive(Debug, Clone)]
pub struct SseEvent {
    id: Option<String>,
    data: Value,
}

impl SseEvent {
    pub fn new(data: Value) -> Self {
        Self { id: None, data }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

impl fmt::Display for SseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "event: message")?;
        if let Some(id) = &self.id {
            writeln!(f, "id: {id}")?;
        }
        writeln!(f, "data: {}", self.data)?;
        writeln!(f)
    }
}

/// Renders the SSE comment line used as a keep-alive ping. Comments are
/// ignored by conforming SSE clients, so this never needs an id.
pub fn keep_alive_comment() -> String {
    format!(
        "{}{}\n\n",
        KEEP_ALIVE_COMMENT_PREFIX,
        Utc::now().to_rfc3339()
    )
}
