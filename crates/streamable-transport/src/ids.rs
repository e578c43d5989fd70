/// Opaque session identifier, generated once per stateful session.
pub type SessionId = String;

/// Identifies a single SSE stream within a session: either the reserved
/// standalone GET stream or a fresh id minted per POST.
pub type StreamId = String;

/// A monotonically increasing id assigned to a stored event, used for
/// `Last-Event-ID` resumption.
pub type EventId = String;

/// Reserved stream id for the at-most-one standalone GET stream per session.
pub const GET_STREAM_ID: &str = "_GET_stream";
