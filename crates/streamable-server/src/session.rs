use crate::error::TransportServerError;
use streamable_transport::SessionId;
use uuid::Uuid;

/// Generates the opaque session id handed back to clients on successful
/// initialization. `None` selects stateless mode: no id is generated and no
/// `mcp-session-id` header is required on subsequent requests.
pub trait SessionIdGenerator: Send + Sync {
    fn generate(&self) -> SessionId;
}

/// Default generator: a fresh UUID v4 per session, matching the teacher
/// crate's own `UuidGenerator`.
#[derive(Debug, Default)]
pub struct UuidSessionIdGenerator;

impl SessionIdGenerator for UuidSessionIdGenerator {
    fn generate(&self) -> SessionId {
        Uuid::new_v4().to_string()
    }
}

/// The lifecycle of a single transport instance (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initialized,
    Closed,
}

/// Validates a non-initialization request against the session rules in
/// §4.5. Initialization requests are validated separately by the caller
/// (they have their own rules: reject re-init, reject multi-message batches).
pub fn validate_session(
    state: SessionState,
    session_id: Option<&SessionId>,
    header_session_id: Option<&str>,
) -> Result<(), TransportServerError> {
    if state != SessionState::Initialized {
        return Err(TransportServerError::NotInitialized);
    }

    let Some(session_id) = session_id else {
        // Stateless mode: no session id was ever generated, so there is
        // nothing to validate against.
        return Ok(());
    };

    match header_session_id {
        None => Err(TransportServerError::SessionIdMissing),
        Some(header) if header != session_id => Err(TransportServerError::SessionNotFound),
        Some(_) => Ok(()),
    }
}
