//! Errors returned across the controller API.
//!
//! Only caller misuse is reported here. Engine-originated failures travel on the
//! session's error stream instead.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The operation needs a live engine and the session has none.
    #[error("invalid state for session {session_id}: {reason}")]
    InvalidState {
        session_id: String,
        reason: &'static str,
    },

    /// The session was closed and cannot be used again.
    #[error("session {0} is closed")]
    Closed(String),
}

impl SessionError {
    pub(crate) fn no_engine(session_id: &str) -> Self {
        SessionError::InvalidState {
            session_id: session_id.to_string(),
            reason: "no live engine",
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
