//! Session error types.

use crate::kv::KvError;
use thiserror::Error;

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] KvError),

    /// Session not found or expired
    #[error("Session not found")]
    NotFound,

    /// Concurrent logins of the same user kept replacing the session index
    #[error("Session index contended")]
    Contended,

    /// Session record could not be encoded
    #[error("Session encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl SessionError {
    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            SessionError::NotFound => "not_authenticated".to_string(),
            _ => "internal_error".to_string(),
        }
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
