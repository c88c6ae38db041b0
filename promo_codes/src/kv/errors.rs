//! Key-value store error types.

use std::time::Duration;
use thiserror::Error;

/// Key-value store errors
#[derive(Debug, Error)]
pub enum KvError {
    /// Database error from the durable backend
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Store operation exceeded its deadline
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    /// Stored value could not be encoded or decoded
    #[error("Malformed value at {key}: {reason}")]
    Malformed { key: String, reason: String },
}

impl KvError {
    /// Get a client-safe error message
    ///
    /// Store internals (SQL, key names) never reach the client.
    pub fn client_message(&self) -> String {
        "Internal server error".to_string()
    }
}

/// Result type for key-value operations
pub type KvResult<T> = Result<T, KvError>;
