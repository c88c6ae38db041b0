//! Claim error types.

use crate::kv::KvError;
use thiserror::Error;

/// Claim and pool errors
#[derive(Debug, Error)]
pub enum ClaimError {
    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] KvError),

    /// The pool holds no codes
    #[error("No codes left")]
    NoCodesLeft,

    /// Every allocation attempt lost a race for its candidate code
    #[error("Allocation lost the race {attempts} times")]
    RaceExhausted { attempts: u32 },

    /// A claim exists for the user but could not be read back
    #[error("User already holds a claim")]
    AlreadyClaimed,

    /// Code is not in the pool (never seeded or already claimed)
    #[error("Code not in pool: {0}")]
    CodeNotFound(String),

    /// Code rejected by the seeder
    #[error("Invalid code: {0:?}")]
    InvalidCode(String),

    /// Claim or code record could not be encoded
    #[error("Record encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl ClaimError {
    /// Machine-readable code returned to clients
    ///
    /// Store and encoding failures collapse to `internal_error`.
    pub fn client_code(&self) -> &'static str {
        match self {
            ClaimError::NoCodesLeft => "no_codes_left",
            ClaimError::RaceExhausted { .. } => "race_exhausted",
            ClaimError::AlreadyClaimed => "already_claimed",
            ClaimError::CodeNotFound(_) | ClaimError::InvalidCode(_) => "invalid_code",
            ClaimError::Store(_) | ClaimError::Encoding(_) => "internal_error",
        }
    }

    /// Whether the error is the caller's situation rather than a server fault
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ClaimError::NoCodesLeft | ClaimError::RaceExhausted { .. } | ClaimError::AlreadyClaimed
        )
    }
}

/// Result type for claim operations
pub type ClaimResult<T> = Result<T, ClaimError>;
