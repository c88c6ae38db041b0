//! Claim data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Proof that a user holds a code, stored at `claimed_user:{user_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub user_id: String,
    pub code: String,
    pub claimed_at: DateTime<Utc>,
}

/// Pool entry, stored at `code:{code}`; presence means unclaimed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRecord {
    pub code: String,
    pub created_at: DateTime<Utc>,
}

/// Successful result of a claim request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// A code was allocated by this request
    Claimed { code: String },
    /// The user already held this code
    AlreadyClaimed { code: String },
}

impl ClaimOutcome {
    /// The user's code
    pub fn code(&self) -> &str {
        match self {
            ClaimOutcome::Claimed { code } | ClaimOutcome::AlreadyClaimed { code } => code,
        }
    }

    /// Whether this request performed the allocation
    pub fn is_new(&self) -> bool {
        matches!(self, ClaimOutcome::Claimed { .. })
    }
}

/// Result of seeding the pool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Codes added to the pool
    pub inserted: usize,
    /// Codes already in the pool or already claimed
    pub skipped: usize,
}
