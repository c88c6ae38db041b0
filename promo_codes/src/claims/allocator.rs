//! Exactly-once code allocation.

use super::{
    errors::{ClaimError, ClaimResult},
    models::{Claim, ClaimOutcome},
    pool::CodePool,
};
use crate::kv::{KvStore, Namespace, keys};
use crate::oauth::pkce;
use chrono::Utc;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Candidate picks per claim before giving up
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 3;

/// Lifetime of the per-user claim lock; bounds how long a crashed holder blocks the user
pub const CLAIM_LOCK_TTL: Duration = Duration::from_secs(10);

/// How often a request waiting on the claim lock re-reads the claim
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Outcome of waiting for a user's claim lock
enum ClaimSlot {
    /// This call holds the lock under the given token
    Acquired(String),
    /// A concurrent request finished first; the user holds this code
    Claimed(String),
}

/// Hands out at most one code per user and each code to at most one user
///
/// A claim runs under a short-lived per-user lock (`claim_lock:{user_id}`),
/// so concurrent requests of one user never compete for the pool; the ones
/// that wait read back the claim the lock holder wrote. Removing the code from
/// the pool is the per-code gate and writing `claimed_user:{user_id}` with
/// put-if-absent is the per-user gate. The pool removal happens first, so a
/// crash between the two steps loses a code instead of handing it out twice.
#[derive(Clone)]
pub struct ClaimAllocator {
    store: Arc<dyn KvStore>,
    pool: CodePool,
    max_attempts: u32,
    lock_ttl: Duration,
}

impl ClaimAllocator {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            pool: CodePool::new(store.clone()),
            store,
            max_attempts: MAX_ALLOCATION_ATTEMPTS,
            lock_ttl: CLAIM_LOCK_TTL,
        }
    }

    /// Override the attempt bound (minimum 1)
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Override the claim lock lifetime
    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// Pool this allocator draws from
    pub fn pool(&self) -> &CodePool {
        &self.pool
    }

    /// Code already held by a user, if any
    ///
    /// # Errors
    ///
    /// * `ClaimError::AlreadyClaimed` - A claim record exists but cannot be read
    /// * `ClaimError::Store` - Store unreachable
    pub async fn existing_claim(&self, user_id: &str) -> ClaimResult<Option<String>> {
        let key = keys::claimed_user(user_id);
        let Some(raw) = self.store.get(Namespace::Codes, &key).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<Claim>(&raw) {
            Ok(claim) => Ok(Some(claim.code)),
            Err(e) => {
                error!("Claim record for user {} is unreadable: {}", user_id, e);
                Err(ClaimError::AlreadyClaimed)
            }
        }
    }

    /// Allocate a code to a user, or return the one they already hold
    ///
    /// Repeat and concurrent calls for the same user return the same code.
    ///
    /// # Errors
    ///
    /// * `ClaimError::NoCodesLeft` - Pool is empty
    /// * `ClaimError::RaceExhausted` - Every candidate was taken by a concurrent
    ///   claim, or the user's claim lock stayed held past twice its lifetime
    /// * `ClaimError::AlreadyClaimed` - Existing claim record is unreadable
    /// * `ClaimError::Store` - Store unreachable
    pub async fn claim(&self, user_id: &str) -> ClaimResult<ClaimOutcome> {
        let token = match self.wait_for_slot(user_id).await? {
            ClaimSlot::Claimed(code) => {
                debug!("User {} already holds a code", user_id);
                return Ok(ClaimOutcome::AlreadyClaimed { code });
            }
            ClaimSlot::Acquired(token) => token,
        };

        let result = self.allocate(user_id).await;
        self.release_lock(user_id, &token).await;
        result
    }

    /// Take the user's claim lock, or wait until a concurrent holder has written the claim
    async fn wait_for_slot(&self, user_id: &str) -> ClaimResult<ClaimSlot> {
        let lock_key = keys::claim_lock(user_id);
        let token = pkce::random_token();
        let deadline = Instant::now() + self.lock_ttl * 2;

        loop {
            if let Some(code) = self.existing_claim(user_id).await? {
                return Ok(ClaimSlot::Claimed(code));
            }

            let acquired = self
                .store
                .put_if_absent(Namespace::Codes, &lock_key, &token, Some(self.lock_ttl))
                .await?;
            if acquired {
                // The previous holder may have finished between the read and the lock
                return match self.existing_claim(user_id).await {
                    Ok(None) => Ok(ClaimSlot::Acquired(token)),
                    Ok(Some(code)) => {
                        self.release_lock(user_id, &token).await;
                        Ok(ClaimSlot::Claimed(code))
                    }
                    Err(e) => {
                        self.release_lock(user_id, &token).await;
                        Err(e)
                    }
                };
            }

            if Instant::now() >= deadline {
                warn!("Claim lock for user {} held past its lifetime", user_id);
                return Err(ClaimError::RaceExhausted {
                    attempts: self.max_attempts,
                });
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL).await;
        }
    }

    async fn release_lock(&self, user_id: &str, token: &str) {
        match self
            .store
            .delete_if_eq(Namespace::Codes, &keys::claim_lock(user_id), token)
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!("Claim lock for user {} expired while held", user_id),
            Err(e) => warn!("Failed to release claim lock for user {}: {}", user_id, e),
        }
    }

    /// Pool walk for a user holding the claim lock
    async fn allocate(&self, user_id: &str) -> ClaimResult<ClaimOutcome> {
        for attempt in 1..=self.max_attempts {
            let available = self.pool.list_available().await?;
            let Some(candidate) = select_candidate(user_id, &available) else {
                return self.exhausted(user_id, ClaimError::NoCodesLeft).await;
            };
            let candidate = candidate.to_string();

            match self.pool.remove(&candidate).await {
                Ok(()) => {}
                Err(ClaimError::CodeNotFound(_)) => {
                    debug!(
                        "Candidate taken concurrently (attempt {}/{})",
                        attempt, self.max_attempts
                    );
                    continue;
                }
                Err(e) => return Err(e),
            }

            return self.record_claim(user_id, candidate).await;
        }

        if self.pool.list_available().await?.is_empty() {
            self.exhausted(user_id, ClaimError::NoCodesLeft).await
        } else {
            warn!(
                "Allocation for user {} lost {} races",
                user_id, self.max_attempts
            );
            let error = ClaimError::RaceExhausted {
                attempts: self.max_attempts,
            };
            self.exhausted(user_id, error).await
        }
    }

    /// Report `error` unless a claim for the user appeared meanwhile
    async fn exhausted(&self, user_id: &str, error: ClaimError) -> ClaimResult<ClaimOutcome> {
        match self.existing_claim(user_id).await? {
            Some(code) => Ok(ClaimOutcome::AlreadyClaimed { code }),
            None => Err(error),
        }
    }

    /// Write the claim for a code this call removed from the pool
    async fn record_claim(&self, user_id: &str, code: String) -> ClaimResult<ClaimOutcome> {
        let claim = Claim {
            user_id: user_id.to_string(),
            code,
            claimed_at: Utc::now(),
        };
        let record = serde_json::to_string(&claim)?;

        let written = self
            .store
            .put_if_absent(
                Namespace::Codes,
                &keys::claimed_user(user_id),
                &record,
                None,
            )
            .await
            .inspect_err(|e| {
                error!(
                    "Code {} removed but claim for user {} not written: {}",
                    claim.code, user_id, e
                )
            })?;

        if written {
            info!("User {} claimed code {}", user_id, claim.code);
            return Ok(ClaimOutcome::Claimed { code: claim.code });
        }

        // Another request of the same user won after our lock expired; the code we hold was never handed out
        if !self.pool.restore(&claim.code).await? {
            warn!("Code {} already back in pool", claim.code);
        }
        match self.existing_claim(user_id).await? {
            Some(code) => Ok(ClaimOutcome::AlreadyClaimed { code }),
            None => Err(ClaimError::AlreadyClaimed),
        }
    }
}

/// 32-bit `h = h * 31 + unit` over UTF-16 code units, then absolute value
pub fn user_hash(user_id: &str) -> u32 {
    user_id
        .encode_utf16()
        .fold(0i32, |h, unit| {
            h.wrapping_shl(5).wrapping_sub(h).wrapping_add(i32::from(unit))
        })
        .unsigned_abs()
}

/// Deterministic pick from a sorted candidate list
pub fn select_candidate<'a>(user_id: &str, available: &'a [String]) -> Option<&'a str> {
    if available.is_empty() {
        return None;
    }
    let index = user_hash(user_id) as usize % available.len();
    Some(available[index].as_str())
}
