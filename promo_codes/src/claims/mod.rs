//! Redemption code pool and claim allocation.
//!
//! The pool is the set of `code:{code}` keys; a key's presence means the code
//! is still available. A claim is the `claimed_user:{user_id}` record naming
//! the code a user received. Both live in [`Namespace::Codes`].
//!
//! [`ClaimAllocator`] guarantees:
//! - a user holds at most one code, and asking again (even concurrently)
//!   returns the same code
//! - a code is held by at most one user
//! - a code is never handed out twice, even across crashes; a crash at the
//!   wrong moment leaks the code instead
//!
//! [`Namespace::Codes`]: crate::kv::Namespace::Codes

pub mod allocator;
pub mod errors;
pub mod models;
pub mod pool;

pub use allocator::{
    CLAIM_LOCK_TTL, ClaimAllocator, MAX_ALLOCATION_ATTEMPTS, select_candidate, user_hash,
};
pub use errors::{ClaimError, ClaimResult};
pub use models::{Claim, ClaimOutcome, CodeRecord, SeedReport};
pub use pool::{CodePool, parse_code_list};
