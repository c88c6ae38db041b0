//! # Promo Codes
//!
//! Backend for a promo-code giveaway: users sign in with an OAuth 2.0
//! identity provider and each signed-in user can claim exactly one code from
//! a finite pool.
//!
//! ## Core Modules
//!
//! - [`kv`]: namespaced key-value store with TTLs (PostgreSQL or in-memory)
//! - [`oauth`]: Authorization Code + PKCE login flow
//! - [`session`]: cookie sessions created at login
//! - [`claims`]: code pool and the exactly-once allocator
//! - [`db`]: PostgreSQL pool configuration for the durable store
//!
//! ## Example
//!
//! ```
//! use promo_codes::{ClaimAllocator, ClaimError, MemoryKvStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ClaimError> {
//!     let allocator = ClaimAllocator::new(Arc::new(MemoryKvStore::new()));
//!     allocator.pool().seed(["0YWRLLLNKBCB", "PWNOAXZ4C945"]).await?;
//!
//!     let outcome = allocator.claim("42").await?;
//!     assert!(outcome.is_new());
//!     assert_eq!(allocator.claim("42").await?.code(), outcome.code());
//!     Ok(())
//! }
//! ```

/// Redemption code pool and claim allocation.
pub mod claims;
pub use claims::{ClaimAllocator, ClaimError, ClaimOutcome, CodePool};

/// PostgreSQL connection pooling.
pub mod db;

/// Namespaced key-value storage.
pub mod kv;
pub use kv::{KvError, KvStore, MemoryKvStore, Namespace, PgKvStore};

/// OAuth 2.0 + PKCE login.
pub mod oauth;
pub use oauth::{IdentityProvider, LoginFlow, OAuthError};

/// Login sessions.
pub mod session;
pub use session::{Session, SessionError, SessionStore};
