//! Login sessions.
//!
//! A session maps an opaque, random cookie value to the profile and access
//! token captured at login. Each login mints a fresh session id; a per-user
//! index keeps at most one live session per user, so re-login replaces the
//! previous row instead of accumulating them.

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{SessionError, SessionResult};
pub use manager::{SESSION_TTL, SessionStore};
pub use models::Session;
