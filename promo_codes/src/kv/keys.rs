//! Key layout shared by every store backend.
//!
//! Sessions namespace: `pkce_session:{state}`, `user_session:{id}`,
//! `user_session_index:{user_id}`.
//! Codes namespace: `code:{code}`, `claimed_user:{user_id}`,
//! `claim_lock:{user_id}`.

pub const PKCE_SESSION_PREFIX: &str = "pkce_session:";
pub const USER_SESSION_PREFIX: &str = "user_session:";
pub const USER_SESSION_INDEX_PREFIX: &str = "user_session_index:";
pub const CODE_PREFIX: &str = "code:";
pub const CLAIMED_USER_PREFIX: &str = "claimed_user:";
pub const CLAIM_LOCK_PREFIX: &str = "claim_lock:";

pub fn pkce_session(state: &str) -> String {
    format!("{PKCE_SESSION_PREFIX}{state}")
}

pub fn user_session(session_id: &str) -> String {
    format!("{USER_SESSION_PREFIX}{session_id}")
}

pub fn user_session_index(user_id: &str) -> String {
    format!("{USER_SESSION_INDEX_PREFIX}{user_id}")
}

pub fn code(code: &str) -> String {
    format!("{CODE_PREFIX}{code}")
}

pub fn claimed_user(user_id: &str) -> String {
    format!("{CLAIMED_USER_PREFIX}{user_id}")
}

pub fn claim_lock(user_id: &str) -> String {
    format!("{CLAIM_LOCK_PREFIX}{user_id}")
}

/// Strip the pool prefix from a listed key, returning the bare code.
pub fn code_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(CODE_PREFIX).filter(|c| !c.is_empty())
}
