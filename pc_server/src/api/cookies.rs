//! Session cookie encoding and parsing.

use axum::http::{HeaderMap, header::COOKIE};
use std::time::Duration;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "eo_session";

/// Attributes applied to the session cookie
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub max_age: Duration,
    pub http_only: bool,
    pub secure: bool,
}

impl CookiePolicy {
    /// `Set-Cookie` value carrying a session id
    pub fn session_cookie(&self, session_id: &str) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; SameSite=Lax",
            SESSION_COOKIE,
            session_id,
            self.max_age.as_secs()
        );
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Value of the session cookie, if the request carries one
///
/// Every `Cookie` header is searched; the first non-empty value wins.
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.trim_matches('"').to_string())
}
