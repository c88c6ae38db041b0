//! Session-cookie authentication for protected endpoints.
//!
//! The middleware resolves the `eo_session` cookie to a [`Session`] and
//! injects it into request extensions:
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//! use promo_codes::session::Session;
//!
//! async fn protected_handler(Extension(session): Extension<Session>) -> String {
//!     format!("Authenticated as @{}", session.username)
//! }
//! # let _ = protected_handler;
//! ```

use super::{AppState, claim::ClaimResponse, cookies};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use promo_codes::session::{Session, SessionError};

/// Require a live session; reject with a JSON 401 otherwise.
///
/// - **Success**: Injects [`Session`] into request extensions → Calls next handler
/// - **Missing, unknown or expired cookie**: `401 {"success":false,"error":"not_authenticated"}`
/// - **Store failure**: `500 {"success":false,"error":"internal_error"}`
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(session_id) = cookies::session_id(request.headers()) else {
        return reject(StatusCode::UNAUTHORIZED, "not_authenticated");
    };

    match state.sessions.get(&session_id).await {
        Ok(session) => {
            request.extensions_mut().insert::<Session>(session);
            next.run(request).await
        }
        Err(SessionError::NotFound) => reject(StatusCode::UNAUTHORIZED, "not_authenticated"),
        Err(e) => {
            tracing::error!("Session lookup failed: {}", e);
            reject(StatusCode::INTERNAL_SERVER_ERROR, &e.client_message())
        }
    }
}

fn reject(status: StatusCode, error: &str) -> Response {
    (status, Json(ClaimResponse::failure(error))).into_response()
}
