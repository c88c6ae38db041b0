//! Claim and current-user handlers.

use super::{AppState, cookies};
use crate::{logging, metrics};
use axum::{
    Json,
    extract::{Extension, State},
    http::{HeaderMap, StatusCode},
};
use promo_codes::{
    claims::{ClaimError, ClaimOutcome},
    oauth::UserProfile,
    session::{Session, SessionError},
};
use serde::Serialize;
use std::time::Instant;

/// Body of every `/claim` response
#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClaimResponse {
    pub fn success(code: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(code.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            code: None,
            error: Some(error.into()),
        }
    }
}

/// Body of `/me`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

/// Claim a code for the session's user.
///
/// # Responses
///
/// - `200 {"success":true,"code":"..."}` - New or previously claimed code
/// - `400 {"success":false,"error":"no_codes_left" | "race_exhausted" | "already_claimed"}`
/// - `500 {"success":false,"error":"internal_error"}`
///
/// `401` is produced by the session middleware before this runs.
pub async fn claim(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> (StatusCode, Json<ClaimResponse>) {
    let started = Instant::now();
    let result = state.allocator.claim(&session.user_id).await;
    let elapsed = started.elapsed();

    metrics::claim_duration_ms(elapsed.as_secs_f64() * 1000.0);

    let (status, outcome, response) = match result {
        Ok(ClaimOutcome::Claimed { code }) => {
            (StatusCode::OK, "claimed", ClaimResponse::success(code))
        }
        Ok(ClaimOutcome::AlreadyClaimed { code }) => {
            (StatusCode::OK, "repeat", ClaimResponse::success(code))
        }
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                tracing::error!("Claim for user {} failed: {}", session.user_id, e);
            }
            (status, e.client_code(), ClaimResponse::failure(e.client_code()))
        }
    };

    metrics::claim_outcome(outcome);
    logging::log_claim(&session.user_id, outcome, elapsed.as_millis() as u64);

    (status, Json(response))
}

fn status_for(error: &ClaimError) -> StatusCode {
    if error.is_rejection() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Current user, if the request carries a live session.
///
/// Always `200`: no cookie, an unknown or expired session, and store
/// failures all answer `{"loggedIn": false}`.
pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> Json<MeResponse> {
    let logged_out = || {
        Json(MeResponse {
            logged_in: false,
            user: None,
        })
    };

    let Some(session_id) = cookies::session_id(&headers) else {
        return logged_out();
    };

    match state.sessions.get(&session_id).await {
        Ok(session) => Json(MeResponse {
            logged_in: true,
            user: Some(session.profile()),
        }),
        Err(SessionError::NotFound) => logged_out(),
        Err(e) => {
            tracing::error!("Session lookup for /me failed: {}", e);
            logged_out()
        }
    }
}
