//! Login and OAuth callback handlers.
//!
//! Both endpoints answer with `302 Found`. Failures never produce an error
//! status; the browser is sent to the configured error page with
//! `reason` and `detail` query parameters instead.

use super::{AppState, request_id::RequestId};
use crate::{logging, metrics};
use axum::{
    extract::{Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, LOCATION, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use promo_codes::oauth::OAuthError;
use serde::Deserialize;
use url::form_urlencoded;

/// Query parameters of the provider callback
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Start a login and redirect to the identity provider.
pub async fn login(State(state): State<AppState>) -> Response {
    metrics::login_started();

    match state.login_flow.start().await {
        Ok(redirect) => found(redirect.authorization_url.as_str(), None),
        Err(e) => {
            tracing::error!("Failed to start login: {}", e);
            auth_error(&state, e.detail())
        }
    }
}

/// Finish a login from the provider redirect.
///
/// On success the session cookie is set and the browser goes to the success
/// page. Provider-reported errors, missing parameters, unknown state and
/// provider or store failures all redirect to the error page.
pub async fn callback(
    State(state): State<AppState>,
    request_id: RequestId,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(error) = params.error.as_deref().filter(|e| !e.is_empty()) {
        tracing::warn!("Provider returned error: {}", error);
        metrics::callback_outcome("provider_error");
        return auth_error(&state, error);
    }

    let (Some(code), Some(oauth_state)) = (
        params.code.as_deref().filter(|c| !c.is_empty()),
        params.state.as_deref().filter(|s| !s.is_empty()),
    ) else {
        metrics::callback_outcome("missing_code_or_state");
        return auth_error(&state, "missing_code_or_state");
    };

    match state.login_flow.complete(code, oauth_state).await {
        Ok(session) => {
            metrics::callback_outcome("success");
            let cookie = state.cookies.session_cookie(&session.session_id);
            found(
                &state.web.public_url_for(&state.web.success_path),
                Some(cookie),
            )
        }
        Err(OAuthError::NotAFollower) => {
            metrics::callback_outcome("not_a_follower");
            redirect_to_error(&state, &[("reason", "not_a_follower")])
        }
        Err(e) => {
            let detail = e.detail();
            metrics::callback_outcome(detail);

            match &e {
                OAuthError::InvalidState => logging::log_security_event(
                    "invalid_oauth_state",
                    None,
                    Some(request_id.as_str()),
                    "Callback state matched no pending authorization",
                ),
                e if e.is_upstream() => tracing::warn!("Provider call failed: {}", e),
                e => tracing::error!("Callback failed: {}", e),
            }

            auth_error(&state, detail)
        }
    }
}

fn auth_error(state: &AppState, detail: &str) -> Response {
    redirect_to_error(state, &[("reason", "auth_error"), ("detail", detail)])
}

fn redirect_to_error(state: &AppState, params: &[(&str, &str)]) -> Response {
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    let target = state
        .web
        .public_url_for(&format!("{}?{}", state.web.error_path, query));
    found(&target, None)
}

/// `302 Found` with an optional `Set-Cookie`
fn found(location: &str, cookie: Option<String>) -> Response {
    let Ok(location) = HeaderValue::from_str(location) else {
        tracing::error!("Redirect target is not a valid header value");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let mut response = (StatusCode::FOUND, [(LOCATION, location)]).into_response();
    let headers = response.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    if let Some(cookie) = cookie.and_then(|c| HeaderValue::from_str(&c).ok()) {
        headers.insert(SET_COOKIE, cookie);
    }
    response
}
