//! services/api/src/web/auth.rs
//!
//! Sign-in with Google, explicit session refresh, and sign-out.
//!
//! These routes sit outside the access gate: they are how a session comes to exist.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use lesson_portal_core::access::home_for;
use lesson_portal_core::domain::Session;
use lesson_portal_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::web::rest::port_error_response;
use crate::web::state::AppState;
use crate::web::token::SESSION_COOKIE;

/// Cookie holding the CSRF token and PKCE verifier between redirect and callback.
const OAUTH_STATE_COOKIE: &str = "oauth_state";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Debug, Serialize, Deserialize)]
struct OAuthStateData {
    csrf_token: String,
    pkce_verifier: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    /// Authorization code from Google.
    pub code: Option<String>,
    /// CSRF state token.
    pub state: Option<String>,
    /// Set by Google when the user declines.
    pub error: Option<String>,
}

/// The session as seen by the browser.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub vetted: bool,
    pub image: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl From<&Session> for SessionResponse {
    fn from(s: &Session) -> Self {
        Self {
            id: s.user_id,
            email: s.email.clone(),
            role: s.role.as_str().to_string(),
            vetted: s.vetted,
            image: s.image.clone(),
            expires_at: s.expires_at,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/auth/signin/google - Start the Google sign-in flow
#[utoipa::path(
    get,
    path = "/api/auth/signin/google",
    responses(
        (status = 303, description = "Redirect to Google's consent screen"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signin_handler(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let request = state
        .identity
        .authorization_request()
        .map_err(|e| port_error_response(e, "Failed to start sign-in"))?;

    let state_json = serde_json::to_string(&OAuthStateData {
        csrf_token: request.csrf_token,
        pkce_verifier: request.pkce_verifier,
    })
    .map_err(|e| {
        error!("Failed to serialize OAuth state: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to start sign-in".to_string())
    })?;

    let cookie = Cookie::build((OAUTH_STATE_COOKIE, state_json))
        .path("/")
        .http_only(true)
        .secure(state.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(10));

    Ok((jar.add(cookie), Redirect::to(&request.url)))
}

/// GET /api/auth/callback/google - Finish the Google sign-in flow
#[utoipa::path(
    get,
    path = "/api/auth/callback/google",
    params(CallbackQuery),
    responses(
        (status = 303, description = "Signed in; redirect to the account's home page"),
        (status = 400, description = "Missing or mismatched sign-in state"),
        (status = 401, description = "Google did not vouch for the account"),
        (status = 503, description = "Account store unavailable")
    )
)]
pub async fn callback_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if let Some(reason) = query.error {
        warn!("Google sign-in declined: {}", reason);
        return Err((StatusCode::UNAUTHORIZED, "Sign-in was cancelled".to_string()));
    }

    // 1. Validate the state stored when the flow started.
    let stored: OAuthStateData = jar
        .get(OAUTH_STATE_COOKIE)
        .and_then(|c| serde_json::from_str(c.value()).ok())
        .ok_or((StatusCode::BAD_REQUEST, "Missing sign-in state".to_string()))?;

    if query.state.as_deref() != Some(stored.csrf_token.as_str()) {
        warn!("OAuth state mismatch on callback");
        return Err((StatusCode::BAD_REQUEST, "Invalid sign-in state".to_string()));
    }
    let code = query
        .code
        .ok_or((StatusCode::BAD_REQUEST, "Missing authorization code".to_string()))?;

    // 2. Exchange the code and sign the account in.
    let identity = state
        .identity
        .exchange_code(&code, &stored.pkce_verifier)
        .await
        .map_err(|e| port_error_response(e, "Sign-in failed"))?;

    let session = state
        .sessions
        .sign_in(&identity)
        .await
        .map_err(|e| port_error_response(e, "Sign-in failed"))?;

    let session_cookie = state
        .tokens
        .session_cookie(&session)
        .map_err(|e| port_error_response(e, "Sign-in failed"))?;

    // 3. Swap the state cookie for the session cookie.
    let remove_state = Cookie::build((OAUTH_STATE_COOKIE, ""))
        .path("/")
        .max_age(time::Duration::ZERO);

    Ok((
        jar.add(remove_state).add(session_cookie),
        Redirect::to(home_for(session.role)),
    ))
}

/// POST /api/auth/session - Re-read the account and re-issue the session
#[utoipa::path(
    post,
    path = "/api/auth/session",
    responses(
        (status = 200, description = "Session refreshed", body = SessionResponse),
        (status = 401, description = "No active session"),
        (status = 503, description = "Account store unavailable")
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let current = jar
        .get(SESSION_COOKIE)
        .and_then(|c| state.tokens.decode(c.value()))
        .ok_or((StatusCode::UNAUTHORIZED, "No active session".to_string()))?;

    let fresh = match state.sessions.refresh(&current).await {
        Ok(fresh) => fresh,
        Err(PortError::Unauthorized) => {
            info!(user_id = %current.user_id, "Refresh for a vanished account");
            return Ok((
                jar.add(state.tokens.clear_cookie()),
                (StatusCode::UNAUTHORIZED, "No active session".to_string()),
            )
                .into_response());
        }
        Err(e) => return Err(port_error_response(e, "Failed to refresh session")),
    };

    let cookie = state
        .tokens
        .session_cookie(&fresh)
        .map_err(|e| port_error_response(e, "Failed to refresh session"))?;

    Ok((jar.add(cookie), Json(SessionResponse::from(&fresh))).into_response())
}

/// POST /api/auth/signout - End the session
#[utoipa::path(
    post,
    path = "/api/auth/signout",
    responses(
        (status = 303, description = "Signed out; redirect to the login page")
    )
)]
pub async fn signout_handler(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> impl IntoResponse {
    (
        jar.add(state.tokens.clear_cookie()),
        Redirect::to(&state.routes.login_path),
    )
}
