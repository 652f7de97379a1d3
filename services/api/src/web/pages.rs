//! services/api/src/web/pages.rs
//!
//! The landing, login and waiting-for-approval pages.

use axum::{
    extract::State,
    response::{IntoResponse, Json, Redirect, Response},
};
use lesson_portal_core::access::home_for;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::web::auth::SessionResponse;
use crate::web::middleware::AuthSession;
use crate::web::state::AppState;

const SIGNIN_URL: &str = "/api/auth/signin/google";

#[derive(Serialize, ToSchema)]
pub struct LandingResponse {
    /// Where the visitor should go next.
    pub next: String,
    pub session: Option<SessionResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub signin_url: String,
}

#[derive(Serialize, ToSchema)]
pub struct WaitingResponse {
    pub email: String,
    pub message: String,
}

/// GET / - Landing page
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Landing page", body = LandingResponse))
)]
pub async fn landing_handler(
    State(state): State<Arc<AppState>>,
    session: Option<AuthSession>,
) -> Json<LandingResponse> {
    let response = match session {
        Some(AuthSession(s)) => LandingResponse {
            next: home_for(s.role).to_string(),
            session: Some(SessionResponse::from(&s)),
        },
        None => LandingResponse {
            next: state.routes.login_path.clone(),
            session: None,
        },
    };
    Json(response)
}

/// GET /login - Login page
#[utoipa::path(
    get,
    path = "/login",
    responses((status = 200, description = "Login page", body = LoginResponse))
)]
pub async fn login_handler() -> Json<LoginResponse> {
    Json(LoginResponse {
        signin_url: SIGNIN_URL.to_string(),
    })
}

/// GET /waiting-for-approval - Shown until an admin vets the account
#[utoipa::path(
    get,
    path = "/waiting-for-approval",
    responses(
        (status = 200, description = "Account awaiting approval", body = WaitingResponse),
        (status = 303, description = "Account already approved; redirect home")
    )
)]
pub async fn waiting_handler(AuthSession(session): AuthSession) -> Response {
    if session.vetted {
        return Redirect::to(home_for(session.role)).into_response();
    }
    Json(WaitingResponse {
        email: session.email,
        message: "Your account is awaiting approval by an administrator.".to_string(),
    })
    .into_response()
}
