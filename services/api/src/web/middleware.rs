//! services/api/src/web/middleware.rs
//!
//! The access gate. Every page request passes through it before reaching a handler.
//!
//! The gate reads the session cookie, re-mints tokens that have aged past the
//! refresh window, asks the route policy what to do, and either forwards the
//! request (with the `Session` in its extensions) or answers with a redirect.

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Utc;
use lesson_portal_core::access::AccessDecision;
use lesson_portal_core::domain::Session;
use lesson_portal_core::ports::PortError;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::web::state::AppState;
use crate::web::token::SESSION_COOKIE;

/// Middleware that resolves the session and applies the route policy.
///
/// If allowed, inserts the `Session` (when there is one) into request extensions.
/// Otherwise answers with a `303 See Other` to wherever the policy points.
pub async fn access_gate(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();

    // 1. Resolve the token. Anything unreadable counts as anonymous.
    let raw_token = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let mut session = raw_token.as_deref().and_then(|t| state.tokens.decode(t));
    let mut outgoing: Option<Cookie<'static>> = None;

    if raw_token.is_some() && session.is_none() {
        debug!("Clearing unreadable session cookie");
        outgoing = Some(state.tokens.clear_cookie());
    }

    // 2. Slide the session forward once it is old enough.
    if let Some(current) = session.clone() {
        if needs_refresh(&current, &state) {
            match state.sessions.refresh(&current).await {
                Ok(fresh) => match state.tokens.session_cookie(&fresh) {
                    Ok(cookie) => {
                        outgoing = Some(cookie);
                        session = Some(fresh);
                    }
                    Err(e) => error!("Failed to sign refreshed session: {:?}", e),
                },
                Err(PortError::Unauthorized) => {
                    info!(user_id = %current.user_id, "Account no longer exists, ending session");
                    outgoing = Some(state.tokens.clear_cookie());
                    session = None;
                }
                Err(e) => warn!("Keeping existing session, refresh failed: {:?}", e),
            }
        }
    }

    // 3. Apply the route policy.
    let response = match state.routes.evaluate(&path, session.as_ref()) {
        AccessDecision::Allow => {
            if let Some(session) = session {
                req.extensions_mut().insert(session);
            }
            next.run(req).await
        }
        AccessDecision::Redirect(to) => {
            debug!(%path, %to, "Access gate redirect");
            Redirect::to(&to).into_response()
        }
    };

    match outgoing {
        Some(cookie) => (jar.add(cookie), response).into_response(),
        None => response,
    }
}

fn needs_refresh(session: &Session, state: &AppState) -> bool {
    let age = Utc::now() - session.issued_at;
    age.to_std().map(|age| age >= state.refresh_after).unwrap_or(false)
}

//=========================================================================================
// Session Extractor
//=========================================================================================

/// The session the gate attached to this request.
pub struct AuthSession(pub Session);

impl<S: Send + Sync> FromRequestParts<S> for AuthSession {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .map(AuthSession)
            .ok_or((StatusCode::UNAUTHORIZED, "Not signed in".to_string()))
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for AuthSession {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Session>().cloned().map(AuthSession))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::test_support::Harness;
    use axum::{body::Body, http::header, middleware, routing::get, Router};
    use lesson_portal_core::domain::Role;
    use tower::ServiceExt;

    fn app(harness: &Harness) -> Router {
        async fn whoami(session: Option<AuthSession>) -> String {
            match session {
                Some(AuthSession(s)) => format!("{}:{}", s.email, s.vetted),
                None => "anonymous".to_string(),
            }
        }

        Router::new()
            .route("/", get(whoami))
            .route("/login", get(whoami))
            .route("/waiting-for-approval", get(whoami))
            .route("/student", get(whoami))
            .route("/teacher", get(whoami))
            .route("/teacher/{lesson_id}", get(whoami))
            .layer(middleware::from_fn_with_state(harness.state.clone(), access_gate))
            .with_state(harness.state.clone())
    }

    fn request(path: &str, cookie: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri(path);
        if let Some(token) = cookie {
            builder = builder.header(header::COOKIE, format!("{}={}", SESSION_COOKIE, token));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn location(response: &Response) -> Option<&str> {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    fn set_cookie(response: &Response) -> Option<String> {
        response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    async fn body_text(response: Response) -> String {
        use http_body_util::BodyExt;
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn anonymous_requests_to_protected_pages_go_to_login() {
        let harness = Harness::new();

        let response = app(&harness).oneshot(request("/teacher/abc", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some("/login"));
    }

    #[tokio::test]
    async fn anonymous_requests_to_login_and_public_pages_pass() {
        let harness = Harness::new();

        for path in ["/login", "/"] {
            let response = app(&harness).oneshot(request(path, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{}", path);
            assert_eq!(body_text(response).await, "anonymous");
        }
    }

    #[tokio::test]
    async fn signed_in_users_are_sent_home_from_login() {
        let harness = Harness::new();
        let teacher = harness.db.add_user("Tess", "tess@school.test", Role::Teacher, true);
        let token = harness.token_for(&teacher, chrono::Duration::zero());

        let response = app(&harness).oneshot(request("/login", Some(&token))).await.unwrap();

        assert_eq!(location(&response), Some("/teacher"));
    }

    #[tokio::test]
    async fn unvetted_users_wait_for_approval() {
        let harness = Harness::new();
        let teacher = harness.db.add_user("Tess", "tess@school.test", Role::Teacher, false);
        let token = harness.token_for(&teacher, chrono::Duration::zero());

        let response = app(&harness).oneshot(request("/teacher", Some(&token))).await.unwrap();
        assert_eq!(location(&response), Some("/waiting-for-approval"));

        let response = app(&harness)
            .oneshot(request("/waiting-for-approval", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn students_are_kept_out_of_the_teacher_area() {
        let harness = Harness::new();
        let student = harness.db.add_user("Sam", "sam@school.test", Role::Student, true);
        let token = harness.token_for(&student, chrono::Duration::zero());

        let response = app(&harness).oneshot(request("/teacher", Some(&token))).await.unwrap();

        assert_eq!(location(&response), Some("/student"));
    }

    #[tokio::test]
    async fn allowed_requests_carry_the_session() {
        let harness = Harness::new();
        let student = harness.db.add_user("Sam", "sam@school.test", Role::Student, true);
        let token = harness.token_for(&student, chrono::Duration::zero());

        let response = app(&harness).oneshot(request("/student", Some(&token))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookie(&response).is_none());
        assert_eq!(body_text(response).await, "sam@school.test:true");
    }

    #[tokio::test]
    async fn stale_tokens_pick_up_vetting_done_since_login() {
        let harness = Harness::new();
        let teacher = harness.db.add_user("Tess", "tess@school.test", Role::Teacher, false);
        let token = harness.token_for(&teacher, chrono::Duration::minutes(10));
        harness.db.set_role(teacher.id, Role::Teacher, true);

        let response = app(&harness).oneshot(request("/teacher", Some(&token))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = set_cookie(&response).unwrap();
        assert!(cookie.starts_with("session="));
        assert_eq!(body_text(response).await, "tess@school.test:true");
    }

    #[tokio::test]
    async fn fresh_tokens_are_not_re_read() {
        let harness = Harness::new();
        let teacher = harness.db.add_user("Tess", "tess@school.test", Role::Teacher, false);
        let token = harness.token_for(&teacher, chrono::Duration::zero());
        harness.db.set_role(teacher.id, Role::Teacher, true);

        let response = app(&harness).oneshot(request("/teacher", Some(&token))).await.unwrap();

        assert_eq!(location(&response), Some("/waiting-for-approval"));
    }

    #[tokio::test]
    async fn a_deleted_account_ends_the_session() {
        let harness = Harness::new();
        let teacher = harness.db.add_user("Tess", "tess@school.test", Role::Teacher, true);
        let token = harness.token_for(&teacher, chrono::Duration::minutes(10));
        harness.db.remove_user(teacher.id);

        let response = app(&harness).oneshot(request("/teacher", Some(&token))).await.unwrap();

        assert_eq!(location(&response), Some("/login"));
        assert!(set_cookie(&response).unwrap().contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn an_unreachable_store_keeps_the_existing_session() {
        let harness = Harness::new();
        let teacher = harness.db.add_user("Tess", "tess@school.test", Role::Teacher, true);
        let token = harness.token_for(&teacher, chrono::Duration::minutes(10));
        harness.db.set_offline(true);

        let response = app(&harness).oneshot(request("/teacher", Some(&token))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookie(&response).is_none());
    }

    #[tokio::test]
    async fn unreadable_cookies_are_cleared() {
        let harness = Harness::new();

        let response = app(&harness)
            .oneshot(request("/teacher", Some("forged.token.value")))
            .await
            .unwrap();

        assert_eq!(location(&response), Some("/login"));
        assert!(set_cookie(&response).unwrap().contains("Max-Age=0"));
    }
}
