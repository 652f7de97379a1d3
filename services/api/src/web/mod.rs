pub mod auth;
pub mod forms;
pub mod guard;
pub mod middleware;
pub mod pages;
pub mod rest;
pub mod state;
pub mod student;
pub mod teacher;
pub mod token;

#[cfg(test)]
pub(crate) mod test_support;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub use middleware::access_gate;
pub use rest::ApiDoc;
use state::AppState;

/// Builds the application's routes: gated pages plus the ungated auth endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let gated = Router::new()
        .route("/", get(pages::landing_handler))
        .route("/login", get(pages::login_handler))
        .route("/waiting-for-approval", get(pages::waiting_handler))
        .route("/student", get(student::dashboard_handler))
        .route("/student/{lesson_id}", get(student::lesson_handler))
        .route("/student/{lesson_id}/complete", post(student::complete_handler))
        .route("/student/{lesson_id}/download", get(student::download_handler))
        .route("/teacher", get(teacher::dashboard_handler))
        .route(
            "/teacher/assign-lesson",
            get(teacher::assign_form_handler).post(teacher::assign_lesson_handler),
        )
        .route(
            "/teacher/{lesson_id}",
            get(teacher::lesson_handler).post(teacher::update_lesson_handler),
        )
        .route("/teacher/{lesson_id}/download", get(teacher::download_handler))
        .route_layer(from_fn_with_state(state.clone(), access_gate));

    let auth_routes = Router::new()
        .route("/api/auth/signin/google", get(auth::signin_handler))
        .route("/api/auth/callback/google", get(auth::callback_handler))
        .route("/api/auth/session", post(auth::refresh_handler))
        .route("/api/auth/signout", post(auth::signout_handler));

    gated.merge(auth_routes).with_state(state)
}
