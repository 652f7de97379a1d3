//! services/api/src/web/student.rs
//!
//! The student area: assigned lessons, the learning view, completion and PDF download.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Redirect},
};
use lesson_portal_core::domain::Role;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::web::guard::{owned_lesson, require_role, Side};
use crate::web::middleware::AuthSession;
use crate::web::rest::{port_error_response, DownloadResponse, LessonView, StudentLessonView};
use crate::web::state::AppState;

/// GET /student - Lessons assigned to the signed-in student
#[utoipa::path(
    get,
    path = "/student",
    responses(
        (status = 200, description = "Assigned lessons", body = [StudentLessonView]),
        (status = 403, description = "Not a student"),
        (status = 503, description = "Account store unavailable")
    )
)]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    AuthSession(session): AuthSession,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_role(&session, Role::Student)?;

    let lessons = state
        .lessons
        .fetch_by_student(session.user_id)
        .await
        .map_err(|e| port_error_response(e, "Failed to load lessons"))?;

    Ok(Json(
        lessons.iter().map(StudentLessonView::from).collect::<Vec<_>>(),
    ))
}

/// GET /student/{lesson_id} - The learning view of one lesson
#[utoipa::path(
    get,
    path = "/student/{lesson_id}",
    params(("lesson_id" = Uuid, Path, description = "The lesson to open.")),
    responses(
        (status = 200, description = "The lesson", body = LessonView),
        (status = 403, description = "Not a student"),
        (status = 404, description = "No such lesson for this student")
    )
)]
pub async fn lesson_handler(
    State(state): State<Arc<AppState>>,
    AuthSession(session): AuthSession,
    Path(lesson_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_role(&session, Role::Student)?;
    let lesson = owned_lesson(&state.lessons, lesson_id, &session, Side::Student).await?;
    Ok(Json(LessonView::from(&lesson)))
}

/// POST /student/{lesson_id}/complete - Mark a lesson as done
#[utoipa::path(
    post,
    path = "/student/{lesson_id}/complete",
    params(("lesson_id" = Uuid, Path, description = "The lesson to complete.")),
    responses(
        (status = 303, description = "Completed; redirect back to the lesson"),
        (status = 403, description = "Not a student"),
        (status = 404, description = "No such lesson for this student")
    )
)]
pub async fn complete_handler(
    State(state): State<Arc<AppState>>,
    AuthSession(session): AuthSession,
    Path(lesson_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_role(&session, Role::Student)?;
    owned_lesson(&state.lessons, lesson_id, &session, Side::Student).await?;

    state
        .lessons
        .mark_completed(lesson_id)
        .await
        .map_err(|e| port_error_response(e, "Failed to complete lesson"))?;

    info!(%lesson_id, student_id = %session.user_id, "Lesson marked completed");
    Ok(Redirect::to(&format!("/student/{}", lesson_id)))
}

/// GET /student/{lesson_id}/download - A short-lived link to the lesson's PDF
#[utoipa::path(
    get,
    path = "/student/{lesson_id}/download",
    params(("lesson_id" = Uuid, Path, description = "The lesson whose PDF to fetch.")),
    responses(
        (status = 200, description = "Signed download link", body = DownloadResponse),
        (status = 404, description = "No such lesson, or it has no PDF")
    )
)]
pub async fn download_handler(
    State(state): State<Arc<AppState>>,
    AuthSession(session): AuthSession,
    Path(lesson_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_role(&session, Role::Student)?;
    owned_lesson(&state.lessons, lesson_id, &session, Side::Student).await?;

    let url = state
        .lessons
        .issue_download_url(lesson_id)
        .await
        .map_err(|e| port_error_response(e, "Failed to issue download link"))?;

    Ok(Json(DownloadResponse {
        url,
        expires_in_secs: state.lessons.download_ttl().as_secs(),
    }))
}
