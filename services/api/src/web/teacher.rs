//! services/api/src/web/teacher.rs
//!
//! The teacher area: assigned lessons, the assignment form, and lesson editing.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Redirect},
};
use lesson_portal_core::domain::Role;
use lesson_portal_core::quiz::parse_quiz_update;
use lesson_portal_core::{LessonChanges, NewLesson};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::web::forms::LessonForm;
use crate::web::guard::{owned_lesson, require_role, Side};
use crate::web::middleware::AuthSession;
use crate::web::rest::{
    port_error_response, DownloadResponse, LessonView, StudentOptionView, TeacherLessonView,
};
use crate::web::state::AppState;

/// GET /teacher - Lessons the signed-in teacher has assigned, newest first
#[utoipa::path(
    get,
    path = "/teacher",
    responses(
        (status = 200, description = "Assigned lessons", body = [TeacherLessonView]),
        (status = 403, description = "Not a teacher"),
        (status = 503, description = "Account store unavailable")
    )
)]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    AuthSession(session): AuthSession,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_role(&session, Role::Teacher)?;

    let lessons = state
        .lessons
        .fetch_by_teacher(session.user_id)
        .await
        .map_err(|e| port_error_response(e, "Failed to load lessons"))?;

    Ok(Json(
        lessons.iter().map(TeacherLessonView::from).collect::<Vec<_>>(),
    ))
}

/// GET /teacher/assign-lesson - Students the teacher can assign to
#[utoipa::path(
    get,
    path = "/teacher/assign-lesson",
    responses(
        (status = 200, description = "Students in the teacher's classes", body = [StudentOptionView]),
        (status = 403, description = "Not a teacher"),
        (status = 404, description = "No teacher profile for this account")
    )
)]
pub async fn assign_form_handler(
    State(state): State<Arc<AppState>>,
    AuthSession(session): AuthSession,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_role(&session, Role::Teacher)?;

    let students = state
        .lessons
        .students_for_teacher(session.user_id)
        .await
        .map_err(|e| port_error_response(e, "Failed to load students"))?;

    Ok(Json(
        students.iter().map(StudentOptionView::from).collect::<Vec<_>>(),
    ))
}

/// POST /teacher/assign-lesson - Create a lesson for one student
///
/// Accepts a multipart/form-data request with the fields `studentId`, `title`,
/// `description`, `videoUrl`, `quiz` (a JSON array) and an optional `pdf` file.
#[utoipa::path(
    post,
    path = "/teacher/assign-lesson",
    request_body(content_type = "multipart/form-data", description = "The lesson form."),
    responses(
        (status = 303, description = "Lesson created; redirect to the dashboard"),
        (status = 400, description = "Missing or invalid fields"),
        (status = 403, description = "Not a teacher"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn assign_lesson_handler(
    State(state): State<Arc<AppState>>,
    AuthSession(session): AuthSession,
    multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_role(&session, Role::Teacher)?;
    let mut form = LessonForm::from_multipart(multipart).await?;

    let student_id = match form.take("studentId").filter(|s| !s.trim().is_empty()) {
        None => None,
        Some(raw) => Some(
            Uuid::parse_str(raw.trim())
                .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid student id".to_string()))?,
        ),
    };

    let new = NewLesson {
        teacher_id: session.user_id,
        student_id,
        title: form.take("title").unwrap_or_default(),
        description: form.take("description"),
        video_url: form.take("videoUrl"),
        quiz_payload: form.take("quiz"),
        attachment: form.pdf.take(),
    };

    let lesson_id = state
        .lessons
        .create(new)
        .await
        .map_err(|e| port_error_response(e, "Failed to create lesson"))?;

    info!(%lesson_id, teacher_id = %session.user_id, "Lesson assigned");
    Ok(Redirect::to("/teacher"))
}

/// GET /teacher/{lesson_id} - The edit view of one lesson
#[utoipa::path(
    get,
    path = "/teacher/{lesson_id}",
    params(("lesson_id" = Uuid, Path, description = "The lesson to edit.")),
    responses(
        (status = 200, description = "The lesson", body = LessonView),
        (status = 403, description = "Not a teacher"),
        (status = 404, description = "No such lesson for this teacher")
    )
)]
pub async fn lesson_handler(
    State(state): State<Arc<AppState>>,
    AuthSession(session): AuthSession,
    Path(lesson_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_role(&session, Role::Teacher)?;
    let lesson = owned_lesson(&state.lessons, lesson_id, &session, Side::Teacher).await?;
    Ok(Json(LessonView::from(&lesson)))
}

/// POST /teacher/{lesson_id} - Save edits and optionally swap the PDF
///
/// Accepts a multipart/form-data request. Fields left out are not changed; a
/// `pdf` file replaces the current attachment.
#[utoipa::path(
    post,
    path = "/teacher/{lesson_id}",
    params(("lesson_id" = Uuid, Path, description = "The lesson to update.")),
    request_body(content_type = "multipart/form-data", description = "The edited lesson form."),
    responses(
        (status = 303, description = "Saved; redirect back to the lesson"),
        (status = 400, description = "Invalid fields"),
        (status = 403, description = "Not a teacher"),
        (status = 404, description = "No such lesson for this teacher"),
        (status = 503, description = "Storage unavailable; nothing was saved")
    )
)]
pub async fn update_lesson_handler(
    State(state): State<Arc<AppState>>,
    AuthSession(session): AuthSession,
    Path(lesson_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_role(&session, Role::Teacher)?;
    owned_lesson(&state.lessons, lesson_id, &session, Side::Teacher).await?;
    let mut form = LessonForm::from_multipart(multipart).await?;

    let quiz = match form.take("quiz") {
        Some(raw) => parse_quiz_update(&raw).map_err(|e| port_error_response(e, "Invalid quiz"))?,
        None => None,
    };
    let changes = LessonChanges {
        title: form.take("title"),
        description: form.take("description"),
        video_url: form.take("videoUrl"),
        completed: form.take_flag("completed")?,
        quiz,
    };

    state
        .lessons
        .edit(lesson_id, changes, form.pdf.take())
        .await
        .map_err(|e| port_error_response(e, "Failed to update lesson"))?;

    Ok(Redirect::to(&format!("/teacher/{}", lesson_id)))
}

/// GET /teacher/{lesson_id}/download - A short-lived link to the lesson's PDF
#[utoipa::path(
    get,
    path = "/teacher/{lesson_id}/download",
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
    require_role(&session, Role::Teacher)?;
    owned_lesson(&state.lessons, lesson_id, &session, Side::Teacher).await?;

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
