//! services/api/src/web/rest.rs
//!
//! Contains the response payloads shared by the page handlers, the mapping from
//! port errors to HTTP responses, and the master definition for the OpenAPI
//! specification.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use lesson_portal_core::domain::{
    Lesson, QuizQuestion, StudentLessonSummary, StudentOption, TeacherLessonSummary,
};
use lesson_portal_core::ports::PortError;
use regex::Regex;
use serde::Serialize;
use tracing::{error, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::web::{auth, pages, student, teacher};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signin_handler,
        auth::callback_handler,
        auth::refresh_handler,
        auth::signout_handler,
        pages::landing_handler,
        pages::login_handler,
        pages::waiting_handler,
        student::dashboard_handler,
        student::lesson_handler,
        student::complete_handler,
        student::download_handler,
        teacher::dashboard_handler,
        teacher::assign_form_handler,
        teacher::assign_lesson_handler,
        teacher::lesson_handler,
        teacher::update_lesson_handler,
        teacher::download_handler,
    ),
    components(
        schemas(
            auth::SessionResponse,
            pages::LandingResponse,
            pages::LoginResponse,
            pages::WaitingResponse,
            QuizQuestionView,
            LessonView,
            StudentLessonView,
            TeacherLessonView,
            StudentOptionView,
            DownloadResponse,
        )
    ),
    tags(
        (name = "Lesson Portal API", description = "Role-gated pages for assigning and completing lessons.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionView {
    pub question: String,
    pub options: Vec<String>,
    /// Index of the right option. Grading happens in the browser.
    pub correct_answer: String,
}

impl From<&QuizQuestion> for QuizQuestionView {
    fn from(q: &QuizQuestion) -> Self {
        Self {
            question: q.question.clone(),
            options: q.options.clone(),
            correct_answer: q.correct_answer.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub video_url: String,
    /// An embeddable player URL for YouTube links, otherwise the video URL as is.
    pub embed_url: String,
    pub storage_type: String,
    pub teacher_id: Uuid,
    pub student_id: Uuid,
    pub has_attachment: bool,
    pub quiz: Vec<QuizQuestionView>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Lesson> for LessonView {
    fn from(l: &Lesson) -> Self {
        Self {
            id: l.id,
            title: l.title.clone(),
            description: l.description.clone(),
            video_url: l.video_url.clone(),
            embed_url: embed_url(&l.video_url),
            storage_type: l.storage_type.as_str().to_string(),
            teacher_id: l.teacher_id,
            student_id: l.student_id,
            has_attachment: l.has_attachment(),
            quiz: l.quiz.iter().map(QuizQuestionView::from).collect(),
            completed: l.completed,
            created_at: l.created_at,
            updated_at: l.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentLessonView {
    #[serde(flatten)]
    pub lesson: LessonView,
    pub teacher_name: String,
    pub teacher_email: String,
}

impl From<&StudentLessonSummary> for StudentLessonView {
    fn from(s: &StudentLessonSummary) -> Self {
        Self {
            lesson: LessonView::from(&s.lesson),
            teacher_name: s.teacher_name.clone(),
            teacher_email: s.teacher_email.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeacherLessonView {
    #[serde(flatten)]
    pub lesson: LessonView,
    pub student_name: String,
}

impl From<&TeacherLessonSummary> for TeacherLessonView {
    fn from(s: &TeacherLessonSummary) -> Self {
        Self {
            lesson: LessonView::from(&s.lesson),
            student_name: s.student_name.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentOptionView {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub class_names: Vec<String>,
}

impl From<&StudentOption> for StudentOptionView {
    fn from(s: &StudentOption) -> Self {
        Self {
            user_id: s.user_id,
            name: s.name.clone(),
            email: s.email.clone(),
            image: s.image.clone(),
            class_names: s.class_names.clone(),
        }
    }
}

/// A short-lived link to a lesson's PDF. Minted per request, never stored.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub url: String,
    pub expires_in_secs: u64,
}

//=========================================================================================
// Helpers
//=========================================================================================

lazy_static! {
    /// Matches the usual YouTube link shapes; group 2 is the video id.
    static ref YOUTUBE_REGEX: Regex =
        Regex::new(r"^.*(youtu\.be/|v/|u/\w/|embed/|watch\?v=|&v=)([^#&?/]*).*").unwrap();
}

/// Rewrites a YouTube link to its embeddable form. Other URLs pass through.
pub fn embed_url(video_url: &str) -> String {
    YOUTUBE_REGEX
        .captures(video_url)
        .and_then(|caps| caps.get(2))
        .filter(|id| id.as_str().len() == 11)
        .map(|id| format!("https://www.youtube.com/embed/{}", id.as_str()))
        .unwrap_or_else(|| video_url.to_string())
}

/// Maps a port error to the status and message a handler returns.
pub fn port_error_response(e: PortError, context: &str) -> (StatusCode, String) {
    match e {
        PortError::NotFound(msg) => {
            warn!("{}: {}", context, msg);
            (StatusCode::NOT_FOUND, "Not found".to_string())
        }
        PortError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Unavailable(msg) => {
            error!("{}: {}", context, msg);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable, please try again".to_string(),
            )
        }
        PortError::Unexpected(msg) => {
            error!("{}: {}", context, msg);
            (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
        }
    }
}
