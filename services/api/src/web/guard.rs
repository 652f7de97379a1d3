//! services/api/src/web/guard.rs
//!
//! Per-handler checks that sit behind the access gate: the gate routes by role
//! area, these confirm the exact role and the ownership of a lesson.

use axum::http::StatusCode;
use lesson_portal_core::domain::{Lesson, Role, Session};
use lesson_portal_core::LessonService;
use tracing::warn;
use uuid::Uuid;

use crate::web::rest::port_error_response;

pub fn require_role(session: &Session, role: Role) -> Result<(), (StatusCode, String)> {
    if session.role == role {
        Ok(())
    } else {
        warn!(user_id = %session.user_id, role = %session.role, wanted = %role, "Role check failed");
        Err((StatusCode::FORBIDDEN, "Forbidden".to_string()))
    }
}

/// Which side of a lesson the caller must be on.
#[derive(Debug, Clone, Copy)]
pub enum Side {
    Teacher,
    Student,
}

/// Loads a lesson the caller is party to. Someone else's lesson reads as missing.
pub async fn owned_lesson(
    lessons: &LessonService,
    lesson_id: Uuid,
    session: &Session,
    side: Side,
) -> Result<Lesson, (StatusCode, String)> {
    let lesson = lessons
        .fetch_by_id(lesson_id)
        .await
        .map_err(|e| port_error_response(e, "Failed to load lesson"))?;

    let owner = match side {
        Side::Teacher => lesson.teacher_id,
        Side::Student => lesson.student_id,
    };
    if owner != session.user_id {
        warn!(%lesson_id, user_id = %session.user_id, "Lesson requested by a non-owner");
        return Err((StatusCode::NOT_FOUND, "Not found".to_string()));
    }
    Ok(lesson)
}
