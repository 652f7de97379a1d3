//! crates/lesson_portal_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or object stores.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{
    Class, ExternalIdentity, Lesson, LessonUpdate, StudentProfile, TeacherProfile, User,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Upstream service unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The account and lesson store.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---

    /// Returns the user registered under the identity's email, creating a
    /// `student`, unvetted account on first sight.
    async fn get_or_create_user(&self, identity: &ExternalIdentity) -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    /// Looks up many users at once. Ids that do not resolve are skipped.
    async fn get_users_by_ids(&self, user_ids: &[Uuid]) -> PortResult<Vec<User>>;

    // --- Profiles and Classes ---
    async fn get_teacher_profile(&self, user_id: Uuid) -> PortResult<TeacherProfile>;

    async fn get_classes_by_ids(&self, class_ids: &[Uuid]) -> PortResult<Vec<Class>>;

    async fn get_students_in_classes(&self, class_ids: &[Uuid]) -> PortResult<Vec<StudentProfile>>;

    // --- Lesson Management ---
    async fn insert_lesson(&self, lesson: &Lesson) -> PortResult<()>;

    async fn get_lesson_by_id(&self, lesson_id: Uuid) -> PortResult<Lesson>;

    async fn get_lessons_by_student(&self, student_id: Uuid) -> PortResult<Vec<Lesson>>;

    /// Lessons created by a teacher, newest first.
    async fn get_lessons_by_teacher(&self, teacher_id: Uuid) -> PortResult<Vec<Lesson>>;

    /// Applies a partial update and returns the stored result.
    async fn update_lesson(&self, lesson_id: Uuid, update: &LessonUpdate) -> PortResult<Lesson>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> PortResult<()>;

    async fn delete(&self, key: &str) -> PortResult<()>;

    /// Issues a credential-free URL granting read access to `key` for `ttl`.
    async fn signed_get_url(&self, key: &str, ttl: Duration) -> PortResult<String>;
}

/// Where to send the browser to start a login, plus the state to verify on return.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub csrf_token: String,
    pub pkce_verifier: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn authorization_request(&self) -> PortResult<AuthorizationRequest>;

    /// Exchanges the provider's callback code for a verified identity.
    async fn exchange_code(&self, code: &str, pkce_verifier: &str) -> PortResult<ExternalIdentity>;
}
