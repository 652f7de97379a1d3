//! crates/lesson_portal_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Closed Enumerations
//=========================================================================================

/// Raised when a stored or submitted string names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// The role an account acts under. Drives routing in the access gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownVariant {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a lesson's video lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    S3,
    External,
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::S3 => "s3",
            StorageType::External => "external",
        }
    }
}

impl FromStr for StorageType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s3" => Ok(StorageType::S3),
            "external" => Ok(StorageType::External),
            other => Err(UnknownVariant {
                kind: "storage type",
                value: other.to_string(),
            }),
        }
    }
}

//=========================================================================================
// Accounts
//=========================================================================================

/// Represents an account - used throughout app.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub vetted: bool,
}

/// What the external identity provider vouches for after a successful login.
#[derive(Debug, Clone)]
pub struct ExternalIdentity {
    pub email: String,
    pub name: String,
    pub picture_url: Option<String>,
    pub provider_account_id: String,
}

#[derive(Debug, Clone)]
pub struct TeacherProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subjects: Vec<String>,
    pub class_ids: Vec<Uuid>,
}

#[derive(Debug, Clone)]
pub struct StudentProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub enrolled_class_ids: Vec<Uuid>,
}

/// A simple membership list linking one teacher to a set of students.
#[derive(Debug, Clone)]
pub struct Class {
    pub id: Uuid,
    pub name: String,
    pub subject: String,
    pub teacher_id: Uuid,
    pub student_ids: Vec<Uuid>,
}

/// The authorization snapshot carried by a browser session.
///
/// Stamped from the account record at login and at every refresh, so a role or
/// vetting change made out of band reaches the gate no later than the next refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub vetted: bool,
    pub image: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// Lessons
//=========================================================================================

/// A single multiple-choice question embedded in a lesson.
///
/// `correct_answer` holds the index of the right option, as a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

/// The central assignment aggregate: one teacher, one student.
#[derive(Debug, Clone)]
pub struct Lesson {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub video_url: String,
    pub storage_type: StorageType,
    pub teacher_id: Uuid,
    pub student_id: Uuid,
    /// Blob-store key of the attached PDF, or empty.
    pub pdf_key: String,
    pub quiz: Vec<QuizQuestion>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lesson {
    pub fn has_attachment(&self) -> bool {
        !self.pdf_key.is_empty()
    }
}

/// A partial update applied to a stored lesson. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct LessonUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub completed: Option<bool>,
    pub quiz: Option<Vec<QuizQuestion>>,
    pub pdf_key: Option<String>,
}

impl LessonUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.video_url.is_none()
            && self.completed.is_none()
            && self.quiz.is_none()
            && self.pdf_key.is_none()
    }
}

/// An uploaded file waiting to be stored.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl Attachment {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

//=========================================================================================
// Read Models
//=========================================================================================

/// A lesson as listed on a student's dashboard.
#[derive(Debug, Clone)]
pub struct StudentLessonSummary {
    pub lesson: Lesson,
    pub teacher_name: String,
    pub teacher_email: String,
}

/// A lesson as listed on a teacher's dashboard.
#[derive(Debug, Clone)]
pub struct TeacherLessonSummary {
    pub lesson: Lesson,
    pub student_name: String,
}

/// One entry of the assignment picker.
#[derive(Debug, Clone)]
pub struct StudentOption {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    /// Names of the teacher's classes this student is enrolled in.
    pub class_names: Vec<String>,
}
