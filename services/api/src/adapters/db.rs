//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! The connection pool is created on first use and shared by every later caller.
//! Concurrent first callers wait on the same connection attempt instead of each
//! opening their own; a failed attempt leaves the slot empty so the next caller
//! retries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lesson_portal_core::domain::{
    Class, ExternalIdentity, Lesson, LessonUpdate, QuizQuestion, StudentProfile, TeacherProfile,
    User,
};
use lesson_portal_core::ports::{DatabaseService, PortError, PortResult};
use lesson_portal_core::quiz::QuizQuestionPayload;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{error, info};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    database_url: String,
    max_connections: u32,
    pool: Arc<OnceCell<PgPool>>,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`. No connection is made until the first query.
    pub fn new(database_url: impl Into<String>, max_connections: u32) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections,
            pool: Arc::new(OnceCell::new()),
        }
    }

    /// Returns the shared pool, connecting on first use.
    async fn pool(&self) -> PortResult<&PgPool> {
        self.pool
            .get_or_try_init(|| async {
                info!("Connecting to database...");
                let pool = PgPoolOptions::new()
                    .max_connections(self.max_connections)
                    .acquire_timeout(Duration::from_secs(10))
                    .connect(&self.database_url)
                    .await?;
                info!("Database connection established.");
                Ok::<_, sqlx::Error>(pool)
            })
            .await
            .map_err(|e| {
                error!("Failed to connect to database: {:?}", e);
                PortError::Unavailable(format!("database connection failed: {}", e))
            })
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> PortResult<()> {
        let pool = self.pool().await?;
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(|e| PortError::Unexpected(format!("migration failed: {}", e)))?;
        Ok(())
    }
}

/// Classifies driver errors into the port taxonomy.
fn port_error(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound("row not found".to_string()),
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => PortError::Unavailable(e.to_string()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    name: String,
    image: Option<String>,
    role: String,
    vetted: bool,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        let role = self
            .role
            .parse()
            .map_err(|e| PortError::Unexpected(format!("user {}: {}", self.id, e)))?;
        Ok(User {
            id: self.id,
            email: self.email,
            name: self.name,
            avatar_url: self.image,
            role,
            vetted: self.vetted,
        })
    }
}

#[derive(FromRow)]
struct TeacherRecord {
    id: Uuid,
    user_id: Uuid,
    subjects: Vec<String>,
    class_ids: Vec<Uuid>,
}
impl TeacherRecord {
    fn to_domain(self) -> TeacherProfile {
        TeacherProfile {
            id: self.id,
            user_id: self.user_id,
            subjects: self.subjects,
            class_ids: self.class_ids,
        }
    }
}

#[derive(FromRow)]
struct StudentRecord {
    id: Uuid,
    user_id: Uuid,
    enrolled_class_ids: Vec<Uuid>,
}
impl StudentRecord {
    fn to_domain(self) -> StudentProfile {
        StudentProfile {
            id: self.id,
            user_id: self.user_id,
            enrolled_class_ids: self.enrolled_class_ids,
        }
    }
}

#[derive(FromRow)]
struct ClassRecord {
    id: Uuid,
    name: String,
    subject: String,
    teacher_id: Uuid,
    student_ids: Vec<Uuid>,
}
impl ClassRecord {
    fn to_domain(self) -> Class {
        Class {
            id: self.id,
            name: self.name,
            subject: self.subject,
            teacher_id: self.teacher_id,
            student_ids: self.student_ids,
        }
    }
}

#[derive(FromRow)]
struct LessonRecord {
    id: Uuid,
    title: String,
    description: String,
    video_url: String,
    storage_type: String,
    teacher_id: Uuid,
    student_id: Uuid,
    pdf_key: String,
    quiz: Json<Vec<QuizQuestionPayload>>,
    completed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl LessonRecord {
    fn to_domain(self) -> PortResult<Lesson> {
        let storage_type = self
            .storage_type
            .parse()
            .map_err(|e| PortError::Unexpected(format!("lesson {}: {}", self.id, e)))?;
        Ok(Lesson {
            id: self.id,
            title: self.title,
            description: self.description,
            video_url: self.video_url,
            storage_type,
            teacher_id: self.teacher_id,
            student_id: self.student_id,
            pdf_key: self.pdf_key,
            quiz: self.quiz.0.into_iter().map(Into::into).collect(),
            completed: self.completed,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn quiz_json(quiz: &[QuizQuestion]) -> Json<Vec<QuizQuestionPayload>> {
    Json(quiz.iter().map(QuizQuestionPayload::from).collect())
}

const USER_COLUMNS: &str = "id, email, name, image, role, vetted";
const LESSON_COLUMNS: &str = "id, title, description, video_url, storage_type, teacher_id, \
     student_id, pdf_key, quiz, completed, created_at, updated_at";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn get_or_create_user(&self, identity: &ExternalIdentity) -> PortResult<User> {
        let pool = self.pool().await?;

        sqlx::query(
            "INSERT INTO users (id, email, name, image, google_id, role, vetted) \
             VALUES ($1, $2, $3, $4, $5, 'student', FALSE) \
             ON CONFLICT (email) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(&identity.email)
        .bind(&identity.name)
        .bind(&identity.picture_url)
        .bind(&identity.provider_account_id)
        .execute(pool)
        .await
        .map_err(port_error)?;

        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(&identity.email)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", identity.email)),
            _ => port_error(e),
        })?;

        record.to_domain()
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let pool = self.pool().await?;
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => port_error(e),
        })?;
        record.to_domain()
    }

    async fn get_users_by_ids(&self, user_ids: &[Uuid]) -> PortResult<Vec<User>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let pool = self.pool().await?;
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE id = ANY($1)",
            USER_COLUMNS
        ))
        .bind(user_ids)
        .fetch_all(pool)
        .await
        .map_err(port_error)?;

        records.into_iter().map(UserRecord::to_domain).collect()
    }

    async fn get_teacher_profile(&self, user_id: Uuid) -> PortResult<TeacherProfile> {
        let pool = self.pool().await?;
        let record = sqlx::query_as::<_, TeacherRecord>(
            "SELECT t.id, t.user_id, t.subjects, \
                    COALESCE(array_agg(c.id) FILTER (WHERE c.id IS NOT NULL), '{}') AS class_ids \
             FROM teachers t \
             LEFT JOIN classes c ON c.teacher_id = t.id \
             WHERE t.user_id = $1 \
             GROUP BY t.id",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Teacher profile for {} not found", user_id))
            }
            _ => port_error(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_classes_by_ids(&self, class_ids: &[Uuid]) -> PortResult<Vec<Class>> {
        if class_ids.is_empty() {
            return Ok(Vec::new());
        }
        let pool = self.pool().await?;
        let records = sqlx::query_as::<_, ClassRecord>(
            "SELECT c.id, c.name, c.subject, c.teacher_id, \
                    COALESCE(array_agg(e.student_id) FILTER (WHERE e.student_id IS NOT NULL), '{}') AS student_ids \
             FROM classes c \
             LEFT JOIN class_enrollments e ON e.class_id = c.id \
             WHERE c.id = ANY($1) \
             GROUP BY c.id",
        )
        .bind(class_ids)
        .fetch_all(pool)
        .await
        .map_err(port_error)?;

        Ok(records.into_iter().map(ClassRecord::to_domain).collect())
    }

    async fn get_students_in_classes(&self, class_ids: &[Uuid]) -> PortResult<Vec<StudentProfile>> {
        if class_ids.is_empty() {
            return Ok(Vec::new());
        }
        let pool = self.pool().await?;
        let records = sqlx::query_as::<_, StudentRecord>(
            "SELECT s.id, s.user_id, array_agg(e.class_id) AS enrolled_class_ids \
             FROM students s \
             JOIN class_enrollments e ON e.student_id = s.id \
             WHERE s.id IN (SELECT student_id FROM class_enrollments WHERE class_id = ANY($1)) \
             GROUP BY s.id",
        )
        .bind(class_ids)
        .fetch_all(pool)
        .await
        .map_err(port_error)?;

        Ok(records.into_iter().map(StudentRecord::to_domain).collect())
    }

    async fn insert_lesson(&self, lesson: &Lesson) -> PortResult<()> {
        let pool = self.pool().await?;
        sqlx::query(
            "INSERT INTO lessons (id, title, description, video_url, storage_type, teacher_id, \
                                  student_id, pdf_key, quiz, completed, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(lesson.id)
        .bind(&lesson.title)
        .bind(&lesson.description)
        .bind(&lesson.video_url)
        .bind(lesson.storage_type.as_str())
        .bind(lesson.teacher_id)
        .bind(lesson.student_id)
        .bind(&lesson.pdf_key)
        .bind(quiz_json(&lesson.quiz))
        .bind(lesson.completed)
        .bind(lesson.created_at)
        .bind(lesson.updated_at)
        .execute(pool)
        .await
        .map_err(port_error)?;
        Ok(())
    }

    async fn get_lesson_by_id(&self, lesson_id: Uuid) -> PortResult<Lesson> {
        let pool = self.pool().await?;
        let record = sqlx::query_as::<_, LessonRecord>(&format!(
            "SELECT {} FROM lessons WHERE id = $1",
            LESSON_COLUMNS
        ))
        .bind(lesson_id)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Lesson {} not found", lesson_id)),
            _ => port_error(e),
        })?;
        record.to_domain()
    }

    async fn get_lessons_by_student(&self, student_id: Uuid) -> PortResult<Vec<Lesson>> {
        let pool = self.pool().await?;
        let records = sqlx::query_as::<_, LessonRecord>(&format!(
            "SELECT {} FROM lessons WHERE student_id = $1 ORDER BY created_at ASC",
            LESSON_COLUMNS
        ))
        .bind(student_id)
        .fetch_all(pool)
        .await
        .map_err(port_error)?;

        records.into_iter().map(LessonRecord::to_domain).collect()
    }

    async fn get_lessons_by_teacher(&self, teacher_id: Uuid) -> PortResult<Vec<Lesson>> {
        let pool = self.pool().await?;
        let records = sqlx::query_as::<_, LessonRecord>(&format!(
            "SELECT {} FROM lessons WHERE teacher_id = $1 ORDER BY created_at DESC",
            LESSON_COLUMNS
        ))
        .bind(teacher_id)
        .fetch_all(pool)
        .await
        .map_err(port_error)?;

        records.into_iter().map(LessonRecord::to_domain).collect()
    }

    async fn update_lesson(&self, lesson_id: Uuid, update: &LessonUpdate) -> PortResult<Lesson> {
        let pool = self.pool().await?;
        let record = sqlx::query_as::<_, LessonRecord>(&format!(
            "UPDATE lessons SET \
                title = COALESCE($2, title), \
                description = COALESCE($3, description), \
                video_url = COALESCE($4, video_url), \
                completed = COALESCE($5, completed), \
                quiz = COALESCE($6, quiz), \
                pdf_key = COALESCE($7, pdf_key), \
                updated_at = now() \
             WHERE id = $1 \
             RETURNING {}",
            LESSON_COLUMNS
        ))
        .bind(lesson_id)
        .bind(&update.title)
        .bind(&update.description)
        .bind(&update.video_url)
        .bind(update.completed)
        .bind(update.quiz.as_deref().map(quiz_json))
        .bind(&update.pdf_key)
        .fetch_optional(pool)
        .await
        .map_err(port_error)?
        .ok_or_else(|| PortError::NotFound(format!("Lesson {} not found", lesson_id)))?;

        record.to_domain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failed_connection_leaves_the_pool_unset_for_a_retry() {
        let adapter = DbAdapter::new("not-a-postgres-url", 1);

        let (first, second) = tokio::join!(
            adapter.get_user_by_id(Uuid::new_v4()),
            adapter.get_lessons_by_student(Uuid::new_v4()),
        );
        assert!(matches!(first, Err(PortError::Unavailable(_))));
        assert!(matches!(second, Err(PortError::Unavailable(_))));
        assert!(adapter.pool.get().is_none());

        let retried = adapter.get_user_by_id(Uuid::new_v4()).await;
        assert!(matches!(retried, Err(PortError::Unavailable(_))));
        assert!(adapter.pool.get().is_none());
    }

    #[test]
    fn missing_rows_map_to_not_found() {
        assert!(matches!(
            port_error(sqlx::Error::RowNotFound),
            PortError::NotFound(_)
        ));
        assert!(matches!(
            port_error(sqlx::Error::PoolTimedOut),
            PortError::Unavailable(_)
        ));
    }
}
