//! crates/lesson_portal_core/src/lessons.rs
//!
//! The lesson lifecycle: create, read, edit, attach, consume, complete.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    Attachment, Lesson, LessonUpdate, QuizQuestion, StorageType, StudentLessonSummary,
    StudentOption, TeacherLessonSummary, User,
};
use crate::ports::{BlobStore, DatabaseService, PortError, PortResult};
use crate::quiz::{parse_quiz_payload, validate_quiz};

pub const UNKNOWN_TEACHER: &str = "Unknown Teacher";
pub const UNKNOWN_STUDENT: &str = "Unknown Student";
pub const UNKNOWN_EMAIL: &str = "N/A";

/// A lesson as submitted by the assignment form.
#[derive(Debug, Clone)]
pub struct NewLesson {
    pub teacher_id: Uuid,
    pub student_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    /// The quiz as a JSON array, unparsed.
    pub quiz_payload: Option<String>,
    pub attachment: Option<Attachment>,
}

/// Metadata edits. `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct LessonChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub completed: Option<bool>,
    pub quiz: Option<Vec<QuizQuestion>>,
}

#[derive(Clone)]
pub struct LessonService {
    db: Arc<dyn DatabaseService>,
    blobs: Arc<dyn BlobStore>,
    download_ttl: Duration,
}

impl LessonService {
    pub fn new(db: Arc<dyn DatabaseService>, blobs: Arc<dyn BlobStore>, download_ttl: Duration) -> Self {
        Self {
            db,
            blobs,
            download_ttl,
        }
    }

    /// How long an issued download link stays valid.
    pub fn download_ttl(&self) -> Duration {
        self.download_ttl
    }

    /// Creates a lesson targeted at one student and returns its id.
    pub async fn create(&self, new: NewLesson) -> PortResult<Uuid> {
        let student_id = new
            .student_id
            .ok_or_else(|| PortError::Validation("Student is required".to_string()))?;
        let title = new.title.trim();
        if title.is_empty() {
            return Err(PortError::Validation("Title is required".to_string()));
        }
        let quiz = parse_quiz_payload(new.quiz_payload.as_deref())?;

        match self.db.get_user_by_id(student_id).await {
            Ok(_) => {}
            Err(PortError::NotFound(_)) => {
                return Err(PortError::Validation(format!("Student {} does not exist", student_id)))
            }
            Err(e) => return Err(e),
        }

        let now = Utc::now();
        let pdf_key = match new.attachment.filter(|a| !a.is_empty()) {
            Some(file) => {
                let key = attachment_key(new.teacher_id, &file.file_name, now);
                self.blobs.put(&key, file.bytes, &file.content_type).await?;
                key
            }
            None => String::new(),
        };

        let lesson = Lesson {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: new.description.unwrap_or_default(),
            video_url: new.video_url.unwrap_or_default().trim().to_string(),
            storage_type: StorageType::External,
            teacher_id: new.teacher_id,
            student_id,
            pdf_key,
            quiz,
            completed: false,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.db.insert_lesson(&lesson).await {
            if lesson.has_attachment() {
                self.discard_blob(&lesson.pdf_key).await;
            }
            return Err(e);
        }

        info!(lesson_id = %lesson.id, teacher_id = %lesson.teacher_id, student_id = %student_id, "Lesson created");
        Ok(lesson.id)
    }

    pub async fn fetch_by_id(&self, lesson_id: Uuid) -> PortResult<Lesson> {
        self.db.get_lesson_by_id(lesson_id).await
    }

    /// All lessons assigned to a student, with the assigning teacher's name and email.
    pub async fn fetch_by_student(&self, student_id: Uuid) -> PortResult<Vec<StudentLessonSummary>> {
        let lessons = self.db.get_lessons_by_student(student_id).await?;
        if lessons.is_empty() {
            return Ok(Vec::new());
        }

        let teachers = self.users_by_id(lessons.iter().map(|l| l.teacher_id)).await?;
        Ok(lessons
            .into_iter()
            .map(|lesson| {
                let teacher = teachers.get(&lesson.teacher_id);
                StudentLessonSummary {
                    teacher_name: teacher.map_or_else(|| UNKNOWN_TEACHER.to_string(), |t| t.name.clone()),
                    teacher_email: teacher.map_or_else(|| UNKNOWN_EMAIL.to_string(), |t| t.email.clone()),
                    lesson,
                }
            })
            .collect())
    }

    /// All lessons a teacher has assigned, newest first, with the student's name.
    pub async fn fetch_by_teacher(&self, teacher_id: Uuid) -> PortResult<Vec<TeacherLessonSummary>> {
        let lessons = self.db.get_lessons_by_teacher(teacher_id).await?;
        if lessons.is_empty() {
            return Ok(Vec::new());
        }

        let students = self.users_by_id(lessons.iter().map(|l| l.student_id)).await?;
        Ok(lessons
            .into_iter()
            .map(|lesson| TeacherLessonSummary {
                student_name: students
                    .get(&lesson.student_id)
                    .map_or_else(|| UNKNOWN_STUDENT.to_string(), |s| s.name.clone()),
                lesson,
            })
            .collect())
    }

    pub async fn update_metadata(&self, lesson_id: Uuid, changes: LessonChanges) -> PortResult<Lesson> {
        self.edit(lesson_id, changes, None).await
    }

    /// Swaps the lesson's PDF for `new_file`. Without a file, nothing changes.
    pub async fn replace_attachment(&self, lesson_id: Uuid, new_file: Option<Attachment>) -> PortResult<Lesson> {
        self.edit(lesson_id, LessonChanges::default(), new_file).await
    }

    /// Applies metadata edits and an optional new PDF as one lesson write.
    ///
    /// The new object is stored before the lesson is touched, so a failed upload
    /// leaves every field as it was. If the write fails the new object is
    /// discarded. The old object is removed only after the lesson points at the
    /// new one; failing to remove it is logged and does not fail the edit.
    pub async fn edit(
        &self,
        lesson_id: Uuid,
        changes: LessonChanges,
        new_file: Option<Attachment>,
    ) -> PortResult<Lesson> {
        if let Some(title) = &changes.title {
            if title.trim().is_empty() {
                return Err(PortError::Validation("Title is required".to_string()));
            }
        }
        if let Some(video_url) = &changes.video_url {
            if video_url.trim().is_empty() {
                return Err(PortError::Validation("Video URL is required".to_string()));
            }
        }
        if let Some(quiz) = &changes.quiz {
            validate_quiz(quiz)?;
        }

        let mut update = LessonUpdate {
            title: changes.title.map(|t| t.trim().to_string()),
            description: changes.description,
            video_url: changes.video_url.map(|v| v.trim().to_string()),
            completed: changes.completed,
            quiz: changes.quiz,
            pdf_key: None,
        };

        let Some(file) = new_file.filter(|f| !f.is_empty()) else {
            if update.is_empty() {
                return self.db.get_lesson_by_id(lesson_id).await;
            }
            return self.db.update_lesson(lesson_id, &update).await;
        };

        let lesson = self.db.get_lesson_by_id(lesson_id).await?;
        let new_key = attachment_key(lesson.teacher_id, &file.file_name, Utc::now());
        self.blobs.put(&new_key, file.bytes, &file.content_type).await?;

        update.pdf_key = Some(new_key.clone());
        let updated = match self.db.update_lesson(lesson_id, &update).await {
            Ok(updated) => updated,
            Err(e) => {
                self.discard_blob(&new_key).await;
                return Err(e);
            }
        };

        if lesson.has_attachment() && lesson.pdf_key != new_key {
            if let Err(e) = self.blobs.delete(&lesson.pdf_key).await {
                warn!(
                    lesson_id = %lesson_id,
                    old_key = %lesson.pdf_key,
                    "Replaced attachment but could not delete the old object: {}", e
                );
            }
        }

        info!(lesson_id = %lesson_id, pdf_key = %new_key, "Lesson attachment replaced");
        Ok(updated)
    }

    /// Marks the lesson as done. Calling it again changes nothing.
    pub async fn mark_completed(&self, lesson_id: Uuid) -> PortResult<Lesson> {
        let update = LessonUpdate {
            completed: Some(true),
            ..LessonUpdate::default()
        };
        self.db.update_lesson(lesson_id, &update).await
    }

    /// Mints a short-lived download link for the lesson's PDF. Never stored.
    pub async fn issue_download_url(&self, lesson_id: Uuid) -> PortResult<String> {
        let lesson = self.db.get_lesson_by_id(lesson_id).await?;
        if !lesson.has_attachment() {
            return Err(PortError::NotFound(format!("Lesson {} has no attachment", lesson_id)));
        }
        self.blobs.signed_get_url(&lesson.pdf_key, self.download_ttl).await
    }

    /// Students enrolled in any of the teacher's classes, for the assignment picker.
    pub async fn students_for_teacher(&self, teacher_user_id: Uuid) -> PortResult<Vec<StudentOption>> {
        let profile = self.db.get_teacher_profile(teacher_user_id).await?;
        if profile.class_ids.is_empty() {
            return Ok(Vec::new());
        }

        let classes = self.db.get_classes_by_ids(&profile.class_ids).await?;
        let students = self.db.get_students_in_classes(&profile.class_ids).await?;

        let mut class_names: HashMap<Uuid, Vec<String>> = HashMap::new();
        for student in &students {
            let names = class_names.entry(student.user_id).or_default();
            for class in classes.iter().filter(|c| student.enrolled_class_ids.contains(&c.id)) {
                if !names.contains(&class.name) {
                    names.push(class.name.clone());
                }
            }
        }

        let mut seen = HashSet::new();
        let user_ids: Vec<Uuid> = students
            .iter()
            .map(|s| s.user_id)
            .filter(|id| seen.insert(*id))
            .collect();

        let users = self.db.get_users_by_ids(&user_ids).await?;
        Ok(users
            .into_iter()
            .map(|u| StudentOption {
                class_names: class_names.remove(&u.id).unwrap_or_default(),
                user_id: u.id,
                name: u.name,
                email: u.email,
                image: u.avatar_url,
            })
            .collect())
    }

    async fn users_by_id(&self, ids: impl Iterator<Item = Uuid>) -> PortResult<HashMap<Uuid, User>> {
        let unique: HashSet<Uuid> = ids.collect();
        let unique: Vec<Uuid> = unique.into_iter().collect();
        let users = self.db.get_users_by_ids(&unique).await?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }

    async fn discard_blob(&self, key: &str) {
        if let Err(e) = self.blobs.delete(key).await {
            warn!(key = %key, "Could not remove orphaned object: {}", e);
        }
    }
}

/// Builds `assignments/<owner>/<unix-millis>_<file name>`.
pub fn attachment_key(owner_id: Uuid, file_name: &str, at: DateTime<Utc>) -> String {
    format!(
        "assignments/{}/{}_{}",
        owner_id,
        at.timestamp_millis(),
        sanitize_file_name(file_name)
    )
}

fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches(['.', '_']).is_empty() {
        "attachment.pdf".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::quiz::QuizAttempt;
    use crate::testing::{InMemoryBlobStore, InMemoryDatabase};
    use bytes::Bytes;

    struct Fixture {
        db: Arc<InMemoryDatabase>,
        blobs: Arc<InMemoryBlobStore>,
        service: LessonService,
        teacher: User,
        student: User,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(InMemoryDatabase::default());
        let blobs = Arc::new(InMemoryBlobStore::default());
        let service = LessonService::new(db.clone(), blobs.clone(), Duration::from_secs(300));
        let teacher = db.add_user("Grace Hopper", "grace@example.com", Role::Teacher, true);
        let student = db.add_user("Alan Turing", "alan@example.com", Role::Student, true);
        Fixture {
            db,
            blobs,
            service,
            teacher,
            student,
        }
    }

    fn new_lesson(f: &Fixture, title: &str) -> NewLesson {
        NewLesson {
            teacher_id: f.teacher.id,
            student_id: Some(f.student.id),
            title: title.to_string(),
            description: None,
            video_url: Some("https://youtu.be/abc123".to_string()),
            quiz_payload: None,
            attachment: None,
        }
    }

    fn pdf(name: &str, body: &'static [u8]) -> Attachment {
        Attachment {
            file_name: name.to_string(),
            content_type: "application/pdf".to_string(),
            bytes: Bytes::from_static(body),
        }
    }

    #[tokio::test]
    async fn create_then_complete_keeps_other_fields() {
        let f = fixture();
        let id = f
            .service
            .create(NewLesson {
                quiz_payload: Some("[]".to_string()),
                ..new_lesson(&f, "Algebra Intro")
            })
            .await
            .unwrap();

        let lesson = f.service.fetch_by_id(id).await.unwrap();
        assert!(!lesson.completed);
        assert_eq!(lesson.pdf_key, "");
        assert_eq!(lesson.storage_type, StorageType::External);
        assert!(lesson.quiz.is_empty());

        f.service
            .update_metadata(
                id,
                LessonChanges {
                    completed: Some(true),
                    ..LessonChanges::default()
                },
            )
            .await
            .unwrap();

        let lesson = f.service.fetch_by_id(id).await.unwrap();
        assert!(lesson.completed);
        assert_eq!(lesson.title, "Algebra Intro");
    }

    #[tokio::test]
    async fn create_requires_student_and_title() {
        let f = fixture();
        let no_student = NewLesson {
            student_id: None,
            ..new_lesson(&f, "Algebra Intro")
        };
        assert!(matches!(f.service.create(no_student).await, Err(PortError::Validation(_))));
        assert!(matches!(
            f.service.create(new_lesson(&f, "   ")).await,
            Err(PortError::Validation(_))
        ));

        let unknown_student = NewLesson {
            student_id: Some(Uuid::new_v4()),
            ..new_lesson(&f, "Algebra Intro")
        };
        assert!(matches!(f.service.create(unknown_student).await, Err(PortError::Validation(_))));
    }

    #[tokio::test]
    async fn create_tolerates_malformed_quiz_json() {
        let f = fixture();
        let id = f
            .service
            .create(NewLesson {
                quiz_payload: Some("not json".to_string()),
                ..new_lesson(&f, "Geometry")
            })
            .await
            .unwrap();
        assert!(f.service.fetch_by_id(id).await.unwrap().quiz.is_empty());
    }

    #[tokio::test]
    async fn create_stores_the_attachment_under_an_owner_scoped_key() {
        let f = fixture();
        let id = f
            .service
            .create(NewLesson {
                attachment: Some(pdf("worksheet 1.pdf", b"%PDF-1.4")),
                ..new_lesson(&f, "Fractions")
            })
            .await
            .unwrap();

        let lesson = f.service.fetch_by_id(id).await.unwrap();
        let prefix = format!("assignments/{}/", f.teacher.id);
        assert!(lesson.pdf_key.starts_with(&prefix), "{}", lesson.pdf_key);
        assert!(lesson.pdf_key.ends_with("_worksheet_1.pdf"));
        assert!(f.blobs.contains(&lesson.pdf_key));
        assert_eq!(f.blobs.content_type(&lesson.pdf_key).as_deref(), Some("application/pdf"));
    }

    #[tokio::test]
    async fn create_cleans_up_the_upload_when_the_lesson_cannot_be_saved() {
        let f = fixture();
        f.db.set_fail_lesson_writes(true);
        let result = f
            .service
            .create(NewLesson {
                attachment: Some(pdf("w.pdf", b"%PDF")),
                ..new_lesson(&f, "Fractions")
            })
            .await;
        assert!(matches!(result, Err(PortError::Unavailable(_))));
        assert_eq!(f.blobs.object_count(), 0);
    }

    #[tokio::test]
    async fn listing_for_a_student_without_lessons_is_empty() {
        let f = fixture();
        assert!(f.service.fetch_by_student(f.student.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listings_are_enriched_with_names_or_placeholders() {
        let f = fixture();
        f.service.create(new_lesson(&f, "One")).await.unwrap();

        let for_student = f.service.fetch_by_student(f.student.id).await.unwrap();
        assert_eq!(for_student.len(), 1);
        assert_eq!(for_student[0].teacher_name, "Grace Hopper");
        assert_eq!(for_student[0].teacher_email, "grace@example.com");

        let for_teacher = f.service.fetch_by_teacher(f.teacher.id).await.unwrap();
        assert_eq!(for_teacher[0].student_name, "Alan Turing");

        f.db.remove_user(f.teacher.id);
        f.db.remove_user(f.student.id);

        let for_student = f.service.fetch_by_student(f.student.id).await.unwrap();
        assert_eq!(for_student[0].teacher_name, UNKNOWN_TEACHER);
        assert_eq!(for_student[0].teacher_email, UNKNOWN_EMAIL);
        let for_teacher = f.service.fetch_by_teacher(f.teacher.id).await.unwrap();
        assert_eq!(for_teacher[0].student_name, UNKNOWN_STUDENT);
    }

    #[tokio::test]
    async fn teacher_listing_is_newest_first() {
        let f = fixture();
        let first = f.service.create(new_lesson(&f, "First")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = f.service.create(new_lesson(&f, "Second")).await.unwrap();

        let lessons = f.service.fetch_by_teacher(f.teacher.id).await.unwrap();
        let ids: Vec<Uuid> = lessons.iter().map(|s| s.lesson.id).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[tokio::test]
    async fn update_of_a_missing_lesson_is_not_found() {
        let f = fixture();
        let changes = LessonChanges {
            title: Some("New".to_string()),
            ..LessonChanges::default()
        };
        assert!(matches!(
            f.service.update_metadata(Uuid::new_v4(), changes).await,
            Err(PortError::NotFound(_))
        ));
        assert!(matches!(
            f.service.update_metadata(Uuid::new_v4(), LessonChanges::default()).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_rejects_blank_title_video_and_bad_quiz() {
        let f = fixture();
        let id = f.service.create(new_lesson(&f, "Algebra")).await.unwrap();

        let blank_title = LessonChanges {
            title: Some(" ".to_string()),
            ..LessonChanges::default()
        };
        let blank_video = LessonChanges {
            video_url: Some(String::new()),
            ..LessonChanges::default()
        };
        let bad_quiz = LessonChanges {
            quiz: Some(vec![QuizQuestion {
                question: "Q".to_string(),
                options: vec!["only".to_string()],
                correct_answer: "0".to_string(),
            }]),
            ..LessonChanges::default()
        };
        for changes in [blank_title, blank_video, bad_quiz] {
            assert!(matches!(
                f.service.update_metadata(id, changes).await,
                Err(PortError::Validation(_))
            ));
        }
        assert_eq!(f.service.fetch_by_id(id).await.unwrap().title, "Algebra");
    }

    #[tokio::test]
    async fn mark_completed_is_idempotent() {
        let f = fixture();
        let id = f.service.create(new_lesson(&f, "Algebra")).await.unwrap();

        assert!(f.service.mark_completed(id).await.unwrap().completed);
        assert!(f.service.mark_completed(id).await.unwrap().completed);
        assert!(matches!(
            f.service.mark_completed(Uuid::new_v4()).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn replace_without_a_file_keeps_the_key() {
        let f = fixture();
        let id = f
            .service
            .create(NewLesson {
                attachment: Some(pdf("a.pdf", b"%PDF-a")),
                ..new_lesson(&f, "Algebra")
            })
            .await
            .unwrap();
        let before = f.service.fetch_by_id(id).await.unwrap().pdf_key;

        let after = f.service.replace_attachment(id, None).await.unwrap();
        assert_eq!(after.pdf_key, before);

        let empty = Attachment {
            bytes: Bytes::new(),
            ..pdf("empty.pdf", b"")
        };
        let after = f.service.replace_attachment(id, Some(empty)).await.unwrap();
        assert_eq!(after.pdf_key, before);
        assert!(f.blobs.contains(&before));
    }

    #[tokio::test]
    async fn replace_with_a_file_swaps_and_deletes_the_old_object() {
        let f = fixture();
        let id = f
            .service
            .create(NewLesson {
                attachment: Some(pdf("a.pdf", b"%PDF-a")),
                ..new_lesson(&f, "Algebra")
            })
            .await
            .unwrap();
        let old_key = f.service.fetch_by_id(id).await.unwrap().pdf_key;

        let updated = f
            .service
            .replace_attachment(id, Some(pdf("b.pdf", b"%PDF-b")))
            .await
            .unwrap();

        assert_ne!(updated.pdf_key, old_key);
        assert!(f.blobs.contains(&updated.pdf_key));
        assert!(!f.blobs.contains(&old_key));
        assert_eq!(f.blobs.object_count(), 1);
        assert!(f.service.issue_download_url(id).await.unwrap().contains(&updated.pdf_key));
    }

    #[tokio::test]
    async fn replace_on_a_lesson_without_attachment_just_attaches() {
        let f = fixture();
        let id = f.service.create(new_lesson(&f, "Algebra")).await.unwrap();
        let updated = f
            .service
            .replace_attachment(id, Some(pdf("b.pdf", b"%PDF-b")))
            .await
            .unwrap();
        assert!(updated.has_attachment());
        assert_eq!(f.blobs.object_count(), 1);
    }

    #[tokio::test]
    async fn failed_upload_leaves_the_prior_attachment_intact() {
        let f = fixture();
        let id = f
            .service
            .create(NewLesson {
                attachment: Some(pdf("a.pdf", b"%PDF-a")),
                ..new_lesson(&f, "Algebra")
            })
            .await
            .unwrap();
        let old_key = f.service.fetch_by_id(id).await.unwrap().pdf_key;

        f.blobs.set_fail_puts(true);
        let result = f.service.replace_attachment(id, Some(pdf("b.pdf", b"%PDF-b"))).await;

        assert!(matches!(result, Err(PortError::Unavailable(_))));
        assert_eq!(f.service.fetch_by_id(id).await.unwrap().pdf_key, old_key);
        assert!(f.blobs.contains(&old_key));
    }

    #[tokio::test]
    async fn failed_upload_aborts_the_whole_edit() {
        let f = fixture();
        let id = f.service.create(new_lesson(&f, "Algebra")).await.unwrap();

        f.blobs.set_fail_puts(true);
        let changes = LessonChanges {
            title: Some("Renamed".to_string()),
            completed: Some(true),
            ..LessonChanges::default()
        };
        let result = f.service.edit(id, changes, Some(pdf("b.pdf", b"%PDF-b"))).await;

        assert!(matches!(result, Err(PortError::Unavailable(_))));
        let lesson = f.db.lesson(id).unwrap();
        assert_eq!(lesson.title, "Algebra");
        assert!(!lesson.completed);
        assert!(!lesson.has_attachment());
    }

    #[tokio::test]
    async fn edit_applies_metadata_and_attachment_together() {
        let f = fixture();
        let id = f
            .service
            .create(NewLesson {
                attachment: Some(pdf("a.pdf", b"%PDF-a")),
                ..new_lesson(&f, "Algebra")
            })
            .await
            .unwrap();
        let old_key = f.service.fetch_by_id(id).await.unwrap().pdf_key;

        let changes = LessonChanges {
            title: Some("  Geometry ".to_string()),
            ..LessonChanges::default()
        };
        let updated = f
            .service
            .edit(id, changes, Some(pdf("b.pdf", b"%PDF-b")))
            .await
            .unwrap();

        assert_eq!(updated.title, "Geometry");
        assert_ne!(updated.pdf_key, old_key);
        assert!(f.blobs.contains(&updated.pdf_key));
        assert!(!f.blobs.contains(&old_key));
    }

    #[tokio::test]
    async fn failed_delete_of_the_old_object_does_not_abort_the_replacement() {
        let f = fixture();
        let id = f
            .service
            .create(NewLesson {
                attachment: Some(pdf("a.pdf", b"%PDF-a")),
                ..new_lesson(&f, "Algebra")
            })
            .await
            .unwrap();
        let old_key = f.service.fetch_by_id(id).await.unwrap().pdf_key;

        f.blobs.set_fail_deletes(true);
        let updated = f
            .service
            .replace_attachment(id, Some(pdf("b.pdf", b"%PDF-b")))
            .await
            .unwrap();

        assert_ne!(updated.pdf_key, old_key);
        assert_eq!(f.db.lesson(id).unwrap().pdf_key, updated.pdf_key);
    }

    #[tokio::test]
    async fn failed_repoint_discards_the_new_object_and_keeps_the_old_one() {
        let f = fixture();
        let id = f
            .service
            .create(NewLesson {
                attachment: Some(pdf("a.pdf", b"%PDF-a")),
                ..new_lesson(&f, "Algebra")
            })
            .await
            .unwrap();
        let old_key = f.service.fetch_by_id(id).await.unwrap().pdf_key;

        f.db.set_fail_lesson_writes(true);
        let result = f.service.replace_attachment(id, Some(pdf("b.pdf", b"%PDF-b"))).await;

        assert!(result.is_err());
        assert_eq!(f.db.lesson(id).unwrap().pdf_key, old_key);
        assert!(f.blobs.contains(&old_key));
        assert_eq!(f.blobs.object_count(), 1);
    }

    #[tokio::test]
    async fn download_url_requires_an_attachment() {
        let f = fixture();
        let id = f.service.create(new_lesson(&f, "Algebra")).await.unwrap();
        assert!(matches!(
            f.service.issue_download_url(id).await,
            Err(PortError::NotFound(_))
        ));

        f.service
            .replace_attachment(id, Some(pdf("b.pdf", b"%PDF-b")))
            .await
            .unwrap();
        let url = f.service.issue_download_url(id).await.unwrap();
        assert!(url.ends_with("expires_in=300"), "{url}");
        // Minted per request, never written back.
        assert!(!f.db.lesson(id).unwrap().pdf_key.starts_with("https://"));
    }

    #[tokio::test]
    async fn grading_a_quiz_never_touches_completion() {
        let f = fixture();
        let raw = r#"[{"question":"2 + 2?","options":["3","4"],"correctAnswer":"1"}]"#;
        let id = f
            .service
            .create(NewLesson {
                quiz_payload: Some(raw.to_string()),
                ..new_lesson(&f, "Arithmetic")
            })
            .await
            .unwrap();
        let lesson = f.service.fetch_by_id(id).await.unwrap();

        let mut attempt = QuizAttempt::new(&lesson.quiz[0]);
        attempt.select("1");
        assert!(attempt.submit());
        attempt.reset();
        attempt.select("0");
        assert!(!attempt.submit());

        assert!(!f.service.fetch_by_id(id).await.unwrap().completed);
    }

    #[tokio::test]
    async fn picker_lists_students_of_the_teachers_classes() {
        let f = fixture();
        let profile = f.db.add_teacher_profile(f.teacher.id);
        let morning = f.db.add_class("Saturday 8AM Science", profile.id);
        let evening = f.db.add_class("Evening Maths", profile.id);
        let elsewhere = f.db.add_class("Other Teacher's Class", Uuid::new_v4());
        let outsider = f.db.add_user("Outsider", "out@example.com", Role::Student, true);
        f.db.add_student_profile(f.student.id, vec![morning.id, evening.id]);
        f.db.add_student_profile(outsider.id, vec![elsewhere.id]);

        let options = f.service.students_for_teacher(f.teacher.id).await.unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].user_id, f.student.id);
        assert_eq!(options[0].name, "Alan Turing");
        assert_eq!(options[0].class_names.len(), 2);
        assert!(options[0].class_names.contains(&"Evening Maths".to_string()));
    }

    #[tokio::test]
    async fn picker_needs_a_teacher_profile() {
        let f = fixture();
        assert!(matches!(
            f.service.students_for_teacher(f.student.id).await,
            Err(PortError::NotFound(_))
        ));

        f.db.add_teacher_profile(f.teacher.id);
        assert!(f.service.students_for_teacher(f.teacher.id).await.unwrap().is_empty());
    }

    #[test]
    fn attachment_keys_are_scoped_and_sanitised() {
        let owner = Uuid::nil();
        let at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        assert_eq!(
            attachment_key(owner, "../../etc/My Report.pdf", at),
            format!("assignments/{}/1700000000123_My_Report.pdf", owner)
        );
        assert_eq!(
            attachment_key(owner, "", at),
            format!("assignments/{}/1700000000123_attachment.pdf", owner)
        );
    }
}
