//! crates/lesson_portal_core/src/testing.rs
//!
//! In-memory implementations of the ports, for tests in this crate and in the
//! service crate (via the `testing` feature).

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{
    Class, ExternalIdentity, Lesson, LessonUpdate, Role, StudentProfile, TeacherProfile, User,
};
use crate::ports::{
    AuthorizationRequest, BlobStore, DatabaseService, IdentityProvider, PortError, PortResult,
};

//=========================================================================================
// Database
//=========================================================================================

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    teachers: Vec<TeacherProfile>,
    students: Vec<StudentProfile>,
    classes: Vec<Class>,
    lessons: HashMap<Uuid, Lesson>,
}

#[derive(Default)]
pub struct InMemoryDatabase {
    tables: Mutex<Tables>,
    offline: AtomicBool,
    fail_lesson_writes: AtomicBool,
}

impl InMemoryDatabase {
    /// Makes every call fail as if the store were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes lesson inserts and updates fail while reads keep working.
    pub fn set_fail_lesson_writes(&self, fail: bool) {
        self.fail_lesson_writes.store(fail, Ordering::SeqCst);
    }

    pub fn add_user(&self, name: &str, email: &str, role: Role, vetted: bool) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.to_string(),
            avatar_url: None,
            role,
            vetted,
        };
        self.tables.lock().unwrap().users.insert(user.id, user.clone());
        user
    }

    pub fn add_teacher_profile(&self, user_id: Uuid) -> TeacherProfile {
        let profile = TeacherProfile {
            id: Uuid::new_v4(),
            user_id,
            subjects: Vec::new(),
            class_ids: Vec::new(),
        };
        self.tables.lock().unwrap().teachers.push(profile.clone());
        profile
    }

    /// Registers a student profile and adds it to each class's roster.
    pub fn add_student_profile(&self, user_id: Uuid, enrolled_class_ids: Vec<Uuid>) {
        let mut tables = self.tables.lock().unwrap();
        let profile_id = Uuid::new_v4();
        for class in tables.classes.iter_mut() {
            if enrolled_class_ids.contains(&class.id) {
                class.student_ids.push(profile_id);
            }
        }
        tables.students.push(StudentProfile {
            id: profile_id,
            user_id,
            enrolled_class_ids,
        });
    }

    pub fn add_class(&self, name: &str, teacher_profile_id: Uuid) -> Class {
        let class = Class {
            id: Uuid::new_v4(),
            name: name.to_string(),
            subject: "General".to_string(),
            teacher_id: teacher_profile_id,
            student_ids: Vec::new(),
        };
        self.tables.lock().unwrap().classes.push(class.clone());
        class
    }

    pub fn set_role(&self, user_id: Uuid, role: Role, vetted: bool) {
        if let Some(user) = self.tables.lock().unwrap().users.get_mut(&user_id) {
            user.role = role;
            user.vetted = vetted;
        }
    }

    pub fn remove_user(&self, user_id: Uuid) {
        self.tables.lock().unwrap().users.remove(&user_id);
    }

    pub fn user_count(&self) -> usize {
        self.tables.lock().unwrap().users.len()
    }

    pub fn lesson(&self, lesson_id: Uuid) -> Option<Lesson> {
        self.tables.lock().unwrap().lessons.get(&lesson_id).cloned()
    }

    fn check_online(&self) -> PortResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(PortError::Unavailable("database offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn check_writable(&self) -> PortResult<()> {
        self.check_online()?;
        if self.fail_lesson_writes.load(Ordering::SeqCst) {
            Err(PortError::Unavailable("lesson writes failing".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DatabaseService for InMemoryDatabase {
    async fn get_or_create_user(&self, identity: &ExternalIdentity) -> PortResult<User> {
        self.check_online()?;
        let mut tables = self.tables.lock().unwrap();
        if let Some(user) = tables.users.values().find(|u| u.email == identity.email) {
            return Ok(user.clone());
        }
        let user = User {
            id: Uuid::new_v4(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            avatar_url: identity.picture_url.clone(),
            role: Role::Student,
            vetted: false,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        self.check_online()?;
        self.tables
            .lock()
            .unwrap()
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn get_users_by_ids(&self, user_ids: &[Uuid]) -> PortResult<Vec<User>> {
        self.check_online()?;
        let tables = self.tables.lock().unwrap();
        Ok(user_ids
            .iter()
            .filter_map(|id| tables.users.get(id).cloned())
            .collect())
    }

    async fn get_teacher_profile(&self, user_id: Uuid) -> PortResult<TeacherProfile> {
        self.check_online()?;
        let tables = self.tables.lock().unwrap();
        let mut profile = tables
            .teachers
            .iter()
            .find(|t| t.user_id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Teacher profile for {} not found", user_id)))?;
        profile.class_ids = tables
            .classes
            .iter()
            .filter(|c| c.teacher_id == profile.id)
            .map(|c| c.id)
            .collect();
        Ok(profile)
    }

    async fn get_classes_by_ids(&self, class_ids: &[Uuid]) -> PortResult<Vec<Class>> {
        self.check_online()?;
        Ok(self
            .tables
            .lock()
            .unwrap()
            .classes
            .iter()
            .filter(|c| class_ids.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn get_students_in_classes(&self, class_ids: &[Uuid]) -> PortResult<Vec<StudentProfile>> {
        self.check_online()?;
        Ok(self
            .tables
            .lock()
            .unwrap()
            .students
            .iter()
            .filter(|s| s.enrolled_class_ids.iter().any(|c| class_ids.contains(c)))
            .cloned()
            .collect())
    }

    async fn insert_lesson(&self, lesson: &Lesson) -> PortResult<()> {
        self.check_writable()?;
        self.tables
            .lock()
            .unwrap()
            .lessons
            .insert(lesson.id, lesson.clone());
        Ok(())
    }

    async fn get_lesson_by_id(&self, lesson_id: Uuid) -> PortResult<Lesson> {
        self.check_online()?;
        self.lesson(lesson_id)
            .ok_or_else(|| PortError::NotFound(format!("Lesson {} not found", lesson_id)))
    }

    async fn get_lessons_by_student(&self, student_id: Uuid) -> PortResult<Vec<Lesson>> {
        self.check_online()?;
        let mut lessons: Vec<Lesson> = self
            .tables
            .lock()
            .unwrap()
            .lessons
            .values()
            .filter(|l| l.student_id == student_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| l.created_at);
        Ok(lessons)
    }

    async fn get_lessons_by_teacher(&self, teacher_id: Uuid) -> PortResult<Vec<Lesson>> {
        self.check_online()?;
        let mut lessons: Vec<Lesson> = self
            .tables
            .lock()
            .unwrap()
            .lessons
            .values()
            .filter(|l| l.teacher_id == teacher_id)
            .cloned()
            .collect();
        lessons.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(lessons)
    }

    async fn update_lesson(&self, lesson_id: Uuid, update: &LessonUpdate) -> PortResult<Lesson> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap();
        let lesson = tables
            .lessons
            .get_mut(&lesson_id)
            .ok_or_else(|| PortError::NotFound(format!("Lesson {} not found", lesson_id)))?;

        if let Some(title) = &update.title {
            lesson.title = title.clone();
        }
        if let Some(description) = &update.description {
            lesson.description = description.clone();
        }
        if let Some(video_url) = &update.video_url {
            lesson.video_url = video_url.clone();
        }
        if let Some(completed) = update.completed {
            lesson.completed = completed;
        }
        if let Some(quiz) = &update.quiz {
            lesson.quiz = quiz.clone();
        }
        if let Some(pdf_key) = &update.pdf_key {
            lesson.pdf_key = pdf_key.clone();
        }
        lesson.updated_at = Utc::now();
        Ok(lesson.clone())
    }
}

//=========================================================================================
// Blob Store
//=========================================================================================

#[derive(Default)]
pub struct InMemoryBlobStore {
    objects: Mutex<HashMap<String, (Bytes, String)>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl InMemoryBlobStore {
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.lock().unwrap().get(key).map(|(_, ct)| ct.clone())
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> PortResult<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(PortError::Unavailable("blob store rejected put".to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    async fn delete(&self, key: &str) -> PortResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(PortError::Unavailable("blob store rejected delete".to_string()));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn signed_get_url(&self, key: &str, ttl: Duration) -> PortResult<String> {
        if !self.contains(key) {
            return Err(PortError::NotFound(format!("Object {} not found", key)));
        }
        Ok(format!("https://blobs.test/{}?expires_in={}", key, ttl.as_secs()))
    }
}

//=========================================================================================
// Identity Provider
//=========================================================================================

/// Accepts the code `"good-code"` and vouches for a fixed identity.
pub struct StubIdentityProvider {
    pub identity: ExternalIdentity,
}

impl StubIdentityProvider {
    pub const GOOD_CODE: &'static str = "good-code";
    pub const CSRF_TOKEN: &'static str = "csrf-token";
}

#[async_trait]
impl IdentityProvider for StubIdentityProvider {
    fn authorization_request(&self) -> PortResult<AuthorizationRequest> {
        Ok(AuthorizationRequest {
            url: format!("https://idp.test/authorize?state={}", Self::CSRF_TOKEN),
            csrf_token: Self::CSRF_TOKEN.to_string(),
            pkce_verifier: "verifier".to_string(),
        })
    }

    async fn exchange_code(&self, code: &str, _pkce_verifier: &str) -> PortResult<ExternalIdentity> {
        if code == Self::GOOD_CODE {
            Ok(self.identity.clone())
        } else {
            Err(PortError::Unauthorized)
        }
    }
}
