pub mod access;
pub mod domain;
pub mod lessons;
pub mod ports;
pub mod quiz;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use access::{home_for, AccessDecision, RouteClass, RoutePolicy};
pub use domain::{
    Attachment, Class, ExternalIdentity, Lesson, LessonUpdate, QuizQuestion, Role, Session,
    StorageType, StudentLessonSummary, StudentOption, StudentProfile, TeacherLessonSummary,
    TeacherProfile, UnknownVariant, User,
};
pub use lessons::{LessonChanges, LessonService, NewLesson};
pub use ports::{
    AuthorizationRequest, BlobStore, DatabaseService, IdentityProvider, PortError, PortResult,
};
pub use session::SessionIssuer;
