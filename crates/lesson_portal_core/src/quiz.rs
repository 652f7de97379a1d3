//! crates/lesson_portal_core/src/quiz.rs
//!
//! Parsing, validation and grading of lesson quizzes.
//!
//! Grading is local to the learner: an attempt is compared against the stored
//! answer and nothing about it is persisted. Only a lesson's `completed` flag is
//! ever written back, and that happens independently of the quiz outcome.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::QuizQuestion;
use crate::ports::{PortError, PortResult};

/// The JSON shape of a quiz question, as submitted by forms and as stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionPayload {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

impl From<QuizQuestionPayload> for QuizQuestion {
    fn from(p: QuizQuestionPayload) -> Self {
        QuizQuestion {
            question: p.question,
            options: p.options,
            correct_answer: p.correct_answer,
        }
    }
}

impl From<&QuizQuestion> for QuizQuestionPayload {
    fn from(q: &QuizQuestion) -> Self {
        QuizQuestionPayload {
            question: q.question.clone(),
            options: q.options.clone(),
            correct_answer: q.correct_answer.clone(),
        }
    }
}

/// Parses a quiz submitted as a JSON array.
///
/// Text that is not JSON at all is logged and read as an empty quiz. JSON that
/// parses but does not describe valid questions is rejected.
pub fn parse_quiz_payload(raw: Option<&str>) -> PortResult<Vec<QuizQuestion>> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(Vec::new()),
        Some(raw) => raw,
    };

    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!("Ignoring malformed quiz payload: {}", e);
            return Ok(Vec::new());
        }
    };

    questions_from(value)
}

/// Parses a quiz submitted with a lesson edit.
///
/// Blank text means the quiz was not submitted and yields `None`. Unlike
/// [`parse_quiz_payload`], text that is not JSON is rejected so the stored quiz
/// is never replaced by an empty one.
pub fn parse_quiz_update(raw: &str) -> PortResult<Option<Vec<QuizQuestion>>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| PortError::Validation(format!("Quiz is not valid JSON: {}", e)))?;
    questions_from(value).map(Some)
}

fn questions_from(value: serde_json::Value) -> PortResult<Vec<QuizQuestion>> {
    let payload: Vec<QuizQuestionPayload> = serde_json::from_value(value)
        .map_err(|e| PortError::Validation(format!("Quiz has an invalid shape: {}", e)))?;

    let quiz: Vec<QuizQuestion> = payload.into_iter().map(QuizQuestion::from).collect();
    validate_quiz(&quiz)?;
    Ok(quiz)
}

pub fn validate_quiz(quiz: &[QuizQuestion]) -> PortResult<()> {
    for (index, question) in quiz.iter().enumerate() {
        question
            .validate()
            .map_err(|reason| PortError::Validation(format!("Question {}: {}", index + 1, reason)))?;
    }
    Ok(())
}

impl QuizQuestion {
    /// Checks the question against the form rules.
    pub fn validate(&self) -> Result<(), String> {
        if self.question.trim().is_empty() {
            return Err("question required".to_string());
        }
        if self.options.len() < 2 {
            return Err("at least 2 options required".to_string());
        }
        if self.options.iter().any(|o| o.trim().is_empty()) {
            return Err("options cannot be empty".to_string());
        }
        match self.correct_answer.trim().parse::<usize>() {
            Ok(i) if i < self.options.len() => Ok(()),
            _ => Err(format!(
                "correct answer '{}' is not an option index",
                self.correct_answer
            )),
        }
    }

    pub fn is_correct(&self, answer: &str) -> bool {
        answer == self.correct_answer
    }
}

/// One learner's pass at a question, mirroring the learning page's state.
#[derive(Debug, Clone)]
pub struct QuizAttempt<'q> {
    question: &'q QuizQuestion,
    selected: Option<String>,
    submitted: bool,
    correct: bool,
}

impl<'q> QuizAttempt<'q> {
    pub fn new(question: &'q QuizQuestion) -> Self {
        Self {
            question,
            selected: None,
            submitted: false,
            correct: false,
        }
    }

    /// Picks an option by index. Ignored once a correct answer is locked in.
    pub fn select(&mut self, answer: impl Into<String>) {
        if self.submitted && self.correct {
            return;
        }
        self.selected = Some(answer.into());
    }

    /// Grades the current selection and returns whether it was correct.
    pub fn submit(&mut self) -> bool {
        self.submitted = true;
        self.correct = self
            .selected
            .as_deref()
            .is_some_and(|answer| self.question.is_correct(answer));
        self.correct
    }

    pub fn reset(&mut self) {
        self.selected = None;
        self.submitted = false;
        self.correct = false;
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn is_correct(&self) -> bool {
        self.correct
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }
}
