//! Serializable views of sessions and outcomes, and their rendered forms.
//!
//! Views never expose quiz answers; answers only leave the session through a
//! [`Verdict`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use study_render::Document;
use uuid::Uuid;

use crate::error::StudyError;
use crate::prompt::Task;
use crate::quiz::Verdict;
use crate::session::{QuizKey, QuizPhase, QuizState, Session};

/// A quiz question with the user's current selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionView {
    /// Stable key, `quiz_{index}`.
    pub key: QuizKey,
    /// One-based display number.
    pub number: usize,
    /// Question text.
    pub text: String,
    /// Options in display order.
    pub options: Vec<String>,
    /// Current selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,
}

impl QuizQuestionView {
    /// Views of every generated question.
    #[must_use]
    pub fn from_quiz(quiz: &QuizState) -> Vec<Self> {
        quiz.keys()
            .zip(quiz.questions())
            .map(|(key, question)| Self {
                key,
                number: key.index() + 1,
                text: question.text.clone(),
                options: question.options.clone(),
                selected: quiz.selection(key).map(ToString::to_string),
            })
            .collect()
    }
}

/// Public state of a session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    /// Session identifier.
    pub session_id: Uuid,
    /// Whether the main action ran at least once.
    pub button_clicked: bool,
    /// Quiz phase.
    pub quiz_phase: QuizPhase,
    /// Generated questions.
    pub quiz: Vec<QuizQuestionView>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session last changed.
    pub updated_at: DateTime<Utc>,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.id(),
            button_clicked: session.button_clicked,
            quiz_phase: session.quiz.phase(),
            quiz: QuizQuestionView::from_quiz(&session.quiz),
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

/// Result of running one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// Summary or explanation.
    Text {
        /// The task that ran.
        task: Task,
        /// Output heading.
        heading: String,
        /// Generated text.
        text: String,
    },
    /// Independently generated study questions.
    Questions {
        /// Output heading.
        heading: String,
        /// One entry per generation call.
        questions: Vec<String>,
    },
    /// The session's quiz.
    Quiz {
        /// Output heading.
        heading: String,
        /// Questions with current selections.
        questions: Vec<QuizQuestionView>,
        /// Whether this run generated the quiz.
        generated: bool,
        /// Parser warnings from this run's generation.
        #[serde(skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
}

impl Outcome {
    /// Builds the renderable document for this outcome.
    #[must_use]
    pub fn to_document(&self) -> Document {
        match self {
            Self::Text { heading, text, .. } => Document::new().heading(heading).paragraph(text),
            Self::Questions { heading, questions } => questions
                .iter()
                .enumerate()
                .fold(Document::new().heading(heading), |doc, (i, question)| {
                    doc.bordered(format!("Question {}", i + 1), question)
                }),
            Self::Quiz {
                heading,
                questions,
                warnings,
                ..
            } => {
                let doc = warnings
                    .iter()
                    .fold(Document::new().heading(heading), |doc, w| doc.warning(w));
                questions.iter().fold(doc, |doc, q| {
                    doc.block(study_render::OutputBlock::QuizQuestion {
                        number: q.number,
                        key: q.key.to_string(),
                        question: q.text.clone(),
                        options: q.options.clone(),
                        selected: q.selected.clone(),
                    })
                })
            }
        }
    }
}

/// Builds the document shown after an answer check.
#[must_use]
pub fn verdict_document(verdict: &Verdict) -> Document {
    match verdict {
        Verdict::Correct => Document::new().success("Correct!"),
        Verdict::Incorrect { correct_answer } => Document::new().failure(format!(
            "Incorrect! The correct answer is: {correct_answer}"
        )),
    }
}

/// Builds the document shown for a failed action.
///
/// Empty input is a warning; everything else is an error block.
#[must_use]
pub fn error_document(error: &StudyError) -> Document {
    match error {
        StudyError::EmptyInput => Document::new().warning(error.to_string()),
        _ => Document::new().failure(error.to_string()),
    }
}
