//! Quiz reply parsing and answer verdicts.
//!
//! The quiz prompt asks the model for blocks shaped like:
//!
//! ```text
//! What is the capital of France?
//! A) Paris
//! B) London
//! C) Berlin
//! D) Madrid
//! A
//! ```
//!
//! separated by blank lines. [`parse_quiz`] turns every well-formed block
//! into a [`QuizItem`] and skips the rest with a warning. When nothing
//! parses, the whole reply becomes a single placeholder question.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::StudyError;

/// Placeholder options used when the reply has no usable structure.
pub const PLACEHOLDER_OPTIONS: [&str; 4] = [
    "Option A: Correct Answer",
    "Option B: Incorrect Option 1",
    "Option C: Incorrect Option 2",
    "Option D: Incorrect Option 3",
];

/// Correct answer of the placeholder question.
pub const PLACEHOLDER_ANSWER: &str = "Option A: Correct Answer";

const OPTION_LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

#[allow(clippy::expect_used)]
static BLOCK_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n").expect("valid block separator regex"));

#[allow(clippy::expect_used)]
static OPTION_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\(?([A-Da-d])\s*[).:]\s*(\S.*)$").expect("valid option line regex")
});

#[allow(clippy::expect_used)]
static ANSWER_LETTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?:correct\s+)?answer\s*[:\-]?\s*)?\(?([A-D])\)?\.?$")
        .expect("valid answer letter regex")
});

#[allow(clippy::expect_used)]
static ANSWER_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:correct\s+)?answer\s*[:\-]?\s*").expect("valid answer prefix regex")
});

#[allow(clippy::expect_used)]
static QUESTION_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:question\s*\d+\s*[:.)]|q?\d+\s*[:.)])\s*")
        .expect("valid question prefix regex")
});

/// One multiple-choice question with its correct answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizItem {
    /// Question text.
    pub question: String,
    /// Exactly four options in display order.
    pub options: Vec<String>,
    /// The correct option, equal to one of `options`.
    pub answer: String,
}

impl QuizItem {
    /// The placeholder question wrapping an unstructured reply.
    #[must_use]
    pub fn placeholder(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            options: PLACEHOLDER_OPTIONS.iter().map(|o| (*o).to_string()).collect(),
            answer: PLACEHOLDER_ANSWER.to_string(),
        }
    }
}

/// Result of parsing a quiz reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuiz {
    /// Parsed questions, never empty.
    pub items: Vec<QuizItem>,
    /// One message per skipped block.
    pub warnings: Vec<String>,
    /// Whether the placeholder question was used.
    pub fallback: bool,
}

impl ParsedQuiz {
    /// A quiz made of the single placeholder question.
    #[must_use]
    pub fn placeholder(reply: &str) -> Self {
        Self {
            items: vec![QuizItem::placeholder(reply.trim())],
            warnings: Vec::new(),
            fallback: true,
        }
    }
}

/// Parses a generated quiz reply.
///
/// Malformed blocks are skipped and reported in `warnings`. If no block
/// parses, the result is the placeholder quiz with the raw reply as its
/// question.
///
/// # Examples
///
/// ```
/// use study_core::parse_quiz;
///
/// let quiz = parse_quiz("What is 2 + 2?\nA) 3\nB) 4\nC) 5\nD) 22\nB");
/// assert_eq!(quiz.items.len(), 1);
/// assert_eq!(quiz.items[0].answer, "B) 4");
/// assert!(!quiz.fallback);
/// ```
#[must_use]
pub fn parse_quiz(reply: &str) -> ParsedQuiz {
    let normalized = reply.replace("\r\n", "\n");
    let mut items = Vec::new();
    let mut warnings = Vec::new();

    let blocks = BLOCK_SEPARATOR
        .split(&normalized)
        .map(str::trim)
        .filter(|block| !block.is_empty());

    for (index, block) in blocks.enumerate() {
        match parse_block(block) {
            Ok(item) => items.push(item),
            Err(e) => warnings.push(format!("block {}: {e}", index + 1)),
        }
    }

    if items.is_empty() {
        let mut quiz = ParsedQuiz::placeholder(reply);
        warnings.push(
            StudyError::malformed_output("no question block matched, using placeholder options")
                .to_string(),
        );
        quiz.warnings = warnings;
        return quiz;
    }

    ParsedQuiz {
        items,
        warnings,
        fallback: false,
    }
}

fn parse_block(block: &str) -> Result<QuizItem, StudyError> {
    let lines: Vec<&str> = block
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() != 6 {
        return Err(StudyError::malformed_output(format!(
            "expected 6 lines (question, 4 options, answer), found {}",
            lines.len()
        )));
    }

    let question = QUESTION_PREFIX.replace(lines[0], "").trim().to_string();
    if question.is_empty() || OPTION_LINE.is_match(lines[0]) {
        return Err(StudyError::malformed_output("missing question line"));
    }

    let mut options = Vec::with_capacity(OPTION_LETTERS.len());
    for (line, expected) in lines[1..5].iter().zip(OPTION_LETTERS) {
        let captures = OPTION_LINE
            .captures(line)
            .ok_or_else(|| StudyError::malformed_output(format!("'{line}' is not an option")))?;
        let letter = captures[1].to_ascii_uppercase();
        if !letter.starts_with(expected) {
            return Err(StudyError::malformed_output(format!(
                "expected option {expected}, found {letter}"
            )));
        }
        options.push(format!("{expected}) {}", captures[2].trim()));
    }

    let answer = resolve_answer(lines[5], &options).ok_or_else(|| {
        StudyError::malformed_output(format!("'{}' does not name an option", lines[5]))
    })?;

    Ok(QuizItem {
        question,
        options,
        answer,
    })
}

/// Maps an answer line to the full text of the option it names.
fn resolve_answer(line: &str, options: &[String]) -> Option<String> {
    if let Some(captures) = ANSWER_LETTER.captures(line) {
        let letter = captures[1].to_ascii_uppercase();
        return OPTION_LETTERS
            .iter()
            .position(|l| letter.starts_with(*l))
            .and_then(|i| options.get(i).cloned());
    }

    let text = ANSWER_PREFIX.replace(line, "");
    let text = text.trim();
    options
        .iter()
        .find(|option| {
            option.eq_ignore_ascii_case(text)
                || option
                    .get(3..)
                    .is_some_and(|body| body.eq_ignore_ascii_case(text))
        })
        .cloned()
}

/// Outcome of checking a selection against the correct answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// The selection matches the answer.
    Correct,
    /// The selection is wrong.
    Incorrect {
        /// The correct option text.
        #[serde(rename = "correctAnswer")]
        correct_answer: String,
    },
}

impl Verdict {
    /// Compares a selection with the correct answer.
    #[must_use]
    pub fn judge(selected: &str, answer: &str) -> Self {
        if selected == answer {
            Self::Correct
        } else {
            Self::Incorrect {
                correct_answer: answer.to_string(),
            }
        }
    }

    /// Returns `true` for [`Verdict::Correct`].
    #[must_use]
    pub const fn is_correct(&self) -> bool {
        matches!(self, Self::Correct)
    }
}
