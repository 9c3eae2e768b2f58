//! Study tasks and their prompt templates.
//!
//! Every task maps user text to a fixed instruction string and a fixed set
//! of generation options. Blank input is rejected here so that no caller can
//! reach the gateway without text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudyError};
use crate::gateway::GenerationOptions;

/// Instruction block for quiz generation; the user text follows `Context:`.
///
/// Sent to the model verbatim, misspelling included.
const QUIZ_INSTRUCTIONS: &str = "Generate three multiple-choice questions based on the provided text. \
Make sure that the output follows the following format:\n\
The first line is the question, the following four lines are the choices. \
Followed by a single line for the answer and an empty line seperating the questions.\n\n\
For Example:\n\
What is the capital of France?\n\
A) Paris\n\
B) London\n\
C) Berlin\n\
D) Madrid\n\
A\n\n\
Context:\n";

/// Number of independent generations for the question task.
const GENERATED_QUESTION_COUNT: usize = 3;

/// A study action the user can pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Concise summary of the text.
    Summarize,
    /// Simple explanation of a concept.
    Explain,
    /// Free-form study questions.
    GenerateQuestions,
    /// Multiple-choice quiz with answer checking.
    Quiz,
}

impl Task {
    /// All tasks in selector order.
    pub const ALL: [Self; 4] = [
        Self::Summarize,
        Self::Explain,
        Self::GenerateQuestions,
        Self::Quiz,
    ];

    /// Wire name used by the API and the CLI.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::Explain => "explain",
            Self::GenerateQuestions => "generate_questions",
            Self::Quiz => "quiz",
        }
    }

    /// Label shown in the task selector.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Summarize => "Summarize Text",
            Self::Explain => "Explain Concept",
            Self::GenerateQuestions => "Generate Questions",
            Self::Quiz => "Interactive Quiz",
        }
    }

    /// Heading shown above the task's output.
    #[must_use]
    pub const fn heading(self) -> &'static str {
        match self {
            Self::Summarize => "Summary:",
            Self::Explain => "Explanation:",
            Self::GenerateQuestions => "Generated Questions:",
            Self::Quiz => "Interactive Quiz:",
        }
    }

    /// Generation options sent with every call for this task.
    #[must_use]
    pub const fn options(self) -> GenerationOptions {
        match self {
            Self::Summarize | Self::Explain => GenerationOptions::new(150).with_min_length(30),
            Self::GenerateQuestions => GenerationOptions::new(150).with_sampling(),
            Self::Quiz => GenerationOptions::new(1000).with_sampling(),
        }
    }

    /// Number of gateway calls one run of this task issues.
    #[must_use]
    pub const fn calls(self) -> usize {
        match self {
            Self::GenerateQuestions => GENERATED_QUESTION_COUNT,
            Self::Summarize | Self::Explain | Self::Quiz => 1,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for Task {
    type Err = String;

    /// Accepts wire names and selector labels, case-insensitively.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|task| {
                task.wire_name() == needle
                    || task.label().to_lowercase() == needle
                    || task.wire_name().replace('_', "-") == needle
            })
            .ok_or_else(|| {
                format!(
                    "invalid task '{s}': expected one of 'summarize', 'explain', 'generate_questions', 'quiz'"
                )
            })
    }
}

impl<'de> Deserialize<'de> for Task {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for Task {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.wire_name())
    }
}

/// A fully templated instruction for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    task: Task,
    text: String,
}

impl Prompt {
    /// The task this prompt was built for.
    #[must_use]
    pub const fn task(&self) -> Task {
        self.task
    }

    /// The instruction string sent to the gateway.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Generation options for this prompt's task.
    #[must_use]
    pub const fn options(&self) -> GenerationOptions {
        self.task.options()
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Builds the prompt for `task` around the user's text.
///
/// The text is embedded verbatim.
///
/// # Errors
///
/// Returns `StudyError::EmptyInput` if `raw_text` is empty or only whitespace.
///
/// # Examples
///
/// ```
/// use study_core::{build_prompt, Task};
///
/// let prompt = build_prompt("Photosynthesis converts light to energy.", Task::Summarize).unwrap();
/// assert_eq!(
///     prompt.as_str(),
///     "Summarize the following text concisely and avoid repetition: Photosynthesis converts light to energy."
/// );
///
/// assert!(build_prompt("   ", Task::Explain).is_err());
/// ```
pub fn build_prompt(raw_text: &str, task: Task) -> Result<Prompt> {
    if raw_text.trim().is_empty() {
        return Err(StudyError::EmptyInput);
    }

    let text = match task {
        Task::Summarize => {
            format!("Summarize the following text concisely and avoid repetition: {raw_text}")
        }
        Task::Explain => format!("Explain the following concept in simple terms: {raw_text}"),
        Task::GenerateQuestions => {
            format!("Generate 3 questions based on the following text: {raw_text}")
        }
        Task::Quiz => format!("{QUIZ_INSTRUCTIONS}{raw_text}."),
    };

    Ok(Prompt { task, text })
}
