//! Study Buddy Output Rendering
//!
//! This crate turns study results into something a person can read. Results
//! are first described as a [`Document`], an ordered list of [`OutputBlock`]s,
//! and then rendered by one of the generators:
//!
//! - [`HtmlGenerator`] - HTML fragments for the browser page
//! - [`MarkdownGenerator`] - Markdown for terminal output
//! - [`PageGenerator`] - The full single-page application shell
//!
//! The block types are a local vocabulary so that this crate does not depend
//! on the session and gateway types of `study-core`.
//!
//! # Example
//!
//! ```rust
//! use study_render::{Document, HtmlGenerator, MarkdownGenerator};
//!
//! let document = Document::new()
//!     .heading("Summary:")
//!     .paragraph("Plants turn light into chemical energy.");
//!
//! let html = HtmlGenerator::new(&document).generate();
//! assert!(html.contains("<h3 style='color: green;'>Summary:</h3>"));
//!
//! let markdown = MarkdownGenerator::new(&document).generate();
//! assert!(markdown.starts_with("### Summary:"));
//! ```

mod html;
mod markdown;
mod page;

pub use html::{escape_html, HtmlGenerator};
pub use markdown::MarkdownGenerator;
pub use page::{PageGenerator, PageInput, TaskChoice};

use serde::{Deserialize, Serialize};

// ============================================================================
// Output Blocks
// ============================================================================

/// A single styled piece of output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputBlock {
    /// Section heading, e.g. `Summary:`.
    Heading {
        /// Heading text.
        text: String,
    },
    /// Plain body text.
    Paragraph {
        /// Body text.
        text: String,
    },
    /// Bordered block with a bold label, used for generated questions.
    Bordered {
        /// Label shown before the text, without the trailing colon.
        label: String,
        /// Block text.
        text: String,
    },
    /// A multiple-choice question with its single-choice selector.
    QuizQuestion {
        /// 1-indexed display number.
        number: usize,
        /// Stable key binding the question to its selection state.
        key: String,
        /// Question text.
        question: String,
        /// Options in display order.
        options: Vec<String>,
        /// Currently selected option, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selected: Option<String>,
    },
    /// Positive feedback.
    Success {
        /// Message text.
        text: String,
    },
    /// Negative feedback.
    Failure {
        /// Message text.
        text: String,
    },
    /// Non-fatal warning.
    Warning {
        /// Message text.
        text: String,
    },
}

// ============================================================================
// Document
// ============================================================================

/// An ordered sequence of output blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Blocks in display order.
    pub blocks: Vec<OutputBlock>,
}

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub const fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Appends a block.
    #[must_use]
    pub fn block(mut self, block: OutputBlock) -> Self {
        self.blocks.push(block);
        self
    }

    /// Appends a heading block.
    #[must_use]
    pub fn heading(self, text: impl Into<String>) -> Self {
        self.block(OutputBlock::Heading { text: text.into() })
    }

    /// Appends a paragraph block.
    #[must_use]
    pub fn paragraph(self, text: impl Into<String>) -> Self {
        self.block(OutputBlock::Paragraph { text: text.into() })
    }

    /// Appends a bordered block.
    #[must_use]
    pub fn bordered(self, label: impl Into<String>, text: impl Into<String>) -> Self {
        self.block(OutputBlock::Bordered {
            label: label.into(),
            text: text.into(),
        })
    }

    /// Appends a success block.
    #[must_use]
    pub fn success(self, text: impl Into<String>) -> Self {
        self.block(OutputBlock::Success { text: text.into() })
    }

    /// Appends a failure block.
    #[must_use]
    pub fn failure(self, text: impl Into<String>) -> Self {
        self.block(OutputBlock::Failure { text: text.into() })
    }

    /// Appends a warning block.
    #[must_use]
    pub fn warning(self, text: impl Into<String>) -> Self {
        self.block(OutputBlock::Warning { text: text.into() })
    }

    /// Returns `true` if the document has no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns `true` if any block is a warning.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.blocks
            .iter()
            .any(|b| matches!(b, OutputBlock::Warning { .. }))
    }
}
