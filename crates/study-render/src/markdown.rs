//! Markdown rendering for terminal output.
//!
//! # Example
//!
//! ```rust
//! use study_render::{Document, MarkdownGenerator};
//!
//! let document = Document::new()
//!     .heading("Generated Questions:")
//!     .bordered("Question 1", "What does chlorophyll absorb?");
//!
//! let markdown = MarkdownGenerator::new(&document).generate();
//! assert!(markdown.contains("> **Question 1:** What does chlorophyll absorb?"));
//! ```

use std::fmt::Write;

use crate::{Document, OutputBlock};

/// Renders a [`Document`] as Markdown.
pub struct MarkdownGenerator<'a> {
    document: &'a Document,
}

impl<'a> MarkdownGenerator<'a> {
    /// Creates a new Markdown generator for the given document.
    #[must_use]
    pub const fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Generates the Markdown text. Blocks are separated by blank lines.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();

        for (i, block) in self.document.blocks.iter().enumerate() {
            if i > 0 {
                output.push('\n');
            }
            write_block(&mut output, block);
        }

        output
    }
}

fn write_block(output: &mut String, block: &OutputBlock) {
    match block {
        OutputBlock::Heading { text } => {
            let _ = writeln!(output, "### {}", escape_markdown(text));
        }
        OutputBlock::Paragraph { text } => {
            let _ = writeln!(output, "{}", escape_markdown(text));
        }
        OutputBlock::Bordered { label, text } => {
            let _ = writeln!(
                output,
                "> **{}:** {}",
                escape_markdown(label),
                quote_continuation(&escape_markdown(text))
            );
        }
        OutputBlock::QuizQuestion {
            number,
            question,
            options,
            selected,
            ..
        } => {
            let _ = writeln!(output, "{number}. {}", escape_markdown(question));
            for option in options {
                let mark = if selected.as_deref() == Some(option.as_str()) {
                    "x"
                } else {
                    " "
                };
                let _ = writeln!(output, "   - [{mark}] {}", escape_markdown(option));
            }
        }
        OutputBlock::Success { text } => {
            let _ = writeln!(output, "\u{2705} {}", escape_markdown(text));
        }
        OutputBlock::Failure { text } => {
            let _ = writeln!(output, "\u{274c} {}", escape_markdown(text));
        }
        OutputBlock::Warning { text } => {
            let _ = writeln!(output, "\u{26a0}\u{fe0f} {}", escape_markdown(text));
        }
    }
}

/// Keeps multi-line text inside a block quote.
fn quote_continuation(text: &str) -> String {
    text.replace('\n', "\n> ")
}

/// Escapes characters that would otherwise start emphasis or code spans.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for ch in text.chars() {
        if matches!(ch, '*' | '_' | '`' | '\\') {
            result.push('\\');
        }
        result.push(ch);
    }

    result
}
