//! HTML fragment rendering.
//!
//! Produces the inline-styled markup the study page injects into its output
//! area. All user and model text is escaped.

use std::fmt::Write;

use crate::{Document, OutputBlock};

/// Inline style for bordered blocks.
const BORDERED_STYLE: &str = "border:1px solid #ddd; padding:10px; margin:10px; border-radius:5px;";

/// Renders a [`Document`] as an HTML fragment.
pub struct HtmlGenerator<'a> {
    document: &'a Document,
}

impl<'a> HtmlGenerator<'a> {
    /// Creates a new HTML generator for the given document.
    #[must_use]
    pub const fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Generates the HTML fragment, one element per block.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();
        for block in &self.document.blocks {
            write_block(&mut output, block);
        }
        output
    }
}

fn write_block(output: &mut String, block: &OutputBlock) {
    match block {
        OutputBlock::Heading { text } => {
            let _ = writeln!(
                output,
                "<h3 style='color: green;'>{}</h3>",
                escape_html(text)
            );
        }
        OutputBlock::Paragraph { text } => {
            let _ = writeln!(output, "<p>{}</p>", escape_html(text));
        }
        OutputBlock::Bordered { label, text } => {
            let _ = writeln!(
                output,
                "<div style='{BORDERED_STYLE}'><strong>{}:</strong> {}</div>",
                escape_html(label),
                escape_html(text)
            );
        }
        OutputBlock::QuizQuestion {
            number,
            key,
            question,
            options,
            selected,
        } => write_quiz_question(output, *number, key, question, options, selected.as_deref()),
        OutputBlock::Success { text } => {
            let _ = writeln!(
                output,
                "<div class='success'>&#9989; {}</div>",
                escape_html(text)
            );
        }
        OutputBlock::Failure { text } => {
            let _ = writeln!(
                output,
                "<div class='error'>&#10060; {}</div>",
                escape_html(text)
            );
        }
        OutputBlock::Warning { text } => {
            let _ = writeln!(
                output,
                "<div class='warning'>&#9888;&#65039; {}</div>",
                escape_html(text)
            );
        }
    }
}

fn write_quiz_question(
    output: &mut String,
    number: usize,
    key: &str,
    question: &str,
    options: &[String],
    selected: Option<&str>,
) {
    let key = escape_html(key);
    let _ = writeln!(output, "<div class='quiz-question' data-key='{key}'>");
    let _ = writeln!(output, "<p>{number}. {}</p>", escape_html(question));
    let _ = writeln!(
        output,
        "<fieldset><legend>Select your answer for Question {number}:</legend>"
    );
    for option in options {
        let checked = if selected == Some(option.as_str()) {
            " checked"
        } else {
            ""
        };
        let option = escape_html(option);
        let _ = writeln!(
            output,
            "<label><input type='radio' name='{key}' value='{option}'{checked}> {option}</label><br>"
        );
    }
    let _ = writeln!(output, "</fieldset>");
    let _ = writeln!(
        output,
        "<button type='button' class='check' data-key='{key}'>Check Answer for Question {number}</button>"
    );
    let _ = writeln!(output, "<div class='verdict' id='verdict-{key}'></div>");
    let _ = writeln!(output, "</div>");
}

/// Escapes the five HTML-significant characters.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(ch),
        }
    }
    result
}
