//! The single-page study application shell.
//!
//! The page is static: a header with the logo, the input form, an output area
//! and the sidebar. A small script talks to the JSON API and drops the
//! rendered HTML fragments into the output area.

use std::fmt::Write;

use crate::escape_html;

/// Client-side wiring between the form, the output area and the JSON API.
const PAGE_SCRIPT: &str = r"
const input = document.getElementById('study-input');
const task = document.getElementById('study-task');
const output = document.getElementById('study-output');
let sessionId = null;
// Latest selection write per question key; resolves to whether it was stored.
const pending = {};

function showError(message) {
  const div = document.createElement('div');
  div.className = 'warning';
  div.textContent = '⚠️ ' + message;
  output.replaceChildren(div);
}

function showVerdictError(key, message) {
  const div = document.createElement('div');
  div.className = 'error';
  div.textContent = message;
  document.getElementById(`verdict-${key}`).replaceChildren(div);
}

async function ensureSession() {
  if (sessionId === null) {
    const response = await fetch('/api/sessions', { method: 'POST' });
    sessionId = (await response.json()).sessionId;
  }
  return sessionId;
}

async function runTask() {
  const id = await ensureSession();
  const response = await fetch(`/api/sessions/${id}/run?format=html`, {
    method: 'POST',
    headers: { 'content-type': 'application/json' },
    body: JSON.stringify({ text: input.value, task: task.value }),
  });
  return { response, data: await response.json() };
}

document.getElementById('study-run').addEventListener('click', async () => {
  let { response, data } = await runTask();
  if (data.kind === 'session_not_found') {
    sessionId = null;
    ({ response, data } = await runTask());
  }
  if (response.ok) {
    for (const key of Object.keys(pending)) {
      delete pending[key];
    }
    output.innerHTML = data.html;
  } else {
    showError(data.error);
  }
});

async function saveSelection(key, option) {
  try {
    const id = await ensureSession();
    const response = await fetch(`/api/sessions/${id}/quiz/${key}`, {
      method: 'PUT',
      headers: { 'content-type': 'application/json' },
      body: JSON.stringify({ option }),
    });
    if (response.ok) {
      document.getElementById(`verdict-${key}`).replaceChildren();
      return true;
    }
    showVerdictError(key, (await response.json()).error);
  } catch (error) {
    showVerdictError(key, `Could not save your answer: ${error}`);
  }
  return false;
}

output.addEventListener('change', (event) => {
  if (event.target.type !== 'radio') {
    return;
  }
  const key = event.target.name;
  const previous = pending[key] ?? Promise.resolve(true);
  pending[key] = previous.then(() => saveSelection(key, event.target.value));
});

output.addEventListener('click', async (event) => {
  if (!event.target.classList.contains('check')) {
    return;
  }
  const key = event.target.dataset.key;
  if (!(await (pending[key] ?? Promise.resolve(true)))) {
    return;
  }
  const id = await ensureSession();
  const response = await fetch(`/api/sessions/${id}/quiz/${key}/check?format=html`, {
    method: 'POST',
  });
  const data = await response.json();
  if (response.ok) {
    document.getElementById(`verdict-${key}`).innerHTML = data.html;
  } else {
    showVerdictError(key, data.error);
  }
});

window.addEventListener('pagehide', () => {
  if (sessionId !== null) {
    fetch(`/api/sessions/${sessionId}`, { method: 'DELETE', keepalive: true });
    sessionId = null;
  }
});
";

const PAGE_STYLE: &str = r"
body { font-family: sans-serif; margin: 0; display: flex; }
aside { width: 260px; padding: 20px; background: #f0f2f6; min-height: 100vh; }
main { flex: 1; padding: 20px 40px; }
header { display: flex; align-items: center; gap: 20px; }
textarea { width: 100%; height: 200px; }
.success { background: #e6f4ea; padding: 10px; border-radius: 5px; }
.error { background: #fdecea; padding: 10px; border-radius: 5px; }
.warning { background: #fff8e1; padding: 10px; border-radius: 5px; }
";

/// One entry of the task selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskChoice {
    /// Wire value sent to the API.
    pub value: String,
    /// Label shown to the user.
    pub label: String,
}

impl TaskChoice {
    /// Creates a new task choice.
    #[must_use]
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Everything the page shell needs to know.
#[derive(Debug, Clone)]
pub struct PageInput {
    /// Page title, also the main heading.
    pub title: String,
    /// Subheading under the title.
    pub subtitle: String,
    /// URL of the logo image.
    pub logo_src: String,
    /// Label above the text area.
    pub input_label: String,
    /// Placeholder inside the text area.
    pub placeholder: String,
    /// Label above the task selector.
    pub task_label: String,
    /// Primary button caption.
    pub button_label: String,
    /// Selector entries in display order.
    pub tasks: Vec<TaskChoice>,
    /// Sidebar heading.
    pub about_title: String,
    /// Sidebar body.
    pub about_text: String,
}

impl PageInput {
    /// Creates the page input with the standard copy text.
    #[must_use]
    pub fn new(logo_src: impl Into<String>, tasks: Vec<TaskChoice>) -> Self {
        Self {
            title: "Smart Study Buddy".to_string(),
            subtitle: "Your AI-Powered Learning Assistant".to_string(),
            logo_src: logo_src.into(),
            input_label: "\u{1f4a1} Enter a topic, concept, or text to learn about:".to_string(),
            placeholder: "Type something here...".to_string(),
            task_label: "\u{1f6e0}\u{fe0f} What do you want to do?".to_string(),
            button_label: "\u{1f680} Get Results".to_string(),
            tasks,
            about_title: "About Smart Study Buddy".to_string(),
            about_text: "This app helps you learn concepts, summarize texts, generate questions, and explore examples using AI.".to_string(),
        }
    }
}

/// Renders the full HTML page.
pub struct PageGenerator<'a> {
    input: &'a PageInput,
}

impl<'a> PageGenerator<'a> {
    /// Creates a new page generator.
    #[must_use]
    pub const fn new(input: &'a PageInput) -> Self {
        Self { input }
    }

    /// Generates the complete HTML document.
    #[must_use]
    pub fn generate(&self) -> String {
        let input = self.input;
        let mut output = String::new();

        let _ = writeln!(output, "<!DOCTYPE html>");
        let _ = writeln!(output, "<html lang='en'>");
        let _ = writeln!(output, "<head>");
        let _ = writeln!(output, "<meta charset='utf-8'>");
        let _ = writeln!(output, "<title>{}</title>", escape_html(&input.title));
        let _ = writeln!(output, "<style>{PAGE_STYLE}</style>");
        let _ = writeln!(output, "</head>");
        let _ = writeln!(output, "<body>");

        self.write_sidebar(&mut output);

        let _ = writeln!(output, "<main>");
        self.write_header(&mut output);
        self.write_form(&mut output);
        let _ = writeln!(output, "<section id='study-output'></section>");
        let _ = writeln!(output, "</main>");

        let _ = writeln!(output, "<script>{PAGE_SCRIPT}</script>");
        let _ = writeln!(output, "</body>");
        let _ = writeln!(output, "</html>");

        output
    }

    fn write_sidebar(&self, output: &mut String) {
        let _ = writeln!(output, "<aside>");
        let _ = writeln!(output, "<h2>{}</h2>", escape_html(&self.input.about_title));
        let _ = writeln!(output, "<p>{}</p>", escape_html(&self.input.about_text));
        let _ = writeln!(output, "</aside>");
    }

    fn write_header(&self, output: &mut String) {
        let input = self.input;
        let _ = writeln!(output, "<header>");
        let _ = writeln!(
            output,
            "<img src='{}' width='80' alt='logo'>",
            escape_html(&input.logo_src)
        );
        let _ = writeln!(output, "<div>");
        let _ = writeln!(
            output,
            "<h1 style='color: blue;'>{}</h1>",
            escape_html(&input.title)
        );
        let _ = writeln!(
            output,
            "<h3 style='color: gray;'>{}</h3>",
            escape_html(&input.subtitle)
        );
        let _ = writeln!(output, "</div>");
        let _ = writeln!(output, "</header>");
    }

    fn write_form(&self, output: &mut String) {
        let input = self.input;
        let _ = writeln!(
            output,
            "<label for='study-input'>{}</label>",
            escape_html(&input.input_label)
        );
        let _ = writeln!(
            output,
            "<textarea id='study-input' placeholder='{}'></textarea>",
            escape_html(&input.placeholder)
        );
        let _ = writeln!(
            output,
            "<label for='study-task'>{}</label>",
            escape_html(&input.task_label)
        );
        let _ = writeln!(output, "<select id='study-task'>");
        for choice in &input.tasks {
            let _ = writeln!(
                output,
                "<option value='{}'>{}</option>",
                escape_html(&choice.value),
                escape_html(&choice.label)
            );
        }
        let _ = writeln!(output, "</select>");
        let _ = writeln!(
            output,
            "<button type='button' id='study-run'>{}</button>",
            escape_html(&input.button_label)
        );
    }
}
