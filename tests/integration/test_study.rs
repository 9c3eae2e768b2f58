//! End-to-end tests of the study server.
//!
//! A real server is started on a free local port with a scripted gateway
//! standing in for the model, and driven over HTTP with `reqwest`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use study_core::{
    create_router, AppState, Config, Generation, GenerationOptions, InferenceGateway, QuizParsing,
    Result,
};
use tokio::sync::Mutex;

/// Path to a fixture file.
fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}

/// Answers quiz prompts with the fixture reply and echoes everything else.
struct ScriptedGateway {
    quiz_reply: String,
    calls: Mutex<Vec<(String, GenerationOptions)>>,
}

impl ScriptedGateway {
    fn new() -> Arc<Self> {
        let quiz_reply =
            std::fs::read_to_string(fixture("quiz_reply.txt")).expect("Failed to read quiz fixture");
        Arc::new(Self {
            quiz_reply,
            calls: Mutex::new(Vec::new()),
        })
    }

    async fn calls(&self) -> Vec<(String, GenerationOptions)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl InferenceGateway for ScriptedGateway {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Vec<Generation>> {
        self.calls
            .lock()
            .await
            .push((prompt.to_string(), *options));

        let text = if prompt.starts_with("Generate three multiple-choice questions") {
            self.quiz_reply.clone()
        } else {
            format!("generated for: {prompt}")
        };
        Ok(vec![Generation::new(text)])
    }
}

/// A running server and its HTTP client.
struct TestServer {
    base: String,
    client: Client,
    gateway: Arc<ScriptedGateway>,
}

impl TestServer {
    async fn start(parsing: QuizParsing) -> Self {
        let gateway = ScriptedGateway::new();
        let mut config = Config::default();
        config.quiz.parsing = parsing;

        let router = create_router(AppState::new(config, Arc::clone(&gateway) as _));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("Server failed");
        });

        Self {
            base: format!("http://{addr}"),
            client: Client::new(),
            gateway,
        }
    }

    async fn create_session(&self) -> String {
        let response = self
            .client
            .post(format!("{}/api/sessions", self.base))
            .send()
            .await
            .expect("Request failed");
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.expect("Invalid JSON");
        body["sessionId"].as_str().expect("Missing sessionId").to_string()
    }

    async fn run(&self, session: &str, text: &str, task: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .post(format!("{}/api/sessions/{session}/run?format=html", self.base))
            .json(&json!({ "text": text, "task": task }))
            .send()
            .await
            .expect("Request failed");
        (response.status(), response.json().await.expect("Invalid JSON"))
    }

    async fn select(&self, session: &str, key: &str, option: &str) -> StatusCode {
        self.client
            .put(format!("{}/api/sessions/{session}/quiz/{key}", self.base))
            .json(&json!({ "option": option }))
            .send()
            .await
            .expect("Request failed")
            .status()
    }

    async fn check(&self, session: &str, key: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .post(format!(
                "{}/api/sessions/{session}/quiz/{key}/check?format=html",
                self.base
            ))
            .send()
            .await
            .expect("Request failed");
        (response.status(), response.json().await.expect("Invalid JSON"))
    }

    async fn view(&self, session: &str) -> Value {
        self.client
            .get(format!("{}/api/sessions/{session}", self.base))
            .send()
            .await
            .expect("Request failed")
            .json()
            .await
            .expect("Invalid JSON")
    }
}

#[tokio::test]
async fn test_summarize_scenario() {
    let server = TestServer::start(QuizParsing::Structured).await;
    let session = server.create_session().await;

    let (status, body) = server
        .run(&session, "Photosynthesis converts light to energy.", "summarize")
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["heading"], "Summary:");

    let calls = server.gateway.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].0,
        "Summarize the following text concisely and avoid repetition: Photosynthesis converts light to energy."
    );
    assert_eq!(calls[0].1, GenerationOptions::new(150).with_min_length(30));
}

#[tokio::test]
async fn test_generate_questions_scenario() {
    let server = TestServer::start(QuizParsing::Structured).await;
    let session = server.create_session().await;

    let (status, body) = server.run(&session, "mitosis", "generate_questions").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(server.gateway.calls().await.len(), 3);
    let html = body["html"].as_str().expect("Missing html");
    assert_eq!(html.matches("border:1px solid #ddd").count(), 3);
    for n in 1..=3 {
        assert!(html.contains(&format!("<strong>Question {n}:</strong>")));
    }
}

#[tokio::test]
async fn test_empty_input_is_warned_and_skips_gateway() {
    let server = TestServer::start(QuizParsing::Structured).await;
    let session = server.create_session().await;

    for task in ["summarize", "explain", "generate_questions", "quiz"] {
        let (status, body) = server.run(&session, "", task).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "Please enter a topic or text first!");
    }

    assert!(server.gateway.calls().await.is_empty());
}

#[tokio::test]
async fn test_structured_quiz_flow() {
    let server = TestServer::start(QuizParsing::Structured).await;
    let session = server.create_session().await;

    let (status, body) = server.run(&session, "Photosynthesis", "quiz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["generated"], true);

    // Three of the four fixture blocks are well formed.
    let questions = body["questions"].as_array().expect("Missing questions");
    assert_eq!(questions.len(), 3);
    assert_eq!(questions[1]["text"], "Where does photosynthesis take place?");
    assert_eq!(body["warnings"].as_array().map(Vec::len), Some(1));
    assert!(body["html"]
        .as_str()
        .expect("Missing html")
        .contains("Select your answer for Question 3:"));

    assert_eq!(server.select(&session, "quiz_1", "A) Mitochondria").await, StatusCode::OK);
    let (status, verdict) = server.check(&session, "quiz_1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verdict["verdict"], "incorrect");
    assert_eq!(verdict["correctAnswer"], "B) Chloroplasts");

    assert_eq!(server.select(&session, "quiz_1", "B) Chloroplasts").await, StatusCode::OK);
    let (_, verdict) = server.check(&session, "quiz_1").await;
    assert_eq!(verdict["verdict"], "correct");
    assert!(verdict["html"].as_str().expect("Missing html").contains("Correct!"));

    // Re-entering the quiz reuses the stored questions.
    let (_, again) = server.run(&session, "Something else", "quiz").await;
    assert_eq!(again["generated"], false);
    assert_eq!(again["questions"].as_array().map(Vec::len), Some(3));
    assert_eq!(again["questions"][0]["text"], questions[0]["text"]);
    assert_eq!(again["questions"][1]["selected"], "B) Chloroplasts");
    assert_eq!(server.gateway.calls().await.len(), 1);
}

#[tokio::test]
async fn test_placeholder_quiz_scenario() {
    let server = TestServer::start(QuizParsing::Placeholder).await;
    let session = server.create_session().await;

    let (status, body) = server.run(&session, "Cells divide.", "quiz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(server.gateway.calls().await.len(), 1);

    let questions = body["questions"].as_array().expect("Missing questions");
    assert_eq!(questions.len(), 1);
    assert_eq!(
        questions[0]["options"],
        json!([
            "Option A: Correct Answer",
            "Option B: Incorrect Option 1",
            "Option C: Incorrect Option 2",
            "Option D: Incorrect Option 3"
        ])
    );

    let before = server.view(&session).await;
    assert_eq!(
        server
            .select(&session, "quiz_0", "Option B: Incorrect Option 1")
            .await,
        StatusCode::OK
    );
    let (_, verdict) = server.check(&session, "quiz_0").await;
    assert_eq!(verdict["verdict"], "incorrect");
    assert_eq!(verdict["correctAnswer"], "Option A: Correct Answer");
    assert!(verdict["html"]
        .as_str()
        .expect("Missing html")
        .contains("Incorrect! The correct answer is: Option A: Correct Answer"));

    let after = server.view(&session).await;
    assert_eq!(before["quiz"][0]["options"], after["quiz"][0]["options"]);
    assert_eq!(before["quiz"][0]["text"], after["quiz"][0]["text"]);
}

#[tokio::test]
async fn test_concurrent_sessions_are_isolated() {
    let server = TestServer::start(QuizParsing::Placeholder).await;
    let sessions = join_all((0..8).map(|_| server.create_session())).await;

    let runs = join_all(
        sessions
            .iter()
            .map(|session| server.run(session, "Concurrent topic", "quiz")),
    )
    .await;
    for (status, body) in &runs {
        assert_eq!(*status, StatusCode::OK);
        assert_eq!(body["generated"], true);
    }
    assert_eq!(server.gateway.calls().await.len(), sessions.len());

    assert_eq!(
        server
            .select(&sessions[0], "quiz_0", "Option A: Correct Answer")
            .await,
        StatusCode::OK
    );
    let first = server.view(&sessions[0]).await;
    let second = server.view(&sessions[1]).await;
    assert_eq!(first["quiz"][0]["selected"], "Option A: Correct Answer");
    assert!(second["quiz"][0].get("selected").is_none());
}

#[tokio::test]
async fn test_page_and_health() {
    let server = TestServer::start(QuizParsing::Structured).await;

    let page = server
        .client
        .get(format!("{}/", server.base))
        .send()
        .await
        .expect("Request failed")
        .text()
        .await
        .expect("Invalid body");
    assert!(page.contains("<h1 style='color: blue;'>Smart Study Buddy</h1>"));
    assert!(page.contains("About Smart Study Buddy"));

    let health: Value = server
        .client
        .get(format!("{}/api/health", server.base))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(health["status"], "ok");
}

#[tokio::test]
async fn test_idle_sessions_are_swept() {
    let state = AppState::new(Config::default(), ScriptedGateway::new());
    let sweep = state
        .sessions
        .spawn_idle_sweep(Duration::from_millis(100), Duration::from_millis(20));
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let base = format!("http://{}", listener.local_addr().expect("Failed to get local addr"));
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    let client = Client::new();
    let body: Value = client
        .post(format!("{base}/api/sessions"))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    let session = body["sessionId"].as_str().expect("Missing sessionId");

    tokio::time::sleep(Duration::from_millis(400)).await;

    let response = client
        .get(format!("{base}/api/sessions/{session}"))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let health: Value = client
        .get(format!("{base}/api/health"))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(health["sessions"], 0);

    sweep.abort();
}

#[test]
fn test_fixture_config_loads() {
    let config = Config::load_from_file(&fixture("study.json")).expect("Failed to load config");

    assert_eq!(config.quiz.parsing, QuizParsing::Placeholder);
    assert_eq!(config.gateway.timeout_seconds, 5);
    assert_eq!(config.cache.capacity, 16);
    assert_eq!(config.server.port, 0);
    assert_eq!(config.session.idle_seconds, 600);
}
