//! Integration tests for the HTTP gateway behind the memo cache.
//!
//! A fake inference endpoint plays the model; the study server talks to it
//! through `HttpGateway` wrapped in `CachedGateway`, exactly as the binary
//! wires it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use reqwest::Client;
use serde_json::{json, Value};
use study_core::{
    create_router, AppState, CachedGateway, Config, HttpGateway, InferenceGateway, StudyError,
};

/// Counts requests to the fake model and answers with the prompt length.
async fn fake_model(
    State(hits): State<Arc<AtomicUsize>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    hits.fetch_add(1, Ordering::SeqCst);
    let inputs = body["inputs"].as_str().unwrap_or_default();
    if inputs.contains("overloaded") {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "Model google/flan-t5-large is currently loading" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!([{ "generated_text": format!("{} characters of input", inputs.len()) }])),
    )
}

/// Starts the fake endpoint and returns its base URL with the hit counter.
async fn spawn_fake_model() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route("/models/google/flan-t5-large", post(fake_model))
        .with_state(Arc::clone(&hits));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Fake model failed");
    });
    (format!("http://{addr}/models"), hits)
}

/// Starts the study server against `endpoint` and returns its base URL.
async fn spawn_study_server(endpoint: &str) -> String {
    let mut config = Config::default();
    config.gateway.endpoint = endpoint.to_string();
    config.gateway.timeout_seconds = 5;

    let http = HttpGateway::from_config(&config.gateway).expect("Failed to build gateway");
    let gateway: Arc<dyn InferenceGateway> =
        Arc::new(CachedGateway::new(http, config.cache.capacity));
    let router = create_router(AppState::new(config, gateway));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });
    format!("http://{addr}")
}

async fn new_session(client: &Client, base: &str) -> String {
    let body: Value = client
        .post(format!("{base}/api/sessions"))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    body["sessionId"].as_str().expect("Missing sessionId").to_string()
}

async fn run(client: &Client, base: &str, session: &str, text: &str, task: &str) -> (u16, Value) {
    let response = client
        .post(format!("{base}/api/sessions/{session}/run"))
        .json(&json!({ "text": text, "task": task }))
        .send()
        .await
        .expect("Request failed");
    let status = response.status().as_u16();
    (status, response.json().await.expect("Invalid JSON"))
}

#[tokio::test]
async fn test_identical_requests_reach_model_once() {
    let (endpoint, hits) = spawn_fake_model().await;
    let base = spawn_study_server(&endpoint).await;
    let client = Client::new();

    // The cache is process-wide, so a second session benefits too.
    let first = new_session(&client, &base).await;
    let second = new_session(&client, &base).await;

    let (status, a) = run(&client, &base, &first, "entropy", "explain").await;
    assert_eq!(status, 200);
    let (_, b) = run(&client, &base, &second, "entropy", "explain").await;

    assert_eq!(a["text"], b["text"]);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // Different task, different prompt.
    run(&client, &base, &first, "entropy", "summarize").await;
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_generate_questions_calls_share_cache_entry() {
    let (endpoint, hits) = spawn_fake_model().await;
    let base = spawn_study_server(&endpoint).await;
    let client = Client::new();
    let session = new_session(&client, &base).await;

    let (status, body) = run(&client, &base, &session, "osmosis", "generate_questions").await;

    assert_eq!(status, 200);
    assert_eq!(body["questions"].as_array().map(Vec::len), Some(3));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_model_loading_surfaces_unavailable() {
    let (endpoint, hits) = spawn_fake_model().await;
    let base = spawn_study_server(&endpoint).await;
    let client = Client::new();
    let session = new_session(&client, &base).await;

    let (status, body) = run(&client, &base, &session, "overloaded topic", "quiz").await;
    assert_eq!(status, 503);
    assert_eq!(body["kind"], "model_unavailable");

    // Failures are not cached.
    run(&client, &base, &session, "overloaded topic", "quiz").await;
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    let view: Value = client
        .get(format!("{base}/api/sessions/{session}"))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(view["quizPhase"], "empty");
}

#[tokio::test]
async fn test_unreachable_endpoint_is_unavailable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");
    drop(listener);

    let gateway = HttpGateway::new(
        &format!("http://{addr}/models"),
        "google/flan-t5-large",
        Duration::from_secs(2),
        None,
    )
    .expect("Failed to build gateway");

    let err = gateway
        .generate("hello", &study_core::Task::Explain.options())
        .await
        .expect_err("Expected a failure");
    assert!(err.is_inference_failure(), "got {err:?}");
    assert!(!matches!(err, StudyError::EmptyInput));
}
