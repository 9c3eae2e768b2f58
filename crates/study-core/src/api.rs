//! HTTP API and page server for Study Buddy.
//!
//! # Endpoints
//!
//! - `GET /` - The study page
//! - `GET /{logo}` - The logo image from the assets directory
//! - `GET /api/health` - Liveness check
//! - `POST /api/sessions` - Create a session
//! - `GET /api/sessions/:id` - Session state
//! - `DELETE /api/sessions/:id` - Drop a session
//! - `POST /api/sessions/:id/reset` - Return a session to its initial state
//! - `POST /api/sessions/:id/run` - Run a task
//! - `PUT /api/sessions/:id/quiz/:key` - Select a quiz option
//! - `POST /api/sessions/:id/quiz/:key/check` - Check a quiz answer
//!
//! `run` and `check` accept `?format=html` to add the rendered fragment to
//! the JSON response.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use study_core::{create_router, AppState, CachedGateway, Config, HttpGateway};
//!
//! # async fn example() -> study_core::Result<()> {
//! let config = Config::default();
//! let gateway = CachedGateway::new(HttpGateway::from_config(&config.gateway)?, config.cache.capacity);
//! let router = create_router(AppState::new(config, Arc::new(gateway)));
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8501").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use study_render::{HtmlGenerator, PageGenerator, PageInput, TaskChoice};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeFile,
    trace::TraceLayer,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::controller::StudyController;
use crate::error::StudyError;
use crate::gateway::InferenceGateway;
use crate::prompt::Task;
use crate::quiz::Verdict;
use crate::session::{QuizKey, SessionHandle, SessionStore};
use crate::view::{verdict_document, Outcome, SessionView};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response body for the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `ok`.
    pub status: String,
    /// Number of live sessions.
    pub sessions: usize,
}

/// Response body for session creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    /// The new session's id.
    pub session_id: Uuid,
}

/// Request body for running a task.
#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    /// The user's text.
    #[serde(default)]
    pub text: String,
    /// The task to run.
    pub task: Task,
}

/// Response body for running a task.
#[derive(Debug, Clone, Serialize)]
pub struct RunResponse {
    /// The outcome.
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Rendered HTML fragment, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

/// Request body for a quiz selection.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectRequest {
    /// The selected option text.
    pub option: String,
}

/// Response body for a quiz selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectResponse {
    /// The question key.
    pub key: QuizKey,
    /// The recorded option.
    pub option: String,
}

/// Response body for an answer check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResponse {
    /// The question key.
    pub key: QuizKey,
    /// The verdict.
    #[serde(flatten)]
    pub verdict: Verdict,
    /// Rendered HTML fragment, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
    /// Machine-readable error kind.
    pub kind: String,
}

/// Optional output format of `run` and `check`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON only.
    #[default]
    Json,
    /// JSON plus a rendered HTML fragment.
    Html,
}

#[derive(Debug, Default, Deserialize)]
struct FormatQuery {
    #[serde(default)]
    format: OutputFormat,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug)]
pub struct AppState {
    /// Configuration.
    pub config: Config,
    /// Live sessions, shared with the idle sweeper.
    pub sessions: Arc<SessionStore>,
    /// Task runner shared by all sessions.
    pub controller: StudyController,
}

impl AppState {
    /// Creates a new `AppState` with no sessions.
    #[must_use]
    pub fn new(config: Config, gateway: Arc<dyn InferenceGateway>) -> Self {
        let controller = StudyController::new(gateway, config.quiz.parsing);
        Self {
            config,
            sessions: Arc::new(SessionStore::new()),
            controller,
        }
    }

    async fn session(&self, id: &str) -> Result<SessionHandle, ApiError> {
        let id: Uuid = id.parse().map_err(|_| StudyError::session_not_found(id))?;
        Ok(self.sessions.get(id).await?)
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Seconds a client should wait before retrying a transient failure.
const RETRY_AFTER_SECONDS: u64 = 10;

/// Error type for API handlers.
#[derive(Debug)]
struct ApiError(StudyError);

impl From<StudyError> for ApiError {
    fn from(error: StudyError) -> Self {
        Self(error)
    }
}

const fn status_for(error: &StudyError) -> StatusCode {
    match error {
        StudyError::EmptyInput | StudyError::OptionNotOffered { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        StudyError::ModelUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        StudyError::InferenceTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        StudyError::Inference { .. } | StudyError::MalformedGenerationOutput { .. } => {
            StatusCode::BAD_GATEWAY
        }
        StudyError::SessionNotFound { .. } | StudyError::UnknownQuizKey { .. } => {
            StatusCode::NOT_FOUND
        }
        StudyError::NoSelection { .. } | StudyError::InvalidStateTransition { .. } => {
            StatusCode::CONFLICT
        }
        StudyError::ConfigParseError { .. }
        | StudyError::ConfigValidationError { .. }
        | StudyError::Io(_)
        | StudyError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            warn!(status = %status, kind = self.0.kind_name(), error = %self.0, "Request failed");
        } else {
            debug!(status = %status, kind = self.0.kind_name(), "Request rejected");
        }

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
            kind: self.0.kind_name().to_string(),
        });
        let mut response = (status, body).into_response();
        if self.0.is_transient() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECONDS));
        }
        response
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with the page, the logo and all API endpoints.
///
/// The router has:
/// - All API routes under `/api`
/// - The study page at `/` and the logo at `/{logo}`
/// - CORS middleware allowing any origin
/// - Tracing middleware for request logging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(handle_health))
        .route("/sessions", post(handle_create_session))
        .route(
            "/sessions/:id",
            get(handle_get_session).delete(handle_delete_session),
        )
        .route("/sessions/:id/reset", post(handle_reset_session))
        .route("/sessions/:id/run", post(handle_run))
        .route("/sessions/:id/quiz/:key", put(handle_select))
        .route("/sessions/:id/quiz/:key/check", post(handle_check));

    let logo_route = format!("/{}", state.config.logo.trim_start_matches('/'));
    let logo_file = ServeFile::new(state.config.logo_path());

    Router::new()
        .route("/", get(handle_page))
        .route_service(&logo_route, logo_file)
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `GET /`.
async fn handle_page(State(state): State<Arc<AppState>>) -> Html<String> {
    let tasks = Task::ALL
        .iter()
        .map(|task| TaskChoice::new(task.wire_name(), task.label()))
        .collect();
    let input = PageInput::new(
        format!("/{}", state.config.logo.trim_start_matches('/')),
        tasks,
    );
    Html(PageGenerator::new(&input).generate())
}

/// Handler for `GET /api/health`.
async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        sessions: state.sessions.len().await,
    })
}

/// Handler for `POST /api/sessions`.
async fn handle_create_session(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let session_id = state.sessions.create().await;
    info!(session = %session_id, "Session started");
    (StatusCode::CREATED, Json(CreateSessionResponse { session_id }))
}

/// Handler for `GET /api/sessions/:id`.
async fn handle_get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = state.session(&id).await?;
    let session = handle.lock().await;
    Ok(Json(SessionView::from(&*session)))
}

/// Handler for `DELETE /api/sessions/:id`.
async fn handle_delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: Uuid = id.parse().map_err(|_| StudyError::session_not_found(&id))?;
    state.sessions.remove(id).await?;
    info!(session = %id, "Session ended");
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for `POST /api/sessions/:id/reset`.
async fn handle_reset_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = state.session(&id).await?;
    let mut session = handle.lock().await;
    session.reset();
    info!(session = %session.id(), "Session reset");
    Ok(Json(SessionView::from(&*session)))
}

/// Handler for `POST /api/sessions/:id/run`.
///
/// The session stays locked for the whole run, including the gateway call.
async fn handle_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<FormatQuery>,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    let handle = state.session(&id).await?;
    let mut session = handle.lock().await;

    let outcome = state
        .controller
        .run(&mut session, &request.text, request.task)
        .await?;

    let html = (query.format == OutputFormat::Html)
        .then(|| HtmlGenerator::new(&outcome.to_document()).generate());

    Ok(Json(RunResponse { outcome, html }))
}

/// Handler for `PUT /api/sessions/:id/quiz/:key`.
async fn handle_select(
    State(state): State<Arc<AppState>>,
    Path((id, key)): Path<(String, String)>,
    Json(request): Json<SelectRequest>,
) -> Result<Json<SelectResponse>, ApiError> {
    let handle = state.session(&id).await?;
    let key: QuizKey = key.parse()?;
    let mut session = handle.lock().await;

    state
        .controller
        .select(&mut session, key, &request.option)?;

    Ok(Json(SelectResponse {
        key,
        option: request.option,
    }))
}

/// Handler for `POST /api/sessions/:id/quiz/:key/check`.
async fn handle_check(
    State(state): State<Arc<AppState>>,
    Path((id, key)): Path<(String, String)>,
    Query(query): Query<FormatQuery>,
) -> Result<Json<CheckResponse>, ApiError> {
    let handle = state.session(&id).await?;
    let key: QuizKey = key.parse()?;
    let session = handle.lock().await;

    let verdict = state.controller.check(&session, key)?;
    let html = (query.format == OutputFormat::Html)
        .then(|| HtmlGenerator::new(&verdict_document(&verdict)).generate());

    Ok(Json(CheckResponse { key, verdict, html }))
}

// ============================================================================
// Tests
// ============================================================================
