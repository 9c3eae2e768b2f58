//! Study Buddy Core
//!
//! Prompt building, the inference gateway, study sessions with their quiz
//! lifecycle, and the HTTP API.

pub mod api;
pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod prompt;
pub mod quiz;
pub mod session;
pub mod view;

pub use api::{
    create_router, AppState, CheckResponse, CreateSessionResponse, ErrorResponse, HealthResponse,
    OutputFormat, RunRequest, RunResponse, SelectRequest, SelectResponse,
};
pub use cache::{CacheStats, CachedGateway};
pub use config::{CacheConfig, Config, GatewayConfig, QuizConfig, QuizParsing, ServerConfig, SessionConfig};
pub use controller::StudyController;
pub use error::{GatewayErrorKind, Result, StudyError, EMPTY_INPUT_WARNING};
pub use gateway::{Generation, GenerationOptions, HttpGateway, InferenceGateway};
pub use prompt::{build_prompt, Prompt, Task};
pub use quiz::{parse_quiz, ParsedQuiz, QuizItem, Verdict, PLACEHOLDER_ANSWER, PLACEHOLDER_OPTIONS};
pub use session::{QuizKey, QuizPhase, QuizQuestion, QuizState, Session, SessionHandle, SessionStore};
pub use view::{error_document, verdict_document, Outcome, QuizQuestionView, SessionView};
