//! Error types for Study Buddy.
//!
//! This module defines the error hierarchy for all core operations,
//! including configuration loading, prompt building, inference gateway
//! calls, quiz parsing, and session handling.

use std::path::PathBuf;

/// A specialized `Result` type for Study Buddy operations.
pub type Result<T> = std::result::Result<T, StudyError>;

/// Warning shown when the user submits without any text.
pub const EMPTY_INPUT_WARNING: &str = "Please enter a topic or text first!";

/// Errors that can occur while serving study requests.
///
/// Error variants are organized by subsystem and include actionable suggestions
/// where possible to help users resolve issues.
#[derive(Debug, thiserror::Error)]
pub enum StudyError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your study.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Input Errors
    // ========================================================================
    /// The user submitted blank text.
    #[error("Please enter a topic or text first!")]
    EmptyInput,

    // ========================================================================
    // Inference Gateway Errors
    // ========================================================================
    /// The model endpoint could not be reached or is not serving the model.
    #[error("Model '{model}' is unavailable: {message}\n\nSuggestion: Check the gateway endpoint and that the model is deployed")]
    ModelUnavailable {
        /// Model identifier.
        model: String,
        /// Description of the failure.
        message: String,
    },

    /// The gateway did not answer within the configured timeout.
    #[error("Inference timed out after {timeout_secs}s\n\nSuggestion: Retry, or raise gateway.timeoutSeconds in your study.json")]
    InferenceTimeout {
        /// The timeout duration in seconds.
        timeout_secs: u64,
    },

    /// The gateway answered with an error or an unusable body.
    #[error("Inference failed ({kind}): {message}\n\nSuggestion: {suggestion}")]
    Inference {
        /// The kind of gateway failure.
        kind: GatewayErrorKind,
        /// Detailed error message.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    /// Generated quiz text did not follow the requested layout.
    #[error("Generated quiz did not match the expected layout: {reason}")]
    MalformedGenerationOutput {
        /// What was wrong with the text.
        reason: String,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// No session exists with the given id.
    #[error("Session not found: '{id}'\n\nSuggestion: Create a new session with POST /api/sessions")]
    SessionNotFound {
        /// The requested session id.
        id: String,
    },

    /// The quiz key does not name a generated question.
    #[error("Unknown quiz question: '{key}'")]
    UnknownQuizKey {
        /// The requested key.
        key: String,
    },

    /// The selected option is not one of the question's options.
    #[error("Option '{option}' is not offered for {key}")]
    OptionNotOffered {
        /// The question key.
        key: String,
        /// The rejected option.
        option: String,
    },

    /// An answer check was requested before any option was selected.
    #[error("No answer selected for {key}\n\nSuggestion: Select an option before checking the answer")]
    NoSelection {
        /// The question key.
        key: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // State Machine Errors
    // ========================================================================
    /// Invalid state transition attempted.
    #[error("Invalid state transition: cannot go from {from} to {to}")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
    },
}

/// Categories of gateway failures for structured error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// Authentication failure (missing or invalid token).
    Authentication,
    /// Rate limit exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues.
    Network,
    /// The response body could not be decoded into generations.
    Decode,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::Decode => write!(f, "decode"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl GatewayErrorKind {
    /// Returns a suggestion message for this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Authentication => "Check the API token in the environment variable named by gateway.apiTokenEnv",
            Self::RateLimit => "Wait and retry, or reduce request frequency",
            Self::Server => "Retry later; the inference service may be experiencing issues",
            Self::Network => "Check your network connection",
            Self::Decode => "Check that gateway.endpoint points at a text-generation endpoint",
            Self::Other => "Check the inference provider's status page",
        }
    }
}

impl StudyError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `ModelUnavailable` error.
    #[must_use]
    pub fn model_unavailable(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Creates a new `InferenceTimeout` error.
    #[must_use]
    pub const fn inference_timeout(timeout_secs: u64) -> Self {
        Self::InferenceTimeout { timeout_secs }
    }

    /// Creates a new `Inference` error with automatic suggestion based on error kind.
    #[must_use]
    pub fn inference(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        let suggestion = kind.suggestion().to_string();
        Self::Inference {
            kind,
            message: message.into(),
            suggestion,
        }
    }

    /// Creates a new `MalformedGenerationOutput` error.
    #[must_use]
    pub fn malformed_output(reason: impl Into<String>) -> Self {
        Self::MalformedGenerationOutput {
            reason: reason.into(),
        }
    }

    /// Creates a new `SessionNotFound` error.
    #[must_use]
    pub fn session_not_found(id: impl std::fmt::Display) -> Self {
        Self::SessionNotFound { id: id.to_string() }
    }

    /// Creates a new `UnknownQuizKey` error.
    #[must_use]
    pub fn unknown_quiz_key(key: impl std::fmt::Display) -> Self {
        Self::UnknownQuizKey {
            key: key.to_string(),
        }
    }

    /// Creates a new `OptionNotOffered` error.
    #[must_use]
    pub fn option_not_offered(key: impl std::fmt::Display, option: impl Into<String>) -> Self {
        Self::OptionNotOffered {
            key: key.to_string(),
            option: option.into(),
        }
    }

    /// Creates a new `NoSelection` error.
    #[must_use]
    pub fn no_selection(key: impl std::fmt::Display) -> Self {
        Self::NoSelection {
            key: key.to_string(),
        }
    }

    /// Creates a new `InvalidStateTransition` error.
    #[must_use]
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns `true` if this error is transient and may be retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Inference {
                kind: GatewayErrorKind::RateLimit
                    | GatewayErrorKind::Server
                    | GatewayErrorKind::Network,
                ..
            } | Self::InferenceTimeout { .. }
                | Self::ModelUnavailable { .. }
        )
    }

    /// Returns `true` if this error came from the inference gateway.
    #[must_use]
    pub const fn is_inference_failure(&self) -> bool {
        matches!(
            self,
            Self::ModelUnavailable { .. } | Self::InferenceTimeout { .. } | Self::Inference { .. }
        )
    }

    /// Returns a short machine-readable name for this error.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::ConfigParseError { .. } => "config_parse",
            Self::ConfigValidationError { .. } => "config_validation",
            Self::EmptyInput => "empty_input",
            Self::ModelUnavailable { .. } => "model_unavailable",
            Self::InferenceTimeout { .. } => "inference_timeout",
            Self::Inference { .. } => "inference",
            Self::MalformedGenerationOutput { .. } => "malformed_generation_output",
            Self::SessionNotFound { .. } => "session_not_found",
            Self::UnknownQuizKey { .. } => "unknown_quiz_key",
            Self::OptionNotOffered { .. } => "option_not_offered",
            Self::NoSelection { .. } => "no_selection",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::InvalidStateTransition { .. } => "invalid_state_transition",
        }
    }
}
