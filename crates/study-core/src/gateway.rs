//! Inference gateway: the boundary to the pretrained text-generation model.
//!
//! [`InferenceGateway`] is the seam every caller goes through. [`HttpGateway`]
//! talks to a Hugging Face style inference endpoint:
//!
//! ```text
//! POST {endpoint}/{model}
//! {"inputs": "...", "parameters": {"max_length": 150, "min_length": 30, ...}}
//!
//! 200 OK
//! [{"generated_text": "..."}]
//! ```
//!
//! Memoization lives in [`crate::cache::CachedGateway`], which wraps any
//! gateway.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::error::{GatewayErrorKind, Result, StudyError};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Generation parameters sent with a prompt.
///
/// Part of the memoization key, so it is `Hash + Eq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Maximum length of the generated sequence.
    pub max_length: u32,
    /// Minimum length of the generated sequence, if constrained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    /// Number of sequences to return.
    pub num_return_sequences: u32,
    /// Whether to sample instead of decoding greedily.
    pub do_sample: bool,
}

impl GenerationOptions {
    /// Creates options with one greedy sequence of at most `max_length`.
    #[must_use]
    pub const fn new(max_length: u32) -> Self {
        Self {
            max_length,
            min_length: None,
            num_return_sequences: 1,
            do_sample: false,
        }
    }

    /// Sets the minimum length.
    #[must_use]
    pub const fn with_min_length(mut self, min_length: u32) -> Self {
        self.min_length = Some(min_length);
        self
    }

    /// Enables sampling.
    #[must_use]
    pub const fn with_sampling(mut self) -> Self {
        self.do_sample = true;
        self
    }
}

/// One generated sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    /// The generated text.
    pub generated_text: String,
}

impl Generation {
    /// Creates a generation from text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            generated_text: text.into(),
        }
    }
}

/// Request body for the inference endpoint.
#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: &'a GenerationOptions,
}

/// Some endpoints return a bare object instead of a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Many(Vec<Generation>),
    One(Generation),
}

impl From<InferenceResponse> for Vec<Generation> {
    fn from(response: InferenceResponse) -> Self {
        match response {
            InferenceResponse::Many(generations) => generations,
            InferenceResponse::One(generation) => vec![generation],
        }
    }
}

// ============================================================================
// Gateway Trait
// ============================================================================

/// Accepts a prompt and generation parameters, returns generated text.
///
/// Implementations must be safe to share across sessions.
#[async_trait]
pub trait InferenceGateway: Send + Sync {
    /// Generates text for `prompt`.
    ///
    /// Returns at least one generation on success.
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Vec<Generation>>;
}

#[async_trait]
impl<G: InferenceGateway + ?Sized> InferenceGateway for Arc<G> {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Vec<Generation>> {
        (**self).generate(prompt, options).await
    }
}

// ============================================================================
// HTTP Gateway
// ============================================================================

/// Gateway backed by an HTTP inference endpoint.
#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    url: String,
    model: String,
    token: Option<String>,
    timeout: Duration,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("url", &self.url)
            .field("authenticated", &self.token.is_some())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpGateway {
    /// Creates a gateway for `model` served under `endpoint`.
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        timeout: Duration,
        token: Option<String>,
    ) -> Result<Self> {
        let model = model.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StudyError::inference(GatewayErrorKind::Other, e.to_string()))?;
        let url = format!("{}/{}", endpoint.trim_end_matches('/'), model);

        Ok(Self {
            client,
            url,
            model,
            token,
            timeout,
        })
    }

    /// Creates a gateway from configuration, reading the token from the
    /// configured environment variable.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let token = std::env::var(&config.api_token_env)
            .ok()
            .filter(|t| !t.trim().is_empty());
        if token.is_none() {
            debug!(
                env = %config.api_token_env,
                "No gateway token set, sending unauthenticated requests"
            );
        }

        Self::new(
            &config.endpoint,
            config.model.clone(),
            Duration::from_secs(config.timeout_seconds),
            token,
        )
    }

    /// The full URL requests are posted to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The model identifier.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn map_transport_error(&self, error: &reqwest::Error) -> StudyError {
        if error.is_timeout() {
            StudyError::inference_timeout(self.timeout.as_secs().max(1))
        } else if error.is_connect() {
            StudyError::model_unavailable(&self.model, error.to_string())
        } else if error.is_decode() {
            StudyError::inference(GatewayErrorKind::Decode, error.to_string())
        } else {
            StudyError::inference(GatewayErrorKind::Network, error.to_string())
        }
    }

    fn map_status(&self, status: StatusCode, body: &str) -> StudyError {
        let message = format!("status {status}: {}", body.trim());
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                StudyError::inference(GatewayErrorKind::Authentication, message)
            }
            StatusCode::TOO_MANY_REQUESTS => {
                StudyError::inference(GatewayErrorKind::RateLimit, message)
            }
            StatusCode::NOT_FOUND | StatusCode::SERVICE_UNAVAILABLE => {
                StudyError::model_unavailable(&self.model, message)
            }
            StatusCode::GATEWAY_TIMEOUT => StudyError::inference_timeout(self.timeout.as_secs()),
            s if s.is_server_error() => StudyError::inference(GatewayErrorKind::Server, message),
            _ => StudyError::inference(GatewayErrorKind::Other, message),
        }
    }
}

#[async_trait]
impl InferenceGateway for HttpGateway {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Vec<Generation>> {
        let started = Instant::now();
        let body = InferenceRequest {
            inputs: prompt,
            parameters: options,
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = self.map_status(status, &body);
            warn!(model = %self.model, %status, error = %error, "Gateway returned an error");
            return Err(error);
        }

        let generations: Vec<Generation> = response
            .json::<InferenceResponse>()
            .await
            .map_err(|e| self.map_transport_error(&e))?
            .into();

        if generations.is_empty() {
            return Err(StudyError::inference(
                GatewayErrorKind::Decode,
                "gateway returned no generations",
            ));
        }

        debug!(
            model = %self.model,
            prompt_len = prompt.len(),
            generations = generations.len(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Generation complete"
        );

        Ok(generations)
    }
}
