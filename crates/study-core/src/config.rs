//! Configuration types for Study Buddy.
//!
//! This module provides all configuration structures used to control the
//! inference gateway, the generation cache, quiz parsing, the HTTP server and
//! static assets.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudyError};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "study.json";

/// Default inference endpoint base URL; the model id is appended.
fn default_endpoint() -> String {
    "https://api-inference.huggingface.co/models".to_string()
}

/// Default pretrained model.
fn default_model() -> String {
    "google/flan-t5-large".to_string()
}

/// Default timeout in seconds for a single gateway call.
const fn default_gateway_timeout() -> u64 {
    120
}

/// Default environment variable holding the gateway bearer token.
fn default_api_token_env() -> String {
    "HF_API_TOKEN".to_string()
}

/// Default number of memoized generations kept in memory.
const fn default_cache_capacity() -> usize {
    256
}

/// Default idle time in seconds after which a session is dropped.
const fn default_session_idle() -> u64 {
    3600
}

/// Default bind address.
fn default_host() -> String {
    "127.0.0.1".to_string()
}

/// Default HTTP port.
const fn default_port() -> u16 {
    8501
}

/// Default directory for static assets.
fn default_assets_dir() -> String {
    "assets".to_string()
}

/// Default logo file name inside the assets directory.
fn default_logo() -> String {
    "student.png".to_string()
}

/// Main configuration for Study Buddy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Inference gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Generation cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Quiz generation settings.
    #[serde(default)]
    pub quiz: QuizConfig,

    /// Session lifetime settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Directory holding static assets such as the logo.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,

    /// Logo file name, served at `/{logo}`.
    #[serde(default = "default_logo")]
    pub logo: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            cache: CacheConfig::default(),
            quiz: QuizConfig::default(),
            session: SessionConfig::default(),
            server: ServerConfig::default(),
            assets_dir: default_assets_dir(),
            logo: default_logo(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `study.json` in the current directory. If found, loads and
    /// validates the configuration. If not found, returns default configuration.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            StudyError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from a specific directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        Self::load_from_file(&config_path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::ConfigParseError` if the file exists but contains
    /// invalid JSON or invalid enum values.
    ///
    /// Returns `StudyError::ConfigValidationError` if the configuration values
    /// are invalid (e.g., zero timeout, empty model).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(StudyError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| StudyError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// - `gateway.endpoint` and `gateway.model` must not be empty
    /// - `gateway.timeoutSeconds` must be greater than 0
    /// - `cache.capacity` must be greater than 0
    /// - `session.idleSeconds` must be greater than 0
    /// - `server.host` must be an IP address
    /// - `assetsDir` and `logo` must not be empty
    pub fn validate(&self) -> Result<()> {
        if self.gateway.endpoint.trim().is_empty() {
            return Err(StudyError::config_validation(
                "gateway.endpoint must not be empty",
                "Set gateway.endpoint to the base URL of your inference service in study.json",
            ));
        }

        if self.gateway.model.trim().is_empty() {
            return Err(StudyError::config_validation(
                "gateway.model must not be empty",
                "Set gateway.model to a model id such as 'google/flan-t5-large' in study.json",
            ));
        }

        if self.gateway.timeout_seconds == 0 {
            return Err(StudyError::config_validation(
                "gateway.timeoutSeconds must be greater than 0",
                "Set gateway.timeoutSeconds to at least 1 second in your study.json",
            ));
        }

        if self.cache.capacity == 0 {
            return Err(StudyError::config_validation(
                "cache.capacity must be greater than 0",
                "Set cache.capacity to at least 1 in your study.json",
            ));
        }

        if self.session.idle_seconds == 0 {
            return Err(StudyError::config_validation(
                "session.idleSeconds must be greater than 0",
                "Set session.idleSeconds to how long an unused session may live, e.g. 3600",
            ));
        }

        if self.server.host.parse::<IpAddr>().is_err() {
            return Err(StudyError::config_validation(
                format!("server.host '{}' is not an IP address", self.server.host),
                "Use an address such as '127.0.0.1' or '0.0.0.0' for server.host",
            ));
        }

        if self.assets_dir.trim().is_empty() {
            return Err(StudyError::config_validation(
                "assetsDir must not be empty",
                "Provide a valid assets directory path in your study.json (use '.' for current directory)",
            ));
        }

        if self.logo.trim().is_empty() {
            return Err(StudyError::config_validation(
                "logo must not be empty",
                "Provide the logo file name in your study.json",
            ));
        }

        Ok(())
    }

    /// Returns the path of the logo file on disk.
    #[must_use]
    pub fn logo_path(&self) -> PathBuf {
        Path::new(&self.assets_dir).join(&self.logo)
    }
}

/// Inference gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Base URL of the inference service.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model identifier appended to the endpoint.
    #[serde(default = "default_model")]
    pub model: String,

    /// Timeout for a single generation call in seconds.
    #[serde(default = "default_gateway_timeout")]
    pub timeout_seconds: u64,

    /// Environment variable holding the bearer token, if any.
    #[serde(default = "default_api_token_env")]
    pub api_token_env: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            timeout_seconds: default_gateway_timeout(),
            api_token_env: default_api_token_env(),
        }
    }
}

/// Generation cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Maximum number of memoized generation results.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

/// Quiz generation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizConfig {
    /// How generated quiz text is turned into questions.
    #[serde(default)]
    pub parsing: QuizParsing,
}

/// Strategy for turning generated quiz text into questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QuizParsing {
    /// Parse the question layout, falling back to placeholders (default).
    #[default]
    Structured,
    /// Always use the raw text with placeholder options.
    Placeholder,
}

impl QuizParsing {
    /// Parses a string into a `QuizParsing`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "structured" => Some(Self::Structured),
            "placeholder" => Some(Self::Placeholder),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for QuizParsing {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid quiz parsing mode '{s}': expected one of 'structured', 'placeholder'"
            ))
        })
    }
}

impl Serialize for QuizParsing {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            Self::Structured => "structured",
            Self::Placeholder => "placeholder",
        };
        serializer.serialize_str(s)
    }
}

/// Session lifetime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Seconds without a change after which a session is dropped.
    #[serde(default = "default_session_idle")]
    pub idle_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_seconds: default_session_idle(),
        }
    }
}

impl SessionConfig {
    /// Idle time after which a session is dropped.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_seconds)
    }

    /// How often idle sessions are swept: a tenth of the idle time, between
    /// one second and one minute.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs((self.idle_seconds / 10).clamp(1, 60))
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// Returns the socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::ConfigValidationError` if `host` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.host.parse().map_err(|_| {
            StudyError::config_validation(
                format!("server.host '{}' is not an IP address", self.host),
                "Use an address such as '127.0.0.1' or '0.0.0.0' for server.host",
            )
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
