//! Process-wide configuration, loaded once at startup.
//!
//! Sources, lowest priority first:
//! - the legacy unprefixed variables
//!   (`AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT`, `AZURE_DOCUMENT_INTELLIGENCE_KEY`,
//!   `GOOGLE_API_KEY`)
//! - an optional `config.{toml,yaml,json}` file in the working directory
//! - `EXAM_EVALUATOR__SECTION__KEY` environment variables

use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::Deserialize;
use std::time::Duration;

use crate::error::{ServiceError, ServiceResult};

const ENV_PREFIX: &str = "EXAM_EVALUATOR";

/// Fallback variable names mapped onto config keys
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    (
        "AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT",
        "document_intelligence.endpoint",
    ),
    ("AZURE_DOCUMENT_INTELLIGENCE_KEY", "document_intelligence.key"),
    ("GOOGLE_API_KEY", "generation.api_key"),
];

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default)]
    pub document_intelligence: DocumentIntelligenceConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub cors: CorsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Azure AI Document Intelligence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentIntelligenceConfig {
    /// Resource endpoint, e.g. `https://my-resource.cognitiveservices.azure.com/`
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub key: Option<String>,

    #[serde(default = "default_model_id")]
    pub model_id: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Applies to each HTTP request (download, submit, every poll)
    #[serde(default = "default_analysis_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub polling: PollingConfig,
}

/// Bounds for the analysis job poll loop
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    /// Delay before each status request
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_max_poll_attempts")]
    pub max_attempts: u32,

    /// Total time budget for the loop, including the sleep before the first poll
    #[serde(default = "default_max_poll_wait_secs")]
    pub max_wait_secs: u64,
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

/// Gemini configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_url")]
    pub base_url: String,

    #[serde(default = "default_generation_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_generation_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// CORS configuration. An empty origin list allows any origin.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for DocumentIntelligenceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            key: None,
            model_id: default_model_id(),
            api_version: default_api_version(),
            request_timeout_secs: default_analysis_timeout_secs(),
            polling: PollingConfig::default(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            max_attempts: default_max_poll_attempts(),
            max_wait_secs: default_max_poll_wait_secs(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_generation_url(),
            model: default_generation_model(),
            api_key: None,
            request_timeout_secs: default_generation_timeout_secs(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the legacy variables, config file and env vars
    pub fn load() -> ServiceResult<Self> {
        let mut builder = Config::builder();
        for (var, key) in LEGACY_ENV_KEYS {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_default(*key, value).map_err(config_error)?;
            }
        }

        Self::from_builder(
            builder
                .add_source(File::with_name("config").required(false))
                .add_source(
                    Environment::with_prefix(ENV_PREFIX)
                        .separator("__")
                        .list_separator(",")
                        .with_list_parse_key("cors.allowed_origins")
                        .try_parsing(true),
                ),
        )
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> ServiceResult<Self> {
        builder
            .build()
            .map_err(config_error)?
            .try_deserialize()
            .map_err(config_error)
    }

    /// Names of settings that are unset but needed by an external call
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.document_intelligence.endpoint.is_none() {
            missing.push("document_intelligence.endpoint");
        }
        if self.document_intelligence.key.is_none() {
            missing.push("document_intelligence.key");
        }
        if self.generation.api_key.is_none() {
            missing.push("generation.api_key");
        }
        missing
    }
}

fn config_error(e: config::ConfigError) -> ServiceError {
    ServiceError::Config {
        message: format!("Failed to load configuration: {}", e),
    }
}

// ==================== Default Value Functions ====================

fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_model_id() -> String {
    "prebuilt-read".to_string()
}

fn default_api_version() -> String {
    "2023-07-31".to_string()
}

fn default_analysis_timeout_secs() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_poll_attempts() -> u32 {
    120
}

fn default_max_poll_wait_secs() -> u64 {
    180
}

fn default_generation_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_generation_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_generation_timeout_secs() -> u64 {
    120
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "https://smart-evaluation-tool-rcpu.onrender.com".to_string(),
        "http://127.0.0.1:8000".to_string(),
    ]
}
