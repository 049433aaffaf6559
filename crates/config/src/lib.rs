//! Configuration loading, validation, and management for Ragline.
//!
//! Loads configuration from `ragline.toml` with environment variable
//! overrides. Validates all settings at startup — an invalid threshold
//! ordering aborts the process instead of surfacing later as a wrong
//! budget decision. The loaded configuration is read-only for the
//! process lifetime; changing it requires a restart.

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use ragline_core::error::ConfigError;

/// The root configuration structure.
///
/// Maps directly to `ragline.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the LLM provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// LLM provider ("groq", "openai", "deepseek", or a base URL)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name for generation and summarization
    #[serde(default = "default_model")]
    pub model: String,

    /// Temperature for answer generation
    #[serde(default)]
    pub generation_temperature: f32,

    /// Temperature for summarization (kept low for stable summaries)
    #[serde(default = "default_summarize_temperature")]
    pub summarize_temperature: f32,

    /// Maximum tokens per LLM response
    #[serde(default = "default_max_response_tokens")]
    pub max_response_tokens: u32,

    /// Override the built-in retrieval system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Token budget thresholds
    #[serde(default)]
    pub budget: TokenBudget,

    /// Retrieval and chunking settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Session registry settings
    #[serde(default)]
    pub session: SessionConfig,
}

fn default_provider() -> String {
    "groq".into()
}
fn default_model() -> String {
    "llama-3.1-8b-instant".into()
}
fn default_summarize_temperature() -> f32 {
    0.1
}
fn default_max_response_tokens() -> u32 {
    2048
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("generation_temperature", &self.generation_temperature)
            .field("summarize_temperature", &self.summarize_temperature)
            .field("max_response_tokens", &self.max_response_tokens)
            .field("budget", &self.budget)
            .field("retrieval", &self.retrieval)
            .field("gateway", &self.gateway)
            .field("session", &self.session)
            .finish()
    }
}

/// The token budget thresholds that drive all per-query decisions.
///
/// Invariant: `0 < question_threshold < summarize_threshold < 1.0` and
/// `token_limit > 0`. Immutable for the process lifetime — loaded once
/// at startup, so no synchronization is needed around budget parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBudget {
    /// Maximum tokens per request
    #[serde(default = "default_token_limit")]
    pub token_limit: usize,

    /// Fraction of the limit at which summarization is triggered
    #[serde(default = "default_summarize_threshold")]
    pub summarize_threshold: f32,

    /// Maximum question size as a fraction of the limit
    #[serde(default = "default_question_threshold")]
    pub question_threshold: f32,

    /// Recent messages kept verbatim through compaction
    /// (3 user/assistant exchange pairs)
    #[serde(default = "default_retained_messages")]
    pub retained_messages: usize,
}

fn default_token_limit() -> usize {
    8000
}
fn default_summarize_threshold() -> f32 {
    0.7
}
fn default_question_threshold() -> f32 {
    0.2
}
fn default_retained_messages() -> usize {
    6
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            token_limit: default_token_limit(),
            summarize_threshold: default_summarize_threshold(),
            question_threshold: default_question_threshold(),
            retained_messages: default_retained_messages(),
        }
    }
}

impl TokenBudget {
    /// Absolute token count at which summarization is triggered.
    pub fn summarize_limit(&self) -> usize {
        (self.token_limit as f32 * self.summarize_threshold) as usize
    }

    /// Absolute token count above which a question is rejected.
    pub fn question_limit(&self) -> usize {
        (self.token_limit as f32 * self.question_threshold) as usize
    }

    /// Validate the threshold ordering.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_limit == 0 {
            return Err(ConfigError::ValidationError(
                "budget.token_limit must be > 0".into(),
            ));
        }
        if self.question_threshold <= 0.0
            || self.summarize_threshold >= 1.0
            || self.question_threshold >= self.summarize_threshold
        {
            return Err(ConfigError::ValidationError(
                "budget thresholds must satisfy 0 < question_threshold < summarize_threshold < 1.0"
                    .into(),
            ));
        }
        if self.retained_messages == 0 || self.retained_messages % 2 != 0 {
            return Err(ConfigError::ValidationError(
                "budget.retained_messages must be a positive even number (whole exchange pairs)"
                    .into(),
            ));
        }
        Ok(())
    }
}

/// Retrieval and chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Passages retrieved per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Cosine-distance gate: a query whose best match is farther than
    /// this yields no retrieved context (0 identical, 2 opposite)
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f32,

    /// Target chunk size in words
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Words of overlap between adjacent chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Chunks shorter than this many characters are discarded
    #[serde(default = "default_min_chunk_chars")]
    pub min_chunk_chars: usize,

    /// Model used to embed chunks and queries
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

fn default_top_k() -> usize {
    3
}
fn default_distance_threshold() -> f32 {
    1.5
}
fn default_chunk_size() -> usize {
    512
}
fn default_chunk_overlap() -> usize {
    50
}
fn default_min_chunk_chars() -> usize {
    100
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            distance_threshold: default_distance_threshold(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_chunk_chars: default_min_chunk_chars(),
            embedding_model: default_embedding_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle sessions older than this are evicted from the registry
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,
}

fn default_idle_ttl_secs() -> u64 {
    3600
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: default_idle_ttl_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `ragline.toml` in the working directory.
    ///
    /// Environment variable overrides (highest priority):
    /// - `RAGLINE_API_KEY`, falling back to `GROQ_API_KEY` / `OPENAI_API_KEY`
    /// - `RAGLINE_PROVIDER`
    /// - `RAGLINE_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(Path::new("ragline.toml"))?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("RAGLINE_API_KEY")
                .ok()
                .or_else(|| std::env::var("GROQ_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("RAGLINE_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("RAGLINE_MODEL") {
            config.model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration. Called once at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.budget.validate()?;

        if !(0.0..=2.0).contains(&self.generation_temperature) {
            return Err(ConfigError::ValidationError(
                "generation_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.retrieval.distance_threshold < 0.0 {
            return Err(ConfigError::ValidationError(
                "retrieval.distance_threshold must be >= 0".into(),
            ));
        }

        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            return Err(ConfigError::ValidationError(
                "retrieval.chunk_overlap must be smaller than chunk_size".into(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            model: default_model(),
            generation_temperature: 0.0,
            summarize_temperature: default_summarize_temperature(),
            max_response_tokens: default_max_response_tokens(),
            system_prompt: None,
            budget: TokenBudget::default(),
            retrieval: RetrievalConfig::default(),
            gateway: GatewayConfig::default(),
            session: SessionConfig::default(),
        }
    }
}
