//! Error types for the Ragline domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant. Errors that reach a
//! user are always rendered as textual messages, never raw error chains.

use std::path::PathBuf;

use thiserror::Error;

/// The top-level error type for all Ragline operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Context pipeline errors ---
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    // --- Retrieval errors ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Configuration errors ---
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the per-query context pipeline.
///
/// All variants except `SummarizationFailed` are detected before any
/// generation call is made. None of them leave partial mutations behind
/// in the session's conversation memory.
#[derive(Debug, Clone, Error)]
pub enum ContextError {
    /// The user question alone exceeds the question-fraction budget.
    /// Recoverable by shortening the input.
    #[error("Question too long: {tokens} tokens (limit {limit})")]
    QuestionTooLong { tokens: usize, limit: usize },

    /// Even after compaction the session cannot fit the token limit.
    /// Recoverable only by clearing the conversation.
    #[error("Conversation too long: {tokens} tokens (limit {limit})")]
    ConversationTooLong { tokens: usize, limit: usize },

    /// The external summarizer errored or timed out. History is left
    /// intact; the whole request may be retried.
    #[error("Summarization failed: {0}")]
    SummarizationFailed(String),

    /// The token counting capability is unavailable. Fatal for the
    /// current request; budget decisions cannot be made without it.
    #[error("Tokenization unavailable: {0}")]
    TokenizationUnavailable(String),
}

impl ContextError {
    /// The message shown to the end user for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::QuestionTooLong { .. } => {
                "Your question is too long. Please reduce your input to continue the conversation."
            }
            Self::ConversationTooLong { .. } => {
                "The conversation has become too long. Please start a new conversation to continue."
            }
            Self::SummarizationFailed(_) => {
                "A temporary error occurred while condensing the conversation. Please try again."
            }
            Self::TokenizationUnavailable(_) => {
                "A temporary internal error occurred. Please try again."
            }
        }
    }

    /// Whether retrying the same request unchanged can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SummarizationFailed(_) | Self::TokenizationUnavailable(_)
        )
    }
}

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Document already exists: {0}")]
    DuplicateDocument(String),

    #[error("Document not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Configuration loading and validation failures. Detected at startup;
/// the process aborts rather than running with a wrong budget.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Failure of the token counting capability.
#[derive(Debug, Clone, Error)]
pub enum TokenizerError {
    #[error("Tokenizer unavailable: {0}")]
    Unavailable(String),
}

impl From<TokenizerError> for ContextError {
    fn from(err: TokenizerError) -> Self {
        match err {
            TokenizerError::Unavailable(reason) => ContextError::TokenizationUnavailable(reason),
        }
    }
}
