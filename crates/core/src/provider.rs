//! Provider trait — the abstraction over LLM backends.
//!
//! A Provider knows how to send an assembled message list to an LLM and
//! get a text reply back. Provider identity is opaque to the context
//! manager: it never branches on which vendor is behind the trait.
//!
//! Implementations: any OpenAI-compatible endpoint (Groq, OpenAI,
//! DeepSeek, Ollama), scripted mocks for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::ChatMessage;

/// A generation request: the assembled context plus sampling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The model to use (e.g., "llama-3.1-8b-instant").
    pub model: String,

    /// The ordered assembled messages.
    pub messages: Vec<ChatMessage>,

    /// Temperature (0.0 = deterministic).
    #[serde(default)]
    pub temperature: f32,

    /// Maximum tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// The core Provider trait.
///
/// The caller assembles the context, calls `generate()`, and appends the
/// exchange to conversation memory itself on success — the provider does
/// not touch session state.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "groq", "openai").
    fn name(&self) -> &str;

    /// Send a request and get the generated text back.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_request_serialization() {
        let req = GenerationRequest {
            model: "llama-3.1-8b-instant".into(),
            messages: vec![ChatMessage::user("hi")],
            temperature: 0.0,
            max_tokens: Some(2048),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("llama-3.1-8b-instant"));
        assert!(json.contains("2048"));
    }
}
