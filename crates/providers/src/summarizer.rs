//! LLM-backed conversation summarizer.
//!
//! Wraps any [`Provider`] behind the [`Summarizer`] seam with a fixed
//! low temperature and a hard deadline, so a hung provider cannot stall
//! a compaction indefinitely.

use async_trait::async_trait;
use ragline_config::AppConfig;
use ragline_core::error::ProviderError;
use ragline_core::message::ChatMessage;
use ragline_core::provider::{GenerationRequest, Provider};
use ragline_core::summarizer::Summarizer;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const SUMMARIZATION_PROMPT: &str = "\
You are an expert at summarizing conversations. Create a concise summary \
of the following chat conversation between a User and an AI Assistant.

Requirements:
- Capture the main topics discussed
- Include key questions asked and answers provided
- Maintain the conversational flow and context
- Keep it concise but informative (aim for 50-200 words)
- Focus on information that would be useful for future conversation context
- Use clear, professional language

Chat conversation to summarize:
{conversation}

Provide a clear and concise summary:";

const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);

/// Summarizes transcripts through an LLM provider.
pub struct LlmSummarizer {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    deadline: Duration,
}

impl LlmSummarizer {
    pub fn new(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            temperature: config.summarize_temperature,
            max_tokens: config.max_response_tokens,
            deadline: DEFAULT_DEADLINE,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    fn build_prompt(transcript: &str) -> String {
        SUMMARIZATION_PROMPT.replace("{conversation}", transcript)
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    fn name(&self) -> &str {
        "llm_summarizer"
    }

    async fn summarize(&self, transcript: &str) -> Result<String, ProviderError> {
        let request = GenerationRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(Self::build_prompt(transcript))],
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
        };

        debug!(
            provider = self.provider.name(),
            transcript_len = transcript.len(),
            "summarizing transcript"
        );

        let summary = tokio::time::timeout(self.deadline, self.provider.generate(request))
            .await
            .map_err(|_| {
                ProviderError::Timeout(format!(
                    "summarization exceeded {}s deadline",
                    self.deadline.as_secs()
                ))
            })??;

        let summary = summary.trim().to_string();
        if summary.is_empty() {
            return Err(ProviderError::ApiError {
                status_code: 200,
                message: "provider returned an empty summary".into(),
            });
        }
        Ok(summary)
    }
}
