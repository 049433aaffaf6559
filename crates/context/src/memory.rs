//! Per-session conversation memory.
//!
//! Owns the ordered message history for one session. Insertion order is
//! load-bearing: it defines recency for truncation and summarization.
//! The only mutators are `append` (and the `record_exchange`
//! convenience), `compact`, and `clear` — each atomic from the
//! perspective of a single session, so a reader of the same session
//! never observes interleaved partial state.

use ragline_core::error::ContextError;
use ragline_core::message::ChatMessage;
use ragline_core::summarizer::Summarizer;
use tracing::{debug, info};

/// Prefix under which the running summary is presented to the model.
pub(crate) const SUMMARY_PREFIX: &str = "Previous conversation summary:";

/// One session's conversation state.
///
/// Created empty on session start, mutated only through the methods
/// here, destroyed when the session ends. No persistence across process
/// restarts.
#[derive(Debug, Default)]
pub struct ConversationMemory {
    history: Vec<ChatMessage>,
    summary: Option<String>,
    needs_summarization: bool,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one message. Messages are immutable once appended.
    pub fn append(&mut self, message: ChatMessage) {
        self.history.push(message);
    }

    /// Append a complete user/assistant exchange.
    pub fn record_exchange(&mut self, query: impl Into<String>, answer: impl Into<String>) {
        self.append(ChatMessage::user(query));
        self.append(ChatMessage::assistant(answer));
    }

    /// Snapshot of the current history, oldest first.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// The current summary text, if a compaction has occurred.
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// The summary rendered as the synthetic system message inserted
    /// after the system prompt during assembly.
    pub fn summary_message(&self) -> Option<ChatMessage> {
        self.summary
            .as_ref()
            .map(|s| ChatMessage::system(format!("{}\n{}", SUMMARY_PREFIX, s)))
    }

    /// Whether the budget check has flagged this session for compaction.
    pub fn needs_summarization(&self) -> bool {
        self.needs_summarization
    }

    pub(crate) fn mark_needs_summarization(&mut self) {
        self.needs_summarization = true;
    }

    /// Empty the history and drop the summary. Idempotent.
    pub fn clear(&mut self) {
        self.history.clear();
        self.summary = None;
        self.needs_summarization = false;
    }

    /// Replace all but the last `retain` messages with a fresh summary.
    ///
    /// The removed messages are concatenated into a role-tagged
    /// transcript and handed to the external summarizer. The returned
    /// text fully supersedes any prior summary — summaries are never
    /// chained. If the history holds `retain` or fewer messages there is
    /// nothing safe to remove and the call is a no-op.
    ///
    /// On summarizer failure the history is left intact and unmodified;
    /// the error propagates as [`ContextError::SummarizationFailed`] and
    /// the whole request may be retried.
    ///
    /// Returns whether a compaction actually happened.
    pub async fn compact(
        &mut self,
        summarizer: &dyn Summarizer,
        retain: usize,
    ) -> Result<bool, ContextError> {
        if self.history.len() <= retain {
            debug!(
                messages = self.history.len(),
                retain, "compaction skipped: nothing safe to remove"
            );
            return Ok(false);
        }

        let split_at = self.history.len() - retain;
        let transcript = format_transcript(&self.history[..split_at]);

        let summary = summarizer
            .summarize(&transcript)
            .await
            .map_err(|e| ContextError::SummarizationFailed(e.to_string()))?;

        // Mutate only after the summarizer has succeeded.
        self.history.drain(..split_at);
        self.summary = Some(summary);
        self.needs_summarization = false;

        info!(
            summarized = split_at,
            retained = retain,
            "conversation history compacted"
        );
        Ok(true)
    }
}

/// Format messages as a role-tagged transcript for summarization,
/// one `User:`/`Assistant:` line per message.
pub(crate) fn format_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}
