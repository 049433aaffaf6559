//! Summarizer trait — the conversation compaction capability.
//!
//! Logically distinct from the main generation call, though the shipped
//! implementation wraps the same provider with a fixed low-temperature
//! setting and a dedicated instruction prompt.

use async_trait::async_trait;

use crate::error::ProviderError;

/// Condense a role-tagged conversation transcript into a short summary.
///
/// The transcript is plain text with one `Role: content` line per
/// message. Implementations are expected to target 50–200 words and run
/// with a low-variance generation setting so repeated compactions of the
/// same history stay stable.
///
/// A failed or timed-out summarization must propagate as an error —
/// callers rely on this to keep the pre-compaction history intact rather
/// than dropping messages without a replacement summary.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// A human-readable name for this summarizer.
    fn name(&self) -> &str;

    /// Summarize the transcript.
    async fn summarize(&self, transcript: &str) -> std::result::Result<String, ProviderError>;
}
