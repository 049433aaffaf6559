//! LLM provider adapters for Ragline.
//!
//! All adapters implement the `ragline_core` capability traits:
//! [`ragline_core::provider::Provider`] for chat completion and
//! [`ragline_core::summarizer::Summarizer`] for history compaction.

pub mod embedder;
pub mod openai_compat;
pub mod summarizer;

pub use embedder::OpenAiCompatEmbedder;
pub use openai_compat::OpenAiCompatProvider;
pub use summarizer::LlmSummarizer;
