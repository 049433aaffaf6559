//! # Ragline Core
//!
//! Domain types, traits, and error definitions for the Ragline
//! retrieval-augmented chat assistant. This crate has **zero framework
//! dependencies** — it defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every external capability the context manager consumes — token
//! counting, vector search, summarization, generation — is defined as a
//! trait here. Implementations live in their respective crates. This
//! enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod provider;
pub mod retrieval;
pub mod summarizer;
pub mod tokenizer;

// Re-export key types at crate root for ergonomics
pub use error::{ContextError, Error, ProviderError, Result, RetrievalError, TokenizerError};
pub use message::{ChatMessage, Role, SessionId};
pub use provider::{GenerationRequest, Provider};
pub use retrieval::{Embedder, RetrievedPassage, Retriever};
pub use summarizer::Summarizer;
pub use tokenizer::Tokenizer;
