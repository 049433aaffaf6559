//! Conversation context management — the core of Ragline.
//!
//! Every turn, this crate decides (a) whether retrieved passages are
//! relevant enough to use, (b) how much of the conversation history fits
//! the model's token budget, (c) when and how to compress history via
//! summarization, and (d) how to assemble the final prompt
//! deterministically.
//!
//! # Per-query pipeline
//!
//! | Stage | Component | Outcome |
//! |-------|-----------|---------|
//! | 1. Length check | [`TokenAccountant`] | pass or `QuestionTooLong` |
//! | 2. Relevance gate | [`RetrievalGate`] | passages kept or dropped whole |
//! | 3. Budget check | [`ContextAssembler`] | normal, compacting, or `ConversationTooLong` |
//! | 4. Compaction | [`ConversationMemory`] | summary replaces older messages |
//! | 5. Assembly | [`ContextAssembler`] | ordered message list for generation |
//!
//! Assembly is deterministic: identical inputs always produce identical
//! outputs. No random or time-dependent logic participates in any budget
//! decision.

pub mod accountant;
pub mod assembler;
pub mod engine;
pub mod gate;
pub mod memory;
pub mod session;

pub use accountant::{BudgetReport, HeuristicTokenizer, TokenAccountant};
pub use assembler::{format_passages, AssembledContext, ContextAssembler, ContextUsage};
pub use engine::{ChatEngine, QueryOutcome, UsageDiagnostics, DEFAULT_SYSTEM_PROMPT};
pub use gate::RetrievalGate;
pub use memory::ConversationMemory;
pub use session::SessionRegistry;
