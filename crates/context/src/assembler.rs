//! Per-query prompt assembly.
//!
//! The assembler orchestrates the accountant and conversation memory for
//! one query: it rejects oversized questions before any other work,
//! computes token pressure, triggers compaction when the summarize
//! threshold is crossed, enforces the hard token limit, and builds the
//! final ordered message list. It does not call the generation
//! capability itself — the caller does, and appends the exchange on
//! success.
//!
//! # Algorithm
//!
//! 1. `query_tokens > question_threshold × token_limit` → `QuestionTooLong`
//! 2. Project total tokens = system + summary + history + context + query
//! 3. Total ≥ `summarize_threshold × token_limit` with more than the
//!    retention window of messages → compact, recompute
//! 4. Total still ≥ `token_limit` → `ConversationTooLong`
//! 5. Assemble: system prompt → summary (if any) → recent history →
//!    user turn `(retrieved context, query)`

use ragline_config::TokenBudget;
use ragline_core::error::ContextError;
use ragline_core::message::ChatMessage;
use ragline_core::retrieval::RetrievedPassage;
use ragline_core::summarizer::Summarizer;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::accountant::TokenAccountant;
use crate::memory::ConversationMemory;

/// Instruction appended to the user turn when retrieved context is
/// present, pinning the model to the grounding contract.
const GROUNDING_REMINDER: &str = "Remember: If the answer is not fully contained in the context, \
reply ONLY with 'I don't have enough information to answer this question.'";

/// Token usage breakdown for one assembled request.
///
/// `total_tokens` is the count of the messages actually assembled
/// (including the user-turn formatting), so it can exceed the sum of the
/// raw component counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextUsage {
    pub query_tokens: usize,
    pub system_tokens: usize,
    pub context_tokens: usize,
    pub summary_tokens: usize,
    pub history_tokens: usize,
    pub total_tokens: usize,
    pub token_limit: usize,
}

/// The final ordered message list for generation, plus diagnostics.
/// Transient — never persisted.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    /// System prompt → summary (if any) → recent history → user turn.
    pub messages: Vec<ChatMessage>,
    /// Token accounting for this request.
    pub usage: ContextUsage,
    /// Whether this request triggered a history compaction.
    pub compacted: bool,
}

/// Assembles the per-query prompt under a fixed token budget.
/// Stateless between queries — create one and reuse it.
pub struct ContextAssembler {
    budget: TokenBudget,
    system_prompt: String,
    accountant: TokenAccountant,
}

impl ContextAssembler {
    pub fn new(
        budget: TokenBudget,
        system_prompt: impl Into<String>,
        accountant: TokenAccountant,
    ) -> Self {
        Self {
            budget,
            system_prompt: system_prompt.into(),
            accountant,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn budget(&self) -> &TokenBudget {
        &self.budget
    }

    /// Reject a question that exceeds the question-fraction budget.
    ///
    /// This runs before retrieval, history access, or any generation
    /// call — an oversized input must not cost retrieval or LLM work.
    /// Returns the query's token count when it passes.
    pub fn question_guard(&self, query: &str) -> Result<usize, ContextError> {
        let tokens = self.accountant.count(query)?;
        let limit = self.budget.question_limit();
        if tokens > limit {
            return Err(ContextError::QuestionTooLong { tokens, limit });
        }
        Ok(tokens)
    }

    /// Run the budget pipeline and build the final message list.
    ///
    /// `passages` must already have passed the retrieval gate; an empty
    /// slice means the user turn carries the bare query and downstream
    /// generation answers from history alone or states it lacks
    /// information.
    pub async fn assemble(
        &self,
        memory: &mut ConversationMemory,
        query: &str,
        passages: &[RetrievedPassage],
        summarizer: &dyn Summarizer,
    ) -> Result<AssembledContext, ContextError> {
        // Step 1 — question length guard (re-checked here so the
        // property holds on every entry path).
        let query_tokens = self.question_guard(query)?;

        let context_text = format_passages(passages);

        // Step 2 — projected token pressure.
        let system_tokens = self.accountant.count(&self.system_prompt)?;
        let context_tokens = self.accountant.count(&context_text)?;
        let mut summary_tokens = self.count_summary(memory)?;
        let mut history_tokens = self.accountant.count_history(memory.history())?;
        let projected =
            system_tokens + summary_tokens + history_tokens + context_tokens + query_tokens;

        debug!(
            query_tokens,
            system_tokens,
            context_tokens,
            history_tokens,
            history_messages = memory.len(),
            projected,
            "token pressure computed"
        );

        // Step 3 — compaction when over the summarize threshold and the
        // history holds more than the retention window.
        let retain = self.budget.retained_messages;
        let mut compacted = false;
        if projected >= self.budget.summarize_limit() && memory.len() > retain {
            debug!(
                projected,
                summarize_limit = self.budget.summarize_limit(),
                "summarize threshold crossed, compacting history"
            );
            memory.mark_needs_summarization();
            compacted = memory.compact(summarizer, retain).await?;

            summary_tokens = self.count_summary(memory)?;
            history_tokens = self.accountant.count_history(memory.history())?;
            debug!(summary_tokens, history_tokens, "history recounted after compaction");
        }

        // Step 5 — assemble the ordered message list.
        let mut messages = Vec::with_capacity(memory.len() + 3);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        if let Some(summary) = memory.summary_message() {
            messages.push(summary);
        }
        messages.extend(memory.history().iter().cloned());
        messages.push(ChatMessage::user(format_user_turn(query, &context_text)));

        // Step 4 — hard limit on what would actually be sent. Exactly
        // equal to the limit counts as over-budget.
        let total_tokens = self.accountant.count_history(&messages)?;
        if total_tokens >= self.budget.token_limit {
            return Err(ContextError::ConversationTooLong {
                tokens: total_tokens,
                limit: self.budget.token_limit,
            });
        }

        debug!(total_tokens, compacted, "context assembled");

        Ok(AssembledContext {
            messages,
            usage: ContextUsage {
                query_tokens,
                system_tokens,
                context_tokens,
                summary_tokens,
                history_tokens,
                total_tokens,
                token_limit: self.budget.token_limit,
            },
            compacted,
        })
    }

    fn count_summary(&self, memory: &ConversationMemory) -> Result<usize, ContextError> {
        match memory.summary_message() {
            Some(msg) => self.accountant.count(&msg.content),
            None => Ok(0),
        }
    }
}

/// Render gated passages as the context block of the user turn.
/// An empty set renders as an empty string, not a placeholder.
pub fn format_passages(passages: &[RetrievedPassage]) -> String {
    if passages.is_empty() {
        return String::new();
    }

    let mut out = String::from("Relevant findings:\n\n");
    for (i, passage) in passages.iter().enumerate() {
        out.push_str(&format!("Source {}: {}\n", i + 1, passage.source()));
        out.push_str(&format!("Content:\n{}\n\n", passage.text));
    }
    out
}

fn format_user_turn(query: &str, context_text: &str) -> String {
    if context_text.is_empty() {
        return query.to_string();
    }
    format!(
        "Context:\n{}\n\nQuestion: {}\n\n{}",
        context_text, query, GROUNDING_REMINDER
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accountant::HeuristicTokenizer;
    use async_trait::async_trait;
    use ragline_core::error::ProviderError;
    use ragline_core::message::Role;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubSummarizer {
        calls: AtomicUsize,
    }

    impl StubSummarizer {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Summarizer for StubSummarizer {
        fn name(&self) -> &str {
            "stub"
        }

        async fn summarize(&self, _transcript: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("Earlier the user explored topic A.".into())
        }
    }

    /// Assembler with a 1-token system prompt and the default budget
    /// (limit 8000, summarize at 5600, question cap 1600, retain 6).
    fn assembler() -> ContextAssembler {
        ContextAssembler::new(
            TokenBudget::default(),
            "sys",
            TokenAccountant::new(Arc::new(HeuristicTokenizer)),
        )
    }

    /// A message whose content is exactly `tokens` heuristic tokens.
    fn sized_message(role: Role, tokens: usize) -> ChatMessage {
        let content = "a".repeat(tokens * 4);
        match role {
            Role::User => ChatMessage::user(content),
            Role::Assistant => ChatMessage::assistant(content),
            Role::System => ChatMessage::system(content),
        }
    }

    fn memory_with_sized_messages(count: usize, tokens_each: usize) -> ConversationMemory {
        let mut memory = ConversationMemory::new();
        for i in 0..count {
            let role = if i % 2 == 0 {
                Role::User
            } else {
                Role::Assistant
            };
            memory.append(sized_message(role, tokens_each));
        }
        memory
    }

    fn passage(distance: f32, text: &str) -> RetrievedPassage {
        let mut metadata = HashMap::new();
        metadata.insert("source".to_string(), "doc.pdf".to_string());
        RetrievedPassage {
            text: text.to_string(),
            distance,
            metadata,
        }
    }

    #[tokio::test]
    async fn empty_session_bare_query() {
        let asm = assembler();
        let mut memory = ConversationMemory::new();

        let ctx = asm
            .assemble(&mut memory, "hello", &[], &StubSummarizer::new())
            .await
            .unwrap();

        assert_eq!(ctx.messages.len(), 2);
        assert_eq!(ctx.messages[0].role, Role::System);
        assert_eq!(ctx.messages[0].content, "sys");
        assert_eq!(ctx.messages[1].role, Role::User);
        assert_eq!(ctx.messages[1].content, "hello");
        assert!(!ctx.compacted);
    }

    #[tokio::test]
    async fn retrieved_context_wraps_user_turn() {
        let asm = assembler();
        let mut memory = ConversationMemory::new();
        let passages = vec![passage(0.3, "The warranty lasts two years.")];

        let ctx = asm
            .assemble(&mut memory, "hello", &passages, &StubSummarizer::new())
            .await
            .unwrap();

        let user_turn = &ctx.messages.last().unwrap().content;
        assert!(user_turn.starts_with("Context:\nRelevant findings:"));
        assert!(user_turn.contains("Source 1: doc.pdf"));
        assert!(user_turn.contains("Question: hello"));
        assert!(user_turn.contains("I don't have enough information"));
    }

    #[tokio::test]
    async fn oversized_question_rejected_before_anything_else() {
        let asm = assembler();
        let mut memory = ConversationMemory::new();
        let query = "q".repeat(1601 * 4); // 1601 tokens > 1600 cap
        let summarizer = StubSummarizer::new();

        let err = asm
            .assemble(&mut memory, &query, &[], &summarizer)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ContextError::QuestionTooLong {
                tokens: 1601,
                limit: 1600
            }
        ));
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn over_threshold_triggers_exactly_one_compaction() {
        let asm = assembler();
        // 8 messages × 700 tokens = 5600 projected history, over the
        // 5600 summarize limit and above the 6-message floor.
        let mut memory = memory_with_sized_messages(8, 700);
        let summarizer = StubSummarizer::new();

        let ctx = asm
            .assemble(&mut memory, "hi", &[], &summarizer)
            .await
            .unwrap();

        assert!(ctx.compacted);
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(memory.len(), 6);
        // system + summary + 6 retained + user turn
        assert_eq!(ctx.messages.len(), 9);
        assert!(ctx.messages[1].content.starts_with("Previous conversation summary:"));
        assert!(ctx.usage.total_tokens < ctx.usage.token_limit);
    }

    #[tokio::test]
    async fn under_threshold_does_not_compact() {
        let asm = assembler();
        // 8 × 600 = 4800 projected history, under the 5600 limit.
        let mut memory = memory_with_sized_messages(8, 600);
        let summarizer = StubSummarizer::new();

        let ctx = asm
            .assemble(&mut memory, "hi", &[], &summarizer)
            .await
            .unwrap();

        assert!(!ctx.compacted);
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(memory.len(), 8);
        assert_eq!(ctx.messages.len(), 10);
    }

    #[tokio::test]
    async fn total_exactly_at_limit_is_over_budget() {
        let asm = assembler();
        // 6 messages × 1100 = 6600; system 1; query 1399 → exactly 8000.
        // Only 6 messages, so compaction cannot run.
        let mut memory = memory_with_sized_messages(6, 1100);
        let query = "q".repeat(1399 * 4);

        let err = asm
            .assemble(&mut memory, &query, &[], &StubSummarizer::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ContextError::ConversationTooLong {
                tokens: 8000,
                limit: 8000
            }
        ));
        // No partial mutation: history untouched, no summary materialized.
        assert_eq!(memory.len(), 6);
        assert!(memory.summary().is_none());
    }

    #[tokio::test]
    async fn one_token_under_limit_succeeds() {
        let asm = assembler();
        let mut memory = memory_with_sized_messages(6, 1100);
        let query = "q".repeat(1398 * 4); // total 7999

        let ctx = asm
            .assemble(&mut memory, &query, &[], &StubSummarizer::new())
            .await
            .unwrap();

        assert_eq!(ctx.usage.total_tokens, 7999);
    }

    #[tokio::test]
    async fn failed_summarizer_propagates_without_mutation() {
        struct FailingSummarizer;

        #[async_trait]
        impl Summarizer for FailingSummarizer {
            fn name(&self) -> &str {
                "failing"
            }

            async fn summarize(&self, _t: &str) -> Result<String, ProviderError> {
                Err(ProviderError::Network("connection refused".into()))
            }
        }

        let asm = assembler();
        let mut memory = memory_with_sized_messages(8, 700);

        let err = asm
            .assemble(&mut memory, "hi", &[], &FailingSummarizer)
            .await
            .unwrap_err();

        assert!(matches!(err, ContextError::SummarizationFailed(_)));
        assert_eq!(memory.len(), 8);
        assert!(memory.summary().is_none());
        // The flag survives so a retry re-attempts compaction.
        assert!(memory.needs_summarization());
    }

    #[tokio::test]
    async fn assembly_is_deterministic() {
        let asm = assembler();
        let mut memory = memory_with_sized_messages(4, 10);
        let passages = vec![passage(0.2, "fact one"), passage(0.8, "fact two")];
        let summarizer = StubSummarizer::new();

        let a = asm
            .assemble(&mut memory, "what is fact one?", &passages, &summarizer)
            .await
            .unwrap();
        let b = asm
            .assemble(&mut memory, "what is fact one?", &passages, &summarizer)
            .await
            .unwrap();

        let contents = |ctx: &AssembledContext| {
            ctx.messages
                .iter()
                .map(|m| m.content.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(contents(&a), contents(&b));
        assert_eq!(a.usage.total_tokens, b.usage.total_tokens);
    }

    #[test]
    fn format_passages_empty_is_empty() {
        assert!(format_passages(&[]).is_empty());
    }
}
