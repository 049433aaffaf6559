//! Tokenizer trait — the token counting capability.
//!
//! Token budgets only make sense when every count in a process run comes
//! from the same tokenizer; the trait is injected once at construction
//! and reused for all counting. Counting is pure: no side effects, same
//! input always yields the same count.

use crate::error::TokenizerError;

/// The token counting capability.
///
/// Implementations must be deterministic. If the underlying capability
/// is unavailable (e.g. an encoding failed to load), counting fails with
/// [`TokenizerError::Unavailable`] — callers must treat that as fatal for
/// the request rather than fall back to a naive character count, because
/// downstream budget comparisons depend on comparable units.
pub trait Tokenizer: Send + Sync {
    /// A human-readable name for this tokenizer (e.g., "heuristic").
    fn name(&self) -> &str;

    /// Count the tokens in a text span. Never negative; empty text is 0.
    fn count(&self, text: &str) -> std::result::Result<usize, TokenizerError>;
}
