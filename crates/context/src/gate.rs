//! Relevance gating of retrieved passages.
//!
//! The gate makes a whole-query decision: either the retrieved set is
//! relevant enough to ground an answer, or it isn't. Individual weak
//! matches inside an otherwise-relevant set are not pruned — per-passage
//! filtering is a documented-but-unimplemented enhancement.

use ragline_core::retrieval::RetrievedPassage;
use tracing::debug;

/// Accepts or rejects a ranked set of retrieved passages based on a
/// cosine-distance threshold (0 identical, 2 opposite).
///
/// Passages arrive pre-sorted by ascending distance from the retrieval
/// collaborator; the gate does not re-sort.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalGate {
    distance_threshold: f32,
}

impl RetrievalGate {
    pub fn new(distance_threshold: f32) -> Self {
        Self { distance_threshold }
    }

    /// If the set is empty, or its best (minimum) distance exceeds the
    /// threshold, return an empty set — "no relevant context". Otherwise
    /// the full input passes through unfiltered.
    ///
    /// Ties at exactly the threshold are accepted, never rejected, so
    /// floating-point jitter cannot flap the decision.
    pub fn filter(&self, passages: Vec<RetrievedPassage>) -> Vec<RetrievedPassage> {
        let best = passages
            .iter()
            .map(|p| p.distance)
            .fold(f32::INFINITY, f32::min);

        if passages.is_empty() || best > self.distance_threshold {
            debug!(
                best_distance = best,
                threshold = self.distance_threshold,
                "retrieval gate: no passage cleared the threshold"
            );
            return Vec::new();
        }

        debug!(
            best_distance = best,
            passages = passages.len(),
            "retrieval gate: set accepted"
        );
        passages
    }
}
