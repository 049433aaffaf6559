//! Retrieval traits — vector search and embedding capabilities.
//!
//! The context manager consumes retrieval results; it never owns the
//! vector store or the embedding model. Both are trait seams so the
//! store can be in-process, remote, or a test stub.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::RetrievalError;

/// A passage retrieved from the vector store for one query.
///
/// Produced per query, consumed once during context assembly, never
/// stored by the context manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// The passage text.
    pub text: String,

    /// Cosine distance from the query (0 identical, 2 opposite).
    /// Lower is more similar; always non-negative.
    pub distance: f32,

    /// Source metadata (filename, chunk index, etc.).
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl RetrievedPassage {
    /// The human-readable source label, if the store recorded one.
    pub fn source(&self) -> &str {
        self.metadata
            .get("source")
            .map(String::as_str)
            .unwrap_or("unknown")
    }
}

/// The vector search capability: embed a query and return the nearest
/// passages, sorted by ascending distance.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// A human-readable name for this retriever.
    fn name(&self) -> &str;

    /// Return up to `top_k` passages nearest to `query`, most similar
    /// first.
    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> std::result::Result<Vec<RetrievedPassage>, RetrievalError>;
}

/// The embedding capability.
///
/// Implementations wrap an embedding model (local or remote). The same
/// embedder must be used for indexing and querying a given store.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// A human-readable name for this embedder.
    fn name(&self) -> &str;

    /// Embed each input text into a vector. Output order matches input.
    async fn embed(
        &self,
        texts: &[String],
    ) -> std::result::Result<Vec<Vec<f32>>, RetrievalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passage_source_falls_back_to_unknown() {
        let passage = RetrievedPassage {
            text: "some text".into(),
            distance: 0.4,
            metadata: HashMap::new(),
        };
        assert_eq!(passage.source(), "unknown");
    }

    #[test]
    fn passage_serialization_roundtrip() {
        let mut metadata = HashMap::new();
        metadata.insert("source".to_string(), "manual.pdf".to_string());
        let passage = RetrievedPassage {
            text: "warranty terms".into(),
            distance: 0.31,
            metadata,
        };
        let json = serde_json::to_string(&passage).unwrap();
        let back: RetrievedPassage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.source(), "manual.pdf");
        assert!((back.distance - 0.31).abs() < f32::EPSILON);
    }
}
