//! In-process vector store.
//!
//! Holds embedded chunks in memory and serves nearest-neighbour queries
//! by cosine distance. Indexing and querying must go through the same
//! [`Embedder`], or distances are meaningless. Built for corpora that
//! fit in RAM; search is a linear scan.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ragline_core::error::RetrievalError;
use ragline_core::retrieval::{Embedder, RetrievedPassage, Retriever};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::chunk::{chunk_id, Chunker};

/// Cosine distance between two vectors: `1 - cosine_similarity`, in
/// [0, 2] where 0 = identical direction and 2 = opposite.
///
/// Mismatched lengths, empty vectors, and zero vectors are treated as
/// maximally unrelated (orthogonal, distance 1).
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 1.0;
    }

    (1.0 - dot / denom) as f32
}

/// Summary of one indexed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub source: String,
    pub chunks: usize,
    pub ingested_at: DateTime<Utc>,
}

struct StoredChunk {
    id: String,
    source: String,
    text: String,
    embedding: Vec<f32>,
    metadata: HashMap<String, String>,
}

#[derive(Default)]
struct StoreInner {
    chunks: Vec<StoredChunk>,
    documents: HashMap<String, DocumentInfo>,
}

/// In-memory vector store over an injected embedder.
pub struct InMemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    inner: RwLock<StoreInner>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>, chunker: Chunker) -> Self {
        Self {
            embedder,
            chunker,
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Chunk, embed, and index one document. Returns the chunk count.
    ///
    /// A source name can be indexed only once; delete it first to
    /// replace its content. Blank documents index zero chunks.
    pub async fn add_document(&self, source: &str, text: &str) -> Result<usize, RetrievalError> {
        if self.inner.read().await.documents.contains_key(source) {
            return Err(RetrievalError::DuplicateDocument(source.to_string()));
        }

        let chunks = self.chunker.chunk(text);
        if chunks.is_empty() {
            debug!(source, "document is blank, nothing to index");
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(RetrievalError::EmbeddingFailed(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let mut inner = self.inner.write().await;
        // Re-check under the write lock: a concurrent upload of the same
        // source may have won the race.
        if inner.documents.contains_key(source) {
            return Err(RetrievalError::DuplicateDocument(source.to_string()));
        }

        let count = chunks.len();
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            let mut metadata = HashMap::new();
            metadata.insert("source".to_string(), source.to_string());
            metadata.insert("chunk_index".to_string(), chunk.index.to_string());
            metadata.insert("total_chunks".to_string(), chunk.total_chunks.to_string());
            inner.chunks.push(StoredChunk {
                id: chunk_id(source, &chunk.text, chunk.index),
                source: source.to_string(),
                text: chunk.text,
                embedding,
                metadata,
            });
        }
        inner.documents.insert(
            source.to_string(),
            DocumentInfo {
                source: source.to_string(),
                chunks: count,
                ingested_at: Utc::now(),
            },
        );

        info!(source, chunks = count, "document indexed");
        Ok(count)
    }

    /// Remove a document and all its chunks. Returns the chunk count.
    pub async fn delete_document(&self, source: &str) -> Result<usize, RetrievalError> {
        let mut inner = self.inner.write().await;
        let info = inner
            .documents
            .remove(source)
            .ok_or_else(|| RetrievalError::NotFound(source.to_string()))?;
        inner.chunks.retain(|c| c.source != source);

        info!(source, chunks = info.chunks, "document removed");
        Ok(info.chunks)
    }

    /// All indexed documents, sorted by source name.
    pub async fn list_documents(&self) -> Vec<DocumentInfo> {
        let inner = self.inner.read().await;
        let mut docs: Vec<DocumentInfo> = inner.documents.values().cloned().collect();
        docs.sort_by(|a, b| a.source.cmp(&b.source));
        docs
    }

    /// Drop every document and chunk. Returns the number of documents
    /// removed.
    pub async fn clear(&self) -> usize {
        let mut inner = self.inner.write().await;
        let removed = inner.documents.len();
        inner.chunks.clear();
        inner.documents.clear();
        if removed > 0 {
            info!(documents = removed, "vector store cleared");
        }
        removed
    }

    pub async fn chunk_count(&self) -> usize {
        self.inner.read().await.chunks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.chunks.is_empty()
    }
}

#[async_trait]
impl Retriever for InMemoryVectorStore {
    fn name(&self) -> &str {
        "in_memory_vector_store"
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let inner = self.inner.read().await;
        if inner.chunks.is_empty() {
            // An empty index is a legitimate state, not an error.
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(std::slice::from_ref(&query.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                RetrievalError::EmbeddingFailed("embedder returned no vector for query".into())
            })?;

        let mut scored: Vec<(f32, &StoredChunk)> = inner
            .chunks
            .iter()
            .map(|chunk| (cosine_distance(&query_embedding, &chunk.embedding), chunk))
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        debug!(
            query_len = query.len(),
            results = scored.len(),
            best_distance = scored.first().map(|(d, _)| *d),
            "vector search complete"
        );

        Ok(scored
            .into_iter()
            .map(|(distance, chunk)| {
                let mut metadata = chunk.metadata.clone();
                metadata.insert("id".to_string(), chunk.id.clone());
                RetrievedPassage {
                    text: chunk.text.clone(),
                    distance,
                    metadata,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic embedder: counts occurrences of the marker words
    /// "alpha", "beta", "gamma", so related texts land near each other.
    struct CountingEmbedder;

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn name(&self) -> &str {
            "counting"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
            Ok(texts
                .iter()
                .map(|t| {
                    vec![
                        t.matches("alpha").count() as f32,
                        t.matches("beta").count() as f32,
                        t.matches("gamma").count() as f32,
                    ]
                })
                .collect())
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        fn name(&self) -> &str {
            "broken"
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
            Err(RetrievalError::EmbeddingFailed("model offline".into()))
        }
    }

    fn store() -> InMemoryVectorStore {
        // No minimum so short test documents index as-is.
        InMemoryVectorStore::new(Arc::new(CountingEmbedder), Chunker::new(512, 50, 0))
    }

    #[test]
    fn distance_identical_is_zero() {
        let v = vec![1.0, 2.0, 3.0];
        assert!(cosine_distance(&v, &v).abs() < 1e-6);
    }

    #[test]
    fn distance_opposite_is_two() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_distance(&a, &b) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn distance_orthogonal_is_one() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_vectors_read_as_unrelated() {
        assert_eq!(cosine_distance(&[], &[]), 1.0);
        assert_eq!(cosine_distance(&[1.0, 2.0], &[1.0]), 1.0);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 2.0]), 1.0);
    }

    #[tokio::test]
    async fn search_ranks_by_ascending_distance() {
        let store = store();
        store
            .add_document("a.txt", "alpha alpha alpha")
            .await
            .unwrap();
        store.add_document("b.txt", "beta beta beta").await.unwrap();
        store
            .add_document("mixed.txt", "alpha beta gamma")
            .await
            .unwrap();

        let results = store.search("alpha alpha", 10).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].source(), "a.txt");
        assert!(results[0].distance < results[1].distance);
        assert!(results[1].distance <= results[2].distance);
    }

    #[tokio::test]
    async fn search_respects_top_k() {
        let store = store();
        for i in 0..5 {
            store
                .add_document(&format!("doc{}.txt", i), "alpha beta")
                .await
                .unwrap();
        }

        let results = store.search("alpha", 2).await.unwrap();
        assert_eq!(results.len(), 2);

        let none = store.search("alpha", 0).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn empty_store_returns_no_results() {
        let store = store();
        let results = store.search("anything", 3).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn duplicate_source_is_rejected() {
        let store = store();
        store.add_document("doc.txt", "alpha").await.unwrap();

        let err = store.add_document("doc.txt", "beta").await.unwrap_err();

        assert!(matches!(err, RetrievalError::DuplicateDocument(s) if s == "doc.txt"));
        assert_eq!(store.chunk_count().await, 1);
    }

    #[tokio::test]
    async fn delete_removes_document_chunks() {
        let store = store();
        store.add_document("keep.txt", "alpha").await.unwrap();
        store.add_document("drop.txt", "beta").await.unwrap();

        let removed = store.delete_document("drop.txt").await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.chunk_count().await, 1);

        let results = store.search("beta", 10).await.unwrap();
        assert!(results.iter().all(|p| p.source() != "drop.txt"));

        let err = store.delete_document("drop.txt").await.unwrap_err();
        assert!(matches!(err, RetrievalError::NotFound(_)));
    }

    #[tokio::test]
    async fn clear_empties_everything() {
        let store = store();
        store.add_document("a.txt", "alpha").await.unwrap();
        store.add_document("b.txt", "beta").await.unwrap();

        assert_eq!(store.clear().await, 2);
        assert!(store.is_empty().await);
        assert!(store.list_documents().await.is_empty());
        // Clearing an empty store is fine.
        assert_eq!(store.clear().await, 0);
    }

    #[tokio::test]
    async fn list_documents_sorted_with_chunk_counts() {
        let store = store();
        store.add_document("b.txt", "beta").await.unwrap();
        store.add_document("a.txt", "alpha").await.unwrap();

        let docs = store.list_documents().await;
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source, "a.txt");
        assert_eq!(docs[1].source, "b.txt");
        assert_eq!(docs[0].chunks, 1);
    }

    #[tokio::test]
    async fn passages_carry_chunk_metadata() {
        let store = store();
        store.add_document("doc.txt", "alpha beta").await.unwrap();

        let results = store.search("alpha", 1).await.unwrap();
        let passage = &results[0];

        assert_eq!(passage.source(), "doc.txt");
        assert_eq!(passage.metadata.get("chunk_index").map(String::as_str), Some("0"));
        assert!(passage
            .metadata
            .get("id")
            .is_some_and(|id| id.starts_with("doc.txt_chunk_0_")));
    }

    #[tokio::test]
    async fn embedder_failure_surfaces_and_indexes_nothing() {
        let store = InMemoryVectorStore::new(Arc::new(BrokenEmbedder), Chunker::new(512, 50, 0));

        let err = store.add_document("doc.txt", "alpha").await.unwrap_err();

        assert!(matches!(err, RetrievalError::EmbeddingFailed(_)));
        assert!(store.is_empty().await);
        assert!(store.list_documents().await.is_empty());
    }
}
