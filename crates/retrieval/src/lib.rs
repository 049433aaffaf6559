//! Ragline retrieval — document chunking and an in-process vector store.
//!
//! Indexing splits documents into overlapping chunks with deterministic
//! ids, embeds them through the injected [`ragline_core::retrieval::Embedder`],
//! and serves nearest-neighbour queries by cosine distance through the
//! [`ragline_core::retrieval::Retriever`] seam. Relevance gating lives
//! upstream in the context pipeline; the store just ranks.

pub mod chunk;
pub mod store;

pub use chunk::{chunk_id, Chunk, Chunker};
pub use store::{cosine_distance, DocumentInfo, InMemoryVectorStore};
