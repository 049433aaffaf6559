//! Document chunking.
//!
//! Documents are split into fixed-size word windows with overlap so a
//! fact straddling a boundary still lands whole in at least one chunk.
//! Chunks below the minimum character size are dropped as noise; a
//! document whose every chunk falls below the minimum is indexed as a
//! single whole-document chunk rather than vanishing.

use ragline_config::RetrievalConfig;
use sha2::{Digest, Sha256};

/// One chunk of a source document, ready for embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub index: usize,
    pub total_chunks: usize,
}

/// Deterministic chunk id: `{source}_chunk_{index}_{sha256(text)[..16]}`.
///
/// Re-ingesting identical content yields identical ids, so an index
/// rebuild is idempotent.
pub fn chunk_id(source: &str, text: &str, index: usize) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut hash = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        hash.push_str(&format!("{:02x}", byte));
    }
    format!("{}_chunk_{}_{}", source, index, hash)
}

/// Fixed-size word chunker with overlap.
#[derive(Debug, Clone)]
pub struct Chunker {
    /// Window size in words.
    chunk_size: usize,
    /// Words shared between consecutive chunks.
    chunk_overlap: usize,
    /// Minimum chunk size in characters.
    min_chunk_chars: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize, min_chunk_chars: usize) -> Self {
        // A degenerate overlap would make the window stop advancing.
        let chunk_overlap = chunk_overlap.min(chunk_size.saturating_sub(1));
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
            min_chunk_chars,
        }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap, config.min_chunk_chars)
    }

    /// Split `text` into overlapping chunks.
    ///
    /// Returns an empty vec only for blank input. Whitespace runs are
    /// collapsed; original formatting inside a chunk is not preserved.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let mut texts = Vec::new();
        let step = self.chunk_size - self.chunk_overlap;
        let mut start = 0;
        while start < words.len() {
            let end = (start + self.chunk_size).min(words.len());
            texts.push(words[start..end].join(" "));
            if end == words.len() {
                break;
            }
            start += step;
        }

        texts.retain(|t| t.len() >= self.min_chunk_chars);
        if texts.is_empty() {
            // Everything was under the minimum; keep the document whole.
            texts.push(words.join(" "));
        }

        let total = texts.len();
        texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                text,
                index,
                total_chunks: total,
            })
            .collect()
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::from_config(&RetrievalConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn short_document_is_one_chunk() {
        let chunker = Chunker::new(512, 50, 10);
        let chunks = chunker.chunk(&words(100));

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].total_chunks, 1);
    }

    #[test]
    fn blank_document_yields_no_chunks() {
        let chunker = Chunker::default();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n\t  ").is_empty());
    }

    #[test]
    fn long_document_chunks_with_overlap() {
        let chunker = Chunker::new(100, 20, 10);
        let chunks = chunker.chunk(&words(250));

        // Windows start at 0, 80, 160, 240.
        assert_eq!(chunks.len(), 4);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.total_chunks, 4);
        }

        // Consecutive chunks share the overlap region.
        let first: Vec<&str> = chunks[0].text.split(' ').collect();
        let second: Vec<&str> = chunks[1].text.split(' ').collect();
        assert_eq!(&first[80..], &second[..20]);
    }

    #[test]
    fn undersized_chunks_fall_back_to_whole_document() {
        // Every window is far below the 10_000-char minimum, so the
        // whole document survives as one chunk instead of vanishing.
        let chunker = Chunker::new(10, 2, 10_000);
        let chunks = chunker.chunk(&words(50));

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, words(50));
    }

    #[test]
    fn chunk_ids_are_deterministic_and_distinct() {
        let a = chunk_id("manual.pdf", "some chunk text", 0);
        let b = chunk_id("manual.pdf", "some chunk text", 0);
        let c = chunk_id("manual.pdf", "other chunk text", 1);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("manual.pdf_chunk_0_"));
        // 16 hex chars of the content hash.
        assert_eq!(a.rsplit('_').next().map(str::len), Some(16));
    }

    #[test]
    fn overlap_clamped_below_chunk_size() {
        // Overlap >= size must not stall the window.
        let chunker = Chunker::new(10, 10, 1);
        let chunks = chunker.chunk(&words(30));
        assert!(chunks.len() >= 3);
    }
}
