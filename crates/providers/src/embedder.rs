//! OpenAI-compatible embedding adapter.
//!
//! Backs the [`Embedder`] seam with a hosted `/embeddings` endpoint.
//! The same embedder instance must serve both indexing and querying a
//! given store, so distances stay comparable.

use async_trait::async_trait;
use ragline_config::AppConfig;
use ragline_core::error::RetrievalError;
use ragline_core::retrieval::Embedder;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Embedding client for any OpenAI-compatible `/embeddings` route.
#[derive(Debug)]
pub struct OpenAiCompatEmbedder {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatEmbedder {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        }
    }

    /// Create an OpenAI embedder (convenience constructor).
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key, model)
    }

    /// Build the embedder from config, using the embedding model named
    /// in the retrieval section.
    pub fn from_config(config: &AppConfig) -> Result<Self, RetrievalError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            RetrievalError::EmbeddingFailed("no API key configured for embeddings".into())
        })?;
        Ok(Self::openai(api_key, config.retrieval.embedding_model.clone()))
    }
}

#[async_trait]
impl Embedder for OpenAiCompatEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
            "encoding_format": "float",
        });

        debug!(embedder = %self.name, model = %self.model, count = texts.len(), "Sending embedding request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrievalError::EmbeddingFailed(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::EmbeddingFailed(format!(
                "embedding endpoint returned {status}: {error_body}"
            )));
        }

        let api_resp: EmbeddingApiResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::EmbeddingFailed(format!("malformed response: {e}")))?;

        if api_resp.data.len() != texts.len() {
            return Err(RetrievalError::EmbeddingFailed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                api_resp.data.len()
            )));
        }

        // The API may return entries out of order; the index field is
        // authoritative.
        let mut data = api_resp.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}
