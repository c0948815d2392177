//! Text embedding backends.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ragline_shared::{ModelConfig, RaglineError, Result};

/// Turns text into dense vectors. Object-safe so stores and retrievers can
/// share one backend behind an `Arc`.
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order.
    fn embed(&self, texts: Vec<String>) -> BoxFuture<'_, Result<Vec<Vec<f32>>>>;
}

// ---------------------------------------------------------------------------
// OpenAI-compatible embeddings client
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EmbeddingsRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

/// Remote embedder speaking the OpenAI-compatible `/embeddings` API.
pub struct ApiEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl ApiEmbedder {
    /// Create a client, reading the API key from the env var named in config.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            RaglineError::config(format!(
                "model API key not found. Set the {} environment variable.",
                config.api_key_env
            ))
        })?;
        Ok(Self::with_api_key(config, api_key))
    }

    /// Create a client with an explicit API key (used by tests).
    pub fn with_api_key(config: &ModelConfig, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.embedding_model.clone(),
            api_key: api_key.into(),
        }
    }

    async fn request_embeddings(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let count = texts.len();
        let request = EmbeddingsRequest {
            model: self.model.clone(),
            input: texts,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RaglineError::Model(format!("embeddings request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RaglineError::Model(format!(
                "embeddings request failed with HTTP {status}: {body}"
            )));
        }

        let mut parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| RaglineError::Model(format!("invalid embeddings response: {e}")))?;

        if parsed.data.len() != count {
            return Err(RaglineError::Model(format!(
                "embeddings response has {} vectors for {count} inputs",
                parsed.data.len()
            )));
        }

        // The API may return items out of order; `index` is authoritative.
        parsed.data.sort_by_key(|item| item.index);
        debug!(count, model = %self.model, "embeddings computed");

        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }
}

impl Embedder for ApiEmbedder {
    fn embed(&self, texts: Vec<String>) -> BoxFuture<'_, Result<Vec<Vec<f32>>>> {
        Box::pin(async move {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            self.request_embeddings(texts).await
        })
    }
}
