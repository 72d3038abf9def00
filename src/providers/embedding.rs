//! HTTP embedding provider (OpenAI-compatible /embeddings endpoint)

use crate::providers::{response_error, EmbeddingProvider, ProviderError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Supported models and their embedding dimensions
const EMBEDDING_DIMENSIONS: &[(&str, usize)] = &[
    ("BAAI/bge-large-zh-v1.5", 1024),
    ("BAAI/bge-base-zh-v1.5", 768),
    ("BAAI/bge-small-zh-v1.5", 512),
];

/// Silicon Flow embedding provider
pub struct SiliconFlowEmbedding {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl SiliconFlowEmbedding {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::InvalidInput(
                "API key cannot be empty".to_string(),
            ));
        }

        let dimension = EMBEDDING_DIMENSIONS
            .iter()
            .find(|(name, _)| *name == model)
            .map(|(_, dim)| *dim)
            .ok_or_else(|| {
                let supported: Vec<&str> =
                    EMBEDDING_DIMENSIONS.iter().map(|(name, _)| *name).collect();
                ProviderError::InvalidInput(format!(
                    "Unsupported model: {}. Supported: {}",
                    model,
                    supported.join(", ")
                ))
            })?;

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            dimension,
        })
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for SiliconFlowEmbedding {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidInput(
                "Text cannot be empty".to_string(),
            ));
        }

        let mut embeddings = self.embed_many(&[text.to_string()]).await?;
        if embeddings.is_empty() {
            return Err(ProviderError::MalformedResponse(
                "No embeddings in response".to_string(),
            ));
        }

        Ok(embeddings.remove(0))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Err(ProviderError::InvalidInput(
                "Texts list cannot be empty".to_string(),
            ));
        }

        if texts.iter().all(|t| t.trim().is_empty()) {
            return Err(ProviderError::InvalidInput(
                "All texts are empty".to_string(),
            ));
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_error(response).await);
        }

        let mut body: EmbeddingResponse = response.json().await?;
        if body.data.is_empty() {
            return Err(ProviderError::MalformedResponse(
                "No embeddings in response".to_string(),
            ));
        }

        // The API does not guarantee entry order
        body.data.sort_by_key(|entry| entry.index);

        Ok(body.data.into_iter().map(|entry| entry.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
