//! Hosted provider clients for embedding, reranking and text generation
//!
//! Each capability is a trait so the retrieval pipeline can be driven by any
//! conforming backend; one HTTP implementation ships per capability. The
//! factory maps the configured backend name to a constructor and rejects
//! unknown names at configuration time, not at call time.

mod embedding;
mod llm;
mod reranker;

pub use embedding::SiliconFlowEmbedding;
pub use llm::SiliconFlowLlm;
pub use reranker::SiliconFlowReranker;

use crate::config::{EmbeddingConfig, LlmConfig, RerankerConfig};
use crate::error::RagError;
use async_trait::async_trait;
use futures::Stream;
use serde::Deserialize;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Finite stream of generated text fragments; not restartable
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// Capability: turn text into embedding vectors
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Generate embeddings for multiple texts in one batched call
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Embedding dimension of the configured model
    fn dimension(&self) -> usize;

    /// Model name
    fn model_name(&self) -> &str;
}

/// Capability: cross-encoder relevance scoring of (query, candidate) pairs
#[async_trait]
pub trait RerankerProvider: Send + Sync {
    /// Score candidates against the query.
    ///
    /// Returns `(original_index, relevance_score)` pairs sorted descending by
    /// score, truncated to `top_k`.
    async fn rerank(
        &self,
        query: &str,
        candidates: &[String],
        top_k: usize,
    ) -> Result<Vec<(usize, f32)>, ProviderError>;
}

/// Capability: text generation
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for the prompt
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError>;

    /// Stream a completion as text fragments
    async fn generate_stream(&self, prompt: &str) -> Result<TextStream, ProviderError>;
}

/// Builds providers from configuration.
///
/// A disabled section yields `None`; an unknown backend name is a
/// configuration error.
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn embedding(
        config: &EmbeddingConfig,
    ) -> crate::Result<Option<Arc<dyn EmbeddingProvider>>> {
        if !config.enabled {
            return Ok(None);
        }

        match config.provider.as_str() {
            "siliconflow" => {
                let provider = SiliconFlowEmbedding::new(
                    &config.base_url,
                    &Self::api_key(&config.api_key_env)?,
                    &config.model,
                    Duration::from_secs(config.timeout_secs),
                )
                .map_err(|e| RagError::Config(e.to_string()))?;
                Ok(Some(Arc::new(provider)))
            }
            other => Err(RagError::Config(format!(
                "Unsupported embedding provider: {}",
                other
            ))),
        }
    }

    pub fn reranker(config: &RerankerConfig) -> crate::Result<Option<Arc<dyn RerankerProvider>>> {
        if !config.enabled {
            return Ok(None);
        }

        match config.provider.as_str() {
            "siliconflow" => {
                let provider = SiliconFlowReranker::new(
                    &config.base_url,
                    &Self::api_key(&config.api_key_env)?,
                    &config.model,
                    Duration::from_secs(config.timeout_secs),
                )
                .map_err(|e| RagError::Config(e.to_string()))?;
                Ok(Some(Arc::new(provider)))
            }
            other => Err(RagError::Config(format!(
                "Unsupported reranker provider: {}",
                other
            ))),
        }
    }

    pub fn llm(config: &LlmConfig) -> crate::Result<Option<Arc<dyn LlmProvider>>> {
        if !config.enabled {
            return Ok(None);
        }

        match config.provider.as_str() {
            "siliconflow" => {
                let provider = SiliconFlowLlm::new(
                    &config.base_url,
                    &Self::api_key(&config.api_key_env)?,
                    &config.model,
                    config.temperature,
                    config.max_tokens,
                    Duration::from_secs(config.timeout_secs),
                )
                .map_err(|e| RagError::Config(e.to_string()))?;
                Ok(Some(Arc::new(provider)))
            }
            other => Err(RagError::Config(format!(
                "Unsupported LLM provider: {}",
                other
            ))),
        }
    }

    fn api_key(env_name: &str) -> crate::Result<String> {
        let key = std::env::var(env_name).map_err(|_| {
            RagError::Config(format!(
                "API key environment variable {} is not set",
                env_name
            ))
        })?;

        if key.trim().is_empty() {
            return Err(RagError::Config(format!(
                "API key environment variable {} is empty",
                env_name
            )));
        }

        Ok(key)
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Extract an error message from a failed API response
pub(crate) async fn response_error(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let message = match response.json::<ApiErrorBody>().await {
        Ok(body) => body
            .error
            .map(|e| e.message)
            .unwrap_or_else(|| format!("API error: {}", status)),
        Err(_) => format!("API error: {}", status),
    };

    ProviderError::Api { status, message }
}
