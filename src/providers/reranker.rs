//! HTTP cross-encoder reranking provider (/rerank endpoint)

use crate::providers::{response_error, ProviderError, RerankerProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Silicon Flow reranker provider
pub struct SiliconFlowReranker {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl SiliconFlowReranker {
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

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    /// (query, candidate) pairs
    input: Vec<[&'a str; 2]>,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankEntry>,
}

#[derive(Deserialize)]
struct RerankEntry {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    score: f32,
}

#[async_trait]
impl RerankerProvider for SiliconFlowReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: &[String],
        top_k: usize,
    ) -> Result<Vec<(usize, f32)>, ProviderError> {
        if query.trim().is_empty() {
            return Err(ProviderError::InvalidInput(
                "Query cannot be empty".to_string(),
            ));
        }

        if candidates.is_empty() {
            return Err(ProviderError::InvalidInput(
                "Candidates list cannot be empty".to_string(),
            ));
        }

        let request = RerankRequest {
            model: &self.model,
            input: candidates
                .iter()
                .map(|candidate| [query, candidate.as_str()])
                .collect(),
        };

        let response = self
            .client
            .post(format!("{}/rerank", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_error(response).await);
        }

        let mut body: RerankResponse = response.json().await?;

        body.results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        body.results.truncate(top_k);

        Ok(body
            .results
            .into_iter()
            .map(|entry| (entry.index, entry.score))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> SiliconFlowReranker {
        SiliconFlowReranker::new(
            "https://api.siliconflow.cn/v1",
            "key",
            "BAAI/bge-reranker-large",
            Duration::from_secs(30),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_rejects_empty_query() {
        let result = provider().rerank("", &["text".to_string()], 5).await;
        assert!(matches!(result, Err(ProviderError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_rejects_empty_candidates() {
        let result = provider().rerank("query", &[], 5).await;
        assert!(matches!(result, Err(ProviderError::InvalidInput(_))));
    }
}
