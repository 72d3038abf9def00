//! Cross-encoder reranking with degrade-on-error semantics

use crate::providers::RerankerProvider;
use crate::retrieval::{RetrievalError, RetrievalResult};
use std::sync::Arc;

/// Reranker over an optional provider.
///
/// Without a provider, or when the provider fails, candidates pass through
/// in their original order. Reranking is an optimization, never a hard
/// dependency.
#[derive(Default)]
pub struct Reranker {
    provider: Option<Arc<dyn RerankerProvider>>,
}

impl Reranker {
    pub fn new(provider: Option<Arc<dyn RerankerProvider>>) -> Self {
        Self { provider }
    }

    /// Rerank candidates against the query.
    ///
    /// Fails with `EmptyQuery`/`EmptyCandidates` on invalid input. A missing
    /// provider or a provider failure degrades to the first `top_k`
    /// candidates unchanged.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: &[RetrievalResult],
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>, RetrievalError> {
        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }

        if candidates.is_empty() {
            return Err(RetrievalError::EmptyCandidates);
        }

        let Some(provider) = self.provider.as_ref() else {
            tracing::warn!("Reranker provider not set, returning original results");
            return Ok(candidates.iter().take(top_k).cloned().collect());
        };

        let texts: Vec<String> = candidates
            .iter()
            .map(|candidate| candidate.content.clone())
            .collect();

        match provider.rerank(query, &texts, top_k).await {
            Ok(ranked) => {
                let reranked: Vec<RetrievalResult> = ranked
                    .into_iter()
                    .filter(|(index, _)| *index < candidates.len())
                    .map(|(index, score)| candidates[index].with_score(score))
                    .collect();

                tracing::debug!("Reranked {} results", reranked.len());
                Ok(reranked)
            }
            Err(e) => {
                tracing::error!("Reranking failed, using original results: {}", e);
                Ok(candidates.iter().take(top_k).cloned().collect())
            }
        }
    }

    /// Rerank, falling back to the first `top_k` candidates on any error.
    ///
    /// Never fails, including on empty input or a provider that always
    /// throws.
    pub async fn rerank_with_fallback(
        &self,
        query: &str,
        candidates: &[RetrievalResult],
        top_k: usize,
    ) -> Vec<RetrievalResult> {
        match self.rerank(query, candidates, top_k).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!("Reranking failed, using original results: {}", e);
                candidates.iter().take(top_k).cloned().collect()
            }
        }
    }
}
