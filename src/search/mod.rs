//! Search orchestration over a knowledge base
//!
//! Binds a knowledge base's stored chunks to the retrieval pipeline:
//! optional query rewriting, hybrid retrieval with oversampling, reranking
//! with fallback, and response assembly.

use crate::cache::QueryCache;
use crate::providers::{EmbeddingProvider, LlmProvider, RerankerProvider};
use crate::retrieval::{
    HybridRetriever, QueryRewriter, Reranker, RetrievalError, RetrievalResult,
};
use crate::storage::{Chunk, DocumentStore, StoreError};
use futures::future;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Candidates retrieved per query before reranking, as a multiple of top_k
const OVERSAMPLE_FACTOR: usize = 2;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Query cannot be empty")]
    EmptyQuery,

    #[error("Knowledge base not found: {kb_id}")]
    KnowledgeBaseNotFound { kb_id: String },

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
}

impl From<StoreError> for SearchError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::KnowledgeBaseNotFound { kb_id } => {
                SearchError::KnowledgeBaseNotFound { kb_id }
            }
            other => SearchError::Store(other),
        }
    }
}

/// Terminal output of the pipeline for one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<RetrievalResult>,
    pub total_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewritten_query: Option<String>,
}

impl SearchResponse {
    fn empty(query: &str, rewritten_query: Option<String>) -> Self {
        Self {
            query: query.to_string(),
            results: Vec::new(),
            total_count: 0,
            rewritten_query,
        }
    }
}

/// Search service over a chunk store and optional providers.
///
/// Indices are request-scoped: every search builds a fresh hybrid retriever
/// over the knowledge base's current chunks, so there is no cross-request
/// index state to invalidate.
pub struct SearchService {
    store: Arc<dyn DocumentStore>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    reranker: Reranker,
    rewriter: QueryRewriter,
    cache: Option<QueryCache>,
}

impl SearchService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
        reranker_provider: Option<Arc<dyn RerankerProvider>>,
        llm_provider: Option<Arc<dyn LlmProvider>>,
    ) -> Self {
        Self {
            store,
            embedding_provider,
            reranker: Reranker::new(reranker_provider),
            rewriter: QueryRewriter::new(llm_provider),
            cache: None,
        }
    }

    /// Attach a query cache owned by this service
    pub fn with_cache(mut self, cache: QueryCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Execute a search.
    ///
    /// Retrieves at twice `top_k` to widen the reranker's pool, then reranks
    /// down to `top_k`. An empty knowledge base yields an empty response,
    /// not an error.
    pub async fn search(
        &self,
        kb_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<SearchResponse, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        if let Some(hit) = self.cache_get("search", kb_id, query, top_k) {
            return Ok(hit);
        }

        let chunks = self.store.fetch_chunks(kb_id)?;
        if chunks.is_empty() {
            tracing::warn!("No chunks found in knowledge base {}", kb_id);
            return Ok(SearchResponse::empty(query, None));
        }

        let retriever = self.build_retriever(&chunks).await?;

        let candidates = retriever
            .retrieve(
                query,
                top_k * OVERSAMPLE_FACTOR,
                self.embedding_provider.is_some(),
            )
            .await?;

        let results = self
            .reranker
            .rerank_with_fallback(query, &candidates, top_k)
            .await;

        tracing::info!("Search completed: {} results", results.len());

        let response = SearchResponse {
            query: query.to_string(),
            total_count: results.len(),
            results,
            rewritten_query: None,
        };

        self.cache_put("search", kb_id, query, top_k, &response);
        Ok(response)
    }

    /// Execute a search with query rewriting.
    ///
    /// Fans hybrid retrieval out over every rewritten query (the index is
    /// built once), merges the per-query rankings in rewritten-query order
    /// with first-seen-wins deduplication, and reranks the pool against the
    /// original query.
    pub async fn search_with_rewrite(
        &self,
        kb_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<SearchResponse, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        if let Some(hit) = self.cache_get("rewrite", kb_id, query, top_k) {
            return Ok(hit);
        }

        let rewrite = self.rewriter.rewrite_with_fallback(query).await;

        let chunks = self.store.fetch_chunks(kb_id)?;
        if chunks.is_empty() {
            tracing::warn!("No chunks found in knowledge base {}", kb_id);
            return Ok(SearchResponse::empty(query, Some(query.to_string())));
        }

        let retriever = self.build_retriever(&chunks).await?;
        let use_vector = self.embedding_provider.is_some();

        // Branches are independent reads of the shared index; join_all keeps
        // the merge in rewritten-query order, not completion order
        let lookups = rewrite
            .rewritten_queries
            .iter()
            .map(|rewritten| retriever.retrieve(rewritten, top_k * OVERSAMPLE_FACTOR, use_vector));
        let outcomes = future::join_all(lookups).await;

        let mut pooled: Vec<RetrievalResult> = Vec::new();
        for (rewritten, outcome) in rewrite.rewritten_queries.iter().zip(outcomes) {
            match outcome {
                Ok(batch) => pooled.extend(batch),
                Err(e) => {
                    tracing::warn!("Error retrieving with query {:?}: {}", rewritten, e);
                }
            }
        }

        // First occurrence of each chunk wins
        let mut seen: HashSet<String> = HashSet::new();
        let unique: Vec<RetrievalResult> = pooled
            .into_iter()
            .filter(|result| seen.insert(result.chunk_id.clone()))
            .collect();

        let results = self
            .reranker
            .rerank_with_fallback(query, &unique, top_k)
            .await;

        tracing::info!("Search with rewrite completed: {} results", results.len());

        let response = SearchResponse {
            query: query.to_string(),
            total_count: results.len(),
            results,
            rewritten_query: Some(rewrite.rewritten_queries.join(" | ")),
        };

        self.cache_put("rewrite", kb_id, query, top_k, &response);
        Ok(response)
    }

    async fn build_retriever(&self, chunks: &[Chunk]) -> Result<HybridRetriever, SearchError> {
        let mut retriever = HybridRetriever::new(self.embedding_provider.clone());
        retriever.build_index(chunks).await?;
        Ok(retriever)
    }

    fn cache_get(
        &self,
        mode: &str,
        kb_id: &str,
        query: &str,
        top_k: usize,
    ) -> Option<SearchResponse> {
        self.cache.as_ref()?.get(mode, kb_id, query, top_k)
    }

    fn cache_put(
        &self,
        mode: &str,
        kb_id: &str,
        query: &str,
        top_k: usize,
        response: &SearchResponse,
    ) {
        if let Some(cache) = self.cache.as_ref() {
            cache.put(mode, kb_id, query, top_k, response.clone());
        }
    }
}
