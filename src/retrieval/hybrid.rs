//! Hybrid retrieval combining BM25 and vector search

use crate::providers::EmbeddingProvider;
use crate::retrieval::{
    fuse, Bm25Retriever, RetrievalError, RetrievalResult, VectorRetriever, DEFAULT_RRF_K,
};
use crate::storage::Chunk;
use std::sync::Arc;

/// Orchestrates lexical and vector retrieval over one chunk set.
///
/// Lexical retrieval always runs; vector retrieval runs when an embedding
/// provider is bound and degrades to lexical-only on failure.
pub struct HybridRetriever {
    bm25: Bm25Retriever,
    vector: VectorRetriever,
    has_embedding_provider: bool,
}

impl HybridRetriever {
    pub fn new(embedding_provider: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self {
            bm25: Bm25Retriever::new(),
            has_embedding_provider: embedding_provider.is_some(),
            vector: VectorRetriever::new(embedding_provider),
        }
    }

    /// Build both indices.
    ///
    /// The vector index is only built when an embedding provider is bound;
    /// an embedding failure during the build leaves the vector index unbuilt
    /// and retrieval lexical-only. Fails with `EmptyInput` before
    /// delegating.
    pub async fn build_index(&mut self, chunks: &[Chunk]) -> Result<(), RetrievalError> {
        if chunks.is_empty() {
            return Err(RetrievalError::EmptyInput);
        }

        self.bm25.build_index(chunks)?;

        if self.has_embedding_provider {
            if let Err(e) = self.vector.build_index(chunks).await {
                tracing::warn!("Vector index build failed, continuing with BM25 only: {}", e);
            }
        }

        Ok(())
    }

    /// Retrieve `top_k` results.
    ///
    /// Runs lexical retrieval, optionally vector retrieval, and fuses the
    /// two rankings with RRF when both exist. Vector failure logs a warning
    /// and leaves the lexical ranking in effect.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        use_vector: bool,
    ) -> Result<Vec<RetrievalResult>, RetrievalError> {
        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }

        let bm25_results = self.bm25.retrieve(query, top_k)?;

        let mut vector_results = Vec::new();
        if use_vector && self.has_embedding_provider {
            match self.vector.retrieve(query, top_k).await {
                Ok(results) => vector_results = results,
                Err(e) => {
                    tracing::warn!("Vector retrieval failed, using BM25 only: {}", e);
                }
            }
        }

        if vector_results.is_empty() {
            let mut results = bm25_results;
            results.truncate(top_k);
            return Ok(results);
        }

        let mut fused = fuse(&bm25_results, &vector_results, DEFAULT_RRF_K)?;
        fused.truncate(top_k);
        Ok(fused)
    }
}
