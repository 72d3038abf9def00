//! Hybrid retrieval and reranking pipeline
//!
//! BM25 and vector retrieval over a request-scoped chunk set, combined with
//! Reciprocal Rank Fusion, optionally reranked by a cross-encoder provider
//! and widened by LLM query rewriting. Provider failures degrade (vector to
//! lexical-only, reranking to input order, rewriting to the original query);
//! precondition violations are returned to the caller.

mod bm25;
mod fusion;
mod hybrid;
mod reranker;
mod rewriter;
mod vector;

pub use bm25::Bm25Retriever;
pub use fusion::{fuse, DEFAULT_RRF_K};
pub use hybrid::HybridRetriever;
pub use reranker::Reranker;
pub use rewriter::{QueryRewriteResult, QueryRewriter};
pub use vector::VectorRetriever;

use crate::providers::ProviderError;
use crate::storage::Chunk;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Chunk set is empty, nothing to index")]
    EmptyInput,

    #[error("Query cannot be empty")]
    EmptyQuery,

    #[error("Index not built, call build_index first")]
    IndexNotBuilt,

    #[error("No {0} provider bound")]
    MissingProvider(&'static str),

    #[error("Candidates list cannot be empty")]
    EmptyCandidates,

    #[error("Provider call failed: {0}")]
    Provider(#[from] ProviderError),
}

/// A scored passage produced by a retrieval, fusion or reranking stage.
///
/// Each stage constructs fresh results carrying its own score kind (BM25,
/// cosine similarity, RRF or reranker relevance); `chunk_id` stays stable
/// across stages so results can be correlated, fused and deduplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk_id: String,
    pub doc_id: String,
    pub doc_name: String,
    pub content: String,
    pub score: f32,
}

impl RetrievalResult {
    /// Build a result from a stored chunk with a stage score
    pub fn from_chunk(chunk: &Chunk, score: f32) -> Self {
        Self {
            chunk_id: chunk.id.clone(),
            doc_id: chunk.doc_id.clone(),
            doc_name: chunk.doc_name.clone(),
            content: chunk.content.clone(),
            score,
        }
    }

    /// Copy of this result with a different score
    pub fn with_score(&self, score: f32) -> Self {
        Self {
            score,
            ..self.clone()
        }
    }
}

/// Lowercase whitespace tokenization shared by the lexical retriever and its
/// query path. No stemming, no stop words.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|token| token.to_string())
        .collect()
}
