//! Chunk store for knowledge bases
//!
//! Structured storage for knowledge bases, documents and their chunks, plus
//! the `DocumentStore` trait the search pipeline consumes.

pub mod database;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use database::{Database, DbPool, DbStats};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Knowledge base not found: {kb_id}")]
    KnowledgeBaseNotFound { kb_id: String },

    #[error("Document not found: {doc_id}")]
    DocumentNotFound { doc_id: String },

    #[error("Knowledge base already exists: {name}")]
    DuplicateKnowledgeBase { name: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },
}

/// A stored text chunk, the input unit of the retrieval pipeline.
///
/// Chunks are owned by the store; the pipeline only reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk ID, stable across all pipeline stages
    pub id: String,

    /// Chunk text
    pub content: String,

    /// Owning document ID
    pub doc_id: String,

    /// Owning document display name
    pub doc_name: String,
}

/// A knowledge base record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Unix timestamp of creation
    pub created_at: i64,
}

/// A document record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub kb_id: String,
    pub name: String,
    pub chunk_count: usize,
    /// Unix timestamp of creation
    pub created_at: i64,
}

/// Read access to a knowledge base's chunks, as consumed by the search
/// pipeline.
pub trait DocumentStore: Send + Sync {
    /// Fetch all chunks belonging to a knowledge base.
    ///
    /// Returns an empty list for a known but empty knowledge base, and
    /// `StoreError::KnowledgeBaseNotFound` for an unknown id.
    fn fetch_chunks(&self, kb_id: &str) -> Result<Vec<Chunk>, StoreError>;
}
