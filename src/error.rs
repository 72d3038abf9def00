use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the ragdoc application
#[derive(Error, Debug)]
pub enum RagError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Chunk store errors
    #[error("Store error: {0}")]
    Store(#[from] crate::storage::StoreError),

    /// Retrieval pipeline errors
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] crate::retrieval::RetrievalError),

    /// Search orchestration errors
    #[error("Search error: {0}")]
    Search(#[from] crate::search::SearchError),

    /// External provider errors
    #[error("Provider error: {0}")]
    Provider(#[from] crate::providers::ProviderError),

    /// Document ingestion errors
    #[error("Ingest error: {0}")]
    Ingest(#[from] crate::ingest::IngestError),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for ragdoc operations
pub type Result<T> = std::result::Result<T, RagError>;
