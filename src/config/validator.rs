use crate::config::Config;
use crate::error::{RagError, Result, ValidationError};

/// Known provider backends per capability
const KNOWN_PROVIDERS: &[&str] = &["siliconflow"];

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_chunking(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_cache(config, &mut errors);
        Self::validate_providers(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RagError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }
    }

    fn validate_chunking(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.chunking.chunk_size == 0 {
            errors.push(ValidationError::new(
                "chunking.chunk_size",
                "Chunk size must be greater than 0",
            ));
        }

        if config.chunking.chunk_overlap >= config.chunking.chunk_size {
            errors.push(ValidationError::new(
                "chunking.chunk_overlap",
                "Chunk overlap must be smaller than chunk size",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.retrieval.default_top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.default_top_k",
                "default_top_k must be greater than 0",
            ));
        }
    }

    fn validate_cache(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.cache.enabled && config.cache.max_entries == 0 {
            errors.push(ValidationError::new(
                "cache.max_entries",
                "max_entries must be greater than 0 when the cache is enabled",
            ));
        }
    }

    fn validate_providers(config: &Config, errors: &mut Vec<ValidationError>) {
        // Provider names are checked here so a typo fails at configuration
        // time, not on the first search
        let sections = [
            ("embedding", config.embedding.enabled, &config.embedding.provider),
            ("reranker", config.reranker.enabled, &config.reranker.provider),
            ("llm", config.llm.enabled, &config.llm.provider),
        ];

        for (section, enabled, provider) in sections {
            if enabled && !KNOWN_PROVIDERS.contains(&provider.as_str()) {
                errors.push(ValidationError::new(
                    format!("{}.provider", section),
                    format!(
                        "Unknown provider '{}'. Supported: {}",
                        provider,
                        KNOWN_PROVIDERS.join(", ")
                    ),
                ));
            }
        }

        if config.embedding.enabled && config.embedding.api_key_env.is_empty() {
            errors.push(ValidationError::new(
                "embedding.api_key_env",
                "api_key_env cannot be empty when the provider is enabled",
            ));
        }

        if config.reranker.enabled && config.reranker.api_key_env.is_empty() {
            errors.push(ValidationError::new(
                "reranker.api_key_env",
                "api_key_env cannot be empty when the provider is enabled",
            ));
        }

        if config.llm.enabled {
            if config.llm.api_key_env.is_empty() {
                errors.push(ValidationError::new(
                    "llm.api_key_env",
                    "api_key_env cannot be empty when the provider is enabled",
                ));
            }
            if !(0.0..=2.0).contains(&config.llm.temperature) {
                errors.push(ValidationError::new(
                    "llm.temperature",
                    format!("Temperature out of range: {}", config.llm.temperature),
                ));
            }
        }
    }
}
