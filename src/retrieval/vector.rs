//! Vector retrieval via an embedding provider and cosine similarity

use crate::providers::EmbeddingProvider;
use crate::retrieval::{RetrievalError, RetrievalResult};
use crate::storage::Chunk;
use std::sync::Arc;

/// Guards the cosine denominator against zero-magnitude vectors
const COSINE_EPSILON: f32 = 1e-8;

/// Embedding-based retriever over a request-scoped chunk set
#[derive(Default)]
pub struct VectorRetriever {
    provider: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<VectorIndex>,
}

struct VectorIndex {
    chunks: Vec<Chunk>,
    embeddings: Vec<Vec<f32>>,
}

impl VectorRetriever {
    pub fn new(provider: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self {
            provider,
            index: None,
        }
    }

    /// Build the vector index with one batched embedding call.
    ///
    /// Vectors are stored aligned by position with the chunk list.
    pub async fn build_index(&mut self, chunks: &[Chunk]) -> Result<(), RetrievalError> {
        let provider = self
            .provider
            .as_ref()
            .ok_or(RetrievalError::MissingProvider("embedding"))?;

        if chunks.is_empty() {
            return Err(RetrievalError::EmptyInput);
        }

        let contents: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let embeddings = provider.embed_many(&contents).await?;

        tracing::info!("Vector index built with {} embeddings", embeddings.len());

        self.index = Some(VectorIndex {
            chunks: chunks.to_vec(),
            embeddings,
        });

        Ok(())
    }

    /// Retrieve the `top_k` chunks by descending cosine similarity.
    ///
    /// Ties keep original chunk insertion order.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>, RetrievalError> {
        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }

        let index = self.index.as_ref().ok_or(RetrievalError::IndexNotBuilt)?;

        let provider = self
            .provider
            .as_ref()
            .ok_or(RetrievalError::MissingProvider("embedding"))?;

        let query_embedding = provider.embed_one(query).await?;

        let scores: Vec<f32> = index
            .embeddings
            .iter()
            .map(|embedding| cosine_similarity(&query_embedding, embedding))
            .collect();

        let mut order: Vec<usize> = (0..scores.len()).collect();
        // Stable sort keeps insertion order for equal scores
        order.sort_by(|a, b| {
            scores[*b]
                .partial_cmp(&scores[*a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order.truncate(top_k);

        let results: Vec<RetrievalResult> = order
            .into_iter()
            .map(|doc| RetrievalResult::from_chunk(&index.chunks[doc], scores[doc]))
            .collect();

        tracing::debug!("Vector retriever returned {} results", results.len());
        Ok(results)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (norm_a * norm_b + COSINE_EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderError;
    use crate::retrieval::test_support::chunk;
    use async_trait::async_trait;

    /// Maps known words to fixed unit vectors
    struct StubEmbedding;

    #[async_trait]
    impl EmbeddingProvider for StubEmbedding {
        async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            Ok(embed(text))
        }

        async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Ok(texts.iter().map(|t| embed(t)).collect())
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    fn embed(text: &str) -> Vec<f32> {
        if text.contains("cat") {
            vec![1.0, 0.0, 0.0]
        } else if text.contains("dog") {
            vec![0.0, 1.0, 0.0]
        } else {
            vec![0.0, 0.0, 1.0]
        }
    }

    #[tokio::test]
    async fn test_build_requires_provider() {
        let mut retriever = VectorRetriever::new(None);
        let result = retriever.build_index(&[chunk("1", "text")]).await;
        assert!(matches!(result, Err(RetrievalError::MissingProvider(_))));
    }

    #[tokio::test]
    async fn test_build_empty_chunks() {
        let mut retriever = VectorRetriever::new(Some(Arc::new(StubEmbedding)));
        let result = retriever.build_index(&[]).await;
        assert!(matches!(result, Err(RetrievalError::EmptyInput)));
    }

    #[tokio::test]
    async fn test_retrieve_before_build() {
        let retriever = VectorRetriever::new(Some(Arc::new(StubEmbedding)));
        let result = retriever.retrieve("query", 5).await;
        assert!(matches!(result, Err(RetrievalError::IndexNotBuilt)));
    }

    #[tokio::test]
    async fn test_similarity_ranking() {
        let mut retriever = VectorRetriever::new(Some(Arc::new(StubEmbedding)));
        let chunks = vec![
            chunk("1", "a dog barks"),
            chunk("2", "a cat purrs"),
            chunk("3", "unrelated text"),
        ];
        retriever.build_index(&chunks).await.unwrap();

        let results = retriever.retrieve("the cat", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_id, "2");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_empty_query() {
        let mut retriever = VectorRetriever::new(Some(Arc::new(StubEmbedding)));
        retriever.build_index(&[chunk("1", "text")]).await.unwrap();
        let result = retriever.retrieve("  ", 5).await;
        assert!(matches!(result, Err(RetrievalError::EmptyQuery)));
    }

    #[test]
    fn test_cosine_zero_vector_is_finite() {
        let similarity = cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]);
        assert!(similarity.is_finite());
        assert_eq!(similarity, 0.0);
    }
}
