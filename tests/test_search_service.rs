//! Integration test: search orchestration over a sqlite-backed store

use async_trait::async_trait;
use ragdoc::cache::QueryCache;
use ragdoc::providers::{LlmProvider, ProviderError, RerankerProvider, TextStream};
use ragdoc::search::{SearchError, SearchService};
use ragdoc::storage::Database;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Reranker that records every candidate batch and returns identity order
struct RecordingReranker {
    batches: Mutex<Vec<Vec<String>>>,
}

impl RecordingReranker {
    fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
        }
    }

    fn recorded(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl RerankerProvider for RecordingReranker {
    async fn rerank(
        &self,
        _query: &str,
        candidates: &[String],
        top_k: usize,
    ) -> Result<Vec<(usize, f32)>, ProviderError> {
        self.batches.lock().unwrap().push(candidates.to_vec());

        Ok((0..candidates.len())
            .map(|index| (index, 1.0 - index as f32 * 0.01))
            .take(top_k)
            .collect())
    }
}

struct CannedLlm(String);

#[async_trait]
impl LlmProvider for CannedLlm {
    async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String, ProviderError> {
        Ok(self.0.clone())
    }

    async fn generate_stream(&self, _prompt: &str) -> Result<TextStream, ProviderError> {
        let response = self.0.clone();
        Ok(Box::pin(futures::stream::once(async move { Ok(response) })))
    }
}

fn seeded_store() -> (TempDir, Database, String) {
    let temp = TempDir::new().unwrap();
    let db = Database::new(&temp.path().join("test.sqlite")).unwrap();

    let kb = db.create_knowledge_base("animals", None).unwrap();
    db.insert_document(
        &kb.id,
        "pets.txt",
        &[
            "the cat sat on the mat".to_string(),
            "dogs bark loudly at night".to_string(),
            "cats chase mice around the house".to_string(),
            "parrots repeat what they hear".to_string(),
        ],
    )
    .unwrap();

    (temp, db, kb.id)
}

#[tokio::test]
async fn test_search_returns_ranked_results() {
    let (_temp, db, kb_id) = seeded_store();
    let service = SearchService::new(Arc::new(db), None, None, None);

    let response = service.search(&kb_id, "cat mat", 2).await.unwrap();

    assert_eq!(response.query, "cat mat");
    assert_eq!(response.total_count, response.results.len());
    assert!(response.results.len() <= 2);
    assert_eq!(response.results[0].content, "the cat sat on the mat");
    assert_eq!(response.results[0].doc_name, "pets.txt");
    assert!(response.rewritten_query.is_none());
}

#[tokio::test]
async fn test_search_empty_query_rejected() {
    let (_temp, db, kb_id) = seeded_store();
    let service = SearchService::new(Arc::new(db), None, None, None);

    let outcome = service.search(&kb_id, "   ", 5).await;
    assert!(matches!(outcome, Err(SearchError::EmptyQuery)));
}

#[tokio::test]
async fn test_search_unknown_knowledge_base() {
    let (_temp, db, _kb_id) = seeded_store();
    let service = SearchService::new(Arc::new(db), None, None, None);

    let outcome = service.search("nope", "query", 5).await;
    assert!(matches!(
        outcome,
        Err(SearchError::KnowledgeBaseNotFound { .. })
    ));
}

#[tokio::test]
async fn test_search_empty_knowledge_base_is_not_an_error() {
    let temp = TempDir::new().unwrap();
    let db = Database::new(&temp.path().join("test.sqlite")).unwrap();
    let kb = db.create_knowledge_base("empty", None).unwrap();

    let service = SearchService::new(Arc::new(db), None, None, None);
    let response = service.search(&kb.id, "anything", 5).await.unwrap();

    assert!(response.results.is_empty());
    assert_eq!(response.total_count, 0);
}

#[tokio::test]
async fn test_search_oversamples_for_the_reranker() {
    let (_temp, db, kb_id) = seeded_store();
    let reranker = Arc::new(RecordingReranker::new());

    let service = SearchService::new(Arc::new(db), None, Some(reranker.clone()), None);
    let response = service.search(&kb_id, "cat", 1).await.unwrap();

    assert_eq!(response.results.len(), 1);

    // The reranker saw a wider pool than top_k
    let batches = reranker.recorded();
    assert_eq!(batches.len(), 1);
    assert!(batches[0].len() > 1);
}

#[tokio::test]
async fn test_search_with_rewrite_deduplicates_candidates() {
    let (_temp, db, kb_id) = seeded_store();
    let reranker = Arc::new(RecordingReranker::new());
    // Both expansions overlap heavily with the original query's results
    let llm = Arc::new(CannedLlm("cat mat\ncats mice".to_string()));

    let service = SearchService::new(
        Arc::new(db),
        None,
        Some(reranker.clone()),
        Some(llm),
    );

    let response = service.search_with_rewrite(&kb_id, "cat mat", 3).await.unwrap();

    assert!(!response.results.is_empty());

    let rewritten = response.rewritten_query.unwrap();
    assert!(rewritten.starts_with("cat mat | "));
    assert_eq!(rewritten.matches(" | ").count(), 2);

    // The merged pre-rerank pool contains each chunk exactly once
    let batches = reranker.recorded();
    assert_eq!(batches.len(), 1);
    let mut contents = batches[0].clone();
    let before = contents.len();
    contents.sort();
    contents.dedup();
    assert_eq!(contents.len(), before, "candidate pool contains duplicates");
}

#[tokio::test]
async fn test_search_with_rewrite_without_llm_uses_original_query() {
    let (_temp, db, kb_id) = seeded_store();
    let service = SearchService::new(Arc::new(db), None, None, None);

    let response = service.search_with_rewrite(&kb_id, "cat mat", 2).await.unwrap();

    assert_eq!(response.rewritten_query.as_deref(), Some("cat mat"));
    assert!(!response.results.is_empty());
}

#[tokio::test]
async fn test_results_capped_at_top_k() {
    let (_temp, db, kb_id) = seeded_store();
    let service = SearchService::new(Arc::new(db), None, None, None);

    let response = service.search(&kb_id, "the cat dogs mice", 2).await.unwrap();
    assert!(response.results.len() <= 2);
}

#[tokio::test]
async fn test_cache_serves_repeat_queries() {
    let (_temp, db, kb_id) = seeded_store();

    let service = SearchService::new(Arc::new(db.clone()), None, None, None)
        .with_cache(QueryCache::new(100, Duration::from_secs(3600)));

    let first = service.search(&kb_id, "cat mat", 2).await.unwrap();

    // Grow the corpus after the first search; a cached response ignores it
    db.insert_document(&kb_id, "more.txt", &["another cat mat text".to_string()])
        .unwrap();

    let second = service.search(&kb_id, "cat mat", 2).await.unwrap();

    assert_eq!(first.results.len(), second.results.len());
    for (a, b) in first.results.iter().zip(second.results.iter()) {
        assert_eq!(a.chunk_id, b.chunk_id);
        assert_eq!(a.score, b.score);
    }
}
