//! Query rewriting with HyDE and query expansion

use crate::providers::LlmProvider;
use crate::retrieval::RetrievalError;
use std::sync::Arc;

const HYDE_MAX_TOKENS: u32 = 500;
const EXPANSION_MAX_TOKENS: u32 = 300;
const MAX_EXPANSIONS: usize = 3;

/// Outcome of one rewrite invocation
#[derive(Debug, Clone)]
pub struct QueryRewriteResult {
    pub original_query: String,
    /// Ordered query variants; the original query is always first
    pub rewritten_queries: Vec<String>,
    /// Hypothetical answer documents from the HyDE step
    pub hypothetical_docs: Vec<String>,
}

impl QueryRewriteResult {
    fn original_only(query: &str) -> Self {
        Self {
            original_query: query.to_string(),
            rewritten_queries: vec![query.to_string()],
            hypothetical_docs: Vec::new(),
        }
    }
}

/// Expands one query into several retrieval variants via an optional LLM.
///
/// Without a provider the original query passes through alone. The HyDE and
/// expansion steps fail independently; a failure in either is logged and
/// skipped, never surfaced.
#[derive(Default)]
pub struct QueryRewriter {
    provider: Option<Arc<dyn LlmProvider>>,
}

impl QueryRewriter {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>) -> Self {
        Self { provider }
    }

    /// Rewrite the query. Fails only with `EmptyQuery`.
    pub async fn rewrite(&self, query: &str) -> Result<QueryRewriteResult, RetrievalError> {
        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }

        let mut result = QueryRewriteResult::original_only(query);

        if let Some(provider) = self.provider.as_ref() {
            match self.hyde(provider.as_ref(), query).await {
                Ok(docs) => result.hypothetical_docs.extend(docs),
                Err(e) => tracing::warn!("HyDE rewriting failed: {}", e),
            }

            match self.expand(provider.as_ref(), query).await {
                Ok(expansions) => result.rewritten_queries.extend(expansions),
                Err(e) => tracing::warn!("Query expansion failed: {}", e),
            }
        }

        tracing::info!(
            "Query rewritten: {} queries, {} hypothetical docs",
            result.rewritten_queries.len(),
            result.hypothetical_docs.len()
        );

        Ok(result)
    }

    /// Rewrite, falling back to the original query on any failure.
    ///
    /// Never fails; the result always contains at least the original query.
    pub async fn rewrite_with_fallback(&self, query: &str) -> QueryRewriteResult {
        match self.rewrite(query).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Query rewriting failed, using original query: {}", e);
                QueryRewriteResult::original_only(query)
            }
        }
    }

    /// Draft a short hypothetical answer document for the query
    async fn hyde(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
    ) -> Result<Vec<String>, RetrievalError> {
        let prompt = format!(
            "Please write a short, informative document that would answer the following question.\n\
             The document should be concise and directly address the question.\n\n\
             Question: {}\n\n\
             Document:",
            query
        );

        let response = provider.generate(&prompt, HYDE_MAX_TOKENS).await?;
        let document = response.trim();

        if document.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![document.to_string()])
    }

    /// Ask for 2-3 alternative phrasings, newline-separated
    async fn expand(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
    ) -> Result<Vec<String>, RetrievalError> {
        let prompt = format!(
            "Generate 2-3 alternative phrasings or related queries for the following question.\n\
             Return only the queries, one per line, without numbering or additional text.\n\n\
             Original question: {}\n\n\
             Alternative queries:",
            query
        );

        let response = provider.generate(&prompt, EXPANSION_MAX_TOKENS).await?;

        Ok(response
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .take(MAX_EXPANSIONS)
            .map(|line| line.to_string())
            .collect())
    }
}
