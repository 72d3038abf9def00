//! Lexical retrieval with Okapi BM25

use crate::retrieval::{tokenize, RetrievalError, RetrievalResult};
use crate::storage::Chunk;
use ahash::AHashMap;

const K1: f32 = 1.5;
const B: f32 = 0.75;
/// Negative idf values are floored at EPSILON times the average idf
const EPSILON: f32 = 0.25;

/// BM25 keyword retriever over a request-scoped chunk set
#[derive(Default)]
pub struct Bm25Retriever {
    index: Option<Bm25Index>,
}

struct Bm25Index {
    chunks: Vec<Chunk>,
    term_freqs: Vec<AHashMap<String, f32>>,
    idf: AHashMap<String, f32>,
    doc_lens: Vec<f32>,
    avgdl: f32,
}

impl Bm25Retriever {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the BM25 index.
    ///
    /// Chunks with empty or whitespace-only content are discarded; fails with
    /// `EmptyInput` when nothing indexable remains.
    pub fn build_index(&mut self, chunks: &[Chunk]) -> Result<(), RetrievalError> {
        if chunks.is_empty() {
            return Err(RetrievalError::EmptyInput);
        }

        let mut kept: Vec<Chunk> = Vec::new();
        let mut tokenized: Vec<Vec<String>> = Vec::new();

        for chunk in chunks {
            if chunk.content.trim().is_empty() {
                continue;
            }
            tokenized.push(tokenize(&chunk.content));
            kept.push(chunk.clone());
        }

        if kept.is_empty() {
            return Err(RetrievalError::EmptyInput);
        }

        let doc_count = kept.len();
        let mut term_freqs: Vec<AHashMap<String, f32>> = Vec::with_capacity(doc_count);
        let mut doc_freq: AHashMap<String, usize> = AHashMap::new();
        let mut doc_lens: Vec<f32> = Vec::with_capacity(doc_count);

        for tokens in &tokenized {
            doc_lens.push(tokens.len() as f32);

            let mut freqs: AHashMap<String, f32> = AHashMap::new();
            for token in tokens {
                *freqs.entry(token.clone()).or_insert(0.0) += 1.0;
            }
            for term in freqs.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            term_freqs.push(freqs);
        }

        let avgdl = doc_lens.iter().sum::<f32>() / doc_count as f32;

        // Okapi idf with the rank-bm25 floor: terms appearing in more than
        // half the corpus get EPSILON times the average idf instead of a
        // negative value.
        let mut idf: AHashMap<String, f32> = AHashMap::with_capacity(doc_freq.len());
        let mut idf_sum = 0.0f32;
        let mut negative_terms: Vec<String> = Vec::new();

        for (term, df) in &doc_freq {
            let value =
                (doc_count as f32 - *df as f32 + 0.5).ln() - (*df as f32 + 0.5).ln();
            idf_sum += value;
            if value < 0.0 {
                negative_terms.push(term.clone());
            }
            idf.insert(term.clone(), value);
        }

        let average_idf = idf_sum / idf.len() as f32;
        let floor = EPSILON * average_idf;
        for term in negative_terms {
            idf.insert(term, floor);
        }

        tracing::info!("BM25 index built with {} chunks", doc_count);

        self.index = Some(Bm25Index {
            chunks: kept,
            term_freqs,
            idf,
            doc_lens,
            avgdl,
        });

        Ok(())
    }

    /// Retrieve the `top_k` chunks by descending BM25 score.
    ///
    /// Ties keep original chunk insertion order. Returns the whole corpus
    /// when `top_k` exceeds it.
    pub fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>, RetrievalError> {
        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }

        let index = self.index.as_ref().ok_or(RetrievalError::IndexNotBuilt)?;

        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }

        let scores: Vec<f32> = (0..index.chunks.len())
            .map(|doc| index.score(&query_tokens, doc))
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

        tracing::debug!("BM25 retrieved {} results", results.len());
        Ok(results)
    }
}

impl Bm25Index {
    /// Query tokens are a multiset: repeated terms contribute repeatedly
    fn score(&self, query_tokens: &[String], doc: usize) -> f32 {
        let freqs = &self.term_freqs[doc];
        let dl = self.doc_lens[doc];

        query_tokens
            .iter()
            .map(|token| {
                let Some(idf) = self.idf.get(token) else {
                    return 0.0;
                };
                let tf = freqs.get(token).copied().unwrap_or(0.0);
                idf * (tf * (K1 + 1.0)) / (tf + K1 * (1.0 - B + B * dl / self.avgdl))
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::test_support::chunk;

    #[test]
    fn test_build_index_empty_chunks() {
        let mut retriever = Bm25Retriever::new();
        let result = retriever.build_index(&[]);
        assert!(matches!(result, Err(RetrievalError::EmptyInput)));
    }

    #[test]
    fn test_build_index_all_whitespace() {
        let mut retriever = Bm25Retriever::new();
        let chunks = vec![chunk("1", "   "), chunk("2", "\n\t")];
        let result = retriever.build_index(&chunks);
        assert!(matches!(result, Err(RetrievalError::EmptyInput)));
    }

    #[test]
    fn test_retrieve_before_build() {
        let retriever = Bm25Retriever::new();
        let result = retriever.retrieve("query", 5);
        assert!(matches!(result, Err(RetrievalError::IndexNotBuilt)));
    }

    #[test]
    fn test_retrieve_empty_query() {
        let mut retriever = Bm25Retriever::new();
        retriever.build_index(&[chunk("1", "some text")]).unwrap();
        let result = retriever.retrieve("   ", 5);
        assert!(matches!(result, Err(RetrievalError::EmptyQuery)));
    }

    #[test]
    fn test_keyword_match_ranks_first() {
        let mut retriever = Bm25Retriever::new();
        let chunks = vec![
            chunk("1", "the cat sat on the mat"),
            chunk("2", "dogs bark loudly"),
        ];
        retriever.build_index(&chunks).unwrap();

        let results = retriever.retrieve("cat mat", 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_id, "1");
    }

    #[test]
    fn test_matching_terms_score_higher() {
        let mut retriever = Bm25Retriever::new();
        let chunks = vec![
            chunk("1", "the cat sat on the mat"),
            chunk("2", "dogs bark loudly"),
            chunk("3", "birds sing in the morning"),
        ];
        retriever.build_index(&chunks).unwrap();

        let results = retriever.retrieve("cat mat", 3).unwrap();
        assert_eq!(results[0].chunk_id, "1");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_top_k_caps_results() {
        let mut retriever = Bm25Retriever::new();
        let chunks = vec![
            chunk("1", "rust is a systems language"),
            chunk("2", "rust prevents data races"),
            chunk("3", "python is interpreted"),
        ];
        retriever.build_index(&chunks).unwrap();

        let results = retriever.retrieve("rust", 2).unwrap();
        assert_eq!(results.len(), 2);

        // top_k beyond corpus size returns everything
        let results = retriever.retrieve("rust", 10).unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_scores_non_increasing() {
        let mut retriever = Bm25Retriever::new();
        let chunks = vec![
            chunk("1", "alpha beta gamma"),
            chunk("2", "alpha beta"),
            chunk("3", "alpha"),
            chunk("4", "delta epsilon"),
        ];
        retriever.build_index(&chunks).unwrap();

        let results = retriever.retrieve("alpha beta gamma", 4).unwrap();
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut retriever = Bm25Retriever::new();
        let chunks = vec![
            chunk("1", "same words here"),
            chunk("2", "same words here"),
            chunk("3", "same words here"),
        ];
        retriever.build_index(&chunks).unwrap();

        let results = retriever.retrieve("same words", 3).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_whitespace_chunks_discarded() {
        let mut retriever = Bm25Retriever::new();
        let chunks = vec![
            chunk("1", "   "),
            chunk("2", "real content"),
        ];
        retriever.build_index(&chunks).unwrap();

        let results = retriever.retrieve("content", 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk_id, "2");
    }
}
