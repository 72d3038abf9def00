//! Reciprocal Rank Fusion for combining two ranked result lists

use crate::retrieval::{RetrievalError, RetrievalResult};
use ahash::AHashMap;

/// Standard RRF constant
pub const DEFAULT_RRF_K: usize = 60;

/// Combine two ranked lists with Reciprocal Rank Fusion.
///
/// Each chunk scores the sum of `1 / (k + rank)` over the lists it appears
/// in, with rank counted from 1. Rank positions only; the input scores are
/// never compared across lists, which is what lets BM25 scores and cosine
/// similarities fuse without normalization. Non-score fields come from the
/// first list a chunk appears in (primary wins).
///
/// Fails with `EmptyInput` when both lists are empty.
pub fn fuse(
    primary: &[RetrievalResult],
    secondary: &[RetrievalResult],
    k: usize,
) -> Result<Vec<RetrievalResult>, RetrievalError> {
    if primary.is_empty() && secondary.is_empty() {
        return Err(RetrievalError::EmptyInput);
    }

    let mut rrf_scores: AHashMap<&str, f32> = AHashMap::new();
    for list in [primary, secondary] {
        for (rank, result) in list.iter().enumerate() {
            *rrf_scores.entry(result.chunk_id.as_str()).or_insert(0.0) +=
                1.0 / (k as f32 + rank as f32 + 1.0);
        }
    }

    // First occurrence across primary then secondary supplies the payload,
    // and fixes the order equal scores are emitted in
    let mut provenance: AHashMap<&str, &RetrievalResult> = AHashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();
    for result in primary.iter().chain(secondary.iter()) {
        if !provenance.contains_key(result.chunk_id.as_str()) {
            provenance.insert(result.chunk_id.as_str(), result);
            first_seen.push(result.chunk_id.as_str());
        }
    }

    let mut fused: Vec<RetrievalResult> = first_seen
        .into_iter()
        .map(|chunk_id| provenance[chunk_id].with_score(rrf_scores[chunk_id]))
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    tracing::debug!("Fused {} results with RRF", fused.len());
    Ok(fused)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::test_support::result;

    #[test]
    fn test_both_empty_rejected() {
        let outcome = fuse(&[], &[], DEFAULT_RRF_K);
        assert!(matches!(outcome, Err(RetrievalError::EmptyInput)));
    }

    #[test]
    fn test_consensus_outranks_single_list() {
        let primary = vec![result("a", 5.0), result("b", 4.0), result("c", 3.0)];
        let secondary = vec![result("b", 0.9), result("a", 0.8), result("d", 0.7)];

        let fused = fuse(&primary, &secondary, DEFAULT_RRF_K).unwrap();

        // All distinct ids survive
        assert_eq!(fused.len(), 4);
        // a and b appear in both lists and must outrank c and d
        let ids: Vec<&str> = fused.iter().map(|r| r.chunk_id.as_str()).collect();
        assert!(ids[0] == "a" || ids[0] == "b");
        assert!(ids[1] == "a" || ids[1] == "b");
    }

    #[test]
    fn test_rrf_score_value() {
        // Same chunk at rank 1 in both lists: 2 / (60 + 1)
        let fused = fuse(&[result("a", 1.0)], &[result("a", 1.0)], 60).unwrap();

        assert_eq!(fused.len(), 1);
        assert!((fused[0].score - 2.0 / 61.0).abs() < 1e-6);
    }

    #[test]
    fn test_single_list_contributes_nonzero() {
        let fused = fuse(&[result("a", 1.0)], &[], 60).unwrap();
        assert_eq!(fused.len(), 1);
        assert!((fused[0].score - 1.0 / 61.0).abs() < 1e-6);
    }

    #[test]
    fn test_self_fusion_preserves_order() {
        let list = vec![result("a", 3.0), result("b", 2.0), result("c", 1.0)];

        let fused = fuse(&list, &list, DEFAULT_RRF_K).unwrap();
        let ids: Vec<&str> = fused.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_scores_non_increasing() {
        let primary = vec![result("a", 5.0), result("b", 4.0)];
        let secondary = vec![result("c", 0.9), result("b", 0.8)];

        let fused = fuse(&primary, &secondary, DEFAULT_RRF_K).unwrap();
        for pair in fused.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_primary_payload_wins() {
        let mut primary_copy = result("a", 5.0);
        primary_copy.doc_name = "primary.txt".to_string();
        let mut secondary_copy = result("a", 0.9);
        secondary_copy.doc_name = "secondary.txt".to_string();

        let fused = fuse(&[primary_copy], &[secondary_copy], DEFAULT_RRF_K).unwrap();
        assert_eq!(fused[0].doc_name, "primary.txt");
    }
}
