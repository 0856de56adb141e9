//! Similarity-ranked top-k search over a knowledge store
//!
//! Full scan: every embedded item is scored against the query with cosine
//! similarity, then a stable sort by descending score keeps store order for
//! ties. O(n) per query, which is fine for catalogs of a few thousand items.

use std::cmp::Ordering;

use serde::Serialize;

use crate::core::item::Metadata;
use crate::core::store::KnowledgeStore;

/// One ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Index of the item in the store.
    pub position: usize,
    pub content: String,
    pub metadata: Metadata,
    pub score: f32,
}

/// Cosine similarity between two vectors, in `[-1, 1]`.
///
/// Accumulates in f64 so any finite f32 input keeps a finite, non-zero norm.
/// Zero magnitude on either side, a length mismatch or a non-finite result
/// all give `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a > 0.0 && norm_b > 0.0 {
        let score = dot / (norm_a.sqrt() * norm_b.sqrt());
        if score.is_finite() {
            score.clamp(-1.0, 1.0) as f32
        } else {
            0.0
        }
    } else {
        0.0
    }
}

/// Rank every item of `store` against `query` and keep the best `top_k`.
pub fn search(query: &[f32], store: &KnowledgeStore, top_k: usize) -> Vec<SearchResult> {
    if top_k == 0 || store.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, f32)> = Vec::with_capacity(store.len());
    for (position, item) in store.items().iter().enumerate() {
        match item.embedding() {
            Some(embedding) => scored.push((position, cosine_similarity(query, embedding))),
            None => tracing::debug!(position, "skipping item without embedding"),
        }
    }

    if query.is_empty() {
        tracing::debug!("empty query vector, every score is zero");
    }

    // `sort_by` is stable: equal scores keep store order.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);

    scored
        .into_iter()
        .map(|(position, score)| {
            let item = &store.items()[position];
            SearchResult {
                position,
                content: item.content().to_string(),
                metadata: item.metadata().clone(),
                score,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::KnowledgeItem;

    fn store_of(vectors: &[&[f32]]) -> KnowledgeStore {
        let mut store = KnowledgeStore::new();
        for (i, v) in vectors.iter().enumerate() {
            store.push_embedded(KnowledgeItem::with_embedding(
                format!("item {}", i + 1),
                Metadata::new(),
                Some(v.to_vec()),
                false,
            ));
        }
        store
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_self_similarity_is_one() {
        for v in [
            vec![0.3, -1.2, 4.0, 0.01],
            vec![1e-3; 16],
            vec![123.0, 456.0],
            vec![1e20, 1e20],
            vec![1e-25; 4],
            vec![f32::MAX, f32::MAX],
            vec![f32::MIN_POSITIVE, 0.0, f32::MIN_POSITIVE],
        ] {
            assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5, "{v:?}");
        }
    }

    #[test]
    fn test_scores_stay_within_unit_range() {
        let vectors = [
            vec![0.1, 0.2, 0.3],
            vec![0.1 + 0.2, 0.7, 1e-7],
            vec![-3.0, 1e10, 0.5],
            vec![1.0 / 3.0, 2.0 / 3.0, 1.0],
        ];
        for a in &vectors {
            for b in &vectors {
                let score = cosine_similarity(a, b);
                assert!((-1.0..=1.0).contains(&score), "{a:?} {b:?} -> {score}");
            }
            let negated: Vec<f32> = a.iter().map(|x| -x).collect();
            assert!(cosine_similarity(a, &negated) >= -1.0);
        }
    }

    #[test]
    fn test_zero_magnitude_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_dimension_mismatch_scores_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_toy_scenario() {
        let store = store_of(&[&[1.0, 0.0], &[0.0, 1.0], &[0.9, 0.1]]);
        let results = search(&[1.0, 0.0], &store, 2);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "item 1");
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert_eq!(results[1].content, "item 3");
        assert!((results[1].score - 0.9939).abs() < 1e-3);
        assert!(results.iter().all(|r| r.content != "item 2"));
    }

    #[test]
    fn test_result_count_is_min_of_k_and_len() {
        let store = store_of(&[&[1.0, 0.0], &[0.0, 1.0], &[0.5, 0.5], &[0.2, 0.8]]);
        for k in 0..8 {
            assert_eq!(search(&[1.0, 1.0], &store, k).len(), k.min(store.len()));
        }
    }

    #[test]
    fn test_results_sorted_descending() {
        let store = store_of(&[
            &[0.1, 0.9],
            &[0.8, 0.2],
            &[-1.0, 0.0],
            &[0.5, 0.5],
            &[1.0, 0.0],
        ]);
        let results = search(&[1.0, 0.0], &store, 5);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(results.last().map(|r| r.position), Some(2));
    }

    #[test]
    fn test_ties_keep_store_order() {
        let store = store_of(&[&[0.0, 1.0], &[1.0, 1.0], &[0.5, 0.0], &[2.0, 2.0], &[4.0, 0.0]]);
        let results = search(&[1.0, 1.0], &store, 5);
        let order: Vec<usize> = results.iter().map(|r| r.position).collect();
        // [1,1] and [2,2] tie at 1.0; the rest tie at ~0.707.
        assert_eq!(order, vec![1, 3, 0, 2, 4]);
    }

    #[test]
    fn test_empty_store_returns_nothing() {
        let store = KnowledgeStore::new();
        assert!(search(&[1.0, 0.0], &store, 3).is_empty());
        assert!(search(&[1.0, 0.0], &store, 0).is_empty());
    }

    #[test]
    fn test_top_k_zero_returns_nothing() {
        let store = store_of(&[&[1.0, 0.0]]);
        assert!(search(&[1.0, 0.0], &store, 0).is_empty());
    }

    #[test]
    fn test_zero_vectors_keep_order_with_zero_score() {
        let store = store_of(&[&[0.0, 0.0], &[0.0, 0.0], &[0.0, 0.0]]);
        let results = search(&[0.3, 0.7], &store, 10);
        let order: Vec<usize> = results.iter().map(|r| r.position).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert!(results.iter().all(|r| r.score == 0.0));
    }

    #[test]
    fn test_results_carry_metadata() {
        let mut store = KnowledgeStore::new();
        let mut metadata = Metadata::new();
        metadata.insert("tipo".to_string(), "catalogo".to_string());
        store.push_embedded(KnowledgeItem::with_embedding(
            "Libro: Rayuela".to_string(),
            metadata.clone(),
            Some(vec![1.0, 0.0]),
            false,
        ));

        let results = search(&[1.0, 0.0], &store, 1);
        assert_eq!(results[0].metadata, metadata);
        assert_eq!(results[0].content, "Libro: Rayuela");
    }
}
