//! Similarity index behaviour under mixed mutation sequences.

use grievance_core::config::{EmbeddingConfig, IndexConfig};
use grievance_core::traits::{EmbeddingInput, IEmbeddingProvider};
use grievance_core::{ClusterId, SourceChannel};
use grievance_embeddings::{cosine_distance, CachedEmbedder, HashingEmbedder, SimilarityIndex};
use proptest::prelude::*;

// ─── Helper ──────────────────────────────────────────────────────────────────

fn brute_force_best(entries: &[(u64, Vec<f32>)], query: &[f32]) -> f64 {
    entries
        .iter()
        .map(|(_, v)| cosine_distance(query, v))
        .fold(f64::INFINITY, f64::min)
}

fn vector_strategy(dims: usize) -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-1.0f32..1.0, dims).prop_filter("non-zero", |v| {
        v.iter().map(|x| x * x).sum::<f32>() > 1e-3
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Exact and approximate modes
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn exact_mode_matches_brute_force(
        vectors in prop::collection::vec(vector_strategy(6), 1..30),
        query in vector_strategy(6),
    ) {
        let mut idx = SimilarityIndex::new(IndexConfig::default(), 6);
        let entries: Vec<(u64, Vec<f32>)> =
            vectors.into_iter().enumerate().map(|(i, v)| (i as u64, v)).collect();
        for (id, v) in &entries {
            idx.insert(ClusterId::new(*id), v, 1).unwrap();
        }
        let (hits, _) = idx.nearest(&query, 1).unwrap();
        prop_assert!((hits[0].distance - brute_force_best(&entries, &query)).abs() < 1e-9);
    }

    #[test]
    fn lsh_mode_never_returns_removed_or_duplicate_ids(
        vectors in prop::collection::vec(vector_strategy(6), 4..40),
        remove_every in 2usize..5,
        query in vector_strategy(6),
    ) {
        let config = IndexConfig { exact_scan_below: 0, hash_bits: 5, ..IndexConfig::default() };
        let mut idx = SimilarityIndex::new(config, 6);
        for (i, v) in vectors.iter().enumerate() {
            idx.insert(ClusterId::new(i as u64), v, 1).unwrap();
        }
        for i in (0..vectors.len()).step_by(remove_every) {
            idx.remove(ClusterId::new(i as u64)).unwrap();
        }
        let (hits, _) = idx.nearest(&query, vectors.len()).unwrap();
        let mut seen = std::collections::HashSet::new();
        for hit in &hits {
            prop_assert!(hit.cluster_id.seq() as usize % remove_every != 0);
            prop_assert!(seen.insert(hit.cluster_id));
        }
        for pair in hits.windows(2) {
            prop_assert!(pair[0].distance <= pair[1].distance);
        }
    }
}

#[test]
fn bucket_stamp_survives_unrelated_mutation() {
    let config = IndexConfig {
        exact_scan_below: 0,
        hash_bits: 8,
        ..IndexConfig::default()
    };
    let mut idx = SimilarityIndex::new(config, 4);
    let v = [1.0, 0.2, 0.0, 0.0];
    idx.insert(ClusterId::new(1), &v, 1).unwrap();
    let (_, stamp) = idx.nearest(&v, 1).unwrap();
    assert!(idx.validate(&stamp));

    // A vector on the opposite side of every hyperplane lies in a bucket the
    // lookup did not read.
    let far = [-1.0, -0.2, 0.0, 0.0];
    let keys = idx.bucket_keys(&v).unwrap();
    assert!(!keys.contains(&idx.signature(&far)));
    idx.insert(ClusterId::new(2), &far, 1).unwrap();
    assert!(idx.validate(&stamp));

    idx.update(ClusterId::new(1), &[1.0, 0.25, 0.0, 0.0], 2).unwrap();
    assert!(!idx.validate(&stamp));
}

#[test]
fn hashing_embedder_feeds_the_index() {
    let embedder = CachedEmbedder::new(HashingEmbedder::new(&EmbeddingConfig::default()), 64);
    let embed = |text: &str| {
        embedder
            .embed(&EmbeddingInput {
                report_id: "r",
                text,
                channel: SourceChannel::Text,
                region: Some("Bihar"),
            })
            .unwrap()
    };
    let mut idx = SimilarityIndex::new(IndexConfig::default(), embedder.dimensions());
    idx.insert(ClusterId::new(1), &embed("pension not paid for months"), 3).unwrap();
    idx.insert(ClusterId::new(2), &embed("ration shop closed without notice"), 3).unwrap();
    let (hits, _) = idx.nearest(&embed("old age pension not paid"), 2).unwrap();
    assert_eq!(hits[0].cluster_id, ClusterId::new(1));
}
