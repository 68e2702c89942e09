//! Property tests for the causal graph builder.

use std::collections::BTreeMap;
use std::sync::Arc;

use grievance_causal::{CausalGraphBuilder, CausalInput, ClusterSeries};
use grievance_core::config::CausalConfig;
use grievance_core::ClusterId;
use proptest::prelude::*;
use test_fixtures::ts;

// =============================================================================
// Strategies
// =============================================================================

fn cluster_days() -> impl Strategy<Value = Vec<Vec<i64>>> {
    prop::collection::vec(prop::collection::vec(0i64..40, 0..15), 1..8)
}

fn input(days: &[Vec<i64>]) -> CausalInput {
    let clusters = days
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let mut times: Vec<_> = d.iter().map(|day| ts(*day)).collect();
            times.sort();
            ClusterSeries {
                id: ClusterId::new(i as u64 + 1),
                title: format!("c{i}"),
                size: times.len(),
                count_30d: times.len() as u64,
                times: Arc::new(times),
                geo: BTreeMap::new(),
                confidence: 0.5,
                stable: true,
            }
        })
        .collect();
    CausalInput {
        as_of: ts(40),
        clusters,
        redirects: BTreeMap::new(),
    }
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn no_self_loops_and_bounded_weights(days in cluster_days()) {
        let mut builder = CausalGraphBuilder::new(CausalConfig::default());
        builder.rebuild(&input(&days));
        for edge in builder.graph().edges() {
            prop_assert_ne!(&edge.from_id, &edge.to_id);
            prop_assert!((0.0..=1.0).contains(&edge.strength));
            prop_assert!((0.0..=1.0).contains(&edge.confidence));
            prop_assert!(edge.lag_days.is_some_and(|l| l >= 1));
        }
    }

    #[test]
    fn at_most_one_inferred_edge_per_pair(days in cluster_days()) {
        let mut builder = CausalGraphBuilder::new(CausalConfig::default());
        builder.rebuild(&input(&days));
        let mut seen = std::collections::BTreeSet::new();
        for edge in builder.graph().edges() {
            let pair = if edge.from_id < edge.to_id {
                (edge.from_id.clone(), edge.to_id.clone())
            } else {
                (edge.to_id.clone(), edge.from_id.clone())
            };
            prop_assert!(seen.insert(pair));
        }
    }

    #[test]
    fn rebuild_is_deterministic(days in cluster_days()) {
        let mut a = CausalGraphBuilder::new(CausalConfig::default());
        let mut b = CausalGraphBuilder::new(CausalConfig::default());
        let view_a = { a.rebuild(&input(&days)); a.snapshot().view(None, 100) };
        let view_b = { b.rebuild(&input(&days)); b.snapshot().view(None, 100) };
        prop_assert_eq!(view_a, view_b);
    }
}
