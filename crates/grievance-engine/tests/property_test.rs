//! Property tests for the batch scheduler.

use std::collections::BTreeSet;

use grievance_engine::partition;
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn bucket_keys() -> impl Strategy<Value = Vec<Option<Vec<u32>>>> {
    prop::collection::vec(
        prop::option::weighted(0.95, prop::collection::vec(0u32..32, 1..4)),
        0..40,
    )
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn every_report_lands_in_exactly_one_component(keys in bucket_keys()) {
        let components = partition(&keys);
        let mut seen: Vec<usize> = components.iter().flatten().copied().collect();
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..keys.len()).collect::<Vec<_>>());
    }

    #[test]
    fn shared_keys_share_a_component(keys in bucket_keys()) {
        let components = partition(&keys);
        let mut component_of = vec![usize::MAX; keys.len()];
        for (c, members) in components.iter().enumerate() {
            for &m in members {
                component_of[m] = c;
            }
        }
        for i in 0..keys.len() {
            for j in (i + 1)..keys.len() {
                let shared = match (&keys[i], &keys[j]) {
                    (Some(a), Some(b)) => {
                        let a: BTreeSet<_> = a.iter().collect();
                        b.iter().any(|k| a.contains(k))
                    }
                    _ => true,
                };
                if shared {
                    prop_assert_eq!(component_of[i], component_of[j]);
                }
            }
        }
    }

    #[test]
    fn components_keep_submission_order(keys in bucket_keys()) {
        let components = partition(&keys);
        for members in &components {
            prop_assert!(members.windows(2).all(|w| w[0] < w[1]));
        }
        let firsts: Vec<usize> = components.iter().map(|m| m[0]).collect();
        prop_assert!(firsts.windows(2).all(|w| w[0] < w[1]));
    }
}
