//! Confidence never drops when a trusted member is added.

use grievance_core::config::TrustConfig;
use grievance_core::ClusterState;
use grievance_trust::{ConfidenceInputs, ConfidenceScorer};
use proptest::prelude::*;

fn state_strategy() -> impl Strategy<Value = ClusterState> {
    prop_oneof![Just(ClusterState::Forming), Just(ClusterState::Stable)]
}

proptest! {
    #[test]
    fn adding_a_member_never_lowers_confidence(
        state in state_strategy(),
        becomes_stable in any::<bool>(),
        trust_mass in 0.0f64..50.0,
        channels in 0usize..=3,
        regions in 0usize..20,
        recent_mass in 0.0f64..50.0,
        added_trust in 0.0f64..=1.0,
        added_recency in 0.0f64..=1.0,
        new_channel in any::<bool>(),
        new_region in any::<bool>(),
    ) {
        let scorer = ConfidenceScorer::new(TrustConfig::default());
        let before = ConfidenceInputs {
            state,
            trust_mass,
            distinct_channels: channels,
            distinct_regions: regions,
            recent_mass,
        };
        let after_state = if becomes_stable { ClusterState::Stable } else { state };
        let after = ConfidenceInputs {
            state: after_state,
            trust_mass: trust_mass + added_trust,
            distinct_channels: (channels + usize::from(new_channel)).min(3),
            distinct_regions: regions + usize::from(new_region),
            recent_mass: recent_mass + added_recency,
        };
        let (b, a) = (scorer.score(&before), scorer.score(&after));
        prop_assert!(a + 1e-12 >= b, "before {b}, after {a}");
        prop_assert!((0.0..=1.0).contains(&a));
    }
}
