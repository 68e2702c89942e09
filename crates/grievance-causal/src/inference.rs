//! Pairwise edge inference: temporal precedence plus regional co-occurrence.

use std::collections::BTreeMap;

use grievance_core::config::CausalConfig;
use grievance_core::{CausalEdge, CausalRelation, ClusterId, NodeKey};
use grievance_trust::{causal_confidence, correlation_p_value};

use crate::series::{cross_correlation, peak, DailySeries, LagCorrelation};

/// What the inference step needs to know about one side of a pair.
#[derive(Debug, Clone, Copy)]
pub struct PairSide<'a> {
    pub id: ClusterId,
    pub series: &'a DailySeries,
    pub geo: &'a BTreeMap<String, u64>,
}

/// Shared regional mass over the smaller side's tagged mass. `None` when
/// either side has no regional tags, which counts as no evidence against.
pub fn region_overlap(a: &BTreeMap<String, u64>, b: &BTreeMap<String, u64>) -> Option<f64> {
    let total_a: u64 = a.values().sum();
    let total_b: u64 = b.values().sum();
    if total_a == 0 || total_b == 0 {
        return None;
    }
    let shared: u64 = a
        .iter()
        .filter_map(|(region, count)| b.get(region).map(|other| (*count).min(*other)))
        .sum();
    Some(shared as f64 / total_a.min(total_b) as f64)
}

/// Infer at most one edge for the unordered pair. A positive peak lag
/// means `a` leads `b`.
pub fn evaluate_pair(a: PairSide<'_>, b: PairSide<'_>, config: &CausalConfig) -> Option<CausalEdge> {
    if a.id == b.id
        || a.series.in_window < config.min_reports
        || b.series.in_window < config.min_reports
    {
        return None;
    }
    if let Some(overlap) = region_overlap(a.geo, b.geo) {
        if overlap < config.min_region_overlap {
            return None;
        }
    }

    let lags = cross_correlation(&a.series.bins, &b.series.bins, config.max_lag_days);
    let best = peak(&lags)?;
    if best.lag == 0 || best.r < config.significance {
        return None;
    }
    let (from, to) = if best.lag > 0 { (a.id, b.id) } else { (b.id, a.id) };
    let lag_days = best.lag.abs();
    let relation = if lag_days <= config.direct_lag_days {
        CausalRelation::Causes
    } else {
        CausalRelation::LeadsTo
    };
    let confidence = edge_confidence(&lags, best);
    CausalEdge::new(NodeKey::Cluster(from), NodeKey::Cluster(to), relation, best.r)
        .ok()
        .map(|edge| edge.with_inference(lag_days, confidence))
}

/// Causal confidence index of a peak: the placebo is the strongest
/// correlation pointing the other way, stability is how many of the two
/// adjacent lags also correlate positively.
fn edge_confidence(lags: &[LagCorrelation], best: LagCorrelation) -> f64 {
    let placebo = lags
        .iter()
        .filter(|c| c.lag.signum() == -best.lag.signum())
        .map(|c| c.r)
        .fold(0.0_f64, f64::max);
    let stability = lags
        .iter()
        .filter(|c| (c.lag - best.lag).abs() == 1)
        .filter(|c| c.r > 0.0)
        .count() as f64
        / 2.0;
    let p_value = correlation_p_value(best.r, best.overlap);
    causal_confidence(best.r, p_value, placebo, stability)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geo(pairs: &[(&str, u64)]) -> BTreeMap<String, u64> {
        pairs.iter().map(|(r, c)| (r.to_string(), *c)).collect()
    }

    #[test]
    fn overlap_uses_the_smaller_side() {
        let a = geo(&[("Bihar", 8), ("Assam", 2)]);
        let b = geo(&[("Bihar", 3), ("Kerala", 1)]);
        assert_eq!(region_overlap(&a, &b), Some(0.75));
        assert_eq!(region_overlap(&a, &BTreeMap::new()), None);
    }

    #[test]
    fn disjoint_regions_have_zero_overlap() {
        let a = geo(&[("Bihar", 4)]);
        let b = geo(&[("Kerala", 4)]);
        assert_eq!(region_overlap(&a, &b), Some(0.0));
    }

    #[test]
    fn lead_at_negative_lag_points_the_other_way() {
        let a = DailySeries {
            bins: vec![0.0, 0.0, 0.0, 1.0, 0.0, 2.0, 0.0, 1.0, 0.0, 0.0],
            in_window: 4,
        };
        let b = DailySeries {
            bins: vec![0.0, 1.0, 0.0, 2.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            in_window: 4,
        };
        let empty = BTreeMap::new();
        let side = |id, series| PairSide { id: ClusterId::new(id), series, geo: &empty };
        let config = CausalConfig {
            max_lag_days: 3,
            ..CausalConfig::default()
        };
        let edge = evaluate_pair(side(1, &a), side(2, &b), &config).unwrap();
        assert_eq!(edge.from_id, NodeKey::Cluster(ClusterId::new(2)));
        assert_eq!(edge.to_id, NodeKey::Cluster(ClusterId::new(1)));
        assert_eq!(edge.lag_days, Some(2));
        assert_eq!(edge.relation, CausalRelation::Causes);
        assert!(edge.inferred);
        assert!(edge.confidence > 0.0 && edge.confidence <= 1.0);
    }

    #[test]
    fn simultaneous_series_produce_no_edge() {
        let s = DailySeries {
            bins: vec![0.0, 0.0, 1.0, 0.0, 3.0, 0.0, 1.0, 0.0, 0.0],
            in_window: 5,
        };
        let empty = BTreeMap::new();
        let a = PairSide { id: ClusterId::new(1), series: &s, geo: &empty };
        let b = PairSide { id: ClusterId::new(2), series: &s, geo: &empty };
        assert!(evaluate_pair(a, b, &CausalConfig { max_lag_days: 2, ..CausalConfig::default() }).is_none());
    }
}
