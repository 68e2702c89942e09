//! Intervention registration and what-if simulation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use grievance_core::config::CausalConfig;
use grievance_core::errors::CausalError;
use grievance_core::{
    ClusterId, FeedbackTally, Intervention, InterventionId, InterventionSpec, NodeKey, SimulationResult,
};
use tracing::{debug, info};

use crate::builder::CausalGraphBuilder;
use crate::snapshot::CausalGraphSnapshot;

const DEFAULT_POLITICAL_RISK: f64 = 0.5;

impl CausalGraphBuilder {
    /// Validate and register an intervention, linking a `mitigates` edge to
    /// every (redirect-resolved) target right away.
    pub fn register_intervention(
        &mut self,
        spec: InterventionSpec,
        now: DateTime<Utc>,
    ) -> Result<Intervention, CausalError> {
        let id = match spec.id.as_deref().map(str::trim) {
            Some("") => return Err(invalid("", "id must not be blank")),
            Some(id) => InterventionId::new(id),
            None => InterventionId::new(uuid::Uuid::new_v4().to_string()),
        };
        let reject = |reason: &str| invalid(id.as_str(), reason);
        let title = spec.title.trim();
        if title.is_empty() {
            return Err(reject("title must not be empty"));
        }
        if spec.targets.is_empty() {
            return Err(reject("at least one target is required"));
        }
        if !spec.efficacy.is_finite() || !(0.0..=1.0).contains(&spec.efficacy) {
            return Err(reject("efficacy must lie in [0, 1]"));
        }
        let cost_per_unit = spec
            .cost_per_unit
            .unwrap_or(self.config.default_cost_per_unit);
        if !cost_per_unit.is_finite() || cost_per_unit < 0.0 {
            return Err(reject("cost_per_unit must be a non-negative number"));
        }
        let political_risk = spec.political_risk.unwrap_or(DEFAULT_POLITICAL_RISK);
        if !political_risk.is_finite() || !(0.0..=1.0).contains(&political_risk) {
            return Err(reject("political_risk must lie in [0, 1]"));
        }
        if self.interventions.contains_key(&id) {
            return Err(reject("already registered"));
        }
        let mut targets = BTreeSet::new();
        for target in &spec.targets {
            let resolved = self.resolve(*target);
            if self.graph.get_node(&NodeKey::Cluster(resolved)).is_none() {
                return Err(CausalError::UnknownNode {
                    node: target.to_string(),
                });
            }
            targets.insert(resolved);
        }

        let intervention = Intervention {
            id: id.clone(),
            title: title.to_string(),
            targets: targets.into_iter().collect(),
            efficacy: spec.efficacy,
            cost_per_unit,
            political_risk,
            registered_at: now,
            feedback: FeedbackTally::default(),
        };
        self.interventions.insert(id.clone(), intervention.clone());
        self.relink_interventions();
        self.version += 1;
        info!(
            intervention = %id,
            targets = intervention.targets.len(),
            efficacy = intervention.efficacy,
            "intervention registered"
        );
        Ok(intervention)
    }

    /// Record a field rating (1 to 5) for a registered intervention.
    pub fn record_feedback(&mut self, id: &InterventionId, rating: u8) -> Result<Intervention, CausalError> {
        if !(1..=FeedbackTally::MAX_RATING).contains(&rating) {
            return Err(invalid(id.as_str(), "rating must lie in 1..=5"));
        }
        let intervention = self
            .interventions
            .get_mut(id)
            .ok_or_else(|| CausalError::UnknownNode {
                node: format!("iv-{id}"),
            })?;
        intervention.feedback.record(rating);
        self.version += 1;
        debug!(intervention = %id, rating, "intervention feedback recorded");
        Ok(intervention.clone())
    }
}

fn invalid(id: &str, reason: &str) -> CausalError {
    CausalError::InvalidIntervention {
        id: id.to_string(),
        reason: reason.to_string(),
    }
}

impl CausalGraphSnapshot {
    /// Project the effect of acting on `cluster_id` at `intensity` (clamped
    /// to [0, 1]): reports averted in the target and, damped by path
    /// strength, in every cluster downstream of it.
    pub fn simulate(
        &self,
        cluster_id: ClusterId,
        intensity: f64,
        config: &CausalConfig,
    ) -> Result<SimulationResult, CausalError> {
        let target = self.resolve(cluster_id);
        let info = self
            .clusters
            .get(&target)
            .ok_or_else(|| CausalError::UnknownNode {
                node: cluster_id.to_string(),
            })?;
        let intensity = if intensity.is_nan() { 0.0 } else { intensity.clamp(0.0, 1.0) };

        let effects = self.effects_of(target, config.max_traversal_depth, config.max_traversal_nodes);
        let mut downstream: Vec<(ClusterId, f64)> = effects
            .reached()
            .filter_map(|n| n.key.cluster_id().map(|id| (id, n.path_strength)))
            .collect();
        downstream.sort_by_key(|(id, _)| *id);

        let mut averted = intensity * info.count_30d as f64;
        for (id, strength) in &downstream {
            if let Some(other) = self.clusters.get(id) {
                averted += intensity * strength * other.count_30d as f64;
            }
        }
        let unit_costs: Vec<f64> = self
            .interventions
            .values()
            .filter(|iv| iv.targets.iter().any(|t| self.resolve(*t) == target))
            .map(|iv| iv.cost_per_unit)
            .collect();
        let unit_cost = if unit_costs.is_empty() {
            config.default_cost_per_unit
        } else {
            unit_costs.iter().sum()
        };
        let path_factor = if downstream.is_empty() {
            1.0
        } else {
            downstream.iter().map(|(_, s)| s).sum::<f64>() / downstream.len() as f64
        };

        Ok(SimulationResult {
            cluster_id: target,
            title: info.title.clone(),
            intensity,
            cost_estimate: intensity * unit_cost,
            expected_impact: averted.round().max(0.0) as u64,
            confidence: (info.confidence * path_factor).clamp(0.0, 1.0),
            downstream_clusters: downstream.into_iter().map(|(id, _)| id).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use grievance_core::{CausalEdge, CausalRelation};
    use test_fixtures::ts;

    use super::*;
    use crate::builder::{CausalInput, ClusterSeries};
    use crate::snapshot::ClusterInfo;
    use crate::graph::IndexedGraph;

    fn builder_with(ids: &[u64]) -> CausalGraphBuilder {
        let mut builder = CausalGraphBuilder::new(CausalConfig::default());
        let clusters = ids
            .iter()
            .map(|n| ClusterSeries {
                id: ClusterId::new(*n),
                title: format!("cluster {n}"),
                times: Default::default(),
                geo: BTreeMap::new(),
                size: 1,
                count_30d: 1,
                confidence: 0.5,
                stable: false,
            })
            .collect();
        let redirects = [(ClusterId::new(7), ClusterId::new(2))].into_iter().collect();
        builder.rebuild(&CausalInput { as_of: ts(0), clusters, redirects });
        builder
    }

    fn spec(id: Option<&str>, targets: &[u64]) -> InterventionSpec {
        InterventionSpec {
            id: id.map(str::to_string),
            title: "Mobile ration van".to_string(),
            targets: targets.iter().map(|n| ClusterId::new(*n)).collect(),
            efficacy: 0.6,
            cost_per_unit: None,
            political_risk: None,
        }
    }

    #[test]
    fn registration_links_mitigation_edges() {
        let mut builder = builder_with(&[1, 2]);
        let iv = builder.register_intervention(spec(Some("van"), &[1, 7]), ts(1)).unwrap();
        assert_eq!(iv.targets, vec![ClusterId::new(1), ClusterId::new(2)]);
        assert_eq!(iv.cost_per_unit, CausalConfig::default().default_cost_per_unit);
        let from = NodeKey::Intervention(iv.id.clone());
        assert!(builder.graph().has_relation(&from, &NodeKey::Cluster(ClusterId::new(2)), CausalRelation::Mitigates));
        assert_eq!(builder.graph().edge_count(), 2);
    }

    #[test]
    fn generated_ids_are_unique() {
        let mut builder = builder_with(&[1]);
        let a = builder.register_intervention(spec(None, &[1]), ts(1)).unwrap();
        let b = builder.register_intervention(spec(None, &[1]), ts(1)).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn invalid_specs_are_rejected() {
        let mut builder = builder_with(&[1]);
        builder.register_intervention(spec(Some("van"), &[1]), ts(1)).unwrap();
        let dup = builder.register_intervention(spec(Some("van"), &[1]), ts(1));
        assert!(matches!(dup, Err(CausalError::InvalidIntervention { .. })));

        let mut bad = spec(Some("x"), &[1]);
        bad.efficacy = 1.5;
        assert!(builder.register_intervention(bad, ts(1)).is_err());

        let mut free = spec(Some("y"), &[1]);
        free.cost_per_unit = Some(-1.0);
        assert!(builder.register_intervention(free, ts(1)).is_err());

        let mut risky = spec(Some("v"), &[1]);
        risky.political_risk = Some(1.2);
        assert!(builder.register_intervention(risky, ts(1)).is_err());

        assert!(builder.register_intervention(spec(Some("z"), &[]), ts(1)).is_err());
        assert!(matches!(
            builder.register_intervention(spec(Some("w"), &[99]), ts(1)),
            Err(CausalError::UnknownNode { .. })
        ));
    }

    #[test]
    fn feedback_accumulates_on_registered_interventions() {
        let mut builder = builder_with(&[1]);
        let iv = builder.register_intervention(spec(Some("van"), &[1]), ts(1)).unwrap();
        assert_eq!(iv.political_risk, 0.5);
        builder.record_feedback(&iv.id, 4).unwrap();
        let rated = builder.record_feedback(&iv.id, 2).unwrap();
        assert_eq!(rated.feedback.ratings, 2);
        assert!((rated.feedback.effectiveness() - 0.6).abs() < 1e-12);
        assert_eq!(builder.snapshot().interventions[&iv.id].feedback, rated.feedback);

        assert!(matches!(
            builder.record_feedback(&iv.id, 0),
            Err(CausalError::InvalidIntervention { .. })
        ));
        assert!(matches!(
            builder.record_feedback(&InterventionId::new("nope"), 3),
            Err(CausalError::UnknownNode { .. })
        ));
    }

    fn chain_snapshot() -> CausalGraphSnapshot {
        let key = |n| NodeKey::Cluster(ClusterId::new(n));
        let mut g = IndexedGraph::new();
        for (a, b, s) in [(1, 2, 0.5), (2, 3, 0.4)] {
            g.add_edge(
                CausalEdge::new(key(a), key(b), CausalRelation::Causes, s)
                    .unwrap()
                    .with_inference(2, 0.5),
            );
        }
        let info = |count_30d, confidence| ClusterInfo {
            title: "t".to_string(),
            count_30d,
            confidence,
        };
        let clusters = [
            (ClusterId::new(1), info(10, 0.8)),
            (ClusterId::new(2), info(20, 0.6)),
            (ClusterId::new(3), info(50, 0.6)),
        ]
        .into_iter()
        .collect();
        CausalGraphSnapshot::new(1, None, g, clusters, BTreeMap::new(), BTreeMap::new())
    }

    #[test]
    fn simulation_damps_downstream_impact() {
        let config = CausalConfig::default();
        let result = chain_snapshot().simulate(ClusterId::new(1), 0.5, &config).unwrap();
        // 0.5·10 + 0.5·0.5·20 + 0.5·0.2·50 = 15
        assert_eq!(result.expected_impact, 15);
        assert_eq!(result.downstream_clusters, vec![ClusterId::new(2), ClusterId::new(3)]);
        assert!((result.cost_estimate - 0.5 * config.default_cost_per_unit).abs() < 1e-9);
        assert!((result.confidence - 0.8 * 0.35).abs() < 1e-9);
    }

    #[test]
    fn simulation_clamps_intensity_and_rejects_unknown() {
        let snap = chain_snapshot();
        let config = CausalConfig::default();
        let leaf = snap.simulate(ClusterId::new(3), 4.0, &config).unwrap();
        assert_eq!(leaf.intensity, 1.0);
        assert_eq!(leaf.expected_impact, 50);
        assert!(leaf.downstream_clusters.is_empty());
        assert!((leaf.confidence - 0.6).abs() < 1e-9);
        assert!(snap.simulate(ClusterId::new(8), 0.5, &config).is_err());
    }
}
