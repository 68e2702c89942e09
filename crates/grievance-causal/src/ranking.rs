//! Multi-criteria ranking of registered interventions.
//!
//! `rank = w_impact·impact + w_cost·cost + w_risk·(1 - risk) + w_feedback·feedback`,
//! with the weights from `CausalConfig::ranking`.
//!
//! Impact is the simulated number of averted reports, scaled by the best
//! candidate. Cost is scored against the configured reference unit cost, so
//! an intervention costing exactly one reference unit scores 0.5.

use grievance_core::config::CausalConfig;
use grievance_core::{Intervention, RankedIntervention};

use crate::snapshot::CausalGraphSnapshot;

struct Projection<'a> {
    intervention: &'a Intervention,
    averted: u64,
    cost: f64,
}

impl CausalGraphSnapshot {
    /// Every registered intervention, best first. Ties break on id.
    pub fn rank_interventions(&self, config: &CausalConfig) -> Vec<RankedIntervention> {
        let weights = &config.ranking;
        let projections: Vec<Projection<'_>> = self
            .interventions
            .values()
            .map(|iv| self.project(iv, config))
            .collect();
        let best = projections.iter().map(|p| p.averted).max().unwrap_or(0);

        let mut ranked: Vec<RankedIntervention> = projections
            .into_iter()
            .map(|p| {
                let iv = p.intervention;
                let impact_score = if best == 0 {
                    0.0
                } else {
                    p.averted as f64 / best as f64
                };
                let cost_score = cost_score(p.cost, config.default_cost_per_unit);
                let risk_score = 1.0 - iv.political_risk;
                let feedback_score = iv.feedback.effectiveness();
                let rank_score = weights.impact * impact_score
                    + weights.cost * cost_score
                    + weights.risk * risk_score
                    + weights.feedback * feedback_score;
                RankedIntervention {
                    id: iv.id.clone(),
                    title: iv.title.clone(),
                    targets: iv.targets.clone(),
                    expected_impact: p.averted,
                    cost_estimate: p.cost,
                    political_risk: iv.political_risk,
                    impact_score,
                    cost_score,
                    risk_score,
                    feedback_score,
                    rank_score,
                }
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.rank_score
                .total_cmp(&a.rank_score)
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked
    }

    /// Simulate each target at the intervention's efficacy. Targets that
    /// dropped out of the graph contribute nothing.
    fn project<'a>(&self, iv: &'a Intervention, config: &CausalConfig) -> Projection<'a> {
        let mut averted = 0u64;
        let mut cost = 0.0;
        for target in &iv.targets {
            if let Ok(sim) = self.simulate(*target, iv.efficacy, config) {
                averted += sim.expected_impact;
                cost += sim.intensity * iv.cost_per_unit;
            }
        }
        Projection {
            intervention: iv,
            averted,
            cost,
        }
    }
}

fn cost_score(cost: f64, reference: f64) -> f64 {
    if reference > 0.0 {
        1.0 / (1.0 + cost / reference)
    } else {
        1.0 / (1.0 + cost)
    }
}
