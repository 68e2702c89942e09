//! Externally supplied intervention nodes and what-if simulation results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ClusterId, InterventionId};

/// Registration payload for an intervention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterventionSpec {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub targets: Vec<ClusterId>,
    /// Expected mitigation strength in [0, 1].
    pub efficacy: f64,
    #[serde(default)]
    pub cost_per_unit: Option<f64>,
    /// Political risk in [0, 1]; 0.5 when absent.
    #[serde(default)]
    pub political_risk: Option<f64>,
}

/// A registered intervention node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub id: InterventionId,
    pub title: String,
    pub targets: Vec<ClusterId>,
    pub efficacy: f64,
    pub cost_per_unit: f64,
    pub political_risk: f64,
    pub registered_at: DateTime<Utc>,
    #[serde(default)]
    pub feedback: FeedbackTally,
}

/// Field ratings (1 to 5) collected for an intervention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackTally {
    pub ratings: u32,
    pub rating_total: u32,
}

impl FeedbackTally {
    pub const MAX_RATING: u8 = 5;

    pub fn record(&mut self, rating: u8) {
        self.ratings += 1;
        self.rating_total += u32::from(rating);
    }

    /// Mean rating scaled to [0, 1]. Unrated interventions score a neutral 0.5.
    pub fn effectiveness(&self) -> f64 {
        if self.ratings == 0 {
            return 0.5;
        }
        f64::from(self.rating_total) / f64::from(self.ratings) / f64::from(Self::MAX_RATING)
    }
}

/// An intervention with its multi-criteria score, as returned by
/// `rank_interventions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedIntervention {
    pub id: InterventionId,
    pub title: String,
    pub targets: Vec<ClusterId>,
    /// Reports averted over 30 days if every target is acted on at the
    /// intervention's efficacy.
    pub expected_impact: u64,
    pub cost_estimate: f64,
    pub political_risk: f64,
    pub impact_score: f64,
    pub cost_score: f64,
    pub risk_score: f64,
    pub feedback_score: f64,
    pub rank_score: f64,
}

/// Outcome of `simulate_intervention`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub cluster_id: ClusterId,
    pub title: String,
    pub intensity: f64,
    pub cost_estimate: f64,
    /// Projected number of averted reports over the next 30 days.
    pub expected_impact: u64,
    pub confidence: f64,
    pub downstream_clusters: Vec<ClusterId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrated_feedback_is_neutral() {
        assert_eq!(FeedbackTally::default().effectiveness(), 0.5);
    }

    #[test]
    fn feedback_is_the_scaled_mean_rating() {
        let mut tally = FeedbackTally::default();
        tally.record(5);
        tally.record(2);
        assert_eq!(tally.ratings, 2);
        assert!((tally.effectiveness() - 0.7).abs() < 1e-12);
    }
}
