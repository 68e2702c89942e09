//! Per-cluster confidence score.
//!
//! ```text
//! confidence = state_factor * ( w_support   * (1 - e^(-trust_mass / support_scale))
//!                             + w_diversity * diversity
//!                             + w_growth    * (1 - e^(-recent_mass / growth_scale)) )
//! ```
//!
//! `trust_mass` is the sum of member trust weights (count times mean
//! trust). `diversity` blends distinct channels and distinct regions.
//! `recent_mass` sums a half-life decay over member ages. Every term only
//! grows when a member is added, so the score is monotone in membership.

use chrono::{DateTime, Utc};
use grievance_core::config::TrustConfig;
use grievance_core::{ClusterState, SourceChannel};

const CHANNEL_COUNT: f64 = SourceChannel::ALL.len() as f64;

/// Cluster state the confidence score is a function of.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInputs {
    pub state: ClusterState,
    pub trust_mass: f64,
    pub distinct_channels: usize,
    pub distinct_regions: usize,
    pub recent_mass: f64,
}

pub struct ConfidenceScorer {
    config: TrustConfig,
}

impl ConfidenceScorer {
    pub fn new(config: TrustConfig) -> Self {
        Self { config }
    }

    /// Decay weight of a member `age_days` old. Future timestamps count as
    /// brand new.
    pub fn recency_weight(&self, age_days: f64) -> f64 {
        let age = age_days.max(0.0);
        (-age * std::f64::consts::LN_2 / self.config.recency_half_life_days).exp()
    }

    /// Sum of recency weights for member timestamps as of `now`.
    pub fn recent_mass<'a, I>(&self, timestamps: I, now: DateTime<Utc>) -> f64
    where
        I: IntoIterator<Item = &'a DateTime<Utc>>,
    {
        timestamps
            .into_iter()
            .map(|t| self.recency_weight((now - *t).num_seconds() as f64 / 86_400.0))
            .sum()
    }

    pub fn diversity(&self, distinct_channels: usize, distinct_regions: usize) -> f64 {
        let channels = (distinct_channels as f64 / CHANNEL_COUNT).min(1.0);
        let regions = 1.0 - 1.0 / (1.0 + distinct_regions as f64);
        0.5 * channels + 0.5 * regions
    }

    fn state_factor(&self, state: ClusterState) -> f64 {
        match state {
            ClusterState::Forming => self.config.forming_factor,
            ClusterState::Stable | ClusterState::Archived => 1.0,
            ClusterState::Merged { .. } => 0.0,
        }
    }

    /// Confidence in [0, 1]. Zero trust mass yields 0.0; never fails.
    pub fn score(&self, inputs: &ConfidenceInputs) -> f64 {
        if !(inputs.trust_mass.is_finite() && inputs.trust_mass > 0.0) {
            return 0.0;
        }
        let c = &self.config;
        let support = 1.0 - (-inputs.trust_mass / c.support_scale).exp();
        let diversity = self.diversity(inputs.distinct_channels, inputs.distinct_regions);
        let recent = if inputs.recent_mass.is_finite() {
            inputs.recent_mass.max(0.0)
        } else {
            0.0
        };
        let growth = 1.0 - (-recent / c.growth_scale).exp();
        let raw = c.w_support * support + c.w_diversity * diversity + c.w_growth * growth;
        (self.state_factor(inputs.state) * raw).clamp(0.0, 1.0)
    }
}
