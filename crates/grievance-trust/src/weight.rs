//! Per-report trust weight.
//!
//! `weight = channel_prior * geo_plausibility * duplicate_factor`, in [0, 1].

use std::collections::BTreeMap;

use grievance_core::config::TrustConfig;
use grievance_core::{Report, SourceChannel};
use serde::{Deserialize, Serialize};

/// The factors behind a trust weight, kept for debugging and logs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustBreakdown {
    pub channel_prior: f64,
    pub geo_plausibility: f64,
    pub duplicate_factor: f64,
    pub weight: f64,
}

pub struct TrustScorer {
    config: TrustConfig,
}

impl TrustScorer {
    pub fn new(config: TrustConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrustConfig {
        &self.config
    }

    pub fn channel_prior(&self, channel: SourceChannel) -> f64 {
        match channel {
            SourceChannel::FieldAudit => self.config.prior_field_audit,
            SourceChannel::Text => self.config.prior_text,
            SourceChannel::Voice => self.config.prior_voice,
        }
    }

    /// How plausible `region` is for a cluster with this geo distribution.
    ///
    /// A cluster with no regional evidence yet accepts anything; a report
    /// without a region is mildly discounted; otherwise majority > minority
    /// > unseen.
    pub fn geo_plausibility(&self, region: Option<&str>, distribution: &BTreeMap<String, u64>) -> f64 {
        let Some(region) = region else {
            return if distribution.is_empty() {
                1.0
            } else {
                self.config.geo_untagged
            };
        };
        if distribution.is_empty() {
            return 1.0;
        }
        let max = distribution.values().copied().max().unwrap_or(0);
        match distribution.get(region) {
            Some(count) if *count == max => self.config.geo_majority,
            Some(_) => self.config.geo_minority,
            None => self.config.geo_unseen,
        }
    }

    /// Trust weight of `report` joining a cluster with `distribution`.
    /// `duplicate` is whether the duplicate window flagged the report.
    pub fn score(
        &self,
        report: &Report,
        distribution: &BTreeMap<String, u64>,
        duplicate: bool,
    ) -> TrustBreakdown {
        let channel_prior = self.channel_prior(report.source_channel);
        let geo_plausibility = self.geo_plausibility(report.region(), distribution);
        let duplicate_factor = if duplicate {
            self.config.duplicate_penalty
        } else {
            1.0
        };
        let weight = channel_prior * geo_plausibility * duplicate_factor;
        let weight = if weight.is_finite() {
            weight.clamp(0.0, 1.0)
        } else {
            0.0
        };
        TrustBreakdown {
            channel_prior,
            geo_plausibility,
            duplicate_factor,
            weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_fixtures::ReportBuilder;

    fn scorer() -> TrustScorer {
        TrustScorer::new(TrustConfig::default())
    }

    fn dist(pairs: &[(&str, u64)]) -> BTreeMap<String, u64> {
        pairs.iter().map(|(r, c)| (r.to_string(), *c)).collect()
    }

    #[test]
    fn field_audit_outranks_voice() {
        let s = scorer();
        assert!(s.channel_prior(SourceChannel::FieldAudit) > s.channel_prior(SourceChannel::Text));
        assert!(s.channel_prior(SourceChannel::Text) > s.channel_prior(SourceChannel::Voice));
    }

    #[test]
    fn geo_plausibility_ladder() {
        let s = scorer();
        let d = dist(&[("Bihar", 5), ("Odisha", 2)]);
        assert_eq!(s.geo_plausibility(Some("Bihar"), &d), 1.0);
        assert_eq!(s.geo_plausibility(Some("Odisha"), &d), 0.8);
        assert_eq!(s.geo_plausibility(Some("Kerala"), &d), 0.5);
        assert_eq!(s.geo_plausibility(None, &d), 0.85);
        assert_eq!(s.geo_plausibility(Some("Kerala"), &BTreeMap::new()), 1.0);
        assert_eq!(s.geo_plausibility(None, &BTreeMap::new()), 1.0);
    }

    #[test]
    fn duplicate_penalty_multiplies() {
        let report = ReportBuilder::new("r1")
            .channel(SourceChannel::FieldAudit)
            .region("Bihar")
            .build();
        let d = dist(&[("Bihar", 1)]);
        let clean = scorer().score(&report, &d, false);
        let dup = scorer().score(&report, &d, true);
        assert!((clean.weight - 0.95).abs() < 1e-12);
        assert!((dup.weight - 0.95 * 0.25).abs() < 1e-12);
    }
}
