//! Cluster: a group of reports believed to describe one underlying issue.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ClusterId, ReportId};

/// Lifecycle state of a cluster.
///
/// `Forming` → `Stable` once `min_stable_size` is reached. `Merged` and
/// `Archived` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ClusterState {
    Forming,
    Stable,
    Merged { into: ClusterId },
    Archived,
}

impl ClusterState {
    /// Live clusters accept new reports and are present in the index.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Forming | Self::Stable)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_live()
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forming => write!(f, "forming"),
            Self::Stable => write!(f, "stable"),
            Self::Merged { into } => write!(f, "merged into {into}"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

/// Rolling-window activity metrics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrendMetrics {
    pub count_30d: u64,
    /// Percent change of the last 7 days against the 7 before.
    pub growth_rate: f64,
}

/// A cluster record. Mutated only by the clusterer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub state: ClusterState,
    /// Running mean of member embeddings.
    pub centroid: Vec<f32>,
    pub member_ids: BTreeSet<ReportId>,
    pub title: String,
    pub summary: String,
    pub trend_metrics: TrendMetrics,
    pub geo_distribution: BTreeMap<String, u64>,
    /// Members per welfare scheme code.
    #[serde(default)]
    pub scheme_mentions: BTreeMap<String, u64>,
    pub confidence_score: f64,
    /// Trust weight of each member, fixed when the member was assigned.
    pub member_trust: BTreeMap<ReportId, f64>,
    pub created_at: DateTime<Utc>,
    pub last_report_at: DateTime<Utc>,
    /// Bumped on every membership change.
    pub version: u64,
}

impl Cluster {
    pub fn size(&self) -> usize {
        self.member_ids.len()
    }

    pub fn is_live(&self) -> bool {
        self.state.is_live()
    }

    /// Sum of member trust weights.
    pub fn trust_mass(&self) -> f64 {
        self.member_trust.values().sum()
    }

    pub fn mean_trust(&self) -> f64 {
        if self.member_trust.is_empty() {
            0.0
        } else {
            self.trust_mass() / self.member_trust.len() as f64
        }
    }

    /// Region with the most members. Ties go to the lexicographically
    /// smaller name.
    pub fn majority_region(&self) -> Option<&str> {
        self.geo_distribution
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(region, _)| region.as_str())
    }

    /// Most mentioned scheme, same tie rule as `majority_region`.
    pub fn primary_scheme(&self) -> Option<&str> {
        self.scheme_mentions
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(code, _)| code.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty(id: u64) -> Cluster {
        let now = Utc::now();
        Cluster {
            id: ClusterId::new(id),
            state: ClusterState::Forming,
            centroid: vec![],
            member_ids: BTreeSet::new(),
            title: String::new(),
            summary: String::new(),
            trend_metrics: TrendMetrics::default(),
            geo_distribution: BTreeMap::new(),
            scheme_mentions: BTreeMap::new(),
            confidence_score: 0.0,
            member_trust: BTreeMap::new(),
            created_at: now,
            last_report_at: now,
            version: 0,
        }
    }

    #[test]
    fn majority_region_breaks_ties_by_name() {
        let mut c = empty(1);
        c.geo_distribution.insert("Odisha".into(), 3);
        c.geo_distribution.insert("Bihar".into(), 3);
        c.geo_distribution.insert("Assam".into(), 1);
        assert_eq!(c.majority_region(), Some("Bihar"));
    }

    #[test]
    fn primary_scheme_is_the_most_mentioned() {
        let mut c = empty(1);
        assert_eq!(c.primary_scheme(), None);
        c.scheme_mentions.insert("PDS".into(), 2);
        c.scheme_mentions.insert("NSAP".into(), 2);
        c.scheme_mentions.insert("PMAY".into(), 1);
        assert_eq!(c.primary_scheme(), Some("NSAP"));
    }

    #[test]
    fn mean_trust_of_empty_cluster_is_zero() {
        assert_eq!(empty(1).mean_trust(), 0.0);
    }

    #[test]
    fn terminal_states_are_not_live() {
        assert!(ClusterState::Forming.is_live());
        assert!(ClusterState::Stable.is_live());
        assert!(ClusterState::Archived.is_terminal());
        assert!(ClusterState::Merged { into: ClusterId::new(2) }.is_terminal());
    }
}
