//! Point-in-time view of the cluster table.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use grievance_core::{Cluster, ClusterId, ClusterState};

/// Immutable copy of the cluster table. Cheap to take: records and
/// activity series are shared with the clusterer until it next writes
/// them.
#[derive(Debug, Clone)]
pub struct ClusteringSnapshot {
    pub version: u64,
    pub taken_at: DateTime<Utc>,
    pub clusters: BTreeMap<ClusterId, Arc<Cluster>>,
    /// Sorted member timestamps of every non-merged cluster.
    pub activity: BTreeMap<ClusterId, Arc<Vec<DateTime<Utc>>>>,
    pub total_reports: usize,
}

impl ClusteringSnapshot {
    pub fn empty(taken_at: DateTime<Utc>) -> Self {
        Self {
            version: 0,
            taken_at,
            clusters: BTreeMap::new(),
            activity: BTreeMap::new(),
            total_reports: 0,
        }
    }

    pub fn get(&self, id: ClusterId) -> Option<&Arc<Cluster>> {
        self.clusters.get(&id)
    }

    /// Follow merge redirects to the surviving cluster.
    pub fn resolve(&self, id: ClusterId) -> ClusterId {
        let mut current = id;
        for _ in 0..=self.clusters.len() {
            match self.clusters.get(&current).map(|c| c.state) {
                Some(ClusterState::Merged { into }) => current = into,
                _ => break,
            }
        }
        current
    }

    pub fn live(&self) -> impl Iterator<Item = &Arc<Cluster>> + '_ {
        self.clusters.values().filter(|c| c.is_live())
    }

    /// All report timestamps, sorted.
    pub fn all_activity(&self) -> Vec<DateTime<Utc>> {
        let mut times: Vec<DateTime<Utc>> = self
            .activity
            .values()
            .flat_map(|t| t.iter().copied())
            .collect();
        times.sort();
        times
    }
}
