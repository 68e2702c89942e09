//! Merge pass: fold clusters that describe the same issue into one.

use std::collections::BTreeSet;

use grievance_core::errors::ClusteringError;
use grievance_core::ClusterId;
use grievance_embeddings::distance;
use serde::Serialize;
use tracing::info;

use crate::clusterer::IncrementalClusterer;
use crate::record::ClusterRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeRecord {
    pub survivor: ClusterId,
    pub retired: ClusterId,
    pub distance: f64,
    pub overlap: f64,
}

impl IncrementalClusterer {
    /// Merge every qualifying pair of live clusters. Pairs are visited in
    /// ascending id order; a cluster retired earlier in the pass is
    /// skipped, and the next pass picks up what it missed.
    pub fn merge_pass(&mut self) -> Result<Vec<MergeRecord>, ClusteringError> {
        let pairs = self.merge_candidates()?;
        let mut merged = Vec::new();
        for (a, b) in pairs {
            let (Some(ra), Some(rb)) = (self.clusters.get(&a), self.clusters.get(&b)) else {
                continue;
            };
            if !ra.is_live() || !rb.is_live() {
                continue;
            }
            let gap = distance(self.index.metric(), ra.centroid(), rb.centroid());
            if gap > self.config.merge_threshold {
                continue;
            }
            let overlap = self.overlap(ra, rb);
            if overlap < self.config.merge_overlap_ratio {
                continue;
            }
            let (survivor, retired) = pick_survivor(ra, rb);
            self.merge_into(survivor, retired)?;
            info!(
                survivor = %survivor,
                retired = %retired,
                distance = gap,
                overlap,
                "clusters merged"
            );
            merged.push(MergeRecord {
                survivor,
                retired,
                distance: gap,
                overlap,
            });
        }
        if !merged.is_empty() {
            self.version += 1;
        }
        Ok(merged)
    }

    /// Ascending-id pairs of live clusters whose centroids lie within
    /// `merge_threshold`, as seen by the index.
    fn merge_candidates(&self) -> Result<BTreeSet<(ClusterId, ClusterId)>, ClusteringError> {
        let mut pairs = BTreeSet::new();
        let k = self.index.len().min(16);
        for (id, record) in self.clusters.iter().filter(|(_, r)| r.is_live()) {
            let (neighbors, _) = self.index.nearest(record.centroid(), k)?;
            for n in neighbors {
                if n.cluster_id != *id && n.distance <= self.config.merge_threshold {
                    pairs.insert((n.cluster_id.min(*id), n.cluster_id.max(*id)));
                }
            }
        }
        Ok(pairs)
    }

    /// Trust mass of members lying within `join_threshold` of the other
    /// cluster's centroid, over the pair's total trust mass.
    fn overlap(&self, a: &ClusterRecord, b: &ClusterRecord) -> f64 {
        let total = a.cluster.trust_mass() + b.cluster.trust_mass();
        if total <= 0.0 || !total.is_finite() {
            return 0.0;
        }
        let near = self.near_mass(a, b.centroid()) + self.near_mass(b, a.centroid());
        (near / total).clamp(0.0, 1.0)
    }

    fn near_mass(&self, record: &ClusterRecord, centroid: &[f32]) -> f64 {
        let metric = self.index.metric();
        record
            .cluster
            .member_trust
            .iter()
            .filter(|(id, _)| {
                self.reports.get(*id).is_some_and(|r| {
                    distance(metric, r.embedding(), centroid) <= self.config.join_threshold
                })
            })
            .map(|(_, trust)| *trust)
            .sum()
    }

    /// Fold `retired` into `survivor`. The index is updated before the
    /// cluster table so an index failure leaves the table untouched.
    pub(crate) fn merge_into(
        &mut self,
        survivor: ClusterId,
        retired: ClusterId,
    ) -> Result<(), ClusteringError> {
        let unknown = |id: ClusterId| ClusteringError::UnknownCluster {
            cluster_id: id.to_string(),
        };
        let loser = self.clusters.get(&retired).ok_or_else(|| unknown(retired))?.clone();
        let (centroid, size) = {
            let winner = self.clusters.get(&survivor).ok_or_else(|| unknown(survivor))?;
            (winner.centroid_merged(&loser), winner.size() + loser.size())
        };
        self.index.update(survivor, &centroid, size)?;
        self.index.remove(retired)?;

        for report_id in &loser.cluster.member_ids {
            self.assignments.insert(report_id.clone(), survivor);
        }
        let now = self.now();
        let min_stable = self.config.min_stable_size;
        if let Some(winner) = self.clusters.get_mut(&survivor) {
            winner.absorb(&loser);
            winner.refresh(now, min_stable, &self.confidence);
        }
        if let Some(record) = self.clusters.get_mut(&retired) {
            record.retire_into(survivor);
        }
        Ok(())
    }
}

/// Higher confidence survives, then the larger cluster, then the smaller
/// id. Returns `(survivor, retired)`.
fn pick_survivor(a: &ClusterRecord, b: &ClusterRecord) -> (ClusterId, ClusterId) {
    let key = |r: &ClusterRecord| (r.cluster.confidence_score, r.size());
    let (ka, kb) = (key(a), key(b));
    let a_wins = match ka.0.total_cmp(&kb.0) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => match ka.1.cmp(&kb.1) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => a.id() < b.id(),
        },
    };
    if a_wins {
        (a.id(), b.id())
    } else {
        (b.id(), a.id())
    }
}
