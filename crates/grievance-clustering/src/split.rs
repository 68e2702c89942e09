//! Split pass: break up stable clusters that have grown too dispersed.

use std::sync::Arc;

use grievance_core::config::DistanceMetric;
use grievance_core::errors::ClusteringError;
use grievance_core::{ClusterId, ClusterState, Report};
use grievance_embeddings::distance;
use serde::Serialize;
use tracing::info;

use crate::clusterer::IncrementalClusterer;
use crate::record::ClusterRecord;

const MAX_ITERATIONS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitRecord {
    pub source: ClusterId,
    pub created: ClusterId,
    pub kept_size: usize,
    pub moved_size: usize,
    pub dispersion: f64,
}

impl IncrementalClusterer {
    pub fn split_pass(&mut self) -> Result<Vec<SplitRecord>, ClusteringError> {
        let min = self.config.min_stable_size;
        let candidates: Vec<ClusterId> = self
            .clusters
            .values()
            .filter(|r| r.cluster.state == ClusterState::Stable && r.size() >= 2 * min)
            .map(ClusterRecord::id)
            .collect();
        let mut splits = Vec::new();
        for id in candidates {
            if let Some(split) = self.try_split(id)? {
                info!(
                    source = %split.source,
                    created = %split.created,
                    kept = split.kept_size,
                    moved = split.moved_size,
                    dispersion = split.dispersion,
                    "cluster split"
                );
                splits.push(split);
            }
        }
        if !splits.is_empty() {
            self.version += 1;
        }
        Ok(splits)
    }

    fn try_split(&mut self, id: ClusterId) -> Result<Option<SplitRecord>, ClusteringError> {
        let metric = self.index.metric();
        let Some(record) = self.clusters.get(&id) else {
            return Ok(None);
        };
        // member order is report-id order
        let members: Vec<(Arc<Report>, f64)> = record
            .cluster
            .member_trust
            .iter()
            .filter_map(|(rid, trust)| self.reports.get(rid).map(|r| (Arc::clone(r), *trust)))
            .collect();
        if members.len() != record.size() {
            return Ok(None);
        }
        let dispersion = members
            .iter()
            .map(|(r, _)| distance(metric, r.embedding(), record.centroid()))
            .sum::<f64>()
            / members.len() as f64;
        if dispersion <= self.config.split_dispersion {
            return Ok(None);
        }

        let vectors: Vec<&[f32]> = members.iter().map(|(r, _)| r.embedding()).collect();
        let groups = two_means(&vectors, metric);
        let (first, second): (Vec<_>, Vec<_>) = members
            .iter()
            .zip(&groups)
            .partition(|(_, in_second)| !**in_second);
        let first: Vec<(&Report, f64)> = first
            .into_iter()
            .map(|((r, t), _)| (r.as_ref(), *t))
            .collect();
        let second: Vec<(&Report, f64)> = second
            .into_iter()
            .map(|((r, t), _)| (r.as_ref(), *t))
            .collect();
        let min = self.config.min_stable_size;
        if first.len() < min || second.len() < min {
            return Ok(None);
        }
        // the first member always lands in `first`, so ties keep the half
        // holding the smallest report id
        let (keep, moved) = if second.len() > first.len() {
            (second, first)
        } else {
            (first, second)
        };

        let (created_at, version) = (record.cluster.created_at, record.cluster.version);
        let Some(mut kept) = ClusterRecord::from_members(id, ClusterState::Stable, &keep) else {
            return Ok(None);
        };
        let new_id = ClusterId::new(self.peek_id());
        let Some(split_off) = ClusterRecord::from_members(new_id, ClusterState::Stable, &moved)
        else {
            return Ok(None);
        };
        let gap = distance(metric, kept.centroid(), split_off.centroid());
        if gap <= self.config.merge_threshold {
            return Ok(None);
        }

        self.index.update(id, kept.centroid(), kept.size())?;
        self.index
            .insert(new_id, split_off.centroid(), split_off.size())?;
        self.allocate_id();

        {
            let cluster = Arc::make_mut(&mut kept.cluster);
            cluster.created_at = created_at;
            cluster.version = version + 1;
        }
        for (report, _) in &moved {
            self.assignments.insert(report.id.clone(), new_id);
        }
        let split = SplitRecord {
            source: id,
            created: new_id,
            kept_size: kept.size(),
            moved_size: split_off.size(),
            dispersion,
        };
        let now = self.now();
        for mut record in [kept, split_off] {
            record.refresh(now, min, &self.confidence);
            self.clusters.insert(record.id(), record);
        }
        Ok(Some(split))
    }
}

/// Deterministic 2-means. Seeds are the member farthest from the mean and
/// the member farthest from that one. Returns `true` for members of the
/// second group; index 0 is always in the first.
pub fn two_means(vectors: &[&[f32]], metric: DistanceMetric) -> Vec<bool> {
    let n = vectors.len();
    if n < 2 {
        return vec![false; n];
    }
    let overall = mean(vectors.iter().copied());
    let seed_a = farthest(vectors, &overall, metric);
    let seed_b = farthest(vectors, vectors[seed_a], metric);
    let mut a = vectors[seed_a].to_vec();
    let mut b = vectors[seed_b].to_vec();

    let mut groups = vec![false; n];
    for _ in 0..MAX_ITERATIONS {
        let next: Vec<bool> = vectors
            .iter()
            .map(|v| distance(metric, v, &b) < distance(metric, v, &a))
            .collect();
        let settled = next == groups;
        groups = next;
        if settled {
            break;
        }
        let (ga, gb): (Vec<_>, Vec<_>) = vectors
            .iter()
            .zip(&groups)
            .partition(|(_, second)| !**second);
        if ga.is_empty() || gb.is_empty() {
            break;
        }
        a = mean(ga.into_iter().map(|(v, _)| *v));
        b = mean(gb.into_iter().map(|(v, _)| *v));
    }
    if groups[0] {
        groups.iter_mut().for_each(|g| *g = !*g);
    }
    groups
}

fn farthest(vectors: &[&[f32]], from: &[f32], metric: DistanceMetric) -> usize {
    let mut best = (0, f64::NEG_INFINITY);
    for (i, v) in vectors.iter().enumerate() {
        let d = distance(metric, v, from);
        if d > best.1 {
            best = (i, d);
        }
    }
    best.0
}

fn mean<'a>(vectors: impl Iterator<Item = &'a [f32]>) -> Vec<f32> {
    let mut sum: Vec<f64> = Vec::new();
    let mut count = 0usize;
    for v in vectors {
        if sum.is_empty() {
            sum = vec![0.0; v.len()];
        }
        for (s, x) in sum.iter_mut().zip(v) {
            *s += *x as f64;
        }
        count += 1;
    }
    let n = count.max(1) as f64;
    sum.into_iter().map(|s| (s / n) as f32).collect()
}

#[cfg(test)]
mod tests {
    use grievance_core::traits::FixedClock;
    use grievance_core::GrievanceConfig;
    use test_fixtures::{jittered, ts, ReportBuilder};

    use super::*;

    #[test]
    fn two_means_separates_axes() {
        let a0 = [1.0f32, 0.0, 0.0];
        let a1 = [0.98f32, 0.05, 0.0];
        let b0 = [0.0f32, 1.0, 0.0];
        let b1 = [0.04f32, 0.99, 0.0];
        let vectors: [&[f32]; 4] = [&a0, &b0, &a1, &b1];
        let groups = two_means(&vectors, DistanceMetric::Cosine);
        assert_eq!(groups, vec![false, true, false, true]);
    }

    #[test]
    fn dispersed_cluster_is_split() {
        let mut config = GrievanceConfig::default();
        config.clustering.join_threshold = 1.2;
        config.clustering.merge_threshold = 1.2;
        config.clustering.min_stable_size = 2;
        config.clustering.split_dispersion = 0.25;
        config.clustering.merge_interval = 1_000;
        let mut c = IncrementalClusterer::new(&config, 4, Arc::new(FixedClock::new(ts(5))));
        for (id, axis) in [("a1", 0), ("a2", 0), ("b1", 1), ("b2", 1)] {
            c.ingest(
                ReportBuilder::new(id)
                    .day(1)
                    .embedding(jittered(4, axis, id))
                    .build_arc(),
            )
            .unwrap();
        }
        assert_eq!(c.live_cluster_count(), 1);
        c.config.join_threshold = 0.5;
        c.config.merge_threshold = 0.5;

        let splits = c.split_pass().unwrap();
        assert_eq!(splits.len(), 1);
        let split = &splits[0];
        assert_eq!((split.kept_size, split.moved_size), (2, 2));
        assert_eq!(c.cluster_of(&"a1".into()), Some(split.source));
        assert_eq!(c.cluster_of(&"b2".into()), Some(split.created));
        assert!(c.index().contains(split.created));
        assert_eq!(c.cluster(split.created).unwrap().state, ClusterState::Stable);
    }
}
