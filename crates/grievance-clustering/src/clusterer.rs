//! Incremental clusterer: join-or-create placement and the cluster table.
//!
//! Placement is split in two so callers can plan under a shared lock and
//! commit under an exclusive one:
//!
//! 1. [`IncrementalClusterer::plan`] looks up the nearest centroid and
//!    records a [`LookupStamp`] of what it read.
//! 2. [`IncrementalClusterer::commit`] checks the stamp is still valid and
//!    applies the decision, or fails with `StalePlacement`.
//!
//! [`IncrementalClusterer::ingest`] does both under one `&mut self`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use grievance_core::config::{ClusteringConfig, GrievanceConfig};
use grievance_core::errors::ClusteringError;
use grievance_core::traits::Clock;
use grievance_core::{Cluster, ClusterId, ClusterState, Report, ReportId};
use grievance_embeddings::{LookupStamp, SimilarityIndex};
use grievance_trust::{ConfidenceScorer, DuplicateWindow, TrustScorer};
use serde::Serialize;
use tracing::{debug, warn};

use crate::record::ClusterRecord;
use crate::snapshot::ClusteringSnapshot;

/// Where a planned report should go.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    Join { cluster_id: ClusterId, distance: f64 },
    Create,
    AlreadyPresent { cluster_id: ClusterId },
}

/// Result of [`IncrementalClusterer::plan`].
#[derive(Debug, Clone)]
pub struct PlacementPlan {
    pub report_id: ReportId,
    pub placement: Placement,
    /// `None` for `AlreadyPresent`.
    pub stamp: Option<LookupStamp>,
    /// Buckets the lookup read; `None` means it scanned the whole index.
    pub bucket_keys: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AssignmentOutcome {
    Joined { distance: f64 },
    Created,
    AlreadyPresent,
}

/// Result of committing one report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub report_id: ReportId,
    pub cluster_id: ClusterId,
    #[serde(flatten)]
    pub outcome: AssignmentOutcome,
    pub trust_weight: f64,
}

pub struct IncrementalClusterer {
    pub(crate) config: ClusteringConfig,
    pub(crate) index: SimilarityIndex,
    candidates: usize,
    pub(crate) clusters: BTreeMap<ClusterId, ClusterRecord>,
    pub(crate) reports: HashMap<ReportId, Arc<Report>>,
    pub(crate) assignments: HashMap<ReportId, ClusterId>,
    trust: TrustScorer,
    pub(crate) confidence: ConfidenceScorer,
    duplicates: DuplicateWindow,
    clock: Arc<dyn Clock>,
    next_id: u64,
    commits_since_merge: u64,
    pub(crate) version: u64,
}

impl IncrementalClusterer {
    /// Empty clusterer for `dims`-wide embeddings.
    pub fn new(config: &GrievanceConfig, dims: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: config.clustering.clone(),
            index: SimilarityIndex::new(config.index.clone(), dims),
            candidates: config.index.candidates.max(1),
            clusters: BTreeMap::new(),
            reports: HashMap::new(),
            assignments: HashMap::new(),
            trust: TrustScorer::new(config.trust.clone()),
            confidence: ConfidenceScorer::new(config.trust.clone()),
            duplicates: DuplicateWindow::new(&config.trust),
            clock,
            next_id: 1,
            commits_since_merge: 0,
            version: 0,
        }
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    pub fn dimensions(&self) -> usize {
        self.index.dimensions()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Monotonic counter bumped by every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn index(&self) -> &SimilarityIndex {
        &self.index
    }

    pub fn report_count(&self) -> usize {
        self.reports.len()
    }

    pub fn contains_report(&self, id: &ReportId) -> bool {
        self.assignments.contains_key(id)
    }

    pub fn report(&self, id: &ReportId) -> Option<&Arc<Report>> {
        self.reports.get(id)
    }

    /// Current cluster of a report.
    pub fn cluster_of(&self, id: &ReportId) -> Option<ClusterId> {
        self.assignments.get(id).map(|c| self.resolve(*c))
    }

    /// Follow merge redirects to the surviving cluster.
    pub fn resolve(&self, id: ClusterId) -> ClusterId {
        let mut current = id;
        for _ in 0..=self.clusters.len() {
            match self.clusters.get(&current).map(|r| r.cluster.state) {
                Some(ClusterState::Merged { into }) => current = into,
                _ => break,
            }
        }
        current
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Arc<Cluster>> {
        self.clusters.get(&id).map(|r| &r.cluster)
    }

    pub fn clusters(&self) -> impl Iterator<Item = &Arc<Cluster>> + '_ {
        self.clusters.values().map(|r| &r.cluster)
    }

    pub fn live_cluster_count(&self) -> usize {
        self.clusters.values().filter(|r| r.is_live()).count()
    }

    /// Decide where `report` goes without changing anything.
    pub fn plan(&self, report: &Report) -> Result<PlacementPlan, ClusteringError> {
        if let Some(existing) = self.assignments.get(&report.id) {
            return Ok(PlacementPlan {
                report_id: report.id.clone(),
                placement: Placement::AlreadyPresent {
                    cluster_id: self.resolve(*existing),
                },
                stamp: None,
                bucket_keys: None,
            });
        }
        self.check_report(report)?;
        let (neighbors, stamp) = self.index.nearest(report.embedding(), self.candidates)?;
        let placement = match neighbors.first() {
            Some(n) if n.distance <= self.config.join_threshold => Placement::Join {
                cluster_id: n.cluster_id,
                distance: n.distance,
            },
            _ => Placement::Create,
        };
        Ok(PlacementPlan {
            report_id: report.id.clone(),
            placement,
            stamp: Some(stamp),
            bucket_keys: self.index.bucket_keys(report.embedding()),
        })
    }

    /// Apply a plan. Fails with `StalePlacement` when anything the plan's
    /// lookup read has changed since.
    pub fn commit(
        &mut self,
        report: Arc<Report>,
        plan: &PlacementPlan,
    ) -> Result<Assignment, ClusteringError> {
        if plan.report_id != report.id {
            return Err(ClusteringError::InvalidReport {
                report_id: report.id.to_string(),
                reason: format!("placement was planned for {}", plan.report_id),
            });
        }
        if let Some(existing) = self.assignments.get(&report.id) {
            let cluster_id = self.resolve(*existing);
            let trust_weight = self
                .clusters
                .get(&cluster_id)
                .and_then(|r| r.cluster.member_trust.get(&report.id).copied())
                .unwrap_or(0.0);
            return Ok(Assignment {
                report_id: report.id.clone(),
                cluster_id,
                outcome: AssignmentOutcome::AlreadyPresent,
                trust_weight,
            });
        }
        let fresh = plan
            .stamp
            .as_ref()
            .is_some_and(|stamp| self.index.validate(stamp));
        if !fresh {
            return Err(ClusteringError::StalePlacement {
                report_id: report.id.to_string(),
            });
        }

        let (cluster_id, outcome, trust_weight) = match plan.placement {
            Placement::Join {
                cluster_id,
                distance,
            } => {
                let trust = self.join(cluster_id, &report)?;
                (cluster_id, AssignmentOutcome::Joined { distance }, trust)
            }
            Placement::Create => {
                let (cluster_id, trust) = self.create(&report)?;
                (cluster_id, AssignmentOutcome::Created, trust)
            }
            Placement::AlreadyPresent { .. } => {
                return Err(ClusteringError::StalePlacement {
                    report_id: report.id.to_string(),
                })
            }
        };

        debug!(
            report_id = %report.id,
            cluster_id = %cluster_id,
            outcome = ?outcome,
            trust_weight,
            "report placed"
        );
        self.assignments.insert(report.id.clone(), cluster_id);
        self.reports.insert(report.id.clone(), report.clone());
        self.commits_since_merge += 1;
        self.version += 1;
        let now = self.clock.now();
        let min_stable = self.config.min_stable_size;
        if let Some(record) = self.clusters.get_mut(&cluster_id) {
            record.refresh(now, min_stable, &self.confidence);
        }
        Ok(Assignment {
            report_id: report.id.clone(),
            cluster_id,
            outcome,
            trust_weight,
        })
    }

    /// Plan and commit one report, then run a merge pass if one is due.
    pub fn ingest(&mut self, report: Arc<Report>) -> Result<Assignment, ClusteringError> {
        let plan = self.plan(&report)?;
        self.commit_and_merge(report, &plan)
    }

    /// Commit a plan, then run a merge pass if one is due. The returned
    /// cluster id already follows any merge that pass made.
    pub fn commit_and_merge(
        &mut self,
        report: Arc<Report>,
        plan: &PlacementPlan,
    ) -> Result<Assignment, ClusteringError> {
        let mut assignment = self.commit(report, plan)?;
        if let Err(err) = self.maybe_merge() {
            warn!(error = %err, "merge pass failed, rebuilding index");
            self.rebuild_index()?;
        }
        assignment.cluster_id = self.resolve(assignment.cluster_id);
        Ok(assignment)
    }

    /// Run a merge pass when `merge_interval` commits have accumulated.
    pub fn maybe_merge(&mut self) -> Result<usize, ClusteringError> {
        if self.commits_since_merge < self.config.merge_interval {
            return Ok(0);
        }
        self.commits_since_merge = 0;
        Ok(self.merge_pass()?.len())
    }

    /// Recompute derived fields of every non-merged cluster as of now and
    /// forget duplicate sources that have gone quiet.
    pub fn refresh(&mut self) {
        let now = self.clock.now();
        let min_stable = self.config.min_stable_size;
        for record in self.clusters.values_mut() {
            record.refresh(now, min_stable, &self.confidence);
        }
        self.duplicates.prune(now);
        self.version += 1;
    }

    /// Sources the duplicate window still remembers.
    pub fn tracked_sources(&self) -> usize {
        self.duplicates.sources()
    }

    /// Rebuild the similarity index from the live cluster table.
    pub fn rebuild_index(&mut self) -> Result<(), ClusteringError> {
        let entries: Vec<_> = self
            .clusters
            .values()
            .filter(|r| r.is_live())
            .map(|r| (r.id(), r.centroid().to_vec(), r.size()))
            .collect();
        let count = entries.len();
        self.index.rebuild_from(entries)?;
        self.version += 1;
        warn!(clusters = count, "similarity index rebuilt from cluster table");
        Ok(())
    }

    /// Point-in-time copy for publishing. Cluster records are shared, not
    /// cloned.
    pub fn snapshot(&self) -> ClusteringSnapshot {
        ClusteringSnapshot {
            version: self.version,
            taken_at: self.clock.now(),
            clusters: self
                .clusters
                .iter()
                .map(|(id, r)| (*id, Arc::clone(&r.cluster)))
                .collect(),
            activity: self
                .clusters
                .iter()
                .filter(|(_, r)| !matches!(r.cluster.state, ClusterState::Merged { .. }))
                .map(|(id, r)| (*id, Arc::clone(&r.times)))
                .collect(),
            total_reports: self.reports.len(),
        }
    }

    /// Id the next new cluster will get.
    pub(crate) fn peek_id(&self) -> u64 {
        self.next_id
    }

    pub(crate) fn allocate_id(&mut self) -> ClusterId {
        let id = ClusterId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn check_report(&self, report: &Report) -> Result<(), ClusteringError> {
        let dims = report.embedding().len();
        if dims != self.index.dimensions() {
            return Err(ClusteringError::InvalidReport {
                report_id: report.id.to_string(),
                reason: format!(
                    "embedding has {dims} dimensions, index expects {}",
                    self.index.dimensions()
                ),
            });
        }
        Ok(())
    }

    fn join(&mut self, cluster_id: ClusterId, report: &Report) -> Result<f64, ClusteringError> {
        let (trust, centroid, size) = {
            let record = self
                .clusters
                .get(&cluster_id)
                .ok_or_else(|| ClusteringError::UnknownCluster {
                    cluster_id: cluster_id.to_string(),
                })?;
            if !record.is_live() {
                return Err(ClusteringError::ClusterClosed {
                    cluster_id: cluster_id.to_string(),
                    state: record.cluster.state.to_string(),
                });
            }
            let duplicate = self.duplicates.is_duplicate(
                &report.source_key(),
                report.fingerprint,
                report.submitted_at,
            );
            let trust = self
                .trust
                .score(report, &record.cluster.geo_distribution, duplicate)
                .weight;
            (trust, record.centroid_with(report.embedding()), record.size() + 1)
        };
        self.index.update(cluster_id, &centroid, size)?;
        self.duplicates
            .check_and_record(&report.source_key(), report.fingerprint, report.submitted_at);
        if let Some(record) = self.clusters.get_mut(&cluster_id) {
            record.add_member(report, trust);
        }
        Ok(trust)
    }

    fn create(&mut self, report: &Report) -> Result<(ClusterId, f64), ClusteringError> {
        let duplicate =
            self.duplicates
                .is_duplicate(&report.source_key(), report.fingerprint, report.submitted_at);
        let trust = self.trust.score(report, &BTreeMap::new(), duplicate).weight;
        let cluster_id = ClusterId::new(self.next_id);
        self.index.insert(cluster_id, report.embedding(), 1)?;
        self.next_id += 1;
        self.duplicates
            .check_and_record(&report.source_key(), report.fingerprint, report.submitted_at);
        self.clusters
            .insert(cluster_id, ClusterRecord::seed(cluster_id, report, trust));
        Ok((cluster_id, trust))
    }
}

#[cfg(feature = "test-utils")]
impl IncrementalClusterer {
    /// Direct index access, bypassing the cluster table. Lets tests put the
    /// index out of step with the clusters.
    pub fn index_mut(&mut self) -> &mut SimilarityIndex {
        &mut self.index
    }
}
