//! Periodic maintenance: quarantine retries, merge/split/archive passes,
//! drift checks and the causal rebuild, ending in one publish.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use grievance_causal::{CausalCycleReport, CausalInput, ClusterSeries};
use grievance_clustering::{ClusteringSnapshot, DriftReport, MergeRecord, SplitRecord};
use grievance_core::errors::RecoveryAction;
use grievance_core::{ClusterId, ClusterState};
use serde::Serialize;
use tracing::{info, warn};

use crate::engine::GrievanceEngine;
use crate::pipeline::ReportStatus;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QuarantineSummary {
    pub retried: usize,
    pub recovered: usize,
    pub dropped: usize,
    /// Still waiting after this cycle.
    pub pending: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceReport {
    pub cycle: u64,
    pub quarantine: QuarantineSummary,
    pub merges: Vec<MergeRecord>,
    pub splits: Vec<SplitRecord>,
    pub archived: Vec<ClusterId>,
    pub drift: Vec<DriftReport>,
    /// `None` when the clusterer could not be read this cycle.
    pub causal: Option<CausalCycleReport>,
    pub snapshot_version: u64,
    pub elapsed_ms: u64,
    /// Pass failures; the cycle carries on past each one.
    pub errors: Vec<String>,
}

#[derive(Default)]
struct PassResults {
    merges: Vec<MergeRecord>,
    splits: Vec<SplitRecord>,
    archived: Vec<ClusterId>,
    errors: Vec<String>,
}

impl GrievanceEngine {
    /// Run one maintenance cycle. Never fails as a whole; pass errors are
    /// logged and collected in the report.
    pub fn run_cycle(&self) -> MaintenanceReport {
        let started = Instant::now();
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let quarantine = self.retry_quarantine();

        let mut errors = Vec::new();
        let passes = self
            .store
            .with_write("maintenance", |c| {
                let mut out = PassResults::default();
                match c.merge_pass() {
                    Ok(merges) => out.merges = merges,
                    Err(err) => out.errors.push(format!("merge: {err}")),
                }
                match c.split_pass() {
                    Ok(splits) => out.splits = splits,
                    Err(err) => out.errors.push(format!("split: {err}")),
                }
                match c.archive_sweep() {
                    Ok(archived) => out.archived = archived,
                    Err(err) => out.errors.push(format!("archive: {err}")),
                }
                if !out.errors.is_empty() {
                    if let Err(err) = c.rebuild_index() {
                        out.errors.push(format!("index rebuild: {err}"));
                    }
                }
                c.refresh();
                out
            })
            .unwrap_or_else(|err| PassResults {
                errors: vec![format!("passes skipped: {err}")],
                ..PassResults::default()
            });
        for err in &passes.errors {
            warn!(cycle, error = %err, "maintenance pass failed");
        }
        errors.extend(passes.errors);

        let drift = self
            .store
            .with_read("drift", |c| c.drift_check())
            .unwrap_or_else(|err| {
                errors.push(format!("drift: {err}"));
                Vec::new()
            });

        let (causal, snapshot_version) = match self.store.with_read("snapshot", |c| c.snapshot()) {
            Ok(clustering) => {
                let input = causal_input(&clustering);
                let (report, graph) = {
                    let mut builder = self.lock_causal();
                    let report = builder.rebuild(&input);
                    (report, Arc::new(builder.snapshot()))
                };
                let published = self.store.publish(clustering, Some(graph));
                (Some(report), published.version)
            }
            Err(err) => {
                errors.push(format!("snapshot: {err}"));
                (None, self.store.current().version)
            }
        };

        let report = MaintenanceReport {
            cycle,
            quarantine,
            merges: passes.merges,
            splits: passes.splits,
            archived: passes.archived,
            drift,
            causal,
            snapshot_version,
            elapsed_ms: started.elapsed().as_millis() as u64,
            errors,
        };
        info!(
            cycle,
            merges = report.merges.len(),
            splits = report.splits.len(),
            archived = report.archived.len(),
            drifted = report.drift.iter().filter(|d| d.drift_detected).count(),
            recovered = report.quarantine.recovered,
            dropped = report.quarantine.dropped,
            causal_edges = report.causal.as_ref().map_or(0, |c| c.inferred_edges),
            elapsed_ms = report.elapsed_ms,
            "maintenance cycle complete"
        );
        report
    }

    /// Retry every quarantined report once.
    fn retry_quarantine(&self) -> QuarantineSummary {
        let entries = self.lock_quarantine().drain();
        let mut summary = QuarantineSummary {
            retried: entries.len(),
            ..QuarantineSummary::default()
        };
        for entry in entries {
            let report = Arc::clone(&entry.report);
            let err = match self.try_place(&report) {
                Ok(assignment) => {
                    self.registry.insert(
                        report.id.clone(),
                        ReportStatus::Clustered {
                            cluster_id: assignment.cluster_id,
                        },
                    );
                    summary.recovered += 1;
                    continue;
                }
                Err(err) => err,
            };
            let action = RecoveryAction::for_error(&err);
            if action == RecoveryAction::Rebuild {
                self.rebuild_index();
            }
            let now = self.clock.now();
            let dropped = if action.is_retryable() {
                self.lock_quarantine().retry_failed(entry, err.to_string(), now)
            } else {
                Some(self.lock_quarantine().reject(report.id.clone(), err.to_string(), now))
            };
            if let Some(dropped) = dropped {
                self.registry.insert(
                    dropped.report_id.clone(),
                    ReportStatus::Rejected {
                        reason: dropped.reason.clone(),
                    },
                );
                summary.dropped += 1;
            }
        }
        summary.pending = self.lock_quarantine().len();
        summary
    }
}

/// Live clusters plus the merge redirects, as the causal builder wants them.
pub(crate) fn causal_input(snapshot: &ClusteringSnapshot) -> CausalInput {
    let clusters = snapshot
        .live()
        .map(|cluster| ClusterSeries {
            id: cluster.id,
            title: cluster.title.clone(),
            times: snapshot
                .activity
                .get(&cluster.id)
                .cloned()
                .unwrap_or_default(),
            geo: cluster.geo_distribution.clone(),
            size: cluster.size(),
            count_30d: cluster.trend_metrics.count_30d,
            confidence: cluster.confidence_score,
            stable: cluster.state == ClusterState::Stable,
        })
        .collect();
    let redirects: BTreeMap<ClusterId, ClusterId> = snapshot
        .clusters
        .values()
        .filter_map(|cluster| match cluster.state {
            ClusterState::Merged { into } => Some((cluster.id, into)),
            _ => None,
        })
        .collect();
    CausalInput {
        as_of: snapshot.taken_at,
        clusters,
        redirects,
    }
}
