//! Write path: normalize in parallel, schedule by neighbourhood, place
//! optimistically, quarantine what fails.

use std::sync::Arc;

use grievance_clustering::Assignment;
use grievance_core::errors::{ClusteringError, IngestError, RecoveryAction};
use grievance_core::{ClusterId, GrievanceError, GrievanceResult, RawReport, Report, ReportId};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::engine::GrievanceEngine;
use crate::scheduler::partition;

/// Per-report result of an ingest call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    Clustered {
        #[serde(flatten)]
        assignment: Assignment,
    },
    /// Failed transiently; retried on the next maintenance cycle.
    Quarantined { report_id: String, reason: String },
    /// Never clustered.
    Rejected { report_id: String, reason: String },
}

impl IngestOutcome {
    pub fn report_id(&self) -> &str {
        match self {
            Self::Clustered { assignment } => assignment.report_id.as_str(),
            Self::Quarantined { report_id, .. } | Self::Rejected { report_id, .. } => report_id,
        }
    }

    pub fn cluster_id(&self) -> Option<ClusterId> {
        match self {
            Self::Clustered { assignment } => Some(assignment.cluster_id),
            _ => None,
        }
    }
}

/// Last known state of a submitted report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportStatus {
    Clustered { cluster_id: ClusterId },
    Quarantined { reason: String },
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// One outcome per submitted report, in submission order.
    pub outcomes: Vec<IngestOutcome>,
    /// Independent neighbourhoods the batch was split into.
    pub components: usize,
    pub clustered: usize,
    pub quarantined: usize,
    pub rejected: usize,
    pub snapshot_version: u64,
}

impl GrievanceEngine {
    pub fn ingest(&self, raw: RawReport) -> IngestOutcome {
        let id = raw.id.clone();
        self.ingest_batch(vec![raw])
            .outcomes
            .pop()
            .unwrap_or(IngestOutcome::Rejected {
                report_id: id,
                reason: "no outcome".to_string(),
            })
    }

    /// Ingest a batch. Errors are per report and never abort the batch.
    pub fn ingest_batch(&self, raws: Vec<RawReport>) -> BatchReport {
        let now = self.clock.now();
        let total = raws.len();
        let normalized: Vec<Result<Arc<Report>, (String, IngestError)>> = raws
            .into_par_iter()
            .map(|raw| {
                let id = raw.id.clone();
                self.normalizer
                    .normalize(raw, self.embedder.as_ref(), now)
                    .map(Arc::new)
                    .map_err(|err| (id, err))
            })
            .collect();

        let mut outcomes: Vec<Option<IngestOutcome>> = vec![None; total];
        let mut accepted: Vec<(usize, Arc<Report>)> = Vec::with_capacity(total);
        for (position, result) in normalized.into_iter().enumerate() {
            match result {
                Ok(report) => accepted.push((position, report)),
                Err((id, err)) => {
                    outcomes[position] = Some(self.reject(id, GrievanceError::InvalidReport(err)));
                }
            }
        }

        let keys = self
            .store
            .with_read("batch", |c| {
                accepted
                    .iter()
                    .map(|(_, r)| c.index().bucket_keys(r.embedding()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_else(|_| vec![None; accepted.len()]);
        let components = partition(&keys);
        let placed: Vec<(usize, IngestOutcome)> = components
            .par_iter()
            .flat_map_iter(|component| {
                component
                    .iter()
                    .map(|&k| {
                        let (position, report) = &accepted[k];
                        (*position, self.place(Arc::clone(report)))
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        for (position, outcome) in placed {
            outcomes[position] = Some(outcome);
        }

        let outcomes: Vec<IngestOutcome> = outcomes.into_iter().flatten().collect();
        let count = |f: fn(&IngestOutcome) -> bool| outcomes.iter().filter(|o| f(o)).count();
        let clustered = count(|o| matches!(o, IngestOutcome::Clustered { .. }));
        let quarantined = count(|o| matches!(o, IngestOutcome::Quarantined { .. }));
        let rejected = count(|o| matches!(o, IngestOutcome::Rejected { .. }));
        let snapshot_version = self.publish_clustering();
        info!(
            total,
            components = components.len(),
            clustered,
            quarantined,
            rejected,
            "batch ingested"
        );
        BatchReport {
            outcomes,
            components: components.len(),
            clustered,
            quarantined,
            rejected,
            snapshot_version,
        }
    }

    fn place(&self, report: Arc<Report>) -> IngestOutcome {
        match self.try_place(&report) {
            Ok(assignment) => {
                self.registry.insert(
                    report.id.clone(),
                    ReportStatus::Clustered {
                        cluster_id: assignment.cluster_id,
                    },
                );
                IngestOutcome::Clustered { assignment }
            }
            Err(err) => self.recover(report, err),
        }
    }

    /// Plan under the shared lock, commit under the exclusive one. A stale
    /// plan is retried; once the retries are spent the placement is decided
    /// and applied in one step under the exclusive lock.
    pub(crate) fn try_place(&self, report: &Arc<Report>) -> GrievanceResult<Assignment> {
        let subject = report.id.as_str();
        for attempt in 1..=self.config.clustering.placement_retries {
            let plan = self.store.with_read(subject, |c| c.plan(report))??;
            let committed = self
                .store
                .with_write(subject, |c| c.commit_and_merge(Arc::clone(report), &plan))?;
            match committed {
                Ok(assignment) => return Ok(assignment),
                Err(ClusteringError::StalePlacement { .. }) => {
                    debug!(report_id = %report.id, attempt, "placement stale, replanning");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(self
            .store
            .with_write(subject, |c| c.ingest(Arc::clone(report)))??)
    }

    /// Route a failed placement by its recovery action.
    fn recover(&self, report: Arc<Report>, err: GrievanceError) -> IngestOutcome {
        let action = RecoveryAction::for_error(&err);
        if action == RecoveryAction::Rebuild {
            self.rebuild_index();
        }
        if !action.is_retryable() {
            return self.reject(report.id.to_string(), err);
        }
        let reason = err.to_string();
        self.lock_quarantine()
            .admit(Arc::clone(&report), reason.clone(), self.clock.now());
        self.registry.insert(
            report.id.clone(),
            ReportStatus::Quarantined {
                reason: reason.clone(),
            },
        );
        IngestOutcome::Quarantined {
            report_id: report.id.to_string(),
            reason,
        }
    }

    pub(crate) fn reject(&self, report_id: String, err: GrievanceError) -> IngestOutcome {
        let reason = err.to_string();
        let id = ReportId::new(report_id.clone());
        self.lock_quarantine()
            .reject(id.clone(), reason.clone(), self.clock.now());
        if !report_id.is_empty() && report_id.len() <= self.config.ingest.max_id_len {
            self.registry.insert(
                id,
                ReportStatus::Rejected {
                    reason: reason.clone(),
                },
            );
        }
        IngestOutcome::Rejected { report_id, reason }
    }

    pub(crate) fn rebuild_index(&self) {
        match self.store.with_write("rebuild", |c| c.rebuild_index()) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "index rebuild failed"),
            Err(err) => warn!(error = %err, "index rebuild could not take the lock"),
        }
    }

    /// Publish the current clustering state, keeping the causal snapshot.
    /// Returns the published version.
    pub(crate) fn publish_clustering(&self) -> u64 {
        match self.store.with_read("publish", |c| c.snapshot()) {
            Ok(snapshot) => self.store.publish(snapshot, None).version,
            Err(err) => {
                warn!(error = %err, "snapshot publish skipped");
                self.store.current().version
            }
        }
    }
}
