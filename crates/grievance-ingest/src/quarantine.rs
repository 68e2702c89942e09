//! Quarantine for reports that failed with a retryable error.
//!
//! A quarantined report is retried once per maintenance cycle. After
//! `max_attempts` failed retries it is dropped and the reason recorded.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use grievance_core::{Report, ReportId};
use serde::{Deserialize, Serialize};

const DROPPED_LOG_CAPACITY: usize = 1_000;

/// A report waiting for its next retry.
#[derive(Debug, Clone)]
pub struct QuarantinedReport {
    pub report: Arc<Report>,
    /// Failed retries so far (the initial failure is not counted).
    pub retries: u32,
    pub last_error: String,
    pub first_failed_at: DateTime<Utc>,
}

/// A report that will never be clustered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedReport {
    pub report_id: ReportId,
    pub reason: String,
    pub retries: u32,
    pub dropped_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct Quarantine {
    pending: BTreeMap<ReportId, QuarantinedReport>,
    dropped: VecDeque<DroppedReport>,
    max_attempts: u32,
}

impl Quarantine {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            pending: BTreeMap::new(),
            dropped: VecDeque::new(),
            max_attempts,
        }
    }

    /// Quarantine a report after its first failure. A report already
    /// pending keeps its retry count.
    pub fn admit(&mut self, report: Arc<Report>, reason: String, at: DateTime<Utc>) {
        let id = report.id.clone();
        tracing::warn!(report_id = %id, reason = %reason, "report quarantined");
        self.pending
            .entry(id)
            .and_modify(|entry| entry.last_error = reason.clone())
            .or_insert(QuarantinedReport {
                report,
                retries: 0,
                last_error: reason,
                first_failed_at: at,
            });
    }

    /// Take every pending report for a retry pass.
    pub fn drain(&mut self) -> Vec<QuarantinedReport> {
        std::mem::take(&mut self.pending).into_values().collect()
    }

    /// Put back a report whose retry failed. Returns the drop record once
    /// the retry budget is spent.
    pub fn retry_failed(
        &mut self,
        mut entry: QuarantinedReport,
        reason: String,
        at: DateTime<Utc>,
    ) -> Option<DroppedReport> {
        entry.retries += 1;
        entry.last_error = reason;
        if entry.retries >= self.max_attempts {
            let dropped = DroppedReport {
                report_id: entry.report.id.clone(),
                reason: entry.last_error,
                retries: entry.retries,
                dropped_at: at,
            };
            self.record_drop(dropped.clone());
            return Some(dropped);
        }
        tracing::debug!(
            report_id = %entry.report.id,
            retries = entry.retries,
            "report re-quarantined"
        );
        self.pending.insert(entry.report.id.clone(), entry);
        None
    }

    /// Record a report rejected outright (non-retryable error).
    pub fn reject(&mut self, report_id: ReportId, reason: String, at: DateTime<Utc>) -> DroppedReport {
        let dropped = DroppedReport {
            report_id,
            reason,
            retries: 0,
            dropped_at: at,
        };
        self.record_drop(dropped.clone());
        dropped
    }

    fn record_drop(&mut self, dropped: DroppedReport) {
        tracing::warn!(
            report_id = %dropped.report_id,
            reason = %dropped.reason,
            retries = dropped.retries,
            "report dropped"
        );
        if self.dropped.len() >= DROPPED_LOG_CAPACITY {
            self.dropped.pop_front();
        }
        self.dropped.push_back(dropped);
    }

    pub fn contains(&self, id: &ReportId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Most recent drops, oldest first.
    pub fn dropped(&self) -> impl Iterator<Item = &DroppedReport> {
        self.dropped.iter()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_fixtures::{ts, ReportBuilder};

    #[test]
    fn drops_after_max_attempts() {
        let mut q = Quarantine::new(3);
        q.admit(ReportBuilder::new("r1").build_arc(), "timeout".into(), ts(0));
        assert_eq!(q.len(), 1);

        for cycle in 1..=3 {
            let mut entries = q.drain();
            assert_eq!(entries.len(), 1);
            let outcome = q.retry_failed(entries.remove(0), "timeout".into(), ts(cycle));
            if cycle < 3 {
                assert!(outcome.is_none());
                assert_eq!(q.len(), 1);
            } else {
                let dropped = outcome.unwrap();
                assert_eq!(dropped.retries, 3);
                assert_eq!(dropped.reason, "timeout");
            }
        }
        assert!(q.is_empty());
        assert_eq!(q.dropped().count(), 1);
    }

    #[test]
    fn readmitting_keeps_a_single_entry() {
        let mut q = Quarantine::new(3);
        let report = ReportBuilder::new("r1").build_arc();
        q.admit(report.clone(), "a".into(), ts(0));
        q.admit(report, "b".into(), ts(0));
        assert_eq!(q.len(), 1);
        assert_eq!(q.drain()[0].last_error, "b");
    }

    #[test]
    fn reject_records_reason_without_queueing() {
        let mut q = Quarantine::new(3);
        let dropped = q.reject(ReportId::new("bad"), "empty text".into(), ts(0));
        assert_eq!(dropped.retries, 0);
        assert!(q.is_empty());
        assert!(!q.contains(&ReportId::new("bad")));
        assert_eq!(q.dropped().next().unwrap().reason, "empty text");
    }
}
