//! Health checks run by the maintenance cycle.

pub mod drift;

use chrono::{DateTime, Duration, Utc};
use grievance_core::Report;
use tracing::warn;

pub use drift::{detect_drift, ks_two_sample, DriftReport};

use crate::clusterer::IncrementalClusterer;

impl IncrementalClusterer {
    /// Drift of the whole report stream and of every live cluster: the
    /// last `drift_window_days` against the window before it. Clusters
    /// without enough reports on both sides are left out.
    pub fn drift_check(&self) -> Vec<DriftReport> {
        let now = self.now();
        let window = Duration::days(self.config.drift_window_days.max(1));
        let metric = self.index.metric();
        let threshold = self.config.drift_threshold;

        let mut reports = Vec::new();
        let (reference, recent) = split_windows(self.reports.values().map(|r| r.as_ref()), now, window);
        if let Some(report) = detect_drift(&reference, &recent, metric, threshold) {
            reports.push(report);
        }
        for record in self.clusters.values().filter(|r| r.is_live()) {
            let members = record
                .cluster
                .member_ids
                .iter()
                .filter_map(|id| self.reports.get(id).map(|r| r.as_ref()));
            let (reference, recent) = split_windows(members, now, window);
            if let Some(mut report) = detect_drift(&reference, &recent, metric, threshold) {
                report.cluster_id = Some(record.id());
                reports.push(report);
            }
        }
        for report in reports.iter().filter(|r| r.drift_detected) {
            warn!(
                cluster_id = ?report.cluster_id.map(|c| c.to_string()),
                statistic = report.statistic,
                p_value = report.p_value,
                centroid_shift = report.centroid_shift,
                "embedding drift detected"
            );
        }
        reports
    }
}

/// Embeddings submitted in `(now - 2w, now - w]` and `(now - w, now]`.
fn split_windows<'a>(
    reports: impl Iterator<Item = &'a Report>,
    now: DateTime<Utc>,
    window: Duration,
) -> (Vec<&'a [f32]>, Vec<&'a [f32]>) {
    let mut reference = Vec::new();
    let mut recent = Vec::new();
    for report in reports {
        let at = report.submitted_at;
        if at > now - window && at <= now {
            recent.push(report.embedding());
        } else if at > now - window - window && at <= now - window {
            reference.push(report.embedding());
        }
    }
    (reference, recent)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use grievance_core::traits::FixedClock;
    use grievance_core::GrievanceConfig;
    use test_fixtures::{angled, jittered, ts, ReportBuilder};

    use super::*;

    #[test]
    fn stream_drift_is_reported() {
        let mut config = GrievanceConfig::default();
        config.clustering.merge_interval = 1_000;
        let mut c = IncrementalClusterer::new(&config, 4, Arc::new(FixedClock::new(ts(14))));
        for i in 0..8 {
            let id = format!("old-{i}");
            c.ingest(
                ReportBuilder::new(&id)
                    .day(1 + i % 5)
                    .embedding(jittered(4, 0, &id))
                    .build_arc(),
            )
            .unwrap();
        }
        for i in 0..8 {
            let id = format!("new-{i}");
            c.ingest(
                ReportBuilder::new(&id)
                    .day(8 + i % 5)
                    .embedding(angled(4, 1.2 + i as f32 * 0.01))
                    .build_arc(),
            )
            .unwrap();
        }
        let reports = c.drift_check();
        let stream = reports.iter().find(|r| r.cluster_id.is_none()).unwrap();
        assert!(stream.drift_detected);
        assert_eq!((stream.reference_size, stream.recent_size), (8, 8));
    }

    #[test]
    fn quiet_stream_has_no_report() {
        let c = IncrementalClusterer::new(&GrievanceConfig::default(), 4, Arc::new(FixedClock::new(ts(14))));
        assert!(c.drift_check().is_empty());
    }
}
