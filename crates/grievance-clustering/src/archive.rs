//! Archive sweep: retire live clusters that have gone quiet.

use chrono::Duration;
use grievance_core::errors::ClusteringError;
use grievance_core::{ClusterId, ClusterState};
use tracing::info;

use crate::clusterer::IncrementalClusterer;
use crate::trend::{growth_rate, growth_windows};

impl IncrementalClusterer {
    /// Archive every live cluster with no report in the last
    /// `inactive_window_days` and no growth. Archived clusters keep their
    /// members but leave the index and accept no new reports.
    pub fn archive_sweep(&mut self) -> Result<Vec<ClusterId>, ClusteringError> {
        let now = self.now();
        let cutoff = now - Duration::days(self.config.inactive_window_days);
        let quiet: Vec<ClusterId> = self
            .clusters
            .values()
            .filter(|r| r.is_live() && r.cluster.last_report_at <= cutoff)
            .filter(|r| {
                let (last, previous) = growth_windows(&r.times, now);
                growth_rate(last, previous) <= 0.0
            })
            .map(|r| r.id())
            .collect();

        let min_stable = self.config.min_stable_size;
        for id in &quiet {
            self.index.remove(*id)?;
            if let Some(record) = self.clusters.get_mut(id) {
                record.set_state(ClusterState::Archived);
                record.refresh(now, min_stable, &self.confidence);
                info!(
                    cluster_id = %id,
                    last_report_at = %record.cluster.last_report_at,
                    size = record.size(),
                    "cluster archived"
                );
            }
        }
        if !quiet.is_empty() {
            self.version += 1;
        }
        Ok(quiet)
    }
}
