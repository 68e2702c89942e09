//! Prometheus metrics for `GET /metrics`.
//!
//! Counters are bumped by the ingest handler and the maintenance loop;
//! gauges are sampled from the published snapshot at scrape time.

use grievance_engine::{BatchReport, GrievanceEngine, MaintenanceReport};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub struct ServerMetrics {
    registry: Registry,
    /// Submitted reports by outcome: clustered, quarantined, rejected.
    pub reports_total: IntCounterVec,
    pub maintenance_cycles_total: IntCounter,
    pub maintenance_errors_total: IntCounter,
    pub maintenance_duration_seconds: Histogram,
    pub snapshot_version: IntGauge,
    pub live_clusters: IntGauge,
    pub quarantined_reports: IntGauge,
}

impl ServerMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("grievance".to_string()), None)?;

        let reports_total = IntCounterVec::new(
            Opts::new("reports_total", "Submitted reports by ingest outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(reports_total.clone()))?;

        let maintenance_cycles_total =
            IntCounter::new("maintenance_cycles_total", "Completed maintenance cycles")?;
        registry.register(Box::new(maintenance_cycles_total.clone()))?;

        let maintenance_errors_total = IntCounter::new(
            "maintenance_errors_total",
            "Maintenance pass failures, summed over cycles",
        )?;
        registry.register(Box::new(maintenance_errors_total.clone()))?;

        let maintenance_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("maintenance_duration_seconds", "Maintenance cycle duration")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        )?;
        registry.register(Box::new(maintenance_duration_seconds.clone()))?;

        let snapshot_version = IntGauge::new("snapshot_version", "Published snapshot version")?;
        registry.register(Box::new(snapshot_version.clone()))?;

        let live_clusters = IntGauge::new("live_clusters", "Forming and stable clusters")?;
        registry.register(Box::new(live_clusters.clone()))?;

        let quarantined_reports =
            IntGauge::new("quarantined_reports", "Reports waiting for a retry")?;
        registry.register(Box::new(quarantined_reports.clone()))?;

        Ok(Self {
            registry,
            reports_total,
            maintenance_cycles_total,
            maintenance_errors_total,
            maintenance_duration_seconds,
            snapshot_version,
            live_clusters,
            quarantined_reports,
        })
    }

    pub fn record_batch(&self, batch: &BatchReport) {
        for (outcome, count) in [
            ("clustered", batch.clustered),
            ("quarantined", batch.quarantined),
            ("rejected", batch.rejected),
        ] {
            self.reports_total
                .with_label_values(&[outcome])
                .inc_by(count as u64);
        }
    }

    pub fn record_cycle(&self, report: &MaintenanceReport) {
        self.maintenance_cycles_total.inc();
        self.maintenance_errors_total.inc_by(report.errors.len() as u64);
        self.maintenance_duration_seconds
            .observe(report.elapsed_ms as f64 / 1000.0);
    }

    /// Sample the gauges from the engine's current state.
    pub fn observe(&self, engine: &GrievanceEngine) {
        let snapshot = engine.query().snapshot();
        self.snapshot_version.set(snapshot.version as i64);
        self.live_clusters
            .set(snapshot.clustering.live().count() as i64);
        self.quarantined_reports.set(engine.quarantined() as i64);
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_rendered_with_the_namespace() {
        let metrics = ServerMetrics::new().unwrap();
        metrics.reports_total.with_label_values(&["clustered"]).inc_by(3);
        metrics.maintenance_cycles_total.inc();

        let text = metrics.render().unwrap();
        assert!(text.contains("grievance_reports_total{outcome=\"clustered\"} 3"));
        assert!(text.contains("grievance_maintenance_cycles_total 1"));
        assert!(text.contains("# TYPE grievance_maintenance_duration_seconds histogram"));
    }

    #[test]
    fn registries_are_independent() {
        let a = ServerMetrics::new().unwrap();
        let b = ServerMetrics::new().unwrap();
        a.maintenance_cycles_total.inc();
        assert_eq!(b.maintenance_cycles_total.get(), 0);
    }
}
