//! Read-side projections consumed by the dashboard.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Cluster, ClusterId, TrendMetrics};

/// Cluster as rendered by `GET /clusters/hot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterCard {
    pub id: ClusterId,
    pub title: String,
    pub summary: String,
    pub trend_metrics: TrendMetrics,
    pub geo_distribution: BTreeMap<String, u64>,
    pub confidence_score: f64,
}

impl From<&Cluster> for ClusterCard {
    fn from(cluster: &Cluster) -> Self {
        Self {
            id: cluster.id,
            title: cluster.title.clone(),
            summary: cluster.summary.clone(),
            trend_metrics: cluster.trend_metrics,
            geo_distribution: cluster.geo_distribution.clone(),
            confidence_score: cluster.confidence_score,
        }
    }
}

/// Aggregate snapshot for `GET /dashboard/stats`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_reports: u64,
    /// Percent change of reports in the last 7 days against the 7 before.
    pub reports_trend: f64,
    pub active_clusters: u64,
    pub critical_clusters: u64,
    pub avg_trust_score: f64,
    pub causal_confidence: f64,
}
