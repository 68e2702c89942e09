use serde::{Deserialize, Serialize};

/// Incremental clusterer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Max distance for a report to join an existing cluster.
    pub join_threshold: f64,
    /// Max centroid distance for two clusters to be merge candidates.
    /// Must be >= `join_threshold`.
    pub merge_threshold: f64,
    /// Minimum trust-weighted overlap for a merge.
    pub merge_overlap_ratio: f64,
    /// Committed reports between merge passes.
    pub merge_interval: u64,
    pub min_stable_size: usize,
    pub inactive_window_days: i64,
    /// Mean member distance above which a stable cluster is split.
    pub split_dispersion: f64,
    /// Lock acquisition attempts before `ClusteringTimeout`.
    pub lock_retry_budget: u32,
    pub lock_backoff_ms: u64,
    /// Optimistic placement attempts before deciding under the write lock.
    pub placement_retries: u32,
    pub drift_threshold: f64,
    pub drift_window_days: i64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            join_threshold: 0.55,
            merge_threshold: 0.6,
            merge_overlap_ratio: 0.5,
            merge_interval: 50,
            min_stable_size: 3,
            inactive_window_days: 45,
            split_dispersion: 0.5,
            lock_retry_budget: 200,
            lock_backoff_ms: 1,
            placement_retries: 3,
            drift_threshold: 0.15,
            drift_window_days: 7,
        }
    }
}
