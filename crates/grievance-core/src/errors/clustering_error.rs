use super::IndexError;

/// Incremental clusterer failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClusteringError {
    #[error("report {report_id} rejected: {reason}")]
    InvalidReport { report_id: String, reason: String },

    #[error("index corrupt: {0}")]
    IndexCorrupt(#[from] IndexError),

    #[error("placement for report {report_id} is stale; neighbourhood changed")]
    StalePlacement { report_id: String },

    #[error("unknown cluster: {cluster_id}")]
    UnknownCluster { cluster_id: String },

    #[error("cluster {cluster_id} does not accept reports in state {state}")]
    ClusterClosed { cluster_id: String, state: String },
}
