/// Similarity index failures. An unknown id on update/remove means the
/// index and the cluster table disagree.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IndexError {
    #[error("unknown cluster in index: {cluster_id}")]
    UnknownCluster { cluster_id: String },

    #[error("cluster already indexed: {cluster_id}")]
    DuplicateCluster { cluster_id: String },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}
