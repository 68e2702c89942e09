use super::{CausalError, ClusteringError, IndexError, IngestError};

/// Top-level error type for the grievance engine.
/// All subsystem errors convert into this via `From` impls.
#[derive(Debug, thiserror::Error)]
pub enum GrievanceError {
    #[error("invalid report: {0}")]
    InvalidReport(#[from] IngestError),

    #[error("index corrupt: {0}")]
    IndexCorrupt(#[from] IndexError),

    #[error("clustering timeout for report {report_id} after {attempts} attempts")]
    ClusteringTimeout { report_id: String, attempts: u32 },

    #[error("clustering error: {0}")]
    Clustering(ClusteringError),

    #[error("causal error: {0}")]
    Causal(#[from] CausalError),

    #[error("cluster not found: {id}")]
    ClusterNotFound { id: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("concurrency error: {0}")]
    Concurrency(String),
}

impl From<ClusteringError> for GrievanceError {
    fn from(err: ClusteringError) -> Self {
        match err {
            ClusteringError::IndexCorrupt(inner) => GrievanceError::IndexCorrupt(inner),
            ClusteringError::InvalidReport { report_id, reason } => {
                GrievanceError::InvalidReport(IngestError::Malformed(format!(
                    "{report_id}: {reason}"
                )))
            }
            other => GrievanceError::Clustering(other),
        }
    }
}

/// Convenience type alias.
pub type GrievanceResult<T> = Result<T, GrievanceError>;
