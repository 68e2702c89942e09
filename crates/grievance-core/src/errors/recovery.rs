//! RecoveryAction: what the ingest pipeline does with a failed report.

use std::fmt;

use super::{ClusteringError, GrievanceError};

/// Recommended recovery action for a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Quarantine the report and retry it on the next cycle.
    Retry,
    /// Rebuild the similarity index, then retry the report.
    Rebuild,
    /// Drop the report now and record the reason.
    Reject,
    /// Nothing to do.
    Ignore,
}

impl RecoveryAction {
    /// Determine the recommended recovery action for a GrievanceError.
    pub fn for_error(error: &GrievanceError) -> Self {
        match error {
            GrievanceError::InvalidReport(_) => Self::Reject,
            GrievanceError::IndexCorrupt(_) => Self::Rebuild,
            GrievanceError::ClusteringTimeout { .. } => Self::Retry,
            GrievanceError::Concurrency(_) => Self::Retry,
            GrievanceError::Clustering(inner) => match inner {
                ClusteringError::StalePlacement { .. } => Self::Retry,
                ClusteringError::IndexCorrupt(_) => Self::Rebuild,
                ClusteringError::InvalidReport { .. } => Self::Reject,
                ClusteringError::UnknownCluster { .. } | ClusteringError::ClusterClosed { .. } => {
                    Self::Retry
                }
            },
            GrievanceError::Causal(_) => Self::Ignore,
            GrievanceError::ClusterNotFound { .. } => Self::Reject,
            GrievanceError::Config(_) => Self::Reject,
            GrievanceError::Serialization(_) => Self::Reject,
        }
    }

    /// Whether the report should go back into quarantine.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Retry | Self::Rebuild)
    }
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retry => write!(f, "Retry"),
            Self::Rebuild => write!(f, "Rebuild"),
            Self::Reject => write!(f, "Reject"),
            Self::Ignore => write!(f, "Ignore"),
        }
    }
}
