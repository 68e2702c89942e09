mod causal_error;
mod clustering_error;
mod grievance_error;
mod index_error;
mod ingest_error;
mod recovery;

pub use causal_error::CausalError;
pub use clustering_error::ClusteringError;
pub use grievance_error::{GrievanceError, GrievanceResult};
pub use index_error::IndexError;
pub use ingest_error::IngestError;
pub use recovery::RecoveryAction;
