//! # grievance-core
//!
//! Shared vocabulary of the grievance clustering engine: the report,
//! cluster and causal-edge model, identifiers, configuration, the error
//! taxonomy, and the provider traits the other crates plug into.

pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use config::GrievanceConfig;
pub use errors::{GrievanceError, GrievanceResult};
pub use models::*;
