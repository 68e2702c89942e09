//! # grievance-engine
//!
//! Wires the grievance crates into a running engine.
//!
//! - [`ClusterStore`]: the single-writer clusterer plus the published
//!   snapshot readers load without locking
//! - [`GrievanceEngine`]: batch ingest with neighbourhood scheduling and
//!   quarantine, intervention registration and the maintenance cycle
//! - [`QueryApi`]: hot clusters, dashboard stats, causal graph views and
//!   intervention simulation

pub mod engine;
pub mod maintenance;
pub mod pipeline;
pub mod query;
pub mod scheduler;
pub mod store;

pub use engine::GrievanceEngine;
pub use maintenance::{MaintenanceReport, QuarantineSummary};
pub use pipeline::{BatchReport, IngestOutcome, ReportStatus};
pub use query::QueryApi;
pub use scheduler::partition;
pub use store::{ClusterStore, StoreSnapshot};
