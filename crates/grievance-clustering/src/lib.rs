//! # grievance-clustering
//!
//! Incremental clusterer over embedded reports.
//!
//! - [`IncrementalClusterer`]: join-or-create placement with optimistic
//!   plan/commit, plus the merge, split and archive passes
//! - [`trend`]: rolling 30-day counts and week-over-week growth
//! - [`labels`]: cluster titles and summaries
//! - [`monitoring`]: embedding drift checks
//! - [`ClusteringSnapshot`]: point-in-time view for publishing

mod archive;
pub mod clusterer;
pub mod labels;
mod merge;
pub mod monitoring;
mod record;
pub mod snapshot;
mod split;
pub mod trend;

pub use clusterer::{Assignment, AssignmentOutcome, IncrementalClusterer, Placement, PlacementPlan};
pub use merge::MergeRecord;
pub use monitoring::DriftReport;
pub use snapshot::ClusteringSnapshot;
pub use split::{two_means, SplitRecord};
