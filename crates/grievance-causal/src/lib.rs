//! # grievance-causal
//!
//! Causal Graph Builder.
//!
//! Infers directed edges between clusters from lagged cross-correlation
//! of their daily report counts, gated by regional co-occurrence, and
//! overlays externally registered interventions. Readers get an immutable
//! [`CausalGraphSnapshot`] with the dashboard view, traversal, what-if
//! simulation and intervention ranking.

pub mod builder;
pub mod graph;
pub mod inference;
pub mod intervention;
pub mod ranking;
pub mod series;
pub mod snapshot;
pub mod traversal;

pub use builder::{CausalCycleReport, CausalGraphBuilder, CausalInput, CausalNotice, ClusterSeries, RebuildMode};
pub use graph::{node_group, IndexedGraph};
pub use inference::{evaluate_pair, region_overlap};
pub use snapshot::{CausalGraphSnapshot, ClusterInfo};
pub use traversal::{trace_effects, trace_origins, TraversalNode, TraversalResult};
