//! Causal multigraph storage and node grouping.

pub mod groups;
pub mod stable_graph;

pub use groups::node_group;
pub use stable_graph::{CausalNode, IndexedGraph};
