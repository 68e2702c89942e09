//! `StableGraph` plus a `NodeKey` -> `NodeIndex` map.

use std::collections::HashMap;

use grievance_core::{CausalEdge, CausalRelation, NodeKey};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

/// Node payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CausalNode {
    pub key: NodeKey,
    pub label: String,
}

/// Directed multigraph keyed by [`NodeKey`]. Indices stay valid across
/// removals, so the key map never has to be rewritten.
#[derive(Debug, Clone, Default)]
pub struct IndexedGraph {
    pub graph: StableGraph<CausalNode, CausalEdge>,
    pub node_index: HashMap<NodeKey, NodeIndex>,
}

impl IndexedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `key`, adding the node if needed. An existing node's label
    /// is refreshed.
    pub fn ensure_node(&mut self, key: &NodeKey, label: &str) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(key) {
            if let Some(node) = self.graph.node_weight_mut(idx) {
                if node.label != label {
                    node.label = label.to_string();
                }
            }
            return idx;
        }
        let idx = self.graph.add_node(CausalNode {
            key: key.clone(),
            label: label.to_string(),
        });
        self.node_index.insert(key.clone(), idx);
        idx
    }

    pub fn get_node(&self, key: &NodeKey) -> Option<NodeIndex> {
        self.node_index.get(key).copied()
    }

    pub fn node(&self, key: &NodeKey) -> Option<&CausalNode> {
        self.get_node(key).and_then(|idx| self.graph.node_weight(idx))
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, key: &NodeKey) -> bool {
        match self.node_index.remove(key) {
            Some(idx) => self.graph.remove_node(idx).is_some(),
            None => false,
        }
    }

    /// Add `edge` between its endpoints, creating them if needed. Endpoint
    /// keys are taken from the edge, which cannot be a self-loop.
    pub fn add_edge(&mut self, edge: CausalEdge) -> EdgeIndex {
        let from = self.ensure_existing(&edge.from_id);
        let to = self.ensure_existing(&edge.to_id);
        self.graph.add_edge(from, to, edge)
    }

    /// Remove edges matching `pred`. Returns how many went.
    pub fn remove_edges_where<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&CausalEdge) -> bool,
    {
        let doomed: Vec<EdgeIndex> = self
            .graph
            .edge_indices()
            .filter(|e| self.graph.edge_weight(*e).is_some_and(&mut pred))
            .collect();
        for e in &doomed {
            self.graph.remove_edge(*e);
        }
        doomed.len()
    }

    pub fn edges(&self) -> impl Iterator<Item = &CausalEdge> + '_ {
        self.graph.edge_weights()
    }

    /// Edges leaving (`Outgoing`) or entering (`Incoming`) `key`.
    pub fn edges_directed(
        &self,
        key: &NodeKey,
        direction: Direction,
    ) -> Vec<&CausalEdge> {
        match self.get_node(key) {
            Some(idx) => self
                .graph
                .edges_directed(idx, direction)
                .map(|e| e.weight())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn has_relation(&self, from: &NodeKey, to: &NodeKey, relation: CausalRelation) -> bool {
        self.edges_directed(from, Direction::Outgoing)
            .iter()
            .any(|e| &e.to_id == to && e.relation == relation)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn ensure_existing(&mut self, key: &NodeKey) -> NodeIndex {
        match self.get_node(key) {
            Some(idx) => idx,
            None => self.ensure_node(key, &key.to_string()),
        }
    }
}
