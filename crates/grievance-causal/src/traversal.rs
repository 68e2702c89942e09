//! Bounded breadth-first traversal along causal edges.
//!
//! `mitigates` edges are not followed: an intervention is not an effect
//! of the cluster it targets. A visited set makes cycles harmless.

use std::collections::{BTreeMap, HashSet, VecDeque};

use grievance_core::{CausalRelation, NodeKey};
use petgraph::Direction;
use serde::Serialize;

use crate::graph::IndexedGraph;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraversalNode {
    pub key: NodeKey,
    pub depth: usize,
    /// Product of edge strengths along the path that first reached this node.
    pub path_strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraversalResult {
    pub origin: NodeKey,
    /// The origin first, at depth 0.
    pub nodes: Vec<TraversalNode>,
    /// Set when the node limit stopped the walk early.
    pub truncated: bool,
}

impl TraversalResult {
    /// Everything reached except the origin.
    pub fn reached(&self) -> impl Iterator<Item = &TraversalNode> + '_ {
        self.nodes.iter().skip(1)
    }

    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    pub fn summary(&self) -> String {
        let reached = self.nodes.len().saturating_sub(1);
        if reached == 0 {
            return format!("{} has no downstream effects.", self.origin);
        }
        let depth = self.max_depth();
        format!(
            "{} propagates to {} cluster{} across {} level{}.",
            self.origin,
            reached,
            if reached == 1 { "" } else { "s" },
            depth,
            if depth == 1 { "" } else { "s" },
        )
    }
}

/// Clusters downstream of `origin`.
pub fn trace_effects(
    graph: &IndexedGraph,
    origin: &NodeKey,
    max_depth: usize,
    max_nodes: usize,
) -> TraversalResult {
    traverse(graph, origin, Direction::Outgoing, max_depth, max_nodes)
}

/// Clusters upstream of `origin`.
pub fn trace_origins(
    graph: &IndexedGraph,
    origin: &NodeKey,
    max_depth: usize,
    max_nodes: usize,
) -> TraversalResult {
    traverse(graph, origin, Direction::Incoming, max_depth, max_nodes)
}

fn traverse(
    graph: &IndexedGraph,
    origin: &NodeKey,
    direction: Direction,
    max_depth: usize,
    max_nodes: usize,
) -> TraversalResult {
    let mut result = TraversalResult {
        origin: origin.clone(),
        nodes: Vec::new(),
        truncated: false,
    };
    if graph.get_node(origin).is_none() || max_nodes == 0 {
        return result;
    }
    let mut visited: HashSet<NodeKey> = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(origin.clone());
    queue.push_back(TraversalNode {
        key: origin.clone(),
        depth: 0,
        path_strength: 1.0,
    });

    while let Some(node) = queue.pop_front() {
        if node.depth < max_depth {
            // strongest parallel edge per neighbour, in key order
            let mut next: BTreeMap<NodeKey, f64> = BTreeMap::new();
            for edge in graph.edges_directed(&node.key, direction) {
                if edge.relation == CausalRelation::Mitigates {
                    continue;
                }
                let other = match direction {
                    Direction::Outgoing => &edge.to_id,
                    Direction::Incoming => &edge.from_id,
                };
                let best = next.entry(other.clone()).or_insert(0.0);
                *best = best.max(edge.strength);
            }
            for (key, strength) in next {
                if visited.insert(key.clone()) {
                    queue.push_back(TraversalNode {
                        key,
                        depth: node.depth + 1,
                        path_strength: node.path_strength * strength,
                    });
                }
            }
        }
        result.nodes.push(node);
        if result.nodes.len() >= max_nodes && !queue.is_empty() {
            result.truncated = true;
            break;
        }
    }
    result
}
