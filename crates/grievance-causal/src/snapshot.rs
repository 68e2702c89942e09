//! Immutable causal graph snapshot served to readers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use grievance_core::{
    CausalGraphView, ClusterId, GraphEdgeView, GraphNodeView, Intervention, InterventionId, NodeKey,
};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::builder::resolve_redirect;
use crate::graph::{node_group, IndexedGraph};
use crate::traversal::{trace_effects, trace_origins, TraversalResult};

/// Per-cluster figures captured at rebuild time.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterInfo {
    pub title: String,
    pub count_30d: u64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CausalGraphSnapshot {
    pub version: u64,
    pub built_at: Option<DateTime<Utc>>,
    pub graph: IndexedGraph,
    pub clusters: BTreeMap<ClusterId, ClusterInfo>,
    pub interventions: BTreeMap<InterventionId, Intervention>,
    pub redirects: BTreeMap<ClusterId, ClusterId>,
    /// Mean confidence over inferred edges, 0.0 without any.
    pub mean_confidence: f64,
}

impl CausalGraphSnapshot {
    pub fn new(
        version: u64,
        built_at: Option<DateTime<Utc>>,
        graph: IndexedGraph,
        clusters: BTreeMap<ClusterId, ClusterInfo>,
        interventions: BTreeMap<InterventionId, Intervention>,
        redirects: BTreeMap<ClusterId, ClusterId>,
    ) -> Self {
        let (sum, count) = graph
            .edges()
            .filter(|e| e.inferred)
            .fold((0.0, 0usize), |(s, n), e| (s + e.confidence, n + 1));
        let mean_confidence = if count == 0 { 0.0 } else { sum / count as f64 };
        Self {
            version,
            built_at,
            graph,
            clusters,
            interventions,
            redirects,
            mean_confidence,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn resolve(&self, id: ClusterId) -> ClusterId {
        resolve_redirect(&self.redirects, id)
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&ClusterInfo> {
        self.clusters.get(&self.resolve(id))
    }

    pub fn inferred_edge_count(&self) -> usize {
        self.graph.edges().filter(|e| e.inferred).count()
    }

    pub fn effects_of(&self, id: ClusterId, max_depth: usize, max_nodes: usize) -> TraversalResult {
        let key = NodeKey::Cluster(self.resolve(id));
        trace_effects(&self.graph, &key, max_depth, max_nodes)
    }

    pub fn origins_of(&self, id: ClusterId, max_depth: usize, max_nodes: usize) -> TraversalResult {
        let key = NodeKey::Cluster(self.resolve(id));
        trace_origins(&self.graph, &key, max_depth, max_nodes)
    }

    /// Dashboard view. With `focus`, the edges touching that cluster and
    /// their endpoints; otherwise the `node_limit` best-connected nodes and
    /// the edges among them.
    pub fn view(&self, focus: Option<ClusterId>, node_limit: usize) -> CausalGraphView {
        let g = &self.graph.graph;
        let kept: Vec<NodeKey> = match focus {
            Some(id) => {
                let key = NodeKey::Cluster(self.resolve(id));
                let Some(idx) = self.graph.get_node(&key) else {
                    return CausalGraphView::default();
                };
                let mut keys: Vec<NodeKey> = g
                    .edges_directed(idx, Direction::Outgoing)
                    .chain(g.edges_directed(idx, Direction::Incoming))
                    .flat_map(|e| [e.weight().from_id.clone(), e.weight().to_id.clone()])
                    .chain(std::iter::once(key))
                    .collect();
                keys.sort();
                keys.dedup();
                keys
            }
            None => {
                let mut ranked: Vec<(usize, NodeKey)> = self
                    .graph
                    .node_index
                    .iter()
                    .map(|(key, idx)| {
                        let degree = g.edges_directed(*idx, Direction::Outgoing).count()
                            + g.edges_directed(*idx, Direction::Incoming).count();
                        (degree, key.clone())
                    })
                    .collect();
                ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
                ranked.truncate(node_limit);
                let mut keys: Vec<NodeKey> = ranked.into_iter().map(|(_, k)| k).collect();
                keys.sort();
                keys
            }
        };

        let nodes = kept
            .iter()
            .filter_map(|key| {
                let node = self.graph.node(key)?;
                Some(GraphNodeView {
                    id: key.to_string(),
                    label: node.label.clone(),
                    group: node_group(&self.graph, key),
                })
            })
            .collect();
        let focus_key = focus.map(|id| NodeKey::Cluster(self.resolve(id)));
        let mut edges: Vec<_> = self
            .graph
            .edges()
            .filter(|e| match &focus_key {
                Some(key) => e.touches(key),
                None => kept.binary_search(&e.from_id).is_ok() && kept.binary_search(&e.to_id).is_ok(),
            })
            .collect();
        edges.sort_by(|a, b| {
            (&a.from_id, &a.to_id, a.relation.as_str()).cmp(&(&b.from_id, &b.to_id, b.relation.as_str()))
        });
        let edges = edges
            .into_iter()
            .map(|e| GraphEdgeView {
                from: e.from_id.to_string(),
                to: e.to_id.to_string(),
                relation: e.relation,
                strength: e.strength,
            })
            .collect();
        CausalGraphView { nodes, edges }
    }
}
