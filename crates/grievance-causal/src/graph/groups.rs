//! Dashboard node groups, derived from the direction of inferred edges.

use grievance_core::{NodeGroup, NodeKey};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use super::stable_graph::IndexedGraph;

/// Intervention nodes are `intervention`. A cluster that only drives
/// others is a `root_cause`, one that is both driven and driving is a
/// `failure`, everything else is an `outcome`.
pub fn node_group(graph: &IndexedGraph, key: &NodeKey) -> NodeGroup {
    if matches!(key, NodeKey::Intervention(_)) {
        return NodeGroup::Intervention;
    }
    let Some(idx) = graph.get_node(key) else {
        return NodeGroup::Outcome;
    };
    let inferred = |direction| {
        graph
            .graph
            .edges_directed(idx, direction)
            .any(|e| e.weight().inferred)
    };
    match (inferred(Direction::Incoming), inferred(Direction::Outgoing)) {
        (false, true) => NodeGroup::RootCause,
        (true, true) => NodeGroup::Failure,
        _ => NodeGroup::Outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grievance_core::{CausalEdge, CausalRelation, ClusterId, InterventionId};

    fn key(n: u64) -> NodeKey {
        NodeKey::Cluster(ClusterId::new(n))
    }

    #[test]
    fn chain_yields_root_failure_outcome() {
        let mut g = IndexedGraph::new();
        for (a, b) in [(1, 2), (2, 3)] {
            g.add_edge(
                CausalEdge::new(key(a), key(b), CausalRelation::Causes, 0.6)
                    .unwrap()
                    .with_inference(2, 0.7),
            );
        }
        assert_eq!(node_group(&g, &key(1)), NodeGroup::RootCause);
        assert_eq!(node_group(&g, &key(2)), NodeGroup::Failure);
        assert_eq!(node_group(&g, &key(3)), NodeGroup::Outcome);
    }

    #[test]
    fn mitigation_does_not_make_a_root_cause() {
        let mut g = IndexedGraph::new();
        let iv = NodeKey::Intervention(InterventionId::new("ration-audit"));
        g.add_edge(CausalEdge::new(iv.clone(), key(1), CausalRelation::Mitigates, 0.4).unwrap());
        assert_eq!(node_group(&g, &iv), NodeGroup::Intervention);
        assert_eq!(node_group(&g, &key(1)), NodeGroup::Outcome);
    }
}
