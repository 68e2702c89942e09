//! Causal edges between clusters and intervention nodes, plus the wire view.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ClusterId, InterventionId};
use crate::errors::CausalError;

/// Relation carried by a causal edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CausalRelation {
    /// Short, direct lag between root cause and failure.
    Causes,
    /// Longer-lag downstream effect.
    LeadsTo,
    /// Asserted only from intervention nodes.
    Mitigates,
}

impl CausalRelation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Causes => "causes",
            Self::LeadsTo => "leads_to",
            Self::Mitigates => "mitigates",
        }
    }

    pub fn from_str_name(name: &str) -> Option<Self> {
        match name {
            "causes" => Some(Self::Causes),
            "leads_to" => Some(Self::LeadsTo),
            "mitigates" => Some(Self::Mitigates),
            _ => None,
        }
    }
}

/// Endpoint of a causal edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NodeKey {
    Cluster(ClusterId),
    Intervention(InterventionId),
}

impl NodeKey {
    pub fn cluster_id(&self) -> Option<ClusterId> {
        match self {
            Self::Cluster(id) => Some(*id),
            Self::Intervention(_) => None,
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cluster(id) => write!(f, "{id}"),
            Self::Intervention(id) => write!(f, "iv-{id}"),
        }
    }
}

/// Display group of a node in the dashboard graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeGroup {
    RootCause,
    Failure,
    Outcome,
    Intervention,
}

/// Directed relation between two nodes. Self-loops are unrepresentable:
/// `new` rejects them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalEdge {
    pub from_id: NodeKey,
    pub to_id: NodeKey,
    pub relation: CausalRelation,
    /// Normalized cross-correlation peak (or intervention efficacy).
    pub strength: f64,
    /// Causal confidence index in [0, 1].
    pub confidence: f64,
    pub lag_days: Option<i64>,
    pub inferred: bool,
}

impl CausalEdge {
    pub fn new(
        from_id: NodeKey,
        to_id: NodeKey,
        relation: CausalRelation,
        strength: f64,
    ) -> Result<Self, CausalError> {
        if from_id == to_id {
            return Err(CausalError::SelfLoop {
                node: from_id.to_string(),
            });
        }
        Ok(Self {
            from_id,
            to_id,
            relation,
            strength: strength.clamp(0.0, 1.0),
            confidence: 0.0,
            lag_days: None,
            inferred: false,
        })
    }

    pub fn with_inference(mut self, lag_days: i64, confidence: f64) -> Self {
        self.lag_days = Some(lag_days);
        self.confidence = confidence.clamp(0.0, 1.0);
        self.inferred = true;
        self
    }

    pub fn touches(&self, node: &NodeKey) -> bool {
        &self.from_id == node || &self.to_id == node
    }
}

/// `{id, label, group}` as rendered by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNodeView {
    pub id: String,
    pub label: String,
    pub group: NodeGroup,
}

/// `{from, to, relation, strength}` as rendered by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdgeView {
    pub from: String,
    pub to: String,
    pub relation: CausalRelation,
    pub strength: f64,
}

/// Response body of `GET /causal-graph`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CausalGraphView {
    pub nodes: Vec<GraphNodeView>,
    pub edges: Vec<GraphEdgeView>,
}
