mod causal;
mod cluster;
mod dashboard;
mod ids;
mod intervention;
mod report;

pub use causal::{
    CausalEdge, CausalGraphView, CausalRelation, GraphEdgeView, GraphNodeView, NodeGroup, NodeKey,
};
pub use cluster::{Cluster, ClusterState, TrendMetrics};
pub use dashboard::{ClusterCard, DashboardStats};
pub use ids::{ClusterId, InterventionId, ReportId};
pub use intervention::{
    FeedbackTally, Intervention, InterventionSpec, RankedIntervention, SimulationResult,
};
pub use report::{GeoTag, RawReport, Report, SourceChannel};
