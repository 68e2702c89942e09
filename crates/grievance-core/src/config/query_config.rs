use serde::{Deserialize, Serialize};

/// Read-side settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub default_hot_limit: usize,
    pub max_hot_limit: usize,
    pub stats_ttl_ms: u64,
    pub graph_node_limit: usize,
    pub critical_confidence: f64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_hot_limit: 10,
            max_hot_limit: 100,
            stats_ttl_ms: 2_000,
            graph_node_limit: 200,
            critical_confidence: 0.8,
        }
    }
}
