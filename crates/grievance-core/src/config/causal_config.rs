use serde::{Deserialize, Serialize};

/// Causal graph builder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CausalConfig {
    pub max_lag_days: i64,
    pub series_window_days: i64,
    /// Minimum normalized cross-correlation peak.
    pub significance: f64,
    pub min_region_overlap: f64,
    /// Minimum reports per cluster before it takes part in inference.
    pub min_reports: usize,
    /// Lags up to this many days are `causes`; longer are `leads_to`.
    pub direct_lag_days: i64,
    /// Stable clusters above which inference turns incremental.
    pub pairwise_ceiling: usize,
    pub material_change_ratio: f64,
    pub default_cost_per_unit: f64,
    pub max_traversal_depth: usize,
    pub max_traversal_nodes: usize,
    pub ranking: RankingWeights,
}

/// Weights of the intervention ranking criteria.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    pub impact: f64,
    pub cost: f64,
    pub risk: f64,
    pub feedback: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            impact: 0.4,
            cost: 0.2,
            risk: 0.1,
            feedback: 0.3,
        }
    }
}

impl Default for CausalConfig {
    fn default() -> Self {
        Self {
            max_lag_days: 7,
            series_window_days: 120,
            significance: 0.3,
            min_region_overlap: 0.2,
            min_reports: 3,
            direct_lag_days: 3,
            pairwise_ceiling: 200,
            material_change_ratio: 0.1,
            default_cost_per_unit: 50_000.0,
            max_traversal_depth: 4,
            max_traversal_nodes: 256,
            ranking: RankingWeights::default(),
        }
    }
}
