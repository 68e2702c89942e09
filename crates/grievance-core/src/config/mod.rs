pub mod causal_config;
pub mod clustering_config;
pub mod embedding_config;
pub mod index_config;
pub mod ingest_config;
pub mod observability_config;
pub mod query_config;
pub mod server_config;
pub mod trust_config;

use serde::{Deserialize, Serialize};

pub use causal_config::{CausalConfig, RankingWeights};
pub use clustering_config::ClusteringConfig;
pub use embedding_config::EmbeddingConfig;
pub use index_config::{DistanceMetric, IndexConfig};
pub use ingest_config::IngestConfig;
pub use observability_config::{LogFormat, ObservabilityConfig};
pub use query_config::QueryConfig;
pub use server_config::ServerConfig;
pub use trust_config::TrustConfig;

use crate::errors::{GrievanceError, GrievanceResult};

/// Top-level configuration aggregating all subsystem configs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GrievanceConfig {
    pub ingest: IngestConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub clustering: ClusteringConfig,
    pub trust: TrustConfig,
    pub causal: CausalConfig,
    pub query: QueryConfig,
    pub server: ServerConfig,
    pub observability: ObservabilityConfig,
}

impl GrievanceConfig {
    /// Load config from a TOML string, falling back to defaults for missing fields.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Parse and validate in one step.
    pub fn load(toml_str: &str) -> GrievanceResult<Self> {
        let config =
            Self::from_toml(toml_str).map_err(|e| GrievanceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the engine cannot run with.
    pub fn validate(&self) -> GrievanceResult<()> {
        let c = &self.clustering;
        let max_distance = match self.index.metric {
            DistanceMetric::Cosine => 2.0,
            DistanceMetric::Euclidean => f64::MAX,
        };
        if !(0.0..=max_distance).contains(&c.join_threshold) {
            return Err(config_err(format!(
                "clustering.join_threshold {} outside [0, {max_distance}]",
                c.join_threshold
            )));
        }
        if c.merge_threshold < c.join_threshold {
            return Err(config_err(format!(
                "clustering.merge_threshold {} must be >= join_threshold {}",
                c.merge_threshold, c.join_threshold
            )));
        }
        if !(0.0..=1.0).contains(&c.merge_overlap_ratio) {
            return Err(config_err("clustering.merge_overlap_ratio outside [0, 1]"));
        }
        if c.min_stable_size == 0 {
            return Err(config_err("clustering.min_stable_size must be >= 1"));
        }
        if c.merge_interval == 0 {
            return Err(config_err("clustering.merge_interval must be >= 1"));
        }
        if c.lock_retry_budget == 0 {
            return Err(config_err("clustering.lock_retry_budget must be >= 1"));
        }
        if self.embedding.dimensions == 0 {
            return Err(config_err("embedding.dimensions must be >= 1"));
        }
        if self.index.hash_bits == 0 || self.index.hash_bits > 16 {
            return Err(config_err("index.hash_bits must be in 1..=16"));
        }
        if self.index.candidates == 0 {
            return Err(config_err("index.candidates must be >= 1"));
        }
        let t = &self.trust;
        let weight_sum = t.w_support + t.w_diversity + t.w_growth;
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(config_err(format!(
                "trust weights must sum to 1.0, got {weight_sum}"
            )));
        }
        for (name, value) in [
            ("prior_voice", t.prior_voice),
            ("prior_text", t.prior_text),
            ("prior_field_audit", t.prior_field_audit),
            ("duplicate_penalty", t.duplicate_penalty),
            ("forming_factor", t.forming_factor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(config_err(format!("trust.{name} outside [0, 1]")));
            }
        }
        if t.support_scale <= 0.0 || t.growth_scale <= 0.0 || t.recency_half_life_days <= 0.0 {
            return Err(config_err("trust scales must be positive"));
        }
        let k = &self.causal;
        if k.max_lag_days < 1 {
            return Err(config_err("causal.max_lag_days must be >= 1"));
        }
        if k.series_window_days <= k.max_lag_days {
            return Err(config_err("causal.series_window_days must exceed max_lag_days"));
        }
        if !(0.0..=1.0).contains(&k.significance) || k.significance == 0.0 {
            return Err(config_err("causal.significance must be in (0, 1]"));
        }
        let r = &k.ranking;
        if [r.impact, r.cost, r.risk, r.feedback]
            .iter()
            .any(|w| !w.is_finite() || *w < 0.0)
        {
            return Err(config_err("causal.ranking weights must be non-negative"));
        }
        if self.query.graph_node_limit == 0 {
            return Err(config_err("query.graph_node_limit must be >= 1"));
        }
        Ok(())
    }
}

fn config_err(msg: impl Into<String>) -> GrievanceError {
    GrievanceError::Config(msg.into())
}
