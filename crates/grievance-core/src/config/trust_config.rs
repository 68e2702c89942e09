use serde::{Deserialize, Serialize};

/// Trust weight and confidence score settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    // Channel reliability priors
    pub prior_voice: f64,
    pub prior_text: f64,
    pub prior_field_audit: f64,

    // Geographic plausibility
    pub geo_majority: f64,
    pub geo_minority: f64,
    pub geo_unseen: f64,
    pub geo_untagged: f64,

    // Duplicate penalty
    pub duplicate_penalty: f64,
    pub duplicate_window_hours: i64,
    pub duplicate_hamming: u32,

    // Confidence composition; weights sum to 1
    pub w_support: f64,
    pub w_diversity: f64,
    pub w_growth: f64,
    pub support_scale: f64,
    pub growth_scale: f64,
    pub recency_half_life_days: f64,
    /// Multiplier applied while a cluster is still forming.
    pub forming_factor: f64,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            prior_voice: 0.65,
            prior_text: 0.75,
            prior_field_audit: 0.95,
            geo_majority: 1.0,
            geo_minority: 0.8,
            geo_unseen: 0.5,
            geo_untagged: 0.85,
            duplicate_penalty: 0.25,
            duplicate_window_hours: 24,
            duplicate_hamming: 3,
            w_support: 0.5,
            w_diversity: 0.2,
            w_growth: 0.3,
            support_scale: 5.0,
            growth_scale: 3.0,
            recency_half_life_days: 7.0,
            forming_factor: 0.6,
        }
    }
}
