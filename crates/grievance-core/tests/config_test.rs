#![allow(clippy::field_reassign_with_default)]
//! Config loading and validation.

use grievance_core::config::{DistanceMetric, LogFormat};
use grievance_core::{GrievanceConfig, GrievanceError};

// ═══════════════════════════════════════════════════════════════════════════
// Defaults and partial files
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn default_config_validates() {
    GrievanceConfig::default().validate().unwrap();
}

#[test]
fn empty_toml_is_all_defaults() {
    let config = GrievanceConfig::from_toml("").unwrap();
    assert_eq!(config.ingest.max_text_chars, 5000);
    assert_eq!(config.embedding.dimensions, 256);
    assert_eq!(config.index.metric, DistanceMetric::Cosine);
    assert_eq!(config.observability.log_format, LogFormat::Pretty);
}

#[test]
fn partial_section_keeps_other_defaults() {
    let toml = r#"
        [clustering]
        join_threshold = 0.4

        [observability]
        log_format = "json"
    "#;
    let config = GrievanceConfig::load(toml).unwrap();
    assert_eq!(config.clustering.join_threshold, 0.4);
    assert_eq!(config.clustering.min_stable_size, 3);
    assert_eq!(config.observability.log_format, LogFormat::Json);
    assert_eq!(config.causal.direct_lag_days, 3);
}

#[test]
fn euclidean_metric_parses() {
    let config = GrievanceConfig::load("[index]\nmetric = \"euclidean\"\n").unwrap();
    assert_eq!(config.index.metric, DistanceMetric::Euclidean);
}

// ═══════════════════════════════════════════════════════════════════════════
// Validation failures
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn merge_threshold_below_join_threshold_is_rejected() {
    let mut config = GrievanceConfig::default();
    config.clustering.join_threshold = 0.5;
    config.clustering.merge_threshold = 0.3;
    assert!(matches!(config.validate(), Err(GrievanceError::Config(_))));
}

#[test]
fn trust_weights_must_sum_to_one() {
    let mut config = GrievanceConfig::default();
    config.trust.w_growth = 0.9;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("sum to 1.0"));
}

#[test]
fn zero_dimensions_are_rejected() {
    let mut config = GrievanceConfig::default();
    config.embedding.dimensions = 0;
    assert!(config.validate().is_err());
}

#[test]
fn series_window_must_exceed_lag() {
    let mut config = GrievanceConfig::default();
    config.causal.series_window_days = config.causal.max_lag_days;
    assert!(config.validate().is_err());
}

#[test]
fn ranking_weights_load_partially_and_reject_negatives() {
    let config = GrievanceConfig::load("[causal.ranking]\nfeedback = 0.0\n").unwrap();
    assert_eq!(config.causal.ranking.feedback, 0.0);
    assert_eq!(config.causal.ranking.impact, 0.4);

    let mut config = GrievanceConfig::default();
    config.causal.ranking.cost = -0.1;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("ranking"));
}

#[test]
fn malformed_toml_maps_to_config_error() {
    let err = GrievanceConfig::load("[clustering\njoin = ").unwrap_err();
    assert!(matches!(err, GrievanceError::Config(_)));
}
