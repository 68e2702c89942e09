//! # grievance-server
//!
//! axum boundary over [`GrievanceEngine`]: the dashboard's read routes,
//! report ingest, intervention registration, ranking and simulation,
//! health, readiness and Prometheus metrics, plus the background
//! maintenance loop.

pub mod error;
pub mod metrics;
pub mod routes;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use grievance_engine::GrievanceEngine;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use error::{ApiError, ApiResult};
pub use metrics::ServerMetrics;

pub struct AppState {
    pub engine: Arc<GrievanceEngine>,
    pub metrics: Arc<ServerMetrics>,
}

pub fn router(engine: Arc<GrievanceEngine>, metrics: Arc<ServerMetrics>) -> Router {
    let state = Arc::new(AppState { engine, metrics });
    Router::new()
        .route("/clusters/hot", get(routes::hot_clusters))
        .route("/clusters/{id}", get(routes::get_cluster))
        .route("/dashboard/stats", get(routes::dashboard_stats))
        .route("/causal-graph", get(routes::causal_graph))
        .route("/reports", post(routes::submit_reports))
        .route("/interventions", post(routes::register_intervention))
        .route("/interventions/ranked", get(routes::ranked_interventions))
        .route("/interventions/simulate", post(routes::simulate))
        .route("/interventions/{id}/feedback", post(routes::intervention_feedback))
        .route("/health", get(routes::health))
        .route("/ready", get(routes::ready))
        .route("/metrics", get(routes::metrics))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run a maintenance cycle every `interval` on the blocking pool. Cycles
/// never overlap: the next tick waits for the previous cycle.
pub async fn maintenance_loop(
    engine: Arc<GrievanceEngine>,
    metrics: Arc<ServerMetrics>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // the first tick fires immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let engine = Arc::clone(&engine);
        match tokio::task::spawn_blocking(move || engine.run_cycle()).await {
            Ok(report) => {
                metrics.record_cycle(&report);
                info!(
                    cycle = report.cycle,
                    snapshot_version = report.snapshot_version,
                    errors = report.errors.len(),
                    "scheduled maintenance finished"
                );
            }
            Err(err) => warn!(error = %err, "maintenance task failed"),
        }
    }
}
