//! Request handlers. Reads answer from the published snapshot; writes run
//! on the blocking pool.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use grievance_core::{
    CausalGraphView, Cluster, ClusterCard, ClusterId, DashboardStats, Intervention,
    InterventionId, InterventionSpec, RankedIntervention, RawReport, SimulationResult,
};
use grievance_engine::{BatchReport, GrievanceEngine};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::metrics::CONTENT_TYPE;
use crate::AppState;

#[derive(Deserialize)]
pub struct HotQuery {
    limit: Option<usize>,
    /// Welfare scheme code, e.g. `PMAY`.
    scheme: Option<String>,
}

#[derive(Deserialize)]
pub struct GraphQuery {
    cluster_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulateRequest {
    cluster_id: ClusterId,
    intensity: f64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedbackRequest {
    rating: u8,
}

/// `POST /reports` accepts one report or an array of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum ReportsBody {
    Batch(Vec<RawReport>),
    Single(RawReport),
}

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
    snapshot_version: u64,
    total_reports: usize,
    live_clusters: usize,
    quarantined: usize,
}

#[derive(Serialize)]
pub struct Ready {
    status: &'static str,
    snapshot_version: u64,
}

fn parse_cluster_id(raw: &str) -> ApiResult<ClusterId> {
    raw.parse()
        .map_err(|err: String| ApiError::bad_request("invalid_cluster_id", err))
}

async fn blocking<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&GrievanceEngine) -> T + Send + 'static,
{
    let engine = Arc::clone(&state.engine);
    tokio::task::spawn_blocking(move || f(&engine))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))
}

pub async fn hot_clusters(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HotQuery>,
) -> Json<Vec<ClusterCard>> {
    let api = state.engine.query();
    let cards = match query.scheme.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(scheme) => api.hot_clusters_for_scheme(scheme, query.limit),
        None => api.list_hot_clusters(query.limit),
    };
    Json(cards)
}

pub async fn dashboard_stats(State(state): State<Arc<AppState>>) -> Json<DashboardStats> {
    Json(state.engine.query().dashboard_stats())
}

pub async fn causal_graph(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GraphQuery>,
) -> ApiResult<Json<CausalGraphView>> {
    let focus = query
        .cluster_id
        .as_deref()
        .filter(|raw| !raw.is_empty())
        .map(parse_cluster_id)
        .transpose()?;
    Ok(Json(state.engine.query().causal_graph(focus)))
}

pub async fn get_cluster(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Cluster>> {
    let id = parse_cluster_id(&id)?;
    let cluster = state.engine.query().get_cluster(id)?;
    Ok(Json(cluster.as_ref().clone()))
}

pub async fn submit_reports(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<BatchReport>)> {
    let reports = match serde_json::from_slice::<ReportsBody>(&body) {
        Ok(ReportsBody::Batch(reports)) => reports,
        Ok(ReportsBody::Single(report)) => vec![report],
        Err(err) => return Err(ApiError::bad_request("invalid_report", err.to_string())),
    };
    let limit = state.engine.config().server.max_batch;
    if reports.len() > limit {
        return Err(ApiError::BatchTooLarge {
            size: reports.len(),
            limit,
        });
    }
    if reports.is_empty() {
        return Err(ApiError::bad_request("invalid_report", "empty batch"));
    }
    let batch = blocking(&state, move |engine| engine.ingest_batch(reports)).await?;
    state.metrics.record_batch(&batch);
    info!(
        clustered = batch.clustered,
        quarantined = batch.quarantined,
        rejected = batch.rejected,
        "reports submitted"
    );
    Ok((StatusCode::ACCEPTED, Json(batch)))
}

pub async fn register_intervention(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Intervention>)> {
    let spec: InterventionSpec = serde_json::from_slice(&body)
        .map_err(|err| ApiError::bad_request("invalid_intervention", err.to_string()))?;
    let intervention = blocking(&state, move |engine| engine.register_intervention(spec)).await??;
    Ok((StatusCode::CREATED, Json(intervention)))
}

pub async fn simulate(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<SimulationResult>> {
    let request: SimulateRequest = serde_json::from_slice(&body)
        .map_err(|err| ApiError::bad_request("invalid_request", err.to_string()))?;
    if !request.intensity.is_finite() {
        return Err(ApiError::bad_request("invalid_request", "intensity must be finite"));
    }
    let result = state
        .engine
        .query()
        .simulate_intervention(request.cluster_id, request.intensity)?;
    Ok(Json(result))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    let snapshot = state.engine.query().snapshot();
    Json(Health {
        status: "ok",
        snapshot_version: snapshot.version,
        total_reports: snapshot.clustering.total_reports,
        live_clusters: snapshot.clustering.live().count(),
        quarantined: state.engine.quarantined(),
    })
}

pub async fn ranked_interventions(State(state): State<Arc<AppState>>) -> Json<Vec<RankedIntervention>> {
    Json(state.engine.query().rank_interventions())
}

pub async fn intervention_feedback(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Intervention>> {
    let request: FeedbackRequest = serde_json::from_slice(&body)
        .map_err(|err| ApiError::bad_request("invalid_request", err.to_string()))?;
    let id = InterventionId::new(id.strip_prefix("iv-").unwrap_or(&id));
    let intervention =
        blocking(&state, move |engine| engine.record_feedback(&id, request.rating)).await??;
    Ok(Json(intervention))
}

/// Ready once the cluster store can be locked within the retry budget.
pub async fn ready(State(state): State<Arc<AppState>>) -> ApiResult<Json<Ready>> {
    blocking(&state, |engine| engine.store().with_read("readiness", |_| ())).await??;
    Ok(Json(Ready {
        status: "ready",
        snapshot_version: state.engine.query().snapshot().version,
    }))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    state.metrics.observe(&state.engine);
    let body = state
        .metrics
        .render()
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok(([(header::CONTENT_TYPE, CONTENT_TYPE)], body))
}
