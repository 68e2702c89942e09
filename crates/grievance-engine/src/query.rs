//! Query API: read-only projections over the published snapshot.
//!
//! Every call loads the current `StoreSnapshot` once and answers from it,
//! so a response never mixes two publishes and never waits on a writer.

use std::sync::Arc;
use std::time::Duration;

use grievance_clustering::trend::{growth_rate, growth_windows};
use grievance_core::config::{CausalConfig, QueryConfig};
use grievance_core::errors::CausalError;
use grievance_core::{
    CausalGraphView, Cluster, ClusterCard, ClusterId, ClusterState, DashboardStats,
    GrievanceError, GrievanceResult, RankedIntervention, SimulationResult,
};
use moka::sync::Cache;

use crate::store::{ClusterStore, StoreSnapshot};

pub struct QueryApi {
    store: Arc<ClusterStore>,
    config: QueryConfig,
    causal_config: CausalConfig,
    /// Keyed by published snapshot version.
    stats: Cache<u64, DashboardStats>,
}

impl QueryApi {
    pub fn new(store: Arc<ClusterStore>, config: QueryConfig, causal_config: CausalConfig) -> Self {
        let stats = Cache::builder()
            .max_capacity(16)
            .time_to_live(Duration::from_millis(config.stats_ttl_ms.max(1)))
            .build();
        Self {
            store,
            config,
            causal_config,
            stats,
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        self.store.current()
    }

    /// Live clusters by confidence, then 30-day count, then id. `limit`
    /// defaults to `default_hot_limit` and is capped at `max_hot_limit`.
    pub fn list_hot_clusters(&self, limit: Option<usize>) -> Vec<ClusterCard> {
        self.hot(limit, |_| true)
    }

    /// Hot clusters with at least one member mentioning `scheme` (a code
    /// such as `PMAY`, any case).
    pub fn hot_clusters_for_scheme(&self, scheme: &str, limit: Option<usize>) -> Vec<ClusterCard> {
        let code = scheme.trim().to_uppercase();
        self.hot(limit, |c| c.scheme_mentions.contains_key(&code))
    }

    fn hot(&self, limit: Option<usize>, keep: impl Fn(&Cluster) -> bool) -> Vec<ClusterCard> {
        let limit = limit
            .unwrap_or(self.config.default_hot_limit)
            .min(self.config.max_hot_limit);
        let snapshot = self.store.current();
        let mut live: Vec<&Arc<Cluster>> = snapshot.clustering.live().filter(|c| keep(c)).collect();
        live.sort_by(|a, b| {
            b.confidence_score
                .total_cmp(&a.confidence_score)
                .then(b.trend_metrics.count_30d.cmp(&a.trend_metrics.count_30d))
                .then(a.id.cmp(&b.id))
        });
        live.into_iter()
            .take(limit)
            .map(|c| ClusterCard::from(c.as_ref()))
            .collect()
    }

    pub fn dashboard_stats(&self) -> DashboardStats {
        let snapshot = self.store.current();
        self.stats
            .get_with(snapshot.version, || compute_stats(&snapshot, &self.config))
    }

    /// Subgraph around `cluster_id` (merged ids follow their redirect), or
    /// the whole graph capped at `graph_node_limit`.
    pub fn causal_graph(&self, cluster_id: Option<ClusterId>) -> CausalGraphView {
        let snapshot = self.store.current();
        let focus = cluster_id.map(|id| snapshot.clustering.resolve(id));
        snapshot.causal.view(focus, self.config.graph_node_limit)
    }

    /// A cluster by id. Merged ids resolve to the surviving cluster.
    pub fn get_cluster(&self, id: ClusterId) -> GrievanceResult<Arc<Cluster>> {
        let snapshot = self.store.current();
        let resolved = snapshot.clustering.resolve(id);
        snapshot
            .clustering
            .get(resolved)
            .cloned()
            .ok_or_else(|| GrievanceError::ClusterNotFound { id: id.to_string() })
    }

    pub fn simulate_intervention(
        &self,
        cluster_id: ClusterId,
        intensity: f64,
    ) -> GrievanceResult<SimulationResult> {
        let snapshot = self.store.current();
        let target = snapshot.clustering.resolve(cluster_id);
        snapshot
            .causal
            .simulate(target, intensity, &self.causal_config)
            .map_err(|err| match err {
                CausalError::UnknownNode { .. } => GrievanceError::ClusterNotFound {
                    id: cluster_id.to_string(),
                },
                other => other.into(),
            })
    }

    /// Registered interventions ranked by impact, cost, political risk
    /// and field feedback.
    pub fn rank_interventions(&self) -> Vec<RankedIntervention> {
        self.store.current().causal.rank_interventions(&self.causal_config)
    }
}

fn compute_stats(snapshot: &StoreSnapshot, config: &QueryConfig) -> DashboardStats {
    let clustering = &snapshot.clustering;
    if clustering.total_reports == 0 {
        return DashboardStats::default();
    }
    let activity = clustering.all_activity();
    let (last, previous) = growth_windows(&activity, clustering.taken_at);

    let (mut active, mut critical) = (0u64, 0u64);
    for cluster in clustering.live() {
        active += 1;
        if cluster.confidence_score >= config.critical_confidence
            && cluster.trend_metrics.growth_rate > 0.0
        {
            critical += 1;
        }
    }
    let (trust, members) = clustering
        .clusters
        .values()
        .filter(|c| !matches!(c.state, ClusterState::Merged { .. }))
        .fold((0.0, 0usize), |(t, n), c| (t + c.trust_mass(), n + c.size()));
    let avg_trust_score = if members == 0 { 0.0 } else { trust / members as f64 };

    DashboardStats {
        total_reports: clustering.total_reports as u64,
        reports_trend: growth_rate(last, previous),
        active_clusters: active,
        critical_clusters: critical,
        avg_trust_score,
        causal_confidence: snapshot.causal.mean_confidence,
    }
}
