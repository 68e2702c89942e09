//! The assembled engine: normalizer, embedder, cluster store, quarantine,
//! causal builder and the read-side Query API.

use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use grievance_causal::CausalGraphBuilder;
use grievance_clustering::IncrementalClusterer;
use grievance_core::traits::{Clock, IEmbeddingProvider, SystemClock};
use grievance_core::{
    GrievanceConfig, GrievanceResult, Intervention, InterventionId, InterventionSpec, ReportId,
};
use grievance_embeddings::{CachedEmbedder, HashingEmbedder};
use grievance_ingest::{DroppedReport, Quarantine, ReportNormalizer};
use tracing::info;

use crate::pipeline::ReportStatus;
use crate::query::QueryApi;
use crate::store::ClusterStore;

pub struct GrievanceEngine {
    pub(crate) config: GrievanceConfig,
    pub(crate) normalizer: ReportNormalizer,
    pub(crate) embedder: Arc<dyn IEmbeddingProvider>,
    pub(crate) store: Arc<ClusterStore>,
    pub(crate) quarantine: Mutex<Quarantine>,
    pub(crate) causal: Mutex<CausalGraphBuilder>,
    pub(crate) registry: DashMap<ReportId, ReportStatus>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) cycles: AtomicU64,
    query: QueryApi,
}

impl GrievanceEngine {
    /// Engine with the hashing embedder behind a moka cache and the wall
    /// clock.
    pub fn new(config: GrievanceConfig) -> GrievanceResult<Self> {
        let embedder = CachedEmbedder::new(
            HashingEmbedder::new(&config.embedding),
            config.embedding.cache_capacity,
        );
        Self::with_parts(config, Arc::new(embedder), Arc::new(SystemClock))
    }

    pub fn with_parts(
        config: GrievanceConfig,
        embedder: Arc<dyn IEmbeddingProvider>,
        clock: Arc<dyn Clock>,
    ) -> GrievanceResult<Self> {
        config.validate()?;
        let clusterer = IncrementalClusterer::new(&config, embedder.dimensions(), Arc::clone(&clock));
        let store = Arc::new(ClusterStore::new(clusterer, &config.clustering));
        let query = QueryApi::new(
            Arc::clone(&store),
            config.query.clone(),
            config.causal.clone(),
        );
        info!(
            provider = embedder.name(),
            dimensions = embedder.dimensions(),
            metric = ?config.index.metric,
            "grievance engine initialized"
        );
        Ok(Self {
            normalizer: ReportNormalizer::new(config.ingest.clone()),
            quarantine: Mutex::new(Quarantine::new(config.ingest.max_attempts)),
            causal: Mutex::new(CausalGraphBuilder::new(config.causal.clone())),
            registry: DashMap::new(),
            cycles: AtomicU64::new(0),
            config,
            embedder,
            store,
            clock,
            query,
        })
    }

    pub fn config(&self) -> &GrievanceConfig {
        &self.config
    }

    pub fn query(&self) -> &QueryApi {
        &self.query
    }

    pub fn store(&self) -> &Arc<ClusterStore> {
        &self.store
    }

    pub fn report_status(&self, id: &ReportId) -> Option<ReportStatus> {
        self.registry.get(id).map(|entry| entry.value().clone())
    }

    pub fn quarantined(&self) -> usize {
        self.lock_quarantine().len()
    }

    /// Most recent drops, oldest first.
    pub fn dropped_reports(&self) -> Vec<DroppedReport> {
        self.lock_quarantine().dropped().cloned().collect()
    }

    /// Register an intervention node. Targets given as merged cluster ids
    /// are redirected to the survivor; they must exist in the last causal
    /// rebuild.
    pub fn register_intervention(&self, mut spec: InterventionSpec) -> GrievanceResult<Intervention> {
        let published = self.store.current();
        for target in spec.targets.iter_mut() {
            *target = published.clustering.resolve(*target);
        }
        let (intervention, snapshot) = {
            let mut builder = self.lock_causal();
            let intervention = builder.register_intervention(spec, self.clock.now())?;
            (intervention, Arc::new(builder.snapshot()))
        };
        self.store.publish_causal(snapshot);
        Ok(intervention)
    }

    /// Record a 1 to 5 field rating for a registered intervention. Feeds the
    /// feedback criterion of `rank_interventions`.
    pub fn record_feedback(&self, id: &InterventionId, rating: u8) -> GrievanceResult<Intervention> {
        let (intervention, snapshot) = {
            let mut builder = self.lock_causal();
            let intervention = builder.record_feedback(id, rating)?;
            (intervention, Arc::new(builder.snapshot()))
        };
        self.store.publish_causal(snapshot);
        Ok(intervention)
    }

    pub(crate) fn lock_quarantine(&self) -> MutexGuard<'_, Quarantine> {
        self.quarantine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lock_causal(&self) -> MutexGuard<'_, CausalGraphBuilder> {
        self.causal.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
