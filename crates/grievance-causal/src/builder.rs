//! Causal graph builder: one rebuild per maintenance cycle over a
//! point-in-time view of the clusters.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use grievance_core::config::CausalConfig;
use grievance_core::{CausalEdge, CausalRelation, ClusterId, Intervention, InterventionId, NodeKey};
use petgraph::Direction;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::graph::IndexedGraph;
use crate::inference::{evaluate_pair, PairSide};
use crate::series::{bin_daily, DailySeries};
use crate::snapshot::{CausalGraphSnapshot, ClusterInfo};

/// One active cluster as the builder sees it.
#[derive(Debug, Clone)]
pub struct ClusterSeries {
    pub id: ClusterId,
    pub title: String,
    /// Member submission times, sorted.
    pub times: Arc<Vec<DateTime<Utc>>>,
    pub geo: BTreeMap<String, u64>,
    pub size: usize,
    pub count_30d: u64,
    pub confidence: f64,
    /// Only Stable clusters are paired for inference; the rest are nodes
    /// that interventions can still target.
    pub stable: bool,
}

/// Point-in-time input to a rebuild.
#[derive(Debug, Clone)]
pub struct CausalInput {
    pub as_of: DateTime<Utc>,
    pub clusters: Vec<ClusterSeries>,
    /// Merged cluster -> the cluster it was folded into.
    pub redirects: BTreeMap<ClusterId, ClusterId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildMode {
    Full,
    Incremental,
}

/// Informational outcomes of a rebuild. Not errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum CausalNotice {
    CausalInferenceSkipped {
        active: usize,
        ceiling: usize,
        evaluated_pairs: usize,
        skipped_pairs: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CausalCycleReport {
    pub version: u64,
    pub mode: RebuildMode,
    pub active_clusters: usize,
    /// Clusters that took part in inference.
    pub stable_clusters: usize,
    pub evaluated_pairs: usize,
    pub inferred_edges: usize,
    pub dropped_nodes: usize,
    pub notice: Option<CausalNotice>,
}

/// Owns every causal edge. Rebuilds replace inferred edges; intervention
/// edges are re-derived from the registered interventions each time.
pub struct CausalGraphBuilder {
    pub(crate) config: CausalConfig,
    pub(crate) graph: IndexedGraph,
    /// Member count of each cluster when its pairs were last evaluated.
    evaluated: HashMap<ClusterId, usize>,
    pub(crate) interventions: BTreeMap<InterventionId, Intervention>,
    pub(crate) clusters: BTreeMap<ClusterId, ClusterInfo>,
    pub(crate) redirects: BTreeMap<ClusterId, ClusterId>,
    pub(crate) version: u64,
    built_at: Option<DateTime<Utc>>,
}

impl CausalGraphBuilder {
    pub fn new(config: CausalConfig) -> Self {
        Self {
            config,
            graph: IndexedGraph::new(),
            evaluated: HashMap::new(),
            interventions: BTreeMap::new(),
            clusters: BTreeMap::new(),
            redirects: BTreeMap::new(),
            version: 0,
            built_at: None,
        }
    }

    pub fn config(&self) -> &CausalConfig {
        &self.config
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn graph(&self) -> &IndexedGraph {
        &self.graph
    }

    pub fn interventions(&self) -> impl Iterator<Item = &Intervention> + '_ {
        self.interventions.values()
    }

    /// Follow merge redirects from `id`, bounded by the redirect count.
    pub fn resolve(&self, id: ClusterId) -> ClusterId {
        resolve_redirect(&self.redirects, id)
    }

    pub fn rebuild(&mut self, input: &CausalInput) -> CausalCycleReport {
        let active: BTreeMap<ClusterId, &ClusterSeries> =
            input.clusters.iter().map(|c| (c.id, c)).collect();
        // only Stable clusters take part in inference
        let eligible: BTreeMap<ClusterId, &ClusterSeries> = active
            .iter()
            .filter(|(_, c)| c.stable)
            .map(|(id, c)| (*id, *c))
            .collect();
        let pad = self.config.max_lag_days.max(0);
        let window = self.config.series_window_days;
        let series: BTreeMap<ClusterId, DailySeries> = eligible
            .par_iter()
            .map(|(id, c)| (*id, bin_daily(&c.times, input.as_of, window, pad)))
            .collect();

        let dropped_nodes = self.drop_vanished(&active);
        for c in active.values() {
            self.graph.ensure_node(&NodeKey::Cluster(c.id), &c.title);
        }
        self.evaluated.retain(|id, _| eligible.contains_key(id));
        self.graph.remove_edges_where(|e| {
            e.inferred
                && [&e.from_id, &e.to_id].iter().any(|k| {
                    k.cluster_id().is_some_and(|id| !eligible.contains_key(&id))
                })
        });

        let mode = if eligible.len() > self.config.pairwise_ceiling {
            RebuildMode::Incremental
        } else {
            RebuildMode::Full
        };
        let ids: Vec<ClusterId> = eligible.keys().copied().collect();
        let (pairs, dirty): (Vec<(ClusterId, ClusterId)>, BTreeSet<ClusterId>) = match mode {
            RebuildMode::Full => {
                self.graph.remove_edges_where(|e| e.inferred);
                let pairs = ids
                    .iter()
                    .enumerate()
                    .flat_map(|(i, a)| ids[i + 1..].iter().map(move |b| (*a, *b)))
                    .collect();
                (pairs, ids.iter().copied().collect())
            }
            RebuildMode::Incremental => {
                let dirty: BTreeSet<ClusterId> = eligible
                    .values()
                    .filter(|c| self.materially_changed(c))
                    .map(|c| c.id)
                    .collect();
                // dirty clusters are re-paired with each other and with the
                // clusters they already share an inferred edge with
                let mut reach = dirty.clone();
                for id in &dirty {
                    reach.extend(self.inferred_neighbors(*id));
                }
                reach.retain(|id| eligible.contains_key(id));
                self.graph.remove_edges_where(|e| {
                    e.inferred
                        && [&e.from_id, &e.to_id].iter().any(|k| {
                            k.cluster_id().is_some_and(|id| dirty.contains(&id))
                        })
                });
                let pairs: BTreeSet<(ClusterId, ClusterId)> = dirty
                    .iter()
                    .flat_map(|a| {
                        reach
                            .iter()
                            .filter(move |b| *b != a)
                            .map(move |b| (*a.min(b), *a.max(b)))
                    })
                    .collect();
                (pairs.into_iter().collect(), dirty)
            }
        };
        let total_pairs = ids.len() * ids.len().saturating_sub(1) / 2;

        let config = &self.config;
        let edges: Vec<CausalEdge> = pairs
            .par_iter()
            .filter_map(|(a, b)| {
                let side = |id: &ClusterId| {
                    Some(PairSide {
                        id: *id,
                        series: series.get(id)?,
                        geo: &active.get(id)?.geo,
                    })
                };
                evaluate_pair(side(a)?, side(b)?, config)
            })
            .collect();
        let inferred_edges = edges.len();
        for edge in edges {
            self.graph.add_edge(edge);
        }

        for id in &dirty {
            if let Some(c) = eligible.get(id) {
                self.evaluated.insert(*id, c.size);
            }
        }
        self.redirects = input.redirects.clone();
        self.clusters = active
            .values()
            .map(|c| {
                (
                    c.id,
                    ClusterInfo {
                        title: c.title.clone(),
                        count_30d: c.count_30d,
                        confidence: c.confidence,
                    },
                )
            })
            .collect();
        self.relink_interventions();
        self.version += 1;
        self.built_at = Some(input.as_of);

        let notice = (mode == RebuildMode::Incremental).then(|| {
            let skipped_pairs = total_pairs - pairs.len();
            info!(
                active = eligible.len(),
                ceiling = self.config.pairwise_ceiling,
                evaluated_pairs = pairs.len(),
                skipped_pairs,
                "causal inference skipped for unchanged pairs"
            );
            CausalNotice::CausalInferenceSkipped {
                active: eligible.len(),
                ceiling: self.config.pairwise_ceiling,
                evaluated_pairs: pairs.len(),
                skipped_pairs,
            }
        });
        debug!(
            version = self.version,
            ?mode,
            pairs = pairs.len(),
            edges = self.graph.edge_count(),
            dropped_nodes,
            "causal graph rebuilt"
        );
        CausalCycleReport {
            version: self.version,
            mode,
            active_clusters: active.len(),
            stable_clusters: eligible.len(),
            evaluated_pairs: pairs.len(),
            inferred_edges,
            dropped_nodes,
            notice,
        }
    }

    pub fn snapshot(&self) -> CausalGraphSnapshot {
        CausalGraphSnapshot::new(
            self.version,
            self.built_at,
            self.graph.clone(),
            self.clusters.clone(),
            self.interventions.clone(),
            self.redirects.clone(),
        )
    }

    fn materially_changed(&self, c: &ClusterSeries) -> bool {
        match self.evaluated.get(&c.id) {
            None => true,
            Some(&before) => {
                let change = c.size.abs_diff(before) as f64 / before.max(1) as f64;
                change >= self.config.material_change_ratio
            }
        }
    }

    /// Clusters sharing an inferred edge with `id`, in either direction.
    fn inferred_neighbors(&self, id: ClusterId) -> Vec<ClusterId> {
        let key = NodeKey::Cluster(id);
        [Direction::Outgoing, Direction::Incoming]
            .into_iter()
            .flat_map(|dir| self.graph.edges_directed(&key, dir))
            .filter(|e| e.inferred)
            .filter_map(|e| {
                [&e.from_id, &e.to_id]
                    .into_iter()
                    .filter_map(NodeKey::cluster_id)
                    .find(|other| *other != id)
            })
            .collect()
    }

    /// Remove cluster nodes that are no longer active, with their edges.
    fn drop_vanished(&mut self, active: &BTreeMap<ClusterId, &ClusterSeries>) -> usize {
        let vanished: Vec<NodeKey> = self
            .graph
            .node_index
            .keys()
            .filter(|k| k.cluster_id().is_some_and(|id| !active.contains_key(&id)))
            .cloned()
            .collect();
        for key in &vanished {
            self.graph.remove_node(key);
            if let Some(id) = key.cluster_id() {
                self.evaluated.remove(&id);
            }
        }
        vanished.len()
    }

    /// Re-derive every `mitigates` edge. Targets follow merge redirects;
    /// targets that are no longer active are skipped.
    pub(crate) fn relink_interventions(&mut self) {
        self.graph
            .remove_edges_where(|e| e.relation == CausalRelation::Mitigates);
        let mut edges = Vec::new();
        for intervention in self.interventions.values() {
            let from = NodeKey::Intervention(intervention.id.clone());
            self.graph.ensure_node(&from, &intervention.title);
            let targets: BTreeSet<ClusterId> = intervention
                .targets
                .iter()
                .map(|t| resolve_redirect(&self.redirects, *t))
                .collect();
            for target in targets {
                let to = NodeKey::Cluster(target);
                if self.graph.get_node(&to).is_none() {
                    continue;
                }
                if let Ok(edge) =
                    CausalEdge::new(from.clone(), to, CausalRelation::Mitigates, intervention.efficacy)
                {
                    edges.push(edge);
                }
            }
        }
        for edge in edges {
            self.graph.add_edge(edge);
        }
    }
}

pub(crate) fn resolve_redirect(redirects: &BTreeMap<ClusterId, ClusterId>, id: ClusterId) -> ClusterId {
    let mut current = id;
    for _ in 0..=redirects.len() {
        match redirects.get(&current) {
            Some(next) if *next != current => current = *next,
            _ => break,
        }
    }
    current
}
