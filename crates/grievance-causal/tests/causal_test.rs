//! End-to-end rebuilds over synthetic cluster activity.

use std::collections::BTreeMap;
use std::sync::Arc;

use grievance_causal::{
    CausalGraphBuilder, CausalInput, CausalNotice, ClusterSeries, RebuildMode,
};
use grievance_core::config::CausalConfig;
use grievance_core::{CausalRelation, ClusterId, InterventionSpec, NodeGroup, NodeKey};
use test_fixtures::ts;

// ─── Helpers ────────────────────────────────────────────────────────────────

const LEADER: [i64; 8] = [0, 1, 3, 6, 10, 14, 15, 17];

fn series(id: u64, days: &[i64], region: &str) -> ClusterSeries {
    let times: Vec<_> = days.iter().map(|d| ts(*d)).collect();
    let mut geo = BTreeMap::new();
    if !region.is_empty() {
        geo.insert(region.to_string(), days.len() as u64);
    }
    ClusterSeries {
        id: ClusterId::new(id),
        title: format!("cluster {id}"),
        size: times.len(),
        count_30d: times.len() as u64,
        times: Arc::new(times),
        geo,
        confidence: 0.7,
        stable: true,
    }
}

fn input(clusters: Vec<ClusterSeries>) -> CausalInput {
    CausalInput {
        as_of: ts(25),
        clusters,
        redirects: BTreeMap::new(),
    }
}

fn key(n: u64) -> NodeKey {
    NodeKey::Cluster(ClusterId::new(n))
}

// ─── Inference ──────────────────────────────────────────────────────────────

#[test]
fn two_day_lead_becomes_a_causes_edge() {
    let mut builder = CausalGraphBuilder::new(CausalConfig::default());
    let report = builder.rebuild(&input(vec![
        series(1, &LEADER, "Bihar"),
        series(2, &[2, 5, 8, 12, 16], "Bihar"),
    ]));
    assert_eq!(report.mode, RebuildMode::Full);
    assert_eq!(report.inferred_edges, 1);

    let edges: Vec<_> = builder.graph().edges().collect();
    assert_eq!(edges.len(), 1);
    let edge = edges[0];
    assert_eq!((&edge.from_id, &edge.to_id), (&key(1), &key(2)));
    assert_eq!(edge.relation, CausalRelation::Causes);
    assert_eq!(edge.lag_days, Some(2));
    assert!((edge.strength - 0.781).abs() < 0.01);
    assert!(edge.confidence > 0.0);

    let snapshot = builder.snapshot();
    let view = snapshot.view(None, 10);
    let groups: Vec<_> = view.nodes.iter().map(|n| (n.id.as_str(), n.group)).collect();
    assert_eq!(
        groups,
        vec![("cl-1", NodeGroup::RootCause), ("cl-2", NodeGroup::Outcome)]
    );
    assert!(snapshot.mean_confidence > 0.0);
}

#[test]
fn long_lead_becomes_leads_to() {
    let mut builder = CausalGraphBuilder::new(CausalConfig::default());
    let follower: Vec<i64> = LEADER.iter().map(|d| d + 5).collect();
    builder.rebuild(&input(vec![series(1, &LEADER, ""), series(2, &follower, "")]));
    let edges: Vec<_> = builder.graph().edges().collect();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].relation, CausalRelation::LeadsTo);
    assert_eq!(edges[0].lag_days, Some(5));
}

#[test]
fn disjoint_regions_block_the_edge() {
    let mut builder = CausalGraphBuilder::new(CausalConfig::default());
    builder.rebuild(&input(vec![
        series(1, &LEADER, "Bihar"),
        series(2, &[2, 5, 8, 12, 16], "Kerala"),
    ]));
    assert_eq!(builder.graph().edge_count(), 0);
    assert_eq!(builder.graph().node_count(), 2);
}

#[test]
fn simultaneous_or_sparse_clusters_get_no_edge() {
    let mut builder = CausalGraphBuilder::new(CausalConfig::default());
    builder.rebuild(&input(vec![
        series(1, &LEADER, "Bihar"),
        series(2, &LEADER, "Bihar"),
        series(3, &[2, 4], "Bihar"),
    ]));
    assert_eq!(builder.graph().edge_count(), 0);
}

// ─── Lifecycle ──────────────────────────────────────────────────────────────

#[test]
fn vanished_clusters_lose_their_edges() {
    let mut builder = CausalGraphBuilder::new(CausalConfig::default());
    builder.rebuild(&input(vec![
        series(1, &LEADER, "Bihar"),
        series(2, &[2, 5, 8, 12, 16], "Bihar"),
    ]));
    let report = builder.rebuild(&input(vec![series(1, &LEADER, "Bihar")]));
    assert_eq!(report.dropped_nodes, 1);
    assert_eq!(builder.graph().edge_count(), 0);
    assert!(builder.graph().get_node(&key(2)).is_none());
}

#[test]
fn above_the_ceiling_only_dirty_pairs_are_evaluated() {
    let config = CausalConfig {
        pairwise_ceiling: 2,
        ..CausalConfig::default()
    };
    let mut builder = CausalGraphBuilder::new(config);
    let clusters = vec![
        series(1, &LEADER, "Bihar"),
        series(2, &[2, 5, 8, 12, 16], "Bihar"),
        series(3, &[30, 40, 50], "Assam"),
    ];
    let first = builder.rebuild(&input(clusters.clone()));
    assert_eq!(first.mode, RebuildMode::Incremental);
    assert_eq!(first.evaluated_pairs, 3);
    assert_eq!(builder.graph().edge_count(), 1);

    // nothing changed: every pair is skipped and the edge survives
    let second = builder.rebuild(&input(clusters.clone()));
    assert_eq!(second.evaluated_pairs, 0);
    assert_eq!(
        second.notice,
        Some(CausalNotice::CausalInferenceSkipped {
            active: 3,
            ceiling: 2,
            evaluated_pairs: 0,
            skipped_pairs: 3,
        })
    );
    assert_eq!(builder.graph().edge_count(), 1);

    // a new cluster has no neighbours yet, so it is only paired with
    // other dirty clusters
    let mut grown = clusters;
    grown.push(series(4, &[1, 9, 20], "Assam"));
    let third = builder.rebuild(&input(grown.clone()));
    assert_eq!(third.evaluated_pairs, 0);
    assert_eq!(builder.graph().edge_count(), 1);

    // a material change re-pairs the cluster with its existing neighbour only
    grown[1] = series(2, &[2, 5, 8, 12, 16, 19], "Bihar");
    let fourth = builder.rebuild(&input(grown));
    assert_eq!(fourth.evaluated_pairs, 1);
    assert_eq!(
        fourth.notice,
        Some(CausalNotice::CausalInferenceSkipped {
            active: 4,
            ceiling: 2,
            evaluated_pairs: 1,
            skipped_pairs: 5,
        })
    );
    assert!(builder
        .graph()
        .has_relation(&key(1), &key(2), CausalRelation::Causes));
}

#[test]
fn forming_clusters_are_nodes_but_never_paired() {
    let mut builder = CausalGraphBuilder::new(CausalConfig::default());
    let forming = ClusterSeries {
        stable: false,
        ..series(2, &[2, 5, 8, 12, 16], "Bihar")
    };
    let report = builder.rebuild(&input(vec![series(1, &LEADER, "Bihar"), forming]));
    assert_eq!(report.active_clusters, 2);
    assert_eq!(report.stable_clusters, 1);
    assert_eq!(report.evaluated_pairs, 0);
    assert_eq!(builder.graph().edge_count(), 0);
    assert!(builder.graph().get_node(&key(2)).is_some());

    // once Stable, the same activity yields the edge
    let report = builder.rebuild(&input(vec![
        series(1, &LEADER, "Bihar"),
        series(2, &[2, 5, 8, 12, 16], "Bihar"),
    ]));
    assert_eq!(report.inferred_edges, 1);
    assert!(builder
        .graph()
        .has_relation(&key(1), &key(2), CausalRelation::Causes));
}

// ─── Wire shape ─────────────────────────────────────────────────────────────

#[test]
fn cycle_report_and_graph_serialize_for_the_api() {
    let config = CausalConfig {
        pairwise_ceiling: 1,
        ..CausalConfig::default()
    };
    let mut builder = CausalGraphBuilder::new(config);
    let report = builder.rebuild(&input(vec![
        series(1, &LEADER, "Bihar"),
        series(2, &[2, 5, 8, 12, 16], "Bihar"),
    ]));
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["mode"], "incremental");
    assert_eq!(json["stable_clusters"], 2);
    assert_eq!(json["notice"]["notice"], "causal_inference_skipped");
    assert_eq!(json["notice"]["ceiling"], 1);

    let edge = builder.graph().edges().next().unwrap().clone();
    let edge_json = serde_json::to_value(&edge).unwrap();
    assert_eq!(edge_json["from_id"], serde_json::json!({"kind": "cluster", "id": "cl-1"}));
    assert_eq!(edge_json["relation"], "causes");
    assert_eq!(serde_json::from_value::<grievance_core::CausalEdge>(edge_json).unwrap(), edge);

    let view = builder.snapshot().view(None, 10);
    let text = serde_json::to_string(&view).unwrap();
    assert_eq!(serde_json::from_str::<grievance_core::CausalGraphView>(&text).unwrap(), view);
}

// ─── Interventions ──────────────────────────────────────────────────────────

#[test]
fn interventions_survive_rebuilds_and_follow_merges() {
    let mut builder = CausalGraphBuilder::new(CausalConfig::default());
    builder.rebuild(&input(vec![series(1, &LEADER, ""), series(2, &[30], "")]));
    let iv = builder
        .register_intervention(
            InterventionSpec {
                id: Some("ration-audit".to_string()),
                title: "Ration shop audit".to_string(),
                targets: vec![ClusterId::new(2)],
                efficacy: 0.5,
                cost_per_unit: Some(1_000.0),
                political_risk: None,
            },
            ts(25),
        )
        .unwrap();

    // cluster 2 is merged into 1
    let mut merged = input(vec![series(1, &LEADER, "")]);
    merged.redirects.insert(ClusterId::new(2), ClusterId::new(1));
    builder.rebuild(&merged);

    let from = NodeKey::Intervention(iv.id.clone());
    assert!(builder
        .graph()
        .has_relation(&from, &key(1), CausalRelation::Mitigates));
    let snapshot = builder.snapshot();
    let view = snapshot.view(Some(ClusterId::new(2)), 10);
    assert_eq!(view.edges.len(), 1);
    assert_eq!(view.edges[0].from, "iv-ration-audit");
    assert_eq!(view.edges[0].to, "cl-1");

    let sim = snapshot
        .simulate(ClusterId::new(2), 0.5, builder.config())
        .unwrap();
    assert_eq!(sim.cluster_id, ClusterId::new(1));
    assert!((sim.cost_estimate - 500.0).abs() < 1e-9);
    assert_eq!(sim.expected_impact, 4);
}
