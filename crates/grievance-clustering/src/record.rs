//! Cluster record: the published `Cluster` plus the running statistics the
//! clusterer needs to update it incrementally.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use grievance_core::{Cluster, ClusterId, ClusterState, Report, ReportId, SourceChannel, TrendMetrics};
use grievance_embeddings::HashingEmbedder;
use grievance_trust::{ConfidenceInputs, ConfidenceScorer};

use crate::labels;
use crate::trend::{insert_sorted, trend_metrics};

/// Internal per-cluster state. `cluster` and `times` are shared with
/// published snapshots and copied on write.
#[derive(Debug, Clone)]
pub(crate) struct ClusterRecord {
    pub cluster: Arc<Cluster>,
    centroid_sum: Vec<f64>,
    terms: HashMap<String, u64>,
    channels: BTreeMap<SourceChannel, u64>,
    pub times: Arc<Vec<DateTime<Utc>>>,
    /// Most trusted member and its excerpt. Ties go to the smaller id.
    representative: Option<(ReportId, f64, String)>,
}

impl ClusterRecord {
    /// Singleton cluster seeded by `report`.
    pub fn seed(id: ClusterId, report: &Report, trust: f64) -> Self {
        let dims = report.embedding().len();
        let cluster = Cluster {
            id,
            state: ClusterState::Forming,
            centroid: vec![0.0; dims],
            member_ids: BTreeSet::new(),
            title: String::new(),
            summary: String::new(),
            trend_metrics: TrendMetrics::default(),
            geo_distribution: BTreeMap::new(),
            scheme_mentions: BTreeMap::new(),
            confidence_score: 0.0,
            member_trust: BTreeMap::new(),
            created_at: report.submitted_at,
            last_report_at: report.submitted_at,
            version: 0,
        };
        let mut record = Self {
            cluster: Arc::new(cluster),
            centroid_sum: vec![0.0; dims],
            terms: HashMap::new(),
            channels: BTreeMap::new(),
            times: Arc::new(Vec::new()),
            representative: None,
        };
        record.add_member(report, trust);
        record
    }

    /// Rebuild a record from scratch, e.g. for one half of a split.
    pub fn from_members(id: ClusterId, state: ClusterState, members: &[(&Report, f64)]) -> Option<Self> {
        let (first, first_trust) = members.first()?;
        let mut record = Self::seed(id, first, *first_trust);
        for (report, trust) in &members[1..] {
            record.add_member(report, *trust);
        }
        Arc::make_mut(&mut record.cluster).state = state;
        Some(record)
    }

    pub fn id(&self) -> ClusterId {
        self.cluster.id
    }

    pub fn is_live(&self) -> bool {
        self.cluster.is_live()
    }

    pub fn size(&self) -> usize {
        self.cluster.member_ids.len()
    }

    pub fn centroid(&self) -> &[f32] {
        &self.cluster.centroid
    }

    /// Centroid the cluster would have after adding `embedding`.
    pub fn centroid_with(&self, embedding: &[f32]) -> Vec<f32> {
        let n = (self.size() + 1) as f64;
        self.centroid_sum
            .iter()
            .zip(embedding)
            .map(|(s, e)| ((s + *e as f64) / n) as f32)
            .collect()
    }

    /// Centroid the cluster would have after absorbing `other`.
    pub fn centroid_merged(&self, other: &ClusterRecord) -> Vec<f32> {
        let n = (self.size() + other.size()).max(1) as f64;
        self.centroid_sum
            .iter()
            .zip(&other.centroid_sum)
            .map(|(a, b)| ((a + b) / n) as f32)
            .collect()
    }

    pub fn add_member(&mut self, report: &Report, trust: f64) {
        for (sum, v) in self.centroid_sum.iter_mut().zip(report.embedding()) {
            *sum += *v as f64;
        }
        for term in HashingEmbedder::tokenize(&report.text) {
            *self.terms.entry(term).or_insert(0) += 1;
        }
        *self.channels.entry(report.source_channel).or_insert(0) += 1;
        insert_sorted(Arc::make_mut(&mut self.times), report.submitted_at);
        self.offer_representative(&report.id, trust, &report.text);

        let n = (self.size() + 1) as f64;
        let centroid: Vec<f32> = self.centroid_sum.iter().map(|s| (s / n) as f32).collect();
        let cluster = Arc::make_mut(&mut self.cluster);
        cluster.member_ids.insert(report.id.clone());
        cluster.member_trust.insert(report.id.clone(), trust);
        if let Some(region) = report.region() {
            *cluster.geo_distribution.entry(region.to_string()).or_insert(0) += 1;
        }
        for code in &report.schemes {
            *cluster.scheme_mentions.entry(code.clone()).or_insert(0) += 1;
        }
        cluster.centroid = centroid;
        cluster.last_report_at = cluster.last_report_at.max(report.submitted_at);
        cluster.created_at = cluster.created_at.min(report.submitted_at);
        cluster.version += 1;
    }

    /// Union `other` into this record. `other` is left untouched.
    pub fn absorb(&mut self, other: &ClusterRecord) {
        for (a, b) in self.centroid_sum.iter_mut().zip(&other.centroid_sum) {
            *a += b;
        }
        for (term, count) in &other.terms {
            *self.terms.entry(term.clone()).or_insert(0) += count;
        }
        for (channel, count) in &other.channels {
            *self.channels.entry(*channel).or_insert(0) += count;
        }
        {
            let times = Arc::make_mut(&mut self.times);
            times.extend(other.times.iter().copied());
            times.sort();
        }
        if let Some((id, trust, text)) = &other.representative {
            self.offer_representative(id, *trust, text);
        }
        let n = (self.size() + other.size()).max(1) as f64;
        let centroid: Vec<f32> = self.centroid_sum.iter().map(|s| (s / n) as f32).collect();
        let cluster = Arc::make_mut(&mut self.cluster);
        let theirs = &other.cluster;
        cluster
            .member_ids
            .extend(theirs.member_ids.iter().cloned());
        cluster
            .member_trust
            .extend(theirs.member_trust.iter().map(|(k, v)| (k.clone(), *v)));
        for (region, count) in &theirs.geo_distribution {
            *cluster.geo_distribution.entry(region.clone()).or_insert(0) += count;
        }
        for (code, count) in &theirs.scheme_mentions {
            *cluster.scheme_mentions.entry(code.clone()).or_insert(0) += count;
        }
        cluster.centroid = centroid;
        cluster.last_report_at = cluster.last_report_at.max(theirs.last_report_at);
        cluster.created_at = cluster.created_at.min(theirs.created_at);
        cluster.version += 1;
    }

    /// Turn this record into a merge tombstone pointing at `into`.
    pub fn retire_into(&mut self, into: ClusterId) {
        self.centroid_sum.iter_mut().for_each(|s| *s = 0.0);
        self.terms.clear();
        self.channels.clear();
        self.times = Arc::new(Vec::new());
        self.representative = None;
        let cluster = Arc::make_mut(&mut self.cluster);
        cluster.state = ClusterState::Merged { into };
        cluster.member_ids.clear();
        cluster.member_trust.clear();
        cluster.geo_distribution.clear();
        cluster.scheme_mentions.clear();
        cluster.trend_metrics = TrendMetrics::default();
        cluster.confidence_score = 0.0;
        cluster.version += 1;
    }

    pub fn set_state(&mut self, state: ClusterState) {
        if self.cluster.state != state {
            let cluster = Arc::make_mut(&mut self.cluster);
            cluster.state = state;
            cluster.version += 1;
        }
    }

    fn offer_representative(&mut self, id: &ReportId, trust: f64, text: &str) {
        let better = match &self.representative {
            None => true,
            Some((best_id, best_trust, _)) => {
                trust > *best_trust || (trust == *best_trust && id < best_id)
            }
        };
        if better {
            self.representative = Some((id.clone(), trust, text.to_string()));
        }
    }

    /// Recompute every derived field as of `now`: state promotion, trend
    /// metrics, labels and confidence.
    pub fn refresh(&mut self, now: DateTime<Utc>, min_stable_size: usize, scorer: &ConfidenceScorer) {
        if matches!(self.cluster.state, ClusterState::Merged { .. }) {
            return;
        }
        let size = self.size();
        let trend = trend_metrics(&self.times, now);
        let recent_mass = scorer.recent_mass(self.times.iter(), now);
        let state = if self.cluster.state == ClusterState::Forming && size >= min_stable_size {
            ClusterState::Stable
        } else {
            self.cluster.state
        };
        let title = labels::title(&self.terms, self.cluster.majority_region());
        let excerpt = self
            .representative
            .as_ref()
            .map(|(_, _, text)| text.as_str())
            .unwrap_or("");
        let summary = labels::summary(
            size,
            &self.channels,
            self.cluster.geo_distribution.len(),
            self.cluster.last_report_at,
            excerpt,
        );
        let confidence = scorer.score(&ConfidenceInputs {
            state,
            trust_mass: self.cluster.trust_mass(),
            distinct_channels: self.channels.len(),
            distinct_regions: self.cluster.geo_distribution.len(),
            recent_mass,
        });

        let unchanged = self.cluster.state == state
            && self.cluster.trend_metrics == trend
            && self.cluster.title == title
            && self.cluster.summary == summary
            && self.cluster.confidence_score == confidence;
        if unchanged {
            return;
        }
        let cluster = Arc::make_mut(&mut self.cluster);
        cluster.state = state;
        cluster.trend_metrics = trend;
        cluster.title = title;
        cluster.summary = summary;
        cluster.confidence_score = confidence;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grievance_core::config::TrustConfig;
    use test_fixtures::{ts, unit_vector, ReportBuilder};

    fn scorer() -> ConfidenceScorer {
        ConfidenceScorer::new(TrustConfig::default())
    }

    #[test]
    fn centroid_is_running_mean() {
        let a = ReportBuilder::new("a").embedding(unit_vector(2, 0)).build();
        let b = ReportBuilder::new("b").embedding(unit_vector(2, 1)).build();
        let mut record = ClusterRecord::seed(ClusterId::new(1), &a, 1.0);
        assert_eq!(record.centroid_with(b.embedding()), vec![0.5, 0.5]);
        record.add_member(&b, 1.0);
        assert_eq!(record.centroid(), &[0.5, 0.5]);
        assert_eq!(record.size(), 2);
    }

    #[test]
    fn refresh_promotes_to_stable() {
        let mut record = ClusterRecord::seed(
            ClusterId::new(1),
            &ReportBuilder::new("a").text("ration shop closed").day(1).build(),
            0.75,
        );
        record.refresh(ts(2), 2, &scorer());
        assert_eq!(record.cluster.state, ClusterState::Forming);
        record.add_member(&ReportBuilder::new("b").text("ration dealer absent").day(2).build(), 0.75);
        record.refresh(ts(2), 2, &scorer());
        assert_eq!(record.cluster.state, ClusterState::Stable);
        assert!(record.cluster.title.starts_with("ration"));
        assert_eq!(record.cluster.trend_metrics.count_30d, 2);
    }

    #[test]
    fn absorb_unions_members_and_counts() {
        let mut a = ClusterRecord::seed(
            ClusterId::new(1),
            &ReportBuilder::new("a").region("Bihar").day(1).build(),
            0.5,
        );
        let b = ClusterRecord::seed(
            ClusterId::new(2),
            &ReportBuilder::new("b").region("Bihar").day(3).build(),
            0.9,
        );
        a.absorb(&b);
        assert_eq!(a.size(), 2);
        assert_eq!(a.cluster.geo_distribution.get("Bihar"), Some(&2));
        assert_eq!(a.times.len(), 2);
        assert_eq!(a.representative.as_ref().unwrap().0, ReportId::new("b"));
        assert_eq!(a.cluster.last_report_at, ts(3));
    }

    #[test]
    fn scheme_mentions_follow_members_through_absorb_and_retire() {
        let mut a = ClusterRecord::seed(
            ClusterId::new(1),
            &ReportBuilder::new("a").schemes(&["PDS"]).build(),
            0.5,
        );
        a.add_member(&ReportBuilder::new("b").schemes(&["MGNREGA", "PDS"]).build(), 0.5);
        let mut c = ClusterRecord::seed(
            ClusterId::new(2),
            &ReportBuilder::new("c").schemes(&["MGNREGA"]).build(),
            0.5,
        );
        a.absorb(&c);
        assert_eq!(a.cluster.scheme_mentions.get("PDS"), Some(&2));
        assert_eq!(a.cluster.scheme_mentions.get("MGNREGA"), Some(&2));
        assert_eq!(a.cluster.primary_scheme(), Some("MGNREGA"));

        c.retire_into(ClusterId::new(1));
        assert!(c.cluster.scheme_mentions.is_empty());
    }

    #[test]
    fn snapshots_are_not_mutated_by_later_adds() {
        let mut record = ClusterRecord::seed(ClusterId::new(1), &ReportBuilder::new("a").build(), 1.0);
        let published = Arc::clone(&record.cluster);
        record.add_member(&ReportBuilder::new("b").build(), 1.0);
        assert_eq!(published.size(), 1);
        assert_eq!(record.size(), 2);
    }
}
