use serde::{Deserialize, Serialize};

/// Distance used between embeddings and centroids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`, in [0, 2].
    #[default]
    Cosine,
    Euclidean,
}

/// Similarity index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub metric: DistanceMetric,
    /// Number of random hyperplanes per signature.
    pub hash_bits: u32,
    pub seed: u64,
    /// Below this many entries lookups scan every centroid.
    pub exact_scan_below: usize,
    /// Stale bucket share that triggers a rebuild.
    pub rebuild_fragmentation: f64,
    /// Candidates requested per lookup.
    pub candidates: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::Cosine,
            hash_bits: 10,
            seed: 0x5eed_1dea,
            exact_scan_below: 256,
            rebuild_fragmentation: 0.3,
            candidates: 8,
        }
    }
}
