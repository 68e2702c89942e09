use serde::{Deserialize, Serialize};

/// Feature-hashing embedder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub dimensions: usize,
    pub bigram_weight: f32,
    /// Weight of the region token relative to a text unigram.
    pub metadata_weight: f32,
    pub cache_capacity: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: 256,
            bigram_weight: 0.5,
            metadata_weight: 0.15,
            cache_capacity: 10_000,
        }
    }
}
