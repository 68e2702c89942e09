//! Embedding cache: moka (TinyLFU admission) keyed by a blake3 hash of
//! everything the embedding is a function of.

use std::sync::Arc;

use grievance_core::errors::IngestError;
use grievance_core::traits::{EmbeddingInput, IEmbeddingProvider};
use moka::sync::Cache;

type CacheKey = [u8; 32];

fn make_key(provider: &str, input: &EmbeddingInput<'_>) -> CacheKey {
    let mut hasher = blake3::Hasher::new();
    hasher.update(provider.as_bytes());
    hasher.update(&[0]);
    hasher.update(input.region.unwrap_or("").to_lowercase().as_bytes());
    hasher.update(&[0]);
    hasher.update(input.text.as_bytes());
    *hasher.finalize().as_bytes()
}

/// Wraps a provider with an in-memory cache. Failures are not cached.
pub struct CachedEmbedder<P> {
    inner: P,
    cache: Cache<CacheKey, Arc<[f32]>>,
}

impl<P: IEmbeddingProvider> CachedEmbedder<P> {
    pub fn new(inner: P, capacity: u64) -> Self {
        Self {
            inner,
            cache: Cache::new(capacity),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}

impl<P: IEmbeddingProvider> IEmbeddingProvider for CachedEmbedder<P> {
    fn embed(&self, input: &EmbeddingInput<'_>) -> Result<Vec<f32>, IngestError> {
        let key = make_key(self.inner.name(), input);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.to_vec());
        }
        let vector = self.inner.embed(input)?;
        self.cache.insert(key, Arc::from(vector.as_slice()));
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use grievance_core::SourceChannel;

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl IEmbeddingProvider for CountingEmbedder {
        fn embed(&self, input: &EmbeddingInput<'_>) -> Result<Vec<f32>, IngestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if input.text.is_empty() {
                return Err(IngestError::NoIndexableContent {
                    id: input.report_id.to_string(),
                });
            }
            Ok(vec![input.text.len() as f32, 1.0])
        }
        fn dimensions(&self) -> usize {
            2
        }
        fn name(&self) -> &str {
            "counting"
        }
    }

    fn input<'a>(text: &'a str, region: Option<&'a str>) -> EmbeddingInput<'a> {
        EmbeddingInput {
            report_id: "r",
            text,
            channel: SourceChannel::Voice,
            region,
        }
    }

    #[test]
    fn second_lookup_hits_cache() {
        let cached = CachedEmbedder::new(CountingEmbedder { calls: AtomicUsize::new(0) }, 100);
        let a = cached.embed(&input("water", None)).unwrap();
        let b = cached.embed(&input("water", None)).unwrap();
        assert_eq!(a, b);
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn region_is_part_of_the_key() {
        let cached = CachedEmbedder::new(CountingEmbedder { calls: AtomicUsize::new(0) }, 100);
        cached.embed(&input("water", Some("Bihar"))).unwrap();
        cached.embed(&input("water", Some("Assam"))).unwrap();
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let cached = CachedEmbedder::new(CountingEmbedder { calls: AtomicUsize::new(0) }, 100);
        assert!(cached.embed(&input("", None)).is_err());
        assert!(cached.embed(&input("", None)).is_err());
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.entry_count(), 0);
    }
}
