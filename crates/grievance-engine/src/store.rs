//! Cluster store: the single-writer clusterer behind a bounded-retry lock,
//! plus the immutable snapshot readers see.

use std::sync::{Arc, RwLock, RwLockWriteGuard, TryLockError};
use std::thread;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use grievance_causal::CausalGraphSnapshot;
use grievance_clustering::{ClusteringSnapshot, IncrementalClusterer};
use grievance_core::config::ClusteringConfig;
use grievance_core::{GrievanceError, GrievanceResult};

/// Everything the Query API reads, published as one unit.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    /// Publish counter; bumps on every swap.
    pub version: u64,
    pub published_at: DateTime<Utc>,
    pub clustering: Arc<ClusteringSnapshot>,
    pub causal: Arc<CausalGraphSnapshot>,
}

pub struct ClusterStore {
    clusterer: RwLock<IncrementalClusterer>,
    published: ArcSwap<StoreSnapshot>,
    retry_budget: u32,
    backoff: Duration,
}

impl ClusterStore {
    pub fn new(clusterer: IncrementalClusterer, config: &ClusteringConfig) -> Self {
        let initial = StoreSnapshot {
            version: 0,
            published_at: clusterer.now(),
            clustering: Arc::new(clusterer.snapshot()),
            causal: Arc::new(CausalGraphSnapshot::empty()),
        };
        Self {
            clusterer: RwLock::new(clusterer),
            published: ArcSwap::new(Arc::new(initial)),
            retry_budget: config.lock_retry_budget.max(1),
            backoff: Duration::from_millis(config.lock_backoff_ms),
        }
    }

    /// Current published snapshot. Never blocks.
    pub fn current(&self) -> Arc<StoreSnapshot> {
        self.published.load_full()
    }

    /// Run `f` under the shared lock. `subject` names what is waiting, for
    /// the timeout error.
    pub fn with_read<T>(
        &self,
        subject: &str,
        f: impl FnOnce(&IncrementalClusterer) -> T,
    ) -> GrievanceResult<T> {
        let guard = self.acquire(subject, |lock| lock.try_read())?;
        Ok(f(&*guard))
    }

    /// Run `f` under the exclusive lock.
    pub fn with_write<T>(
        &self,
        subject: &str,
        f: impl FnOnce(&mut IncrementalClusterer) -> T,
    ) -> GrievanceResult<T> {
        let mut guard: RwLockWriteGuard<'_, _> = self.acquire(subject, |lock| lock.try_write())?;
        Ok(f(&mut *guard))
    }

    /// Publish a fresh clustering snapshot. `causal` replaces the causal
    /// snapshot when given; otherwise the previous one is kept. A clustering
    /// snapshot older than the published one never replaces it.
    pub fn publish(
        &self,
        clustering: ClusteringSnapshot,
        causal: Option<Arc<CausalGraphSnapshot>>,
    ) -> Arc<StoreSnapshot> {
        let clustering = Arc::new(clustering);
        self.swap(|previous| {
            let clustering = if clustering.version >= previous.clustering.version {
                Arc::clone(&clustering)
            } else {
                Arc::clone(&previous.clustering)
            };
            StoreSnapshot {
                version: previous.version + 1,
                published_at: clustering.taken_at,
                clustering,
                causal: causal.clone().unwrap_or_else(|| Arc::clone(&previous.causal)),
            }
        })
    }

    /// Replace only the causal half of the published snapshot.
    pub fn publish_causal(&self, causal: Arc<CausalGraphSnapshot>) -> Arc<StoreSnapshot> {
        self.swap(|previous| StoreSnapshot {
            version: previous.version + 1,
            published_at: previous.published_at,
            clustering: Arc::clone(&previous.clustering),
            causal: Arc::clone(&causal),
        })
    }

    fn swap(&self, mut next: impl FnMut(&StoreSnapshot) -> StoreSnapshot) -> Arc<StoreSnapshot> {
        let mut stored = None;
        self.published.rcu(|previous| {
            let snapshot = Arc::new(next(&**previous));
            stored = Some(Arc::clone(&snapshot));
            snapshot
        });
        match stored {
            Some(snapshot) => snapshot,
            None => self.published.load_full(),
        }
    }

    fn acquire<'a, G>(
        &'a self,
        subject: &str,
        try_lock: impl Fn(&'a RwLock<IncrementalClusterer>) -> Result<G, TryLockError<G>>,
    ) -> GrievanceResult<G> {
        for attempt in 1..=self.retry_budget {
            match try_lock(&self.clusterer) {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(_)) => {
                    return Err(GrievanceError::Concurrency(
                        "cluster store lock poisoned".to_string(),
                    ))
                }
                Err(TryLockError::WouldBlock) => {
                    if attempt < self.retry_budget && !self.backoff.is_zero() {
                        thread::sleep(self.backoff);
                    } else {
                        thread::yield_now();
                    }
                }
            }
        }
        Err(GrievanceError::ClusteringTimeout {
            report_id: subject.to_string(),
            attempts: self.retry_budget,
        })
    }

    #[cfg(test)]
    pub(crate) fn hold_write(&self) -> RwLockWriteGuard<'_, IncrementalClusterer> {
        self.clusterer.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn hold_read(&self) -> std::sync::RwLockReadGuard<'_, IncrementalClusterer> {
        self.clusterer.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
