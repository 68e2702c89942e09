//! Similarity index over cluster centroids.
//!
//! Random-hyperplane LSH: each centroid is filed under a `hash_bits`-wide
//! signature (one bit per hyperplane side). A lookup scans the query's own
//! bucket plus every bucket one bit away. Small indexes, and lookups that
//! find fewer than `k` candidates there, fall back to an exact scan.
//!
//! Updates and removals do not rewrite buckets eagerly; they leave stale
//! slots that lookups skip. When stale slots exceed `rebuild_fragmentation`
//! of all slots the buckets are rebuilt from the live entries.
//!
//! Every mutation bumps a global epoch and the epoch of each bucket it
//! touches. A [`LookupStamp`] returned with a lookup records what the lookup
//! depended on, so a later commit can check that its decision is still
//! current.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use grievance_core::config::{DistanceMetric, IndexConfig};
use grievance_core::errors::IndexError;
use grievance_core::ClusterId;

use crate::distance::distance;

/// Minimum slot count before fragmentation triggers a rebuild.
const MIN_SLOTS_FOR_REBUILD: usize = 16;

/// A lookup result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub cluster_id: ClusterId,
    pub distance: f64,
    pub size: usize,
}

/// What a lookup read. Valid until any of it is mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupStamp {
    /// The lookup scanned everything; any mutation invalidates it.
    Exact { generation: u64, epoch: u64 },
    /// The lookup read only these buckets, at these epochs.
    Buckets {
        generation: u64,
        buckets: Vec<(u32, u64)>,
    },
}

#[derive(Debug, Clone)]
struct IndexEntry {
    vector: Vec<f32>,
    size: usize,
    signature: u32,
}

#[derive(Debug)]
pub struct SimilarityIndex {
    config: IndexConfig,
    dims: usize,
    /// `hash_bits` hyperplanes, `dims` wide each, row-major.
    planes: Vec<f32>,
    entries: HashMap<ClusterId, IndexEntry>,
    buckets: HashMap<u32, Vec<ClusterId>>,
    bucket_epochs: HashMap<u32, u64>,
    stale_slots: usize,
    total_slots: usize,
    epoch: u64,
    generation: u64,
}

impl SimilarityIndex {
    pub fn new(config: IndexConfig, dims: usize) -> Self {
        let bits = config.hash_bits.clamp(1, 16) as usize;
        let planes = hyperplanes(config.seed, bits, dims);
        Self {
            config,
            dims,
            planes,
            entries: HashMap::new(),
            buckets: HashMap::new(),
            bucket_epochs: HashMap::new(),
            stale_slots: 0,
            total_slots: 0,
            epoch: 0,
            generation: 0,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dims
    }

    pub fn metric(&self) -> DistanceMetric {
        self.config.metric
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: ClusterId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Indexed centroid and size of a cluster.
    pub fn get(&self, id: ClusterId) -> Option<(&[f32], usize)> {
        self.entries.get(&id).map(|e| (e.vector.as_slice(), e.size))
    }

    pub fn ids(&self) -> impl Iterator<Item = ClusterId> + '_ {
        self.entries.keys().copied()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Share of bucket slots that point at moved or removed entries.
    pub fn fragmentation(&self) -> f64 {
        if self.total_slots == 0 {
            0.0
        } else {
            self.stale_slots as f64 / self.total_slots as f64
        }
    }

    /// Whether lookups currently scan every entry.
    pub fn is_exact_mode(&self) -> bool {
        self.entries.len() < self.config.exact_scan_below
    }

    // ─── Mutation ───────────────────────────────────────────────────────

    pub fn insert(&mut self, id: ClusterId, vector: &[f32], size: usize) -> Result<(), IndexError> {
        if self.entries.contains_key(&id) {
            return Err(IndexError::DuplicateCluster {
                cluster_id: id.to_string(),
            });
        }
        self.check_dims(vector)?;
        let signature = self.signature(vector);
        self.file(id, signature);
        self.entries.insert(
            id,
            IndexEntry {
                vector: vector.to_vec(),
                size,
                signature,
            },
        );
        Ok(())
    }

    pub fn update(&mut self, id: ClusterId, vector: &[f32], size: usize) -> Result<(), IndexError> {
        self.check_dims(vector)?;
        let signature = self.signature(vector);
        let old_signature = match self.entries.get(&id) {
            Some(entry) => entry.signature,
            None => {
                return Err(IndexError::UnknownCluster {
                    cluster_id: id.to_string(),
                })
            }
        };
        if old_signature != signature {
            self.stale_slots += 1;
            self.touch(old_signature);
            self.file(id, signature);
        } else {
            self.touch(signature);
        }
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.vector.clear();
            entry.vector.extend_from_slice(vector);
            entry.size = size;
            entry.signature = signature;
        }
        self.maybe_rebuild();
        Ok(())
    }

    pub fn remove(&mut self, id: ClusterId) -> Result<(), IndexError> {
        let entry = self.entries.remove(&id).ok_or_else(|| IndexError::UnknownCluster {
            cluster_id: id.to_string(),
        })?;
        self.stale_slots += 1;
        self.touch(entry.signature);
        self.maybe_rebuild();
        Ok(())
    }

    /// Drop every stale slot. Invalidates all outstanding stamps.
    pub fn rebuild(&mut self) {
        let mut buckets: HashMap<u32, Vec<ClusterId>> = HashMap::new();
        for (id, entry) in &self.entries {
            buckets.entry(entry.signature).or_default().push(*id);
        }
        for ids in buckets.values_mut() {
            ids.sort();
        }
        self.total_slots = self.entries.len();
        self.stale_slots = 0;
        self.buckets = buckets;
        self.bucket_epochs.clear();
        self.epoch += 1;
        self.generation += 1;
        tracing::debug!(
            entries = self.entries.len(),
            generation = self.generation,
            "similarity index rebuilt"
        );
    }

    /// Replace the whole contents, e.g. after the index was found corrupt.
    pub fn rebuild_from<I>(&mut self, entries: I) -> Result<(), IndexError>
    where
        I: IntoIterator<Item = (ClusterId, Vec<f32>, usize)>,
    {
        let mut fresh = HashMap::new();
        for (id, vector, size) in entries {
            self.check_dims(&vector)?;
            let signature = self.signature(&vector);
            if fresh
                .insert(id, IndexEntry { vector, size, signature })
                .is_some()
            {
                return Err(IndexError::DuplicateCluster {
                    cluster_id: id.to_string(),
                });
            }
        }
        self.entries = fresh;
        self.rebuild();
        Ok(())
    }

    fn maybe_rebuild(&mut self) {
        if self.total_slots >= MIN_SLOTS_FOR_REBUILD
            && self.fragmentation() > self.config.rebuild_fragmentation
        {
            self.rebuild();
        }
    }

    /// Add `id` to bucket `signature`, reviving a stale slot if one exists.
    fn file(&mut self, id: ClusterId, signature: u32) {
        let bucket = self.buckets.entry(signature).or_default();
        if bucket.contains(&id) {
            self.stale_slots = self.stale_slots.saturating_sub(1);
        } else {
            bucket.push(id);
            self.total_slots += 1;
        }
        self.touch(signature);
    }

    fn touch(&mut self, signature: u32) {
        self.epoch += 1;
        self.bucket_epochs.insert(signature, self.epoch);
    }

    fn check_dims(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    // ─── Lookup ─────────────────────────────────────────────────────────

    /// LSH signature of `vector`.
    pub fn signature(&self, vector: &[f32]) -> u32 {
        self.planes
            .chunks(self.dims.max(1))
            .enumerate()
            .fold(0u32, |sig, (bit, plane)| {
                let dot: f64 = plane
                    .iter()
                    .zip(vector)
                    .map(|(p, v)| *p as f64 * *v as f64)
                    .sum();
                if dot >= 0.0 {
                    sig | (1 << bit)
                } else {
                    sig
                }
            })
    }

    /// Buckets a lookup for `vector` would read, or `None` when lookups
    /// scan everything. Two lookups with disjoint keys cannot observe each
    /// other's commits.
    pub fn bucket_keys(&self, vector: &[f32]) -> Option<Vec<u32>> {
        if self.is_exact_mode() {
            return None;
        }
        let sig = self.signature(vector);
        let bits = self.config.hash_bits.clamp(1, 16);
        let mut keys = Vec::with_capacity(bits as usize + 1);
        keys.push(sig);
        keys.extend((0..bits).map(|b| sig ^ (1 << b)));
        Some(keys)
    }

    /// Up to `k` nearest centroids, ascending by distance, then larger
    /// cluster, then smaller id.
    pub fn nearest(&self, vector: &[f32], k: usize) -> Result<(Vec<Neighbor>, LookupStamp), IndexError> {
        self.check_dims(vector)?;
        if k == 0 || self.entries.is_empty() {
            return Ok((Vec::new(), self.exact_stamp()));
        }
        if let Some(keys) = self.bucket_keys(vector) {
            let candidates: BTreeSet<ClusterId> = keys
                .iter()
                .filter_map(|key| self.buckets.get(key).map(|ids| (key, ids)))
                .flat_map(|(key, ids)| {
                    ids.iter()
                        .filter(move |id| {
                            self.entries
                                .get(*id)
                                .is_some_and(|entry| entry.signature == *key)
                        })
                        .copied()
                })
                .collect();
            if candidates.len() >= k {
                let stamp = LookupStamp::Buckets {
                    generation: self.generation,
                    buckets: keys
                        .iter()
                        .map(|key| (*key, self.bucket_epochs.get(key).copied().unwrap_or(0)))
                        .collect(),
                };
                return Ok((self.rank(vector, candidates.into_iter(), k), stamp));
            }
        }
        let neighbors = self.rank(vector, self.entries.keys().copied(), k);
        Ok((neighbors, self.exact_stamp()))
    }

    /// Whether nothing a lookup read has changed since `stamp` was taken.
    pub fn validate(&self, stamp: &LookupStamp) -> bool {
        match stamp {
            LookupStamp::Exact { generation, epoch } => {
                *generation == self.generation && *epoch == self.epoch
            }
            LookupStamp::Buckets {
                generation,
                buckets,
            } => {
                *generation == self.generation
                    && !self.is_exact_mode()
                    && buckets.iter().all(|(key, epoch)| {
                        self.bucket_epochs.get(key).copied().unwrap_or(0) == *epoch
                    })
            }
        }
    }

    fn exact_stamp(&self) -> LookupStamp {
        LookupStamp::Exact {
            generation: self.generation,
            epoch: self.epoch,
        }
    }

    fn rank(&self, vector: &[f32], ids: impl Iterator<Item = ClusterId>, k: usize) -> Vec<Neighbor> {
        let mut scored: Vec<Neighbor> = ids
            .filter_map(|id| {
                self.entries.get(&id).map(|entry| Neighbor {
                    cluster_id: id,
                    distance: distance(self.config.metric, vector, &entry.vector),
                    size: entry.size,
                })
            })
            .collect();
        scored.sort_by(compare_neighbors);
        scored.truncate(k);
        scored
    }
}

/// Ascending distance, then larger size, then smaller id.
pub fn compare_neighbors(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| b.size.cmp(&a.size))
        .then_with(|| a.cluster_id.cmp(&b.cluster_id))
}

/// Deterministic hyperplanes from a splitmix64 stream, components in [-1, 1].
fn hyperplanes(seed: u64, bits: usize, dims: usize) -> Vec<f32> {
    let mut state = seed;
    (0..bits * dims)
        .map(|_| {
            let r = splitmix64(&mut state);
            ((r >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0) as f32
        })
        .collect()
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
