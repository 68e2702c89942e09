//! # grievance-embeddings
//!
//! Report embeddings and nearest-centroid lookup.
//!
//! - [`HashingEmbedder`]: deterministic feature hashing of text + region
//! - [`CachedEmbedder`]: moka cache in front of any provider
//! - [`SimilarityIndex`]: random-hyperplane LSH over cluster centroids with
//!   epoch stamps for optimistic placement

pub mod cache;
pub mod distance;
pub mod hashing;
pub mod index;

pub use cache::CachedEmbedder;
pub use distance::{cosine_distance, distance, euclidean_distance, l2_normalize};
pub use hashing::HashingEmbedder;
pub use index::{Neighbor, LookupStamp, SimilarityIndex};
