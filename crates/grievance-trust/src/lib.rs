//! # grievance-trust
//!
//! Trust & Confidence Scorer.
//!
//! - [`TrustScorer`]: per-report trust weight from channel prior, geographic
//!   plausibility and the duplicate penalty
//! - [`DuplicateWindow`]: near-duplicate detection per inferred source
//! - [`confidence`]: per-cluster confidence, monotone in membership
//! - [`cci`]: causal confidence index for inferred edges

pub mod cci;
pub mod confidence;
pub mod duplicate;
pub mod weight;

pub use cci::{causal_confidence, correlation_p_value};
pub use confidence::{ConfidenceInputs, ConfidenceScorer};
pub use duplicate::DuplicateWindow;
pub use weight::{TrustBreakdown, TrustScorer};
