//! # grievance-ingest
//!
//! Turns untrusted [`RawReport`](grievance_core::RawReport) payloads into
//! canonical, immutable [`Report`](grievance_core::Report) records.
//!
//! - [`sanitize`]: markup stripping, PII redaction, whitespace folding
//! - [`fingerprint`]: 64-bit simhash for near-duplicate detection
//! - [`normalizer`]: schema and range validation, embedding, assembly
//! - [`quarantine`]: bounded retry of reports that failed transiently
//! - [`schemes`]: welfare scheme tagging

pub mod fingerprint;
pub mod normalizer;
pub mod quarantine;
pub mod sanitize;
pub mod schemes;

pub use fingerprint::{hamming_distance, is_near_duplicate, simhash};
pub use normalizer::ReportNormalizer;
pub use quarantine::{DroppedReport, Quarantine, QuarantinedReport};
pub use sanitize::CompiledSanitizer;
pub use schemes::{SchemeMatch, SchemeMatcher, WelfareScheme, WELFARE_SCHEMES};
