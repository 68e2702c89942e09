/// Ingest-time validation failures. Every variant means the report is
/// rejected before it reaches the similarity index.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IngestError {
    #[error("malformed report payload: {0}")]
    Malformed(String),

    #[error("invalid report id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    #[error("report {id} has empty text after normalization")]
    EmptyText { id: String },

    #[error("report {id} text too long: {chars} chars, limit {limit}")]
    TextTooLong { id: String, chars: usize, limit: usize },

    #[error("report {id} has no indexable content")]
    NoIndexableContent { id: String },

    #[error("report {id} has invalid geo tag: {reason}")]
    InvalidGeoTag { id: String, reason: String },

    #[error("report {id} submitted in the future: {submitted_at}")]
    FutureTimestamp { id: String, submitted_at: String },

    #[error("report {id} embedding invalid: {reason}")]
    InvalidEmbedding { id: String, reason: String },
}
