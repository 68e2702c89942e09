use serde::{Deserialize, Serialize};

/// Ingest normalizer and quarantine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub max_text_chars: usize,
    pub max_id_len: usize,
    pub max_future_skew_secs: i64,
    pub redact_pii: bool,
    /// Quarantine retries before a report is dropped.
    pub max_attempts: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_text_chars: 5000,
            max_id_len: 128,
            max_future_skew_secs: 300,
            redact_pii: true,
            max_attempts: 3,
        }
    }
}
