//! Citizen report: the raw wire shape and the immutable canonical record.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ReportId;
use crate::errors::IngestError;

/// Channel a report arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceChannel {
    Voice,
    Text,
    FieldAudit,
}

impl SourceChannel {
    pub const ALL: [SourceChannel; 3] = [Self::Voice, Self::Text, Self::FieldAudit];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Voice => "voice",
            Self::Text => "text",
            Self::FieldAudit => "field_audit",
        }
    }
}

impl fmt::Display for SourceChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geographic tag supplied with the report. Region names are taken as
/// given; coordinates are never reverse-geocoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum GeoTag {
    Region {
        name: String,
    },
    Point {
        lat: f64,
        lon: f64,
        #[serde(default)]
        region: Option<String>,
    },
}

impl GeoTag {
    /// Administrative region, if the tag carries one.
    pub fn region(&self) -> Option<&str> {
        match self {
            Self::Region { name } => Some(name.as_str()),
            Self::Point { region, .. } => region.as_deref(),
        }
    }
}

/// Strict inbound report schema. Unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawReport {
    pub id: String,
    pub text: String,
    pub source_channel: SourceChannel,
    #[serde(default)]
    pub geo_tag: Option<GeoTag>,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub reporter_ref: Option<String>,
}

impl RawReport {
    /// Parse a single report from JSON, mapping schema failures to
    /// `IngestError::Malformed`.
    pub fn from_json(json: &str) -> Result<Self, IngestError> {
        serde_json::from_str(json).map_err(|e| IngestError::Malformed(e.to_string()))
    }
}

/// Canonical, immutable report. Created once by the normalizer and only
/// ever shared behind `Arc`.
#[derive(Debug, Clone)]
pub struct Report {
    pub id: ReportId,
    pub text: String,
    pub source_channel: SourceChannel,
    pub geo_tag: Option<GeoTag>,
    pub submitted_at: DateTime<Utc>,
    pub reporter_ref: Option<String>,
    /// 64-bit simhash of the normalized text.
    pub fingerprint: u64,
    /// Welfare scheme codes the text mentions, sorted.
    pub schemes: Vec<String>,
    embedding: Arc<[f32]>,
}

impl Report {
    /// Assemble a report, checking the embedding is usable.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ReportId,
        text: String,
        source_channel: SourceChannel,
        geo_tag: Option<GeoTag>,
        submitted_at: DateTime<Utc>,
        reporter_ref: Option<String>,
        fingerprint: u64,
        embedding: Vec<f32>,
    ) -> Result<Self, IngestError> {
        if text.trim().is_empty() {
            return Err(IngestError::EmptyText { id: id.to_string() });
        }
        if embedding.is_empty() {
            return Err(IngestError::InvalidEmbedding {
                id: id.to_string(),
                reason: "empty vector".to_string(),
            });
        }
        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(IngestError::InvalidEmbedding {
                id: id.to_string(),
                reason: "non-finite component".to_string(),
            });
        }
        if embedding.iter().all(|v| *v == 0.0) {
            return Err(IngestError::NoIndexableContent { id: id.to_string() });
        }
        Ok(Self {
            id,
            text,
            source_channel,
            geo_tag,
            submitted_at,
            reporter_ref,
            fingerprint,
            schemes: Vec::new(),
            embedding: embedding.into(),
        })
    }

    pub fn with_schemes(mut self, mut schemes: Vec<String>) -> Self {
        schemes.sort();
        schemes.dedup();
        self.schemes = schemes;
        self
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    pub fn region(&self) -> Option<&str> {
        self.geo_tag.as_ref().and_then(GeoTag::region)
    }

    /// Key identifying the inferred submitter, used by the duplicate
    /// penalty. Falls back to channel + region when no reporter handle is
    /// supplied.
    pub fn source_key(&self) -> String {
        match &self.reporter_ref {
            Some(r) => format!("ref:{r}"),
            None => format!(
                "{}|{}",
                self.source_channel,
                self.region().unwrap_or("-").to_lowercase()
            ),
        }
    }
}
