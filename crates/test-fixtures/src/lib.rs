//! Shared builders for tests and benches.
//!
//! Timestamps are expressed as whole days after a fixed epoch
//! (2024-06-01T00:00:00Z) so scenarios read as day numbers.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use grievance_core::errors::IngestError;
use grievance_core::traits::{EmbeddingInput, IEmbeddingProvider};
use grievance_core::{GeoTag, RawReport, Report, ReportId, SourceChannel};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// `epoch() + day` days.
pub fn ts(day: i64) -> DateTime<Utc> {
    epoch() + Duration::days(day)
}

/// `epoch() + hours` hours.
pub fn ts_hours(hours: i64) -> DateTime<Utc> {
    epoch() + Duration::hours(hours)
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// A minimal valid raw report on the text channel with no geo tag.
pub fn raw_report(id: &str, text: &str, submitted_at: DateTime<Utc>) -> RawReport {
    RawReport {
        id: id.to_string(),
        text: text.to_string(),
        source_channel: SourceChannel::Text,
        geo_tag: None,
        submitted_at,
        reporter_ref: None,
    }
}

/// Builds canonical reports with a caller-chosen embedding, bypassing the
/// normalizer.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    id: String,
    text: String,
    channel: SourceChannel,
    geo_tag: Option<GeoTag>,
    submitted_at: DateTime<Utc>,
    reporter_ref: Option<String>,
    fingerprint: Option<u64>,
    schemes: Vec<String>,
    embedding: Vec<f32>,
}

impl ReportBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            text: format!("report {id}"),
            channel: SourceChannel::Text,
            geo_tag: None,
            submitted_at: epoch(),
            reporter_ref: None,
            fingerprint: None,
            schemes: Vec::new(),
            embedding: unit_vector(4, 0),
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn channel(mut self, channel: SourceChannel) -> Self {
        self.channel = channel;
        self
    }

    pub fn region(mut self, region: &str) -> Self {
        self.geo_tag = Some(GeoTag::Region {
            name: region.to_string(),
        });
        self
    }

    pub fn point(mut self, lat: f64, lon: f64) -> Self {
        self.geo_tag = Some(GeoTag::Point {
            lat,
            lon,
            region: None,
        });
        self
    }

    pub fn day(mut self, day: i64) -> Self {
        self.submitted_at = ts(day);
        self
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.submitted_at = at;
        self
    }

    pub fn reporter(mut self, reporter_ref: &str) -> Self {
        self.reporter_ref = Some(reporter_ref.to_string());
        self
    }

    pub fn fingerprint(mut self, fingerprint: u64) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    pub fn schemes(mut self, codes: &[&str]) -> Self {
        self.schemes = codes.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    /// Panics on an invalid combination; fixtures are expected to be valid.
    pub fn build(self) -> Report {
        // Distinct ids get distinct fingerprints unless one is pinned.
        let fingerprint = self
            .fingerprint
            .unwrap_or_else(|| hash_u64(self.id.as_bytes()));
        Report::new(
            ReportId::new(self.id),
            self.text,
            self.channel,
            self.geo_tag,
            self.submitted_at,
            self.reporter_ref,
            fingerprint,
            self.embedding,
        )
        .unwrap()
        .with_schemes(self.schemes)
    }

    pub fn build_arc(self) -> Arc<Report> {
        Arc::new(self.build())
    }
}

// ---------------------------------------------------------------------------
// Vectors
// ---------------------------------------------------------------------------

pub fn unit_vector(dims: usize, axis: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dims];
    v[axis % dims] = 1.0;
    v
}

/// Unit vector in the plane of axes 0 and 1, `radians` away from axis 0.
/// Its cosine distance to `unit_vector(dims, 0)` is `1 - cos(radians)`.
pub fn angled(dims: usize, radians: f32) -> Vec<f32> {
    let mut v = vec![0.0f32; dims.max(2)];
    v[0] = radians.cos();
    v[1] = radians.sin();
    v
}

/// A vector close to `unit_vector(dims, axis)` with a small deterministic
/// perturbation derived from `salt`.
pub fn jittered(dims: usize, axis: usize, salt: &str) -> Vec<f32> {
    let mut v = unit_vector(dims, axis);
    let h = hash_u64(salt.as_bytes());
    let other = (axis + 1 + (h as usize % (dims - 1).max(1))) % dims;
    if other != axis % dims {
        v[other] = ((h >> 8) % 1000) as f32 / 20_000.0;
    }
    v
}

fn hash_u64(bytes: &[u8]) -> u64 {
    let digest = blake3::hash(bytes);
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(out)
}

// ---------------------------------------------------------------------------
// Embedders
// ---------------------------------------------------------------------------

/// Deterministic embedder with a strong shared component plus a small
/// text-specific perturbation. Everything it embeds lies close together.
pub struct StubEmbedder {
    dims: usize,
}

impl StubEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl IEmbeddingProvider for StubEmbedder {
    fn embed(&self, input: &EmbeddingInput<'_>) -> Result<Vec<f32>, IngestError> {
        let h = hash_u64(input.text.as_bytes());
        Ok((0..self.dims)
            .map(|i| 0.5 + (h.wrapping_add(i as u64) % 1000) as f32 / 100_000.0)
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Embeds text onto one axis per topic keyword: the first keyword found in
/// the lower-cased text picks the axis, unmatched text lands on a spare
/// axis. Reports about the same topic are near-identical; different topics
/// are orthogonal.
pub struct TopicEmbedder {
    topics: Vec<String>,
}

impl TopicEmbedder {
    pub fn new(topics: &[&str]) -> Self {
        Self {
            topics: topics.iter().map(|t| t.to_lowercase()).collect(),
        }
    }

    fn axis(&self, text: &str) -> usize {
        let lower = text.to_lowercase();
        self.topics
            .iter()
            .position(|t| lower.contains(t.as_str()))
            .unwrap_or(self.topics.len())
    }
}

impl IEmbeddingProvider for TopicEmbedder {
    fn embed(&self, input: &EmbeddingInput<'_>) -> Result<Vec<f32>, IngestError> {
        let axis = self.axis(input.text);
        Ok(jittered(self.dimensions(), axis, input.text))
    }

    fn dimensions(&self) -> usize {
        self.topics.len() + 2
    }

    fn name(&self) -> &str {
        "topic"
    }
}

/// Always fails; drives quarantine and error-path tests.
pub struct FailingEmbedder;

impl IEmbeddingProvider for FailingEmbedder {
    fn embed(&self, input: &EmbeddingInput<'_>) -> Result<Vec<f32>, IngestError> {
        Err(IngestError::InvalidEmbedding {
            id: input.report_id.to_string(),
            reason: "provider unavailable".to_string(),
        })
    }

    fn dimensions(&self) -> usize {
        4
    }

    fn name(&self) -> &str {
        "failing"
    }
}
