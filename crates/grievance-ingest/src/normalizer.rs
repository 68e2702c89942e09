//! Report Ingest Normalizer: untrusted `RawReport` in, immutable `Report` out.

use chrono::{DateTime, Duration, Utc};
use grievance_core::config::IngestConfig;
use grievance_core::errors::IngestError;
use grievance_core::traits::{EmbeddingInput, IEmbeddingProvider};
use grievance_core::{GeoTag, RawReport, Report, ReportId};

use crate::fingerprint::simhash;
use crate::sanitize::CompiledSanitizer;
use crate::schemes::SchemeMatcher;

/// Validates, sanitises, fingerprints, scheme-tags and embeds incoming
/// reports.
///
/// Stateless apart from its compiled rules, so one instance can be shared
/// across rayon workers.
pub struct ReportNormalizer {
    config: IngestConfig,
    sanitizer: CompiledSanitizer,
    schemes: SchemeMatcher,
}

impl ReportNormalizer {
    pub fn new(config: IngestConfig) -> Self {
        let sanitizer = CompiledSanitizer::new(config.redact_pii);
        Self {
            config,
            sanitizer,
            schemes: SchemeMatcher::default(),
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Parse a JSON payload and normalize it.
    pub fn normalize_json(
        &self,
        json: &str,
        embedder: &dyn IEmbeddingProvider,
        now: DateTime<Utc>,
    ) -> Result<Report, IngestError> {
        let raw = RawReport::from_json(json)?;
        self.normalize(raw, embedder, now)
    }

    /// Turn a raw report into a canonical one. Nothing is clustered here;
    /// a returned error means the report must never reach the index.
    pub fn normalize(
        &self,
        raw: RawReport,
        embedder: &dyn IEmbeddingProvider,
        now: DateTime<Utc>,
    ) -> Result<Report, IngestError> {
        let id = self.validate_id(&raw.id)?;
        let text = self.sanitizer.clean(&raw.text);
        if text.is_empty() {
            return Err(IngestError::EmptyText { id: raw.id });
        }
        let chars = text.chars().count();
        if chars > self.config.max_text_chars {
            return Err(IngestError::TextTooLong {
                id: raw.id,
                chars,
                limit: self.config.max_text_chars,
            });
        }
        let geo_tag = raw
            .geo_tag
            .map(|tag| validate_geo_tag(&raw.id, tag))
            .transpose()?;
        let skew = Duration::seconds(self.config.max_future_skew_secs);
        if raw.submitted_at > now + skew {
            return Err(IngestError::FutureTimestamp {
                id: raw.id,
                submitted_at: raw.submitted_at.to_rfc3339(),
            });
        }
        // a tolerated future timestamp is pinned to `now`
        let submitted_at = raw.submitted_at.min(now);
        let reporter_ref = raw
            .reporter_ref
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let input = EmbeddingInput {
            report_id: id.as_str(),
            text: &text,
            channel: raw.source_channel,
            region: geo_tag.as_ref().and_then(GeoTag::region),
        };
        let embedding = embedder.embed(&input)?;
        if embedding.len() != embedder.dimensions() {
            return Err(IngestError::InvalidEmbedding {
                id: raw.id,
                reason: format!(
                    "{} returned {} dimensions, expected {}",
                    embedder.name(),
                    embedding.len(),
                    embedder.dimensions()
                ),
            });
        }
        let fingerprint = simhash(&text);
        let schemes = self.schemes.codes(&text);

        tracing::debug!(
            report_id = %id,
            channel = %raw.source_channel,
            chars,
            fingerprint = format_args!("{fingerprint:016x}"),
            schemes = ?schemes,
            "report normalized"
        );

        Report::new(
            id,
            text,
            raw.source_channel,
            geo_tag,
            submitted_at,
            reporter_ref,
            fingerprint,
            embedding,
        )
        .map(|report| report.with_schemes(schemes))
    }

    fn validate_id(&self, id: &str) -> Result<ReportId, IngestError> {
        if id.is_empty() {
            return Err(invalid_id(id, "empty"));
        }
        if id.chars().count() > self.config.max_id_len {
            return Err(invalid_id(
                id,
                &format!("longer than {} characters", self.config.max_id_len),
            ));
        }
        if let Some(bad) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')))
        {
            return Err(invalid_id(id, &format!("illegal character {bad:?}")));
        }
        Ok(ReportId::new(id))
    }
}

fn invalid_id(id: &str, reason: &str) -> IngestError {
    IngestError::InvalidId {
        id: id.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_geo_tag(id: &str, tag: GeoTag) -> Result<GeoTag, IngestError> {
    let bad = |reason: String| IngestError::InvalidGeoTag {
        id: id.to_string(),
        reason,
    };
    match tag {
        GeoTag::Region { name } => {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(bad("empty region name".to_string()));
            }
            Ok(GeoTag::Region { name })
        }
        GeoTag::Point { lat, lon, region } => {
            if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
                return Err(bad(format!("latitude {lat} out of range")));
            }
            if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
                return Err(bad(format!("longitude {lon} out of range")));
            }
            let region = match region.map(|r| r.trim().to_string()) {
                Some(r) if r.is_empty() => return Err(bad("empty region name".to_string())),
                other => other,
            };
            Ok(GeoTag::Point { lat, lon, region })
        }
    }
}
