//! Deterministic feature-hashing embedder.
//!
//! Lower-cased word unigrams (weight 1.0) and adjacent-word bigrams
//! (`bigram_weight`) are hashed into `dimensions` signed buckets. The
//! report's region contributes one extra token at `metadata_weight`, so
//! reports from the same place lean slightly towards each other. The
//! result is L2-normalised.

use grievance_core::config::EmbeddingConfig;
use grievance_core::errors::IngestError;
use grievance_core::traits::{EmbeddingInput, IEmbeddingProvider};

use crate::distance::l2_normalize;

const STOPWORDS: &[&str] = &[
    "a", "about", "after", "again", "all", "am", "an", "and", "any", "are", "as", "at", "be",
    "been", "before", "but", "by", "can", "did", "do", "does", "for", "from", "had", "has",
    "have", "he", "her", "here", "him", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "me", "my", "no", "not", "of", "on", "or", "our", "please", "she", "since", "so", "some",
    "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "to",
    "too", "us", "very", "was", "we", "were", "what", "when", "where", "which", "who", "why",
    "will", "with", "you", "your", "redacted",
];

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
    bigram_weight: f32,
    metadata_weight: f32,
}

impl HashingEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            dims: config.dimensions.max(1),
            bigram_weight: config.bigram_weight,
            metadata_weight: config.metadata_weight,
        }
    }

    /// Content tokens of `text`, in order, stop words removed.
    pub fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .filter(|t| t.chars().count() > 1 && !STOPWORDS.contains(&t.as_str()))
            .collect()
    }

    fn add(&self, v: &mut [f32], kind: &[u8], feature: &str, weight: f32) {
        let mut hasher = blake3::Hasher::new();
        hasher.update(kind);
        hasher.update(feature.as_bytes());
        let digest = hasher.finalize();
        let bytes = digest.as_bytes();
        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes[..8]);
        let h = u64::from_le_bytes(word);
        let bucket = (h % self.dims as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign * weight;
    }
}

impl IEmbeddingProvider for HashingEmbedder {
    fn embed(&self, input: &EmbeddingInput<'_>) -> Result<Vec<f32>, IngestError> {
        let tokens = Self::tokenize(input.text);
        if tokens.is_empty() {
            return Err(IngestError::NoIndexableContent {
                id: input.report_id.to_string(),
            });
        }
        let mut v = vec![0.0f32; self.dims];
        for token in &tokens {
            self.add(&mut v, b"u:", token, 1.0);
        }
        if self.bigram_weight > 0.0 {
            for pair in tokens.windows(2) {
                let bigram = format!("{} {}", pair[0], pair[1]);
                self.add(&mut v, b"b:", &bigram, self.bigram_weight);
            }
        }
        if let Some(region) = input.region {
            if self.metadata_weight > 0.0 {
                self.add(&mut v, b"r:", &region.to_lowercase(), self.metadata_weight);
            }
        }
        if !l2_normalize(&mut v) {
            return Err(IngestError::NoIndexableContent {
                id: input.report_id.to_string(),
            });
        }
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        "feature-hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::cosine_distance;
    use grievance_core::SourceChannel;

    fn input<'a>(text: &'a str, region: Option<&'a str>) -> EmbeddingInput<'a> {
        EmbeddingInput {
            report_id: "r1",
            text,
            channel: SourceChannel::Text,
            region,
        }
    }

    fn embedder() -> HashingEmbedder {
        HashingEmbedder::new(&EmbeddingConfig::default())
    }

    #[test]
    fn is_deterministic_and_unit_length() {
        let e = embedder();
        let a = e.embed(&input("Pension not received for three months", None)).unwrap();
        let b = e.embed(&input("Pension not received for three months", None)).unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert_eq!(a.len(), 256);
    }

    #[test]
    fn stopword_only_text_has_no_content() {
        let err = embedder().embed(&input("it is the", Some("Bihar"))).unwrap_err();
        assert!(matches!(err, IngestError::NoIndexableContent { .. }));
    }

    #[test]
    fn related_texts_are_closer_than_unrelated() {
        let e = embedder();
        let a = e.embed(&input("old age pension not paid", None)).unwrap();
        let b = e.embed(&input("pension not paid for months", None)).unwrap();
        let c = e.embed(&input("school midday meal quality poor", None)).unwrap();
        assert!(cosine_distance(&a, &b) < cosine_distance(&a, &c));
    }

    #[test]
    fn region_shapes_the_vector_slightly() {
        let e = embedder();
        let a = e.embed(&input("ration shop closed", Some("Bihar"))).unwrap();
        let b = e.embed(&input("ration shop closed", Some("Odisha"))).unwrap();
        let d = cosine_distance(&a, &b);
        assert!(d > 0.0 && d < 0.1, "distance {d}");
    }

    #[test]
    fn tokenizer_drops_placeholders_and_single_chars() {
        let tokens = HashingEmbedder::tokenize("Call [REDACTED-PHONE] a x ration");
        assert_eq!(tokens, vec!["call", "phone", "ration"]);
    }
}
