//! 64-bit simhash over word shingles.
//!
//! Each 3-word shingle is hashed with blake3; bit `i` of the fingerprint is
//! set when more shingles have bit `i` set than clear. Texts that share most
//! shingles land within a few bits of each other.

const SHINGLE_WIDTH: usize = 3;

/// Lower-case, drop punctuation, split on whitespace.
fn features(text: &str) -> Vec<String> {
    let cleaned: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    if tokens.is_empty() {
        return Vec::new();
    }
    if tokens.len() < SHINGLE_WIDTH {
        return vec![tokens.join(" ")];
    }
    tokens.windows(SHINGLE_WIDTH).map(|w| w.join(" ")).collect()
}

fn feature_hash(feature: &str) -> u64 {
    let digest = blake3::hash(feature.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// Simhash of `text`. Empty or punctuation-only text hashes to 0.
pub fn simhash(text: &str) -> u64 {
    let feats = features(text);
    if feats.is_empty() {
        return 0;
    }
    let mut votes = [0i32; 64];
    for feature in &feats {
        let h = feature_hash(feature);
        for (bit, vote) in votes.iter_mut().enumerate() {
            if (h >> bit) & 1 == 1 {
                *vote += 1;
            } else {
                *vote -= 1;
            }
        }
    }
    votes
        .iter()
        .enumerate()
        .filter(|(_, v)| **v > 0)
        .fold(0u64, |acc, (bit, _)| acc | (1u64 << bit))
}

pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Whether two fingerprints are within `max_bits` of each other.
pub fn is_near_duplicate(a: u64, b: u64, max_bits: u32) -> bool {
    hamming_distance(a, b) <= max_bits
}
