//! Welfare scheme tagging.
//!
//! Two passes per report: an alias pass (acronyms and short names, matched
//! on word boundaries, full confidence) and a name pass that scores how
//! many of a scheme's official name words appear in the text.

use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use serde::Serialize;

/// A government scheme reports may refer to.
#[derive(Debug, Clone, Copy)]
pub struct WelfareScheme {
    /// Stable tag stored on reports and clusters.
    pub code: &'static str,
    pub name: &'static str,
    /// Lower-case alternative spellings. Spaces also match hyphens.
    pub aliases: &'static [&'static str],
}

pub static WELFARE_SCHEMES: &[WelfareScheme] = &[
    WelfareScheme {
        code: "PMAY",
        name: "Pradhan Mantri Awas Yojana",
        aliases: &["pmay", "pm awas", "awas yojana"],
    },
    WelfareScheme {
        code: "MGNREGA",
        name: "Mahatma Gandhi National Rural Employment Guarantee Act",
        aliases: &["mgnrega", "mnrega", "nrega", "narega", "job card"],
    },
    WelfareScheme {
        code: "PM-KISAN",
        name: "PM Kisan Samman Nidhi",
        aliases: &["pm kisan", "kisan samman"],
    },
    WelfareScheme {
        code: "PMJAY",
        name: "Ayushman Bharat Pradhan Mantri Jan Arogya Yojana",
        aliases: &["ayushman", "pmjay", "pm jay", "golden card"],
    },
    WelfareScheme {
        code: "SBM",
        name: "Swachh Bharat Mission",
        aliases: &["swachh bharat"],
    },
    WelfareScheme {
        code: "JJM",
        name: "Jal Jeevan Mission",
        aliases: &["jal jeevan", "har ghar jal"],
    },
    WelfareScheme {
        code: "PDS",
        name: "Public Distribution System",
        aliases: &["pds", "ration card", "fair price shop"],
    },
    WelfareScheme {
        code: "NSAP",
        name: "National Social Assistance Programme",
        aliases: &["nsap", "old age pension", "widow pension", "disability pension"],
    },
];

/// Name-pass score below which a scheme is not reported.
const NAME_MATCH_CUTOFF: f64 = 0.7;
/// Scores above this are marked confident.
const CONFIDENT_ABOVE: f64 = 0.85;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemeMatch {
    pub code: &'static str,
    pub name: &'static str,
    /// In [0, 1]; alias hits score 1.0.
    pub confidence: f64,
    pub confident: bool,
}

struct CompiledScheme {
    scheme: &'static WelfareScheme,
    aliases: Option<Regex>,
    name_words: Vec<String>,
}

/// Pre-compiled scheme matcher. Compile once, share across workers.
pub struct SchemeMatcher {
    compiled: Vec<CompiledScheme>,
}

impl Default for SchemeMatcher {
    fn default() -> Self {
        Self::new(WELFARE_SCHEMES)
    }
}

impl SchemeMatcher {
    pub fn new(schemes: &'static [WelfareScheme]) -> Self {
        let compiled = schemes
            .iter()
            .map(|scheme| CompiledScheme {
                scheme,
                aliases: alias_regex(scheme.aliases),
                name_words: words(scheme.name).into_iter().collect(),
            })
            .collect();
        Self { compiled }
    }

    /// Every scheme the text plausibly mentions, best first. Ties go to
    /// the smaller code.
    pub fn matches(&self, text: &str) -> Vec<SchemeMatch> {
        let text_words = words(text);
        let mut found: BTreeMap<&'static str, SchemeMatch> = BTreeMap::new();
        for entry in &self.compiled {
            let alias_hit = entry.aliases.as_ref().is_some_and(|re| re.is_match(text));
            let confidence = if alias_hit {
                1.0
            } else {
                name_coverage(&entry.name_words, &text_words)
            };
            if confidence >= NAME_MATCH_CUTOFF {
                found.insert(
                    entry.scheme.code,
                    SchemeMatch {
                        code: entry.scheme.code,
                        name: entry.scheme.name,
                        confidence,
                        confident: confidence > CONFIDENT_ABOVE,
                    },
                );
            }
        }
        let mut matches: Vec<SchemeMatch> = found.into_values().collect();
        matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence).then_with(|| a.code.cmp(b.code)));
        matches
    }

    /// Codes of the schemes the text mentions, in code order.
    pub fn codes(&self, text: &str) -> Vec<String> {
        let mut codes: Vec<String> = self.matches(text).into_iter().map(|m| m.code.to_string()).collect();
        codes.sort();
        codes
    }
}

fn alias_regex(aliases: &[&str]) -> Option<Regex> {
    if aliases.is_empty() {
        return None;
    }
    let alternatives: Vec<String> = aliases
        .iter()
        .map(|alias| {
            alias
                .split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"[\s-]+")
        })
        .collect();
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|"))).ok()
}

/// Lower-case words of three or more characters.
fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect()
}

fn name_coverage(name_words: &[String], text_words: &HashSet<String>) -> f64 {
    if name_words.is_empty() {
        return 0.0;
    }
    let hits = name_words.iter().filter(|w| text_words.contains(*w)).count();
    hits as f64 / name_words.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(text: &str) -> Vec<String> {
        SchemeMatcher::default().codes(text)
    }

    #[test]
    fn acronyms_match_case_insensitively() {
        assert_eq!(codes("MGNREGA wages pending for 3 months"), vec!["MGNREGA"]);
        assert_eq!(codes("my pmay house is half built"), vec!["PMAY"]);
        assert_eq!(codes("Old-age pension not credited"), vec!["NSAP"]);
    }

    #[test]
    fn aliases_need_word_boundaries() {
        assert!(codes("the spdsx form").is_empty());
        assert!(codes("pmayor office").is_empty());
    }

    #[test]
    fn official_name_words_match_without_an_alias() {
        let matches = SchemeMatcher::default().matches("Mission for jal supply in jeevan nagar stalled");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].code, "JJM");
        assert_eq!(matches[0].confidence, 1.0);

        // three of four name words
        let partial = SchemeMatcher::default().matches("pradhan mantri yojana survey never happened");
        assert_eq!(partial[0].code, "PMAY");
        assert!((partial[0].confidence - 0.75).abs() < 1e-12);
        assert!(!partial[0].confident);
    }

    #[test]
    fn several_schemes_in_one_report() {
        assert_eq!(
            codes("ration card cancelled and NREGA job card also blocked"),
            vec!["MGNREGA", "PDS"]
        );
    }

    #[test]
    fn unrelated_text_matches_nothing() {
        assert!(codes("street light broken near the school").is_empty());
    }
}
