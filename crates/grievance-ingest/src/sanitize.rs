//! Text sanitisation applied before a report is fingerprinted or embedded.

/// A rewrite rule applied to report text.
#[derive(Debug, Clone, Copy)]
pub struct RewriteRule {
    /// Rule name (e.g., "email").
    pub name: &'static str,
    pub pattern: &'static str,
    pub replacement: &'static str,
    /// PII rules are skipped when redaction is disabled.
    pub pii: bool,
}

/// Rules in application order. Aadhaar runs before phone so a 12-digit id
/// is not half-consumed as a phone number.
pub static REWRITE_RULES: &[RewriteRule] = &[
    RewriteRule { name: "markup", pattern: r"(?s)<[^>]*>", replacement: " ", pii: false },
    RewriteRule {
        name: "email",
        pattern: r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b",
        replacement: "[REDACTED-EMAIL]",
        pii: true,
    },
    RewriteRule {
        name: "aadhaar",
        pattern: r"\b\d{4}[\s-]\d{4}[\s-]\d{4}\b|\b\d{12}\b",
        replacement: "[REDACTED-AADHAAR]",
        pii: true,
    },
    RewriteRule {
        name: "phone",
        pattern: r"(?:\+91[\s-]?)?\b(?:\d{5}[\s-]?\d{5}|\d{3}[-.\s]?\d{3}[-.\s]?\d{4})\b",
        replacement: "[REDACTED-PHONE]",
        pii: true,
    },
];

const ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&amp;", "&"),
];

/// Pre-compiled sanitiser. Compile once, reuse for every report.
pub struct CompiledSanitizer {
    compiled: Vec<(&'static RewriteRule, regex::Regex)>,
    redact_pii: bool,
}

impl CompiledSanitizer {
    pub fn new(redact_pii: bool) -> Self {
        let compiled = REWRITE_RULES
            .iter()
            .filter(|rule| redact_pii || !rule.pii)
            .filter_map(|rule| regex::Regex::new(rule.pattern).ok().map(|re| (rule, re)))
            .collect();
        Self { compiled, redact_pii }
    }

    pub fn redacts_pii(&self) -> bool {
        self.redact_pii
    }

    /// Strip markup, decode common entities, redact PII and fold runs of
    /// whitespace into single spaces.
    pub fn clean(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (rule, re) in &self.compiled {
            if re.is_match(&out) {
                out = re.replace_all(&out, rule.replacement).into_owned();
            }
            if rule.name == "markup" {
                out = decode_entities(&out);
            }
        }
        collapse_whitespace(&out)
    }
}

impl Default for CompiledSanitizer {
    fn default() -> Self {
        Self::new(true)
    }
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITIES
        .iter()
        .fold(text.to_string(), |acc, (entity, plain)| acc.replace(entity, plain))
}

/// Fold all whitespace runs (including newlines and tabs) into one space
/// and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
