//! Derived cluster labels.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use grievance_core::SourceChannel;

const TITLE_TERMS: usize = 3;
const EXCERPT_CHARS: usize = 160;

/// Top keywords joined with ", ", suffixed with the majority region.
pub fn title(terms: &HashMap<String, u64>, majority_region: Option<&str>) -> String {
    let mut ranked: Vec<(&String, &u64)> = terms.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    let keywords: Vec<&str> = ranked
        .into_iter()
        .take(TITLE_TERMS)
        .map(|(t, _)| t.as_str())
        .collect();
    let mut title = if keywords.is_empty() {
        "untitled issue".to_string()
    } else {
        keywords.join(", ")
    };
    if let Some(region) = majority_region {
        title.push_str(" - ");
        title.push_str(region);
    }
    title
}

/// One-line description: volume, channels, regional spread, latest date
/// and an excerpt of the most trusted member.
pub fn summary(
    size: usize,
    channels: &BTreeMap<SourceChannel, u64>,
    regions: usize,
    latest: DateTime<Utc>,
    excerpt: &str,
) -> String {
    let channel_list = if channels.is_empty() {
        "unknown channels".to_string()
    } else {
        channels
            .keys()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join("/")
    };
    format!(
        "{size} report{} via {channel_list} across {regions} region{}; latest {}. e.g. \"{}\"",
        plural(size),
        plural(regions),
        latest.format("%Y-%m-%d"),
        truncate(excerpt, EXCERPT_CHARS),
    )
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
