//! Near-duplicate detection per inferred source.
//!
//! Remembers recent fingerprints per source key. A report is a duplicate
//! when the same source submitted a text within `duplicate_hamming` bits of
//! it inside `duplicate_window_hours` (either side of its timestamp, since
//! batches arrive out of order). Capacity is bounded per source; the oldest
//! entries go first. [`DuplicateWindow::prune`] forgets sources that have
//! been quiet for longer than the window.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use grievance_core::config::TrustConfig;
use grievance_ingest::is_near_duplicate;
use tracing::debug;

const PER_SOURCE_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct DuplicateWindow {
    seen: HashMap<String, VecDeque<(DateTime<Utc>, u64)>>,
    window: Duration,
    max_bits: u32,
}

impl DuplicateWindow {
    pub fn new(config: &TrustConfig) -> Self {
        Self {
            seen: HashMap::new(),
            window: Duration::hours(config.duplicate_window_hours),
            max_bits: config.duplicate_hamming,
        }
    }

    /// Check a fingerprint without recording it.
    pub fn is_duplicate(&self, source_key: &str, fingerprint: u64, at: DateTime<Utc>) -> bool {
        self.seen.get(source_key).is_some_and(|entries| {
            entries.iter().any(|(t, fp)| {
                (*t - at).abs() <= self.window && is_near_duplicate(*fp, fingerprint, self.max_bits)
            })
        })
    }

    /// Check, then record. Returns true if the report is a duplicate.
    pub fn check_and_record(&mut self, source_key: &str, fingerprint: u64, at: DateTime<Utc>) -> bool {
        let duplicate = self.is_duplicate(source_key, fingerprint, at);
        let window = self.window;
        let entries = self.seen.entry(source_key.to_string()).or_default();
        let newest = entries.iter().map(|(t, _)| *t).max().unwrap_or(at).max(at);
        entries.retain(|(t, _)| newest - *t <= window);
        if entries.len() >= PER_SOURCE_CAPACITY {
            entries.pop_front();
        }
        entries.push_back((at, fingerprint));
        duplicate
    }

    /// Drop entries older than `now - window` and any source left empty.
    /// Returns the number of sources removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.window;
        let before = self.seen.len();
        self.seen.retain(|_, entries| {
            entries.retain(|(t, _)| *t >= cutoff);
            !entries.is_empty()
        });
        let removed = before - self.seen.len();
        if removed > 0 {
            debug!(removed, remaining = self.seen.len(), "pruned quiet duplicate sources");
        }
        removed
    }

    /// Number of sources currently tracked.
    pub fn sources(&self) -> usize {
        self.seen.len()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_fixtures::ts_hours;

    fn window() -> DuplicateWindow {
        DuplicateWindow::new(&TrustConfig::default())
    }

    #[test]
    fn same_source_within_window_is_duplicate() {
        let mut w = window();
        assert!(!w.check_and_record("ref:a", 0b1010, ts_hours(0)));
        assert!(w.check_and_record("ref:a", 0b1011, ts_hours(5)));
    }

    #[test]
    fn different_source_is_not_duplicate() {
        let mut w = window();
        w.check_and_record("ref:a", 42, ts_hours(0));
        assert!(!w.check_and_record("ref:b", 42, ts_hours(1)));
        assert_eq!(w.sources(), 2);
    }

    #[test]
    fn outside_window_is_not_duplicate() {
        let mut w = window();
        w.check_and_record("ref:a", 42, ts_hours(0));
        assert!(!w.check_and_record("ref:a", 42, ts_hours(25)));
    }

    #[test]
    fn out_of_order_arrival_still_matches() {
        let mut w = window();
        w.check_and_record("ref:a", 42, ts_hours(10));
        assert!(w.check_and_record("ref:a", 42, ts_hours(2)));
    }

    #[test]
    fn prune_forgets_quiet_sources() {
        let mut w = window();
        w.check_and_record("ref:a", 42, ts_hours(0));
        w.check_and_record("ref:b", 7, ts_hours(20));
        w.check_and_record("ref:c", 9, ts_hours(30));
        assert_eq!(w.sources(), 3);

        // window is 24h: at hour 40 only ref:a has gone quiet
        assert_eq!(w.prune(ts_hours(40)), 1);
        assert_eq!(w.sources(), 2);
        assert!(!w.is_duplicate("ref:a", 42, ts_hours(1)));
        assert!(w.is_duplicate("ref:b", 7, ts_hours(21)));

        assert_eq!(w.prune(ts_hours(100)), 2);
        assert_eq!(w.sources(), 0);
    }

    #[test]
    fn prune_keeps_recent_entries_of_a_busy_source() {
        let mut w = window();
        w.check_and_record("ref:a", 1, ts_hours(0));
        w.check_and_record("ref:a", 0xFFFF_0000, ts_hours(30));
        assert_eq!(w.prune(ts_hours(31)), 0);
        assert!(!w.is_duplicate("ref:a", 1, ts_hours(0)));
        assert!(w.is_duplicate("ref:a", 0xFFFF_0000, ts_hours(31)));
    }

    #[test]
    fn distant_fingerprints_are_not_duplicates() {
        let mut w = window();
        w.check_and_record("ref:a", 0, ts_hours(0));
        assert!(!w.check_and_record("ref:a", 0xFF, ts_hours(1)));
    }
}
