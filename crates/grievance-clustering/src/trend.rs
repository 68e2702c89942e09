//! Rolling-window trend metrics over sorted member timestamps.

use chrono::{DateTime, Duration, Utc};
use grievance_core::TrendMetrics;

pub const TREND_WINDOW_DAYS: i64 = 30;
pub const GROWTH_WINDOW_DAYS: i64 = 7;

/// Percentage change of `last` against `previous`. With no previous
/// activity the change is `100 * last`, so a fresh burst still ranks.
pub fn growth_rate(last: u64, previous: u64) -> f64 {
    if previous > 0 {
        (last as f64 - previous as f64) / previous as f64 * 100.0
    } else {
        100.0 * last as f64
    }
}

/// Number of timestamps in `(from, to]`. `times` must be sorted.
pub fn count_in(times: &[DateTime<Utc>], from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    let start = times.partition_point(|t| *t <= from);
    let end = times.partition_point(|t| *t <= to);
    end.saturating_sub(start) as u64
}

/// `(last 7 days, previous 7 days)` counts as of `now`.
pub fn growth_windows(times: &[DateTime<Utc>], now: DateTime<Utc>) -> (u64, u64) {
    let week = Duration::days(GROWTH_WINDOW_DAYS);
    (
        count_in(times, now - week, now),
        count_in(times, now - week - week, now - week),
    )
}

pub fn trend_metrics(times: &[DateTime<Utc>], now: DateTime<Utc>) -> TrendMetrics {
    let (last, previous) = growth_windows(times, now);
    TrendMetrics {
        count_30d: count_in(times, now - Duration::days(TREND_WINDOW_DAYS), now),
        growth_rate: growth_rate(last, previous),
    }
}

/// Insert keeping `times` sorted.
pub(crate) fn insert_sorted(times: &mut Vec<DateTime<Utc>>, at: DateTime<Utc>) {
    let pos = times.partition_point(|t| *t <= at);
    times.insert(pos, at);
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_fixtures::ts;

    #[test]
    fn window_is_half_open() {
        let times = vec![ts(0), ts(1), ts(30)];
        // (day 0, day 30]: day 0 excluded, day 30 included
        assert_eq!(count_in(&times, ts(0), ts(30)), 2);
    }

    #[test]
    fn growth_against_previous_week() {
        let times = vec![ts(1), ts(2), ts(8), ts(9), ts(10), ts(11)];
        let metrics = trend_metrics(&times, ts(14));
        assert_eq!(metrics.count_30d, 6);
        assert!((metrics.growth_rate - 100.0).abs() < 1e-9);
    }

    #[test]
    fn growth_without_history() {
        assert_eq!(growth_rate(3, 0), 300.0);
        assert_eq!(growth_rate(0, 0), 0.0);
        assert_eq!(growth_rate(0, 4), -100.0);
    }

    #[test]
    fn insert_keeps_order() {
        let mut times = vec![ts(1), ts(5)];
        insert_sorted(&mut times, ts(3));
        insert_sorted(&mut times, ts(0));
        assert_eq!(times, vec![ts(0), ts(1), ts(3), ts(5)]);
    }
}
