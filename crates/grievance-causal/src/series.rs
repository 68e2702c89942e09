//! Daily report-count series and lagged cross-correlation.

use chrono::{DateTime, NaiveDate, Utc};

/// Daily counts on the shared axis. Index `pad` is the first day of the
/// window; `pad` empty bins sit on each side so every lag in
/// `-pad..=pad` sees the same number of overlapping bins.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries {
    pub bins: Vec<f64>,
    /// Reports that fell inside the window.
    pub in_window: usize,
}

/// Bin `times` into days ending at `as_of` (inclusive).
pub fn bin_daily(
    times: &[DateTime<Utc>],
    as_of: DateTime<Utc>,
    window_days: i64,
    pad: i64,
) -> DailySeries {
    let window_days = window_days.max(1);
    let pad = pad.max(0);
    let last: NaiveDate = as_of.date_naive();
    let first = last - chrono::Duration::days(window_days - 1);
    let mut bins = vec![0.0; (window_days + 2 * pad) as usize];
    let mut in_window = 0;
    for t in times {
        let day = t.date_naive();
        if day < first || day > last {
            continue;
        }
        let offset = (day - first).num_days() + pad;
        bins[offset as usize] += 1.0;
        in_window += 1;
    }
    DailySeries { bins, in_window }
}

/// Pearson correlation of `a[t]` against `b[t + lag]` over the bins both
/// series cover. Zero variance on either side yields 0.
pub fn pearson_at(a: &[f64], b: &[f64], lag: i64) -> (f64, usize) {
    let n = a.len().min(b.len()) as i64;
    let (start, end) = if lag >= 0 { (0, n - lag) } else { (-lag, n) };
    if end - start < 2 {
        return (0.0, 0);
    }
    let pairs = || (start..end).map(|t| (a[t as usize], b[(t + lag) as usize]));
    let count = (end - start) as f64;
    let (sum_x, sum_y) = pairs().fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
    let (mean_x, mean_y) = (sum_x / count, sum_y / count);
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in pairs() {
        let (dx, dy) = (x - mean_x, y - mean_y);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let n_pairs = (end - start) as usize;
    if sxx <= f64::EPSILON || syy <= f64::EPSILON {
        return (0.0, n_pairs);
    }
    ((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0), n_pairs)
}

/// Correlation at every lag in `-max_lag..=max_lag`, ascending.
pub fn cross_correlation(a: &[f64], b: &[f64], max_lag: i64) -> Vec<LagCorrelation> {
    (-max_lag..=max_lag)
        .map(|lag| {
            let (r, overlap) = pearson_at(a, b, lag);
            LagCorrelation { lag, r, overlap }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagCorrelation {
    pub lag: i64,
    pub r: f64,
    pub overlap: usize,
}

/// Strictly greatest correlation; the earliest lag wins a tie.
pub fn peak(correlations: &[LagCorrelation]) -> Option<LagCorrelation> {
    correlations.iter().fold(None, |best, c| match best {
        Some(b) if c.r <= b.r => Some(b),
        _ if c.r.is_finite() => Some(*c),
        _ => best,
    })
}
