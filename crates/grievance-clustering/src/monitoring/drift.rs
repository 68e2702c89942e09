//! Embedding drift: has the recent stream moved away from the reference?
//!
//! Distances of reference and recent embeddings to the reference centroid
//! are compared with a two-sample Kolmogorov–Smirnov test. Drift is
//! declared when `p < 0.05` and the KS statistic exceeds the configured
//! threshold.

use grievance_core::config::DistanceMetric;
use grievance_core::ClusterId;
use grievance_embeddings::distance;
use serde::Serialize;

/// Below this many samples on either side no test is run.
pub const MIN_SAMPLES: usize = 5;
pub const SIGNIFICANCE: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftReport {
    /// `None` for the whole report stream.
    pub cluster_id: Option<ClusterId>,
    pub drift_detected: bool,
    pub p_value: f64,
    pub statistic: f64,
    pub centroid_shift: f64,
    pub reference_size: usize,
    pub recent_size: usize,
}

/// Compare `recent` against `reference`. `None` when either side has
/// fewer than [`MIN_SAMPLES`] vectors.
pub fn detect_drift(
    reference: &[&[f32]],
    recent: &[&[f32]],
    metric: DistanceMetric,
    threshold: f64,
) -> Option<DriftReport> {
    if reference.len() < MIN_SAMPLES || recent.len() < MIN_SAMPLES {
        return None;
    }
    let ref_centroid = centroid(reference);
    let new_centroid = centroid(recent);
    let mut ref_dists: Vec<f64> = reference
        .iter()
        .map(|v| distance(metric, v, &ref_centroid))
        .collect();
    let mut new_dists: Vec<f64> = recent
        .iter()
        .map(|v| distance(metric, v, &ref_centroid))
        .collect();
    let (statistic, p_value) = ks_two_sample(&mut ref_dists, &mut new_dists);
    Some(DriftReport {
        cluster_id: None,
        drift_detected: p_value < SIGNIFICANCE && statistic > threshold,
        p_value,
        statistic,
        centroid_shift: distance(metric, &ref_centroid, &new_centroid),
        reference_size: reference.len(),
        recent_size: recent.len(),
    })
}

/// Two-sample KS test. Sorts both inputs. Returns `(D, p)`.
pub fn ks_two_sample(a: &mut [f64], b: &mut [f64]) -> (f64, f64) {
    if a.is_empty() || b.is_empty() {
        return (0.0, 1.0);
    }
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j) = (0usize, 0usize);
    let mut d: f64 = 0.0;
    while i < a.len() && j < b.len() {
        let x = a[i].min(b[j]);
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        d = d.max((i as f64 / n1 - j as f64 / n2).abs());
    }
    let en = (n1 * n2 / (n1 + n2)).sqrt();
    let p = ks_probability((en + 0.12 + 0.11 / en) * d);
    (d, p)
}

/// Kolmogorov distribution tail `Q_KS(lambda)`.
fn ks_probability(lambda: f64) -> f64 {
    const EPS1: f64 = 1e-3;
    const EPS2: f64 = 1e-8;
    if lambda <= 0.0 {
        return 1.0;
    }
    let a2 = -2.0 * lambda * lambda;
    let mut fac = 2.0;
    let mut sum = 0.0;
    let mut previous = 0.0;
    for j in 1..=100 {
        let jf = j as f64;
        let term = fac * (a2 * jf * jf).exp();
        sum += term;
        if term.abs() <= EPS1 * previous || term.abs() <= EPS2 * sum {
            return sum.clamp(0.0, 1.0);
        }
        fac = -fac;
        previous = term.abs();
    }
    1.0
}

fn centroid(vectors: &[&[f32]]) -> Vec<f32> {
    let dims = vectors.first().map_or(0, |v| v.len());
    let mut sum = vec![0.0f64; dims];
    for v in vectors {
        for (s, x) in sum.iter_mut().zip(v.iter()) {
            *s += *x as f64;
        }
    }
    let n = vectors.len().max(1) as f64;
    sum.into_iter().map(|s| (s / n) as f32).collect()
}
