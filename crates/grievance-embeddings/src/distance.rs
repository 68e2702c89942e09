//! Vector distances. Accumulation is done in f64.

use grievance_core::config::DistanceMetric;

pub fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f64 {
    match metric {
        DistanceMetric::Cosine => cosine_distance(a, b),
        DistanceMetric::Euclidean => euclidean_distance(a, b),
    }
}

/// `1 - cos(a, b)`, clamped to [0, 2]. A zero vector is treated as
/// orthogonal to everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    (1.0 - dot / (na.sqrt() * nb.sqrt())).clamp(0.0, 2.0)
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Scale `v` to unit length in place. Returns false for a zero vector.
pub fn l2_normalize(v: &mut [f32]) -> bool {
    let norm = v.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }
    for x in v.iter_mut() {
        *x = (*x as f64 / norm) as f32;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_is_zero() {
        assert!(cosine_distance(&[1.0, 2.0], &[2.0, 4.0]) < 1e-12);
    }

    #[test]
    fn cosine_of_opposite_is_two() {
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn zero_vector_is_orthogonal() {
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn euclidean_matches_pythagoras() {
        assert!((euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn normalize_rejects_zero() {
        let mut v = [0.0f32; 3];
        assert!(!l2_normalize(&mut v));
        let mut w = [3.0f32, 4.0];
        assert!(l2_normalize(&mut w));
        assert!((w[0] - 0.6).abs() < 1e-6);
    }
}
