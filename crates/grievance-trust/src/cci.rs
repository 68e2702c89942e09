//! Causal confidence index.
//!
//! Weighted blend of significance (40%), robustness (40%) and lag
//! stability (20%):
//! - significance: `1 - p`, halved when `p > 0.05`
//! - robustness: how much weaker the placebo (opposite-direction)
//!   correlation is than the effect
//! - stability: share of neighbouring lags that agree with the peak

const SIGNIFICANCE_WEIGHT: f64 = 0.4;
const ROBUSTNESS_WEIGHT: f64 = 0.4;
const STABILITY_WEIGHT: f64 = 0.2;
const ALPHA: f64 = 0.05;

/// Causal confidence index in [0, 1].
pub fn causal_confidence(effect: f64, p_value: f64, placebo: f64, stability: f64) -> f64 {
    let p = if p_value.is_finite() { p_value.clamp(0.0, 1.0) } else { 1.0 };
    let mut significance = 1.0 - p;
    if p > ALPHA {
        significance *= 0.5;
    }
    let robustness = if !effect.is_finite() || effect.abs() < 1e-9 {
        0.0
    } else {
        let placebo = if placebo.is_finite() { placebo } else { effect };
        (1.0 - (placebo / effect).abs()).max(0.0)
    };
    let stability = if stability.is_finite() { stability.clamp(0.0, 1.0) } else { 0.0 };
    (SIGNIFICANCE_WEIGHT * significance + ROBUSTNESS_WEIGHT * robustness + STABILITY_WEIGHT * stability)
        .clamp(0.0, 1.0)
}

/// Two-sided p-value of a correlation `r` over `n` paired samples, using
/// the Fisher z-transform. Fewer than four samples carry no evidence.
pub fn correlation_p_value(r: f64, n: usize) -> f64 {
    if n < 4 || !r.is_finite() {
        return 1.0;
    }
    let r = r.clamp(-0.999_999, 0.999_999);
    let z = r.atanh() * ((n - 3) as f64).sqrt();
    erfc(z.abs() / std::f64::consts::SQRT_2).clamp(0.0, 1.0)
}

/// Complementary error function (Numerical Recipes `erfcc`, |error| < 1.2e-7).
pub(crate) fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87 + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let ans = t * poly.exp();
    if x >= 0.0 {
        ans
    } else {
        2.0 - ans
    }
}
