//! Log-space accumulation used by the latent class model
//!
//! Probabilities are multiplied across many workers, so every quantity is
//! carried as a natural logarithm and summed with the log-sum-exp trick.
//! `f64::NEG_INFINITY` stands for probability zero throughout.

/// Natural logarithm of one half, the uninformative binary probability
pub const LN_HALF: f64 = -std::f64::consts::LN_2;

/// Compute `ln(Σ exp(v))` without overflow or underflow
///
/// An empty input or an input made only of `-inf` sums to `-inf`.
pub fn log_sum_exp<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let values: Vec<f64> = values.into_iter().collect();
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if max == f64::NEG_INFINITY || max == f64::INFINITY || max.is_nan() {
        return max;
    }

    let shifted_sum: f64 = values.iter().map(|&v| (v - max).exp()).sum();
    max + shifted_sum.ln()
}

/// Log-sum-exp of exactly two terms
pub fn log_add(a: f64, b: f64) -> f64 {
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    if hi == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    hi + (lo - hi).exp().ln_1p()
}

/// Normalize a pair of log-weights so that their probabilities sum to one
///
/// Returns `None` when both weights are `-inf` (or NaN) and the pair has no
/// defined normalization.
pub fn normalize_pair(a: f64, b: f64) -> Option<[f64; 2]> {
    let norm = log_add(a, b);
    norm.is_finite().then(|| [a - norm, b - norm])
}

/// `ln(x)` that maps zero to `-inf` instead of going through a NaN path
pub fn ln_or_neg_infinity(x: f64) -> f64 {
    if x <= 0.0 { f64::NEG_INFINITY } else { x.ln() }
}
