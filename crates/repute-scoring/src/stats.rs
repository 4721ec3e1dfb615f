//! Population statistics over `f64` samples.
//!
//! Standard deviations are population (not sample) deviations. Every helper
//! returns `None` for an empty or degenerate input instead of dividing by zero.

/// Arithmetic mean, `None` when `values` is empty.
///
/// A constant input returns that constant exactly, so its deviation is an
/// exact zero rather than rounding noise.
///
/// # Examples
///
/// ```
/// use repute_scoring::stats::mean;
///
/// assert_eq!(mean(&[]), None);
/// assert_eq!(mean(&[1.0, 3.0]), Some(2.0));
/// ```
pub fn mean(values: &[f64]) -> Option<f64> {
    let first = *values.first()?;
    if values.iter().all(|&v| v == first) {
        return Some(first);
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation, `None` when `values` is empty.
///
/// # Examples
///
/// ```
/// use repute_scoring::stats::population_stddev;
///
/// // mean 5, squared deviations 9+1+1+1+0+0+4+16 = 32, /8 = 4, sqrt = 2
/// let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
/// assert_eq!(population_stddev(&v), Some(2.0));
/// ```
pub fn population_stddev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.max(0.0).sqrt())
}

/// Standard deviation divided by the mean.
///
/// `None` when `values` is empty or the mean is not positive.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    if m <= 0.0 {
        return None;
    }
    Some(population_stddev(values)? / m)
}

/// Standard score of `value`; `None` when `stddev` is zero or not finite.
pub fn z_score(value: f64, mean: f64, stddev: f64) -> Option<f64> {
    if !stddev.is_finite() || stddev <= 0.0 {
        return None;
    }
    Some((value - mean) / stddev)
}
