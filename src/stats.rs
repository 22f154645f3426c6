//! Scalar statistics shared across modules
//!
//! Small helpers used by depth factor estimation and empirical testing.
//! All functions ignore nothing: callers are expected to filter NaN values
//! before calling, except where noted.

/// Scale constant relating the MAD to the standard deviation of a normal
/// distribution: 1 / qnorm(0.75).
pub const MAD_SCALE: f64 = 1.4826022185056018;

/// Arithmetic mean. Returns NaN for an empty slice.
pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Sample standard deviation (n - 1 denominator). Returns NaN for fewer
/// than two values.
pub fn sample_sd(x: &[f64]) -> f64 {
    if x.len() < 2 {
        return f64::NAN;
    }
    let m = mean(x);
    let ss: f64 = x.iter().map(|&v| (v - m) * (v - m)).sum();
    (ss / (x.len() - 1) as f64).sqrt()
}

/// Median of a slice. Returns NaN for an empty slice.
pub fn median(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    let mut sorted = x.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Median absolute deviation, scaled by [`MAD_SCALE`] for consistency with
/// the normal standard deviation.
pub fn mad(x: &[f64]) -> f64 {
    let med = median(x);
    if med.is_nan() {
        return f64::NAN;
    }
    let deviations: Vec<f64> = x.iter().map(|&v| (v - med).abs()).collect();
    MAD_SCALE * median(&deviations)
}

/// Empirical quantile with linear interpolation between order statistics
/// (R's default type-7 quantile). `prob` must lie in [0, 1].
pub fn quantile(x: &[f64], prob: f64) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    let mut sorted = x.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * prob.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = lo + 1;
    if hi >= n {
        return sorted[n - 1];
    }
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Geometric mean of strictly positive values. Returns NaN if the slice is
/// empty or contains a non-positive value.
pub fn geometric_mean(x: &[f64]) -> f64 {
    if x.is_empty() || x.iter().any(|&v| v <= 0.0) {
        return f64::NAN;
    }
    let log_sum: f64 = x.iter().map(|&v| v.ln()).sum();
    (log_sum / x.len() as f64).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_sd() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((mean(&x) - 3.0).abs() < 1e-12);
        assert!((sample_sd(&x) - (2.5f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_median_even_odd() {
        assert!((median(&[3.0, 1.0, 2.0]) - 2.0).abs() < 1e-12);
        assert!((median(&[4.0, 1.0, 3.0, 2.0]) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_mad_of_symmetric_data() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        // median = 3, absolute deviations = [2,1,0,1,2], median = 1
        assert!((mad(&x) - MAD_SCALE).abs() < 1e-12);
    }

    #[test]
    fn test_quantile_interpolates() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        assert!((quantile(&x, 0.0) - 1.0).abs() < 1e-12);
        assert!((quantile(&x, 1.0) - 4.0).abs() < 1e-12);
        assert!((quantile(&x, 0.5) - 2.5).abs() < 1e-12);
        // 75th percentile of 1..4 with type-7: 1 + 0.75*3 = 3.25
        assert!((quantile(&x, 0.75) - 3.25).abs() < 1e-12);
    }

    #[test]
    fn test_geometric_mean() {
        let x = vec![1.0, 10.0, 100.0];
        assert!((geometric_mean(&x) - 10.0).abs() < 1e-9);
        assert!(geometric_mean(&[1.0, 0.0]).is_nan());
    }
}
