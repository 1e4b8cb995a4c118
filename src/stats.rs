//! Small descriptive statistics helpers over interval series.
//!
//! Variance and standard deviation are population statistics (divide by
//! `n`). Quantiles use linear interpolation between closest ranks.

/// Round to 6 decimal places.
pub fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}

pub fn mean(xs: &[f64]) -> f64 {
    // ---
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

pub fn variance(xs: &[f64]) -> f64 {
    // ---
    if xs.is_empty() {
        return 0.0;
    }
    let m = mean(xs);
    xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64
}

pub fn std_dev(xs: &[f64]) -> f64 {
    variance(xs).sqrt()
}

pub fn min(xs: &[f64]) -> f64 {
    xs.iter().copied().reduce(f64::min).unwrap_or(0.0)
}

pub fn max(xs: &[f64]) -> f64 {
    xs.iter().copied().reduce(f64::max).unwrap_or(0.0)
}

/// `std / mean`, or 0 when the mean is not positive.
pub fn coefficient_of_variation(xs: &[f64]) -> f64 {
    // ---
    let m = mean(xs);
    if m <= 0.0 {
        0.0
    } else {
        std_dev(xs) / m
    }
}

/// Quantile `q` in `[0, 1]` with linear interpolation.
pub fn quantile(xs: &[f64], q: f64) -> f64 {
    // ---
    if xs.is_empty() {
        return 0.0;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub fn median(xs: &[f64]) -> f64 {
    quantile(xs, 0.5)
}
