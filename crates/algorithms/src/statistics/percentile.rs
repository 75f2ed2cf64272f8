//! Percentiles

use terraf_core::raster::Raster;

/// Percentile `p` (0..=100) of an ascending-sorted slice.
///
/// Uses linear interpolation between the two closest ranks, at fractional
/// position `(n - 1) * p / 100`. Returns `None` for an empty slice.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !p.is_finite() {
        return None;
    }
    let p = p.clamp(0.0, 100.0);
    let pos = (sorted.len() - 1) as f64 * p / 100.0;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Percentile of the finite values in `values` (order does not matter)
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, p)
}

/// Percentile of all valid cells of a raster
pub fn raster_percentile(raster: &Raster<f64>, p: f64) -> Option<f64> {
    percentile(&raster.valid_values(), p)
}

/// Percentile rank (0..=100) of `score` within the finite values of `values`.
///
/// Ties are handled by averaging the strict and weak ranks, so a score equal
/// to every sample ranks at 50 + 50/n.
pub fn percentile_of_score(values: &[f64], score: f64) -> Option<f64> {
    let mut n = 0usize;
    let mut left = 0usize;
    let mut right = 0usize;
    for &v in values.iter().filter(|v| v.is_finite()) {
        n += 1;
        if v < score {
            left += 1;
        }
        if v <= score {
            right += 1;
        }
    }
    if n == 0 || !score.is_finite() {
        return None;
    }
    let plus1 = usize::from(left < right);
    Some((left + right + plus1) as f64 * 50.0 / n as f64)
}
