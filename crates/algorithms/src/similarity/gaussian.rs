//! Gaussian similarity
//!
//! ```text
//! z = |value − mean| / std
//! s = exp(−z² / 2)
//! ```

use serde::{Deserialize, Serialize};
use terraf_core::raster::Raster;
use terraf_core::Result;

use crate::grid_ops::{build_output, is_nodata_f64};
use crate::maybe_rayon::*;
use crate::signature::IndexSignature;

/// Similarity of `value` to a normal distribution (mean, std), in [0, 1].
///
/// - Non-finite `value` or `mean` → NaN (no-data)
/// - `std <= 0` is the degenerate limit: 1.0 at the mean, 0.0 elsewhere
#[inline]
pub fn score(value: f64, mean: f64, std: f64) -> f64 {
    if !value.is_finite() || !mean.is_finite() {
        return f64::NAN;
    }
    if !(std > 0.0) || !std.is_finite() {
        return if value == mean { 1.0 } else { 0.0 };
    }
    let z = (value - mean).abs() / std;
    (-0.5 * z * z).exp()
}

/// Target (mean, std) a raster is scored against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetDistribution {
    pub mean: f64,
    pub std: f64,
}

impl TargetDistribution {
    pub fn new(mean: f64, std: f64) -> Self {
        Self { mean, std }
    }

    /// Reference distribution of one index with the std floor applied
    pub fn from_signature(sig: &IndexSignature, std_floor: f64) -> Self {
        Self {
            mean: sig.mean(),
            std: sig.effective_std(std_floor),
        }
    }

    /// Population mean and std of the finite `values`
    pub fn from_values(values: &[f64], std_floor: f64) -> Option<Self> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        let n = finite.len() as f64;
        let mean = finite.iter().sum::<f64>() / n;
        let std = (finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        Some(Self::new(mean, std.max(std_floor)))
    }
}

/// Score every cell of `raster` against `target`; no-data stays no-data
pub fn score_raster(raster: &Raster<f64>, target: TargetDistribution) -> Result<Raster<f64>> {
    let (rows, cols) = raster.shape();
    let nodata = raster.nodata();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let v = unsafe { raster.get_unchecked(row, col) };
                if is_nodata_f64(v, nodata) {
                    continue;
                }
                row_data[col] = score(v, target.mean, target.std);
            }
            row_data
        })
        .collect();

    build_output(raster, rows, cols, data)
}
