//! Summary statistics of a pooled sample

use serde::{Deserialize, Serialize};

use super::percentile::percentile_sorted;

/// Location and spread of a sample of finite values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation (ddof = 0)
    pub std: f64,
    pub median: f64,
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
    pub min: f64,
    pub max: f64,
}

impl SampleSummary {
    /// Summarize the finite values of `values`; `None` when there are none
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let var = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Some(Self {
            count: sorted.len(),
            mean,
            std: var.sqrt(),
            median: percentile_sorted(&sorted, 50.0)?,
            p25: percentile_sorted(&sorted, 25.0)?,
            p75: percentile_sorted(&sorted, 75.0)?,
            p90: percentile_sorted(&sorted, 90.0)?,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        })
    }
}

/// Coefficient of variation in percent, `std / |mean| * 100` (population std).
///
/// `None` with fewer than two values or a zero mean.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return None;
    }
    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    if mean.abs() < f64::EPSILON {
        return None;
    }
    let std = (finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    Some(std / mean.abs() * 100.0)
}
