//! Sample statistics over pooled raster cell values
//!
//! - Percentiles with linear interpolation between closest ranks
//! - Percentile rank of a score within a sample
//! - Summary (mean, population std, quartiles, extremes) of a sample

mod percentile;
mod summary;

pub use percentile::{percentile, percentile_of_score, percentile_sorted, raster_percentile};
pub use summary::{coefficient_of_variation, SampleSummary};
