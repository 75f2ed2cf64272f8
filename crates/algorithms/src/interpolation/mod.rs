//! Interpolation of sparse field measurements
//!
//! - RBF: radial basis function surfaces (multiquadric by default)
//!
//! Point sets (magnetometry, geochemical assays) are irregular and may
//! contain duplicates. The fitted surface is queried lazily and
//! materialised on a raster grid only when a score is needed.

mod rbf;
pub(crate) mod solve;

pub use rbf::{DuplicatePolicy, RbfInterpolator, RbfKernel, RbfParams};
pub use terraf_core::vector::{SamplePoint, SparsePointSet};

use terraf_core::raster::Raster;
use terraf_core::Result;

/// Fit an RBF surface to `points` and evaluate it on the grid of `template`.
pub fn interpolate_to_grid(
    points: &SparsePointSet,
    template: &Raster<f64>,
    params: RbfParams,
) -> Result<Raster<f64>> {
    RbfInterpolator::build(points, params)?.to_grid_like(template)
}
