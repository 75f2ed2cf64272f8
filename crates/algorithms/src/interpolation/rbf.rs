//! Radial basis function interpolation of sparse survey points
//!
//! The interpolant has the form:
//! ```text
//! f(x,y) = Σᵢ wᵢ · φ(‖(x,y) - (xᵢ,yᵢ)‖) [+ a₁ + a₂·x + a₃·y]
//! ```
//! The linear polynomial tail is added for the conditionally positive
//! definite kernels (linear, cubic, thin plate). Weights come from a dense
//! `(n [+3])²` system, so the method is meant for survey-sized point sets
//! (a few thousand points at most).
//!
//! The system is assembled in coordinates centred on the training bounding
//! box and scaled by its longest edge, so kernel entries stay O(1) for
//! projected (UTM) coordinates. ε is given in map units; smoothing acts on
//! the normalised kernel.
//!
//! The fitted interpolator is a pure function of its training points and is
//! queried lazily; a grid is only materialised by [`RbfInterpolator::to_grid`].

use serde::{Deserialize, Serialize};
use terraf_core::raster::{GeoTransform, Raster};
use terraf_core::vector::{SamplePoint, SparsePointSet};
use terraf_core::{Error, Result};
use tracing::debug;

use super::solve::gauss_solve;
use crate::maybe_rayon::*;

/// Radial kernel φ(r), with ε the shape parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RbfKernel {
    /// `sqrt((r/ε)² + 1)`
    #[default]
    Multiquadric,
    /// `1 / sqrt((r/ε)² + 1)`
    InverseMultiquadric,
    /// `exp(-(r/ε)²)`
    Gaussian,
    /// `r`
    Linear,
    /// `r³`
    Cubic,
    /// `r² ln r`
    ThinPlate,
}

impl RbfKernel {
    #[inline]
    fn eval(self, r: f64, epsilon: f64) -> f64 {
        match self {
            RbfKernel::Multiquadric => ((r / epsilon).powi(2) + 1.0).sqrt(),
            RbfKernel::InverseMultiquadric => 1.0 / ((r / epsilon).powi(2) + 1.0).sqrt(),
            RbfKernel::Gaussian => (-(r / epsilon).powi(2)).exp(),
            RbfKernel::Linear => r,
            RbfKernel::Cubic => r * r * r,
            RbfKernel::ThinPlate => {
                if r < 1e-15 {
                    0.0
                } else {
                    r * r * r.ln()
                }
            }
        }
    }

    /// Kernels that need the linear polynomial tail to be solvable
    pub fn needs_polynomial(self) -> bool {
        matches!(self, RbfKernel::Linear | RbfKernel::Cubic | RbfKernel::ThinPlate)
    }
}

/// What to do with training points closer together than the tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Collapse into one node carrying the mean value
    #[default]
    Merge,
    /// Fail with an interpolation error
    Reject,
}

/// Parameters for RBF fitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RbfParams {
    pub kernel: RbfKernel,
    /// Shape parameter; `None` uses the average node spacing
    pub epsilon: Option<f64>,
    /// Added to the kernel diagonal. 0.0 = exact interpolation.
    pub smoothing: f64,
    pub duplicate_policy: DuplicatePolicy,
    /// Points closer than this (map units) are duplicates
    pub duplicate_tolerance: f64,
    /// Largest accepted pivot ratio before the point set is rejected
    pub max_condition: f64,
    /// How far (map units) queries may reach beyond the training bounding box
    pub extent_margin: f64,
    /// Write no-data in `to_grid` for cells beyond the extent
    pub clip_to_extent: bool,
}

impl Default for RbfParams {
    fn default() -> Self {
        Self {
            kernel: RbfKernel::Multiquadric,
            epsilon: None,
            smoothing: 0.0,
            duplicate_policy: DuplicatePolicy::Merge,
            duplicate_tolerance: 1e-6,
            max_condition: 1e12,
            extent_margin: 0.0,
            clip_to_extent: false,
        }
    }
}

/// A fitted radial basis function surface.
#[derive(Debug, Clone)]
pub struct RbfInterpolator {
    label: String,
    nodes: Vec<SamplePoint>,
    /// Node coordinates in centred, scaled space
    centers: Vec<(f64, f64)>,
    weights: Vec<f64>,
    /// Polynomial tail (a₁, a₂, a₃) in centred, scaled coordinates
    poly: Option<[f64; 3]>,
    kernel: RbfKernel,
    epsilon: f64,
    scaled_epsilon: f64,
    origin: (f64, f64),
    scale: f64,
    /// Training bounding box (min_x, min_y, max_x, max_y)
    bounds: (f64, f64, f64, f64),
    margin: f64,
    clip: bool,
}

impl RbfInterpolator {
    /// Fit an interpolator to the finite points of `points`.
    ///
    /// # Errors
    /// - `Error::Interpolation` for an empty set, rejected duplicates,
    ///   too few or collinear points for a polynomial kernel, or a singular
    ///   or ill-conditioned system
    /// - `Error::InvalidParameter` for a non-positive ε or negative smoothing
    pub fn build(points: &SparsePointSet, params: RbfParams) -> Result<Self> {
        if !(params.smoothing >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "smoothing",
                value: params.smoothing.to_string(),
                reason: "must be >= 0".into(),
            });
        }
        if let Some(eps) = params.epsilon
            && !(eps > 0.0 && eps.is_finite())
        {
            return Err(Error::InvalidParameter {
                name: "epsilon",
                value: eps.to_string(),
                reason: "must be finite and > 0".into(),
            });
        }

        let finite = points.finite_points();
        let dropped = points.len() - finite.len();
        if finite.is_empty() {
            return Err(Error::Interpolation(format!(
                "point set '{}' has no finite samples",
                points.label
            )));
        }

        let nodes = deduplicate(finite, params.duplicate_policy, params.duplicate_tolerance)?;
        let n = nodes.len();

        if params.kernel.needs_polynomial() {
            if n < 3 {
                return Err(Error::Interpolation(format!(
                    "{:?} kernel requires at least 3 distinct points, got {n}",
                    params.kernel
                )));
            }
            if collinear(&nodes) {
                return Err(Error::Interpolation(
                    "ill-conditioned point set: all points are collinear".into(),
                ));
            }
        }

        let bounds = bounding_box(&nodes);
        let epsilon = params.epsilon.unwrap_or_else(|| average_spacing(&nodes, bounds));
        let origin = ((bounds.0 + bounds.2) / 2.0, (bounds.1 + bounds.3) / 2.0);
        let scale = (bounds.2 - bounds.0).max(bounds.3 - bounds.1).max(1.0);
        let scaled_epsilon = epsilon / scale;
        let centers: Vec<(f64, f64)> = nodes
            .iter()
            .map(|p| ((p.x - origin.0) / scale, (p.y - origin.1) / scale))
            .collect();

        // [Φ + λI  P] [w]   [z]
        // [Pᵀ      0] [a] = [0]
        let m = if params.kernel.needs_polynomial() { n + 3 } else { n };
        let mut mat = vec![0.0_f64; m * m];
        let mut rhs = vec![0.0_f64; m];

        for i in 0..n {
            for j in 0..n {
                let r = distance(centers[i], centers[j]);
                mat[i * m + j] = params.kernel.eval(r, scaled_epsilon);
            }
            mat[i * m + i] += params.smoothing;
            rhs[i] = nodes[i].value;
        }

        if m > n {
            for (i, &(u, v)) in centers.iter().enumerate() {
                mat[i * m + n] = 1.0;
                mat[i * m + n + 1] = u;
                mat[i * m + n + 2] = v;
                mat[n * m + i] = 1.0;
                mat[(n + 1) * m + i] = u;
                mat[(n + 2) * m + i] = v;
            }
        }

        let solution = gauss_solve(m, &mut mat, &mut rhs)?;
        if !(solution.pivot_ratio <= params.max_condition) {
            return Err(Error::Interpolation(format!(
                "ill-conditioned point set: condition estimate {:.3e} exceeds {:.3e}",
                solution.pivot_ratio, params.max_condition
            )));
        }

        debug!(
            label = %points.label,
            nodes = n,
            dropped,
            epsilon,
            condition = solution.pivot_ratio,
            "fitted RBF surface"
        );

        let poly = (m > n).then(|| [solution.x[n], solution.x[n + 1], solution.x[n + 2]]);
        let mut weights = solution.x;
        weights.truncate(n);

        Ok(Self {
            label: points.label.clone(),
            nodes,
            centers,
            weights,
            poly,
            kernel: params.kernel,
            epsilon,
            scaled_epsilon,
            origin,
            scale,
            bounds,
            margin: params.extent_margin.max(0.0),
            clip: params.clip_to_extent,
        })
    }

    /// Estimate at (x, y). Pure; evaluates anywhere, including extrapolation.
    pub fn query(&self, x: f64, y: f64) -> f64 {
        let q = ((x - self.origin.0) / self.scale, (y - self.origin.1) / self.scale);
        let mut val = match self.poly {
            Some([a1, a2, a3]) => a1 + a2 * q.0 + a3 * q.1,
            None => 0.0,
        };
        for (&c, w) in self.centers.iter().zip(&self.weights) {
            val += w * self.kernel.eval(distance(c, q), self.scaled_epsilon);
        }
        val
    }

    /// Estimate at (x, y), refusing coordinates beyond the training extent
    pub fn query_checked(&self, x: f64, y: f64) -> Result<f64> {
        if !self.covers(x, y) {
            return Err(Error::coverage(
                format!("query ({x}, {y})"),
                format!(
                    "outside the extent of point set '{}' ({:?} + {} margin)",
                    self.label, self.bounds, self.margin
                ),
            ));
        }
        Ok(self.query(x, y))
    }

    /// Whether (x, y) lies within the training bounding box plus margin
    pub fn covers(&self, x: f64, y: f64) -> bool {
        let (min_x, min_y, max_x, max_y) = self.bounds;
        x >= min_x - self.margin
            && x <= max_x + self.margin
            && y >= min_y - self.margin
            && y <= max_y + self.margin
    }

    /// Evaluate at every cell centre of a grid, row-parallel
    pub fn to_grid(&self, rows: usize, cols: usize, transform: &GeoTransform) -> Result<Raster<f64>> {
        let data: Vec<f64> = (0..rows)
            .into_par_iter()
            .flat_map(|row| {
                let mut row_data = vec![f64::NAN; cols];
                for (col, cell) in row_data.iter_mut().enumerate() {
                    let (x, y) = transform.pixel_to_geo(col, row);
                    if self.clip && !self.covers(x, y) {
                        continue;
                    }
                    *cell = self.query(x, y);
                }
                row_data
            })
            .collect();

        let mut output = Raster::from_vec(data, rows, cols)?;
        output.set_transform(*transform);
        output.set_nodata(Some(f64::NAN));
        Ok(output)
    }

    /// Evaluate on the grid of an existing raster, keeping its CRS
    pub fn to_grid_like(&self, template: &Raster<f64>) -> Result<Raster<f64>> {
        let (rows, cols) = template.shape();
        let mut output = self.to_grid(rows, cols, template.transform())?;
        output.set_crs(template.crs().cloned());
        Ok(output)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Training nodes after filtering and duplicate merging
    pub fn nodes(&self) -> &[SamplePoint] {
        &self.nodes
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn kernel(&self) -> RbfKernel {
        self.kernel
    }

    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.bounds
    }
}

/// Sort by (x, y, value) and collapse points within `tol` of an earlier one.
fn deduplicate(
    mut points: Vec<SamplePoint>,
    policy: DuplicatePolicy,
    tol: f64,
) -> Result<Vec<SamplePoint>> {
    points.sort_by(|a, b| {
        a.x.total_cmp(&b.x)
            .then(a.y.total_cmp(&b.y))
            .then(a.value.total_cmp(&b.value))
    });

    let tol_sq = tol.max(0.0).powi(2);
    // (representative, value sum, count)
    let mut groups: Vec<(SamplePoint, f64, usize)> = Vec::with_capacity(points.len());

    for p in points {
        match groups
            .iter_mut()
            .find(|(rep, _, _)| rep.dist_sq(p.x, p.y) <= tol_sq)
        {
            Some((rep, sum, count)) => {
                if policy == DuplicatePolicy::Reject {
                    return Err(Error::Interpolation(format!(
                        "duplicate points at ({}, {}) and ({}, {})",
                        rep.x, rep.y, p.x, p.y
                    )));
                }
                *sum += p.value;
                *count += 1;
            }
            None => groups.push((p, p.value, 1)),
        }
    }

    Ok(groups
        .into_iter()
        .map(|(rep, sum, count)| SamplePoint::new(rep.x, rep.y, sum / count as f64))
        .collect())
}

#[inline]
fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

fn bounding_box(points: &[SamplePoint]) -> (f64, f64, f64, f64) {
    points.iter().fold(
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        |(min_x, min_y, max_x, max_y), p| {
            (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y))
        },
    )
}

/// `(∏ nonzero bbox edges / n)^(1/d)`, 1.0 when the box is a single point
fn average_spacing(points: &[SamplePoint], bounds: (f64, f64, f64, f64)) -> f64 {
    let edges: Vec<f64> = [bounds.2 - bounds.0, bounds.3 - bounds.1]
        .into_iter()
        .filter(|e| *e > 0.0)
        .collect();
    if edges.is_empty() {
        return 1.0;
    }
    let product: f64 = edges.iter().product();
    (product / points.len() as f64).powf(1.0 / edges.len() as f64)
}

fn collinear(points: &[SamplePoint]) -> bool {
    let a = points[0];
    let Some(b) = points
        .iter()
        .skip(1)
        .max_by(|p, q| p.dist_sq(a.x, a.y).total_cmp(&q.dist_sq(a.x, a.y)))
    else {
        return true;
    };
    let ab = b.dist(a.x, a.y);
    if ab == 0.0 {
        return true;
    }
    // Largest distance from the line a-b, relative to |ab|
    points.iter().all(|p| {
        let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
        (cross / ab).abs() <= 1e-9 * ab
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn survey() -> SparsePointSet {
        SparsePointSet::new(
            "magnetic",
            vec![
                SamplePoint::new(0.0, 0.0, 12.0),
                SamplePoint::new(400.0, 50.0, 62.0),
                SamplePoint::new(120.0, 380.0, -8.0),
                SamplePoint::new(350.0, 420.0, 122.0),
                SamplePoint::new(200.0, 200.0, 102.0),
                SamplePoint::new(60.0, 240.0, 7.0),
            ],
        )
    }

    #[test]
    fn test_exact_at_training_points() {
        for kernel in [
            RbfKernel::Multiquadric,
            RbfKernel::InverseMultiquadric,
            RbfKernel::Gaussian,
            RbfKernel::Linear,
            RbfKernel::Cubic,
            RbfKernel::ThinPlate,
        ] {
            let params = RbfParams {
                kernel,
                ..Default::default()
            };
            let rbf = RbfInterpolator::build(&survey(), params).unwrap();
            for p in &survey().points {
                assert_relative_eq!(rbf.query(p.x, p.y), p.value, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_smoothing_departs_from_data() {
        let params = RbfParams {
            smoothing: 10.0,
            ..Default::default()
        };
        let rbf = RbfInterpolator::build(&survey(), params).unwrap();
        let p = survey().points[4];
        assert!((rbf.query(p.x, p.y) - p.value).abs() > 1e-3);
    }

    #[test]
    fn test_thin_plate_reproduces_plane() {
        let pts: Vec<SamplePoint> = [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0), (4.0, 6.0)]
            .iter()
            .map(|&(x, y)| SamplePoint::new(x, y, 2.0 * x - y + 5.0))
            .collect();
        let params = RbfParams {
            kernel: RbfKernel::ThinPlate,
            ..Default::default()
        };
        let rbf = RbfInterpolator::build(&SparsePointSet::new("plane", pts), params).unwrap();
        assert_relative_eq!(rbf.query(7.0, 3.0), 16.0, epsilon = 1e-8);
    }

    #[test]
    fn test_default_epsilon_is_average_spacing() {
        let rbf = RbfInterpolator::build(&survey(), RbfParams::default()).unwrap();
        // bbox 400 x 420, 6 points
        assert_relative_eq!(rbf.epsilon(), (400.0_f64 * 420.0 / 6.0).sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_duplicates_merged_order_independent() {
        let a = SparsePointSet::new(
            "cu",
            vec![
                SamplePoint::new(0.0, 0.0, 1.0),
                SamplePoint::new(10.0, 0.0, 2.0),
                SamplePoint::new(0.0, 0.0, 3.0),
                SamplePoint::new(0.0, 10.0, 4.0),
            ],
        );
        let mut b = a.clone();
        b.points.reverse();

        let ra = RbfInterpolator::build(&a, RbfParams::default()).unwrap();
        let rb = RbfInterpolator::build(&b, RbfParams::default()).unwrap();
        assert_eq!(ra.nodes().len(), 3);
        assert_relative_eq!(ra.query(0.0, 0.0), 2.0, epsilon = 1e-8);
        assert_eq!(ra.query(3.0, 4.0).to_bits(), rb.query(3.0, 4.0).to_bits());
    }

    #[test]
    fn test_duplicates_rejected() {
        let set = SparsePointSet::new(
            "cu",
            vec![SamplePoint::new(1.0, 1.0, 1.0), SamplePoint::new(1.0, 1.0, 2.0)],
        );
        let params = RbfParams {
            duplicate_policy: DuplicatePolicy::Reject,
            ..Default::default()
        };
        assert!(matches!(
            RbfInterpolator::build(&set, params),
            Err(Error::Interpolation(_))
        ));
    }

    #[test]
    fn test_collinear_thin_plate_rejected() {
        let pts = (0..5).map(|i| SamplePoint::new(i as f64, 2.0 * i as f64, 1.0)).collect();
        let params = RbfParams {
            kernel: RbfKernel::ThinPlate,
            ..Default::default()
        };
        assert!(matches!(
            RbfInterpolator::build(&SparsePointSet::new("line", pts), params),
            Err(Error::Interpolation(_))
        ));
    }

    #[test]
    fn test_empty_after_filtering() {
        let set = SparsePointSet::new("mag", vec![SamplePoint::new(0.0, 0.0, f64::NAN)]);
        assert!(matches!(
            RbfInterpolator::build(&set, RbfParams::default()),
            Err(Error::Interpolation(_))
        ));
    }

    #[test]
    fn test_single_point_is_constant() {
        let set = SparsePointSet::new("mag", vec![SamplePoint::new(5.0, 5.0, 42.0)]);
        let rbf = RbfInterpolator::build(&set, RbfParams::default()).unwrap();
        assert_relative_eq!(rbf.query(5.0, 5.0), 42.0, epsilon = 1e-12);
    }

    #[test]
    fn test_query_checked_coverage() {
        let params = RbfParams {
            extent_margin: 50.0,
            ..Default::default()
        };
        let rbf = RbfInterpolator::build(&survey(), params).unwrap();
        assert!(rbf.query_checked(-40.0, 100.0).is_ok());
        assert!(matches!(
            rbf.query_checked(-60.0, 100.0),
            Err(Error::Coverage { .. })
        ));
    }

    #[test]
    fn test_to_grid_clip() {
        let params = RbfParams {
            clip_to_extent: true,
            ..Default::default()
        };
        let rbf = RbfInterpolator::build(&survey(), params).unwrap();
        // 10 x 10 grid of 50 m cells from (0, 500): last column centres at x = 475
        let gt = GeoTransform::new(0.0, 500.0, 50.0, -50.0);
        let grid = rbf.to_grid(10, 10, &gt).unwrap();
        assert!(grid.get(5, 2).unwrap().is_finite());
        assert!(grid.get(5, 9).unwrap().is_nan());
        assert!(grid.get(0, 0).unwrap().is_nan());
    }
}
