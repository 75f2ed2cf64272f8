//! Regional trend surfaces
//!
//! The regional field is modelled as a low-order polynomial in x and y,
//! fitted by ordinary least squares through the normal equations
//! `(XᵀX)β = Xᵀz`. Subtracting it leaves the residual (local) anomaly.

use serde::{Deserialize, Serialize};
use terraf_core::vector::{SamplePoint, SparsePointSet};
use terraf_core::{Error, Result};

use crate::interpolation::solve::gauss_solve;

/// Polynomial order of the regional surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendOrder {
    /// `β₀ + β₁x + β₂y`
    Linear,
    /// Linear terms plus `x², xy, y²`
    #[default]
    Quadratic,
}

impl TrendOrder {
    fn n_terms(self) -> usize {
        match self {
            TrendOrder::Linear => 3,
            TrendOrder::Quadratic => 6,
        }
    }
}

/// Fitted polynomial trend surface
#[derive(Debug, Clone, PartialEq)]
pub struct TrendSurface {
    pub order: TrendOrder,
    /// Coefficients over centred, scaled coordinates
    pub coefficients: Vec<f64>,
    origin: (f64, f64),
    scale: f64,
}

impl TrendSurface {
    /// Least-squares fit to the finite points of `points`
    pub fn fit(points: &[SamplePoint], order: TrendOrder) -> Result<Self> {
        let pts: Vec<SamplePoint> = points
            .iter()
            .filter(|p| p.x.is_finite() && p.y.is_finite() && p.value.is_finite())
            .copied()
            .collect();
        let k = order.n_terms();
        if pts.len() < k {
            return Err(Error::Interpolation(format!(
                "{order:?} trend needs at least {k} points, got {}",
                pts.len()
            )));
        }

        let (min_x, min_y, max_x, max_y) = pts.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(a, b, c, d), p| (a.min(p.x), b.min(p.y), c.max(p.x), d.max(p.y)),
        );
        let origin = ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);
        let scale = (max_x - min_x).max(max_y - min_y).max(1.0);

        let mut surface = Self {
            order,
            coefficients: Vec::new(),
            origin,
            scale,
        };

        // Accumulate XᵀX and Xᵀz
        let mut mat = vec![0.0_f64; k * k];
        let mut rhs = vec![0.0_f64; k];
        for p in &pts {
            let row = surface.design_row(p.x, p.y);
            for i in 0..k {
                rhs[i] += row[i] * p.value;
                for j in 0..k {
                    mat[i * k + j] += row[i] * row[j];
                }
            }
        }

        surface.coefficients = gauss_solve(k, &mut mat, &mut rhs)?.x;
        Ok(surface)
    }

    fn design_row(&self, x: f64, y: f64) -> [f64; 6] {
        let u = (x - self.origin.0) / self.scale;
        let v = (y - self.origin.1) / self.scale;
        [1.0, u, v, u * u, u * v, v * v]
    }

    /// Regional field value at (x, y)
    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        self.design_row(x, y)
            .iter()
            .zip(&self.coefficients)
            .map(|(t, c)| t * c)
            .sum()
    }
}

/// Subtract the fitted regional trend, returning the surface and the
/// residual anomaly point set (non-finite points are dropped).
pub fn remove_regional_trend(
    points: &SparsePointSet,
    order: TrendOrder,
) -> Result<(TrendSurface, SparsePointSet)> {
    let surface = TrendSurface::fit(&points.points, order)?;
    let residual = points
        .finite_points()
        .into_iter()
        .map(|p| SamplePoint::new(p.x, p.y, p.value - surface.evaluate(p.x, p.y)))
        .collect();
    Ok((
        surface,
        SparsePointSet::new(format!("{}_residual", points.label), residual),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid_points(f: impl Fn(f64, f64) -> f64) -> SparsePointSet {
        let mut pts = Vec::new();
        for i in 0..6 {
            for j in 0..6 {
                let (x, y) = (500_000.0 + i as f64 * 100.0, 2_800_000.0 + j as f64 * 100.0);
                pts.push(SamplePoint::new(x, y, f(x, y)));
            }
        }
        SparsePointSet::new("magnetic", pts)
    }

    #[test]
    fn test_quadratic_trend_removed_exactly() {
        let field = |x: f64, y: f64| {
            let (u, v) = ((x - 500_000.0) / 100.0, (y - 2_800_000.0) / 100.0);
            48_000.0 + 3.0 * u - 2.0 * v + 0.5 * u * u + 0.25 * u * v
        };
        let (surface, residual) = remove_regional_trend(&grid_points(field), TrendOrder::Quadratic).unwrap();

        assert_eq!(residual.label, "magnetic_residual");
        for p in &residual.points {
            assert!(p.value.abs() < 1e-6, "residual {}", p.value);
        }
        assert_relative_eq!(surface.evaluate(500_250.0, 2_800_100.0), field(500_250.0, 2_800_100.0), epsilon = 1e-5);
    }

    #[test]
    fn test_linear_trend_leaves_curvature() {
        let field = |x: f64, _y: f64| ((x - 500_250.0) / 100.0).powi(2);
        let (_, residual) = remove_regional_trend(&grid_points(field), TrendOrder::Linear).unwrap();
        assert!(residual.points.iter().any(|p| p.value.abs() > 1.0));
    }

    #[test]
    fn test_too_few_points() {
        let set = SparsePointSet::new("mag", vec![SamplePoint::new(0.0, 0.0, 1.0); 4]);
        assert!(matches!(
            remove_regional_trend(&set, TrendOrder::Quadratic),
            Err(Error::Interpolation(_))
        ));
    }
}
