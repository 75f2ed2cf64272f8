//! Gridded derivatives of a potential field (magnetometry)
//!
//! ```text
//! 3×3 window indexing:
//!
//!   z1 z2 z3      (NW) (N) (NE)
//!   z4 z5 z6  →   (W)  (C) (E)
//!   z7 z8 z9      (SW) (S) (SE)
//! ```
//!
//! Horizontal derivatives use Sobel weights, positive toward east (x) and
//! north (y). The first vertical derivative is approximated from the
//! 5-point Laplacian, `dz = −∇²T / 2`, per unit of cell size so it mixes
//! with the horizontal gradients in tilt angle and analytic signal.
//!
//! Border cells and cells with a no-data neighbor are no-data.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use terraf_core::raster::Raster;
use terraf_core::Result;

use crate::grid_ops::{build_output, is_nodata_f64};
use crate::maybe_rayon::*;

/// Below this total horizontal gradient the tilt angle divides by it instead
const MIN_GRADIENT: f64 = 1e-10;

/// Which gridded surface of the magnetic field gets scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagneticSurface {
    /// The interpolated field itself
    #[default]
    Field,
    /// Total horizontal gradient, `sqrt(dx² + dy²)`
    HorizontalGradient,
    VerticalDerivative,
    /// `atan(dz / THG)`, radians in (−π/2, π/2)
    TiltAngle,
    /// `sqrt(dx² + dy² + dz²)`
    AnalyticSignal,
}

impl MagneticSurface {
    pub const ALL: [MagneticSurface; 5] = [
        MagneticSurface::Field,
        MagneticSurface::HorizontalGradient,
        MagneticSurface::VerticalDerivative,
        MagneticSurface::TiltAngle,
        MagneticSurface::AnalyticSignal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MagneticSurface::Field => "field",
            MagneticSurface::HorizontalGradient => "horizontal_gradient",
            MagneticSurface::VerticalDerivative => "vertical_derivative",
            MagneticSurface::TiltAngle => "tilt_angle",
            MagneticSurface::AnalyticSignal => "analytic_signal",
        }
    }
}

impl fmt::Display for MagneticSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MagneticSurface {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|m| m.name()).collect();
                format!("unknown magnetic surface '{s}', expected one of {}", names.join(", "))
            })
    }
}

/// First derivatives of a gridded field and the products derived from them
#[derive(Debug, Clone)]
pub struct FieldDerivatives {
    pub dx: Raster<f64>,
    pub dy: Raster<f64>,
    pub dz: Raster<f64>,
    pub horizontal_gradient: Raster<f64>,
    pub tilt_angle: Raster<f64>,
    pub analytic_signal: Raster<f64>,
}

impl FieldDerivatives {
    /// The derived surface for `which`; `None` for [`MagneticSurface::Field`]
    pub fn surface(&self, which: MagneticSurface) -> Option<&Raster<f64>> {
        match which {
            MagneticSurface::Field => None,
            MagneticSurface::HorizontalGradient => Some(&self.horizontal_gradient),
            MagneticSurface::VerticalDerivative => Some(&self.dz),
            MagneticSurface::TiltAngle => Some(&self.tilt_angle),
            MagneticSurface::AnalyticSignal => Some(&self.analytic_signal),
        }
    }
}

/// (dx, dy, dz) at an interior cell, or `None` if the window touches no-data
#[inline]
fn window_derivatives(field: &Raster<f64>, row: usize, col: usize, cs_x: f64, cs_y: f64) -> Option<[f64; 3]> {
    let nodata = field.nodata();
    let mut z = [0.0; 9];
    for (k, (dr, dc)) in (0..3).flat_map(|r| (0..3).map(move |c| (r, c))).enumerate() {
        let v = unsafe { field.get_unchecked(row + dr - 1, col + dc - 1) };
        if is_nodata_f64(v, nodata) {
            return None;
        }
        z[k] = v;
    }
    let [z1, z2, z3, z4, z5, z6, z7, z8, z9] = z;

    let dx = ((z3 + 2.0 * z6 + z9) - (z1 + 2.0 * z4 + z7)) / (8.0 * cs_x);
    let dy = ((z1 + 2.0 * z2 + z3) - (z7 + 2.0 * z8 + z9)) / (8.0 * cs_y);
    let laplacian = z2 + z4 + z6 + z8 - 4.0 * z5;
    let dz = -laplacian / (2.0 * cs_x);
    Some([dx, dy, dz])
}

/// Horizontal and vertical derivatives, total horizontal gradient, tilt
/// angle and analytic signal of `field`.
pub fn field_derivatives(field: &Raster<f64>) -> Result<FieldDerivatives> {
    let (rows, cols) = field.shape();
    let cs_x = field.transform().pixel_width.abs();
    let cs_y = field.transform().pixel_height.abs();

    let cells: Vec<Option<[f64; 3]>> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![None; cols];
            if row == 0 || row + 1 >= rows {
                return row_data;
            }
            for col in 1..cols.saturating_sub(1) {
                row_data[col] = window_derivatives(field, row, col, cs_x, cs_y);
            }
            row_data
        })
        .collect();

    let component = |f: &dyn Fn([f64; 3]) -> f64| -> Vec<f64> {
        cells.iter().map(|c| c.map_or(f64::NAN, f)).collect()
    };
    let thg = |[dx, dy, _]: [f64; 3]| dx.hypot(dy);

    Ok(FieldDerivatives {
        dx: build_output(field, rows, cols, component(&|[dx, _, _]| dx))?,
        dy: build_output(field, rows, cols, component(&|[_, dy, _]| dy))?,
        dz: build_output(field, rows, cols, component(&|[_, _, dz]| dz))?,
        horizontal_gradient: build_output(field, rows, cols, component(&thg))?,
        tilt_angle: build_output(
            field,
            rows,
            cols,
            component(&|d| (d[2] / thg(d).max(MIN_GRADIENT)).atan()),
        )?,
        analytic_signal: build_output(
            field,
            rows,
            cols,
            component(&|[dx, dy, dz]| (dx * dx + dy * dy + dz * dz).sqrt()),
        )?,
    })
}

/// One surface of `field`: the field itself or one of its derivatives
pub fn magnetic_surface(field: &Raster<f64>, which: MagneticSurface) -> Result<Raster<f64>> {
    if which == MagneticSurface::Field {
        return Ok(field.clone());
    }
    let derivatives = field_derivatives(field)?;
    Ok(derivatives
        .surface(which)
        .cloned()
        .unwrap_or_else(|| field.clone()))
}
