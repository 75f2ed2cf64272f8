//! Dense linear solver shared by the RBF and trend-surface fits

use terraf_core::{Error, Result};

/// Solution of a dense system plus a cheap conditioning estimate
#[derive(Debug, Clone)]
pub(crate) struct Solution {
    pub x: Vec<f64>,
    /// Ratio of the largest to the smallest absolute pivot
    pub pivot_ratio: f64,
}

/// Solve `A x = b` (row-major `n x n`) by Gaussian elimination with
/// partial pivoting. `mat` and `rhs` are overwritten.
///
/// A pivot below `1e-14` times the largest entry of `A` is treated as
/// singular.
pub(crate) fn gauss_solve(n: usize, mat: &mut [f64], rhs: &mut [f64]) -> Result<Solution> {
    let scale = mat.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(f64::MIN_POSITIVE);
    let singular = 1e-14 * scale;

    let mut max_pivot = 0.0_f64;
    let mut min_pivot = f64::INFINITY;

    for col in 0..n {
        let mut max_val = mat[col * n + col].abs();
        let mut max_row = col;
        for row in (col + 1)..n {
            let val = mat[row * n + col].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }

        if !(max_val > singular) {
            return Err(Error::Interpolation(
                "ill-conditioned point set: singular system (collinear or duplicate points)".into(),
            ));
        }
        max_pivot = max_pivot.max(max_val);
        min_pivot = min_pivot.min(max_val);

        if max_row != col {
            for j in 0..n {
                mat.swap(col * n + j, max_row * n + j);
            }
            rhs.swap(col, max_row);
        }

        let pivot = mat[col * n + col];
        for row in (col + 1)..n {
            let factor = mat[row * n + col] / pivot;
            mat[row * n + col] = 0.0;
            for j in (col + 1)..n {
                mat[row * n + j] -= factor * mat[col * n + j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = vec![0.0_f64; n];
    for col in (0..n).rev() {
        let mut sum = rhs[col];
        for j in (col + 1)..n {
            sum -= mat[col * n + j] * x[j];
        }
        x[col] = sum / mat[col * n + col];
    }

    let pivot_ratio = if n == 0 { 1.0 } else { max_pivot / min_pivot };
    Ok(Solution { x, pivot_ratio })
}
