//! Small helpers shared by the raster-producing algorithms

use ndarray::Array2;
use terraf_core::raster::{Raster, RasterElement};
use terraf_core::{Error, Result};

/// NaN, infinities and the raster's declared no-data value are all no-data.
/// Same rule as [`RasterElement::is_nodata`], which labeling relies on.
#[inline]
pub(crate) fn is_nodata_f64(value: f64, nodata: Option<f64>) -> bool {
    value.is_nodata(nodata)
}

pub(crate) fn check_dimensions(a: &Raster<f64>, b: &Raster<f64>) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(Error::SizeMismatch {
            er: a.rows(),
            ec: a.cols(),
            ar: b.rows(),
            ac: b.cols(),
        });
    }
    Ok(())
}

/// Wrap row-major cell values in a raster georeferenced like `template`,
/// with NaN as no-data
pub(crate) fn build_output(
    template: &Raster<f64>,
    rows: usize,
    cols: usize,
    data: Vec<f64>,
) -> Result<Raster<f64>> {
    let mut output = template.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nodata_rule_matches_raster() {
        let nd = Some(1.0);
        let near = 1.0 + 10.0 * f64::EPSILON;
        assert!(is_nodata_f64(near, nd));
        assert_eq!(is_nodata_f64(near, nd), near.is_nodata(nd));

        let mut r = Raster::from_vec(vec![near, 0.5], 1, 2).unwrap();
        r.set_nodata(nd);
        for col in 0..2 {
            let v = r.get(0, col).unwrap();
            assert_eq!(is_nodata_f64(v, r.nodata()), v.is_nodata(r.nodata()));
        }
        assert!(!is_nodata_f64(0.5, nd));
        assert!(is_nodata_f64(f64::INFINITY, None));
    }
}
