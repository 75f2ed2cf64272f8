//! Weighted fusion of score rasters

use terraf_core::raster::Raster;
use terraf_core::{Error, Result};
use tracing::debug;

use super::weights::{FusionWeights, ScoreSet};
use crate::grid_ops::{build_output, check_dimensions, is_nodata_f64};
use crate::maybe_rayon::*;

/// Weighted sum of the score rasters named in `weights`.
///
/// Weights are validated before any raster is read. A cell that is no-data
/// in any weighted input is no-data in the output. Weights may sum to 1.0
/// only within tolerance, so cells are clamped to [0, 1].
/// Rasters in `scores` that the weights do not name are ignored.
///
/// # Errors
/// - `Error::Config` for invalid weights or a weighted dimension missing
///   from `scores`
/// - `Error::SizeMismatch` if the weighted score rasters differ in shape
pub fn fuse(scores: &ScoreSet, weights: &FusionWeights) -> Result<Raster<f64>> {
    weights.validate()?;

    let layers: Vec<(f64, &Raster<f64>)> = weights
        .iter()
        .map(|(dim, w)| {
            scores.get(&dim).map(|r| (w, r)).ok_or_else(|| {
                Error::config("weights", format!("no {dim} score raster for a weighted dimension"))
            })
        })
        .collect::<Result<_>>()?;

    let template = layers[0].1;
    for (_, raster) in &layers[1..] {
        check_dimensions(template, raster)?;
    }

    let (rows, cols) = template.shape();
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            'cols: for col in 0..cols {
                let mut sum = 0.0;
                for (w, raster) in &layers {
                    let v = unsafe { raster.get_unchecked(row, col) };
                    if is_nodata_f64(v, raster.nodata()) {
                        continue 'cols;
                    }
                    sum += w * v;
                }
                row_data[col] = sum.clamp(0.0, 1.0);
            }
            row_data
        })
        .collect();

    debug!(weights = %weights, rows, cols, "fused score rasters");
    build_output(template, rows, cols, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prospectivity::Dimension;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn raster(values: Vec<f64>, rows: usize, cols: usize) -> Raster<f64> {
        Raster::from_vec(values, rows, cols).unwrap()
    }

    #[test]
    fn test_weighted_sum() {
        let mut scores = ScoreSet::new();
        scores.insert(Dimension::Spectral, raster(vec![1.0, 0.5, 0.0, f64::NAN], 2, 2));
        scores.insert(Dimension::Magnetic, raster(vec![0.0, 0.5, 1.0, 1.0], 2, 2));

        let out = fuse(&scores, &FusionWeights::default()).unwrap();
        assert_relative_eq!(out.get(0, 0).unwrap(), 0.9, epsilon = 1e-12);
        assert_relative_eq!(out.get(0, 1).unwrap(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(out.get(1, 0).unwrap(), 0.1, epsilon = 1e-12);
        assert!(out.get(1, 1).unwrap().is_nan());
    }

    #[test]
    fn test_bad_weights_before_rasters() {
        // Shapes disagree, but weight validation fails first
        let mut scores = ScoreSet::new();
        scores.insert(Dimension::Spectral, raster(vec![0.0; 4], 2, 2));
        scores.insert(Dimension::Magnetic, raster(vec![0.0; 6], 2, 3));
        let weights = FusionWeights::new([
            (Dimension::Spectral, 0.6),
            (Dimension::Magnetic, 0.3),
            (Dimension::Geochemical, 0.2),
        ]);
        assert!(matches!(fuse(&scores, &weights), Err(Error::Config { .. })));
    }

    #[test]
    fn test_missing_dimension() {
        let mut scores = ScoreSet::new();
        scores.insert(Dimension::Spectral, raster(vec![0.0; 4], 2, 2));
        assert!(matches!(
            fuse(&scores, &FusionWeights::default()),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let mut scores = ScoreSet::new();
        scores.insert(Dimension::Spectral, raster(vec![0.0; 4], 2, 2));
        scores.insert(Dimension::Magnetic, raster(vec![0.0; 6], 2, 3));
        assert!(matches!(
            fuse(&scores, &FusionWeights::default()),
            Err(Error::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_weight_sum_above_one_stays_bounded() {
        let mut scores = ScoreSet::new();
        scores.insert(Dimension::Spectral, raster(vec![1.0; 4], 2, 2));
        scores.insert(Dimension::Magnetic, raster(vec![1.0; 4], 2, 2));
        let weights = FusionWeights::new([(Dimension::Spectral, 0.5000004), (Dimension::Magnetic, 0.5000004)]);
        weights.validate().unwrap();

        let out = fuse(&scores, &weights).unwrap();
        assert!(out.data().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_unweighted_raster_is_ignored() {
        let mut scores = ScoreSet::new();
        scores.insert(Dimension::Spectral, raster(vec![0.2; 4], 2, 2));
        scores.insert(Dimension::Geochemical, raster(vec![0.0; 9], 3, 3));

        let out = fuse(&scores, &FusionWeights::new([(Dimension::Spectral, 1.0)])).unwrap();
        assert_eq!(out.shape(), (2, 2));
        assert_relative_eq!(out.get(1, 1).unwrap(), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_random_fusion_bounded_and_exact() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let rows = rng.gen_range(1..12);
            let cols = rng.gen_range(1..12);
            let mut scores = ScoreSet::new();
            for dim in Dimension::ALL {
                let values = (0..rows * cols).map(|_| rng.gen_range(0.0..=1.0)).collect();
                scores.insert(dim, raster(values, rows, cols));
            }
            let raw: Vec<f64> = (0..3).map(|_| rng.gen_range(0.0..1.0)).collect();
            // Sums anywhere inside the accepted tolerance around 1.0
            let total = raw.iter().sum::<f64>() / (1.0 + rng.gen_range(-9e-7..9e-7));
            let weights = FusionWeights::new(Dimension::ALL.into_iter().zip(raw.iter().map(|w| w / total)));
            weights.validate().unwrap();

            let out = fuse(&scores, &weights).unwrap();
            for row in 0..rows {
                for col in 0..cols {
                    let expected: f64 = weights
                        .iter()
                        .map(|(d, w)| w * scores[&d].get(row, col).unwrap())
                        .sum::<f64>()
                        .clamp(0.0, 1.0);
                    let v = out.get(row, col).unwrap();
                    assert!((0.0..=1.0).contains(&v));
                    assert_relative_eq!(v, expected, epsilon = 1e-12);
                }
            }
        }
    }
}
