//! Prospectivity classes for mapping

use serde::{Deserialize, Serialize};
use terraf_core::Result;
use terraf_core::raster::Raster;

use crate::grid_ops::{build_output, is_nodata_f64};
use crate::maybe_rayon::*;
use crate::statistics::percentile_sorted;

/// Class breaks at p50, p70 and p90 of the valid cells
const CLASS_PERCENTILES: [f64; 3] = [50.0, 70.0, 90.0];

/// Class codes: 0 background, 1 medium, 2 high, 3 very high
pub const CLASS_NAMES: [&str; 4] = ["background", "medium", "high", "very_high"];

/// Reclassify a prospectivity surface into four percentile classes.
///
/// A cell gets the number of breaks it strictly exceeds. No-data stays NaN,
/// and a surface with no valid cells comes back all NaN.
pub fn classify_prospectivity(raster: &Raster<f64>) -> Result<Raster<f64>> {
    let (rows, cols) = raster.shape();
    let nodata = raster.nodata();

    let mut sorted = raster.valid_values();
    sorted.sort_by(f64::total_cmp);
    let breaks: Vec<f64> = CLASS_PERCENTILES
        .iter()
        .filter_map(|&p| percentile_sorted(&sorted, p))
        .collect();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let v = unsafe { raster.get_unchecked(row, col) };
                if is_nodata_f64(v, nodata) {
                    continue;
                }
                row_data[col] = breaks.iter().filter(|&&b| v > b).count() as f64;
            }
            row_data
        })
        .collect();

    build_output(raster, rows, cols, data)
}

/// Area per prospectivity class, in hectares
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassAreas {
    pub background: f64,
    pub medium: f64,
    pub high: f64,
    pub very_high: f64,
}

impl ClassAreas {
    pub fn total(&self) -> f64 {
        self.background + self.medium + self.high + self.very_high
    }
}

/// Tally the cells of a classified raster into hectares
pub fn class_areas(classes: &Raster<f64>) -> ClassAreas {
    let mut counts = [0usize; 4];
    for v in classes.valid_values() {
        if let Some(slot) = counts.get_mut(v as usize) {
            *slot += 1;
        }
    }
    let ha = |n: usize| n as f64 * classes.pixel_area() / 10_000.0;
    ClassAreas {
        background: ha(counts[0]),
        medium: ha(counts[1]),
        high: ha(counts[2]),
        very_high: ha(counts[3]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use terraf_core::GeoTransform;

    fn ramp() -> Raster<f64> {
        // 0.0, 0.01, ..., 0.99
        let values: Vec<f64> = (0..100).map(|i| i as f64 / 100.0).collect();
        let mut r = Raster::from_vec(values, 10, 10).unwrap();
        r.set_transform(GeoTransform::new(0.0, 300.0, 30.0, -30.0));
        r
    }

    #[test]
    fn test_class_counts_on_ramp() {
        let classes = classify_prospectivity(&ramp()).unwrap();
        let count = |class: f64| classes.valid_values().iter().filter(|&&v| v == class).count();
        // Breaks at 0.495, 0.693, 0.891
        assert_eq!(count(0.0), 50);
        assert_eq!(count(1.0), 20);
        assert_eq!(count(2.0), 20);
        assert_eq!(count(3.0), 10);
    }

    #[test]
    fn test_nodata_preserved() {
        let mut r = ramp();
        r.set(0, 0, f64::NAN).unwrap();
        let classes = classify_prospectivity(&r).unwrap();
        assert!(classes.get(0, 0).unwrap().is_nan());
        assert_eq!(classes.valid_values().len(), 99);
    }

    #[test]
    fn test_constant_surface_is_background() {
        let classes = classify_prospectivity(&Raster::filled(4, 4, 0.7)).unwrap();
        assert!(classes.valid_values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_class_areas() {
        let classes = classify_prospectivity(&ramp()).unwrap();
        let areas = class_areas(&classes);
        // 900 m² per cell
        assert_relative_eq!(areas.background, 4.5, epsilon = 1e-12);
        assert_relative_eq!(areas.very_high, 0.9, epsilon = 1e-12);
        assert_relative_eq!(areas.total(), 9.0, epsilon = 1e-12);
    }
}
