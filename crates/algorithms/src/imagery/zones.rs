//! Anomaly zones: cells beyond a percentile of an index

use serde::{Deserialize, Serialize};
use terraf_core::raster::Raster;
use terraf_core::{Error, Result};

use super::AlterationIndex;
use crate::grid_ops::{build_output, check_dimensions, is_nodata_f64};
use crate::maybe_rayon::*;
use crate::statistics::percentile;

/// Which tail of the distribution is anomalous
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyDirection {
    Above,
    Below,
}

impl AlterationIndex {
    /// Conventional anomaly cut-off for this index, if it maps a zone
    pub fn default_zone(self) -> Option<(f64, AnomalyDirection)> {
        use AnomalyDirection::*;
        match self {
            AlterationIndex::Cmr | AlterationIndex::Clay => Some((85.0, Above)),
            AlterationIndex::FeO | AlterationIndex::Gossan => Some((80.0, Above)),
            AlterationIndex::Propylitic => Some((75.0, Above)),
            AlterationIndex::Carbonate => Some((30.0, Below)),
            AlterationIndex::GossanComposite | AlterationIndex::Ai => Some((90.0, Above)),
            _ => None,
        }
    }
}

/// Mask of anomalous cells: 1.0 inside the zone, 0.0 outside, NaN no-data.
///
/// The threshold is the `percentile` of the finite, strictly positive cells;
/// membership is strict (`>` for `Above`, `<` for `Below`). A raster with no
/// positive cells yields an all-zero mask.
pub fn anomaly_zone(
    raster: &Raster<f64>,
    percentile_value: f64,
    direction: AnomalyDirection,
) -> Result<Raster<f64>> {
    if !(0.0..=100.0).contains(&percentile_value) {
        return Err(Error::InvalidParameter {
            name: "percentile",
            value: percentile_value.to_string(),
            reason: "must be in [0, 100]".into(),
        });
    }

    let positive: Vec<f64> = raster.valid_values().into_iter().filter(|&v| v > 0.0).collect();
    let threshold = percentile(&positive, percentile_value);

    let (rows, cols) = raster.shape();
    let nodata = raster.nodata();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let v = unsafe { raster.get_unchecked(row, col) };
                if is_nodata_f64(v, nodata) {
                    continue;
                }
                let inside = match (threshold, direction) {
                    (None, _) => false,
                    (Some(t), AnomalyDirection::Above) => v > t,
                    (Some(t), AnomalyDirection::Below) => v < t,
                };
                row_data[col] = if inside { 1.0 } else { 0.0 };
            }
            row_data
        })
        .collect();

    build_output(raster, rows, cols, data)
}

/// Cells inside every mask (1.0), e.g. argillic ∩ oxide ∩ alteration zones
pub fn coincident_zones(masks: &[&Raster<f64>]) -> Result<Raster<f64>> {
    let Some((first, rest)) = masks.split_first() else {
        return Err(Error::config("masks", "at least one zone mask is required"));
    };
    for m in rest {
        check_dimensions(first, m)?;
    }

    let (rows, cols) = first.shape();
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let mut all = true;
                    for m in masks {
                        let v = unsafe { m.get_unchecked(row, col) };
                        if v.is_nan() {
                            return f64::NAN;
                        }
                        all &= v > 0.5;
                    }
                    if all { 1.0 } else { 0.0 }
                })
                .collect::<Vec<_>>()
        })
        .collect();

    build_output(first, rows, cols, data)
}

/// Area of a zone mask in km²
pub fn zone_area_km2(mask: &Raster<f64>) -> f64 {
    let cells = mask.data().iter().filter(|&&v| v > 0.5).count();
    cells as f64 * mask.pixel_area() / 1e6
}
