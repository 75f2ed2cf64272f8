//! Multi-index spectral similarity and point-derived scores

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use terraf_core::raster::{IndexStack, Raster};
use terraf_core::vector::ReferenceSite;
use terraf_core::{Error, Result};
use tracing::debug;

use super::gaussian::{score_raster, TargetDistribution};
use crate::grid_ops::{build_output, check_dimensions, is_nodata_f64};
use crate::interpolation::RbfInterpolator;
use crate::maybe_rayon::*;
use crate::signature::SpectralSignature;

/// Relative weight of each spectral index, normalised to sum 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct IndexWeights(BTreeMap<String, f64>);

impl IndexWeights {
    /// Normalise raw scores (e.g. discrimination usefulness) into weights.
    ///
    /// Scores must be finite and non-negative with a positive sum.
    pub fn from_scores(scores: BTreeMap<String, f64>) -> Result<Self> {
        if let Some((name, v)) = scores.iter().find(|(_, v)| !(v.is_finite() && **v >= 0.0)) {
            return Err(Error::config(
                "index_weights",
                format!("weight for '{name}' must be finite and >= 0, got {v}"),
            ));
        }
        let total: f64 = scores.values().sum();
        if !(total > 0.0) {
            return Err(Error::config("index_weights", "weights must have a positive sum"));
        }
        Ok(Self(scores.into_iter().map(|(k, v)| (k, v / total)).collect()))
    }

    /// Equal weight for each name
    pub fn uniform<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        Self::from_scores(names.into_iter().map(|n| (n.to_string(), 1.0)).collect())
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<BTreeMap<String, f64>> for IndexWeights {
    type Error = Error;

    fn try_from(value: BTreeMap<String, f64>) -> Result<Self> {
        Self::from_scores(value)
    }
}

impl From<IndexWeights> for BTreeMap<String, f64> {
    fn from(value: IndexWeights) -> Self {
        value.0
    }
}

/// Weighted per-index Gaussian similarity to the signature.
///
/// Cells where some indices are no-data use the renormalised weights of the
/// finite ones; cells with no finite index are no-data.
///
/// # Errors
/// `Error::Config` when a weighted index is missing from the stack or the
/// signature.
pub fn spectral_similarity(
    stack: &IndexStack,
    signature: &SpectralSignature,
    weights: &IndexWeights,
    std_floor: f64,
) -> Result<Raster<f64>> {
    let mut layers: Vec<(f64, Raster<f64>)> = Vec::with_capacity(weights.len());
    for (name, w) in weights.iter() {
        let raster = stack.require(name)?;
        let sig = signature.get(name).ok_or_else(|| {
            Error::config("index_weights", format!("index '{name}' is not in the signature"))
        })?;
        let target = TargetDistribution::from_signature(sig, std_floor);
        debug!(index = name, weight = w, mean = target.mean, std = target.std, "scoring index");
        layers.push((w, score_raster(raster, target)?));
    }

    let Some((_, template)) = layers.first() else {
        return Err(Error::config("index_weights", "no index weights given"));
    };
    let (rows, cols) = template.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let mut sum = 0.0;
                let mut wsum = 0.0;
                for (w, layer) in &layers {
                    let s = unsafe { layer.get_unchecked(row, col) };
                    if s.is_finite() {
                        sum += w * s;
                        wsum += w;
                    }
                }
                if wsum > 0.0 {
                    row_data[col] = (sum / wsum).clamp(0.0, 1.0);
                }
            }
            row_data
        })
        .collect();

    build_output(template, rows, cols, data)
}

/// Rescale the valid cells to [0, 1]; a constant raster maps to 0.5
pub fn minmax_score(raster: &Raster<f64>) -> Result<Raster<f64>> {
    let stats = raster.statistics();
    let (rows, cols) = raster.shape();
    let nodata = raster.nodata();
    let (min, max) = (stats.min.unwrap_or(0.0), stats.max.unwrap_or(0.0));
    let range = max - min;

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let v = unsafe { raster.get_unchecked(row, col) };
                if is_nodata_f64(v, nodata) {
                    continue;
                }
                row_data[col] = if range > 0.0 { (v - min) / range } else { 0.5 };
            }
            row_data
        })
        .collect();

    build_output(raster, rows, cols, data)
}

/// Similarity of a gridded surface to its interpolated values at the
/// reference sites (mean and population std across sites).
pub fn site_similarity_score(
    grid: &Raster<f64>,
    interpolator: &RbfInterpolator,
    sites: &[ReferenceSite],
    std_floor: f64,
) -> Result<Raster<f64>> {
    let at_sites: Vec<f64> = sites
        .iter()
        .map(|s| interpolator.query(s.location.x, s.location.y))
        .collect();
    let target = TargetDistribution::from_values(&at_sites, std_floor).ok_or_else(|| {
        Error::config(
            "sites",
            format!("no reference site value for point set '{}'", interpolator.label()),
        )
    })?;
    debug!(label = interpolator.label(), mean = target.mean, std = target.std, "site target");
    score_raster(grid, target)
}

/// Similarity of a gridded surface to its own values at the cells holding
/// the reference sites. Sites off the grid or on no-data cells are skipped.
pub fn surface_site_similarity_score(
    grid: &Raster<f64>,
    sites: &[ReferenceSite],
    label: &str,
    std_floor: f64,
) -> Result<Raster<f64>> {
    let (rows, cols) = grid.shape();
    let at_sites: Vec<f64> = sites
        .iter()
        .filter_map(|s| {
            let (col, row) = grid.geo_to_pixel(s.location.x, s.location.y);
            if !(row >= 0.0 && col >= 0.0) {
                return None;
            }
            let (row, col) = (row.floor() as usize, col.floor() as usize);
            if row >= rows || col >= cols {
                return None;
            }
            let v = grid.get(row, col).ok()?;
            (!is_nodata_f64(v, grid.nodata())).then_some(v)
        })
        .collect();
    let target = TargetDistribution::from_values(&at_sites, std_floor).ok_or_else(|| {
        Error::config("sites", format!("no reference site falls on valid '{label}' cells"))
    })?;
    debug!(label, mean = target.mean, std = target.std, "site target on grid");
    score_raster(grid, target)
}

/// Cell-wise mean of several score rasters; no-data in any input → no-data
pub fn combine_scores(rasters: &[&Raster<f64>]) -> Result<Raster<f64>> {
    let Some((first, rest)) = rasters.split_first() else {
        return Err(Error::config("scores", "no score rasters to combine"));
    };
    for r in rest {
        check_dimensions(first, r)?;
    }

    let (rows, cols) = first.shape();
    let n = rasters.len() as f64;
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            'cols: for col in 0..cols {
                let mut sum = 0.0;
                for r in rasters {
                    let v = unsafe { r.get_unchecked(row, col) };
                    if is_nodata_f64(v, r.nodata()) {
                        continue 'cols;
                    }
                    sum += v;
                }
                row_data[col] = sum / n;
            }
            row_data
        })
        .collect();

    build_output(first, rows, cols, data)
}
