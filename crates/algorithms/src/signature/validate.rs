//! How well a signature stands out from the scene

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use terraf_core::raster::IndexStack;
use terraf_core::{Error, Result};

use super::SpectralSignature;
use crate::statistics::percentile_of_score;

/// Where the reference mean falls in the scene-wide distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Discrimination {
    VeryLow,
    Low,
    MediumLow,
    Neutral,
    MediumHigh,
    High,
    VeryHigh,
}

impl Discrimination {
    /// Classify a percentile rank, most extreme classes first
    pub fn from_percentile(p: f64) -> Self {
        if p > 90.0 {
            Discrimination::VeryHigh
        } else if p < 10.0 {
            Discrimination::VeryLow
        } else if p > 75.0 {
            Discrimination::High
        } else if p < 25.0 {
            Discrimination::Low
        } else if p > 60.0 {
            Discrimination::MediumHigh
        } else if p < 40.0 {
            Discrimination::MediumLow
        } else {
            Discrimination::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexValidation {
    /// Percentile rank of the signature mean among all valid scene cells
    pub percentile: f64,
    pub discrimination: Discrimination,
    /// `|percentile − 50| / 50`, 0 = indistinguishable, 1 = extreme
    pub usefulness: f64,
}

/// Rank each signature mean within the scene-wide index distribution.
///
/// Indices of the signature missing from `stack` are a `Error::Config`;
/// indices without valid cells are skipped.
pub fn validate_signature(
    stack: &IndexStack,
    signature: &SpectralSignature,
) -> Result<BTreeMap<String, IndexValidation>> {
    let mut out = BTreeMap::new();
    for (name, sig) in &signature.indices {
        let raster = stack.require(name)?;
        let Some(percentile) = percentile_of_score(&raster.valid_values(), sig.mean()) else {
            continue;
        };
        out.insert(
            name.clone(),
            IndexValidation {
                percentile,
                discrimination: Discrimination::from_percentile(percentile),
                usefulness: (percentile - 50.0).abs() / 50.0,
            },
        );
    }
    if out.is_empty() && !signature.indices.is_empty() {
        return Err(Error::config("stack", "no index has valid cells to validate against"));
    }
    Ok(out)
}
