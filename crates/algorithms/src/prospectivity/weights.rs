//! Evidence dimensions and fusion weights

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use terraf_core::raster::Raster;
use terraf_core::{Error, Result};

/// Tolerance on the sum of fusion weights
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// An independent line of evidence scored on the common grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Spectral,
    Magnetic,
    Geochemical,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Spectral, Dimension::Magnetic, Dimension::Geochemical];

    pub fn name(self) -> &'static str {
        match self {
            Dimension::Spectral => "spectral",
            Dimension::Magnetic => "magnetic",
            Dimension::Geochemical => "geochemical",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dimension {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Dimension::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::config("weights", format!("unknown dimension '{s}'")))
    }
}

/// Score rasters keyed by dimension
pub type ScoreSet = BTreeMap<Dimension, Raster<f64>>;

/// Non-negative weights per dimension summing to 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FusionWeights(BTreeMap<Dimension, f64>);

impl FusionWeights {
    pub fn new(weights: impl IntoIterator<Item = (Dimension, f64)>) -> Self {
        Self(weights.into_iter().collect())
    }

    /// Check every weight is finite and `>= 0`, the set is non-empty, and the
    /// sum is 1 within [`WEIGHT_SUM_TOLERANCE`]
    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(Error::config("weights", "at least one dimension weight is required"));
        }
        for (dim, w) in &self.0 {
            if !(w.is_finite() && *w >= 0.0) {
                return Err(Error::config(
                    "weights",
                    format!("weight for {dim} must be finite and >= 0, got {w}"),
                ));
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(Error::config(
                "weights",
                format!("weights must sum to 1.0 (±{WEIGHT_SUM_TOLERANCE}), got {sum}"),
            ));
        }
        Ok(())
    }

    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn get(&self, dim: Dimension) -> Option<f64> {
        self.0.get(&dim).copied()
    }

    pub fn dimensions(&self) -> impl Iterator<Item = Dimension> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Dimension, f64)> + '_ {
        self.0.iter().map(|(d, w)| (*d, *w))
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self::new([(Dimension::Spectral, 0.9), (Dimension::Magnetic, 0.1)])
    }
}

impl fmt::Display for FusionWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(d, w)| format!("{d}={w}")).collect();
        f.write_str(&parts.join(","))
    }
}

impl FromStr for FusionWeights {
    type Err = Error;

    /// Parse `spectral=0.6,magnetic=0.4`
    fn from_str(s: &str) -> Result<Self> {
        let mut map = BTreeMap::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = part.split_once('=').ok_or_else(|| {
                Error::config("weights", format!("expected dimension=weight, got '{part}'"))
            })?;
            let dim: Dimension = name.trim().parse()?;
            let w: f64 = value.trim().parse().map_err(|_| {
                Error::config("weights", format!("invalid weight '{}' for {dim}", value.trim()))
            })?;
            map.insert(dim, w);
        }
        Ok(Self(map))
    }
}
