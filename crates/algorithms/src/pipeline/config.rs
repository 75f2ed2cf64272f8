//! Run configuration

use serde::{Deserialize, Serialize};
use terraf_core::raster::Connectivity;
use terraf_core::{Error, Result};

use crate::geophysics::{MagneticSurface, TrendOrder};
use crate::interpolation::RbfParams;
use crate::prospectivity::{FusionWeights, RankingParams, TargetParams};
use crate::signature::SignatureParams;
use crate::similarity::IndexWeights;

/// How an interpolated point surface becomes a score raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointScoring {
    /// Rescale the interpolated surface to [0, 1]
    #[default]
    Minmax,
    /// Gaussian similarity to the interpolated values at the reference sites
    SiteSimilarity,
}

/// Everything a prospecting run can be tuned with.
///
/// Every field has a default, so a partial JSON document is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProspectingConfig {
    /// Sampling radius around each reference site (metres)
    pub neighborhood_radius_m: f64,
    pub weights: FusionWeights,
    /// Percentile of the prospectivity surface used as target threshold
    pub percentile_threshold: f64,
    pub min_area_ha: f64,
    pub std_floor: f64,
    pub connectivity: Connectivity,
    /// Per-index weights for spectral similarity; `None` weighs every
    /// signature index equally
    pub index_weights: Option<IndexWeights>,
    pub rbf: RbfParams,
    pub ranking: RankingParams,
    pub point_scoring: PointScoring,
    /// Surface of the interpolated magnetic field that gets scored: the
    /// field or one of its derivatives
    pub magnetic_surface: MagneticSurface,
    /// Remove a regional polynomial trend from point data before
    /// interpolating
    pub detrend: Option<TrendOrder>,
}

impl Default for ProspectingConfig {
    fn default() -> Self {
        Self {
            neighborhood_radius_m: 500.0,
            weights: FusionWeights::default(),
            percentile_threshold: 90.0,
            min_area_ha: 50.0,
            std_floor: 1e-6,
            connectivity: Connectivity::Eight,
            index_weights: None,
            rbf: RbfParams::default(),
            ranking: RankingParams::default(),
            point_scoring: PointScoring::Minmax,
            magnetic_surface: MagneticSurface::Field,
            detrend: None,
        }
    }
}

impl ProspectingConfig {
    /// Check every invariant that can be checked without data
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        self.target_params().validate()?;
        if !(self.neighborhood_radius_m > 0.0 && self.neighborhood_radius_m.is_finite()) {
            return Err(Error::config(
                "neighborhood_radius_m",
                format!("must be finite and > 0, got {}", self.neighborhood_radius_m),
            ));
        }
        if !(self.std_floor > 0.0 && self.std_floor.is_finite()) {
            return Err(Error::config(
                "std_floor",
                format!("must be finite and > 0, got {}", self.std_floor),
            ));
        }
        Ok(())
    }

    pub fn signature_params(&self) -> SignatureParams {
        SignatureParams {
            radius_m: self.neighborhood_radius_m,
            std_floor: self.std_floor,
        }
    }

    pub fn target_params(&self) -> TargetParams {
        TargetParams {
            percentile_threshold: self.percentile_threshold,
            min_area_ha: self.min_area_ha,
            pixel_area_m2: None,
            connectivity: self.connectivity,
            ranking: self.ranking,
        }
    }
}
