//! # terraf-algorithms
//!
//! Mineral prospectivity scoring on co-registered raster grids.
//!
//! ## Modules
//!
//! - **imagery**: Landsat alteration indices and anomaly zones
//! - **statistics**: Percentiles and sample summaries
//! - **signature**: Spectral signatures of known occurrences
//! - **interpolation**: RBF surfaces from sparse point data
//! - **geophysics**: Regional trend removal and point anomalies
//! - **similarity**: Gaussian similarity scores
//! - **prospectivity**: Weighted fusion, target extraction and ranking
//! - **pipeline**: Session context running the whole chain

pub mod geophysics;
pub mod imagery;
pub mod interpolation;
pub mod pipeline;
pub mod prospectivity;
pub mod signature;
pub mod similarity;
pub mod statistics;

pub(crate) mod grid_ops;
pub(crate) mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::geophysics::{MagneticSurface, field_derivatives};
    pub use crate::imagery::{
        AlterationIndex, AnomalyDirection, Band, LandsatBands, anomaly_zone, compute_index,
        compute_indices,
    };
    pub use crate::interpolation::{RbfInterpolator, RbfKernel, RbfParams, interpolate_to_grid};
    pub use crate::pipeline::{PointScoring, ProspectingConfig, ProspectingSession, RunReport};
    pub use crate::prospectivity::{
        Dimension, FusionWeights, ScoreSet, Target, TargetParams, extract_targets, fuse,
        sensitivity_analysis,
    };
    pub use crate::signature::{SignatureParams, SpectralSignature, extract_signature};
    pub use crate::similarity::{IndexWeights, TargetDistribution, score, score_raster};
    pub use terraf_core::prelude::*;
}
