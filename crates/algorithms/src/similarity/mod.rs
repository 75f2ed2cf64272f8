//! Similarity of cells to a reference distribution
//!
//! Scores are bounded in [0, 1] (1 = identical to the reference mean) with
//! NaN as no-data, so they can be fused across evidence dimensions.

mod gaussian;
mod spectral;

pub use gaussian::{score, score_raster, TargetDistribution};
pub use spectral::{
    combine_scores, minmax_score, site_similarity_score, spectral_similarity,
    surface_site_similarity_score, IndexWeights,
};
