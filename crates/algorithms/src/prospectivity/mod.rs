//! Prospectivity fusion and exploration targets
//!
//! Score rasters from each evidence dimension are fused with weights into
//! one prospectivity surface, which is then thresholded, split into
//! connected regions and ranked.

mod classify;
mod fuse;
mod labeling;
mod sensitivity;
mod targets;
mod weights;

pub use classify::{class_areas, classify_prospectivity, ClassAreas, CLASS_NAMES};
pub use fuse::fuse;
pub use labeling::{label_regions, Regions};
pub use sensitivity::{sensitivity_analysis, SensitivityReport, SensitivityRun};
pub use targets::{
    extract_targets, extract_targets_detailed, RankingParams, Target, TargetExtraction,
    TargetParams,
};
pub use weights::{Dimension, FusionWeights, ScoreSet, WEIGHT_SUM_TOLERANCE};
