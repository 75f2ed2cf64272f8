//! Sensitivity of the target set to the fusion weights

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use terraf_core::vector::ReferenceSite;
use terraf_core::{Error, Result};
use tracing::debug;

use super::fuse::fuse;
use super::targets::{Target, TargetParams, extract_targets};
use super::weights::{FusionWeights, ScoreSet};
use crate::maybe_rayon::*;

/// Outcome of one weight set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityRun {
    pub weights: FusionWeights,
    pub target_count: usize,
    pub total_area_ha: f64,
    /// Jaccard index of this run's target cells against the first run's
    pub overlap_with_baseline: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityReport {
    /// One entry per weight set, in input order; the first is the baseline
    pub runs: Vec<SensitivityRun>,
    /// Mean overlap of the non-baseline runs (1.0 with a single run)
    pub mean_overlap: f64,
}

/// Re-run fusion and target extraction for each weight set.
///
/// Runs are independent and execute in parallel; the report keeps the
/// order of `weight_sets`.
///
/// # Errors
/// - `Error::Config` for an empty `weight_sets` or any invalid weight set
/// - Any error from [`fuse`] or [`extract_targets`]
pub fn sensitivity_analysis(
    scores: &ScoreSet,
    sites: &[ReferenceSite],
    weight_sets: &[FusionWeights],
    params: &TargetParams,
) -> Result<SensitivityReport> {
    if weight_sets.is_empty() {
        return Err(Error::config("weight_sets", "at least one weight set is required"));
    }
    params.validate()?;
    for weights in weight_sets {
        weights.validate()?;
    }

    let outcomes: Vec<(BTreeSet<(usize, usize)>, usize, f64)> = weight_sets
        .par_iter()
        .map(|weights| {
            let surface = fuse(scores, weights)?;
            let targets = extract_targets(&surface, scores, sites, params)?;
            Ok((
                target_cells(&targets),
                targets.len(),
                targets.iter().map(|t| t.area_ha).sum(),
            ))
        })
        .collect::<Result<_>>()?;

    let baseline = &outcomes[0].0;
    let runs: Vec<SensitivityRun> = weight_sets
        .iter()
        .zip(&outcomes)
        .map(|(weights, (cells, target_count, total_area_ha))| SensitivityRun {
            weights: weights.clone(),
            target_count: *target_count,
            total_area_ha: *total_area_ha,
            overlap_with_baseline: jaccard(baseline, cells),
        })
        .collect();

    let mean_overlap = if runs.len() > 1 {
        runs[1..].iter().map(|r| r.overlap_with_baseline).sum::<f64>() / (runs.len() - 1) as f64
    } else {
        1.0
    };

    debug!(runs = runs.len(), mean_overlap, "sensitivity analysis");
    Ok(SensitivityReport { runs, mean_overlap })
}

fn target_cells(targets: &[Target]) -> BTreeSet<(usize, usize)> {
    targets.iter().flat_map(|t| t.cells.iter().copied()).collect()
}

/// |A ∩ B| / |A ∪ B|; two empty sets are identical
fn jaccard(a: &BTreeSet<(usize, usize)>, b: &BTreeSet<(usize, usize)>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prospectivity::Dimension;
    use approx::assert_relative_eq;
    use terraf_core::GeoTransform;
    use terraf_core::raster::Raster;

    fn layer(values: Vec<f64>) -> Raster<f64> {
        let mut r = Raster::from_vec(values, 6, 6).unwrap();
        r.set_transform(GeoTransform::new(0.0, 180.0, 30.0, -30.0));
        r
    }

    /// Spectral lights up the top-left corner, magnetic the bottom-right
    fn scores() -> ScoreSet {
        let mut spectral = vec![0.0; 36];
        let mut magnetic = vec![0.0; 36];
        for r in 0..2 {
            for c in 0..2 {
                spectral[r * 6 + c] = 1.0;
                magnetic[(r + 4) * 6 + c + 4] = 1.0;
            }
        }
        let mut set = ScoreSet::new();
        set.insert(Dimension::Spectral, layer(spectral));
        set.insert(Dimension::Magnetic, layer(magnetic));
        set
    }

    fn params() -> TargetParams {
        TargetParams {
            percentile_threshold: 80.0,
            min_area_ha: 0.0,
            ..Default::default()
        }
    }

    fn weights(spectral: f64) -> FusionWeights {
        FusionWeights::new([(Dimension::Spectral, spectral), (Dimension::Magnetic, 1.0 - spectral)])
    }

    #[test]
    fn test_baseline_overlaps_itself() {
        let report =
            sensitivity_analysis(&scores(), &[], &[weights(0.9), weights(0.9)], &params()).unwrap();
        assert_eq!(report.runs.len(), 2);
        assert_eq!(report.runs[0].overlap_with_baseline, 1.0);
        assert_eq!(report.mean_overlap, 1.0);
    }

    #[test]
    fn test_runs_keep_input_order() {
        let sets = [weights(0.9), weights(0.8), weights(0.1)];
        let report = sensitivity_analysis(&scores(), &[], &sets, &params()).unwrap();
        for (run, w) in report.runs.iter().zip(&sets) {
            assert_eq!(&run.weights, w);
            assert_eq!(run.target_count, 1);
        }
        // Spectral-led runs keep the top-left corner, 0.1 flips to bottom-right
        assert_eq!(report.runs[1].overlap_with_baseline, 1.0);
        assert_eq!(report.runs[2].overlap_with_baseline, 0.0);
        assert_relative_eq!(report.mean_overlap, 0.5);
        assert_relative_eq!(report.runs[0].total_area_ha, 0.36, epsilon = 1e-12);
    }

    #[test]
    fn test_single_run() {
        let report = sensitivity_analysis(&scores(), &[], &[weights(0.6)], &params()).unwrap();
        assert_eq!(report.mean_overlap, 1.0);
    }

    #[test]
    fn test_empty_weight_sets() {
        let err = sensitivity_analysis(&scores(), &[], &[], &params()).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_invalid_weight_set_rejected() {
        let bad = FusionWeights::new([(Dimension::Spectral, 0.6), (Dimension::Magnetic, 0.6)]);
        let err = sensitivity_analysis(&scores(), &[], &[weights(0.9), bad], &params()).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_jaccard_empty_sets() {
        assert_eq!(jaccard(&BTreeSet::new(), &BTreeSet::new()), 1.0);
    }
}
