//! Target extraction and ranking
//!
//! 1. Threshold the prospectivity surface at a percentile of its valid cells
//! 2. Label connected above-threshold regions
//! 3. Drop regions smaller than the minimum area
//! 4. Summarize and rank the survivors by prospectivity, discounted by
//!    distance to the nearest known occurrence

use std::collections::BTreeMap;

use geo_types::Coord;
use serde::{Deserialize, Serialize};
use terraf_core::raster::{Connectivity, Raster};
use terraf_core::vector::ReferenceSite;
use terraf_core::{Error, Result};
use tracing::debug;

use super::labeling::label_regions;
use super::weights::{Dimension, ScoreSet};
use crate::grid_ops::check_dimensions;
use crate::statistics::raster_percentile;

/// Distance discount applied to the ranking score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingParams {
    /// Fraction of the score removed at `max_distance_km`
    pub distance_penalty: f64,
    /// Distance at which the penalty saturates
    pub max_distance_km: f64,
}

impl Default for RankingParams {
    fn default() -> Self {
        Self {
            distance_penalty: 0.3,
            max_distance_km: 50.0,
        }
    }
}

impl RankingParams {
    /// `mean × (1 − penalty × min(d, max) / max)`; no distance → no penalty
    pub fn ranking_score(&self, mean_prospectivity: f64, distance_km: Option<f64>) -> f64 {
        match distance_km {
            Some(d) => {
                let d = d.min(self.max_distance_km);
                mean_prospectivity * (1.0 - self.distance_penalty * d / self.max_distance_km)
            }
            None => mean_prospectivity,
        }
    }
}

/// Parameters for target extraction
#[derive(Debug, Clone, PartialEq)]
pub struct TargetParams {
    /// Percentile of valid cells used as threshold, in (0, 100)
    pub percentile_threshold: f64,
    /// Regions smaller than this (hectares) are dropped
    pub min_area_ha: f64,
    /// Ground area of one cell; defaults to the raster's pixel area
    pub pixel_area_m2: Option<f64>,
    pub connectivity: Connectivity,
    pub ranking: RankingParams,
}

impl Default for TargetParams {
    fn default() -> Self {
        Self {
            percentile_threshold: 90.0,
            min_area_ha: 50.0,
            pixel_area_m2: None,
            connectivity: Connectivity::Eight,
            ranking: RankingParams::default(),
        }
    }
}

impl TargetParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.percentile_threshold > 0.0 && self.percentile_threshold < 100.0) {
            return Err(Error::config(
                "percentile_threshold",
                format!("must be in (0, 100), got {}", self.percentile_threshold),
            ));
        }
        if !(self.min_area_ha >= 0.0 && self.min_area_ha.is_finite()) {
            return Err(Error::config(
                "min_area_ha",
                format!("must be finite and >= 0, got {}", self.min_area_ha),
            ));
        }
        if let Some(a) = self.pixel_area_m2
            && !(a > 0.0 && a.is_finite())
        {
            return Err(Error::config(
                "pixel_area_m2",
                format!("must be finite and > 0, got {a}"),
            ));
        }
        let r = &self.ranking;
        if !((0.0..=1.0).contains(&r.distance_penalty) && r.max_distance_km > 0.0) {
            return Err(Error::config(
                "ranking",
                format!(
                    "distance_penalty must be in [0, 1] and max_distance_km > 0, got {} / {}",
                    r.distance_penalty, r.max_distance_km
                ),
            ));
        }
        Ok(())
    }
}

/// A ranked exploration target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Region label (raster scan order)
    pub id: u32,
    /// 1-based position after ranking
    pub rank: usize,
    pub centroid_x: f64,
    pub centroid_y: f64,
    pub cell_count: usize,
    pub area_ha: f64,
    pub mean_prospectivity: f64,
    pub max_prospectivity: f64,
    /// Mean score per dimension over the region's valid cells
    pub dimension_scores: BTreeMap<Dimension, f64>,
    pub nearest_site: Option<String>,
    pub distance_km: Option<f64>,
    pub ranking_score: f64,
    /// Member cells (row, col)
    #[serde(skip)]
    pub cells: Vec<(usize, usize)>,
}

impl Target {
    pub fn centroid(&self) -> Coord<f64> {
        Coord {
            x: self.centroid_x,
            y: self.centroid_y,
        }
    }
}

/// Targets plus the threshold they were cut at
#[derive(Debug, Clone, PartialEq)]
pub struct TargetExtraction {
    /// `None` when the surface has no valid cells
    pub threshold: Option<f64>,
    pub regions_found: usize,
    pub targets: Vec<Target>,
}

/// Extract ranked targets from a prospectivity surface.
///
/// # Errors
/// - `Error::Config` for invalid parameters
/// - `Error::SizeMismatch` if a score raster differs in shape
pub fn extract_targets(
    prospectivity: &Raster<f64>,
    scores: &ScoreSet,
    sites: &[ReferenceSite],
    params: &TargetParams,
) -> Result<Vec<Target>> {
    Ok(extract_targets_detailed(prospectivity, scores, sites, params)?.targets)
}

/// Same as [`extract_targets`], also reporting the threshold and how many
/// regions were found before the area filter
pub fn extract_targets_detailed(
    prospectivity: &Raster<f64>,
    scores: &ScoreSet,
    sites: &[ReferenceSite],
    params: &TargetParams,
) -> Result<TargetExtraction> {
    params.validate()?;
    for raster in scores.values() {
        check_dimensions(prospectivity, raster)?;
    }

    let Some(threshold) = raster_percentile(prospectivity, params.percentile_threshold) else {
        debug!("prospectivity surface has no valid cells");
        return Ok(TargetExtraction {
            threshold: None,
            regions_found: 0,
            targets: Vec::new(),
        });
    };

    let regions = label_regions(prospectivity, threshold, params.connectivity)?;
    let regions_found = regions.len();
    let pixel_area = params.pixel_area_m2.unwrap_or_else(|| prospectivity.pixel_area());

    let mut targets: Vec<Target> = regions
        .cells
        .into_iter()
        .enumerate()
        .filter_map(|(i, cells)| {
            let area_ha = cells.len() as f64 * pixel_area / 10_000.0;
            (area_ha >= params.min_area_ha)
                .then(|| summarize(i as u32 + 1, cells, area_ha, prospectivity, scores, sites, params))
        })
        .collect();

    targets.sort_by(|a, b| {
        b.ranking_score
            .total_cmp(&a.ranking_score)
            .then(a.centroid_x.total_cmp(&b.centroid_x))
            .then(a.centroid_y.total_cmp(&b.centroid_y))
            .then(a.id.cmp(&b.id))
    });
    for (i, t) in targets.iter_mut().enumerate() {
        t.rank = i + 1;
    }

    debug!(threshold, regions = regions_found, kept = targets.len(), "extracted targets");

    Ok(TargetExtraction {
        threshold: Some(threshold),
        regions_found,
        targets,
    })
}

fn summarize(
    id: u32,
    cells: Vec<(usize, usize)>,
    area_ha: f64,
    prospectivity: &Raster<f64>,
    scores: &ScoreSet,
    sites: &[ReferenceSite],
    params: &TargetParams,
) -> Target {
    let n = cells.len() as f64;
    let (mut sx, mut sy, mut sum, mut max) = (0.0, 0.0, 0.0, f64::NEG_INFINITY);
    for &(r, c) in &cells {
        let centre = prospectivity.cell_center(r, c);
        sx += centre.x;
        sy += centre.y;
        let v = unsafe { prospectivity.get_unchecked(r, c) };
        sum += v;
        max = max.max(v);
    }
    let centroid = Coord { x: sx / n, y: sy / n };
    let mean_prospectivity = sum / n;

    let dimension_scores = scores
        .iter()
        .filter_map(|(dim, raster)| {
            let valid: Vec<f64> = cells
                .iter()
                .map(|&(r, c)| unsafe { raster.get_unchecked(r, c) })
                .filter(|v| !raster.is_nodata(*v))
                .collect();
            (!valid.is_empty()).then(|| (*dim, valid.iter().sum::<f64>() / valid.len() as f64))
        })
        .collect();

    let nearest = sites
        .iter()
        .map(|s| (s, s.distance_to(centroid) / 1000.0))
        .min_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.name.cmp(&b.0.name)));
    let distance_km = nearest.map(|(_, d)| d);

    Target {
        id,
        rank: 0,
        centroid_x: centroid.x,
        centroid_y: centroid.y,
        cell_count: cells.len(),
        area_ha,
        mean_prospectivity,
        max_prospectivity: max,
        dimension_scores,
        nearest_site: nearest.map(|(s, _)| s.name.clone()),
        distance_km,
        ranking_score: params.ranking.ranking_score(mean_prospectivity, distance_km),
        cells,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use terraf_core::GeoTransform;

    /// 10x10 grid of 30 m cells with origin (0, 300)
    fn surface(values: Vec<f64>) -> Raster<f64> {
        let mut r = Raster::from_vec(values, 10, 10).unwrap();
        r.set_transform(GeoTransform::new(0.0, 300.0, 30.0, -30.0));
        r
    }

    fn block(r0: usize, c0: usize, size: usize, value: f64, values: &mut [f64]) {
        for r in r0..r0 + size {
            for c in c0..c0 + size {
                values[r * 10 + c] = value;
            }
        }
    }

    fn params(p: f64, min_area_ha: f64) -> TargetParams {
        TargetParams {
            percentile_threshold: p,
            min_area_ha,
            ..Default::default()
        }
    }

    #[test]
    fn test_single_block() {
        let mut v = vec![0.0; 100];
        block(4, 4, 3, 1.0, &mut v);
        let targets = extract_targets(&surface(v), &ScoreSet::new(), &[], &params(80.0, 0.0)).unwrap();

        assert_eq!(targets.len(), 1);
        let t = &targets[0];
        assert_eq!(t.cell_count, 9);
        assert_relative_eq!(t.area_ha, 0.81, epsilon = 1e-12);
        // Centre of cell (5, 5)
        assert_relative_eq!(t.centroid_x, 165.0, epsilon = 1e-9);
        assert_relative_eq!(t.centroid_y, 135.0, epsilon = 1e-9);
        assert_eq!(t.rank, 1);
        assert_eq!(t.ranking_score, 1.0);
        assert!(t.nearest_site.is_none());
    }

    #[test]
    fn test_min_area_filter() {
        let mut v = vec![0.0; 100];
        block(0, 0, 3, 1.0, &mut v);
        block(7, 7, 2, 1.0, &mut v);
        let surface = surface(v);

        let all = extract_targets(&surface, &ScoreSet::new(), &[], &params(80.0, 0.0)).unwrap();
        assert_eq!(all.len(), 2);

        // 4 cells = 0.36 ha, 9 cells = 0.81 ha
        let large = extract_targets(&surface, &ScoreSet::new(), &[], &params(80.0, 0.5)).unwrap();
        assert_eq!(large.len(), 1);
        assert_eq!(large[0].cell_count, 9);
        for t in &large {
            assert!(t.area_ha >= 0.5);
            assert_relative_eq!(t.area_ha, t.cell_count as f64 * 900.0 / 10_000.0);
        }
    }

    #[test]
    fn test_flat_surface_has_no_targets() {
        let extraction =
            extract_targets_detailed(&surface(vec![0.4; 100]), &ScoreSet::new(), &[], &params(90.0, 0.0))
                .unwrap();
        assert_eq!(extraction.threshold, Some(0.4));
        assert!(extraction.targets.is_empty());
    }

    #[test]
    fn test_all_nodata_surface() {
        let extraction = extract_targets_detailed(
            &surface(vec![f64::NAN; 100]),
            &ScoreSet::new(),
            &[],
            &params(90.0, 0.0),
        )
        .unwrap();
        assert_eq!(extraction.threshold, None);
        assert!(extraction.targets.is_empty());
    }

    #[test]
    fn test_ranking_discounts_distance() {
        let mut v = vec![0.0; 100];
        block(0, 0, 2, 0.8, &mut v);
        block(7, 7, 2, 0.8, &mut v);
        // Known mine next to the bottom-right block
        let sites = [ReferenceSite::new("near", 250.0, 50.0)];
        let targets = extract_targets(&surface(v), &ScoreSet::new(), &sites, &params(80.0, 0.0)).unwrap();

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].id, 2);
        assert_eq!(targets[0].nearest_site.as_deref(), Some("near"));
        assert!(targets[0].ranking_score > targets[1].ranking_score);
        assert!(targets[1].distance_km.unwrap() > targets[0].distance_km.unwrap());
    }

    #[test]
    fn test_ties_break_on_centroid() {
        let mut v = vec![0.0; 100];
        block(7, 0, 2, 1.0, &mut v);
        block(0, 7, 2, 1.0, &mut v);
        let targets = extract_targets(&surface(v), &ScoreSet::new(), &[], &params(80.0, 0.0)).unwrap();
        // Equal scores: smaller centroid x first
        assert!(targets[0].centroid_x < targets[1].centroid_x);
        assert_eq!(targets[0].id, 2);
    }

    #[test]
    fn test_dimension_scores() {
        let mut v = vec![0.0; 100];
        block(4, 4, 3, 1.0, &mut v);
        let mut scores = ScoreSet::new();
        let mut spectral = vec![0.2; 100];
        spectral[5 * 10 + 5] = f64::NAN;
        scores.insert(Dimension::Spectral, surface(spectral));
        let targets = extract_targets(&surface(v), &scores, &[], &params(80.0, 0.0)).unwrap();
        assert_relative_eq!(targets[0].dimension_scores[&Dimension::Spectral], 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_params() {
        let s = surface(vec![0.0; 100]);
        for p in [params(0.0, 0.0), params(100.0, 0.0), params(50.0, -1.0)] {
            assert!(matches!(
                extract_targets(&s, &ScoreSet::new(), &[], &p),
                Err(Error::Config { .. })
            ));
        }
    }

    #[test]
    fn test_ranking_score_saturates() {
        let r = RankingParams::default();
        assert_relative_eq!(r.ranking_score(1.0, Some(25.0)), 0.85);
        assert_relative_eq!(r.ranking_score(1.0, Some(500.0)), 0.7);
        assert_eq!(r.ranking_score(0.6, None), 0.6);
    }

    #[test]
    fn test_serialized_field_order() {
        let mut v = vec![0.0; 100];
        block(4, 4, 3, 1.0, &mut v);
        let targets = extract_targets(&surface(v), &ScoreSet::new(), &[], &params(80.0, 0.0)).unwrap();
        let json = serde_json::to_string(&targets[0]).unwrap();
        assert!(json.starts_with(r#"{"id":1,"rank":1,"centroid_x":165.0"#));
        assert!(!json.contains("cells\""));
    }
}
