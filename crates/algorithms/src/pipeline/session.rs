//! Prospecting session: inputs, configuration and cached scores

use std::collections::BTreeMap;

use serde::Serialize;
use terraf_core::raster::{IndexStack, Raster};
use terraf_core::vector::{ReferenceSite, SparsePointSet};
use terraf_core::{Error, Result};
use tracing::{debug, info, warn};

use super::config::{PointScoring, ProspectingConfig};
use crate::geophysics::{MagneticSurface, magnetic_surface, remove_regional_trend};
use crate::interpolation::RbfInterpolator;
use crate::prospectivity::{
    ClassAreas, Dimension, FusionWeights, ScoreSet, SensitivityReport, Target, class_areas,
    classify_prospectivity, extract_targets_detailed, fuse, sensitivity_analysis,
};
use crate::signature::{SpectralSignature, extract_signature};
use crate::similarity::{
    IndexWeights, combine_scores, minmax_score, site_similarity_score, spectral_similarity,
    surface_site_similarity_score,
};

/// Result of one fusion and target extraction pass
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub signature: SpectralSignature,
    pub weights: FusionWeights,
    /// Prospectivity value targets were cut at; `None` for an all no-data surface
    pub threshold: Option<f64>,
    pub regions_found: usize,
    pub targets: Vec<Target>,
    pub class_areas: ClassAreas,
    #[serde(skip)]
    pub prospectivity: Raster<f64>,
}

/// All inputs of a prospecting run, plus the intermediate results that do
/// not depend on the fusion weights.
///
/// The signature and the per-dimension score rasters are computed on the
/// first run and kept, so re-running with other weights only repeats the
/// fusion and target stages. Changing inputs or configuration drops them.
#[derive(Debug, Clone)]
pub struct ProspectingSession {
    stack: IndexStack,
    sites: Vec<ReferenceSite>,
    points: BTreeMap<Dimension, Vec<SparsePointSet>>,
    config: ProspectingConfig,
    signature: Option<SpectralSignature>,
    scores: Option<ScoreSet>,
}

impl ProspectingSession {
    /// # Errors
    /// - `Error::Config` for an invalid configuration or an empty stack
    pub fn new(
        stack: IndexStack,
        sites: Vec<ReferenceSite>,
        config: ProspectingConfig,
    ) -> Result<Self> {
        config.validate()?;
        if stack.is_empty() {
            return Err(Error::config("stack", "index stack is empty"));
        }
        Ok(Self {
            stack,
            sites,
            points: BTreeMap::new(),
            config,
            signature: None,
            scores: None,
        })
    }

    /// Attach a point set to a point-sampled dimension.
    ///
    /// Several geochemical sets (one per element) are averaged into one
    /// geochemical score.
    pub fn add_points(&mut self, dimension: Dimension, points: SparsePointSet) -> Result<()> {
        if dimension == Dimension::Spectral {
            return Err(Error::config(
                "points",
                "the spectral dimension is scored from the index stack",
            ));
        }
        self.points.entry(dimension).or_default().push(points);
        self.scores = None;
        Ok(())
    }

    /// Builder-style [`add_points`](Self::add_points)
    pub fn with_points(mut self, dimension: Dimension, points: SparsePointSet) -> Result<Self> {
        self.add_points(dimension, points)?;
        Ok(self)
    }

    /// Replace the configuration, dropping cached results
    pub fn set_config(&mut self, config: ProspectingConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        self.signature = None;
        self.scores = None;
        Ok(())
    }

    pub fn config(&self) -> &ProspectingConfig {
        &self.config
    }

    pub fn stack(&self) -> &IndexStack {
        &self.stack
    }

    pub fn sites(&self) -> &[ReferenceSite] {
        &self.sites
    }

    /// Dimensions that can be scored with the current inputs
    pub fn available_dimensions(&self) -> Vec<Dimension> {
        std::iter::once(Dimension::Spectral)
            .chain(self.points.keys().copied())
            .collect()
    }

    /// Cached score rasters, if a run has happened since the last change
    pub fn scores(&self) -> Option<&ScoreSet> {
        self.scores.as_ref()
    }

    /// Extract the signature, score every dimension, fuse with the
    /// configured weights and extract targets.
    ///
    /// # Errors
    /// - `Error::Config` when a dimension named in the weights has no input
    ///   data
    /// - `Error::Signature` when no site samples an index
    /// - `Error::Interpolation` for a degenerate point set
    pub fn run(&mut self) -> Result<RunReport> {
        let weights = self.config.weights.clone();
        self.check_weighted_dimensions(&weights)?;
        self.prepare()?;
        self.report(&weights)
    }

    /// Fuse the cached scores with other weights; the weights become the
    /// session's configured weights.
    pub fn rerun_with_weights(&mut self, weights: FusionWeights) -> Result<RunReport> {
        weights.validate()?;
        self.check_weighted_dimensions(&weights)?;
        self.config.weights = weights.clone();
        self.prepare()?;
        self.report(&weights)
    }

    /// Compare targets across weight sets, the first being the baseline
    pub fn sensitivity(&mut self, weight_sets: &[FusionWeights]) -> Result<SensitivityReport> {
        for weights in weight_sets {
            weights.validate()?;
            self.check_weighted_dimensions(weights)?;
        }
        self.prepare()?;
        let scores = self.cached_scores()?;
        info!(runs = weight_sets.len(), "running sensitivity analysis");
        sensitivity_analysis(scores, &self.sites, weight_sets, &self.config.target_params())
    }

    /// Every dimension named in the weights needs input, even at weight 0
    fn check_weighted_dimensions(&self, weights: &FusionWeights) -> Result<()> {
        match weights
            .iter()
            .find(|&(dim, _)| dim != Dimension::Spectral && !self.points.contains_key(&dim))
        {
            Some((dim, w)) => Err(Error::config(
                "weights",
                format!("{dim} has weight {w} but no {dim} point data was given"),
            )),
            None => Ok(()),
        }
    }

    fn prepare(&mut self) -> Result<()> {
        if self.signature.is_none() {
            info!(
                sites = self.sites.len(),
                indices = self.stack.len(),
                radius_m = self.config.neighborhood_radius_m,
                "extracting spectral signature"
            );
            let signature = extract_signature(&self.stack, &self.sites, self.config.signature_params())?;
            for site in signature.coverage.iter().filter(|c| c.is_outside()) {
                warn!(site = %site.site, "reference site neighborhood lies outside the raster");
            }
            self.signature = Some(signature);
            self.scores = None;
        }
        if self.scores.is_none() {
            let scores = self.score_dimensions()?;
            self.scores = Some(scores);
        }
        Ok(())
    }

    fn score_dimensions(&self) -> Result<ScoreSet> {
        let signature = self.cached_signature()?;
        let mut scores = ScoreSet::new();

        let index_weights = match &self.config.index_weights {
            Some(w) => w.clone(),
            None => IndexWeights::uniform(signature.index_names())?,
        };
        info!(indices = index_weights.len(), "scoring spectral similarity");
        scores.insert(
            Dimension::Spectral,
            spectral_similarity(&self.stack, signature, &index_weights, self.config.std_floor)?,
        );

        for (dim, sets) in &self.points {
            info!(dimension = %dim, sets = sets.len(), "interpolating point data");
            let rasters = sets
                .iter()
                .map(|set| self.score_point_set(*dim, set))
                .collect::<Result<Vec<_>>>()?;
            let refs: Vec<&Raster<f64>> = rasters.iter().collect();
            scores.insert(*dim, combine_scores(&refs)?);
        }
        Ok(scores)
    }

    fn score_point_set(&self, dim: Dimension, set: &SparsePointSet) -> Result<Raster<f64>> {
        let (rows, cols) = self
            .stack
            .shape()
            .ok_or_else(|| Error::config("stack", "index stack is empty"))?;
        let transform = self
            .stack
            .transform()
            .ok_or_else(|| Error::config("stack", "index stack is empty"))?;

        let detrended;
        let set = match self.config.detrend {
            Some(order) => {
                detrended = remove_regional_trend(set, order)?.1;
                &detrended
            }
            None => set,
        };

        let interpolator = RbfInterpolator::build(set, self.config.rbf.clone())?;
        debug!(
            label = %set.label,
            nodes = interpolator.nodes().len(),
            epsilon = interpolator.epsilon(),
            "fitted RBF surface"
        );
        let grid = interpolator.to_grid(rows, cols, transform)?;

        let surface = match dim {
            Dimension::Magnetic => self.config.magnetic_surface,
            _ => MagneticSurface::Field,
        };
        if surface == MagneticSurface::Field {
            return match self.config.point_scoring {
                PointScoring::Minmax => minmax_score(&grid),
                PointScoring::SiteSimilarity => {
                    site_similarity_score(&grid, &interpolator, &self.sites, self.config.std_floor)
                }
            };
        }

        debug!(label = %set.label, surface = %surface, "deriving magnetic surface");
        let derived = magnetic_surface(&grid, surface)?;
        match self.config.point_scoring {
            PointScoring::Minmax => minmax_score(&derived),
            PointScoring::SiteSimilarity => surface_site_similarity_score(
                &derived,
                &self.sites,
                surface.name(),
                self.config.std_floor,
            ),
        }
    }

    fn report(&self, weights: &FusionWeights) -> Result<RunReport> {
        let signature = self.cached_signature()?;
        let scores = self.cached_scores()?;

        info!(weights = %weights, "fusing score rasters");
        let prospectivity = fuse(scores, weights)?;
        let extraction = extract_targets_detailed(
            &prospectivity,
            scores,
            &self.sites,
            &self.config.target_params(),
        )?;
        let areas = class_areas(&classify_prospectivity(&prospectivity)?);
        info!(
            regions = extraction.regions_found,
            targets = extraction.targets.len(),
            "target extraction complete"
        );

        Ok(RunReport {
            signature: signature.clone(),
            weights: weights.clone(),
            threshold: extraction.threshold,
            regions_found: extraction.regions_found,
            targets: extraction.targets,
            class_areas: areas,
            prospectivity,
        })
    }

    fn cached_signature(&self) -> Result<&SpectralSignature> {
        self.signature
            .as_ref()
            .ok_or_else(|| Error::Other("spectral signature has not been extracted".into()))
    }

    fn cached_scores(&self) -> Result<&ScoreSet> {
        self.scores
            .as_ref()
            .ok_or_else(|| Error::Other("dimension scores have not been computed".into()))
    }
}
