//! Signature extraction

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use terraf_core::raster::{CircularWindow, IndexStack, Raster};
use terraf_core::vector::ReferenceSite;
use terraf_core::{Error, Result};
use tracing::{debug, warn};

use crate::statistics::{coefficient_of_variation, SampleSummary};

/// Parameters for signature extraction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignatureParams {
    /// Sampling radius around each site, in map units (metres)
    pub radius_m: f64,
    /// Lower bound applied to std when a signature is used for scoring
    pub std_floor: f64,
}

impl Default for SignatureParams {
    fn default() -> Self {
        Self {
            radius_m: 500.0,
            std_floor: 1e-6,
        }
    }
}

impl SignatureParams {
    fn validate(&self) -> Result<()> {
        if !(self.radius_m > 0.0 && self.radius_m.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "radius_m",
                value: self.radius_m.to_string(),
                reason: "must be finite and > 0".into(),
            });
        }
        if !(self.std_floor > 0.0 && self.std_floor.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "std_floor",
                value: self.std_floor.to_string(),
                reason: "must be finite and > 0".into(),
            });
        }
        Ok(())
    }
}

/// Pooled statistics of one index over all reference neighborhoods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSignature {
    #[serde(flatten)]
    pub summary: SampleSummary,
    /// Sites that contributed at least one sample
    pub site_count: usize,
    /// Pooled std is exactly zero
    pub degenerate: bool,
}

impl IndexSignature {
    pub fn mean(&self) -> f64 {
        self.summary.mean
    }

    pub fn std(&self) -> f64 {
        self.summary.std
    }

    /// `max(std, floor)`
    pub fn effective_std(&self, floor: f64) -> f64 {
        self.summary.std.max(floor)
    }
}

/// How many cells and finite samples one site contributed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteCoverage {
    pub site: String,
    /// Cells of the grid inside the neighborhood
    pub cells: usize,
    /// Finite samples per index
    pub samples: BTreeMap<String, usize>,
}

impl SiteCoverage {
    pub fn is_outside(&self) -> bool {
        self.cells == 0
    }
}

/// Per-index reference distribution, keyed by index name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralSignature {
    pub radius_m: f64,
    pub indices: BTreeMap<String, IndexSignature>,
    pub coverage: Vec<SiteCoverage>,
}

impl SpectralSignature {
    pub fn get(&self, index: &str) -> Option<&IndexSignature> {
        self.indices.get(index)
    }

    pub fn index_names(&self) -> impl Iterator<Item = &str> {
        self.indices.keys().map(String::as_str)
    }
}

/// Finite values of `raster` at `cells`
fn sample(raster: &Raster<f64>, cells: &[(usize, usize)]) -> Vec<f64> {
    cells
        .iter()
        .map(|&(r, c)| unsafe { raster.get_unchecked(r, c) })
        .filter(|&v| !raster.is_nodata(v))
        .collect()
}

fn neighborhood(stack: &IndexStack, site: &ReferenceSite, radius_m: f64) -> Result<Vec<(usize, usize)>> {
    let (rows, cols) = stack
        .shape()
        .ok_or_else(|| Error::config("stack", "index stack is empty"))?;
    let transform = stack
        .transform()
        .ok_or_else(|| Error::config("stack", "index stack is empty"))?;
    Ok(CircularWindow::new(site.location, radius_m).cells(transform, rows, cols))
}

/// Pool index values around `sites` into a spectral signature.
///
/// Sites whose neighborhood falls outside the raster contribute nothing
/// and are reported in `coverage`.
///
/// # Errors
/// - `Error::Signature` naming the first index (by name) with zero pooled samples
/// - `Error::Config` for an empty stack
/// - `Error::InvalidParameter` for a non-positive radius or floor
pub fn extract_signature(
    stack: &IndexStack,
    sites: &[ReferenceSite],
    params: SignatureParams,
) -> Result<SpectralSignature> {
    params.validate()?;
    if stack.is_empty() {
        return Err(Error::config("stack", "index stack is empty"));
    }

    let mut pooled: BTreeMap<&str, Vec<f64>> = stack.names().map(|n| (n, Vec::new())).collect();
    let mut contributing: BTreeMap<&str, usize> = BTreeMap::new();
    let mut coverage = Vec::with_capacity(sites.len());

    for site in sites {
        let cells = neighborhood(stack, site, params.radius_m)?;
        if cells.is_empty() {
            warn!(site = %site.name, "reference site neighborhood lies outside the raster");
        }

        let mut samples = BTreeMap::new();
        for (name, raster) in stack.iter() {
            let values = sample(raster, &cells);
            samples.insert(name.to_string(), values.len());
            if !values.is_empty() {
                *contributing.entry(name).or_default() += 1;
            }
            if let Some(pool) = pooled.get_mut(name) {
                pool.extend(values);
            }
        }

        debug!(site = %site.name, cells = cells.len(), "sampled reference neighborhood");
        coverage.push(SiteCoverage {
            site: site.name.clone(),
            cells: cells.len(),
            samples,
        });
    }

    let mut indices = BTreeMap::new();
    for (name, values) in pooled {
        let summary = SampleSummary::from_values(&values).ok_or_else(|| Error::Signature {
            index: name.to_string(),
            reason: format!(
                "no finite samples within {} m of {} reference site(s)",
                params.radius_m,
                sites.len()
            ),
        })?;
        indices.insert(
            name.to_string(),
            IndexSignature {
                summary,
                site_count: contributing.get(name).copied().unwrap_or(0),
                degenerate: summary.std == 0.0,
            },
        );
    }

    Ok(SpectralSignature {
        radius_m: params.radius_m,
        indices,
        coverage,
    })
}

/// Summaries for one site, per index (indices without samples are omitted)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteStatistics {
    pub site: String,
    pub indices: BTreeMap<String, SampleSummary>,
}

/// Per-site index summaries within the neighborhood radius
pub fn site_statistics(
    stack: &IndexStack,
    sites: &[ReferenceSite],
    params: SignatureParams,
) -> Result<Vec<SiteStatistics>> {
    params.validate()?;
    sites
        .iter()
        .map(|site| {
            let cells = neighborhood(stack, site, params.radius_m)?;
            let indices = stack
                .iter()
                .filter_map(|(name, raster)| {
                    SampleSummary::from_values(&sample(raster, &cells)).map(|s| (name.to_string(), s))
                })
                .collect();
            Ok(SiteStatistics {
                site: site.name.clone(),
                indices,
            })
        })
        .collect()
}

/// Agreement of an index across reference sites
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsistencyLevel {
    /// CV < 15 %
    High,
    /// CV < 30 %
    Medium,
    Low,
}

impl ConsistencyLevel {
    pub fn from_cv(cv_percent: f64) -> Self {
        if cv_percent < 15.0 {
            ConsistencyLevel::High
        } else if cv_percent < 30.0 {
            ConsistencyLevel::Medium
        } else {
            ConsistencyLevel::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiteConsistency {
    /// Coefficient of variation of per-site means, percent
    pub cv_percent: f64,
    pub level: ConsistencyLevel,
    pub sites: usize,
}

/// Coefficient of variation of per-site means for each index.
///
/// Indices sampled at fewer than two sites, or with a zero mean, are omitted.
pub fn site_consistency(stats: &[SiteStatistics]) -> BTreeMap<String, SiteConsistency> {
    let mut means: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for site in stats {
        for (name, summary) in &site.indices {
            means.entry(name).or_default().push(summary.mean);
        }
    }

    means
        .into_iter()
        .filter_map(|(name, values)| {
            let cv = coefficient_of_variation(&values)?;
            Some((
                name.to_string(),
                SiteConsistency {
                    cv_percent: cv,
                    level: ConsistencyLevel::from_cv(cv),
                    sites: values.len(),
                },
            ))
        })
        .collect()
}
