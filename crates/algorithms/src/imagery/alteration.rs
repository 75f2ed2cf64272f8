//! Hydrothermal alteration indices from Landsat OLI bands
//!
//! Band ratios that highlight iron oxides, clays and other alteration
//! minerals associated with mineralization. Every index is a cell-wise
//! function of reflectance bands; a zero or negative denominator yields
//! no-data (NaN), never an infinity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use terraf_core::raster::{IndexStack, Raster};
use terraf_core::{Error, Result};
use tracing::debug;

use crate::grid_ops::{build_output, check_dimensions, is_nodata_f64};
use crate::maybe_rayon::*;

/// Landsat 8/9 OLI reflectance bands used by the indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Band {
    /// B2
    Blue,
    /// B3
    Green,
    /// B4
    Red,
    /// B5
    Nir,
    /// B6
    Swir1,
    /// B7
    Swir2,
}

impl Band {
    /// OLI band number
    pub fn number(self) -> u8 {
        match self {
            Band::Blue => 2,
            Band::Green => 3,
            Band::Red => 4,
            Band::Nir => 5,
            Band::Swir1 => 6,
            Band::Swir2 => 7,
        }
    }
}

/// The set of bands of one scene; bands an index does not need may be absent.
///
/// All present bands must share one grid.
#[derive(Debug, Clone, Default)]
pub struct LandsatBands {
    pub blue: Option<Raster<f64>>,
    pub green: Option<Raster<f64>>,
    pub red: Option<Raster<f64>>,
    pub nir: Option<Raster<f64>>,
    pub swir1: Option<Raster<f64>>,
    pub swir2: Option<Raster<f64>>,
}

impl LandsatBands {
    pub fn get(&self, band: Band) -> Option<&Raster<f64>> {
        match band {
            Band::Blue => self.blue.as_ref(),
            Band::Green => self.green.as_ref(),
            Band::Red => self.red.as_ref(),
            Band::Nir => self.nir.as_ref(),
            Band::Swir1 => self.swir1.as_ref(),
            Band::Swir2 => self.swir2.as_ref(),
        }
    }

    pub fn set(&mut self, band: Band, raster: Raster<f64>) {
        let slot = match band {
            Band::Blue => &mut self.blue,
            Band::Green => &mut self.green,
            Band::Red => &mut self.red,
            Band::Nir => &mut self.nir,
            Band::Swir1 => &mut self.swir1,
            Band::Swir2 => &mut self.swir2,
        };
        *slot = Some(raster);
    }

    fn require(&self, band: Band) -> Result<&Raster<f64>> {
        self.get(band).ok_or_else(|| {
            Error::config(
                "bands",
                format!("band B{} ({band:?}) is required but not loaded", band.number()),
            )
        })
    }
}

/// Supported alteration and masking indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AlterationIndex {
    /// B4/B2, iron oxides (gossan)
    Gossan,
    /// B6/B5, ferrous minerals
    Fmi,
    /// B4/B5, ferric oxides
    FeO,
    /// B6/B7, clay minerals (argillic)
    Cmr,
    /// (B4 − B2)/(B4 + B2), normalised iron
    Ndii,
    /// (B6 + B7)/B5, hydrothermal alteration
    Ai,
    /// B5/B6, chlorite and epidote (propylitic)
    Propylitic,
    /// B6/(B6 + B7); low values suggest carbonates
    Carbonate,
    /// B6²/(B7·B5), refined clay
    Clay,
    /// (B4/B2)·(B6/B7), gossan over sulfide-bearing clays
    GossanComposite,
    /// (B5 − B4)/(B5 + B4), vegetation mask
    Ndvi,
}

impl AlterationIndex {
    pub const ALL: [AlterationIndex; 11] = [
        AlterationIndex::Gossan,
        AlterationIndex::Fmi,
        AlterationIndex::FeO,
        AlterationIndex::Cmr,
        AlterationIndex::Ndii,
        AlterationIndex::Ai,
        AlterationIndex::Propylitic,
        AlterationIndex::Carbonate,
        AlterationIndex::Clay,
        AlterationIndex::GossanComposite,
        AlterationIndex::Ndvi,
    ];

    /// The six indices of the reference signature
    pub const SIGNATURE: [AlterationIndex; 6] = [
        AlterationIndex::Gossan,
        AlterationIndex::Fmi,
        AlterationIndex::FeO,
        AlterationIndex::Cmr,
        AlterationIndex::Ndii,
        AlterationIndex::Ai,
    ];

    /// Name used as the raster key in an `IndexStack`
    pub fn name(self) -> &'static str {
        match self {
            AlterationIndex::Gossan => "GOSSAN",
            AlterationIndex::Fmi => "FMI",
            AlterationIndex::FeO => "FeO",
            AlterationIndex::Cmr => "CMR",
            AlterationIndex::Ndii => "NDII",
            AlterationIndex::Ai => "AI",
            AlterationIndex::Propylitic => "PROPYLITIC",
            AlterationIndex::Carbonate => "CARBONATE",
            AlterationIndex::Clay => "CLAY",
            AlterationIndex::GossanComposite => "GOSSAN_COMPOSITE",
            AlterationIndex::Ndvi => "NDVI",
        }
    }

    pub fn required_bands(self) -> &'static [Band] {
        match self {
            AlterationIndex::Gossan | AlterationIndex::Ndii => &[Band::Red, Band::Blue],
            AlterationIndex::Fmi => &[Band::Swir1, Band::Nir],
            AlterationIndex::FeO | AlterationIndex::Ndvi => &[Band::Red, Band::Nir],
            AlterationIndex::Cmr | AlterationIndex::Carbonate => &[Band::Swir1, Band::Swir2],
            AlterationIndex::Ai | AlterationIndex::Clay => &[Band::Swir1, Band::Swir2, Band::Nir],
            AlterationIndex::Propylitic => &[Band::Nir, Band::Swir1],
            AlterationIndex::GossanComposite => {
                &[Band::Red, Band::Blue, Band::Swir1, Band::Swir2]
            }
        }
    }

    /// Evaluate the index on one cell's band values, indexed like
    /// `required_bands()`. `None` where the index is undefined.
    fn eval(self, b: &[f64]) -> Option<f64> {
        let ratio = |num: f64, den: f64| (den > 0.0).then(|| num / den);
        match self {
            AlterationIndex::Gossan
            | AlterationIndex::Fmi
            | AlterationIndex::FeO
            | AlterationIndex::Cmr
            | AlterationIndex::Propylitic => ratio(b[0], b[1]),
            AlterationIndex::Ndii => ratio(b[0] - b[1], b[0] + b[1]),
            AlterationIndex::Ndvi => ratio(b[1] - b[0], b[1] + b[0]),
            AlterationIndex::Ai => ratio(b[0] + b[1], b[2]),
            AlterationIndex::Carbonate => ratio(b[0], b[0] + b[1]),
            AlterationIndex::Clay => ratio(b[0] * b[0], b[1] * b[2]),
            AlterationIndex::GossanComposite => {
                Some(ratio(b[0], b[1])? * ratio(b[2], b[3])?)
            }
        }
    }
}

impl fmt::Display for AlterationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlterationIndex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        AlterationIndex::ALL
            .into_iter()
            .find(|idx| idx.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::config("index", format!("unknown alteration index '{s}'")))
    }
}

/// Compute one alteration index.
///
/// # Errors
/// - `Error::Config` if a required band is missing
/// - `Error::SizeMismatch` if the bands do not share a shape
pub fn compute_index(bands: &LandsatBands, index: AlterationIndex) -> Result<Raster<f64>> {
    let inputs: Vec<&Raster<f64>> = index
        .required_bands()
        .iter()
        .map(|&b| bands.require(b))
        .collect::<Result<_>>()?;

    let template = inputs[0];
    for other in &inputs[1..] {
        check_dimensions(template, other)?;
    }

    let (rows, cols) = template.shape();
    let nodata: Vec<Option<f64>> = inputs.iter().map(|r| r.nodata()).collect();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            let mut cell = [0.0_f64; 4];
            'cols: for col in 0..cols {
                for (k, band) in inputs.iter().enumerate() {
                    let v = unsafe { band.get_unchecked(row, col) };
                    if is_nodata_f64(v, nodata[k]) {
                        continue 'cols;
                    }
                    cell[k] = v;
                }
                if let Some(v) = index.eval(&cell[..inputs.len()])
                    && v.is_finite()
                {
                    row_data[col] = v;
                }
            }
            row_data
        })
        .collect();

    build_output(template, rows, cols, data)
}

/// Compute several indices into a co-registered stack keyed by index name
pub fn compute_indices(bands: &LandsatBands, indices: &[AlterationIndex]) -> Result<IndexStack> {
    let mut stack = IndexStack::new();
    for &index in indices {
        let raster = compute_index(bands, index)?;
        let stats = raster.statistics();
        debug!(
            index = index.name(),
            valid = stats.valid_count,
            nodata = stats.nodata_count,
            mean = stats.mean.unwrap_or(f64::NAN),
            "computed alteration index"
        );
        stack.insert(index.name(), raster)?;
    }
    Ok(stack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use terraf_core::GeoTransform;

    fn band(value: f64) -> Raster<f64> {
        let mut r = Raster::filled(3, 3, value);
        r.set_transform(GeoTransform::new(0.0, 90.0, 30.0, -30.0));
        r
    }

    fn scene() -> LandsatBands {
        let mut bands = LandsatBands::default();
        bands.set(Band::Blue, band(0.08));
        bands.set(Band::Green, band(0.10));
        bands.set(Band::Red, band(0.16));
        bands.set(Band::Nir, band(0.20));
        bands.set(Band::Swir1, band(0.30));
        bands.set(Band::Swir2, band(0.25));
        bands
    }

    fn value(index: AlterationIndex) -> f64 {
        compute_index(&scene(), index).unwrap().get(1, 1).unwrap()
    }

    #[test]
    fn test_formulas() {
        assert_relative_eq!(value(AlterationIndex::Gossan), 0.16 / 0.08, epsilon = 1e-12);
        assert_relative_eq!(value(AlterationIndex::Fmi), 0.30 / 0.20, epsilon = 1e-12);
        assert_relative_eq!(value(AlterationIndex::FeO), 0.16 / 0.20, epsilon = 1e-12);
        assert_relative_eq!(value(AlterationIndex::Cmr), 0.30 / 0.25, epsilon = 1e-12);
        assert_relative_eq!(value(AlterationIndex::Ndii), (0.16 - 0.08) / (0.16 + 0.08), epsilon = 1e-12);
        assert_relative_eq!(value(AlterationIndex::Ai), (0.30 + 0.25) / 0.20, epsilon = 1e-12);
        assert_relative_eq!(value(AlterationIndex::Propylitic), 0.20 / 0.30, epsilon = 1e-12);
        assert_relative_eq!(value(AlterationIndex::Carbonate), 0.30 / 0.55, epsilon = 1e-12);
        assert_relative_eq!(value(AlterationIndex::Clay), 0.09 / (0.25 * 0.20), epsilon = 1e-12);
        assert_relative_eq!(value(AlterationIndex::GossanComposite), 2.0 * 1.2, epsilon = 1e-12);
        assert_relative_eq!(value(AlterationIndex::Ndvi), (0.20 - 0.16) / (0.20 + 0.16), epsilon = 1e-12);
    }

    #[test]
    fn test_zero_denominator_is_nodata() {
        let mut bands = scene();
        let mut blue = band(0.08);
        blue.set(0, 0, 0.0).unwrap();
        bands.set(Band::Blue, blue);

        let gossan = compute_index(&bands, AlterationIndex::Gossan).unwrap();
        assert!(gossan.get(0, 0).unwrap().is_nan());
        assert!(gossan.get(0, 1).unwrap().is_finite());
    }

    #[test]
    fn test_missing_band() {
        let bands = LandsatBands::default();
        assert!(matches!(
            compute_index(&bands, AlterationIndex::Cmr),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_compute_indices_stack() {
        let stack = compute_indices(&scene(), &AlterationIndex::SIGNATURE).unwrap();
        assert_eq!(stack.len(), 6);
        assert!(stack.get("FeO").is_some());
    }

    #[test]
    fn test_parse_name() {
        assert_eq!("gossan_composite".parse::<AlterationIndex>().unwrap(), AlterationIndex::GossanComposite);
        assert!("NDWI".parse::<AlterationIndex>().is_err());
    }
}
