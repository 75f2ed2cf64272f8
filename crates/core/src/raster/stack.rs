//! Co-registered collection of named index rasters

use std::collections::BTreeMap;

use super::{GeoTransform, Raster};
use crate::error::{Error, Result};

/// Named spectral index rasters sharing one grid.
///
/// Every raster inserted must match the shape and geotransform of the
/// first one, so any cell (row, col) refers to the same ground location
/// across all indices. Names are kept in a `BTreeMap`, giving a stable
/// iteration order.
#[derive(Debug, Clone, Default)]
pub struct IndexStack {
    layers: BTreeMap<String, Raster<f64>>,
    grid: Option<((usize, usize), GeoTransform)>,
}

impl IndexStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an index raster, validating co-registration with the stack
    pub fn insert(&mut self, name: impl Into<String>, raster: Raster<f64>) -> Result<()> {
        let name = name.into();
        match self.grid {
            None => self.grid = Some((raster.shape(), *raster.transform())),
            Some(((rows, cols), transform)) => {
                if raster.shape() != (rows, cols) {
                    return Err(Error::SizeMismatch {
                        er: rows,
                        ec: cols,
                        ar: raster.rows(),
                        ac: raster.cols(),
                    });
                }
                if !transform.approx_eq(raster.transform()) {
                    return Err(Error::TransformMismatch { name });
                }
            }
        }
        self.layers.insert(name, raster);
        Ok(())
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, raster: Raster<f64>) -> Result<Self> {
        self.insert(name, raster)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Raster<f64>> {
        self.layers.get(name)
    }

    /// Look up an index that the caller cannot proceed without
    pub fn require(&self, name: &str) -> Result<&Raster<f64>> {
        self.layers.get(name).ok_or_else(|| {
            Error::config(
                "index",
                format!("index '{name}' is not present in the raster stack"),
            )
        })
    }

    /// Index names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Raster<f64>)> {
        self.layers.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Shared (rows, cols), if any raster has been inserted
    pub fn shape(&self) -> Option<(usize, usize)> {
        self.grid.map(|(shape, _)| shape)
    }

    /// Shared geotransform, if any raster has been inserted
    pub fn transform(&self) -> Option<&GeoTransform> {
        self.grid.as_ref().map(|(_, t)| t)
    }
}
