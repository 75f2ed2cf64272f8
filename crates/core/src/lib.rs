//! # terraf-core
//!
//! Core types and I/O for the terraf prospectivity toolkit.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced raster grid
//! - `IndexStack`: co-registered spectral index rasters
//! - `GeoTransform` and `CRS` for georeferencing
//! - `ReferenceSite` and `SparsePointSet` for point data
//! - Native GeoTIFF I/O

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{CircularWindow, Connectivity, GeoTransform, IndexStack, Raster, RasterElement};
pub use vector::{ReferenceSite, SamplePoint, SparsePointSet};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{Connectivity, GeoTransform, IndexStack, Raster, RasterElement};
    pub use crate::vector::{ReferenceSite, SamplePoint, SparsePointSet};
}
