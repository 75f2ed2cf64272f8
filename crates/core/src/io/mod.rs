//! I/O for georeferenced rasters
//!
//! Band rasters, index rasters and score surfaces are exchanged as
//! single-band GeoTIFF files.

mod native;

pub use native::{
    read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer, GeoTiffOptions,
};
