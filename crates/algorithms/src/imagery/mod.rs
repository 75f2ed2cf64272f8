//! Multispectral alteration mapping
//!
//! - Alteration indices: band ratios over Landsat OLI reflectance
//! - Anomaly zones: percentile cut-offs and zone intersections

mod alteration;
mod zones;

pub use alteration::{compute_index, compute_indices, AlterationIndex, Band, LandsatBands};
pub use zones::{anomaly_zone, coincident_zones, zone_area_km2, AnomalyDirection};
