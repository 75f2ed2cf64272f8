//! Coordinate Reference System handling
//!
//! Rasters carry an optional [`CRS`]; reference sites arrive as WGS84
//! latitude/longitude and are projected into the raster CRS with
//! [`CRS::project_wgs84`]. Only geographic WGS84 and the UTM zones
//! (EPSG 326xx / 327xx) used by Landsat Collection 2 products are supported.

mod utm;

use geo_types::Coord;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

pub use utm::{parse_utm_epsg, wgs84_to_utm};

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    epsg: Option<u32>,
    wkt: Option<String>,
}

impl CRS {
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            wkt: None,
        }
    }

    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            epsg: None,
            wkt: Some(wkt.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// UTM zone CRS, e.g. `CRS::utm(13, true)` for EPSG:32613
    pub fn utm(zone: u32, north: bool) -> Self {
        Self::from_epsg(if north { 32600 + zone } else { 32700 + zone })
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    pub fn is_geographic(&self) -> bool {
        self.epsg == Some(4326)
    }

    /// Project a WGS84 (longitude, latitude) pair in degrees into this CRS
    pub fn project_wgs84(&self, lon: f64, lat: f64) -> Result<Coord<f64>> {
        if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
            return Err(Error::InvalidParameter {
                name: "lon/lat",
                value: format!("({lon}, {lat})"),
                reason: "outside the WGS84 domain".into(),
            });
        }

        if self.is_geographic() {
            return Ok(Coord { x: lon, y: lat });
        }

        let Some((zone, north)) = self.epsg.and_then(parse_utm_epsg) else {
            return Err(Error::UnsupportedDataType(format!(
                "cannot project WGS84 coordinates into {}",
                self.identifier()
            )));
        };

        let (x, y) = wgs84_to_utm(lon, lat, zone, north);
        Ok(Coord { x, y })
    }

    /// A string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", &wkt[..wkt.len().min(50)]);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}
