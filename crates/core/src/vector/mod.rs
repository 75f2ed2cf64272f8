//! Point data: known mineral occurrences and sparse field measurements

use geo_types::Coord;
use serde::{Deserialize, Serialize};

use crate::crs::CRS;
use crate::error::Result;

/// A known mineral occurrence (mine) used as ground truth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSite {
    pub name: String,
    /// Location in the raster CRS
    pub location: Coord<f64>,
    /// Originating WGS84 (latitude, longitude), when the site was given in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat_lon: Option<(f64, f64)>,
}

impl ReferenceSite {
    pub fn new(name: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            name: name.into(),
            location: Coord { x, y },
            lat_lon: None,
        }
    }

    /// Site given in WGS84 degrees, projected into `crs`
    pub fn from_lat_lon(name: impl Into<String>, lat: f64, lon: f64, crs: &CRS) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            location: crs.project_wgs84(lon, lat)?,
            lat_lon: Some((lat, lon)),
        })
    }

    /// Euclidean distance to a point in the same CRS
    pub fn distance_to(&self, point: Coord<f64>) -> f64 {
        let dx = self.location.x - point.x;
        let dy = self.location.y - point.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A sample point with x, y coordinates and a value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

impl SamplePoint {
    pub fn new(x: f64, y: f64, value: f64) -> Self {
        Self { x, y, value }
    }

    /// Squared Euclidean distance to another point
    #[inline]
    pub fn dist_sq(&self, other_x: f64, other_y: f64) -> f64 {
        let dx = self.x - other_x;
        let dy = self.y - other_y;
        dx * dx + dy * dy
    }

    #[inline]
    pub fn dist(&self, other_x: f64, other_y: f64) -> f64 {
        self.dist_sq(other_x, other_y).sqrt()
    }
}

/// Unordered field measurements from one source (magnetometry, one assay element).
///
/// Duplicate coordinates are allowed; consumers must not rely on order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparsePointSet {
    pub label: String,
    pub points: Vec<SamplePoint>,
}

impl SparsePointSet {
    pub fn new(label: impl Into<String>, points: Vec<SamplePoint>) -> Self {
        Self {
            label: label.into(),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points whose coordinates and value are all finite
    pub fn finite_points(&self) -> Vec<SamplePoint> {
        self.points
            .iter()
            .filter(|p| p.x.is_finite() && p.y.is_finite() && p.value.is_finite())
            .copied()
            .collect()
    }

    /// Bounding box (min_x, min_y, max_x, max_y) of the finite points
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        self.finite_points().iter().fold(None, |acc, p| {
            Some(match acc {
                None => (p.x, p.y, p.x, p.y),
                Some((min_x, min_y, max_x, max_y)) => {
                    (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y))
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_distance() {
        let site = ReferenceSite::new("La Colorada", 0.0, 0.0);
        assert_eq!(site.distance_to(Coord { x: 3.0, y: 4.0 }), 5.0);
    }

    #[test]
    fn test_site_from_lat_lon() {
        let site = ReferenceSite::from_lat_lon("CM", 0.0, -105.0, &CRS::utm(13, true)).unwrap();
        assert!((site.location.x - 500_000.0).abs() < 0.01);
        assert_eq!(site.lat_lon, Some((0.0, -105.0)));
    }

    #[test]
    fn test_point_set_bounds_skip_non_finite() {
        let set = SparsePointSet::new(
            "magnetic",
            vec![
                SamplePoint::new(0.0, 5.0, 1.0),
                SamplePoint::new(10.0, -2.0, 2.0),
                SamplePoint::new(100.0, 100.0, f64::NAN),
            ],
        );
        assert_eq!(set.finite_points().len(), 2);
        assert_eq!(set.bounds(), Some((0.0, -2.0, 10.0, 5.0)));
    }
}
