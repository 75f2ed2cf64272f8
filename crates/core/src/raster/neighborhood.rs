//! Cell neighborhoods: region connectivity and circular sampling windows

use super::GeoTransform;
use geo_types::Coord;
use serde::{Deserialize, Serialize};

/// Adjacency rule used when grouping cells into contiguous regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Connectivity {
    /// Edge neighbors only (N, S, E, W)
    Four,
    /// Edge and corner neighbors
    #[default]
    Eight,
}

const ROOK_OFFSETS: [(isize, isize); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];

const QUEEN_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

impl Connectivity {
    /// Neighbor offsets (row, col) in a fixed raster order
    pub fn offsets(&self) -> &'static [(isize, isize)] {
        match self {
            Connectivity::Four => &ROOK_OFFSETS,
            Connectivity::Eight => &QUEEN_OFFSETS,
        }
    }

    /// In-bounds neighbors of (row, col) in a raster of the given shape
    pub fn neighbors(
        &self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.offsets().iter().filter_map(move |&(dr, dc)| {
            let nr = row as isize + dr;
            let nc = col as isize + dc;
            if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                None
            } else {
                Some((nr as usize, nc as usize))
            }
        })
    }
}

impl TryFrom<u8> for Connectivity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(Connectivity::Four),
            8 => Ok(Connectivity::Eight),
            other => Err(format!("connectivity must be 4 or 8, got {other}")),
        }
    }
}

impl From<Connectivity> for u8 {
    fn from(value: Connectivity) -> Self {
        match value {
            Connectivity::Four => 4,
            Connectivity::Eight => 8,
        }
    }
}

/// Circular window in map units around a point.
///
/// A cell belongs to the window when the distance between its centre and
/// the window centre is `<= radius`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularWindow {
    pub center: Coord<f64>,
    pub radius: f64,
}

impl CircularWindow {
    pub fn new(center: Coord<f64>, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Cells of a `rows` x `cols` grid inside the window, in raster order.
    ///
    /// Empty when the window does not overlap the grid.
    pub fn cells(&self, transform: &GeoTransform, rows: usize, cols: usize) -> Vec<(usize, usize)> {
        let (pc, pr) = transform.geo_to_pixel(self.center.x, self.center.y);
        if !pc.is_finite() || !pr.is_finite() || !(self.radius >= 0.0) {
            return Vec::new();
        }

        let cell = transform
            .pixel_width
            .abs()
            .min(transform.pixel_height.abs())
            .max(f64::MIN_POSITIVE);
        let reach = (self.radius / cell).ceil() + 1.0;

        let row_lo = (pr - reach).floor().max(0.0);
        let row_hi = (pr + reach).ceil().min(rows as f64);
        let col_lo = (pc - reach).floor().max(0.0);
        let col_hi = (pc + reach).ceil().min(cols as f64);
        if row_lo >= row_hi || col_lo >= col_hi {
            return Vec::new();
        }

        let r2 = self.radius * self.radius;
        let mut out = Vec::new();
        for row in row_lo as usize..row_hi as usize {
            for col in col_lo as usize..col_hi as usize {
                let (x, y) = transform.pixel_to_geo(col, row);
                let dx = x - self.center.x;
                let dy = y - self.center.y;
                if dx * dx + dy * dy <= r2 {
                    out.push((row, col));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_offsets() {
        assert_eq!(Connectivity::Four.offsets().len(), 4);
        assert_eq!(Connectivity::Eight.offsets().len(), 8);
        assert_eq!(Connectivity::default(), Connectivity::Eight);
    }

    #[test]
    fn test_neighbors_clip_at_edges() {
        let corner: Vec<_> = Connectivity::Eight.neighbors(0, 0, 5, 5).collect();
        assert_eq!(corner, vec![(0, 1), (1, 0), (1, 1)]);

        let interior = Connectivity::Four.neighbors(2, 2, 5, 5).count();
        assert_eq!(interior, 4);
    }

    #[test]
    fn test_connectivity_from_u8() {
        assert_eq!(Connectivity::try_from(4).unwrap(), Connectivity::Four);
        assert!(Connectivity::try_from(6).is_err());
    }

    #[test]
    fn test_circular_window_cells() {
        // 10x10 grid of 30 m cells, origin at (0, 300)
        let gt = GeoTransform::new(0.0, 300.0, 30.0, -30.0);
        // Centre of cell (5, 5) is (165, 135)
        let window = CircularWindow::new(Coord { x: 165.0, y: 135.0 }, 30.0);
        let cells = window.cells(&gt, 10, 10);
        // Centre plus its four edge neighbours
        assert_eq!(cells, vec![(4, 5), (5, 4), (5, 5), (5, 6), (6, 5)]);
    }

    #[test]
    fn test_circular_window_outside_grid() {
        let gt = GeoTransform::new(0.0, 300.0, 30.0, -30.0);
        let window = CircularWindow::new(Coord { x: 5_000.0, y: 5_000.0 }, 500.0);
        assert!(window.cells(&gt, 10, 10).is_empty());
    }
}
