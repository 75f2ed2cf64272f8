//! Connected-region labeling of above-threshold cells

use std::collections::VecDeque;

use terraf_core::raster::{Connectivity, Raster};
use terraf_core::Result;

/// Connected regions of a boolean mask
#[derive(Debug, Clone)]
pub struct Regions {
    /// Region id per cell; 0 = background
    pub labels: Raster<u32>,
    /// Member cells of region `id` at index `id - 1`, in discovery order
    pub cells: Vec<Vec<(usize, usize)>>,
}

impl Regions {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Label the connected groups of cells with `value > threshold`.
///
/// The raster is scanned in row-major order and each unlabeled seed is
/// flood-filled breadth-first, so ids depend only on the raster contents.
/// No-data cells never belong to a region.
pub fn label_regions(
    raster: &Raster<f64>,
    threshold: f64,
    connectivity: Connectivity,
) -> Result<Regions> {
    let (rows, cols) = raster.shape();
    let above = |row: usize, col: usize| {
        let v = unsafe { raster.get_unchecked(row, col) };
        !raster.is_nodata(v) && v > threshold
    };

    let mut labels = vec![0u32; rows * cols];
    let mut cells: Vec<Vec<(usize, usize)>> = Vec::new();
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();

    for row in 0..rows {
        for col in 0..cols {
            if labels[row * cols + col] != 0 || !above(row, col) {
                continue;
            }

            let id = cells.len() as u32 + 1;
            let mut members = Vec::new();
            labels[row * cols + col] = id;
            queue.push_back((row, col));

            while let Some((r, c)) = queue.pop_front() {
                members.push((r, c));
                for (nr, nc) in connectivity.neighbors(r, c, rows, cols) {
                    let idx = nr * cols + nc;
                    if labels[idx] == 0 && above(nr, nc) {
                        labels[idx] = id;
                        queue.push_back((nr, nc));
                    }
                }
            }

            cells.push(members);
        }
    }

    Ok(Regions {
        labels: raster.derive(labels, Some(0))?,
        cells,
    })
}
