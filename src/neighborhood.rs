use std::fmt;

use rayon::prelude::*;

use crate::grid::Grid;

const AXIS_OFFSETS: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
const DIAGONAL_OFFSETS: [(i64, i64); 4] = [(-1, -1), (1, -1), (-1, 1), (1, 1)];

/// Which cells count as neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connectivity {
    /// On-axis neighbors only (von Neumann).
    Four,
    /// On-axis plus diagonal neighbors (Moore).
    Eight,
}

impl Connectivity {
    /// Equivalent 3x3 weight mask.
    pub fn kernel(self) -> Kernel {
        match self {
            Connectivity::Four => Kernel::four(),
            Connectivity::Eight => Kernel::eight(),
        }
    }

}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connectivity::Four => write!(f, "4-neighbor"),
            Connectivity::Eight => write!(f, "8-neighbor"),
        }
    }
}

/// Integer weight mask over the 3x3 neighborhood, indexed `[dy + 1][dx + 1]`.
/// The center weight is always 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kernel {
    weights: [[u32; 3]; 3],
}

impl Kernel {
    pub fn new(mut weights: [[u32; 3]; 3]) -> Self {
        weights[1][1] = 0;
        Self { weights }
    }

    pub fn four() -> Self {
        Self::new([[0, 1, 0], [1, 0, 1], [0, 1, 0]])
    }

    pub fn eight() -> Self {
        Self::new([[1, 1, 1], [1, 0, 1], [1, 1, 1]])
    }

    /// Diagonal positions only.
    pub fn diagonal() -> Self {
        Self::new([[1, 0, 1], [0, 0, 0], [1, 0, 1]])
    }

    /// Weight at offset `(dx, dy)`, each in `-1..=1`.
    pub fn weight(&self, dx: i64, dy: i64) -> u32 {
        self.weights[(dy + 1) as usize][(dx + 1) as usize]
    }

    /// Non-zero taps as `(dx, dy, weight)`.
    fn taps(&self) -> Vec<(i64, i64, u32)> {
        let mut taps = Vec::with_capacity(8);
        for dy in -1..=1 {
            for dx in -1..=1 {
                let w = self.weight(dx, dy);
                if w != 0 {
                    taps.push((dx, dy, w));
                }
            }
        }
        taps
    }
}

/// Per-cell weighted neighbor counts, same shape as the grid they came from.
///
/// Counts are `u64` so that eight taps of any `u32` weight cannot overflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountField {
    width: usize,
    height: usize,
    counts: Vec<u64>,
}

impl CountField {
    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Count at a (wrapped) coordinate.
    pub fn get(&self, x: i64, y: i64) -> u64 {
        let wx = x.rem_euclid(self.width as i64) as usize;
        let wy = y.rem_euclid(self.height as i64) as usize;
        self.counts[wy * self.width + wx]
    }

    /// Row-major counts.
    pub fn as_slice(&self) -> &[u64] {
        &self.counts
    }
}

/// Count cells equal to `value` around `(x, y)`, excluding the cell itself.
pub fn count_at(grid: &Grid, x: i64, y: i64, value: u32, connectivity: Connectivity) -> u32 {
    let axis = count_offsets(grid, x, y, value, &AXIS_OFFSETS);
    match connectivity {
        Connectivity::Four => axis,
        Connectivity::Eight => axis + count_offsets(grid, x, y, value, &DIAGONAL_OFFSETS),
    }
}

fn count_offsets(grid: &Grid, x: i64, y: i64, value: u32, offsets: &[(i64, i64)]) -> u32 {
    offsets
        .iter()
        .filter(|&&(dx, dy)| grid.get(x + dx, y + dy) == value)
        .count() as u32
}

/// Weighted count of `value` around every cell: the circular convolution of
/// the grid's indicator array with `kernel`.
pub fn count_grid(grid: &Grid, value: u32, kernel: &Kernel) -> CountField {
    let w = grid.width();
    let h = grid.height();
    let wi = w as i64;
    let hi = h as i64;
    let cells = grid.cells();
    let taps = kernel.taps();
    let mut counts = vec![0u64; cells.len()];

    counts.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        let y = y as i64;
        for (x, out) in row.iter_mut().enumerate() {
            let x = x as i64;
            let mut sum = 0u64;
            for &(dx, dy, weight) in &taps {
                let nx = (x + dx).rem_euclid(wi) as usize;
                let ny = (y + dy).rem_euclid(hi) as usize;
                if cells[ny * w + nx] == value {
                    sum += u64::from(weight);
                }
            }
            *out = sum;
        }
    });

    CountField {
        width: w,
        height: h,
        counts,
    }
}
