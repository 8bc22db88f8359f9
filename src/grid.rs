use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::error::{Error, Result};

/// Code reserved for the empty / dead / recovered cell.
pub const BACKGROUND: u32 = 0;

/// Tolerance on the sum of a per-actor distribution.
const DISTRIBUTION_EPSILON: f64 = 1e-6;

/// Toroidal grid of integer-coded cells.
///
/// Cells are stored row-major (`y * width + x`). Every cell holds one of the
/// grid's actor codes; position 0 of the actor list is always [`BACKGROUND`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    actors: Vec<u32>,
    cells: Vec<u32>,
}

impl Grid {
    /// Create an empty grid of `(width, height)` carrying the given
    /// non-background actors.
    pub fn new(shape: (usize, usize), actors: &[u32]) -> Result<Self> {
        let (width, height) = shape;
        if width == 0 || height == 0 {
            return Err(Error::InvalidShape { width, height });
        }
        if actors.is_empty() {
            return Err(Error::InvalidActors {
                reason: "at least one non-background actor is required".into(),
            });
        }

        let mut all = Vec::with_capacity(actors.len() + 1);
        all.push(BACKGROUND);
        for &actor in actors {
            if all.contains(&actor) {
                return Err(Error::InvalidActors {
                    reason: format!("actor {actor} is duplicated or collides with the background"),
                });
            }
            all.push(actor);
        }

        Ok(Self {
            width,
            height,
            actors: all,
            cells: vec![BACKGROUND; width * height],
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Number of cells.
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    /// All actor codes, background first.
    pub fn actors(&self) -> &[u32] {
        &self.actors
    }

    pub fn background(&self) -> u32 {
        self.actors[0]
    }

    pub fn has_actor(&self, actor: u32) -> bool {
        self.actors.contains(&actor)
    }

    /// Row-major snapshot of the cell states.
    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    /// Row-major index of a (wrapped) coordinate.
    pub fn index(&self, x: i64, y: i64) -> usize {
        let wx = x.rem_euclid(self.width as i64) as usize;
        let wy = y.rem_euclid(self.height as i64) as usize;
        wy * self.width + wx
    }

    /// Get cell state (with bounds wrapping).
    pub fn get(&self, x: i64, y: i64) -> u32 {
        self.cells[self.index(x, y)]
    }

    /// Set a single cell (with bounds wrapping).
    ///
    /// `value` must be one of [`Grid::actors`]. Membership is only checked in
    /// debug builds; a release build stores any code as given, and the grid
    /// then holds a state no rule knows about.
    pub fn set(&mut self, x: i64, y: i64, value: u32) {
        debug_assert!(self.has_actor(value), "actor {value} not on this grid");
        let idx = self.index(x, y);
        self.cells[idx] = value;
    }

    /// Number of cells holding `actor`; 0 if the actor is absent.
    pub fn count(&self, actor: u32) -> usize {
        self.cells.iter().filter(|&&c| c == actor).count()
    }

    /// Coordinates of every cell holding `actor`, in row-major order.
    pub fn live_cells(&self, actor: u32) -> Vec<(usize, usize)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == actor)
            .map(|(i, _)| (i % self.width, i / self.width))
            .collect()
    }

    /// Assign every cell independently from the actor set.
    ///
    /// With `distribution == None` each actor is equally likely; otherwise
    /// `distribution[i]` is the probability of `actors()[i]` and must sum to 1.
    pub fn randomize<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        distribution: Option<&[f64]>,
    ) -> Result<()> {
        match distribution {
            None => {
                let n = self.actors.len();
                for cell in &mut self.cells {
                    *cell = self.actors[rng.gen_range(0..n)];
                }
            }
            Some(weights) => {
                validate_distribution(weights, self.actors.len())?;
                let picker = WeightedIndex::new(weights).map_err(|e| Error::InvalidDistribution {
                    reason: e.to_string(),
                })?;
                for cell in &mut self.cells {
                    *cell = self.actors[picker.sample(rng)];
                }
            }
        }
        Ok(())
    }

    /// Assign every cell uniformly from the non-background actors.
    pub fn randomize_active<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let active = &self.actors[1..];
        for cell in &mut self.cells {
            *cell = active[rng.gen_range(0..active.len())];
        }
    }

    /// Clear all cells.
    pub fn clear(&mut self) {
        self.cells.fill(BACKGROUND);
    }

    /// Place a pattern at the given position (center of grid if None).
    ///
    /// `actor` must be one of [`Grid::actors`], as for [`Grid::set`].
    pub fn place_pattern(&mut self, pattern: &[(i64, i64)], center: Option<(i64, i64)>, actor: u32) {
        let (cx, cy) = center.unwrap_or((self.width as i64 / 2, self.height as i64 / 2));
        for &(dx, dy) in pattern {
            self.set(cx + dx, cy + dy, actor);
        }
    }

    /// Swap in a whole new cell array computed from this grid.
    pub(crate) fn replace_cells(&mut self, cells: Vec<u32>) {
        debug_assert_eq!(cells.len(), self.cells.len());
        self.cells = cells;
    }
}

fn validate_distribution(weights: &[f64], actors: usize) -> Result<()> {
    if weights.len() != actors {
        return Err(Error::InvalidDistribution {
            reason: format!("{} probabilities given for {actors} actors", weights.len()),
        });
    }
    if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(Error::InvalidDistribution {
            reason: format!("probability {bad} is not a finite non-negative number"),
        });
    }
    let total: f64 = weights.iter().sum();
    if (total - 1.0).abs() > DISTRIBUTION_EPSILON {
        return Err(Error::InvalidDistribution {
            reason: format!("probabilities sum to {total}, expected 1"),
        });
    }
    Ok(())
}

// ── Predefined patterns ──

/// Glider: travels one cell in +x and +y every four generations.
pub fn pattern_glider() -> Vec<(i64, i64)> {
    vec![(0, -1), (1, 0), (-1, 1), (0, 1), (1, 1)]
}

/// Blinker: three vertical cells, period-2 oscillator.
pub fn pattern_blinker() -> Vec<(i64, i64)> {
    vec![(0, -1), (0, 0), (0, 1)]
}

/// Beehive: six-cell still life.
pub fn pattern_beehive() -> Vec<(i64, i64)> {
    vec![(-1, 0), (0, -1), (1, -1), (0, 1), (1, 1), (2, 0)]
}

/// Block: 2x2 still life.
pub fn pattern_block() -> Vec<(i64, i64)> {
    vec![(0, 0), (1, 0), (0, 1), (1, 1)]
}
