use rand::Rng;
use serde::Serialize;

use crate::error::Result;
use crate::grid::{pattern_glider, Grid};
use crate::rule::GameOfLife;
use crate::simulation::{Discipline, Scheduler};

/// Largest per-step move of a glider's snapped center of mass; anything
/// bigger means the glider straddles the seam.
const MAX_GLIDER_STEP: i64 = 2;

/// Mean coordinate of every cell holding `actor`, optionally rounded to the
/// nearest cell. `None` when no cell holds `actor`.
///
/// Coordinates are not unwrapped across the seam: a cluster split over the
/// boundary reports a centroid pulled toward the middle of the grid.
pub fn center_of_mass(grid: &Grid, actor: u32, snap: bool) -> Option<(f64, f64)> {
    let cells = grid.live_cells(actor);
    if cells.is_empty() {
        return None;
    }
    let n = cells.len() as f64;
    let (sx, sy) = cells
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x as f64, sy + y as f64));
    let (cx, cy) = (sx / n, sy / n);
    if snap {
        Some((cx.round(), cy.round()))
    } else {
        Some((cx, cy))
    }
}

/// Snapped center-of-mass track of a glider and its mean speed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    pub points: Vec<(i64, i64)>,
    /// Straight-line distance first -> last point, per recorded step.
    pub speed: f64,
}

/// Launch a glider from the origin corner and follow it toward the opposite
/// corner until it reaches `(width - 2, height - 2)` on two consecutive steps,
/// starts to cross the seam, or `max_steps` run out.
pub fn glider_trajectory<G: Rng + ?Sized>(
    shape: (usize, usize),
    max_steps: usize,
    rng: &mut G,
) -> Result<Trajectory> {
    let mut grid = Grid::new(shape, &[1])?;
    let life = GameOfLife::for_grid(&grid);
    let alive = life.alive();
    let scheduler = Scheduler::new(life, Discipline::Synchronous)?;
    grid.place_pattern(&pattern_glider(), Some((1, 1)), alive);

    let end = (shape.0 as i64 - 2, shape.1 as i64 - 2);
    let mut points: Vec<(i64, i64)> = Vec::new();

    for _ in 0..max_steps {
        scheduler.step(&mut grid, rng);
        let Some((x, y)) = center_of_mass(&grid, alive, true) else {
            break;
        };
        let point = (x as i64, y as i64);

        if let Some(&(px, py)) = points.last() {
            if (point.0 - px).abs() > MAX_GLIDER_STEP || (point.1 - py).abs() > MAX_GLIDER_STEP {
                log::debug!("glider crossed the seam after {} steps", points.len());
                break;
            }
        }
        points.push(point);

        if points.len() >= 2 && points[points.len() - 2..].iter().all(|&p| p == end) {
            break;
        }
    }

    let speed = match (points.first(), points.last()) {
        (Some(&(x0, y0)), Some(&(x1, y1))) => {
            let (dx, dy) = ((x1 - x0) as f64, (y1 - y0) as f64);
            dx.hypot(dy) / points.len() as f64
        }
        _ => 0.0,
    };

    Ok(Trajectory { points, speed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_center_of_mass_of_absent_actor_is_none() {
        let grid = Grid::new((5, 5), &[1]).unwrap();
        assert_eq!(center_of_mass(&grid, 1, false), None);
        assert_eq!(center_of_mass(&grid, 7, true), None);
    }

    #[test]
    fn test_center_of_mass_averages_coordinates() {
        let mut grid = Grid::new((8, 8), &[1, 2]).unwrap();
        grid.set(0, 0, 1);
        grid.set(1, 0, 1);
        grid.set(2, 1, 1);
        grid.set(7, 7, 2);

        let (x, y) = center_of_mass(&grid, 1, false).unwrap();
        assert!((x - 1.0).abs() < 1e-12);
        assert!((y - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(center_of_mass(&grid, 1, true), Some((1.0, 0.0)));
        assert_eq!(center_of_mass(&grid, 2, true), Some((7.0, 7.0)));
    }

    #[test]
    fn test_center_of_mass_is_not_unwrapped() {
        let mut grid = Grid::new((10, 10), &[1]).unwrap();
        grid.set(0, 5, 1);
        grid.set(9, 5, 1);
        // Adjacent across the seam, yet the centroid lands mid-grid.
        assert_eq!(center_of_mass(&grid, 1, false), Some((4.5, 5.0)));
    }

    #[test]
    fn test_glider_moves_diagonally_at_quarter_cell_rate() {
        let mut rng = StdRng::seed_from_u64(0);
        let track = glider_trajectory((20, 20), 1000, &mut rng).unwrap();
        assert!(track.points.len() > 40, "only {} points", track.points.len());

        let first = track.points[0];
        let last = *track.points.last().unwrap();
        assert!(last.0 > first.0 && last.1 > first.1);
        assert!(last.0 <= 18 && last.1 <= 18);
        for pair in track.points.windows(2) {
            assert!((pair[1].0 - pair[0].0).abs() <= 1);
            assert!((pair[1].1 - pair[0].1).abs() <= 1);
        }
        // A glider covers one diagonal cell every four generations.
        let expected = 2f64.sqrt() / 4.0;
        assert!((track.speed - expected).abs() < 0.05, "speed = {}", track.speed);
    }

    #[test]
    fn test_glider_respects_step_budget() {
        let mut rng = StdRng::seed_from_u64(0);
        let track = glider_trajectory((50, 50), 10, &mut rng).unwrap();
        assert_eq!(track.points.len(), 10);
    }
}
