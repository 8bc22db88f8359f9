use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::neighborhood::{count_at, count_grid};
use crate::rule::Rule;

/// How one step visits the cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Discipline {
    /// Every cell updated from the same pre-step snapshot.
    Synchronous,
    /// `width * height` random single-cell updates written in place.
    Sequential,
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discipline::Synchronous => write!(f, "synchronous"),
            Discipline::Sequential => write!(f, "sequential"),
        }
    }
}

impl FromStr for Discipline {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "synchronous" => Ok(Discipline::Synchronous),
            "sequential" => Ok(Discipline::Sequential),
            other => Err(format!("unknown discipline '{other}' (expected synchronous or sequential)")),
        }
    }
}

/// Advances a grid one step at a time under a fixed rule and discipline.
///
/// Each step is atomic from the caller's view: the synchronous discipline
/// builds the next generation separately and moves it into the grid; the
/// sequential discipline holds `&mut Grid` for the whole sweep.
#[derive(Debug, Clone)]
pub struct Scheduler<R: Rule> {
    rule: R,
    discipline: Discipline,
}

impl<R: Rule> Scheduler<R> {
    pub fn new(rule: R, discipline: Discipline) -> Result<Self> {
        if !rule.supports(discipline) {
            return Err(Error::RuleMismatch {
                rule: rule.name(),
                discipline,
                reason: format!(
                    "{} update is required by the {} rule",
                    opposite(discipline),
                    rule.name()
                ),
            });
        }
        Ok(Self { rule, discipline })
    }

    pub fn rule(&self) -> &R {
        &self.rule
    }

    pub fn discipline(&self) -> Discipline {
        self.discipline
    }

    /// Fail if the rule refers to actors the grid does not carry.
    pub fn check_grid(&self, grid: &Grid) -> Result<()> {
        if let Some(missing) = self.rule.actors().into_iter().find(|&a| !grid.has_actor(a)) {
            return Err(Error::RuleMismatch {
                rule: self.rule.name(),
                discipline: self.discipline,
                reason: format!("grid has no actor {missing}"),
            });
        }
        Ok(())
    }

    /// Run one step (or one sweep) in place.
    pub fn step<G: Rng + ?Sized>(&self, grid: &mut Grid, rng: &mut G) {
        match self.discipline {
            Discipline::Synchronous => {
                let next = self.synchronous_cells(grid, rng);
                grid.replace_cells(next);
            }
            Discipline::Sequential => self.sweep(grid, rng),
        }
    }

    /// Run one step and hand back the resulting grid.
    pub fn advance<G: Rng + ?Sized>(&self, mut grid: Grid, rng: &mut G) -> Grid {
        self.step(&mut grid, rng);
        grid
    }

    /// Run `steps` steps in place.
    pub fn run<G: Rng + ?Sized>(&self, grid: &mut Grid, steps: usize, rng: &mut G) {
        for _ in 0..steps {
            self.step(grid, rng);
        }
    }

    /// Next generation of every cell, computed from the current snapshot.
    ///
    /// Rows run in parallel; each row draws from its own generator seeded
    /// from `rng`, so seeded runs do not depend on thread scheduling.
    fn synchronous_cells<G: Rng + ?Sized>(&self, grid: &Grid, rng: &mut G) -> Vec<u32> {
        let w = grid.width();
        let field = count_grid(grid, self.rule.watched(), &self.rule.connectivity().kernel());
        let counts = field.as_slice();
        let cells = grid.cells();
        let seeds: Vec<u64> = (0..grid.height()).map(|_| rng.gen()).collect();
        let rule = &self.rule;

        let mut next = vec![grid.background(); cells.len()];
        next.par_chunks_mut(w)
            .zip(seeds.par_iter())
            .enumerate()
            .for_each(|(y, (row, &seed))| {
                let mut row_rng = StdRng::seed_from_u64(seed);
                let base = y * w;
                for (x, out) in row.iter_mut().enumerate() {
                    let neighbors = u32::try_from(counts[base + x]).unwrap_or(u32::MAX);
                    *out = rule.next(cells[base + x], neighbors, &mut row_rng);
                }
            });
        next
    }

    /// One sequential sweep. Later picks see earlier writes.
    fn sweep<G: Rng + ?Sized>(&self, grid: &mut Grid, rng: &mut G) {
        let w = grid.width();
        let h = grid.height();
        let watched = self.rule.watched();
        let connectivity = self.rule.connectivity();

        for _ in 0..grid.size() {
            let x = rng.gen_range(0..w) as i64;
            let y = rng.gen_range(0..h) as i64;
            let neighbors = count_at(grid, x, y, watched, connectivity);
            let next = self.rule.next(grid.get(x, y), neighbors, rng);
            grid.set(x, y, next);
        }
    }
}

fn opposite(discipline: Discipline) -> Discipline {
    match discipline {
        Discipline::Synchronous => Discipline::Sequential,
        Discipline::Sequential => Discipline::Synchronous,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{pattern_beehive, pattern_blinker, pattern_block, pattern_glider};
    use crate::neighborhood::Connectivity;
    use crate::rule::{GameOfLife, Sirs, SirsParams};

    /// Bumps a cell's code once per visit, so after one sweep each cell
    /// holds the number of times it was picked.
    struct PickCounter {
        max: u32,
    }

    impl Rule for PickCounter {
        fn name(&self) -> &'static str {
            "pick-counter"
        }

        fn watched(&self) -> u32 {
            1
        }

        fn connectivity(&self) -> Connectivity {
            Connectivity::Four
        }

        fn actors(&self) -> Vec<u32> {
            (0..=self.max).collect()
        }

        fn supports(&self, _discipline: Discipline) -> bool {
            true
        }

        fn next<R: Rng + ?Sized>(&self, current: u32, _neighbors: u32, _rng: &mut R) -> u32 {
            (current + 1).min(self.max)
        }
    }

    fn life() -> Scheduler<GameOfLife> {
        Scheduler::new(GameOfLife::default(), Discipline::Synchronous).unwrap()
    }

    fn with_pattern(shape: (usize, usize), pattern: &[(i64, i64)], center: (i64, i64)) -> Grid {
        let mut grid = Grid::new(shape, &[1]).unwrap();
        grid.place_pattern(pattern, Some(center), 1);
        grid
    }

    #[test]
    fn test_life_rejects_sequential() {
        let err = Scheduler::new(GameOfLife::default(), Discipline::Sequential).unwrap_err();
        assert!(matches!(
            err,
            Error::RuleMismatch {
                discipline: Discipline::Sequential,
                ..
            }
        ));
    }

    #[test]
    fn test_check_grid_reports_missing_actor() {
        let rule = Sirs::new(SirsParams::new(0.1, 0.1, 0.1).unwrap());
        let sirs = Scheduler::new(rule, Discipline::Sequential).unwrap();
        let life_grid = Grid::new((4, 4), &[1]).unwrap();
        assert!(matches!(sirs.check_grid(&life_grid), Err(Error::RuleMismatch { .. })));
        let sirs_grid = Grid::new((4, 4), &[1, 2]).unwrap();
        assert!(sirs.check_grid(&sirs_grid).is_ok());
    }

    #[test]
    fn test_empty_grid_stays_empty() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut grid = Grid::new((5, 5), &[1]).unwrap();
        life().step(&mut grid, &mut rng);
        assert_eq!(grid.count(1), 0);
    }

    #[test]
    fn test_blinker_has_period_two() {
        let mut rng = StdRng::seed_from_u64(0);
        let initial = with_pattern((5, 5), &pattern_blinker(), (2, 2));
        let sched = life();

        let once = sched.advance(initial.clone(), &mut rng);
        assert_eq!(once.live_cells(1), vec![(1, 2), (2, 2), (3, 2)]);

        let twice = sched.advance(once, &mut rng);
        assert_eq!(twice, initial);
    }

    #[test]
    fn test_beehive_and_block_are_still_lifes() {
        let mut rng = StdRng::seed_from_u64(0);
        let sched = life();
        for pattern in [pattern_beehive(), pattern_block()] {
            let initial = with_pattern((8, 8), &pattern, (3, 3));
            let next = sched.advance(initial.clone(), &mut rng);
            assert_eq!(next, initial);
        }
    }

    #[test]
    fn test_glider_translates_diagonally() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut grid = with_pattern((10, 10), &pattern_glider(), (4, 4));
        life().run(&mut grid, 4, &mut rng);
        assert_eq!(grid, with_pattern((10, 10), &pattern_glider(), (5, 5)));
    }

    #[test]
    fn test_glider_wraps_across_the_seam() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut grid = with_pattern((8, 8), &pattern_glider(), (7, 7));
        life().run(&mut grid, 4, &mut rng);
        assert_eq!(grid, with_pattern((8, 8), &pattern_glider(), (0, 0)));
    }

    #[test]
    fn test_synchronous_life_is_deterministic() {
        let mut seed_rng = StdRng::seed_from_u64(17);
        let mut initial = Grid::new((32, 24), &[1]).unwrap();
        initial.randomize(&mut seed_rng, None).unwrap();

        let a = life().advance(initial.clone(), &mut StdRng::seed_from_u64(1));
        let b = life().advance(initial, &mut StdRng::seed_from_u64(2));
        assert_eq!(a, b);
    }

    #[test]
    fn test_frozen_sirs_never_changes() {
        let rule = Sirs::new(SirsParams::new(0.0, 0.0, 0.0).unwrap());
        let mut rng = StdRng::seed_from_u64(8);
        for discipline in [Discipline::Synchronous, Discipline::Sequential] {
            let sched = Scheduler::new(rule, discipline).unwrap();
            let mut grid = rule.grid((12, 12)).unwrap();
            grid.randomize(&mut rng, None).unwrap();
            let initial = grid.clone();
            sched.run(&mut grid, 25, &mut rng);
            assert_eq!(grid, initial, "{discipline}");
        }
    }

    #[test]
    fn test_seeded_synchronous_sirs_is_reproducible() {
        let rule = Sirs::new(SirsParams::new(0.6, 0.3, 0.2).unwrap());
        let sched = Scheduler::new(rule, Discipline::Synchronous).unwrap();
        let mut base = rule.grid((20, 20)).unwrap();
        base.randomize(&mut StdRng::seed_from_u64(4), None).unwrap();

        let mut a = base.clone();
        let mut b = base;
        sched.run(&mut a, 10, &mut StdRng::seed_from_u64(99));
        sched.run(&mut b, 10, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn test_sequential_sweep_spreads_infection() {
        let rule = Sirs::new(SirsParams::new(1.0, 0.0, 0.0).unwrap());
        let sched = Scheduler::new(rule, Discipline::Sequential).unwrap();
        let mut grid = rule.grid((10, 10)).unwrap();
        grid.randomize(&mut StdRng::seed_from_u64(0), Some(&[0.0, 1.0, 0.0])).unwrap();
        grid.set(5, 5, 2);

        let mut rng = StdRng::seed_from_u64(3);
        sched.run(&mut grid, 60, &mut rng);
        // No recovery, so infection only grows until the torus is saturated.
        assert_eq!(grid.count(2), 100);
    }

    #[test]
    fn test_sequential_sweep_preserves_cell_total() {
        let rule = Sirs::new(SirsParams::new(0.4, 0.4, 0.4).unwrap());
        let sched = Scheduler::new(rule, Discipline::Sequential).unwrap();
        let mut grid = rule.grid((15, 9)).unwrap();
        let mut rng = StdRng::seed_from_u64(21);
        grid.randomize(&mut rng, None).unwrap();
        sched.run(&mut grid, 5, &mut rng);
        assert_eq!(grid.count(0) + grid.count(1) + grid.count(2), 15 * 9);
    }

    #[test]
    fn test_discipline_parses_its_display_form() {
        for d in [Discipline::Synchronous, Discipline::Sequential] {
            assert_eq!(d.to_string().parse::<Discipline>(), Ok(d));
        }
        assert!("random".parse::<Discipline>().is_err());
    }

    #[test]
    fn test_sequential_sweep_sees_earlier_writes() {
        // Snapshot updates could infect at most the direct neighbors of each
        // seed in one step; in-place updates let infection run further.
        let rule = Sirs::new(SirsParams::new(1.0, 0.0, 0.0).unwrap());
        let sched = Scheduler::new(rule, Discipline::Sequential).unwrap();
        let mut grid = rule.grid((400, 1)).unwrap();
        grid.randomize(&mut StdRng::seed_from_u64(0), Some(&[0.0, 1.0, 0.0])).unwrap();
        for x in (0..400).step_by(10) {
            grid.set(x, 0, rule.infected());
        }

        sched.step(&mut grid, &mut StdRng::seed_from_u64(17));

        let far = grid
            .live_cells(rule.infected())
            .into_iter()
            .filter(|&(x, _)| (2..=8).contains(&(x % 10)))
            .count();
        assert!(far > 0, "no infection beyond distance 1 after one sweep");
    }

    #[test]
    fn test_sequential_sweep_samples_with_replacement() {
        let rule = PickCounter { max: 20 };
        let sched = Scheduler::new(rule, Discipline::Sequential).unwrap();
        let actors: Vec<u32> = (1..=20).collect();
        let mut grid = Grid::new((10, 10), &actors).unwrap();

        sched.step(&mut grid, &mut StdRng::seed_from_u64(5));

        let picks = grid.cells();
        assert_eq!(picks.iter().map(|&c| c as usize).sum::<usize>(), grid.size());
        assert!(picks.iter().any(|&c| c == 0), "every cell was picked");
        assert!(picks.iter().any(|&c| c >= 2), "no cell was picked twice");
    }
}
