use std::collections::VecDeque;

use rand::Rng;

use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::rule::Rule;
use crate::simulation::Scheduler;

/// Default number of trailing counts compared.
pub const DEFAULT_WINDOW: usize = 10;

/// Default absolute tolerance on the monitored count.
pub const DEFAULT_TOLERANCE: f64 = 1.0;

/// Default step budget before giving up.
pub const DEFAULT_MAX_STEPS: usize = 10_000;

/// Sliding window over the most recent per-step counts.
#[derive(Debug, Clone)]
pub struct CountWindow {
    capacity: usize,
    counts: VecDeque<usize>,
}

impl CountWindow {
    /// A window of `capacity` entries, raised to 2 if smaller.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            capacity,
            counts: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Append a count, evicting the oldest once over capacity.
    pub fn push(&mut self, count: usize) {
        self.counts.push_back(count);
        if self.counts.len() > self.capacity {
            self.counts.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// True when every retained count lies within `tolerance` of the oldest
    /// retained count.
    pub fn is_settled(&self, tolerance: f64) -> bool {
        let Some(&reference) = self.counts.front() else {
            return false;
        };
        self.counts
            .iter()
            .all(|&c| (c as f64 - reference as f64).abs() <= tolerance)
    }

    pub fn counts(&self) -> impl Iterator<Item = usize> + '_ {
        self.counts.iter().copied()
    }
}

/// Steps a grid until the count of one actor stops changing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquilibriumDetector {
    /// Actor whose population is monitored.
    pub actor: u32,
    /// Number of trailing counts that must agree. Values below 2 are run
    /// as 2, since a single count always agrees with itself.
    pub window: usize,
    /// Maximum absolute deviation from the window's oldest count.
    pub tolerance: f64,
    /// Steps allowed before failing with [`Error::EquilibriumNotReached`].
    pub max_steps: usize,
}

impl EquilibriumDetector {
    pub fn new(actor: u32) -> Self {
        Self {
            actor,
            window: DEFAULT_WINDOW,
            tolerance: DEFAULT_TOLERANCE,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// See [`EquilibriumDetector::window`] for the minimum.
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Run `scheduler` on `grid` until equilibrium and return the number of
    /// steps executed. At least one step always runs.
    pub fn run<R: Rule, G: Rng + ?Sized>(
        &self,
        grid: &mut Grid,
        scheduler: &Scheduler<R>,
        rng: &mut G,
    ) -> Result<usize> {
        let mut window = CountWindow::new(self.window);
        window.push(grid.count(self.actor));

        scheduler.step(grid, rng);
        window.push(grid.count(self.actor));
        let mut steps = 1;

        while !window.is_settled(self.tolerance) {
            if steps >= self.max_steps {
                return Err(Error::EquilibriumNotReached { steps });
            }
            scheduler.step(grid, rng);
            window.push(grid.count(self.actor));
            steps += 1;
        }

        log::debug!("actor {} settled after {steps} steps", self.actor);
        Ok(steps)
    }
}
