use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::unbounded;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::equilibrium::EquilibriumDetector;
use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::observe::{glider_trajectory, Trajectory};
use crate::rule::{GameOfLife, Sirs, SirsParams};
use crate::simulation::{Discipline, Scheduler};
use crate::stats::{bootstrap_std_error, mean, population_variance, Summary};

/// Progress snapshot, delivered after every finished trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialProgress {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

impl TrialProgress {
    pub fn finished(&self) -> usize {
        self.completed + self.failed
    }
}

/// A trial that returned an error or panicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialFailure {
    pub index: usize,
    pub reason: String,
}

impl From<TrialFailure> for Error {
    fn from(f: TrialFailure) -> Self {
        Error::TrialFailure {
            index: f.index,
            reason: f.reason,
        }
    }
}

/// Everything a batch produced. `completed` is in completion order and
/// tagged with each trial's submission index.
#[derive(Debug, Clone)]
pub struct BatchReport<T> {
    pub total: usize,
    pub completed: Vec<(usize, T)>,
    pub failures: Vec<TrialFailure>,
}

impl<T> BatchReport<T> {
    pub fn results(&self) -> impl Iterator<Item = &T> {
        self.completed.iter().map(|(_, t)| t)
    }

    /// Aggregate a scalar over completed trials only.
    pub fn summary<F: Fn(&T) -> f64>(&self, scalar: F) -> Option<Summary> {
        let samples: Vec<f64> = self.results().map(scalar).collect();
        Summary::of(&samples)
    }
}

/// Fixed-size pool of worker threads for independent trials.
#[derive(Debug, Clone, Copy)]
pub struct TrialPool {
    workers: usize,
}

impl TrialPool {
    /// `workers == 0` uses the machine's available parallelism.
    pub fn new(workers: usize) -> Self {
        let workers = if workers == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            workers
        };
        Self { workers }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `trial` on every descriptor and block until all have finished.
    ///
    /// A trial that errors or panics is recorded in `failures` and does not
    /// disturb the others.
    pub fn run<D, T, F, P>(&self, descriptors: Vec<D>, trial: F, mut progress: P) -> BatchReport<T>
    where
        D: Send,
        T: Send,
        F: Fn(D) -> Result<T> + Sync,
        P: FnMut(&TrialProgress),
    {
        let total = descriptors.len();
        let mut report = BatchReport {
            total,
            completed: Vec::with_capacity(total),
            failures: Vec::new(),
        };
        if total == 0 {
            return report;
        }

        let (job_tx, job_rx) = unbounded::<(usize, D)>();
        for job in descriptors.into_iter().enumerate() {
            // The receiver lives until the end of this function.
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        let (result_tx, result_rx) = unbounded::<(usize, std::result::Result<T, String>)>();
        let workers = self.workers.clamp(1, total);
        let trial = &trial;

        thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for (index, descriptor) in job_rx.iter() {
                        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| trial(descriptor))) {
                            Ok(Ok(value)) => Ok(value),
                            Ok(Err(err)) => Err(err.to_string()),
                            Err(payload) => Err(panic_message(payload.as_ref())),
                        };
                        if result_tx.send((index, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            for (index, outcome) in result_rx.iter() {
                match outcome {
                    Ok(value) => report.completed.push((index, value)),
                    Err(reason) => {
                        log::warn!("trial {index} failed: {reason}");
                        report.failures.push(TrialFailure { index, reason });
                    }
                }
                progress(&TrialProgress {
                    completed: report.completed.len(),
                    failed: report.failures.len(),
                    total,
                });
            }
        });

        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// `n` independent per-trial seeds derived from one master seed.
pub fn trial_seeds(master: u64, n: usize) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(master);
    (0..n).map(|_| rng.gen()).collect()
}

// ── Trial entry points ──────────────────────────────────────────────────────

/// One Game of Life run from a random soup to equilibrium.
#[derive(Debug, Clone, Copy)]
pub struct EquilibriumTrial {
    pub shape: (usize, usize),
    pub detector: EquilibriumDetector,
    pub seed: u64,
}

/// Steps until the live count settles.
pub fn equilibrium_trial(trial: EquilibriumTrial) -> Result<usize> {
    let mut rng = StdRng::seed_from_u64(trial.seed);
    let mut grid = Grid::new(trial.shape, &[1])?;
    grid.randomize(&mut rng, None)?;
    let life = GameOfLife::for_grid(&grid);
    let detector = EquilibriumDetector {
        actor: life.alive(),
        ..trial.detector
    };
    let scheduler = Scheduler::new(life, Discipline::Synchronous)?;
    detector.run(&mut grid, &scheduler, &mut rng)
}

/// One SIRS run: warm-up sweeps, then measured sweeps.
#[derive(Debug, Clone, Copy)]
pub struct InfectionTrial {
    pub shape: (usize, usize),
    pub params: SirsParams,
    pub discipline: Discipline,
    pub warmup: usize,
    pub sweeps: usize,
    pub seed: u64,
}

/// Infected count after each measured sweep, with the parameters that
/// produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfectionSeries {
    pub infected: Vec<u32>,
    pub p1: f64,
    pub p3: f64,
}

/// Run one SIRS trial. Once the infection dies out the lattice can never be
/// reinfected, so the rest of the series is filled with zeros.
pub fn infection_trial(trial: InfectionTrial) -> Result<InfectionSeries> {
    let mut rng = StdRng::seed_from_u64(trial.seed);
    let rule = Sirs::new(trial.params);
    let scheduler = Scheduler::new(rule, trial.discipline)?;
    let mut grid = rule.grid(trial.shape)?;
    scheduler.check_grid(&grid)?;
    grid.randomize(&mut rng, None)?;

    let infected = rule.infected();
    for _ in 0..trial.warmup {
        if grid.count(infected) == 0 {
            break;
        }
        scheduler.step(&mut grid, &mut rng);
    }

    let mut series = Vec::with_capacity(trial.sweeps);
    while series.len() < trial.sweeps {
        if grid.count(infected) == 0 {
            series.resize(trial.sweeps, 0);
            break;
        }
        scheduler.step(&mut grid, &mut rng);
        series.push(grid.count(infected) as u32);
    }

    Ok(InfectionSeries {
        infected: series,
        p1: trial.params.p1,
        p3: trial.params.p3,
    })
}

/// One glider launched across an empty grid.
#[derive(Debug, Clone, Copy)]
pub struct GliderTrial {
    pub shape: (usize, usize),
    pub max_steps: usize,
}

pub fn glider_trial(trial: GliderTrial) -> Result<Trajectory> {
    // Game of Life never draws from the generator; any seed will do.
    let mut rng = StdRng::seed_from_u64(0);
    glider_trajectory(trial.shape, trial.max_steps, &mut rng)
}

// ── Experiments ─────────────────────────────────────────────────────────────

/// Run `trials` equilibrium measurements on fresh random soups.
pub fn measure_equilibria<P: FnMut(&TrialProgress)>(
    pool: &TrialPool,
    shape: (usize, usize),
    detector: EquilibriumDetector,
    trials: usize,
    master_seed: u64,
    progress: P,
) -> BatchReport<usize> {
    let descriptors: Vec<EquilibriumTrial> = trial_seeds(master_seed, trials)
        .into_iter()
        .map(|seed| EquilibriumTrial {
            shape,
            detector,
            seed,
        })
        .collect();
    pool.run(descriptors, equilibrium_trial, progress)
}

/// Probabilities `0, step, 2*step, ...` below 1, rounded to three decimals.
pub fn probability_lattice(step: f64) -> Result<Vec<f64>> {
    if !(step > 0.0 && step <= 1.0) {
        return Err(Error::InvalidProbability {
            name: "step",
            value: step,
        });
    }
    let n = (1.0 / step - 1e-9).ceil() as usize;
    Ok((0..n).map(|i| (i as f64 * step * 1000.0).round() / 1000.0).collect())
}

/// Parameters of a (p1, p3) infection sweep at fixed p2.
#[derive(Debug, Clone)]
pub struct SweepPlan {
    pub shape: (usize, usize),
    pub p2: f64,
    pub p1_values: Vec<f64>,
    pub p3_values: Vec<f64>,
    pub discipline: Discipline,
    pub warmup: usize,
    pub sweeps: usize,
    pub resamples: usize,
    pub seed: u64,
}

/// Long-run infection statistics at one (p1, p3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhasePoint {
    pub p1: f64,
    pub p3: f64,
    /// Mean infected fraction per site.
    pub value: f64,
    /// Variance of the infected count per site.
    pub variance: f64,
    /// Bootstrap standard error of `variance`.
    pub error: f64,
}

/// Phase diagram of a sweep, points ordered by (p1, p3).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseDiagram {
    pub p2: f64,
    pub points: Vec<PhasePoint>,
}

/// Outcome of a sweep: the diagram over completed trials, plus failures.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub diagram: PhaseDiagram,
    pub failures: Vec<TrialFailure>,
}

/// Run one infection trial per (p1, p3) and reduce each series to a phase
/// point.
pub fn infection_sweep<P: FnMut(&TrialProgress)>(
    pool: &TrialPool,
    plan: &SweepPlan,
    progress: P,
) -> Result<SweepReport> {
    let grid_points: Vec<(f64, f64)> = plan
        .p1_values
        .iter()
        .flat_map(|&p1| plan.p3_values.iter().map(move |&p3| (p1, p3)))
        .collect();
    let seeds = trial_seeds(plan.seed, grid_points.len());

    let mut descriptors = Vec::with_capacity(grid_points.len());
    for (&(p1, p3), &seed) in grid_points.iter().zip(&seeds) {
        descriptors.push(InfectionTrial {
            shape: plan.shape,
            params: SirsParams::new(p1, plan.p2, p3)?,
            discipline: plan.discipline,
            warmup: plan.warmup,
            sweeps: plan.sweeps,
            seed,
        });
    }

    let report = pool.run(descriptors, infection_trial, progress);
    let sites = (plan.shape.0 * plan.shape.1) as f64;

    let mut points: Vec<PhasePoint> = report
        .completed
        .iter()
        .map(|(index, series)| {
            let samples: Vec<f64> = series.infected.iter().map(|&c| c as f64).collect();
            let per_site_variance = |s: &[f64]| population_variance(s).unwrap_or(0.0) / sites;
            // Seeded per trial so the estimate does not depend on completion order.
            let mut rng = StdRng::seed_from_u64(seeds[*index].rotate_left(32));
            PhasePoint {
                p1: series.p1,
                p3: series.p3,
                value: mean(&samples).unwrap_or(0.0) / sites,
                variance: per_site_variance(&samples),
                error: bootstrap_std_error(&samples, plan.resamples, per_site_variance, &mut rng),
            }
        })
        .collect();
    points.sort_by(|a, b| a.p1.total_cmp(&b.p1).then(a.p3.total_cmp(&b.p3)));

    Ok(SweepReport {
        diagram: PhaseDiagram { p2: plan.p2, points },
        failures: report.failures,
    })
}
