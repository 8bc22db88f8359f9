use std::path::PathBuf;

use clap::{Parser, Subcommand};

use torus_automata::config::Config;
use torus_automata::rule::SirsPreset;
use torus_automata::simulation::Discipline;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Path to config TOML
    #[arg(long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Master seed (overrides config)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Worker threads, 0 = all cores (overrides config)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Output directory for artifacts (overrides config)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Grid width (overrides config)
    #[arg(long)]
    pub width: Option<usize>,

    /// Grid height (overrides config)
    #[arg(long)]
    pub height: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Steps to equilibrium for random Game of Life soups
    Equilibrium {
        #[arg(long)]
        trials: Option<usize>,
    },
    /// Track a glider's center of mass and report its speed
    Glider {
        #[arg(long)]
        max_steps: Option<usize>,
    },
    /// Sweep p1 and p3 at fixed p2 and write the SIRS phase diagram
    Infections {
        #[arg(long)]
        p2: Option<f64>,
        #[arg(long)]
        sweeps: Option<usize>,
        #[arg(long)]
        discipline: Option<Discipline>,
    },
    /// Run one SIRS preset and write its infected-count series
    Sirs {
        /// absorbing, dynamic-equilibrium or cyclic-waves
        #[arg(long, default_value = "dynamic-equilibrium")]
        preset: SirsPreset,
        #[arg(long)]
        sweeps: Option<usize>,
        #[arg(long)]
        discipline: Option<Discipline>,
    },
}

impl Args {
    /// Fold command-line overrides into the loaded config.
    pub fn apply(&self, cfg: &mut Config) {
        if let Some(seed) = self.seed {
            cfg.run.seed = Some(seed);
        }
        if let Some(workers) = self.workers {
            cfg.run.workers = workers;
        }
        if let Some(out) = &self.out {
            cfg.run.output_dir = out.clone();
        }
        if let Some(w) = self.width {
            cfg.grid.width = w;
        }
        if let Some(h) = self.height {
            cfg.grid.height = h;
        }

        match &self.command {
            Command::Equilibrium { trials } => {
                if let Some(trials) = *trials {
                    cfg.equilibrium.trials = trials;
                }
            }
            Command::Glider { max_steps } => {
                if let Some(max_steps) = *max_steps {
                    cfg.glider.max_steps = max_steps;
                }
            }
            Command::Infections {
                p2,
                sweeps,
                discipline,
            } => {
                if let Some(p2) = *p2 {
                    cfg.sirs.p2 = p2;
                }
                if let Some(sweeps) = *sweeps {
                    cfg.sirs.sweeps = sweeps;
                }
                if let Some(discipline) = *discipline {
                    cfg.sirs.discipline = discipline;
                }
            }
            Command::Sirs {
                sweeps, discipline, ..
            } => {
                if let Some(sweeps) = *sweeps {
                    cfg.sirs.sweeps = sweeps;
                }
                if let Some(discipline) = *discipline {
                    cfg.sirs.discipline = discipline;
                }
            }
        }
    }
}
