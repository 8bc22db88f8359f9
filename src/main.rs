mod cli;

use clap::Parser;

use torus_automata::config::Config;
use torus_automata::equilibrium::EquilibriumDetector;
use torus_automata::export;
use torus_automata::harness::{
    glider_trial, infection_sweep, infection_trial, measure_equilibria, probability_lattice,
    GliderTrial, InfectionTrial, SweepPlan, TrialPool, TrialProgress,
};
use torus_automata::rule::SirsPreset;
use torus_automata::Result;

use cli::{Args, Command};

fn main() {
    env_logger::init();

    let args = Args::parse();
    let mut cfg = Config::load_or_default(&args.config);
    args.apply(&mut cfg);
    cfg.run.resolve_seed();

    if let Err(err) = run(&args.command, &cfg) {
        log::error!("{err}");
        std::process::exit(1);
    }
}

fn log_progress(label: &'static str) -> impl FnMut(&TrialProgress) {
    move |p: &TrialProgress| log::info!("{label}: completed {}/{}", p.finished(), p.total)
}

fn run(command: &Command, cfg: &Config) -> Result<()> {
    let path = cfg.run.output_dir.join(export::RUN_CONFIG_FILE);
    cfg.save(&path)?;
    log::info!("Saved run config to {}", path.display());

    match command {
        Command::Equilibrium { .. } => run_equilibrium(cfg),
        Command::Glider { .. } => run_glider(cfg),
        Command::Infections { .. } => run_infections(cfg),
        Command::Sirs { preset, .. } => run_preset(cfg, *preset),
    }
}

fn run_equilibrium(cfg: &Config) -> Result<()> {
    let pool = TrialPool::new(cfg.run.workers);
    let seed = cfg.run.master_seed();
    let eq = &cfg.equilibrium;
    log::info!(
        "Equilibrium: {} trials on {}x{} with {} workers (seed {seed})",
        eq.trials,
        cfg.grid.width,
        cfg.grid.height,
        pool.workers()
    );

    let detector = EquilibriumDetector::new(1)
        .with_window(eq.window)
        .with_tolerance(eq.tolerance)
        .with_max_steps(eq.max_steps);
    let report = measure_equilibria(
        &pool,
        cfg.grid.shape(),
        detector,
        eq.trials,
        seed,
        log_progress("equilibrium"),
    );

    let mut steps: Vec<(usize, usize)> = report.completed.clone();
    steps.sort_unstable();
    let steps: Vec<usize> = steps.into_iter().map(|(_, s)| s).collect();
    let path = cfg.run.output_dir.join(export::EQUILIBRIUM_FILE);
    export::write_equilibrium_steps(&path, &steps)?;

    if let Some(summary) = report.summary(|&s| s as f64) {
        log::info!(
            "Mean steps to equilibrium {:.1} (std dev {:.1}) over {} trials",
            summary.mean,
            summary.std_dev(),
            summary.count
        );
    }
    if !report.failures.is_empty() {
        log::warn!("{} of {} trials failed", report.failures.len(), report.total);
    }
    log::info!("Wrote {}", path.display());
    Ok(())
}

fn run_glider(cfg: &Config) -> Result<()> {
    let track = glider_trial(GliderTrial {
        shape: cfg.grid.shape(),
        max_steps: cfg.glider.max_steps,
    })?;
    let path = cfg.run.output_dir.join(export::GLIDER_FILE);
    export::write_trajectory(&path, &track)?;
    log::info!(
        "Glider speed {:.4} cells/step over {} steps",
        track.speed,
        track.points.len()
    );
    log::info!("Wrote {}", path.display());
    Ok(())
}

fn run_infections(cfg: &Config) -> Result<()> {
    let pool = TrialPool::new(cfg.run.workers);
    let lattice = probability_lattice(cfg.sirs.p_step)?;
    let plan = SweepPlan {
        shape: cfg.grid.shape(),
        p2: cfg.sirs.p2,
        p1_values: lattice.clone(),
        p3_values: lattice,
        discipline: cfg.sirs.discipline,
        warmup: cfg.sirs.warmup,
        sweeps: cfg.sirs.sweeps,
        resamples: cfg.sirs.resamples,
        seed: cfg.run.master_seed(),
    };
    log::info!(
        "Infection sweep: {}x{} points at p2 = {}, {} update, {} workers (seed {})",
        plan.p1_values.len(),
        plan.p3_values.len(),
        plan.p2,
        plan.discipline,
        pool.workers(),
        plan.seed
    );

    let report = infection_sweep(&pool, &plan, log_progress("infections"))?;
    if !report.failures.is_empty() {
        log::warn!("{} sweep points failed", report.failures.len());
    }
    let path = cfg.run.output_dir.join(export::PHASE_FILE);
    export::write_phase_diagram(&path, &report.diagram)?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

fn run_preset(cfg: &Config, preset: SirsPreset) -> Result<()> {
    let params = preset.params();
    let seed = cfg.run.master_seed();
    log::info!(
        "SIRS preset {preset}: p1 = {}, p2 = {}, p3 = {} (seed {seed})",
        params.p1,
        params.p2,
        params.p3
    );

    let series = infection_trial(InfectionTrial {
        shape: cfg.grid.shape(),
        params,
        discipline: cfg.sirs.discipline,
        warmup: cfg.sirs.warmup,
        sweeps: cfg.sirs.sweeps,
        seed,
    })?;
    let path = cfg.run.output_dir.join(export::SERIES_FILE);
    export::write_series(&path, &series.infected)?;
    log::info!("Wrote {}", path.display());
    Ok(())
}
