use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::harness::PhaseDiagram;
use crate::observe::Trajectory;

/// Default file names inside the output directory.
pub const EQUILIBRIUM_FILE: &str = "equilibrium.txt";
pub const GLIDER_FILE: &str = "glidercom.txt";
pub const PHASE_FILE: &str = "sirs_phase.json";
pub const SERIES_FILE: &str = "sirs_series.txt";
pub const RUN_CONFIG_FILE: &str = "run.toml";

fn create(path: &Path) -> Result<fs::File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(fs::File::create(path)?)
}

fn join_commas<T: ToString>(values: &[T]) -> String {
    values.iter().map(T::to_string).collect::<Vec<_>>().join(",")
}

/// Equilibrium step counts as one comma-separated line.
pub fn write_equilibrium_steps(path: &Path, steps: &[usize]) -> Result<()> {
    let mut f = create(path)?;
    f.write_all(join_commas(steps).as_bytes())?;
    Ok(())
}

/// One `x,y` line per trajectory point, then the speed on the last line.
pub fn write_trajectory(path: &Path, trajectory: &Trajectory) -> Result<()> {
    let mut f = create(path)?;
    for &(x, y) in &trajectory.points {
        writeln!(f, "{x},{y}")?;
    }
    write!(f, "{}", trajectory.speed)?;
    Ok(())
}

/// Infected counts of a single run as one comma-separated line.
pub fn write_series(path: &Path, infected: &[u32]) -> Result<()> {
    let mut f = create(path)?;
    f.write_all(join_commas(infected).as_bytes())?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct PhaseCell {
    value: f64,
    variance: f64,
    error: f64,
}

/// Phase diagram as nested JSON: `{ "<p1>": { "<p3>": {value, variance, error} } }`.
pub fn write_phase_diagram(path: &Path, diagram: &PhaseDiagram) -> Result<()> {
    let mut nested: BTreeMap<String, BTreeMap<String, PhaseCell>> = BTreeMap::new();
    for p in &diagram.points {
        nested.entry(p.p1.to_string()).or_default().insert(
            p.p3.to_string(),
            PhaseCell {
                value: p.value,
                variance: p.variance,
                error: p.error,
            },
        );
    }
    let f = create(path)?;
    serde_json::to_writer_pretty(f, &nested)?;
    Ok(())
}
