use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::equilibrium::{DEFAULT_MAX_STEPS, DEFAULT_TOLERANCE, DEFAULT_WINDOW};
use crate::error::{Error, Result};
use crate::simulation::Discipline;
use crate::stats::BOOTSTRAP_RESAMPLES;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Master seed; a fresh one is drawn per run when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Worker threads for trial batches (0 = all cores).
    #[serde(default)]
    pub workers: usize,
    #[serde(default = "RunConfig::default_output_dir")]
    pub output_dir: PathBuf,
}

impl RunConfig {
    fn default_output_dir() -> PathBuf {
        PathBuf::from("results")
    }

    /// The configured seed, or one drawn from entropy.
    pub fn master_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }

    /// Fix the seed so every experiment in this run, and the saved copy of
    /// the config, use the same one.
    pub fn resolve_seed(&mut self) -> u64 {
        let seed = self.master_seed();
        self.seed = Some(seed);
        seed
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: None,
            workers: 0,
            output_dir: Self::default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default = "GridConfig::default_side")]
    pub width: usize,
    #[serde(default = "GridConfig::default_side")]
    pub height: usize,
}

impl GridConfig {
    fn default_side() -> usize {
        50
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: Self::default_side(),
            height: Self::default_side(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquilibriumConfig {
    #[serde(default = "EquilibriumConfig::default_trials")]
    pub trials: usize,
    #[serde(default = "EquilibriumConfig::default_window")]
    pub window: usize,
    #[serde(default = "EquilibriumConfig::default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "EquilibriumConfig::default_max_steps")]
    pub max_steps: usize,
}

impl EquilibriumConfig {
    fn default_trials() -> usize {
        100
    }
    fn default_window() -> usize {
        DEFAULT_WINDOW
    }
    fn default_tolerance() -> f64 {
        DEFAULT_TOLERANCE
    }
    fn default_max_steps() -> usize {
        DEFAULT_MAX_STEPS
    }
}

impl Default for EquilibriumConfig {
    fn default() -> Self {
        Self {
            trials: Self::default_trials(),
            window: Self::default_window(),
            tolerance: Self::default_tolerance(),
            max_steps: Self::default_max_steps(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GliderConfig {
    #[serde(default = "GliderConfig::default_max_steps")]
    pub max_steps: usize,
}

impl GliderConfig {
    fn default_max_steps() -> usize {
        1000
    }
}

impl Default for GliderConfig {
    fn default() -> Self {
        Self {
            max_steps: Self::default_max_steps(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SirsConfig {
    /// Fixed recovery probability of the (p1, p3) sweep.
    #[serde(default = "SirsConfig::default_p2")]
    pub p2: f64,
    /// Lattice spacing of p1 and p3 in the sweep.
    #[serde(default = "SirsConfig::default_p_step")]
    pub p_step: f64,
    #[serde(default = "SirsConfig::default_warmup")]
    pub warmup: usize,
    #[serde(default = "SirsConfig::default_sweeps")]
    pub sweeps: usize,
    #[serde(default = "SirsConfig::default_resamples")]
    pub resamples: usize,
    #[serde(default = "SirsConfig::default_discipline")]
    pub discipline: Discipline,
}

impl SirsConfig {
    fn default_p2() -> f64 {
        0.5
    }
    fn default_p_step() -> f64 {
        0.05
    }
    fn default_warmup() -> usize {
        100
    }
    fn default_sweeps() -> usize {
        1000
    }
    fn default_resamples() -> usize {
        BOOTSTRAP_RESAMPLES
    }
    fn default_discipline() -> Discipline {
        Discipline::Sequential
    }
}

impl Default for SirsConfig {
    fn default() -> Self {
        Self {
            p2: Self::default_p2(),
            p_step: Self::default_p_step(),
            warmup: Self::default_warmup(),
            sweeps: Self::default_sweeps(),
            resamples: Self::default_resamples(),
            discipline: Self::default_discipline(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub equilibrium: EquilibriumConfig,
    #[serde(default)]
    pub glider: GliderConfig,
    #[serde(default)]
    pub sirs: SirsConfig,
}

impl Config {
    /// Parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Load `path` if it exists, falling back to defaults (with a warning)
    /// when it cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("{err}. Using defaults.");
                Self::default()
            }
        }
    }

    /// Write this config as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_or_default(&dir.path().join("absent.toml"));
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.grid.shape(), (50, 50));
        assert_eq!(cfg.equilibrium.window, 10);
        assert_eq!(cfg.sirs.resamples, 1000);
        assert_eq!(cfg.sirs.discipline, Discipline::Sequential);
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        fs::write(
            &path,
            "[run]\nseed = 7\n\n[grid]\nwidth = 20\n\n[sirs]\ndiscipline = \"synchronous\"\n",
        )
        .unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.run.seed, Some(7));
        assert_eq!(cfg.run.master_seed(), 7);
        assert_eq!(cfg.grid.shape(), (20, 50));
        assert_eq!(cfg.sirs.discipline, Discipline::Synchronous);
        assert_eq!(cfg.sirs.p2, 0.5);
        assert_eq!(cfg.equilibrium, EquilibriumConfig::default());
    }

    #[test]
    fn test_malformed_file_is_an_error_but_load_or_default_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[grid\nwidth = ").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
        assert_eq!(Config::load_or_default(&path), Config::default());
    }

    #[test]
    fn test_save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("saved.toml");
        let mut cfg = Config::default();
        cfg.run.seed = Some(99);
        cfg.equilibrium.trials = 12;
        cfg.sirs.p_step = 0.1;
        cfg.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), cfg);
    }

    #[test]
    fn test_resolve_seed_pins_the_seed() {
        let mut run = RunConfig::default();
        let seed = run.resolve_seed();
        assert_eq!(run.seed, Some(seed));
        assert_eq!(run.master_seed(), seed);

        let mut fixed = RunConfig {
            seed: Some(3),
            ..RunConfig::default()
        };
        assert_eq!(fixed.resolve_seed(), 3);
    }
}
