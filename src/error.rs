use thiserror::Error;

use crate::simulation::Discipline;

/// Everything that can go wrong while building or running a simulation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid grid shape {width}x{height}: both dimensions must be positive")]
    InvalidShape { width: usize, height: usize },

    #[error("invalid actor list: {reason}")]
    InvalidActors { reason: String },

    #[error("invalid distribution: {reason}")]
    InvalidDistribution { reason: String },

    #[error("probability {name}={value} is outside [0, 1]")]
    InvalidProbability { name: &'static str, value: f64 },

    #[error("actor {actor} is not present on the grid")]
    NoSuchActor { actor: u32 },

    #[error("rule {rule} cannot run under the {discipline} discipline: {reason}")]
    RuleMismatch {
        rule: &'static str,
        discipline: Discipline,
        reason: String,
    },

    #[error("trial {index} failed: {reason}")]
    TrialFailure { index: usize, reason: String },

    #[error("equilibrium not reached within {steps} steps")]
    EquilibriumNotReached { steps: usize },

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
