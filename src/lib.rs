pub mod config;
pub mod equilibrium;
pub mod error;
pub mod export;
pub mod grid;
pub mod harness;
pub mod neighborhood;
pub mod observe;
pub mod rule;
pub mod simulation;
pub mod stats;

pub use error::{Error, Result};
