use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::grid::{Grid, BACKGROUND};
use crate::neighborhood::Connectivity;
use crate::simulation::Discipline;

/// A cell transition: `(current value, neighbor count) -> next value`.
///
/// The neighbor count is the number of cells holding [`Rule::watched`] under
/// [`Rule::connectivity`]. Deterministic rules ignore `rng`.
pub trait Rule: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Actor whose neighbors are counted.
    fn watched(&self) -> u32;

    fn connectivity(&self) -> Connectivity;

    /// Every actor code the rule reads or writes.
    fn actors(&self) -> Vec<u32>;

    fn supports(&self, discipline: Discipline) -> bool;

    fn next<R: Rng + ?Sized>(&self, current: u32, neighbors: u32, rng: &mut R) -> u32;
}

// ── Game of Life ────────────────────────────────────────────────────────────

/// Conway's B3/S23 on the 8-neighborhood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameOfLife {
    alive: u32,
}

impl GameOfLife {
    pub fn new(alive: u32) -> Self {
        Self { alive }
    }

    /// Resolve the alive role to the grid's first non-background actor.
    pub fn for_grid(grid: &Grid) -> Self {
        Self::new(grid.actors()[1])
    }

    pub fn alive(&self) -> u32 {
        self.alive
    }
}

impl Default for GameOfLife {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Rule for GameOfLife {
    fn name(&self) -> &'static str {
        "game-of-life"
    }

    fn watched(&self) -> u32 {
        self.alive
    }

    fn connectivity(&self) -> Connectivity {
        Connectivity::Eight
    }

    fn actors(&self) -> Vec<u32> {
        vec![BACKGROUND, self.alive]
    }

    /// Birth and survival assume every cell sees the same generation.
    fn supports(&self, discipline: Discipline) -> bool {
        discipline == Discipline::Synchronous
    }

    fn next<R: Rng + ?Sized>(&self, current: u32, neighbors: u32, _rng: &mut R) -> u32 {
        let next_alive = if current == self.alive {
            neighbors == 2 || neighbors == 3
        } else {
            neighbors == 3
        };
        if next_alive {
            self.alive
        } else {
            BACKGROUND
        }
    }
}

// ── SIRS ────────────────────────────────────────────────────────────────────

/// Transition probabilities of the SIRS model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SirsParams {
    /// Susceptible -> infected, given at least one infected neighbor.
    pub p1: f64,
    /// Infected -> recovered.
    pub p2: f64,
    /// Recovered -> susceptible.
    pub p3: f64,
}

impl SirsParams {
    pub fn new(p1: f64, p2: f64, p3: f64) -> Result<Self> {
        for (name, value) in [("p1", p1), ("p2", p2), ("p3", p3)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidProbability { name, value });
            }
        }
        Ok(Self { p1, p2, p3 })
    }
}

/// Parameter sets with recognisable long-run behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SirsPreset {
    /// Infection burns out and the lattice settles into an absorbing state.
    Absorbing,
    /// Infected fraction fluctuates around a steady value.
    DynamicEquilibrium,
    /// Infection travels as repeating wave fronts.
    CyclicWaves,
}

impl SirsPreset {
    pub fn params(self) -> SirsParams {
        let (p1, p2, p3) = match self {
            SirsPreset::Absorbing => (0.5, 0.5, 0.02),
            SirsPreset::DynamicEquilibrium => (0.1, 0.1, 0.1),
            SirsPreset::CyclicWaves => (0.32, 0.12, 0.02),
        };
        SirsParams { p1, p2, p3 }
    }
}

impl fmt::Display for SirsPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SirsPreset::Absorbing => write!(f, "absorbing"),
            SirsPreset::DynamicEquilibrium => write!(f, "dynamic-equilibrium"),
            SirsPreset::CyclicWaves => write!(f, "cyclic-waves"),
        }
    }
}

impl FromStr for SirsPreset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "absorbing" => Ok(SirsPreset::Absorbing),
            "dynamic-equilibrium" => Ok(SirsPreset::DynamicEquilibrium),
            "cyclic-waves" => Ok(SirsPreset::CyclicWaves),
            other => Err(format!(
                "unknown preset '{other}' (expected absorbing, dynamic-equilibrium or cyclic-waves)"
            )),
        }
    }
}

/// Actor codes for each SIRS role. Recovered is always the background code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SirsRoles {
    pub susceptible: u32,
    pub infected: u32,
    /// Optional fourth state that never changes.
    pub immune: Option<u32>,
}

impl SirsRoles {
    /// Non-background codes, in grid order.
    pub fn active(&self) -> Vec<u32> {
        let mut codes = vec![self.susceptible, self.infected];
        codes.extend(self.immune);
        codes
    }
}

impl Default for SirsRoles {
    fn default() -> Self {
        Self {
            susceptible: 1,
            infected: 2,
            immune: None,
        }
    }
}

/// Stochastic susceptible / infected / recovered / susceptible epidemic on
/// the 4-neighborhood.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sirs {
    params: SirsParams,
    roles: SirsRoles,
}

impl Sirs {
    pub fn new(params: SirsParams) -> Self {
        Self {
            params,
            roles: SirsRoles::default(),
        }
    }

    pub fn with_roles(params: SirsParams, roles: SirsRoles) -> Result<Self> {
        let codes = roles.active();
        for (i, code) in codes.iter().enumerate() {
            if *code == BACKGROUND || codes[..i].contains(code) {
                return Err(Error::InvalidActors {
                    reason: format!("SIRS role code {code} is reused or collides with recovered"),
                });
            }
        }
        Ok(Self { params, roles })
    }

    pub fn params(&self) -> SirsParams {
        self.params
    }

    pub fn roles(&self) -> SirsRoles {
        self.roles
    }

    pub fn susceptible(&self) -> u32 {
        self.roles.susceptible
    }

    pub fn infected(&self) -> u32 {
        self.roles.infected
    }

    pub fn recovered(&self) -> u32 {
        BACKGROUND
    }

    /// An empty grid carrying exactly this rule's actors.
    pub fn grid(&self, shape: (usize, usize)) -> Result<Grid> {
        Grid::new(shape, &self.roles.active())
    }
}

impl Rule for Sirs {
    fn name(&self) -> &'static str {
        "sirs"
    }

    fn watched(&self) -> u32 {
        self.roles.infected
    }

    fn connectivity(&self) -> Connectivity {
        Connectivity::Four
    }

    fn actors(&self) -> Vec<u32> {
        let mut codes = vec![BACKGROUND];
        codes.extend(self.roles.active());
        codes
    }

    fn supports(&self, _discipline: Discipline) -> bool {
        true
    }

    fn next<R: Rng + ?Sized>(&self, current: u32, neighbors: u32, rng: &mut R) -> u32 {
        // Strict `r < p`: a zero probability never fires, even on a zero draw.
        let r: f64 = rng.gen();
        let SirsParams { p1, p2, p3 } = self.params;

        if current == self.roles.susceptible {
            if neighbors > 0 && r < p1 {
                return self.roles.infected;
            }
        } else if current == self.roles.infected {
            if r < p2 {
                return BACKGROUND;
            }
        } else if current == BACKGROUND && r < p3 {
            return self.roles.susceptible;
        }
        current
    }
}
