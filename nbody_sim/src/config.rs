//! Simulation parameters

use clap::ValueEnum;

use crate::error::ConfigError;
use crate::integrator::G;

pub const DEFAULT_WIDTH: u32 = 1904;
pub const DEFAULT_HEIGHT: u32 = 1071;
pub const DEFAULT_SEED: u64 = 500;

/// Where the force computation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Sequential double loop on the host
    Cpu,
    /// WGSL compute kernel, one invocation per body
    Gpu,
}

/// Body count that keeps each backend at interactive frame rates
pub fn default_body_count(backend: Backend) -> usize {
    match backend {
        Backend::Cpu => 2_000,
        Backend::Gpu => 100_000,
    }
}

/// Everything needed to build the initial body store and pick a backend.
///
/// The time step is fixed at one simulated unit and is not configurable.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub body_count: usize,
    /// Viewport bounds used for the random initial layout
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    pub gravity: f64,
    pub backend: Backend,
}

impl SimulationConfig {
    pub fn for_backend(backend: Backend) -> Self {
        Self {
            body_count: default_body_count(backend),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            seed: DEFAULT_SEED,
            gravity: G,
            backend,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.body_count == 0 {
            return Err(ConfigError::NoBodies);
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::EmptyViewport {
                width: self.width,
                height: self.height,
            });
        }
        if !self.gravity.is_finite() || self.gravity <= 0.0 {
            return Err(ConfigError::InvalidGravity(self.gravity));
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::for_backend(Backend::Cpu)
    }
}
