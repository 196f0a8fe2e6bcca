//! Point masses and the store that holds them

use glam::{DVec2, Vec2};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::config::SimulationConfig;
use crate::error::BodyError;

/// Heaviest mass the random layout produces; the lightest is 1
pub const MAX_RANDOM_MASS: u32 = 999;

/// A point mass.
///
/// `velocity_delta` is the per-step displacement increment. It is never
/// reset, so it behaves as a velocity with the step size folded in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    mass: f64,
    position: DVec2,
    velocity_delta: DVec2,
}

impl Body {
    /// A body at rest. Mass must be positive and finite.
    pub fn new(mass: f64, position: DVec2) -> Result<Self, BodyError> {
        if !mass.is_finite() || mass <= 0.0 {
            return Err(BodyError::InvalidMass(mass));
        }
        Ok(Self {
            mass,
            position,
            velocity_delta: DVec2::ZERO,
        })
    }

    pub fn with_velocity_delta(mut self, velocity_delta: DVec2) -> Self {
        self.velocity_delta = velocity_delta;
        self
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn position(&self) -> DVec2 {
        self.position
    }

    pub fn velocity_delta(&self) -> DVec2 {
        self.velocity_delta
    }

    /// Apply one step's acceleration, then move by the updated velocity delta
    pub(crate) fn advance(&mut self, acceleration: DVec2) {
        self.velocity_delta += acceleration;
        self.position += self.velocity_delta;
    }
}

/// Fixed-size, index-addressed collection of bodies.
///
/// Only the integrator mutates it; everything else sees `&[Body]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BodyStore {
    bodies: Vec<Body>,
}

impl BodyStore {
    pub fn new(bodies: Vec<Body>) -> Self {
        Self { bodies }
    }

    /// Random layout inside the middle half of the viewport.
    ///
    /// Masses are integers in `[1, 999]` and coordinates are integers in
    /// `[extent/4, 3*extent/4)` on each axis. The same seed always gives the
    /// same store.
    pub fn random(count: usize, width: u32, height: u32, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let bodies = (0..count)
            .map(|_| {
                let mass = rng.gen_range(1..=MAX_RANDOM_MASS);
                let x = rng.gen_range(0..width.max(1)) / 4 * 2 + width / 4;
                let y = rng.gen_range(0..height.max(1)) / 4 * 2 + height / 4;
                Body {
                    mass: f64::from(mass),
                    position: DVec2::new(f64::from(x), f64::from(y)),
                    velocity_delta: DVec2::ZERO,
                }
            })
            .collect();

        Self { bodies }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::random(config.body_count, config.width, config.height, config.seed)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Body> {
        self.bodies.get(index)
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn iter(&self) -> impl Iterator<Item = &Body> {
        self.bodies.iter()
    }

    pub(crate) fn bodies_mut(&mut self) -> &mut [Body] {
        &mut self.bodies
    }

    /// Copy positions into `out` at display precision. Extra slots on either
    /// side are left untouched.
    pub fn write_positions(&self, out: &mut [Vec2]) {
        for (slot, body) in out.iter_mut().zip(&self.bodies) {
            *slot = body.position.as_vec2();
        }
    }
}
