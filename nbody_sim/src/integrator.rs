//! CPU force integration
//!
//! One call to [`ForceIntegrator::step`] advances every body by one unit of
//! simulated time. Net forces are computed from the pre-step state of every
//! body before any body moves, so the result does not depend on the order
//! bodies are visited in.

use glam::DVec2;

use crate::body::{Body, BodyStore};

/// Gravitational constant, tuned for pixel-scale coordinates rather than SI
pub const G: f64 = 6.743e-6;

#[inline]
fn rounds_to_zero(v: f64) -> bool {
    v.round() == 0.0
}

/// Contribution of `other` to the force on `body`, before dividing by mass.
///
/// Bodies closer than half a unit on both axes are treated as coincident and
/// get magnitude `g * mi * mj` with no division by the squared distance. An
/// axis with exactly zero separation contributes nothing.
///
/// Antisymmetric: `pairwise_force(g, a, b) == -pairwise_force(g, b, a)`.
pub fn pairwise_force(g: f64, body: &Body, other: &Body) -> DVec2 {
    let r = body.position() - other.position();
    let mass_product = g * (body.mass() * other.mass());

    let magnitude = if rounds_to_zero(r.x) && rounds_to_zero(r.y) {
        mass_product
    } else {
        mass_product / r.length_squared()
    };

    let mut force = DVec2::ZERO;
    if r.x != 0.0 {
        force.x = -magnitude * r.x;
    }
    if r.y != 0.0 {
        force.y = -magnitude * r.y;
    }
    force
}

/// Sum of pairwise forces on `bodies[index]` from every other body, in index order
pub fn net_force(g: f64, bodies: &[Body], index: usize) -> DVec2 {
    let body = &bodies[index];
    bodies
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != index)
        .fold(DVec2::ZERO, |acc, (_, other)| {
            acc + pairwise_force(g, body, other)
        })
}

/// Direct-summation integrator with a reusable acceleration buffer
#[derive(Debug, Clone)]
pub struct ForceIntegrator {
    gravity: f64,
    accelerations: Vec<DVec2>,
}

impl ForceIntegrator {
    pub fn new(gravity: f64) -> Self {
        Self {
            gravity,
            accelerations: Vec::new(),
        }
    }

    /// Advance the store by one step. O(N²).
    pub fn step(&mut self, store: &mut BodyStore) {
        let bodies = store.bodies();
        let g = self.gravity;

        self.accelerations.clear();
        self.accelerations.extend(
            bodies
                .iter()
                .enumerate()
                .map(|(i, body)| net_force(g, bodies, i) / body.mass()),
        );

        for (body, acceleration) in store.bodies_mut().iter_mut().zip(&self.accelerations) {
            body.advance(*acceleration);
        }
    }
}

impl Default for ForceIntegrator {
    fn default() -> Self {
        Self::new(G)
    }
}
