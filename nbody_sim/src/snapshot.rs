//! Per-frame position snapshot handed to the renderer

use glam::Vec2;

/// Positions of every body after one completed step, in index order.
///
/// Only the frame driver writes into a snapshot, and only into the one that
/// is not currently published.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PresentationSnapshot {
    positions: Vec<Vec2>,
}

impl PresentationSnapshot {
    /// Snapshot with `len` slots at the origin
    pub fn new(len: usize) -> Self {
        Self {
            positions: vec![Vec2::ZERO; len],
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    pub(crate) fn positions_mut(&mut self) -> &mut [Vec2] {
        &mut self.positions
    }

    /// Raw bytes for uploading as a `Float32x2` vertex buffer
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Order-sensitive sum of coordinates, for comparing runs in logs
    pub fn checksum(&self) -> f64 {
        self.positions
            .iter()
            .enumerate()
            .map(|(i, p)| (i as f64 + 1.0) * (f64::from(p.x) + f64::from(p.y)))
            .sum()
    }
}
