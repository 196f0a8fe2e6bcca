//! Common utilities for GPU-backed simulations
//!
//! This crate provides shared device setup, the 2D camera and shader
//! compilation helpers used by the n-body simulation.

pub mod camera;
pub mod error;
pub mod graphics;
pub mod shader;

pub use camera::*;
pub use error::*;
pub use graphics::*;
pub use shader::*;
