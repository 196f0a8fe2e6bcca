//! Error types for the simulation core

use common::ShaderError;
use thiserror::Error;

/// Rejected body construction
#[derive(Debug, Error, PartialEq)]
pub enum BodyError {
    #[error("body mass must be positive and finite, got {0}")]
    InvalidMass(f64),
}

/// Rejected simulation parameters
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("body count must be at least 1")]
    NoBodies,

    #[error("viewport must be non-empty, got {width}x{height}")]
    EmptyViewport { width: u32, height: u32 },

    #[error("gravitational constant must be positive and finite, got {0}")]
    InvalidGravity(f64),
}

/// Failures of the accelerated kernel path
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("cannot upload an empty body store to the device")]
    EmptyStore,

    #[error("{bodies} bodies exceed the device limits for a single dispatch")]
    TooManyBodies { bodies: usize },

    #[error(transparent)]
    Build(#[from] ShaderError),

    #[error("failed to create compute pipeline: {0}")]
    Pipeline(String),

    #[error("failed to read results back from the device: {0}")]
    ReadBack(#[from] wgpu::BufferAsyncError),

    #[error("device dropped the buffer mapping before it completed")]
    MapAborted,
}

impl KernelError {
    /// True when no runnable kernel exists, so the CPU integrator should take over
    pub fn is_build_failure(&self) -> bool {
        matches!(self, KernelError::Build(_) | KernelError::Pipeline(_))
    }
}

/// Anything that can stop the frame driver
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error("the GPU backend was requested without a compute context")]
    NoComputeContext,
}
