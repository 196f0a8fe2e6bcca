//! Setup and shader error types

use thiserror::Error;

use crate::shader::StageKind;

/// Failures while acquiring a compute or render target.
///
/// None of these are recoverable: without an adapter, a device or a window
/// there is nothing to run the simulation on.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("surface reports no supported texture formats")]
    NoSurfaceFormat,
}

/// A shader stage that did not build.
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to compile {stage} shader: {message}")]
    Compilation { stage: StageKind, message: String },
}
