//! Shader compilation helpers
//!
//! Every stage goes through [`compile_shader`], which captures validation
//! errors in an error scope instead of letting wgpu's uncaptured-error
//! handler panic. A failed stage comes back as a [`ShaderError`] carrying the
//! compiler's diagnostic.

use std::fmt;

use crate::error::ShaderError;

/// Pipeline stage a shader module is compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Vertex,
    Fragment,
    Compute,
}

impl StageKind {
    /// Debug label attached to the wgpu shader module
    pub fn label(self) -> &'static str {
        match self {
            StageKind::Vertex => "Vertex Shader",
            StageKind::Fragment => "Fragment Shader",
            StageKind::Compute => "Compute Shader",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::Vertex => "vertex",
            StageKind::Fragment => "fragment",
            StageKind::Compute => "compute",
        };
        f.write_str(name)
    }
}

/// Compile a single WGSL stage.
///
/// Blocks until the device has validated the module.
pub fn compile_shader(
    device: &wgpu::Device,
    source: &str,
    stage: StageKind,
) -> Result<wgpu::ShaderModule, ShaderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(stage.label()),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    match pollster::block_on(device.pop_error_scope()) {
        None => Ok(module),
        Some(err) => {
            let message = err.to_string();
            log::error!("Failed to compile {} shader: {}", stage, message);
            Err(ShaderError::Compilation { stage, message })
        }
    }
}

/// A vertex + fragment pair ready to be wired into a render pipeline
pub struct ShaderProgram {
    pub vertex: wgpu::ShaderModule,
    pub fragment: wgpu::ShaderModule,
}

/// Compile both stages of a render program. Fails on the first stage that
/// does not build.
pub fn create_program(
    device: &wgpu::Device,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<ShaderProgram, ShaderError> {
    let vertex = compile_shader(device, vertex_source, StageKind::Vertex)?;
    let fragment = compile_shader(device, fragment_source, StageKind::Fragment)?;
    Ok(ShaderProgram { vertex, fragment })
}
