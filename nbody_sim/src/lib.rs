//! 2D N-body gravity simulation core
//!
//! Bodies attract each other pairwise and are integrated one unit of time per
//! step, either by a sequential integrator on the host ([`integrator`]) or by
//! a WGSL compute kernel ([`kernel`]). The [`driver`] alternates steps with
//! publication of a [`snapshot`] of positions for the renderer.

pub mod body;
pub mod config;
pub mod driver;
pub mod error;
pub mod integrator;
pub mod kernel;
pub mod snapshot;

pub use body::{Body, BodyStore};
pub use config::{Backend, SimulationConfig};
pub use driver::{select_backend, CpuBackend, FrameDriver, FrameState, FrameTimings, StepBackend};
pub use error::{BodyError, ConfigError, KernelError, SimError};
pub use integrator::{net_force, pairwise_force, ForceIntegrator, G};
pub use kernel::{GpuBody, KernelPath};
pub use snapshot::PresentationSnapshot;
