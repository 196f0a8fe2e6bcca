//! Frame driver: alternates simulation steps with snapshot publication
//!
//! The driver owns the step backend and two snapshots. A step always writes
//! into the back snapshot; only once it has fully completed are front and
//! back swapped. The renderer only ever sees the front one, through a shared
//! borrow, so it can never observe a step in progress.

use std::time::{Duration, Instant};

use common::ComputeContext;
use glam::Vec2;

use crate::body::BodyStore;
use crate::config::{Backend, SimulationConfig};
use crate::error::SimError;
use crate::integrator::ForceIntegrator;
use crate::kernel::KernelPath;
use crate::snapshot::PresentationSnapshot;

/// Something that can advance the simulation by one step
pub trait StepBackend {
    /// Short name for logs and the window title
    fn label(&self) -> &'static str;

    fn body_count(&self) -> usize;

    /// Advance one step and write every body's new position into `positions`
    fn step_into(&mut self, positions: &mut [Vec2]) -> Result<(), SimError>;
}

impl<B: StepBackend + ?Sized> StepBackend for Box<B> {
    fn label(&self) -> &'static str {
        (**self).label()
    }

    fn body_count(&self) -> usize {
        (**self).body_count()
    }

    fn step_into(&mut self, positions: &mut [Vec2]) -> Result<(), SimError> {
        (**self).step_into(positions)
    }
}

/// Host-side integrator over a host-side body store
pub struct CpuBackend {
    store: BodyStore,
    integrator: ForceIntegrator,
}

impl CpuBackend {
    pub fn new(store: BodyStore, gravity: f64) -> Self {
        Self {
            store,
            integrator: ForceIntegrator::new(gravity),
        }
    }
}

impl StepBackend for CpuBackend {
    fn label(&self) -> &'static str {
        "cpu"
    }

    fn body_count(&self) -> usize {
        self.store.len()
    }

    fn step_into(&mut self, positions: &mut [Vec2]) -> Result<(), SimError> {
        self.integrator.step(&mut self.store);
        self.store.write_positions(positions);
        Ok(())
    }
}

impl StepBackend for KernelPath {
    fn label(&self) -> &'static str {
        "gpu"
    }

    fn body_count(&self) -> usize {
        KernelPath::body_count(self)
    }

    fn step_into(&mut self, positions: &mut [Vec2]) -> Result<(), SimError> {
        self.step(positions)?;
        Ok(())
    }
}

/// Build the backend `config` asks for.
///
/// A GPU kernel that fails to build falls back to the CPU integrator over the
/// same initial layout. Every other kernel failure is returned.
pub fn select_backend(
    config: &SimulationConfig,
    compute: Option<&ComputeContext>,
) -> Result<Box<dyn StepBackend>, SimError> {
    config.validate()?;
    let store = BodyStore::from_config(config);

    match config.backend {
        Backend::Cpu => {
            log::info!("Using CPU integrator for {} bodies", store.len());
            Ok(Box::new(CpuBackend::new(store, config.gravity)))
        }
        Backend::Gpu => {
            let ctx = compute.ok_or(SimError::NoComputeContext)?;
            match KernelPath::new(ctx, &store, config.gravity) {
                Ok(kernel) => {
                    log::info!(
                        "Using GPU kernel on {} for {} bodies",
                        ctx.adapter_info.name,
                        store.len()
                    );
                    Ok(Box::new(kernel))
                }
                Err(err) if err.is_build_failure() => {
                    log::warn!("Kernel unavailable ({}), falling back to CPU integrator", err);
                    Ok(Box::new(CpuBackend::new(store, config.gravity)))
                }
                Err(err) => Err(err.into()),
            }
        }
    }
}

/// Whether the front snapshot reflects the latest completed step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Computing,
    Ready,
}

/// Step and frame durations
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameTimings {
    pub last_step: Duration,
    pub last_frame: Duration,
    pub steps: u64,
    pub frames: u64,
    total_step: Duration,
    shown_fps: Option<u32>,
}

/// A new reading replaces the shown FPS only when it is this close to it
const FPS_HYSTERESIS: u32 = 2;

impl FrameTimings {
    fn record_step(&mut self, elapsed: Duration) {
        self.last_step = elapsed;
        self.total_step += elapsed;
        self.steps += 1;
    }

    fn record_frame(&mut self, elapsed: Duration) {
        self.last_frame = elapsed;
        self.frames += 1;

        if let Some(fps) = self.fps() {
            let accept = match self.shown_fps {
                None | Some(0) => true,
                Some(shown) => fps.abs_diff(shown) <= FPS_HYSTERESIS,
            };
            if accept {
                self.shown_fps = Some(fps);
            }
        }
    }

    pub fn mean_step(&self) -> Duration {
        match u32::try_from(self.steps) {
            Ok(0) => Duration::ZERO,
            Ok(steps) => self.total_step / steps,
            Err(_) => Duration::from_secs_f64(self.total_step.as_secs_f64() / self.steps as f64),
        }
    }

    /// Frames per second implied by the last full frame
    pub fn fps(&self) -> Option<u32> {
        let secs = self.last_frame.as_secs_f64();
        (secs > 0.0).then(|| (1.0 / secs).round() as u32)
    }

    /// FPS for display. Readings that jump more than two frames per second
    /// away from the shown value are ignored, which keeps the title steady.
    pub fn stable_fps(&self) -> Option<u32> {
        self.shown_fps
    }
}

/// Owns the simulation state and the double-buffered snapshot
pub struct FrameDriver<B> {
    backend: B,
    front: PresentationSnapshot,
    back: PresentationSnapshot,
    state: FrameState,
    timings: FrameTimings,
}

impl<B: StepBackend> FrameDriver<B> {
    /// No snapshot is ready until the first call to [`advance`](Self::advance)
    pub fn new(backend: B) -> Self {
        let count = backend.body_count();
        Self {
            backend,
            front: PresentationSnapshot::new(count),
            back: PresentationSnapshot::new(count),
            state: FrameState::Computing,
            timings: FrameTimings::default(),
        }
    }

    /// Run one full step and publish its result.
    ///
    /// On failure the previously published snapshot stays in place.
    pub fn advance(&mut self) -> Result<&PresentationSnapshot, SimError> {
        let previous = self.state;
        self.state = FrameState::Computing;

        let started = Instant::now();
        if let Err(err) = self.backend.step_into(self.back.positions_mut()) {
            self.state = previous;
            return Err(err);
        }
        self.timings.record_step(started.elapsed());

        std::mem::swap(&mut self.front, &mut self.back);
        self.state = FrameState::Ready;

        if self.timings.steps % 120 == 0 {
            log::debug!(
                "{} steps on {}: last {:?}, mean {:?}",
                self.timings.steps,
                self.backend.label(),
                self.timings.last_step,
                self.timings.mean_step()
            );
        }

        Ok(&self.front)
    }

    /// The latest published snapshot, if any step has completed
    pub fn ready_snapshot(&self) -> Option<&PresentationSnapshot> {
        match self.state {
            FrameState::Ready => Some(&self.front),
            FrameState::Computing => None,
        }
    }

    /// Record the wall time of a whole frame (step + render + present)
    pub fn frame_finished(&mut self, elapsed: Duration) {
        self.timings.record_frame(elapsed);
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn timings(&self) -> &FrameTimings {
        &self.timings
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn body_count(&self) -> usize {
        self.front.len()
    }
}
