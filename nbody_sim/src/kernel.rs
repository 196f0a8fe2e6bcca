//! GPU compute path for the force integration
//!
//! The body store is uploaded once at setup; from then on the simulation
//! state lives in two device buffers that swap roles every step. Each
//! invocation reads the whole current buffer and writes only its own record
//! into the other one, so no invocation ever observes a partially updated
//! step. Only positions come back to the host.

use std::sync::{mpsc, Arc};

use bytemuck::{Pod, Zeroable};
use common::{compile_shader, ComputeContext, StageKind};
use glam::Vec2;
use wgpu::util::DeviceExt;

use crate::body::{Body, BodyStore};
use crate::error::KernelError;

/// WGSL source of the `planet_calc` kernel
pub const KERNEL_SOURCE: &str = include_str!("shaders/planet_calc.wgsl");

const ENTRY_POINT: &str = "planet_calc";
const WORKGROUP_SIZE: u32 = 64;

/// Device-side body record: five consecutive floats
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct GpuBody {
    pub mass: f32,
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
}

impl From<&Body> for GpuBody {
    fn from(body: &Body) -> Self {
        let position = body.position().as_vec2();
        let velocity = body.velocity_delta().as_vec2();
        Self {
            mass: body.mass() as f32,
            x: position.x,
            y: position.y,
            dx: velocity.x,
            dy: velocity.y,
        }
    }
}

/// Uniform parameters (matches WGSL `Params`)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct KernelParams {
    count: u32,
    gravity: f32,
    _padding: [u32; 2],
}

/// Compiled kernel plus the device-resident simulation state
pub struct KernelPath {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,

    pipeline: wgpu::ComputePipeline,
    // bind_groups[k] reads state_buffers[k] and writes state_buffers[1 - k]
    bind_groups: [wgpu::BindGroup; 2],
    state_buffers: [wgpu::Buffer; 2],
    position_buffer: wgpu::Buffer,
    staging_buffer: wgpu::Buffer,
    _params_buffer: wgpu::Buffer,

    current: usize,
    body_count: u32,
}

impl KernelPath {
    /// Build the bundled kernel and upload `store`
    pub fn new(ctx: &ComputeContext, store: &BodyStore, gravity: f64) -> Result<Self, KernelError> {
        Self::with_source(ctx, store, gravity, KERNEL_SOURCE)
    }

    /// Build a kernel from arbitrary WGSL exposing `planet_calc` with the
    /// standard bindings. Nothing is allocated if the source fails to build.
    pub fn with_source(
        ctx: &ComputeContext,
        store: &BodyStore,
        gravity: f64,
        source: &str,
    ) -> Result<Self, KernelError> {
        if store.is_empty() {
            return Err(KernelError::EmptyStore);
        }

        let device = &ctx.device;
        let body_count = check_limits(device, store.len())?;

        let module = compile_shader(device, source, StageKind::Compute)?;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Planet Calc Bind Group Layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, false),
                storage_entry(2, false),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Planet Calc Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Planet Calc Pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: ENTRY_POINT,
            compilation_options: Default::default(),
            cache: None,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            log::error!("Failed to create compute pipeline: {}", err);
            return Err(KernelError::Pipeline(err.to_string()));
        }

        let records: Vec<GpuBody> = store.iter().map(GpuBody::from).collect();
        let state_size = std::mem::size_of_val(records.as_slice()) as u64;
        let position_size = (store.len() * std::mem::size_of::<Vec2>()) as u64;

        // initial upload; the host store is not consulted again
        let initial_state = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Body State A"),
            contents: bytemuck::cast_slice(&records),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
        });

        let next_state = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Body State B"),
            size: state_size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let position_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Position Buffer"),
            size: position_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Position Staging Buffer"),
            size: position_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let params = KernelParams {
            count: body_count,
            gravity: gravity as f32,
            _padding: [0; 2],
        };
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Planet Calc Params"),
            contents: bytemuck::cast_slice(&[params]),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let make_bind_group = |label: &str, src: &wgpu::Buffer, dst: &wgpu::Buffer| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: src.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: dst.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: position_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: params_buffer.as_entire_binding(),
                    },
                ],
            })
        };

        let bind_groups = [
            make_bind_group("Planet Calc A -> B", &initial_state, &next_state),
            make_bind_group("Planet Calc B -> A", &next_state, &initial_state),
        ];

        log::info!(
            "Kernel path ready: {} bodies, {} workgroups per step",
            body_count,
            body_count.div_ceil(WORKGROUP_SIZE)
        );

        Ok(Self {
            device: Arc::clone(&ctx.device),
            queue: Arc::clone(&ctx.queue),
            pipeline,
            bind_groups,
            state_buffers: [initial_state, next_state],
            position_buffer,
            staging_buffer,
            _params_buffer: params_buffer,
            current: 0,
            body_count,
        })
    }

    pub fn body_count(&self) -> usize {
        self.body_count as usize
    }

    /// Run one step and copy the new positions into `out`.
    ///
    /// Blocks until the dispatch has finished and the read-back has landed.
    /// Slots beyond the body count are left untouched.
    pub fn step(&mut self, out: &mut [Vec2]) -> Result<(), KernelError> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Planet Calc Encoder"),
            });

        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Planet Calc Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &self.bind_groups[self.current], &[]);
            compute_pass.dispatch_workgroups(self.body_count.div_ceil(WORKGROUP_SIZE), 1, 1);
        }

        let submission = self.queue.submit(std::iter::once(encoder.finish()));
        self.device
            .poll(wgpu::Maintain::wait_for(submission))
            .panic_on_timeout();

        let size = self.position_buffer.size();
        self.copy_and_map(&self.position_buffer, &self.staging_buffer, size)?;
        {
            let data = self.staging_buffer.slice(..).get_mapped_range();
            let positions: &[Vec2] = bytemuck::cast_slice(&data);
            for (slot, position) in out.iter_mut().zip(positions) {
                *slot = *position;
            }
        }
        self.staging_buffer.unmap();

        // only a step the host has seen becomes the current state
        self.current = 1 - self.current;

        Ok(())
    }

    /// Read the full device-resident state. Diagnostic only: allocates a
    /// staging buffer on every call.
    pub fn read_bodies(&self) -> Result<Vec<GpuBody>, KernelError> {
        let source = &self.state_buffers[self.current];
        let size = source.size();
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Body State Staging Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        self.copy_and_map(source, &staging, size)?;
        let bodies = {
            let data = staging.slice(..).get_mapped_range();
            bytemuck::cast_slice::<u8, GpuBody>(&data).to_vec()
        };
        staging.unmap();

        Ok(bodies)
    }

    /// Copy `source` into `staging` and block until `staging` is mapped for reading
    fn copy_and_map(
        &self,
        source: &wgpu::Buffer,
        staging: &wgpu::Buffer,
        size: u64,
    ) -> Result<(), KernelError> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Read-back Encoder"),
            });
        encoder.copy_buffer_to_buffer(source, 0, staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let (sender, receiver) = mpsc::channel();
        staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = sender.send(result);
            });
        self.device.poll(wgpu::Maintain::Wait).panic_on_timeout();

        receiver.recv().map_err(|_| KernelError::MapAborted)??;
        Ok(())
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Reject stores that cannot be bound or dispatched in one go on this device
fn check_limits(device: &wgpu::Device, bodies: usize) -> Result<u32, KernelError> {
    let limits = device.limits();
    let state_bytes = bodies as u64 * std::mem::size_of::<GpuBody>() as u64;

    let count = u32::try_from(bodies).map_err(|_| KernelError::TooManyBodies { bodies })?;
    if count.div_ceil(WORKGROUP_SIZE) > limits.max_compute_workgroups_per_dimension
        || state_bytes > u64::from(limits.max_storage_buffer_binding_size)
    {
        return Err(KernelError::TooManyBodies { bodies });
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;

    #[test]
    fn gpu_body_is_five_packed_floats() {
        assert_eq!(std::mem::size_of::<GpuBody>(), 5 * std::mem::size_of::<f32>());
        assert_eq!(std::mem::align_of::<GpuBody>(), std::mem::align_of::<f32>());
    }

    #[test]
    fn params_match_uniform_layout() {
        assert_eq!(std::mem::size_of::<KernelParams>(), 16);
    }

    #[test]
    fn packs_body_fields_in_kernel_order() {
        let body = Body::new(7.0, DVec2::new(100.0, 200.0))
            .unwrap()
            .with_velocity_delta(DVec2::new(-1.0, 0.5));
        let record = GpuBody::from(&body);
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&record));
        assert_eq!(floats, &[7.0, 100.0, 200.0, -1.0, 0.5]);
    }

    #[test]
    fn kernel_source_exposes_entry_point() {
        assert!(KERNEL_SOURCE.contains(&format!("fn {}(", ENTRY_POINT)));
    }
}
