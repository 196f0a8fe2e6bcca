//! Point renderer for the presentation snapshot

use common::{
    create_program, create_uniform_buffer, Camera2D, CameraUniform, GraphicsContext, ShaderError,
};
use nbody_sim::PresentationSnapshot;

const VERTEX_SHADER: &str = include_str!("shaders/points_vertex.wgsl");
const FRAGMENT_SHADER: &str = include_str!("shaders/points_fragment.wgsl");

/// One `vec2<f32>` per body, tightly packed
const POINT_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[wgpu::VertexAttribute {
        offset: 0,
        shader_location: 0,
        format: wgpu::VertexFormat::Float32x2,
    }],
};

pub struct Renderer {
    pipeline: wgpu::RenderPipeline,
    point_buffer: wgpu::Buffer,
    _camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    max_points: usize,
}

impl Renderer {
    pub fn new(
        ctx: &GraphicsContext,
        camera: &Camera2D,
        max_points: usize,
    ) -> Result<Self, ShaderError> {
        let device = &ctx.device;

        let program = create_program(device, VERTEX_SHADER, FRAGMENT_SHADER)?;

        // Camera uniform buffer
        let camera_buffer = create_uniform_buffer(device, &CameraUniform::from_camera_2d(camera));

        let camera_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Camera Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Point Pipeline Layout"),
            bind_group_layouts: &[&camera_bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Point Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &program.vertex,
                entry_point: "vs_main",
                buffers: &[POINT_LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &program.fragment,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::PointList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let point_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Point Buffer"),
            size: (std::mem::size_of::<[f32; 2]>() * max_points.max(1)) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            pipeline,
            point_buffer,
            _camera_buffer: camera_buffer,
            camera_bind_group,
            max_points,
        })
    }

    /// Upload the snapshot; returns how many points will be drawn
    pub fn update_points(&self, queue: &wgpu::Queue, snapshot: &PresentationSnapshot) -> u32 {
        let count = snapshot.len().min(self.max_points);
        let bytes = &snapshot.as_bytes()[..count * std::mem::size_of::<[f32; 2]>()];
        if !bytes.is_empty() {
            queue.write_buffer(&self.point_buffer, 0, bytes);
        }
        count as u32
    }

    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        num_points: u32,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Point Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.point_buffer.slice(..));
        render_pass.draw(0..num_points, 0..1);
    }
}
