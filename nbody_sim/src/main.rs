//! 2D N-body Gravity Simulation
//!
//! Random point masses attracting each other, stepped either on the CPU or
//! in a wgpu compute kernel and drawn as points every frame.
//!
//! Controls:
//! - Space: Pause/resume simulation
//! - Escape: Quit
//!
//! `--headless` runs a fixed number of frames without a window and logs step
//! timings and a position checksum.

mod renderer;

use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use common::{Camera2D, ComputeContext, GraphicsContext};
use nbody_sim::config::{default_body_count, DEFAULT_HEIGHT, DEFAULT_SEED, DEFAULT_WIDTH};
use nbody_sim::{select_backend, Backend, FrameDriver, SimError, SimulationConfig, StepBackend, G};
use renderer::Renderer;
use winit::{
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::ControlFlow,
    keyboard::{KeyCode, PhysicalKey},
};

const WINDOW_TITLE: &str = "N-Body Simulation";

#[derive(Parser, Debug)]
#[command(about = "2D N-body gravity simulation")]
struct Args {
    /// Where the force computation runs
    #[arg(long, value_enum, default_value_t = Backend::Cpu)]
    backend: Backend,

    /// Number of bodies (defaults to 2000 on cpu, 100000 on gpu)
    #[arg(long)]
    bodies: Option<usize>,

    /// Seed for the initial layout
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    width: u32,

    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    height: u32,

    /// Gravitational constant
    #[arg(long, default_value_t = G)]
    gravity: f64,

    /// Run without a window and report timings
    #[arg(long)]
    headless: bool,

    /// Frames to run in headless mode
    #[arg(long, default_value_t = 600)]
    frames: u64,
}

impl Args {
    fn config(&self) -> SimulationConfig {
        SimulationConfig {
            body_count: self.bodies.unwrap_or_else(|| default_body_count(self.backend)),
            width: self.width,
            height: self.height,
            seed: self.seed,
            gravity: self.gravity,
            backend: self.backend,
        }
    }
}

type Driver = FrameDriver<Box<dyn StepBackend>>;

struct App {
    ctx: GraphicsContext,
    renderer: Renderer,
    driver: Driver,
    paused: bool,
    point_count: u32,
    title: String,
    failure: Option<SimError>,
}

impl App {
    fn new(ctx: GraphicsContext, config: &SimulationConfig) -> Result<Self> {
        let compute = ctx.compute_context();
        let mut driver = FrameDriver::new(select_backend(config, Some(&compute))?);

        let camera = Camera2D::for_viewport(config.width as f32, config.height as f32);
        let renderer = Renderer::new(&ctx, &camera, driver.body_count())?;

        // first frame needs data before the loop starts
        let snapshot = driver.advance()?;
        let point_count = renderer.update_points(&ctx.queue, snapshot);

        Ok(Self {
            ctx,
            renderer,
            driver,
            paused: false,
            point_count,
            title: String::new(),
            failure: None,
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        self.ctx.resize(new_size);
    }

    fn update(&mut self) -> Result<(), SimError> {
        if !self.paused {
            let snapshot = self.driver.advance()?;
            self.point_count = self.renderer.update_points(&self.ctx.queue, snapshot);
        }
        Ok(())
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        self.renderer.render(&mut encoder, &view, self.point_count);

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }

    fn refresh_title(&mut self) {
        let Some(fps) = self.driver.timings().stable_fps() else {
            return;
        };

        let state = if self.paused { " (paused)" } else { "" };
        let title = format!(
            "{} [{}] FPS: {}{}",
            WINDOW_TITLE,
            self.driver.backend().label(),
            fps,
            state
        );
        if title != self.title {
            self.ctx.window.set_title(&title);
            self.title = title;
        }
    }

    fn handle_key(&mut self, key: KeyCode, state: ElementState) -> bool {
        if state != ElementState::Pressed {
            return false;
        }

        match key {
            KeyCode::Space => self.paused = !self.paused,
            KeyCode::Escape => return true,
            _ => {}
        }
        false
    }
}

fn run_windowed(config: &SimulationConfig) -> Result<()> {
    let (ctx, event_loop) =
        pollster::block_on(GraphicsContext::new(WINDOW_TITLE, config.width, config.height))?;

    let mut app = App::new(ctx, config)?;

    event_loop.run(|event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::Resized(size) => app.resize(size),
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            physical_key: PhysicalKey::Code(key),
                            state,
                            ..
                        },
                    ..
                } => {
                    if app.handle_key(key, state) {
                        elwt.exit();
                    }
                }
                WindowEvent::RedrawRequested => {
                    let frame_start = Instant::now();

                    if let Err(err) = app.update() {
                        log::error!("Simulation step failed: {}", err);
                        app.failure = Some(err);
                        elwt.exit();
                        return;
                    }

                    match app.render() {
                        Ok(_) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            app.resize(app.ctx.size)
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => elwt.exit(),
                        Err(e) => log::warn!("Render error: {:?}", e),
                    }

                    app.driver.frame_finished(frame_start.elapsed());
                    app.refresh_title();
                }
                _ => {}
            },
            Event::AboutToWait => {
                app.ctx.window.request_redraw();
            }
            _ => {}
        }
    })?;

    match app.failure.take() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn run_headless(config: &SimulationConfig, frames: u64) -> Result<()> {
    let compute = match config.backend {
        Backend::Gpu => Some(pollster::block_on(ComputeContext::new_headless())?),
        Backend::Cpu => None,
    };

    let mut driver = FrameDriver::new(select_backend(config, compute.as_ref())?);
    let started = Instant::now();

    for _ in 0..frames {
        let frame_start = Instant::now();
        driver.advance()?;
        driver.frame_finished(frame_start.elapsed());
    }

    let timings = driver.timings();
    let checksum = driver
        .ready_snapshot()
        .map(|snapshot| snapshot.checksum())
        .unwrap_or_default();

    log::info!(
        "{} frames of {} bodies on {} in {:.3} s: mean step {:?}, checksum {:.6}",
        timings.frames,
        driver.body_count(),
        driver.backend().label(),
        started.elapsed().as_secs_f64(),
        timings.mean_step(),
        checksum
    );

    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.config();
    config.validate()?;

    if args.headless {
        run_headless(&config, args.frames)
    } else {
        run_windowed(&config)
    }
}
