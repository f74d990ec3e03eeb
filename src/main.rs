//! Epicycles - closed paths redrawn by chains of rotating arrows
//!
//! Each arrow is one Fourier coefficient of the path; laid tip to tail and
//! spun at their frequencies, their sum traces the shape.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{ModifiersState, PhysicalKey},
    window::{Window, WindowId},
};

use epicycles::cli::Args;
use epicycles::controls::{Control, HELP};
use epicycles::error::SimulationError;
use epicycles::gpu::{GraphicsCapabilityProbe, WgpuBackend};
use epicycles::params::{RenderConfig, SimulationConfig};
use epicycles::paths::PathLibrary;
use epicycles::simulation::AnimationPipeline;
use epicycles::timing::FrameClock;

/// Main application state
struct App {
    // Window and rendering
    window: Option<Arc<Window>>,
    pipeline: Option<AnimationPipeline<WgpuBackend>>,
    unsupported: bool,

    // Simulation inputs
    config: SimulationConfig,
    paths: PathLibrary,
    render_config: RenderConfig,

    // Input and timing
    modifiers: ModifiersState,
    clock: FrameClock,
    captures: u32,
}

impl App {
    fn new(config: SimulationConfig, paths: PathLibrary, render_config: RenderConfig) -> Self {
        Self {
            window: None,
            pipeline: None,
            unsupported: false,
            config,
            paths,
            render_config,
            modifiers: ModifiersState::empty(),
            clock: FrameClock::new(),
            captures: 0,
        }
    }

    fn title(&self) -> String {
        format!("Epicycles - {}", self.config.active_path)
    }
}

impl ApplicationHandler for App {
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let (Some(window), Some(_)) = (&self.window, &self.pipeline) {
            window.request_redraw();
        }
    }

    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = Window::default_attributes()
            .with_title(self.title())
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.render_config.window_width,
                self.render_config.window_height,
            ));
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let capture = self.render_config.capture_dir.is_some();
        let Some(context) =
            pollster::block_on(GraphicsCapabilityProbe::probe(Arc::clone(&window), capture))
        else {
            let notice = SimulationError::Unsupported(
                "this GPU cannot render into float textures".to_string(),
            );
            log::error!("{}", notice);
            window.set_title("Epicycles - unsupported on this GPU");
            self.unsupported = true;
            self.window = Some(window);
            return;
        };

        let backend = match WgpuBackend::new(context, self.render_config.background) {
            Ok(backend) => backend,
            Err(e) => {
                log::error!("{}", e);
                event_loop.exit();
                return;
            }
        };

        println!("\nEpicycles is running!");
        println!("{}\n", HELP);

        self.pipeline = Some(AnimationPipeline::new(backend, self.render_config.clone()));
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(pipeline) = self.pipeline.as_mut() {
                    pipeline.teardown();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(pipeline) = self.pipeline.as_mut() {
                    pipeline.backend_mut().resize_surface(size.width, size.height);
                }
            }
            WindowEvent::ModifiersChanged(modifiers) => self.modifiers = modifiers.state(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(key),
                        ..
                    },
                ..
            } => {
                if let Some(control) = Control::from_key(key, self.modifiers.shift_key()) {
                    self.handle_control(event_loop, control);
                }
            }
            WindowEvent::RedrawRequested => self.render_frame(event_loop),
            _ => {}
        }
    }
}

impl App {
    fn handle_control(&mut self, event_loop: &ActiveEventLoop, control: Control) {
        match control {
            Control::Quit => {
                if let Some(pipeline) = self.pipeline.as_mut() {
                    pipeline.teardown();
                }
                event_loop.exit();
            }
            _ if self.unsupported => {}
            Control::Reset => {
                if let Some(pipeline) = self.pipeline.as_mut() {
                    pipeline.reset(&mut self.config, &self.paths);
                }
                if let Some(window) = &self.window {
                    window.set_title(&self.title());
                }
            }
            Control::Capture => self.request_capture(),
            _ => {
                if !control.apply(&mut self.config) {
                    log::debug!("{:?} ignored, already at its limit", control);
                    return;
                }
                log::info!("{:?} -> {:?}", control, self.config);
                if let Some(window) = &self.window {
                    window.set_title(&self.title());
                }
            }
        }
    }

    fn request_capture(&mut self) {
        let (Some(pipeline), Some(dir)) = (self.pipeline.as_mut(), &self.render_config.capture_dir)
        else {
            log::warn!("Frame capture needs --capture-dir");
            return;
        };
        let path: PathBuf = dir.join(format!("frame_{:05}.png", self.captures));
        self.captures += 1;
        pipeline.backend_mut().request_capture(path);
    }

    /// Render a single frame
    fn render_frame(&mut self, event_loop: &ActiveEventLoop) {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };

        let now = Instant::now();
        let frame_dt = self.clock.tick(now);
        match pipeline.frame(&self.config, &self.paths, frame_dt, now) {
            Ok(_) => {}
            Err(SimulationError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                log::error!("Out of GPU memory");
                pipeline.teardown();
                event_loop.exit();
            }
            Err(e) => log::warn!("Frame error: {}", e),
        }
    }
}

/// Validate the arguments and load every path before a window exists
fn startup(args: &Args) -> Result<App, SimulationError> {
    let config = args.simulation_config()?;
    let render_config = args.render_config();
    let paths = args.path_library(render_config.path_sample_count)?;

    if let Some(dir) = &render_config.capture_dir {
        std::fs::create_dir_all(dir).map_err(|e| {
            SimulationError::Capture(format!("cannot create {}: {}", dir.display(), e))
        })?;
        log::info!("Captures go to {}", dir.display());
    }

    Ok(App::new(config, paths, render_config))
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut app = startup(&args)?;
    let event_loop = EventLoop::new()?;
    event_loop.run_app(&mut app)?;
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    println!("Epicycles - Fourier series drawn with rotating arrows");
    println!("Initializing...\n");

    if let Err(e) = run(args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
