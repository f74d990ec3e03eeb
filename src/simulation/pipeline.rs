//! Per-frame animation state machine.
//!
//! `Idle → Running` once the surface and the active path are available,
//! `Running ⇄ Paused` following the config flag, and a resize step taken
//! on any frame where the surface size differs from the last one seen.
//! Everything a run owns lives in [`SimulationContext`], created on start
//! and released on teardown.

use std::collections::HashMap;
use std::time::Instant;

use crate::complex::Complex;
use crate::error::SimulationError;
use crate::fourier::{
    approximation, partial_sums, rotation_terms, trace_index, FourierCoefficientEngine,
    PathTextures, RotationTerm,
};
use crate::gpu::backend::{GraphicsBackend, OrbitStyle};
use crate::params::{PathShape, RenderConfig, SimulationConfig};
use crate::paths::PathLibrary;
use crate::simulation::arrows::ArrowGeometry;
use crate::simulation::layers::TraceLayers;
use crate::timing::{Debouncer, MAX_FRAME_DELTA_S};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Paused,
}

/// Advance elapsed time, wrapping into `[0,1)`
pub fn advance_elapsed(elapsed: f32, dt: f32) -> f32 {
    let next = (elapsed + dt).rem_euclid(1.0);
    // rem_euclid can round up to exactly 1.0 for tiny negative remainders
    if next >= 1.0 {
        0.0
    } else {
        next
    }
}

/// Time and per-arrow geometry of the running animation
#[derive(Debug, Clone)]
pub struct AnimationState {
    /// Fraction of the current loop, in `[0,1)`
    pub elapsed: f32,
    /// Last observed surface size
    pub canvas_size: (u32, u32),
    pub arrows: ArrowGeometry,
}

impl AnimationState {
    pub fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.canvas_size;
        width.max(1) as f32 / height.max(1) as f32
    }
}

/// Config fields whose change invalidates derived state
#[derive(Debug, Clone, Copy, PartialEq)]
struct ConfigSnapshot {
    active_path: PathShape,
    iteration_count: u32,
    frequency_count: u32,
    used_frequency_count: u32,
}

impl ConfigSnapshot {
    fn of(config: &SimulationConfig) -> Self {
        Self {
            active_path: config.active_path,
            iteration_count: config.iteration_count,
            frequency_count: config.frequency_count,
            used_frequency_count: config.used_frequency_count,
        }
    }

    /// Coefficients depend on the path and the quadrature parameters only
    fn needs_recompute(&self, other: &Self) -> bool {
        self.active_path != other.active_path
            || self.iteration_count != other.iteration_count
            || self.frequency_count != other.frequency_count
    }
}

/// What happened during one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub resized: bool,
    pub recomputed: bool,
    pub ghosts_redrawn: bool,
    pub advanced: bool,
    /// The loop wrapped and the live trace was cleared
    pub wrapped: bool,
    pub arrows: usize,
    pub circles: usize,
}

/// GPU resources and derived state of one run
pub struct SimulationContext<T> {
    pub layers: TraceLayers<T>,
    pub engine: FourierCoefficientEngine<T>,
    pub path_textures: HashMap<PathShape, PathTextures<T>>,
    pub terms: Vec<RotationTerm>,
    pub animation: AnimationState,
}

impl<T> SimulationContext<T> {
    /// Allocate layers for the current surface, compute coefficients and draw
    /// the ghosts. `None` while the active path has no samples.
    fn create<B>(
        backend: &mut B,
        render: &RenderConfig,
        config: &SimulationConfig,
        paths: &PathLibrary,
    ) -> Option<Self>
    where
        B: GraphicsBackend<Texture = T>,
    {
        if paths.get(config.active_path).is_none() {
            log::debug!("No samples for {} yet", config.active_path);
            return None;
        }

        let canvas_size = backend.surface_size();
        let (width, height) =
            render.layer_size(canvas_size.0, canvas_size.1, backend.max_texture_dimension());
        let layers = TraceLayers::create(backend, width, height);
        let animation = AnimationState {
            elapsed: 0.0,
            canvas_size,
            arrows: ArrowGeometry::new(&[], 1.0),
        };

        let mut context = Self {
            layers,
            engine: FourierCoefficientEngine::new(),
            path_textures: HashMap::new(),
            terms: Vec::new(),
            animation,
        };
        context.recompute(backend, config, paths);
        context.draw_ghosts(backend, render, config, paths);
        Some(context)
    }

    /// Recompute coefficients, rotation terms and arrow geometry.
    /// Returns `false` (keeping the previous terms) when nothing was computed.
    fn recompute<B>(&mut self, backend: &mut B, config: &SimulationConfig, paths: &PathLibrary) -> bool
    where
        B: GraphicsBackend<Texture = T>,
    {
        let shape = config.active_path;
        let Some(samples) = paths.get(shape) else {
            log::warn!("No samples for {}, keeping previous coefficients", shape);
            return false;
        };
        let textures = self
            .path_textures
            .entry(shape)
            .or_insert_with(|| PathTextures::upload(backend, samples));

        let coefficients = self.engine.compute(
            backend,
            Some(textures),
            config.iteration_count,
            config.frequency_count,
        );
        if coefficients.is_empty() {
            return false;
        }

        log::info!(
            "{}: {} rotation terms (iterations {}, frequencies {})",
            shape,
            coefficients.len(),
            config.iteration_count,
            config.frequency_count
        );
        self.terms = rotation_terms(&coefficients);
        self.animation.arrows = ArrowGeometry::new(&self.terms, self.animation.aspect_ratio());
        true
    }

    /// Stamp the truncated approximation and the raw samples into their layers
    fn draw_ghosts<B>(
        &self,
        backend: &mut B,
        render: &RenderConfig,
        config: &SimulationConfig,
        paths: &PathLibrary,
    ) where
        B: GraphicsBackend<Texture = T>,
    {
        let aspect = self.animation.aspect_ratio();
        let count = render.ghost_point_count.max(1);

        let used = config.used_frequency_count as usize;
        let mark: Vec<Complex> = if self.terms.is_empty() {
            Vec::new()
        } else {
            (0..count)
                .map(|i| approximation(&self.terms, used, i as f32 / count as f32))
                .collect()
        };
        backend.stamp_points(&self.layers.mark, &render.mark, aspect, &mark, true);

        let original = paths
            .get(config.active_path)
            .map(|samples| samples.subsample(count))
            .unwrap_or_default();
        backend.stamp_points(&self.layers.original, &render.original, aspect, &original, true);
        log::debug!("Ghost overlays drawn ({} points)", count);
    }

    /// Resizing step: restart the loop and carry the layers over to the new size
    fn resize<B>(&mut self, backend: &mut B, render: &RenderConfig, canvas_size: (u32, u32))
    where
        B: GraphicsBackend<Texture = T>,
    {
        log::debug!(
            "Resizing {:?} -> {:?}",
            self.animation.canvas_size,
            canvas_size
        );
        self.animation.elapsed = 0.0;
        self.layers.clear_traces(backend);
        let (width, height) =
            render.layer_size(canvas_size.0, canvas_size.1, backend.max_texture_dimension());
        self.layers.resize(backend, width, height);
        self.animation.canvas_size = canvas_size;
        let aspect = self.animation.aspect_ratio();
        self.animation.arrows.set_aspect_ratio(aspect);
    }

    /// Advance time, stamp the live point and redraw the arrow layer
    fn step<B>(
        &mut self,
        backend: &mut B,
        render: &RenderConfig,
        config: &SimulationConfig,
        frame_dt: f32,
        report: &mut FrameReport,
    ) where
        B: GraphicsBackend<Texture = T>,
    {
        if self.terms.is_empty() {
            return;
        }
        let dt = frame_dt.clamp(0.0, MAX_FRAME_DELTA_S) / config.duration_s.max(f32::EPSILON);
        let wrapped = self.animation.elapsed + dt >= 1.0;
        self.animation.elapsed = advance_elapsed(self.animation.elapsed, dt);
        let t = self.animation.elapsed;
        let aspect = self.animation.aspect_ratio();

        let positions = partial_sums(&self.terms, t);
        let used = config.used_frequency_count as usize;
        let point = positions[trace_index(positions.len(), used)];
        backend.stamp_points(&self.layers.trace, &render.trace, aspect, &[point], wrapped);

        let write = self.layers.arrows.write();
        backend.clear(write);
        if config.rotating_arrows {
            let geometry = &self.animation.arrows;
            let count = geometry.arrow_count(used, render.max_arrows);
            let circles = geometry.orbits(&positions, count.min(render.max_orbit_circles));
            let style = OrbitStyle {
                color: render.orbit_color,
                stroke_width: render.orbit_stroke_width,
            };
            backend.draw_orbit_circles(write, &style, aspect, &circles);
            let arrows = geometry.arrows(&positions, t, count);
            backend.draw_arrows(write, render.arrow_color, &arrows);
            report.arrows = arrows.len();
            report.circles = circles.len();
        }
        self.layers.arrows.swap();

        report.advanced = true;
        report.wrapped = wrapped;
    }

    fn release<B>(self, backend: &mut B)
    where
        B: GraphicsBackend<Texture = T>,
    {
        self.layers.release(backend);
        self.engine.release(backend);
        for textures in self.path_textures.into_values() {
            textures.release(backend);
        }
    }
}

/// Drives one frame at a time through the backend
pub struct AnimationPipeline<B: GraphicsBackend> {
    backend: B,
    render: RenderConfig,
    state: PipelineState,
    context: Option<SimulationContext<B::Texture>>,
    snapshot: Option<ConfigSnapshot>,
    recompute: Debouncer,
    pending_coefficients: bool,
    ghost_redraw: Debouncer,
}

impl<B: GraphicsBackend> AnimationPipeline<B> {
    pub fn new(backend: B, render: RenderConfig) -> Self {
        Self {
            recompute: Debouncer::new(render.config_debounce),
            ghost_redraw: Debouncer::new(render.resize_debounce),
            backend,
            render,
            state: PipelineState::Idle,
            context: None,
            snapshot: None,
            pending_coefficients: false,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn render_config(&self) -> &RenderConfig {
        &self.render
    }

    pub fn context(&self) -> Option<&SimulationContext<B::Texture>> {
        self.context.as_ref()
    }

    /// Elapsed loop fraction, zero while idle
    pub fn elapsed(&self) -> f32 {
        self.context.as_ref().map_or(0.0, |c| c.animation.elapsed)
    }

    fn transition(&mut self, next: PipelineState) {
        if self.state != next {
            log::info!("Pipeline {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    fn target_state(config: &SimulationConfig) -> PipelineState {
        if config.paused {
            PipelineState::Paused
        } else {
            PipelineState::Running
        }
    }

    /// Leave `Idle` once the active path has samples. Returns whether a run is active.
    pub fn start(&mut self, config: &SimulationConfig, paths: &PathLibrary) -> bool {
        if self.context.is_some() {
            return true;
        }
        let Some(context) = SimulationContext::create(&mut self.backend, &self.render, config, paths)
        else {
            return false;
        };
        self.context = Some(context);
        self.snapshot = Some(ConfigSnapshot::of(config));
        self.transition(Self::target_state(config));
        true
    }

    /// Run one frame.
    ///
    /// # Arguments
    /// * `config` - Live configuration, read once per frame
    /// * `paths` - Sample sets for every shape
    /// * `frame_dt` - Seconds since the previous frame (clamped to 1/60 s)
    /// * `now` - Frame timestamp driving the debouncers
    pub fn frame(
        &mut self,
        config: &SimulationConfig,
        paths: &PathLibrary,
        frame_dt: f32,
        now: Instant,
    ) -> Result<FrameReport, SimulationError> {
        let mut report = FrameReport::default();
        if !self.start(config, paths) {
            return Ok(report);
        }
        self.transition(Self::target_state(config));

        let backend = &mut self.backend;
        let render = &self.render;
        let Some(context) = self.context.as_mut() else {
            return Ok(report);
        };

        // Resizing
        let canvas_size = backend.surface_size();
        if canvas_size != context.animation.canvas_size {
            context.resize(backend, render, canvas_size);
            self.ghost_redraw.trigger(now);
            report.resized = true;
        }

        // Config edits
        let snapshot = ConfigSnapshot::of(config);
        if let Some(previous) = self.snapshot.replace(snapshot) {
            if previous.active_path != snapshot.active_path {
                // A new shape is recomputed at once; only the ghosts wait
                context.layers.clear_all(backend);
                context.animation.elapsed = 0.0;
                self.pending_coefficients = false;
                report.recomputed = context.recompute(backend, config, paths);
                self.recompute.trigger(now);
            } else if previous.needs_recompute(&snapshot) {
                context.layers.clear_all(backend);
                self.pending_coefficients = true;
                self.recompute.trigger(now);
            } else if previous != snapshot {
                context.layers.clear_traces(backend);
                self.recompute.trigger(now);
            }
        }

        if self.recompute.fire(now) {
            if std::mem::take(&mut self.pending_coefficients)
                && context.recompute(backend, config, paths)
            {
                // Points stamped from the previous terms during the quiet period
                context.layers.clear_traces(backend);
                context.animation.elapsed = 0.0;
                report.recomputed = true;
            }
            context.draw_ghosts(backend, render, config, paths);
            report.ghosts_redrawn = true;
        }
        if self.ghost_redraw.fire(now) {
            context.draw_ghosts(backend, render, config, paths);
            report.ghosts_redrawn = true;
        }

        if self.state == PipelineState::Running {
            context.step(backend, render, config, frame_dt, &mut report);
        }

        backend.composite(&context.layers.composite_order())?;
        Ok(report)
    }

    /// Restore every config field to its default and recompute immediately
    pub fn reset(&mut self, config: &mut SimulationConfig, paths: &PathLibrary) {
        config.reset();
        self.recompute.cancel();
        self.ghost_redraw.cancel();
        self.pending_coefficients = false;
        self.snapshot = Some(ConfigSnapshot::of(config));

        if let Some(context) = self.context.as_mut() {
            context.animation.elapsed = 0.0;
            context.layers.clear_all(&mut self.backend);
            context.recompute(&mut self.backend, config, paths);
            context.draw_ghosts(&mut self.backend, &self.render, config, paths);
        }
        log::info!("Simulation reset to defaults");
    }

    /// Release every GPU resource of the run and return to `Idle`
    pub fn teardown(&mut self) {
        if let Some(context) = self.context.take() {
            context.release(&mut self.backend);
        }
        self.snapshot = None;
        self.recompute.cancel();
        self.ghost_redraw.cancel();
        self.pending_coefficients = false;
        self.transition(PipelineState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::mock::{MockBackend, MockCall};
    use std::time::Duration;

    const DT: f32 = 1.0 / 60.0;

    fn render() -> RenderConfig {
        RenderConfig {
            display_resolution: 32,
            ghost_point_count: 100,
            ..RenderConfig::default()
        }
    }

    fn config() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.set_iteration_count(300);
        config.set_frequency_count(8);
        config.set_used_frequency_count(6);
        config
    }

    fn setup() -> (AnimationPipeline<MockBackend>, PathLibrary, Instant) {
        let pipeline = AnimationPipeline::new(MockBackend::new(640, 480), render());
        (pipeline, PathLibrary::builtin(256), Instant::now())
    }

    fn coefficient_passes(backend: &MockBackend) -> usize {
        backend.count(|c| matches!(c, MockCall::Coefficients { .. }))
    }

    fn trace_stamps(pipeline: &AnimationPipeline<MockBackend>) -> Vec<bool> {
        let id = pipeline.context().unwrap().layers.trace.texture().id;
        pipeline
            .backend()
            .calls()
            .iter()
            .filter_map(|c| match c {
                MockCall::Stamp { target, clear, .. } if *target == id => Some(*clear),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_advance_elapsed_wraps() {
        assert_eq!(advance_elapsed(0.5, 0.25), 0.75);
        assert!((advance_elapsed(0.9, 0.2) - 0.1).abs() < 1e-6);
        assert_eq!(advance_elapsed(0.0, 1.0), 0.0);
        let mut elapsed = 0.0;
        for i in 0..10_000 {
            elapsed = advance_elapsed(elapsed, 0.001 + (i % 7) as f32 * 0.0137);
            assert!((0.0..1.0).contains(&elapsed), "elapsed {elapsed} escaped [0,1)");
        }
    }

    #[test]
    fn test_first_frame_starts_run() {
        let (mut pipeline, paths, now) = setup();
        assert_eq!(pipeline.state(), PipelineState::Idle);

        let report = pipeline.frame(&config(), &paths, 0.0, now).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Running);
        assert!(!report.recomputed, "initial computation is not a debounced recompute");

        let context = pipeline.context().unwrap();
        assert_eq!(context.terms.len(), 17);
        assert_eq!(coefficient_passes(pipeline.backend()), 2);
        assert_eq!(
            context.layers.size(),
            pipeline.render_config().layer_size(640, 480, 8192)
        );
        let composites = pipeline
            .backend()
            .count(|c| matches!(c, MockCall::Composite(ids) if ids.len() == 4));
        assert_eq!(composites, 1);
    }

    #[test]
    fn test_idle_without_samples() {
        let mut pipeline = AnimationPipeline::new(MockBackend::new(640, 480), render());
        let report = pipeline
            .frame(&config(), &PathLibrary::default(), DT, Instant::now())
            .unwrap();
        assert_eq!(report, FrameReport::default());
        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert_eq!(pipeline.backend().allocation_count(), 0);
    }

    #[test]
    fn test_elapsed_stays_in_unit_interval() {
        let (mut pipeline, paths, mut now) = setup();
        let mut config = config();
        config.set_duration_s(1.0);

        let deltas = [DT, 0.001, 0.5, DT * 0.5, 3.0];
        for i in 0..400 {
            let dt = deltas[i % deltas.len()];
            now += Duration::from_secs_f32(dt);
            pipeline.frame(&config, &paths, dt, now).unwrap();
            let elapsed = pipeline.elapsed();
            assert!((0.0..1.0).contains(&elapsed), "frame {i}: elapsed {elapsed}");
        }

        let stamps = trace_stamps(&pipeline);
        assert_eq!(stamps.len(), 400, "one live point per frame");
        assert!(stamps.iter().filter(|&&clear| clear).count() >= 2, "trace cleared on wrap");
    }

    #[test]
    fn test_wrap_clears_trace() {
        let (mut pipeline, paths, now) = setup();
        let mut config = config();
        config.set_duration_s(1.0);

        let mut wraps = Vec::new();
        for i in 0..150 {
            let report = pipeline.frame(&config, &paths, DT, now).unwrap();
            if report.wrapped {
                wraps.push(i);
            }
        }
        assert_eq!(wraps.len(), 2, "two loops in 2.5 seconds: {wraps:?}");
    }

    #[test]
    fn test_pause_keeps_compositing() {
        let (mut pipeline, paths, now) = setup();
        let mut config = config();
        for _ in 0..10 {
            pipeline.frame(&config, &paths, DT, now).unwrap();
        }
        let elapsed = pipeline.elapsed();
        assert!(elapsed > 0.0);

        config.paused = true;
        pipeline.backend_mut().clear_calls();
        for _ in 0..5 {
            let report = pipeline.frame(&config, &paths, DT, now).unwrap();
            assert!(!report.advanced);
        }
        assert_eq!(pipeline.state(), PipelineState::Paused);
        assert_eq!(pipeline.elapsed(), elapsed, "time frozen while paused");
        assert!(trace_stamps(&pipeline).is_empty());
        assert_eq!(
            pipeline.backend().count(|c| matches!(c, MockCall::Composite(_))),
            5,
            "compositing continues while paused"
        );

        config.paused = false;
        pipeline.frame(&config, &paths, DT, now).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Running);
        assert!(pipeline.elapsed() > elapsed);
    }

    #[test]
    fn test_arrow_and_circle_caps() {
        let (mut pipeline, paths, now) = setup();
        let mut config = config();
        config.set_frequency_count(100);
        config.used_frequency_count = 4000;

        let report = pipeline.frame(&config, &paths, DT, now).unwrap();
        assert_eq!(report.arrows, 50);
        assert_eq!(report.circles, 30);
        for call in pipeline.backend().calls() {
            match call {
                MockCall::Arrows { count, .. } => assert!(*count <= 50),
                MockCall::Circles { count, .. } => assert!(*count <= 30),
                _ => {}
            }
        }
    }

    #[test]
    fn test_arrows_toggle() {
        let (mut pipeline, paths, now) = setup();
        let mut config = config();
        config.rotating_arrows = false;
        let report = pipeline.frame(&config, &paths, DT, now).unwrap();
        assert_eq!(report.arrows, 0);
        assert_eq!(
            pipeline.backend().count(|c| matches!(c, MockCall::Arrows { .. })),
            0
        );

        let read_before = pipeline.context().unwrap().layers.arrows.read().texture().id;
        pipeline.frame(&config, &paths, DT, now).unwrap();
        let read_after = pipeline.context().unwrap().layers.arrows.read().texture().id;
        assert_ne!(read_before, read_after, "arrow layer still swaps every frame");
    }

    #[test]
    fn test_resize_restarts_loop_and_redraws_ghosts_later() {
        let (mut pipeline, paths, mut now) = setup();
        let config = config();
        for _ in 0..30 {
            pipeline.frame(&config, &paths, DT, now).unwrap();
        }
        assert!(pipeline.elapsed() > 0.04);

        pipeline.backend_mut().set_surface_size(1000, 500);
        let report = pipeline.frame(&config, &paths, DT, now).unwrap();
        assert!(report.resized);
        assert!(!report.ghosts_redrawn, "ghost redraw is debounced");
        assert!(pipeline.elapsed() < 0.01, "loop restarts after a resize");
        let context = pipeline.context().unwrap();
        assert_eq!(context.layers.size(), pipeline.render_config().layer_size(1000, 500, 8192));
        assert_eq!(context.animation.aspect_ratio(), 2.0);

        now += Duration::from_millis(200);
        assert!(!pipeline.frame(&config, &paths, DT, now).unwrap().ghosts_redrawn);
        now += Duration::from_millis(400);
        assert!(pipeline.frame(&config, &paths, DT, now).unwrap().ghosts_redrawn);
        assert!(!pipeline.frame(&config, &paths, DT, now).unwrap().ghosts_redrawn);
    }

    #[test]
    fn test_unchanged_size_is_not_a_resize() {
        let (mut pipeline, paths, now) = setup();
        let config = config();
        pipeline.frame(&config, &paths, DT, now).unwrap();
        let allocations = pipeline.backend().allocation_count();
        for _ in 0..5 {
            assert!(!pipeline.frame(&config, &paths, DT, now).unwrap().resized);
        }
        assert_eq!(pipeline.backend().allocation_count(), allocations);
    }

    #[test]
    fn test_resize_respects_texture_limit() {
        let backend = MockBackend::new(640, 480).with_max_texture_dimension(2048);
        let mut pipeline = AnimationPipeline::new(
            backend,
            RenderConfig {
                display_resolution: 1024,
                ..render()
            },
        );
        let paths = PathLibrary::builtin(256);
        let config = config();
        let now = Instant::now();
        pipeline.frame(&config, &paths, DT, now).unwrap();

        pipeline.backend_mut().set_surface_size(1600, 150);
        assert!(pipeline.frame(&config, &paths, DT, now).unwrap().resized);
        let (width, height) = pipeline.context().unwrap().layers.size();
        assert_eq!(width, 2048, "layer width clamped to the device limit");
        assert_eq!(height, 192);
        assert_eq!(pipeline.context().unwrap().animation.aspect_ratio(), 1600.0 / 150.0);
    }

    #[test]
    fn test_config_edits_are_debounced() {
        let (mut pipeline, paths, mut now) = setup();
        let mut config = config();
        pipeline.frame(&config, &paths, DT, now).unwrap();
        pipeline.backend_mut().clear_calls();

        // A slider drag: several edits inside the quiet period
        for count in [400, 500, 600] {
            config.set_iteration_count(count);
            now += Duration::from_millis(100);
            let report = pipeline.frame(&config, &paths, DT, now).unwrap();
            assert!(!report.recomputed);
        }
        assert_eq!(coefficient_passes(pipeline.backend()), 0);

        now += Duration::from_millis(350);
        let report = pipeline.frame(&config, &paths, DT, now).unwrap();
        assert!(report.recomputed);
        assert!(report.ghosts_redrawn);
        assert_eq!(coefficient_passes(pipeline.backend()), 2, "one recompute for the whole drag");
    }

    #[test]
    fn test_frequency_change_rebuilds_terms() {
        let (mut pipeline, paths, mut now) = setup();
        let mut config = config();
        pipeline.frame(&config, &paths, DT, now).unwrap();

        config.set_frequency_count(12);
        pipeline.frame(&config, &paths, DT, now).unwrap();
        now += Duration::from_millis(400);
        pipeline.frame(&config, &paths, DT, now).unwrap();
        let context = pipeline.context().unwrap();
        assert_eq!(context.terms.len(), 25);
        assert_eq!(context.engine.width(), 13);
        assert_eq!(context.animation.arrows.len(), 25);
    }

    #[test]
    fn test_path_change_restarts_loop() {
        let (mut pipeline, paths, mut now) = setup();
        let mut config = config();
        for _ in 0..20 {
            pipeline.frame(&config, &paths, DT, now).unwrap();
        }
        config.active_path = PathShape::Star;
        let report = pipeline.frame(&config, &paths, DT, now).unwrap();
        assert!(report.recomputed, "a new shape is not debounced");
        assert!(!report.ghosts_redrawn, "ghost redraw is debounced");
        assert!(pipeline.elapsed() < 0.01);

        now += Duration::from_millis(400);
        let report = pipeline.frame(&config, &paths, DT, now).unwrap();
        assert!(!report.recomputed);
        assert!(report.ghosts_redrawn);
        let context = pipeline.context().unwrap();
        assert_eq!(context.path_textures.len(), 2, "one upload per shape");
    }

    #[test]
    fn test_path_change_never_traces_old_terms() {
        let (mut pipeline, paths, mut now) = setup();
        let mut config = config();
        for _ in 0..20 {
            pipeline.frame(&config, &paths, DT, now).unwrap();
        }
        let old_terms = pipeline.context().unwrap().terms.clone();

        pipeline.backend_mut().clear_calls();
        config.active_path = PathShape::Star;
        for _ in 0..30 {
            now += Duration::from_millis(16);
            pipeline.frame(&config, &paths, DT, now).unwrap();
        }

        let trace = pipeline.context().unwrap().layers.trace.texture().id;
        let calls = pipeline.backend().calls();
        let first_pass = calls
            .iter()
            .position(|c| matches!(c, MockCall::Coefficients { .. }))
            .unwrap();
        let first_stamp = calls
            .iter()
            .position(|c| matches!(c, MockCall::Stamp { target, .. } if *target == trace))
            .unwrap();
        assert!(
            first_pass < first_stamp,
            "live trace stamped before the new shape's coefficients existed"
        );
        assert_eq!(coefficient_passes(pipeline.backend()), 2, "single recompute for the change");
        assert_ne!(pipeline.context().unwrap().terms, old_terms);
    }

    #[test]
    fn test_debounced_recompute_discards_stale_trace() {
        let (mut pipeline, paths, mut now) = setup();
        let mut config = config();
        for _ in 0..20 {
            pipeline.frame(&config, &paths, DT, now).unwrap();
        }

        config.set_iteration_count(600);
        pipeline.frame(&config, &paths, DT, now).unwrap();
        for _ in 0..10 {
            now += Duration::from_millis(20);
            let report = pipeline.frame(&config, &paths, DT, now).unwrap();
            assert!(!report.recomputed);
        }
        assert!(pipeline.elapsed() > 0.01, "old terms keep animating in the quiet period");

        pipeline.backend_mut().clear_calls();
        now += Duration::from_millis(400);
        let report = pipeline.frame(&config, &paths, DT, now).unwrap();
        assert!(report.recomputed);
        assert!(pipeline.elapsed() < 0.01, "loop restarts with the new terms");

        let trace = pipeline.context().unwrap().layers.trace.texture().id;
        let calls = pipeline.backend().calls();
        let last_pass = calls
            .iter()
            .rposition(|c| matches!(c, MockCall::Coefficients { .. }))
            .unwrap();
        assert!(
            calls[last_pass..].contains(&MockCall::Clear(trace)),
            "trace from the previous terms survives the recompute"
        );
    }

    #[test]
    fn test_used_count_change_redraws_ghosts_only() {
        let (mut pipeline, paths, mut now) = setup();
        let mut config = config();
        pipeline.frame(&config, &paths, DT, now).unwrap();
        pipeline.backend_mut().clear_calls();

        config.set_used_frequency_count(10);
        pipeline.frame(&config, &paths, DT, now).unwrap();
        now += Duration::from_millis(400);
        let report = pipeline.frame(&config, &paths, DT, now).unwrap();
        assert!(report.ghosts_redrawn);
        assert!(!report.recomputed);
        assert_eq!(coefficient_passes(pipeline.backend()), 0);
    }

    #[test]
    fn test_reset_recomputes_immediately() {
        let (mut pipeline, paths, now) = setup();
        let mut config = config();
        config.paused = true;
        pipeline.frame(&config, &paths, DT, now).unwrap();
        pipeline.backend_mut().clear_calls();

        pipeline.reset(&mut config, &paths);
        assert_eq!(config, SimulationConfig::default());
        assert_eq!(coefficient_passes(pipeline.backend()), 2);
        let context = pipeline.context().unwrap();
        assert_eq!(context.terms.len(), config.coefficient_count());
        assert_eq!(context.animation.elapsed, 0.0);

        pipeline.frame(&config, &paths, DT, now).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Running);
    }

    #[test]
    fn test_teardown_releases_everything() {
        let (mut pipeline, paths, now) = setup();
        let config = config();
        pipeline.frame(&config, &paths, DT, now).unwrap();
        pipeline.teardown();

        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert!(pipeline.context().is_none());
        let backend = pipeline.backend();
        let created: Vec<u32> = backend
            .calls()
            .iter()
            .filter_map(|c| match c {
                MockCall::Create { id, .. } => Some(*id),
                _ => None,
            })
            .collect();
        let leaked: Vec<u32> = created
            .into_iter()
            .filter(|&id| !backend.is_released(id))
            .collect();
        assert!(leaked.is_empty(), "textures not released: {leaked:?}");

        pipeline.frame(&config, &paths, DT, now).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Running, "restarts on the next frame");
    }
}
