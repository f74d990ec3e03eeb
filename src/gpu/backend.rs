//! The graphics backend seam.
//!
//! The animation pipeline and the coefficient engine issue all GPU work
//! through [`GraphicsBackend`]. The wgpu renderer implements it for real
//! windows; tests use a CPU implementation.

use bytemuck::{Pod, Zeroable};

use crate::complex::Complex;
use crate::error::SimulationError;
use crate::gpu::capability::RenderFormats;
use crate::gpu::framebuffer::{FrameBuffer, TextureBinding, TextureSpec};
use crate::params::TraceStyle;

/// Per-instance data of one rotating arrow
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ArrowInstance {
    /// Column-major 3×3 affine transform (arrow space → clip space)
    pub transform: [[f32; 3]; 3],
    /// Arrow length before transform; divides the shaft thickness
    pub shaft_scale: f32,
}

/// Per-instance data of one orbit circle
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct OrbitCircle {
    /// Centre in path space (`[0,1]²`, y down)
    pub center: [f32; 2],
    /// Radius in the pre-aspect arrow space
    pub radius: f32,
}

/// Ring appearance for orbit circles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitStyle {
    pub color: [f32; 4],
    pub stroke_width: f32,
}

/// One sign of the coefficient reduction
pub struct CoefficientPass<'a, T> {
    pub real: TextureBinding<'a, T>,
    pub imag: TextureBinding<'a, T>,
    pub output: &'a FrameBuffer<T>,
    /// Rectangle-rule steps over `t ∈ [0,1)`
    pub iteration_count: u32,
    /// Integrate against `e^(+i·2π·f·t)` instead of `e^(−i·2π·f·t)`
    pub negative: bool,
}

/// GPU operations used by the simulation
pub trait GraphicsBackend {
    /// Backend texture handle, owned by a [`FrameBuffer`]
    type Texture;

    fn formats(&self) -> RenderFormats;

    /// Current drawable size in pixels
    fn surface_size(&self) -> (u32, u32);

    /// Largest width or height a 2D texture may have
    fn max_texture_dimension(&self) -> u32;

    /// Allocate a texture; `data` holds `width × height × channels` floats.
    fn create_texture(&mut self, spec: &TextureSpec, data: Option<&[f32]>) -> Self::Texture;

    /// Retire a texture after all work referencing it has been submitted
    fn release_texture(&mut self, texture: Self::Texture);

    /// Full-target copy pass, resampling `source` to the target size
    fn copy(&mut self, source: &FrameBuffer<Self::Texture>, target: &FrameBuffer<Self::Texture>);

    /// Clear to transparent
    fn clear(&mut self, target: &FrameBuffer<Self::Texture>);

    /// Stamp a disc for every point (path space, `[0,1]²`, y down)
    fn stamp_points(
        &mut self,
        target: &FrameBuffer<Self::Texture>,
        style: &TraceStyle,
        aspect_ratio: f32,
        points: &[Complex],
        clear_first: bool,
    );

    fn draw_orbit_circles(
        &mut self,
        target: &FrameBuffer<Self::Texture>,
        style: &OrbitStyle,
        aspect_ratio: f32,
        circles: &[OrbitCircle],
    );

    fn draw_arrows(
        &mut self,
        target: &FrameBuffer<Self::Texture>,
        color: [f32; 4],
        arrows: &[ArrowInstance],
    );

    /// Render one sign of coefficients into `pass.output`, one texel per frequency
    fn run_coefficient_pass(&mut self, pass: &CoefficientPass<'_, Self::Texture>);

    /// Read back every texel of a one-row target, `channels` floats per texel.
    /// Blocks until the GPU has finished.
    fn read_row(&mut self, source: &FrameBuffer<Self::Texture>) -> Vec<f32>;

    /// Draw `layers` back to front onto the visible surface and present
    fn composite(&mut self, layers: &[&FrameBuffer<Self::Texture>]) -> Result<(), SimulationError>;
}
