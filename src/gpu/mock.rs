//! CPU backend for tests: textures are float arrays and every call is recorded.

use std::collections::HashMap;
use std::f64::consts::TAU;

use crate::complex::Complex;
use crate::error::SimulationError;
use crate::gpu::backend::{ArrowInstance, CoefficientPass, GraphicsBackend, OrbitCircle, OrbitStyle};
use crate::gpu::capability::{Filtering, FloatFormat, RenderFormats};
use crate::gpu::framebuffer::{FrameBuffer, TextureSpec};
use crate::params::TraceStyle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockTexture {
    pub id: u32,
    pub width: u32,
    pub height: u32,
    pub channels: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Create { id: u32, label: &'static str },
    Release(u32),
    Copy { from: u32, to: u32 },
    Clear(u32),
    Stamp { target: u32, points: usize, clear: bool },
    Circles { target: u32, count: usize },
    Arrows { target: u32, count: usize },
    Coefficients { output: u32, negative: bool },
    ReadRow(u32),
    Composite(Vec<u32>),
}

pub struct MockBackend {
    surface: (u32, u32),
    max_dimension: u32,
    formats: RenderFormats,
    next_id: u32,
    texels: HashMap<u32, Vec<f32>>,
    calls: Vec<MockCall>,
}

impl MockBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface: (width, height),
            max_dimension: 8192,
            formats: RenderFormats {
                layer: FloatFormat::Rgba16,
                coefficient: FloatFormat::Rg32,
                path: FloatFormat::R32,
                layer_filtering: Filtering::Linear,
            },
            next_id: 1,
            texels: HashMap::new(),
            calls: Vec::new(),
        }
    }

    pub fn with_formats(mut self, formats: RenderFormats) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_max_texture_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    pub fn set_surface_size(&mut self, width: u32, height: u32) {
        self.surface = (width, height);
    }

    pub fn calls(&self) -> &[MockCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn allocation_count(&self) -> usize {
        self.count(|c| matches!(c, MockCall::Create { .. }))
    }

    pub fn copy_count(&self) -> usize {
        self.count(|c| matches!(c, MockCall::Copy { .. }))
    }

    pub fn count(&self, predicate: impl Fn(&MockCall) -> bool) -> usize {
        self.calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn is_released(&self, id: u32) -> bool {
        self.calls.contains(&MockCall::Release(id))
    }

    /// Texel at `(x, y)`, missing channels read as zero
    pub fn pixel(&self, texture: &MockTexture, x: u32, y: u32) -> [f32; 4] {
        let data = &self.texels[&texture.id];
        let base = (y * texture.width + x) as usize * texture.channels;
        let mut out = [0.0; 4];
        out[..texture.channels].copy_from_slice(&data[base..base + texture.channels]);
        out
    }
}

/// Rectangle-rule quadrature exactly as the coefficient shader performs it
pub fn reference_coefficient(samples: &[Complex], frequency: f64, iterations: u32) -> Complex {
    let n = samples.len();
    let dt = 1.0 / iterations as f64;
    let (mut real, mut imag) = (0.0f64, 0.0f64);
    for i in 0..iterations {
        let t = dt * i as f64;
        let index = ((t * n as f64) as usize).min(n - 1);
        let p = samples[index];
        let theta = -TAU * (frequency * t).rem_euclid(1.0);
        let (s, c) = theta.sin_cos();
        real += (p.real as f64 * c - p.imag as f64 * s) * dt;
        imag += (p.real as f64 * s + p.imag as f64 * c) * dt;
    }
    Complex::new(real as f32, imag as f32)
}

impl GraphicsBackend for MockBackend {
    type Texture = MockTexture;

    fn formats(&self) -> RenderFormats {
        self.formats
    }

    fn surface_size(&self) -> (u32, u32) {
        self.surface
    }

    fn max_texture_dimension(&self) -> u32 {
        self.max_dimension
    }

    fn create_texture(&mut self, spec: &TextureSpec, data: Option<&[f32]>) -> MockTexture {
        let id = self.next_id;
        self.next_id += 1;
        let channels = spec.format.channels();
        let len = spec.texel_count() * channels;
        let texels = match data {
            Some(data) => {
                assert_eq!(data.len(), len, "initial data size mismatch for {}", spec.label);
                data.to_vec()
            }
            None => vec![0.0; len],
        };
        self.texels.insert(id, texels);
        self.calls.push(MockCall::Create {
            id,
            label: spec.label,
        });
        MockTexture {
            id,
            width: spec.width,
            height: spec.height,
            channels,
        }
    }

    fn release_texture(&mut self, texture: MockTexture) {
        self.texels.remove(&texture.id);
        self.calls.push(MockCall::Release(texture.id));
    }

    fn copy(&mut self, source: &FrameBuffer<MockTexture>, target: &FrameBuffer<MockTexture>) {
        let src = source.texture();
        let dst = target.texture();
        let mut out = vec![0.0; dst.width as usize * dst.height as usize * dst.channels];
        for y in 0..dst.height {
            for x in 0..dst.width {
                let u = (x as f32 + 0.5) * target.texel_size_x();
                let v = (y as f32 + 0.5) * target.texel_size_y();
                let sx = ((u * src.width as f32) as u32).min(src.width - 1);
                let sy = ((v * src.height as f32) as u32).min(src.height - 1);
                let texel = self.pixel(src, sx, sy);
                let base = (y * dst.width + x) as usize * dst.channels;
                out[base..base + dst.channels].copy_from_slice(&texel[..dst.channels]);
            }
        }
        self.texels.insert(dst.id, out);
        self.calls.push(MockCall::Copy {
            from: src.id,
            to: dst.id,
        });
    }

    fn clear(&mut self, target: &FrameBuffer<MockTexture>) {
        let id = target.texture().id;
        if let Some(texels) = self.texels.get_mut(&id) {
            texels.fill(0.0);
        }
        self.calls.push(MockCall::Clear(id));
    }

    fn stamp_points(
        &mut self,
        target: &FrameBuffer<MockTexture>,
        _style: &TraceStyle,
        _aspect_ratio: f32,
        points: &[Complex],
        clear_first: bool,
    ) {
        self.calls.push(MockCall::Stamp {
            target: target.texture().id,
            points: points.len(),
            clear: clear_first,
        });
    }

    fn draw_orbit_circles(
        &mut self,
        target: &FrameBuffer<MockTexture>,
        _style: &OrbitStyle,
        _aspect_ratio: f32,
        circles: &[OrbitCircle],
    ) {
        self.calls.push(MockCall::Circles {
            target: target.texture().id,
            count: circles.len(),
        });
    }

    fn draw_arrows(
        &mut self,
        target: &FrameBuffer<MockTexture>,
        _color: [f32; 4],
        arrows: &[ArrowInstance],
    ) {
        self.calls.push(MockCall::Arrows {
            target: target.texture().id,
            count: arrows.len(),
        });
    }

    fn run_coefficient_pass(&mut self, pass: &CoefficientPass<'_, MockTexture>) {
        let real = pass.real.target.texture();
        let imag = pass.imag.target.texture();
        let samples: Vec<Complex> = (0..real.width)
            .map(|x| Complex::new(self.pixel(real, x, 0)[0], self.pixel(imag, x, 0)[0]))
            .collect();

        let output = pass.output.texture();
        let sign = if pass.negative { -1.0 } else { 1.0 };
        let mut out = vec![0.0; output.width as usize * output.channels];
        for bin in 0..output.width {
            let c = reference_coefficient(&samples, sign * bin as f64, pass.iteration_count);
            let base = bin as usize * output.channels;
            out[base] = c.real;
            out[base + 1] = c.imag;
            if output.channels == 4 {
                out[base + 3] = 1.0;
            }
        }
        self.texels.insert(output.id, out);
        self.calls.push(MockCall::Coefficients {
            output: output.id,
            negative: pass.negative,
        });
    }

    fn read_row(&mut self, source: &FrameBuffer<MockTexture>) -> Vec<f32> {
        let id = source.texture().id;
        self.calls.push(MockCall::ReadRow(id));
        let texture = source.texture();
        self.texels[&id][..texture.width as usize * texture.channels].to_vec()
    }

    fn composite(
        &mut self,
        layers: &[&FrameBuffer<MockTexture>],
    ) -> Result<(), SimulationError> {
        self.calls.push(MockCall::Composite(
            layers.iter().map(|l| l.texture().id).collect(),
        ));
        Ok(())
    }
}
