//! GPU coefficient reduction.
//!
//! For `F` frequencies the engine renders two one-row targets of `F + 1`
//! texels each, one per sign, where texel `k` holds `c(±k)`. The rows are
//! read back and merged into the interleaved order `[c0, c1, c−1, c2, c−2, …]`.

use std::time::Instant;

use crate::complex::Complex;
use crate::gpu::backend::{CoefficientPass, GraphicsBackend};
use crate::gpu::framebuffer::{FrameBuffer, TextureSpec};
use crate::gpu::program::{PATH_IMAG_BINDING, PATH_REAL_BINDING};
use crate::paths::PathSamples;

/// Path samples uploaded as two one-row textures (real and imaginary parts)
pub struct PathTextures<T> {
    real: FrameBuffer<T>,
    imag: FrameBuffer<T>,
}

impl<T> PathTextures<T> {
    pub fn upload<B>(backend: &mut B, samples: &PathSamples) -> Self
    where
        B: GraphicsBackend<Texture = T>,
    {
        let format = backend.formats().path;
        let width = samples.len() as u32;
        let real = padded_channel(&samples.real_channel(), format.channels());
        let imag = padded_channel(&samples.imag_channel(), format.channels());
        log::debug!("Uploading {} path samples as {:?}", width, format);
        Self {
            real: FrameBuffer::create(
                backend,
                TextureSpec::new("path real", width, 1, format),
                Some(&real),
            ),
            imag: FrameBuffer::create(
                backend,
                TextureSpec::new("path imag", width, 1, format),
                Some(&imag),
            ),
        }
    }

    pub fn sample_count(&self) -> u32 {
        self.real.width()
    }

    pub fn release<B>(self, backend: &mut B)
    where
        B: GraphicsBackend<Texture = T>,
    {
        backend.release_texture(self.real.into_texture());
        backend.release_texture(self.imag.into_texture());
    }
}

/// Spread one value per texel into the first channel of a `channels`-wide texel
fn padded_channel(values: &[f32], channels: usize) -> Vec<f32> {
    let mut out = vec![0.0; values.len() * channels];
    for (texel, &value) in out.chunks_exact_mut(channels).zip(values) {
        texel[0] = value;
    }
    out
}

/// First two channels of every texel as a complex number
pub fn decode_row(raw: &[f32], channels: usize) -> Vec<Complex> {
    if channels < 2 {
        return Vec::new();
    }
    raw.chunks_exact(channels)
        .map(|texel| Complex::new(texel[0], texel[1]))
        .collect()
}

/// Merge per-sign rows into `[c0, c1, c−1, …, cF, c−F]`.
/// The DC term is taken from the positive row.
pub fn interleave(positive: &[Complex], negative: &[Complex]) -> Vec<Complex> {
    let Some(&dc) = positive.first() else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(positive.len() * 2);
    out.push(dc);
    for (&pos, &neg) in positive.iter().zip(negative).skip(1) {
        out.push(pos);
        out.push(neg);
    }
    out
}

/// Owns the coefficient targets and runs the two-pass reduction
pub struct FourierCoefficientEngine<T> {
    positive: Option<FrameBuffer<T>>,
    negative: Option<FrameBuffer<T>>,
}

impl<T> Default for FourierCoefficientEngine<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FourierCoefficientEngine<T> {
    pub fn new() -> Self {
        Self {
            positive: None,
            negative: None,
        }
    }

    /// Width of the current coefficient targets (0 before the first run)
    pub fn width(&self) -> u32 {
        self.positive.as_ref().map_or(0, FrameBuffer::width)
    }

    /// Rebuild both targets when the frequency count changes
    fn ensure_targets<B>(&mut self, backend: &mut B, width: u32)
    where
        B: GraphicsBackend<Texture = T>,
    {
        if self.width() == width {
            return;
        }
        self.release_targets(backend);
        let format = backend.formats().coefficient;
        log::debug!("Allocating coefficient targets {}x1 {:?}", width, format);
        self.positive = Some(FrameBuffer::create(
            backend,
            TextureSpec::new("positive coefficients", width, 1, format),
            None,
        ));
        self.negative = Some(FrameBuffer::create(
            backend,
            TextureSpec::new("negative coefficients", width, 1, format),
            None,
        ));
    }

    fn release_targets<B>(&mut self, backend: &mut B)
    where
        B: GraphicsBackend<Texture = T>,
    {
        for target in [self.positive.take(), self.negative.take()].into_iter().flatten() {
            backend.release_texture(target.into_texture());
        }
    }

    /// Compute `2·frequency_count + 1` interleaved coefficients of `path`.
    ///
    /// # Arguments
    /// * `backend` - Backend that runs the reduction
    /// * `path` - Uploaded path samples; `None` while the path is not ready
    /// * `iteration_count` - Rectangle-rule steps over `t ∈ [0,1)`
    /// * `frequency_count` - Highest frequency `F`
    ///
    /// # Returns
    /// An empty vector when the path is not ready or the read-back failed.
    pub fn compute<B>(
        &mut self,
        backend: &mut B,
        path: Option<&PathTextures<T>>,
        iteration_count: u32,
        frequency_count: u32,
    ) -> Vec<Complex>
    where
        B: GraphicsBackend<Texture = T>,
    {
        let Some(path) = path else {
            log::debug!("Path not ready, skipping coefficient computation");
            return Vec::new();
        };
        let started = Instant::now();
        self.ensure_targets(backend, frequency_count + 1);

        let (Some(positive), Some(negative)) = (&self.positive, &self.negative) else {
            return Vec::new();
        };
        let channels = positive.format().channels();

        let mut rows = Vec::with_capacity(2);
        for (output, is_negative) in [(positive, false), (negative, true)] {
            backend.run_coefficient_pass(&CoefficientPass {
                real: path.real.attach(PATH_REAL_BINDING),
                imag: path.imag.attach(PATH_IMAG_BINDING),
                output,
                iteration_count,
                negative: is_negative,
            });
            rows.push(decode_row(&backend.read_row(output), channels));
        }

        let expected = frequency_count as usize + 1;
        if rows.iter().any(|row| row.len() != expected) {
            log::warn!(
                "Coefficient read-back returned {:?} texels, expected {}",
                rows.iter().map(Vec::len).collect::<Vec<_>>(),
                expected
            );
            return Vec::new();
        }

        let coefficients = interleave(&rows[0], &rows[1]);
        log::info!(
            "Computed {} coefficients from {} samples ({} iterations) in {:.1?}",
            coefficients.len(),
            path.sample_count(),
            iteration_count,
            started.elapsed()
        );
        coefficients
    }

    pub fn release<B>(mut self, backend: &mut B)
    where
        B: GraphicsBackend<Texture = T>,
    {
        self.release_targets(backend);
    }
}
