//! wgpu implementation of the graphics backend.
//!
//! Every operation records its own encoder and submits it immediately, so
//! uniform writes staged for one draw never leak into another.

use std::path::PathBuf;

use wgpu::util::DeviceExt;

use crate::complex::Complex;
use crate::error::SimulationError;
use crate::gpu::backend::{ArrowInstance, CoefficientPass, GraphicsBackend, OrbitCircle, OrbitStyle};
use crate::gpu::capability::{Filtering, FloatFormat, GpuContext, RenderFormats};
use crate::gpu::framebuffer::{FrameBuffer, TextureSpec};
use crate::gpu::geometry::{GeometryCache, ARROW_INDICES, QUAD_INDICES};
use crate::gpu::program::ShaderProgramRegistry;
use crate::params::TraceStyle;

/// Texture plus the view every pass binds
pub struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    format: FloatFormat,
}

pub struct WgpuBackend {
    context: GpuContext,
    registry: ShaderProgramRegistry,
    geometry: GeometryCache,
    layer_sampler: wgpu::Sampler,
    background: wgpu::Color,
    pending_capture: Option<PathBuf>,
}

impl WgpuBackend {
    /// Link every shader program against the negotiated formats.
    ///
    /// # Arguments
    /// * `context` - Device, queue and configured surface
    /// * `background` - Clear colour of the visible surface
    pub fn new(context: GpuContext, background: [f64; 4]) -> Result<Self, SimulationError> {
        let registry = ShaderProgramRegistry::new(
            &context.device,
            &context.formats,
            context.surface_config.format,
        )?;
        let geometry = GeometryCache::new(&context.device);

        let filter = match context.formats.layer_filtering {
            Filtering::Linear => wgpu::FilterMode::Linear,
            Filtering::Nearest => wgpu::FilterMode::Nearest,
        };
        let layer_sampler = context.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Layer Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let [r, g, b, a] = background;
        Ok(Self {
            context,
            registry,
            geometry,
            layer_sampler,
            background: wgpu::Color { r, g, b, a },
            pending_capture: None,
        })
    }

    /// Reconfigure the surface after a window resize; zero sizes are ignored
    pub fn resize_surface(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.context.surface_config.width = width;
            self.context.surface_config.height = height;
            self.context
                .surface
                .configure(&self.context.device, &self.context.surface_config);
        }
    }

    /// Save the next composited frame as PNG
    pub fn request_capture(&mut self, path: PathBuf) {
        if !self
            .context
            .surface_config
            .usage
            .contains(wgpu::TextureUsages::COPY_SRC)
        {
            log::warn!("Frame capture needs --capture-dir at startup");
            return;
        }
        self.pending_capture = Some(path);
    }

    fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.context.queue.submit(std::iter::once(encoder.finish()));
    }

    fn instance_buffer(&self, label: &str, contents: &[u8]) -> wgpu::Buffer {
        self.context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::VERTEX,
            })
    }

    /// Save the surface texture as PNG, swizzling BGRA surfaces to RGBA
    fn capture_frame(
        &self,
        path: &PathBuf,
        output: &wgpu::SurfaceTexture,
    ) -> Result<(), SimulationError> {
        let format = self.context.surface_config.format;
        let swizzle = match format {
            wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => false,
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => true,
            other => {
                return Err(SimulationError::Capture(format!(
                    "unsupported surface format {:?}",
                    other
                )))
            }
        };

        let width = output.texture.width();
        let height = output.texture.height();
        let bytes_per_pixel = 4;
        let unpadded_bytes_per_row = width * bytes_per_pixel;
        let padded_bytes_per_row = padded_row(unpadded_bytes_per_row);

        let buffer = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Capture Buffer"),
            size: (padded_bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.encoder("Frame Capture Encoder");
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &output.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.submit(encoder);

        let data = map_buffer(&self.context.device, &buffer)
            .ok_or_else(|| SimulationError::Capture("failed to map capture buffer".into()))?;
        let mut image_data = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        for row in data.chunks(padded_bytes_per_row as usize).take(height as usize) {
            image_data.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
        }
        if swizzle {
            for pixel in image_data.chunks_exact_mut(4) {
                pixel.swap(0, 2);
            }
        }

        image::save_buffer(path, &image_data, width, height, image::ColorType::Rgba8)
            .map_err(|e| SimulationError::Capture(format!("{}: {}", path.display(), e)))?;
        log::info!("Captured frame to {}", path.display());
        Ok(())
    }
}

/// Rows of a texture-to-buffer copy must be 256-byte aligned
fn padded_row(unpadded: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Map `buffer` for reading and block until the GPU is done with it
fn map_buffer(device: &wgpu::Device, buffer: &wgpu::Buffer) -> Option<Vec<u8>> {
    let slice = buffer.slice(..);
    let (sender, receiver) = futures::channel::oneshot::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::Maintain::Wait);

    match pollster::block_on(receiver) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            log::error!("Buffer map failed: {}", e);
            return None;
        }
        Err(_) => {
            log::error!("Buffer map callback dropped");
            return None;
        }
    }
    let data = slice.get_mapped_range().to_vec();
    buffer.unmap();
    Some(data)
}

fn color_attachment(view: &wgpu::TextureView, load: wgpu::LoadOp<wgpu::Color>) -> wgpu::RenderPassColorAttachment<'_> {
    wgpu::RenderPassColorAttachment {
        view,
        resolve_target: None,
        ops: wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
        },
    }
}

fn begin_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    label: &str,
    view: &wgpu::TextureView,
    load: wgpu::LoadOp<wgpu::Color>,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(color_attachment(view, load))],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}

fn load_op(clear_first: bool) -> wgpu::LoadOp<wgpu::Color> {
    if clear_first {
        wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
    } else {
        wgpu::LoadOp::Load
    }
}

impl GraphicsBackend for WgpuBackend {
    type Texture = GpuTexture;

    fn formats(&self) -> RenderFormats {
        self.context.formats
    }

    fn max_texture_dimension(&self) -> u32 {
        self.context.device.limits().max_texture_dimension_2d
    }

    fn surface_size(&self) -> (u32, u32) {
        (
            self.context.surface_config.width,
            self.context.surface_config.height,
        )
    }

    fn create_texture(&mut self, spec: &TextureSpec, data: Option<&[f32]>) -> GpuTexture {
        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let size = wgpu::Extent3d {
            width: spec.width,
            height: spec.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(spec.label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: spec.format.to_wgpu(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        match data {
            Some(_) if spec.format.is_half() => {
                log::warn!(
                    "{}: initial data ignored for half-float format {:?}",
                    spec.label,
                    spec.format
                );
            }
            Some(data) => {
                self.context.queue.write_texture(
                    wgpu::ImageCopyTexture {
                        texture: &texture,
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    bytemuck::cast_slice(data),
                    wgpu::ImageDataLayout {
                        offset: 0,
                        bytes_per_row: Some(spec.width * spec.format.bytes_per_texel()),
                        rows_per_image: Some(spec.height),
                    },
                    size,
                );
            }
            None => {}
        }

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            log::warn!(
                "Render target '{}' ({}x{} {:?}) incomplete: {}",
                spec.label,
                spec.width,
                spec.height,
                spec.format,
                err
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuTexture {
            texture,
            view,
            width: spec.width,
            format: spec.format,
        }
    }

    fn release_texture(&mut self, texture: GpuTexture) {
        texture.texture.destroy();
    }

    fn copy(&mut self, source: &FrameBuffer<GpuTexture>, target: &FrameBuffer<GpuTexture>) {
        let bind_group = self.registry.copy.bind_group(
            &self.context.device,
            &[(self.registry.slots.source, &source.texture().view)],
            Some(&self.layer_sampler),
        );

        let mut encoder = self.encoder("Copy Encoder");
        {
            let mut pass = begin_pass(
                &mut encoder,
                "Copy Pass",
                &target.texture().view,
                wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            );
            self.registry.copy.bind(&mut pass, &bind_group);
            pass.set_vertex_buffer(0, self.geometry.quad_vertices.slice(..));
            pass.set_index_buffer(self.geometry.quad_indices.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
        }
        self.submit(encoder);
    }

    fn clear(&mut self, target: &FrameBuffer<GpuTexture>) {
        let mut encoder = self.encoder("Clear Encoder");
        begin_pass(
            &mut encoder,
            "Clear Pass",
            &target.texture().view,
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
        );
        self.submit(encoder);
    }

    fn stamp_points(
        &mut self,
        target: &FrameBuffer<GpuTexture>,
        style: &TraceStyle,
        aspect_ratio: f32,
        points: &[Complex],
        clear_first: bool,
    ) {
        let mut encoder = self.encoder("Trace Encoder");
        if points.is_empty() {
            if clear_first {
                begin_pass(&mut encoder, "Trace Pass", &target.texture().view, load_op(true));
                self.submit(encoder);
            }
            return;
        }

        let program = &mut self.registry.trace;
        program
            .uniforms()
            .set_vec4("color", style.color)
            .set_vec2("texel_size", target.texel_size())
            .set_f32("aspect_ratio", aspect_ratio)
            .set_f32("radius", style.radius);
        program.upload(&self.context.queue);
        let bind_group = program.bind_group(&self.context.device, &[], None);

        let centers: Vec<[f32; 2]> = points.iter().map(|p| [p.real, p.imag]).collect();
        let instances = self.instance_buffer("Trace Instances", bytemuck::cast_slice(&centers));

        {
            let mut pass = begin_pass(
                &mut encoder,
                "Trace Pass",
                &target.texture().view,
                load_op(clear_first),
            );
            self.registry.trace.bind(&mut pass, &bind_group);
            pass.set_vertex_buffer(0, self.geometry.quad_vertices.slice(..));
            pass.set_vertex_buffer(1, instances.slice(..));
            pass.set_index_buffer(self.geometry.quad_indices.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..centers.len() as u32);
        }
        self.submit(encoder);
    }

    fn draw_orbit_circles(
        &mut self,
        target: &FrameBuffer<GpuTexture>,
        style: &OrbitStyle,
        aspect_ratio: f32,
        circles: &[OrbitCircle],
    ) {
        if circles.is_empty() {
            return;
        }
        let program = &mut self.registry.orbit;
        program
            .uniforms()
            .set_vec4("color", style.color)
            .set_f32("aspect_ratio", aspect_ratio)
            .set_f32("stroke_width", style.stroke_width);
        program.upload(&self.context.queue);
        let bind_group = program.bind_group(&self.context.device, &[], None);
        let instances = self.instance_buffer("Orbit Instances", bytemuck::cast_slice(circles));

        let mut encoder = self.encoder("Orbit Encoder");
        {
            let mut pass = begin_pass(&mut encoder, "Orbit Pass", &target.texture().view, wgpu::LoadOp::Load);
            self.registry.orbit.bind(&mut pass, &bind_group);
            pass.set_vertex_buffer(0, self.geometry.quad_vertices.slice(..));
            pass.set_vertex_buffer(1, instances.slice(..));
            pass.set_index_buffer(self.geometry.quad_indices.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..circles.len() as u32);
        }
        self.submit(encoder);
    }

    fn draw_arrows(
        &mut self,
        target: &FrameBuffer<GpuTexture>,
        color: [f32; 4],
        arrows: &[ArrowInstance],
    ) {
        if arrows.is_empty() {
            return;
        }
        let program = &mut self.registry.arrow;
        program.uniforms().set_vec4("color", color);
        program.upload(&self.context.queue);
        let bind_group = program.bind_group(&self.context.device, &[], None);
        let instances = self.instance_buffer("Arrow Instances", bytemuck::cast_slice(arrows));

        let mut encoder = self.encoder("Arrow Encoder");
        {
            let mut pass = begin_pass(&mut encoder, "Arrow Pass", &target.texture().view, wgpu::LoadOp::Load);
            self.registry.arrow.bind(&mut pass, &bind_group);
            pass.set_vertex_buffer(0, self.geometry.arrow_vertices.slice(..));
            pass.set_vertex_buffer(1, instances.slice(..));
            pass.set_index_buffer(self.geometry.arrow_indices.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..ARROW_INDICES.len() as u32, 0, 0..arrows.len() as u32);
        }
        self.submit(encoder);
    }

    fn run_coefficient_pass(&mut self, pass: &CoefficientPass<'_, GpuTexture>) {
        let width = pass.output.width();
        let program = &mut self.registry.coefficient;
        program
            .uniforms()
            .set_vec2("texel_size", pass.output.texel_size())
            .set_u32("iteration_count", pass.iteration_count)
            .set_u32("is_negative", pass.negative as u32);
        program.upload(&self.context.queue);
        let bind_group = program.bind_group(
            &self.context.device,
            &[
                (pass.real.slot, &pass.real.target.texture().view),
                (pass.imag.slot, &pass.imag.target.texture().view),
            ],
            None,
        );
        let line = self.geometry.line(&self.context.device, width);

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Coefficient Encoder"),
            });
        {
            let mut render_pass = begin_pass(
                &mut encoder,
                "Coefficient Pass",
                &pass.output.texture().view,
                wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            );
            self.registry.coefficient.bind(&mut render_pass, &bind_group);
            render_pass.set_vertex_buffer(0, line.slice(..));
            render_pass.draw(0..width, 0..1);
        }
        self.context.queue.submit(std::iter::once(encoder.finish()));
    }

    fn read_row(&mut self, source: &FrameBuffer<GpuTexture>) -> Vec<f32> {
        let texture = source.texture();
        if texture.format.is_half() {
            log::error!("Read-back of half-float target {:?} unsupported", texture.format);
            return Vec::new();
        }
        let unpadded = texture.width * texture.format.bytes_per_texel();
        let padded = padded_row(unpadded);

        let buffer = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Row Readback Buffer"),
            size: padded as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.encoder("Row Readback Encoder");
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(1),
                },
            },
            wgpu::Extent3d {
                width: texture.width,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        self.submit(encoder);

        let Some(data) = map_buffer(&self.context.device, &buffer) else {
            return Vec::new();
        };
        data[..unpadded as usize]
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    fn composite(&mut self, layers: &[&FrameBuffer<GpuTexture>]) -> Result<(), SimulationError> {
        let output = match self.context.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost, reconfiguring");
                self.context
                    .surface
                    .configure(&self.context.device, &self.context.surface_config);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let program = &self.registry.display;
        let bind_groups: Vec<_> = layers
            .iter()
            .map(|layer| {
                program.bind_group(
                    &self.context.device,
                    &[(self.registry.slots.source, &layer.texture().view)],
                    Some(&self.layer_sampler),
                )
            })
            .collect();

        let mut encoder = self.encoder("Composite Encoder");
        {
            let mut pass = begin_pass(
                &mut encoder,
                "Composite Pass",
                &view,
                wgpu::LoadOp::Clear(self.background),
            );
            pass.set_vertex_buffer(0, self.geometry.quad_vertices.slice(..));
            pass.set_index_buffer(self.geometry.quad_indices.slice(..), wgpu::IndexFormat::Uint16);
            for bind_group in &bind_groups {
                program.bind(&mut pass, bind_group);
                pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
            }
        }
        self.submit(encoder);

        if let Some(path) = self.pending_capture.take() {
            if let Err(e) = self.capture_frame(&path, &output) {
                log::error!("Frame capture failed: {}", e);
            }
        }

        output.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_row_alignment() {
        assert_eq!(padded_row(8), 256);
        assert_eq!(padded_row(256), 256);
        assert_eq!(padded_row(257), 512);
        assert_eq!(padded_row(1600 * 8) % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT, 0);
    }

    #[test]
    fn test_load_op() {
        assert!(matches!(load_op(true), wgpu::LoadOp::Clear(_)));
        assert!(matches!(load_op(false), wgpu::LoadOp::Load));
    }
}
