//! GPU context acquisition and float render-target format negotiation.
//!
//! Each target class requests its narrowest useful format and walks up
//! R → RG → RGBA until a 4×4 render-to-texture probe succeeds. Half and full
//! precision use separate chains.

use std::sync::Arc;

use winit::window::Window;

/// Float render-target formats in fallback order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatFormat {
    R16,
    Rg16,
    Rgba16,
    R32,
    Rg32,
    Rgba32,
}

impl FloatFormat {
    pub fn channels(self) -> usize {
        match self {
            FloatFormat::R16 | FloatFormat::R32 => 1,
            FloatFormat::Rg16 | FloatFormat::Rg32 => 2,
            FloatFormat::Rgba16 | FloatFormat::Rgba32 => 4,
        }
    }

    pub fn is_half(self) -> bool {
        matches!(self, FloatFormat::R16 | FloatFormat::Rg16 | FloatFormat::Rgba16)
    }

    pub fn bytes_per_texel(self) -> u32 {
        let channel_bytes = if self.is_half() { 2 } else { 4 };
        self.channels() as u32 * channel_bytes
    }

    /// Next format up the same precision chain
    pub fn wider(self) -> Option<FloatFormat> {
        match self {
            FloatFormat::R16 => Some(FloatFormat::Rg16),
            FloatFormat::Rg16 => Some(FloatFormat::Rgba16),
            FloatFormat::R32 => Some(FloatFormat::Rg32),
            FloatFormat::Rg32 => Some(FloatFormat::Rgba32),
            FloatFormat::Rgba16 | FloatFormat::Rgba32 => None,
        }
    }

    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            FloatFormat::R16 => wgpu::TextureFormat::R16Float,
            FloatFormat::Rg16 => wgpu::TextureFormat::Rg16Float,
            FloatFormat::Rgba16 => wgpu::TextureFormat::Rgba16Float,
            FloatFormat::R32 => wgpu::TextureFormat::R32Float,
            FloatFormat::Rg32 => wgpu::TextureFormat::Rg32Float,
            FloatFormat::Rgba32 => wgpu::TextureFormat::Rgba32Float,
        }
    }
}

/// Walk up the chain from `requested` until `supports` accepts a format.
/// `None` when even the four-channel format is rejected.
pub fn negotiate_format(
    requested: FloatFormat,
    mut supports: impl FnMut(FloatFormat) -> bool,
) -> Option<FloatFormat> {
    let mut candidate = Some(requested);
    while let Some(format) = candidate {
        if supports(format) {
            return Some(format);
        }
        log::debug!("{:?} rejected as render target, trying wider format", format);
        candidate = format.wider();
    }
    None
}

/// Texture sampling filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filtering {
    Nearest,
    Linear,
}

/// Formats negotiated for each class of render target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderFormats {
    /// Display-resolution trace layers (blended, half precision)
    pub layer: FloatFormat,

    /// Coefficient reduction output (full precision, two channels wanted)
    pub coefficient: FloatFormat,

    /// Path sample textures (full precision, one channel wanted)
    pub path: FloatFormat,

    /// Filter for sampling trace layers
    pub layer_filtering: Filtering,
}

impl RenderFormats {
    /// Negotiate all target classes against one support predicate.
    /// Blending is required for layers only.
    pub fn negotiate(
        mut supports: impl FnMut(FloatFormat, bool) -> bool,
        mut filterable: impl FnMut(FloatFormat) -> bool,
    ) -> Option<Self> {
        let layer = negotiate_format(FloatFormat::Rgba16, |f| supports(f, true))?;
        let coefficient = negotiate_format(FloatFormat::Rg32, |f| supports(f, false))?;
        let path = negotiate_format(FloatFormat::R32, |f| supports(f, false))?;
        let layer_filtering = if filterable(layer) {
            Filtering::Linear
        } else {
            Filtering::Nearest
        };
        Some(Self {
            layer,
            coefficient,
            path,
            layer_filtering,
        })
    }
}

/// Adapter-reported support for a render target of this format
pub fn adapter_supports(features: &wgpu::TextureFormatFeatures, needs_blending: bool) -> bool {
    let usages = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
    features.allowed_usages.contains(usages)
        && (!needs_blending
            || features
                .flags
                .contains(wgpu::TextureFormatFeatureFlags::BLENDABLE))
}

/// Everything the renderer needs from the GPU
pub struct GpuContext {
    pub surface: wgpu::Surface<'static>,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface_config: wgpu::SurfaceConfiguration,
    pub formats: RenderFormats,
}

/// Negotiates a GPU context able to render into float textures
pub struct GraphicsCapabilityProbe;

impl GraphicsCapabilityProbe {
    /// Acquire device and surface, then negotiate render-target formats.
    ///
    /// # Arguments
    /// * `window` - Window providing the surface
    /// * `capture` - Surface must also be readable for frame capture
    ///
    /// # Returns
    /// `None` when no adapter, device or float render format is available;
    /// the reason is logged.
    pub async fn probe(window: Arc<Window>, capture: bool) -> Option<GpuContext> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = match instance.create_surface(window) {
            Ok(surface) => surface,
            Err(e) => {
                log::error!("Failed to create surface: {}", e);
                return None;
            }
        };

        let Some(adapter) = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
        else {
            log::error!("Failed to find suitable GPU adapter");
            return None;
        };
        log::info!("Adapter: {}", adapter.get_info().name);

        // Linear filtering of 32-bit float textures is optional
        let required_features = adapter.features() & wgpu::Features::FLOAT32_FILTERABLE;

        let (device, queue) = match adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Epicycles Device"),
                    required_features,
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
        {
            Ok(pair) => pair,
            Err(e) => {
                log::error!("Failed to request device: {}", e);
                return None;
            }
        };

        let formats = RenderFormats::negotiate(
            |format, needs_blending| {
                adapter_supports(
                    &adapter.get_texture_format_features(format.to_wgpu()),
                    needs_blending,
                ) && probe_render_target(&device, &queue, format)
            },
            |format| {
                adapter
                    .get_texture_format_features(format.to_wgpu())
                    .flags
                    .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE)
            },
        );
        let Some(formats) = formats else {
            log::error!("No renderable float texture format available");
            return None;
        };
        log::info!(
            "Render formats: layers {:?} ({:?} filtering), coefficients {:?}, paths {:?}",
            formats.layer,
            formats.layer_filtering,
            formats.coefficient,
            formats.path
        );

        let surface_caps = surface.get_capabilities(&adapter);
        let Some(&first_format) = surface_caps.formats.first() else {
            log::error!("Surface reports no formats for this adapter");
            return None;
        };
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .copied()
            .unwrap_or(first_format);

        let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
        if capture {
            usage |= wgpu::TextureUsages::COPY_SRC;
        }

        let surface_config = wgpu::SurfaceConfiguration {
            usage,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        Some(GpuContext {
            surface,
            adapter,
            device,
            queue,
            surface_config,
            formats,
        })
    }
}

/// Allocate a 4×4 target of `format`, clear it, and report whether the
/// device accepted it without validation errors.
fn probe_render_target(device: &wgpu::Device, queue: &wgpu::Queue, format: FloatFormat) -> bool {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Format Probe"),
        size: wgpu::Extent3d {
            width: 4,
            height: 4,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: format.to_wgpu(),
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Format Probe Encoder"),
    });
    {
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Format Probe Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }
    queue.submit(std::iter::once(encoder.finish()));

    match pollster::block_on(device.pop_error_scope()) {
        None => true,
        Some(err) => {
            log::warn!("Render target {:?} incomplete: {}", format, err);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiate_prefers_requested_format() {
        let chosen = negotiate_format(FloatFormat::R32, |_| true);
        assert_eq!(chosen, Some(FloatFormat::R32));
    }

    #[test]
    fn test_negotiate_walks_up_chain() {
        let mut tried = Vec::new();
        let chosen = negotiate_format(FloatFormat::R32, |f| {
            tried.push(f);
            f == FloatFormat::Rgba32
        });
        assert_eq!(chosen, Some(FloatFormat::Rgba32));
        assert_eq!(
            tried,
            vec![FloatFormat::R32, FloatFormat::Rg32, FloatFormat::Rgba32]
        );
    }

    #[test]
    fn test_negotiate_never_crosses_precision() {
        let chosen = negotiate_format(FloatFormat::R16, |f| !f.is_half());
        assert_eq!(chosen, None, "half chain must not fall back to full floats");
    }

    #[test]
    fn test_render_formats_independent_chains() {
        // Half floats renderable; full floats only as RGBA
        let formats = RenderFormats::negotiate(
            |f, _| f.is_half() || f == FloatFormat::Rgba32,
            |_| false,
        )
        .expect("formats");
        assert_eq!(formats.layer, FloatFormat::Rgba16);
        assert_eq!(formats.coefficient, FloatFormat::Rgba32);
        assert_eq!(formats.path, FloatFormat::Rgba32);
        assert_eq!(formats.layer_filtering, Filtering::Nearest);
    }

    #[test]
    fn test_render_formats_unsupported() {
        assert!(RenderFormats::negotiate(|_, blend| !blend, |_| true).is_none());
    }

    #[test]
    fn test_adapter_supports_checks_blending() {
        let features = wgpu::TextureFormatFeatures {
            allowed_usages: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING,
            flags: wgpu::TextureFormatFeatureFlags::empty(),
        };
        assert!(adapter_supports(&features, false));
        assert!(!adapter_supports(&features, true));
    }

    #[test]
    fn test_format_sizes() {
        assert_eq!(FloatFormat::Rg32.bytes_per_texel(), 8);
        assert_eq!(FloatFormat::Rgba16.bytes_per_texel(), 8);
        assert_eq!(FloatFormat::R32.channels(), 1);
    }
}
