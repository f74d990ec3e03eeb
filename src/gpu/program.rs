//! Shader programs: compile, link-check and reflect WGSL once at startup.
//!
//! Each program is a vertex source plus a fragment source. The pair is
//! parsed and validated with naga; a parse, validation or interface
//! mismatch is fatal and carries naga's diagnostic text. Uniform block
//! members, bound resources and vertex attributes are collected into
//! name-keyed tables so per-frame updates never query the shader again.

use std::collections::HashMap;

use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, Binding, Handle, Module, ShaderStage, Type, TypeInner};
use wgpu::util::DeviceExt;

use crate::error::ShaderError;
use crate::gpu::capability::{Filtering, RenderFormats};
use crate::gpu::geometry;

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Bindings the coefficient program samples the path channels from
pub const PATH_REAL_BINDING: u32 = 1;
pub const PATH_IMAG_BINDING: u32 = 2;

/// WGSL sources embedded at build time
pub mod sources {
    pub const QUAD_VERT: &str = include_str!("../shaders/quad.vert.wgsl");
    pub const COPY_FRAG: &str = include_str!("../shaders/copy.frag.wgsl");
    pub const DISPLAY_FRAG: &str = include_str!("../shaders/display.frag.wgsl");
    pub const LINE_VERT: &str = include_str!("../shaders/line.vert.wgsl");
    pub const COEFFICIENT_FRAG: &str = include_str!("../shaders/coefficient.frag.wgsl");
    pub const TRACE_POINT_VERT: &str = include_str!("../shaders/trace_point.vert.wgsl");
    pub const TRACE_POINT_FRAG: &str = include_str!("../shaders/trace_point.frag.wgsl");
    pub const ARROW_VERT: &str = include_str!("../shaders/arrow.vert.wgsl");
    pub const ARROW_FRAG: &str = include_str!("../shaders/arrow.frag.wgsl");
    pub const ORBIT_VERT: &str = include_str!("../shaders/orbit.vert.wgsl");
    pub const ORBIT_FRAG: &str = include_str!("../shaders/orbit.frag.wgsl");
}

/// Byte range of one uniform block member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Uniform { size: u32 },
    Texture,
    Sampler,
}

/// A bound global (`@group(g) @binding(b)`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSlot {
    pub binding: u32,
    pub kind: ResourceKind,
}

/// Name-keyed interface of a linked program
#[derive(Debug, Clone)]
pub struct ProgramReflection {
    label: String,
    source: String,
    uniforms: HashMap<String, UniformSlot>,
    uniform_block_size: u32,
    resources: HashMap<String, ResourceSlot>,
    attributes: HashMap<String, u32>,
}

impl ProgramReflection {
    /// Parse, validate and link-check a vertex/fragment pair.
    pub fn from_sources(label: &str, vertex: &str, fragment: &str) -> Result<Self, ShaderError> {
        let source = format!("{vertex}\n{fragment}");

        let module = naga::front::wgsl::parse_str(&source).map_err(|e| ShaderError::Parse {
            label: label.to_string(),
            diagnostic: e.emit_to_string(&source),
        })?;

        Validator::new(ValidationFlags::all(), Capabilities::all())
            .validate(&module)
            .map_err(|e| ShaderError::Validation {
                label: label.to_string(),
                diagnostic: e.emit_to_string(&source),
            })?;

        let link_error = |diagnostic: String| ShaderError::Link {
            label: label.to_string(),
            diagnostic,
        };

        let vertex_entry = find_entry(&module, ShaderStage::Vertex, VERTEX_ENTRY)
            .ok_or_else(|| link_error(format!("missing vertex entry point '{VERTEX_ENTRY}'")))?;
        let fragment_entry = find_entry(&module, ShaderStage::Fragment, FRAGMENT_ENTRY)
            .ok_or_else(|| {
                link_error(format!("missing fragment entry point '{FRAGMENT_ENTRY}'"))
            })?;

        // Every fragment input must be written by the vertex stage with the same type
        let mut outputs = Vec::new();
        if let Some(result) = &vertex_entry.function.result {
            collect_locations(&module, result.ty, result.binding.as_ref(), None, &mut outputs);
        }
        let mut inputs = Vec::new();
        for arg in &fragment_entry.function.arguments {
            collect_locations(&module, arg.ty, arg.binding.as_ref(), arg.name.as_deref(), &mut inputs);
        }
        for (name, location, ty) in &inputs {
            match outputs.iter().find(|(_, l, _)| l == location) {
                Some((_, _, out_ty)) if out_ty == ty => {}
                Some(_) => {
                    return Err(link_error(format!(
                        "fragment input '{name}' @location({location}) type differs from vertex output"
                    )))
                }
                None => {
                    return Err(link_error(format!(
                        "fragment input '{name}' @location({location}) is not written by the vertex stage"
                    )))
                }
            }
        }

        let mut vertex_inputs = Vec::new();
        for arg in &vertex_entry.function.arguments {
            collect_locations(&module, arg.ty, arg.binding.as_ref(), arg.name.as_deref(), &mut vertex_inputs);
        }
        let attributes = vertex_inputs
            .into_iter()
            .map(|(name, location, _)| (name, location))
            .collect();

        let ctx = module.to_ctx();
        let mut uniforms = HashMap::new();
        let mut uniform_block_size = 0;
        let mut resources = HashMap::new();
        for (_, var) in module.global_variables.iter() {
            let (Some(name), Some(binding)) = (&var.name, &var.binding) else {
                continue;
            };
            if binding.group != 0 {
                return Err(link_error(format!(
                    "'{name}' uses bind group {}, only group 0 is supported",
                    binding.group
                )));
            }
            let inner = &module.types[var.ty].inner;
            let kind = match inner {
                TypeInner::Image { .. } => ResourceKind::Texture,
                TypeInner::Sampler { .. } => ResourceKind::Sampler,
                _ if var.space == AddressSpace::Uniform => {
                    let size = inner.size(ctx);
                    if let TypeInner::Struct { members, .. } = inner {
                        for member in members {
                            if let Some(member_name) = &member.name {
                                uniforms.insert(
                                    member_name.clone(),
                                    UniformSlot {
                                        offset: member.offset,
                                        size: module.types[member.ty].inner.size(ctx),
                                    },
                                );
                            }
                        }
                    }
                    uniform_block_size = size;
                    ResourceKind::Uniform { size }
                }
                _ => continue,
            };
            resources.insert(
                name.clone(),
                ResourceSlot {
                    binding: binding.binding,
                    kind,
                },
            );
        }

        Ok(Self {
            label: label.to_string(),
            source,
            uniforms,
            uniform_block_size,
            resources,
            attributes,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Combined WGSL source handed to the device
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn uniform(&self, name: &str) -> Option<UniformSlot> {
        self.uniforms.get(name).copied()
    }

    pub fn uniform_block_size(&self) -> u32 {
        self.uniform_block_size
    }

    pub fn resource(&self, name: &str) -> Option<ResourceSlot> {
        self.resources.get(name).copied()
    }

    pub fn attribute(&self, name: &str) -> Option<u32> {
        self.attributes.get(name).copied()
    }

    /// Fail unless every named uniform member exists
    pub fn require_uniforms(&self, names: &[&str]) -> Result<(), ShaderError> {
        for name in names {
            if !self.uniforms.contains_key(*name) {
                return Err(ShaderError::MissingUniform {
                    label: self.label.clone(),
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Binding index of a texture resource
    pub fn texture_slot(&self, name: &str) -> Result<u32, ShaderError> {
        match self.resource(name) {
            Some(ResourceSlot {
                binding,
                kind: ResourceKind::Texture,
            }) => Ok(binding),
            _ => Err(ShaderError::MissingUniform {
                label: self.label.clone(),
                name: name.to_string(),
            }),
        }
    }

    /// Resources ordered by binding index
    fn sorted_resources(&self) -> Vec<ResourceSlot> {
        let mut slots: Vec<_> = self.resources.values().copied().collect();
        slots.sort_by_key(|slot| slot.binding);
        slots
    }
}

fn find_entry<'m>(
    module: &'m Module,
    stage: ShaderStage,
    name: &str,
) -> Option<&'m naga::EntryPoint> {
    module
        .entry_points
        .iter()
        .find(|entry| entry.stage == stage && entry.name == name)
}

/// Flatten `@location` bindings of an argument or result, descending into structs
fn collect_locations(
    module: &Module,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    name: Option<&str>,
    out: &mut Vec<(String, u32, Handle<Type>)>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => {
            out.push((name.unwrap_or_default().to_string(), *location, ty));
        }
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(
                        module,
                        member.ty,
                        member.binding.as_ref(),
                        member.name.as_deref(),
                        out,
                    );
                }
            }
        }
    }
}

/// CPU staging copy of a program's uniform block, written by member name
#[derive(Debug, Clone)]
pub struct UniformBlock {
    bytes: Vec<u8>,
    slots: HashMap<String, UniformSlot>,
}

impl UniformBlock {
    pub fn new(reflection: &ProgramReflection) -> Self {
        Self {
            bytes: vec![0; reflection.uniform_block_size as usize],
            slots: reflection.uniforms.clone(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn write(&mut self, name: &str, offset: u32, data: &[u8]) {
        match self.slots.get(name) {
            Some(slot) => {
                let start = (slot.offset + offset) as usize;
                self.bytes[start..start + data.len()].copy_from_slice(data);
            }
            None => debug_assert!(false, "unknown uniform '{name}'"),
        }
    }

    pub fn set_f32(&mut self, name: &str, value: f32) -> &mut Self {
        self.write(name, 0, bytemuck::bytes_of(&value));
        self
    }

    pub fn set_u32(&mut self, name: &str, value: u32) -> &mut Self {
        self.write(name, 0, bytemuck::bytes_of(&value));
        self
    }

    pub fn set_vec2(&mut self, name: &str, value: [f32; 2]) -> &mut Self {
        self.write(name, 0, bytemuck::bytes_of(&value));
        self
    }

    pub fn set_vec4(&mut self, name: &str, value: [f32; 4]) -> &mut Self {
        self.write(name, 0, bytemuck::bytes_of(&value));
        self
    }

    /// `mat3x3<f32>` columns are padded to 16 bytes
    pub fn set_mat3(&mut self, name: &str, value: glam::Mat3) -> &mut Self {
        for (i, column) in value.to_cols_array_2d().iter().enumerate() {
            self.write(name, 16 * i as u32, bytemuck::bytes_of(column));
        }
        self
    }
}

/// Vertex buffer layout with attributes named as in the vertex shader
pub struct VertexBufferSpec {
    pub stride: wgpu::BufferAddress,
    pub step_mode: wgpu::VertexStepMode,
    pub attributes: &'static [(&'static str, wgpu::VertexFormat, wgpu::BufferAddress)],
}

/// Fixed-function state of a program's pipeline
pub struct PipelineSpec<'a> {
    pub target: wgpu::TextureFormat,
    pub blend: Option<wgpu::BlendState>,
    pub topology: wgpu::PrimitiveTopology,
    pub buffers: &'a [&'a VertexBufferSpec],
    pub filterable: bool,
}

/// A linked program with its pipeline, layout and uniform buffer
pub struct ShaderProgram {
    reflection: ProgramReflection,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: Option<wgpu::Buffer>,
    uniforms: UniformBlock,
}

impl ShaderProgram {
    /// Reflect, then create module, bind group layout and pipeline.
    ///
    /// # Arguments
    /// * `device` - wgpu device
    /// * `label` - Program name used in diagnostics
    /// * `vertex`, `fragment` - WGSL sources
    /// * `spec` - Target format, blending, topology and vertex buffers
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        vertex: &str,
        fragment: &str,
        spec: &PipelineSpec<'_>,
    ) -> Result<Self, ShaderError> {
        let reflection = ProgramReflection::from_sources(label, vertex, fragment)?;

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(reflection.source().into()),
        });

        let layout_entries: Vec<_> = reflection
            .sorted_resources()
            .into_iter()
            .map(|slot| wgpu::BindGroupLayoutEntry {
                binding: slot.binding,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: match slot.kind {
                    ResourceKind::Uniform { size } => wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(size as u64),
                    },
                    ResourceKind::Texture => wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float {
                            filterable: spec.filterable,
                        },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    ResourceKind::Sampler => wgpu::BindingType::Sampler(if spec.filterable {
                        wgpu::SamplerBindingType::Filtering
                    } else {
                        wgpu::SamplerBindingType::NonFiltering
                    }),
                },
                count: None,
            })
            .collect();

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &layout_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        // Shader locations come from reflection, not from the layout tables
        let mut attribute_sets = Vec::with_capacity(spec.buffers.len());
        for buffer in spec.buffers {
            let mut attributes = Vec::with_capacity(buffer.attributes.len());
            for &(name, format, offset) in buffer.attributes {
                let shader_location =
                    reflection
                        .attribute(name)
                        .ok_or_else(|| ShaderError::MissingAttribute {
                            label: label.to_string(),
                            name: name.to_string(),
                        })?;
                attributes.push(wgpu::VertexAttribute {
                    format,
                    offset,
                    shader_location,
                });
            }
            attribute_sets.push(attributes);
        }
        let buffers: Vec<_> = spec
            .buffers
            .iter()
            .zip(&attribute_sets)
            .map(|(buffer, attributes)| wgpu::VertexBufferLayout {
                array_stride: buffer.stride,
                step_mode: buffer.step_mode,
                attributes,
            })
            .collect();

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some(VERTEX_ENTRY),
                buffers: &buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some(FRAGMENT_ENTRY),
                targets: &[Some(wgpu::ColorTargetState {
                    format: spec.target,
                    blend: spec.blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: spec.topology,
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

        let uniforms = UniformBlock::new(&reflection);
        let uniform_buffer = (reflection.uniform_block_size > 0).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: uniforms.bytes(),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
        });

        Ok(Self {
            reflection,
            pipeline,
            bind_group_layout,
            uniform_buffer,
            uniforms,
        })
    }

    pub fn reflection(&self) -> &ProgramReflection {
        &self.reflection
    }

    /// Staged uniforms; call [`ShaderProgram::upload`] before the next submit
    pub fn uniforms(&mut self) -> &mut UniformBlock {
        &mut self.uniforms
    }

    pub fn upload(&self, queue: &wgpu::Queue) {
        if let Some(buffer) = &self.uniform_buffer {
            queue.write_buffer(buffer, 0, self.uniforms.bytes());
        }
    }

    /// Bind group with the uniform buffer, `textures` at their slots and `sampler`
    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        textures: &[(u32, &wgpu::TextureView)],
        sampler: Option<&wgpu::Sampler>,
    ) -> wgpu::BindGroup {
        let mut entries = Vec::new();
        for slot in self.reflection.sorted_resources() {
            let resource = match slot.kind {
                ResourceKind::Uniform { .. } => self
                    .uniform_buffer
                    .as_ref()
                    .map(|buffer| buffer.as_entire_binding()),
                ResourceKind::Texture => textures
                    .iter()
                    .find(|(binding, _)| *binding == slot.binding)
                    .map(|&(_, view)| wgpu::BindingResource::TextureView(view)),
                ResourceKind::Sampler => sampler.map(wgpu::BindingResource::Sampler),
            };
            match resource {
                Some(resource) => entries.push(wgpu::BindGroupEntry {
                    binding: slot.binding,
                    resource,
                }),
                None => log::error!(
                    "{}: nothing bound at binding {}",
                    self.reflection.label,
                    slot.binding
                ),
            }
        }
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.reflection.label()),
            layout: &self.bind_group_layout,
            entries: &entries,
        })
    }

    /// Make this program current in `pass`; repeated calls are harmless
    pub fn bind(&self, pass: &mut wgpu::RenderPass<'_>, bind_group: &wgpu::BindGroup) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
    }
}

/// Binding slots resolved by name once at startup
#[derive(Debug, Clone, Copy)]
pub struct TextureSlots {
    pub source: u32,
    pub path_real: u32,
    pub path_imag: u32,
}

/// Every program the simulation draws with
pub struct ShaderProgramRegistry {
    pub copy: ShaderProgram,
    pub display: ShaderProgram,
    pub coefficient: ShaderProgram,
    pub trace: ShaderProgram,
    pub arrow: ShaderProgram,
    pub orbit: ShaderProgram,
    pub slots: TextureSlots,
}

impl ShaderProgramRegistry {
    pub fn new(
        device: &wgpu::Device,
        formats: &RenderFormats,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self, ShaderError> {
        let layer = formats.layer.to_wgpu();
        let layer_filterable = formats.layer_filtering == Filtering::Linear;
        let blend = Some(wgpu::BlendState::ALPHA_BLENDING);
        let triangles = wgpu::PrimitiveTopology::TriangleList;

        let copy = ShaderProgram::new(
            device,
            "copy",
            sources::QUAD_VERT,
            sources::COPY_FRAG,
            &PipelineSpec {
                target: layer,
                blend: None,
                topology: triangles,
                buffers: &[&geometry::QUAD_LAYOUT],
                filterable: layer_filterable,
            },
        )?;

        let display = ShaderProgram::new(
            device,
            "display",
            sources::QUAD_VERT,
            sources::DISPLAY_FRAG,
            &PipelineSpec {
                target: surface_format,
                blend,
                topology: triangles,
                buffers: &[&geometry::QUAD_LAYOUT],
                filterable: layer_filterable,
            },
        )?;

        let coefficient = ShaderProgram::new(
            device,
            "coefficient",
            sources::LINE_VERT,
            sources::COEFFICIENT_FRAG,
            &PipelineSpec {
                target: formats.coefficient.to_wgpu(),
                blend: None,
                topology: wgpu::PrimitiveTopology::PointList,
                buffers: &[&geometry::LINE_LAYOUT],
                filterable: false,
            },
        )?;
        coefficient
            .reflection()
            .require_uniforms(&["texel_size", "iteration_count", "is_negative"])?;

        let trace = ShaderProgram::new(
            device,
            "trace point",
            sources::TRACE_POINT_VERT,
            sources::TRACE_POINT_FRAG,
            &PipelineSpec {
                target: layer,
                blend,
                topology: triangles,
                buffers: &[&geometry::QUAD_LAYOUT, &geometry::POINT_INSTANCE_LAYOUT],
                filterable: layer_filterable,
            },
        )?;
        trace
            .reflection()
            .require_uniforms(&["color", "texel_size", "aspect_ratio", "radius"])?;

        let arrow = ShaderProgram::new(
            device,
            "rotating arrow",
            sources::ARROW_VERT,
            sources::ARROW_FRAG,
            &PipelineSpec {
                target: layer,
                blend,
                topology: triangles,
                buffers: &[&geometry::ARROW_LAYOUT, &geometry::ARROW_INSTANCE_LAYOUT],
                filterable: layer_filterable,
            },
        )?;
        arrow.reflection().require_uniforms(&["color"])?;

        let orbit = ShaderProgram::new(
            device,
            "orbit circle",
            sources::ORBIT_VERT,
            sources::ORBIT_FRAG,
            &PipelineSpec {
                target: layer,
                blend,
                topology: triangles,
                buffers: &[&geometry::QUAD_LAYOUT, &geometry::ORBIT_INSTANCE_LAYOUT],
                filterable: layer_filterable,
            },
        )?;
        orbit
            .reflection()
            .require_uniforms(&["color", "aspect_ratio", "stroke_width"])?;

        let slots = TextureSlots {
            source: copy.reflection().texture_slot("source_texture")?,
            path_real: coefficient.reflection().texture_slot("path_real")?,
            path_imag: coefficient.reflection().texture_slot("path_imag")?,
        };
        if slots.path_real != PATH_REAL_BINDING || slots.path_imag != PATH_IMAG_BINDING {
            return Err(ShaderError::Link {
                label: "coefficient".to_string(),
                diagnostic: format!(
                    "path textures bound at {}/{}, expected {}/{}",
                    slots.path_real, slots.path_imag, PATH_REAL_BINDING, PATH_IMAG_BINDING
                ),
            });
        }

        log::debug!("Shader programs linked");

        Ok(Self {
            copy,
            display,
            coefficient,
            trace,
            arrow,
            orbit,
            slots,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROGRAMS: [(&str, &str, &str); 6] = [
        ("copy", sources::QUAD_VERT, sources::COPY_FRAG),
        ("display", sources::QUAD_VERT, sources::DISPLAY_FRAG),
        ("coefficient", sources::LINE_VERT, sources::COEFFICIENT_FRAG),
        ("trace point", sources::TRACE_POINT_VERT, sources::TRACE_POINT_FRAG),
        ("rotating arrow", sources::ARROW_VERT, sources::ARROW_FRAG),
        ("orbit circle", sources::ORBIT_VERT, sources::ORBIT_FRAG),
    ];

    #[test]
    fn test_all_programs_link() {
        for (label, vertex, fragment) in PROGRAMS {
            if let Err(e) = ProgramReflection::from_sources(label, vertex, fragment) {
                panic!("{label} failed to link: {e}");
            }
        }
    }

    #[test]
    fn test_coefficient_reflection() {
        let reflection =
            ProgramReflection::from_sources("coefficient", sources::LINE_VERT, sources::COEFFICIENT_FRAG)
                .unwrap();
        assert_eq!(reflection.uniform("texel_size"), Some(UniformSlot { offset: 0, size: 8 }));
        assert_eq!(
            reflection.uniform("iteration_count"),
            Some(UniformSlot { offset: 8, size: 4 })
        );
        assert_eq!(
            reflection.uniform("is_negative"),
            Some(UniformSlot { offset: 12, size: 4 })
        );
        assert_eq!(reflection.uniform_block_size(), 16);
        assert_eq!(reflection.texture_slot("path_real").unwrap(), PATH_REAL_BINDING);
        assert_eq!(reflection.texture_slot("path_imag").unwrap(), PATH_IMAG_BINDING);
        assert_eq!(reflection.attribute("position"), Some(0));
    }

    #[test]
    fn test_instance_attributes_reflected() {
        let reflection =
            ProgramReflection::from_sources("arrow", sources::ARROW_VERT, sources::ARROW_FRAG).unwrap();
        for (name, location) in [("position", 0), ("shaft", 1), ("col0", 2), ("shaft_scale", 5)] {
            assert_eq!(reflection.attribute(name), Some(location), "attribute {name}");
        }
        for layout in [&geometry::ARROW_LAYOUT, &geometry::ARROW_INSTANCE_LAYOUT] {
            for (name, _, _) in layout.attributes {
                assert!(reflection.attribute(name).is_some(), "layout names unknown attribute {name}");
            }
        }
    }

    #[test]
    fn test_parse_error_carries_diagnostic() {
        let err = ProgramReflection::from_sources("broken", "fn vs_main( {", "").unwrap_err();
        match err {
            ShaderError::Parse { label, diagnostic } => {
                assert_eq!(label, "broken");
                assert!(!diagnostic.is_empty(), "diagnostic text must be surfaced");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_link_error_on_unwritten_varying() {
        let vertex = r#"
            @vertex
            fn vs_main(@location(0) position: vec2<f32>) -> @builtin(position) vec4<f32> {
                return vec4<f32>(position, 0.0, 1.0);
            }
        "#;
        let fragment = r#"
            @fragment
            fn fs_main(@location(3) uv: vec2<f32>) -> @location(0) vec4<f32> {
                return vec4<f32>(uv, 0.0, 1.0);
            }
        "#;
        let err = ProgramReflection::from_sources("mismatch", vertex, fragment).unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }), "got {err:?}");
    }

    #[test]
    fn test_require_uniforms() {
        let reflection =
            ProgramReflection::from_sources("orbit", sources::ORBIT_VERT, sources::ORBIT_FRAG).unwrap();
        assert!(reflection.require_uniforms(&["color", "stroke_width"]).is_ok());
        assert!(matches!(
            reflection.require_uniforms(&["u_transformMatrix"]),
            Err(ShaderError::MissingUniform { .. })
        ));
    }

    #[test]
    fn test_uniform_block_writes_by_name() {
        let reflection = ProgramReflection::from_sources(
            "trace",
            sources::TRACE_POINT_VERT,
            sources::TRACE_POINT_FRAG,
        )
        .unwrap();
        let mut block = UniformBlock::new(&reflection);
        block
            .set_vec4("color", [1.0, 0.5, 0.25, 0.8])
            .set_f32("radius", 5.0);
        let floats: Vec<f32> = block
            .bytes()
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(&floats[0..4], &[1.0, 0.5, 0.25, 0.8]);
        let radius = reflection.uniform("radius").unwrap();
        assert_eq!(floats[radius.offset as usize / 4], 5.0);
    }
}
