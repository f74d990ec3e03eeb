//! Static vertex data: full-screen quad, arrow, and coefficient line.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::gpu::backend::{ArrowInstance, OrbitCircle};
use crate::gpu::program::VertexBufferSpec;

/// Two triangles covering clip space
pub const QUAD_VERTICES: [[f32; 2]; 4] = [[-1.0, -1.0], [-1.0, 1.0], [1.0, 1.0], [1.0, -1.0]];
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// Arrow proportions in arrow space (unit length along +x)
pub mod arrow_constants {
    /// Shaft thickness before division by the arrow length
    pub const SHAFT_THICKNESS: f32 = 0.004;
    /// Head height (arrow-space units)
    pub const HEAD_HEIGHT: f32 = 0.18;
    /// Shaft to head length ratio 4:1
    pub const SHAFT_LENGTH: f32 = 4.0 / 5.0;
    /// Tip of the head
    pub const HEAD_TIP: f32 = SHAFT_LENGTH + 1.0 / 5.0;
}

/// Arrow vertex; `shaft` is 1 for vertices whose y is thinned by the arrow length
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ArrowVertex {
    pub position: [f32; 2],
    pub shaft: f32,
}

/// Shaft rectangle (0..3) then head triangle (4..6)
pub fn arrow_vertices() -> [ArrowVertex; 7] {
    use arrow_constants::*;
    let h = SHAFT_THICKNESS / 2.0;
    let head = HEAD_HEIGHT / 2.0;
    let shaft = |x: f32, y: f32| ArrowVertex {
        position: [x, y],
        shaft: 1.0,
    };
    let tip = |x: f32, y: f32| ArrowVertex {
        position: [x, y],
        shaft: 0.0,
    };
    [
        shaft(0.0, h),
        shaft(SHAFT_LENGTH, h),
        shaft(SHAFT_LENGTH, -h),
        shaft(0.0, -h),
        tip(SHAFT_LENGTH, head),
        tip(HEAD_TIP, 0.0),
        tip(SHAFT_LENGTH, -head),
    ]
}

pub const ARROW_INDICES: [u16; 9] = [0, 1, 2, 0, 2, 3, 4, 5, 6];

/// One point per texel centre of a `width`-texel row, in clip-space x
pub fn line_vertices(width: u32) -> Vec<f32> {
    (0..width)
        .map(|i| (i as f32 + 0.5) / width as f32 * 2.0 - 1.0)
        .collect()
}

pub const QUAD_LAYOUT: VertexBufferSpec = VertexBufferSpec {
    stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[("position", wgpu::VertexFormat::Float32x2, 0)],
};

pub const LINE_LAYOUT: VertexBufferSpec = VertexBufferSpec {
    stride: std::mem::size_of::<f32>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[("position", wgpu::VertexFormat::Float32, 0)],
};

pub const POINT_INSTANCE_LAYOUT: VertexBufferSpec = VertexBufferSpec {
    stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Instance,
    attributes: &[("point", wgpu::VertexFormat::Float32x2, 0)],
};

pub const ARROW_LAYOUT: VertexBufferSpec = VertexBufferSpec {
    stride: std::mem::size_of::<ArrowVertex>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[
        ("position", wgpu::VertexFormat::Float32x2, 0),
        ("shaft", wgpu::VertexFormat::Float32, 8),
    ],
};

pub const ARROW_INSTANCE_LAYOUT: VertexBufferSpec = VertexBufferSpec {
    stride: std::mem::size_of::<ArrowInstance>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Instance,
    attributes: &[
        ("col0", wgpu::VertexFormat::Float32x3, 0),
        ("col1", wgpu::VertexFormat::Float32x3, 12),
        ("col2", wgpu::VertexFormat::Float32x3, 24),
        ("shaft_scale", wgpu::VertexFormat::Float32, 36),
    ],
};

pub const ORBIT_INSTANCE_LAYOUT: VertexBufferSpec = VertexBufferSpec {
    stride: std::mem::size_of::<OrbitCircle>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Instance,
    attributes: &[
        ("center", wgpu::VertexFormat::Float32x2, 0),
        ("radius", wgpu::VertexFormat::Float32, 8),
    ],
};

/// GPU buffers for the static primitives
pub struct GeometryCache {
    pub quad_vertices: wgpu::Buffer,
    pub quad_indices: wgpu::Buffer,
    pub arrow_vertices: wgpu::Buffer,
    pub arrow_indices: wgpu::Buffer,
    line: wgpu::Buffer,
    line_width: u32,
}

impl GeometryCache {
    pub fn new(device: &wgpu::Device) -> Self {
        let quad_vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Vertex Buffer"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let quad_indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Index Buffer"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        let arrow_vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Arrow Vertex Buffer"),
            contents: bytemuck::cast_slice(&arrow_vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let arrow_indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Arrow Index Buffer"),
            contents: bytemuck::cast_slice(&ARROW_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            quad_vertices,
            quad_indices,
            arrow_vertices,
            arrow_indices,
            line: create_line_buffer(device, 1),
            line_width: 1,
        }
    }

    /// Line buffer sized for a `width`-texel target, rebuilt only when the width changes
    pub fn line(&mut self, device: &wgpu::Device, width: u32) -> &wgpu::Buffer {
        if width != self.line_width {
            log::debug!("Rebuilding line geometry for width {}", width);
            self.line = create_line_buffer(device, width);
            self.line_width = width;
        }
        &self.line
    }
}

fn create_line_buffer(device: &wgpu::Device, width: u32) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Coefficient Line Buffer"),
        contents: bytemuck::cast_slice(&line_vertices(width)),
        usage: wgpu::BufferUsages::VERTEX,
    })
}
