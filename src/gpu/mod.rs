//! GPU side of the simulation: capability probing, render targets, shader
//! programs and the backend seam.

pub mod backend;
pub mod capability;
pub mod framebuffer;
pub mod geometry;
#[cfg(test)]
pub mod mock;
pub mod program;
pub mod wgpu_backend;

pub use backend::{ArrowInstance, CoefficientPass, GraphicsBackend, OrbitCircle, OrbitStyle};
pub use capability::{GpuContext, GraphicsCapabilityProbe, RenderFormats};
pub use framebuffer::{DoubleFrameBuffer, FrameBuffer, TextureSpec};
pub use wgpu_backend::WgpuBackend;
