//! Render-target lifecycle: create, resize with content preservation, swap.

use std::mem;

use crate::gpu::backend::GraphicsBackend;
use crate::gpu::capability::{Filtering, FloatFormat};

/// Allocation parameters of a render target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureSpec {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: FloatFormat,
    pub filtering: Filtering,
}

impl TextureSpec {
    pub fn new(label: &'static str, width: u32, height: u32, format: FloatFormat) -> Self {
        Self {
            label,
            width: width.max(1),
            height: height.max(1),
            format,
            filtering: Filtering::Nearest,
        }
    }

    pub fn with_filtering(mut self, filtering: Filtering) -> Self {
        self.filtering = filtering;
        self
    }

    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// A texture bound to a sampling slot for one pass
pub struct TextureBinding<'a, T> {
    pub slot: u32,
    pub target: &'a FrameBuffer<T>,
}

/// Texture usable both as draw destination and sampling source
#[derive(Debug)]
pub struct FrameBuffer<T> {
    texture: T,
    spec: TextureSpec,
    texel_size: [f32; 2],
}

impl<T> FrameBuffer<T> {
    /// Allocate a target, cleared to transparent unless `data` is given.
    ///
    /// # Arguments
    /// * `backend` - Backend that owns the texture memory
    /// * `spec` - Size, format and filtering
    /// * `data` - Initial texels, `width × height × channels` floats
    pub fn create<B>(backend: &mut B, spec: TextureSpec, data: Option<&[f32]>) -> Self
    where
        B: GraphicsBackend<Texture = T>,
    {
        let texture = backend.create_texture(&spec, data);
        let framebuffer = Self {
            texture,
            texel_size: texel_size(&spec),
            spec,
        };
        if data.is_none() {
            backend.clear(&framebuffer);
        }
        framebuffer
    }

    /// Resize, copying the old content forward into the new allocation.
    ///
    /// Returns `false` (and keeps the same texture) when the size is unchanged.
    pub fn resize<B>(&mut self, backend: &mut B, width: u32, height: u32) -> bool
    where
        B: GraphicsBackend<Texture = T>,
    {
        let spec = TextureSpec {
            width: width.max(1),
            height: height.max(1),
            ..self.spec
        };
        if spec.width == self.spec.width && spec.height == self.spec.height {
            return false;
        }
        let resized = Self::create(backend, spec, None);
        backend.copy(self, &resized);
        let old = mem::replace(self, resized);
        backend.release_texture(old.texture);
        true
    }

    /// Reallocate empty at a new size, discarding the old content
    fn reallocate<B>(&mut self, backend: &mut B, width: u32, height: u32)
    where
        B: GraphicsBackend<Texture = T>,
    {
        let spec = TextureSpec {
            width: width.max(1),
            height: height.max(1),
            ..self.spec
        };
        let old = mem::replace(self, Self::create(backend, spec, None));
        backend.release_texture(old.texture);
    }

    /// Bind for sampling in `slot` without giving up ownership
    pub fn attach(&self, slot: u32) -> TextureBinding<'_, T> {
        TextureBinding { slot, target: self }
    }

    pub fn texture(&self) -> &T {
        &self.texture
    }

    pub fn spec(&self) -> &TextureSpec {
        &self.spec
    }

    pub fn width(&self) -> u32 {
        self.spec.width
    }

    pub fn height(&self) -> u32 {
        self.spec.height
    }

    pub fn texel_size_x(&self) -> f32 {
        self.texel_size[0]
    }

    pub fn texel_size_y(&self) -> f32 {
        self.texel_size[1]
    }

    pub fn texel_size(&self) -> [f32; 2] {
        self.texel_size
    }

    pub fn format(&self) -> FloatFormat {
        self.spec.format
    }

    /// Hand the texture back for release
    pub fn into_texture(self) -> T {
        self.texture
    }
}

fn texel_size(spec: &TextureSpec) -> [f32; 2] {
    [1.0 / spec.width as f32, 1.0 / spec.height as f32]
}

/// Ping-pong pair: `read` holds the last completed frame, `write` is free to draw into
#[derive(Debug)]
pub struct DoubleFrameBuffer<T> {
    read: FrameBuffer<T>,
    write: FrameBuffer<T>,
}

impl<T> DoubleFrameBuffer<T> {
    pub fn create<B>(backend: &mut B, spec: TextureSpec) -> Self
    where
        B: GraphicsBackend<Texture = T>,
    {
        Self {
            read: FrameBuffer::create(backend, spec, None),
            write: FrameBuffer::create(backend, spec, None),
        }
    }

    pub fn read(&self) -> &FrameBuffer<T> {
        &self.read
    }

    pub fn write(&self) -> &FrameBuffer<T> {
        &self.write
    }

    /// Exchange roles; never reallocates
    pub fn swap(&mut self) {
        mem::swap(&mut self.read, &mut self.write);
    }

    /// Resize `read` preserving content and reallocate `write` empty.
    /// No-op when the size is unchanged.
    pub fn resize<B>(&mut self, backend: &mut B, width: u32, height: u32) -> bool
    where
        B: GraphicsBackend<Texture = T>,
    {
        if !self.read.resize(backend, width, height) {
            return false;
        }
        self.write.reallocate(backend, width, height);
        true
    }

    pub fn width(&self) -> u32 {
        self.read.width()
    }

    pub fn height(&self) -> u32 {
        self.read.height()
    }

    pub fn release<B>(self, backend: &mut B)
    where
        B: GraphicsBackend<Texture = T>,
    {
        backend.release_texture(self.read.texture);
        backend.release_texture(self.write.texture);
    }
}
