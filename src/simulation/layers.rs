//! Display-resolution trace layers.

use crate::gpu::backend::GraphicsBackend;
use crate::gpu::framebuffer::{DoubleFrameBuffer, FrameBuffer, TextureSpec};

/// The four layers composited every frame, back to front:
/// raw-path ghost, approximation ghost, live trace, rotating arrows.
pub struct TraceLayers<T> {
    pub original: FrameBuffer<T>,
    pub mark: FrameBuffer<T>,
    pub trace: FrameBuffer<T>,
    pub arrows: DoubleFrameBuffer<T>,
}

impl<T> TraceLayers<T> {
    pub fn create<B>(backend: &mut B, width: u32, height: u32) -> Self
    where
        B: GraphicsBackend<Texture = T>,
    {
        let formats = backend.formats();
        let spec = |label| {
            TextureSpec::new(label, width, height, formats.layer).with_filtering(formats.layer_filtering)
        };
        log::debug!("Creating trace layers {}x{} {:?}", width, height, formats.layer);
        Self {
            original: FrameBuffer::create(backend, spec("original path"), None),
            mark: FrameBuffer::create(backend, spec("approximation mark"), None),
            trace: FrameBuffer::create(backend, spec("live trace"), None),
            arrows: DoubleFrameBuffer::create(backend, spec("rotating arrows")),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.trace.width(), self.trace.height())
    }

    /// Resize every layer, keeping content. `false` when the size is unchanged.
    pub fn resize<B>(&mut self, backend: &mut B, width: u32, height: u32) -> bool
    where
        B: GraphicsBackend<Texture = T>,
    {
        let resized = self.original.resize(backend, width, height);
        self.mark.resize(backend, width, height);
        self.trace.resize(backend, width, height);
        self.arrows.resize(backend, width, height);
        if resized {
            log::debug!("Trace layers resized to {}x{}", width, height);
        }
        resized
    }

    /// Clear the raw-path ghost and the live trace
    pub fn clear_traces<B>(&self, backend: &mut B)
    where
        B: GraphicsBackend<Texture = T>,
    {
        backend.clear(&self.original);
        backend.clear(&self.trace);
    }

    /// Clear every layer, including both arrow buffers
    pub fn clear_all<B>(&self, backend: &mut B)
    where
        B: GraphicsBackend<Texture = T>,
    {
        self.clear_traces(backend);
        backend.clear(&self.mark);
        backend.clear(self.arrows.read());
        backend.clear(self.arrows.write());
    }

    /// Composite order, back to front
    pub fn composite_order(&self) -> [&FrameBuffer<T>; 4] {
        [&self.original, &self.mark, &self.trace, self.arrows.read()]
    }

    pub fn release<B>(self, backend: &mut B)
    where
        B: GraphicsBackend<Texture = T>,
    {
        backend.release_texture(self.original.into_texture());
        backend.release_texture(self.mark.into_texture());
        backend.release_texture(self.trace.into_texture());
        self.arrows.release(backend);
    }
}
