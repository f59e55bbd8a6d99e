//! Offscreen render targets and the fixed-slot pool the blur passes
//! ping-pong between.
//!
//! Every multi-pass routine writes into one slot while sampling another, then
//! [`RenderTargetPool::swap`]s the two. Swapping exchanges handles only, so a
//! steady-state frame allocates nothing: a slot is re-created only when the
//! requested size differs from what it already holds.

use super::backend::{GraphicsScope, TextureFormat, TextureId};
use crate::error::BlurError;

/// An offscreen surface that is reused while its size stays the same.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTarget {
    texture: Option<TextureId>,
    width: u32,
    height: u32,
    format: TextureFormat,
}

impl RenderTarget {
    /// An empty target that allocates on first [`prepare`](Self::prepare).
    #[must_use]
    pub const fn new(format: TextureFormat) -> Self {
        Self {
            texture: None,
            width: 0,
            height: 0,
            format,
        }
    }

    /// Return a surface of exactly `width x height`, reusing the current one
    /// when the size matches. Zero sizes are bumped to 1.
    ///
    /// # Errors
    ///
    /// Propagates allocation failure from the backend.
    pub fn prepare(
        &mut self,
        gfx: &mut GraphicsScope<'_>,
        width: u32,
        height: u32,
    ) -> Result<TextureId, BlurError> {
        let (width, height) = (width.max(1), height.max(1));
        if let Some(texture) = self.texture {
            if self.width == width && self.height == height {
                return Ok(texture);
            }
            gfx.destroy_texture(texture);
            self.texture = None;
        }
        let texture = gfx.create_render_target(width, height, self.format)?;
        self.texture = Some(texture);
        self.width = width;
        self.height = height;
        Ok(texture)
    }

    /// Current surface, if allocated.
    #[must_use]
    pub const fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    /// Current size (0x0 when unallocated).
    #[must_use]
    pub const fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Destroy the surface, leaving the target empty.
    pub fn release(&mut self, gfx: &mut GraphicsScope<'_>) {
        if let Some(texture) = self.texture.take() {
            gfx.destroy_texture(texture);
        }
        self.width = 0;
        self.height = 0;
    }
}

/// Named slots of a [`RenderTargetPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Copy of the host input for this frame.
    Input,
    /// Input composited over the background source.
    Composite,
    /// Final result handed back to the host.
    Output,
    /// Ping-pong working buffer.
    Render,
    /// Ping-pong working buffer.
    Render2,
    /// Temporal accumulator: last blended frame.
    Prior,
    /// Temporal accumulator: frame being blended.
    Accum,
    /// Smoothed direction field of the vector blur.
    Direction,
}

impl Slot {
    const COUNT: usize = 8;

    const fn index(self) -> usize {
        self as usize
    }
}

/// A fixed set of render targets owned by one filter instance.
#[derive(Debug)]
pub struct RenderTargetPool {
    targets: [RenderTarget; Slot::COUNT],
    format: TextureFormat,
}

impl RenderTargetPool {
    /// An empty pool whose targets use `format`.
    #[must_use]
    pub fn new(format: TextureFormat) -> Self {
        Self {
            targets: std::array::from_fn(|_| RenderTarget::new(format)),
            format,
        }
    }

    /// Prepare `slot` at `width x height` and return its surface.
    ///
    /// # Errors
    ///
    /// Propagates allocation failure from the backend.
    pub fn acquire(
        &mut self,
        gfx: &mut GraphicsScope<'_>,
        slot: Slot,
        width: u32,
        height: u32,
    ) -> Result<TextureId, BlurError> {
        self.targets[slot.index()].prepare(gfx, width, height)
    }

    /// Surface currently held by `slot`.
    #[must_use]
    pub const fn get(&self, slot: Slot) -> Option<TextureId> {
        self.targets[slot.index()].texture()
    }

    /// Size currently held by `slot`.
    #[must_use]
    pub const fn size(&self, slot: Slot) -> (u32, u32) {
        self.targets[slot.index()].size()
    }

    /// Exchange the targets held by two slots. No GPU work.
    pub fn swap(&mut self, a: Slot, b: Slot) {
        self.targets.swap(a.index(), b.index());
    }

    /// Detach the target held by `slot`, leaving the slot empty. The caller
    /// owns the returned target and must release it.
    pub fn take(&mut self, slot: Slot) -> RenderTarget {
        std::mem::replace(
            &mut self.targets[slot.index()],
            RenderTarget::new(self.format),
        )
    }

    /// Destroy the surface held by one slot.
    pub fn release(&mut self, gfx: &mut GraphicsScope<'_>, slot: Slot) {
        self.targets[slot.index()].release(gfx);
    }

    /// Destroy every surface in the pool.
    pub fn release_all(&mut self, gfx: &mut GraphicsScope<'_>) {
        for target in &mut self.targets {
            target.release(gfx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::cpu::CpuBackend;

    #[test]
    fn swap_then_acquire_reuses_surfaces() {
        let mut backend = CpuBackend::new();
        let mut pool = RenderTargetPool::new(TextureFormat::Rgba16Float);
        {
            let mut gfx = GraphicsScope::enter(&mut backend).unwrap();
            let a = pool.acquire(&mut gfx, Slot::Render, 64, 32).unwrap();
            let b = pool.acquire(&mut gfx, Slot::Render2, 64, 32).unwrap();
            pool.swap(Slot::Render, Slot::Render2);
            assert_eq!(pool.get(Slot::Render), Some(b));
            assert_eq!(pool.get(Slot::Render2), Some(a));

            assert_eq!(pool.acquire(&mut gfx, Slot::Render, 64, 32).unwrap(), b);
            assert_eq!(pool.acquire(&mut gfx, Slot::Render2, 64, 32).unwrap(), a);
        }
        assert_eq!(backend.textures_created(), 2);
        assert_eq!(backend.live_textures(), 2);
    }

    #[test]
    fn size_change_reallocates() {
        let mut backend = CpuBackend::new();
        let mut pool = RenderTargetPool::new(TextureFormat::Rgba16Float);
        {
            let mut gfx = GraphicsScope::enter(&mut backend).unwrap();
            let first = pool.acquire(&mut gfx, Slot::Output, 16, 16).unwrap();
            let second = pool.acquire(&mut gfx, Slot::Output, 8, 8).unwrap();
            assert_ne!(first, second);
            assert_eq!(gfx.texture_size(first), None);
            assert_eq!(pool.size(Slot::Output), (8, 8));
        }
        assert_eq!(backend.live_textures(), 1);
    }

    #[test]
    fn take_detaches_and_release_all_frees() {
        let mut backend = CpuBackend::new();
        let mut pool = RenderTargetPool::new(TextureFormat::Rgba16Float);
        {
            let mut gfx = GraphicsScope::enter(&mut backend).unwrap();
            let _ = pool.acquire(&mut gfx, Slot::Render, 4, 4).unwrap();
            let _ = pool.acquire(&mut gfx, Slot::Input, 4, 4).unwrap();
            let mut base = pool.take(Slot::Render);
            assert_eq!(pool.get(Slot::Render), None);
            assert!(base.texture().is_some());

            pool.release_all(&mut gfx);
            assert_eq!(gfx.texture_size(base.texture().unwrap()), Some((4, 4)));
            base.release(&mut gfx);
        }
        assert_eq!(backend.live_textures(), 0);
    }

    #[test]
    fn zero_size_is_clamped() {
        let mut backend = CpuBackend::new();
        let mut gfx = GraphicsScope::enter(&mut backend).unwrap();
        let mut target = RenderTarget::new(TextureFormat::Rgba16Float);
        let tex = target.prepare(&mut gfx, 0, 0).unwrap();
        assert_eq!(gfx.texture_size(tex), Some((1, 1)));
    }
}
