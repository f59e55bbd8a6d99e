//! Blur passes and the compositing stages around them.
//!
//! Every routine renders through a [`PassContext`]: the open graphics scope,
//! the instance's render-target pool, the shared `copy`/`mix` programs and
//! the frame geometry. Algorithms read a source texture and leave their
//! result in [`Slot::Output`] at the frame size.

pub mod blur;
pub mod composite;

use glam::Vec2;

use crate::error::BlurError;
use crate::gpu::backend::{GraphicsScope, TextureId};
use crate::gpu::effect::{Effect, Param};
use crate::gpu::render_target::{RenderTargetPool, Slot};
use crate::gpu::shader_loader::ShaderLoader;
use crate::util::transition::TransitionContext;

/// Pass-through program.
#[derive(Debug)]
struct CopyProgram {
    effect: Effect,
    image: Option<Param<TextureId>>,
}

/// Two-texture linear blend.
#[derive(Debug)]
struct MixProgram {
    effect: Effect,
    image: Option<Param<TextureId>>,
    image2: Option<Param<TextureId>>,
    ratio: Option<Param<f32>>,
}

/// Programs every algorithm relies on.
#[derive(Debug, Default)]
pub struct CommonPrograms {
    copy: Option<CopyProgram>,
    mix: Option<MixProgram>,
}

impl CommonPrograms {
    /// Load `copy` and `mix`. A program that fails to load stays absent.
    pub fn load(gfx: &mut GraphicsScope<'_>, loader: &ShaderLoader) -> Self {
        let copy = Effect::load(gfx, loader, "copy").map(|effect| CopyProgram {
            image: effect.param("image"),
            effect,
        });
        let mix = Effect::load(gfx, loader, "mix").map(|effect| MixProgram {
            image: effect.param("image"),
            image2: effect.param("image2"),
            ratio: effect.param("ratio"),
            effect,
        });
        Self { copy, mix }
    }

    /// Release both programs.
    pub fn destroy(self, gfx: &mut GraphicsScope<'_>) {
        if let Some(copy) = self.copy {
            copy.effect.destroy(gfx);
        }
        if let Some(mix) = self.mix {
            mix.effect.destroy(gfx);
        }
    }
}

/// Everything a pass needs to draw one frame.
pub struct PassContext<'a, 'g> {
    /// Open graphics scope.
    pub gfx: &'a mut GraphicsScope<'g>,
    /// Render targets of the filter instance.
    pub pool: &'a mut RenderTargetPool,
    /// Shared programs.
    pub common: &'a mut CommonPrograms,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Animation clock in seconds.
    pub time: f32,
    /// Active configuration transition, if any.
    pub transition: Option<TransitionContext>,
}

impl PassContext<'_, '_> {
    /// Frame size as floats.
    #[must_use]
    pub fn uv_size(&self) -> Vec2 {
        Vec2::new(self.width.max(1) as f32, self.height.max(1) as f32)
    }

    /// One pixel in uv units.
    #[must_use]
    pub fn texel(&self) -> Vec2 {
        Vec2::ONE / self.uv_size()
    }

    /// Draw `effect` into `slot` at `width x height`.
    ///
    /// # Errors
    ///
    /// Propagates allocation and draw failures.
    pub fn draw(
        &mut self,
        effect: &Effect,
        slot: Slot,
        width: u32,
        height: u32,
    ) -> Result<TextureId, BlurError> {
        let target = self.pool.acquire(self.gfx, slot, width, height)?;
        effect.draw(self.gfx, target)?;
        Ok(target)
    }

    /// Draw `effect` at frame size into the scratch target, then swap the
    /// result into [`Slot::Output`]. The effect may sample the current
    /// output.
    ///
    /// # Errors
    ///
    /// Propagates allocation and draw failures.
    pub fn draw_to_output(&mut self, effect: &Effect) -> Result<TextureId, BlurError> {
        let _ = self.draw(effect, Slot::Render, self.width, self.height)?;
        self.pool.swap(Slot::Render, Slot::Output);
        self.pool
            .get(Slot::Output)
            .ok_or_else(|| BlurError::InvalidDraw("output target missing".to_owned()))
    }

    /// Copy `source` into `slot` at frame size.
    ///
    /// # Errors
    ///
    /// Returns [`BlurError::InvalidDraw`] when the copy program is
    /// unavailable; otherwise propagates draw failures.
    pub fn copy(&mut self, source: TextureId, slot: Slot) -> Result<TextureId, BlurError> {
        let (width, height) = (self.width, self.height);
        let program = self
            .common
            .copy
            .as_mut()
            .ok_or_else(|| BlurError::InvalidDraw("copy program unavailable".to_owned()))?;
        program.effect.set(program.image, source);
        let target = self.pool.acquire(self.gfx, slot, width, height)?;
        program.effect.draw(self.gfx, target)?;
        Ok(target)
    }

    /// Copy `source` to the output; the input passes through unchanged.
    ///
    /// # Errors
    ///
    /// See [`copy`](Self::copy).
    pub fn pass_through(&mut self, source: TextureId) -> Result<(), BlurError> {
        if self.pool.get(Slot::Output) == Some(source) {
            return Ok(());
        }
        let _ = self.copy(source, Slot::Output)?;
        Ok(())
    }

    /// Blend `base` toward `residual` by `ratio` into `slot`.
    ///
    /// # Errors
    ///
    /// Returns [`BlurError::InvalidDraw`] when the mix program is
    /// unavailable; otherwise propagates draw failures.
    pub fn mix(
        &mut self,
        base: TextureId,
        residual: TextureId,
        ratio: f32,
        slot: Slot,
        (width, height): (u32, u32),
    ) -> Result<TextureId, BlurError> {
        let program = self
            .common
            .mix
            .as_mut()
            .ok_or_else(|| BlurError::InvalidDraw("mix program unavailable".to_owned()))?;
        program.effect.set(program.image, base);
        program.effect.set(program.image2, residual);
        program.effect.set(program.ratio, ratio);
        let target = self.pool.acquire(self.gfx, slot, width, height)?;
        program.effect.draw(self.gfx, target)?;
        Ok(target)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use glam::Vec4;

    use super::CommonPrograms;
    use crate::gpu::backend::{GraphicsScope, TextureFormat, TextureId};
    use crate::gpu::cpu::{CpuBackend, CpuImage};
    use crate::gpu::shader_loader::ShaderLoader;

    /// Horizontal ramp in red, vertical ramp in green, opaque.
    pub(crate) fn gradient_image(width: u32, height: u32) -> CpuImage {
        let texels: Vec<[f32; 4]> = (0..width * height)
            .map(|i| {
                let x = (i % width) as f32 / (width - 1).max(1) as f32;
                let y = (i / width) as f32 / (height - 1).max(1) as f32;
                [x, y, 0.5, 1.0]
            })
            .collect();
        CpuImage::from_texels(width, height, TextureFormat::Rgba16Float, &texels)
            .unwrap()
    }

    pub(crate) fn solid(backend: &mut CpuBackend, w: u32, h: u32, color: Vec4) -> TextureId {
        backend.upload(CpuImage::filled(w, h, TextureFormat::Rgba16Float, color))
    }

    pub(crate) fn common(gfx: &mut GraphicsScope<'_>) -> CommonPrograms {
        CommonPrograms::load(gfx, &ShaderLoader::embedded())
    }

    pub(crate) fn max_difference(a: &CpuImage, b: &CpuImage) -> f32 {
        a.texels()
            .iter()
            .zip(b.texels())
            .map(|(x, y)| (*x - *y).abs().max_element())
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec4;

    use super::test_support::{common, solid};
    use super::*;
    use crate::gpu::backend::TextureFormat;
    use crate::gpu::cpu::CpuBackend;

    #[test]
    fn mix_blends_by_ratio() {
        let mut backend = CpuBackend::new();
        let black = solid(&mut backend, 4, 4, Vec4::new(0.0, 0.0, 0.0, 1.0));
        let white = solid(&mut backend, 4, 4, Vec4::ONE);
        let mut pool = RenderTargetPool::new(TextureFormat::Rgba16Float);
        let out = {
            let mut gfx = GraphicsScope::enter(&mut backend).unwrap();
            let mut shared = common(&mut gfx);
            let mut ctx = PassContext {
                gfx: &mut gfx,
                pool: &mut pool,
                common: &mut shared,
                width: 4,
                height: 4,
                time: 0.0,
                transition: None,
            };
            ctx.mix(black, white, 0.25, Slot::Render, (4, 4)).unwrap()
        };
        let texel = backend.image(out).unwrap().texels()[0];
        assert!((texel.x - 0.25).abs() < 1e-5);
        assert!((texel.w - 1.0).abs() < 1e-5);
    }

    #[test]
    fn missing_copy_program_is_an_error() {
        let mut backend = CpuBackend::new();
        let source = solid(&mut backend, 2, 2, Vec4::ONE);
        let mut pool = RenderTargetPool::new(TextureFormat::Rgba16Float);
        let mut gfx = GraphicsScope::enter(&mut backend).unwrap();
        let mut shared = CommonPrograms::default();
        let mut ctx = PassContext {
            gfx: &mut gfx,
            pool: &mut pool,
            common: &mut shared,
            width: 2,
            height: 2,
            time: 0.0,
            transition: None,
        };
        assert!(matches!(
            ctx.pass_through(source),
            Err(BlurError::InvalidDraw(_))
        ));
    }
}
