//! Tessellated pixelation, optionally pre-smoothed by the pyramid.

use glam::Vec2;

use super::dual_kawase::MIN_STRENGTH;
use super::{PyramidBlur, MIN_PIXEL_SIZE};
use crate::error::BlurError;
use crate::gpu::backend::{GraphicsScope, TextureId};
use crate::gpu::effect::{Effect, Param};
use crate::gpu::render_target::Slot;
use crate::gpu::shader_loader::ShaderLoader;
use crate::options::{FilterOptions, PixelateType};
use crate::renderer::PassContext;

#[derive(Debug)]
struct PixelateProgram {
    effect: Effect,
    image: Option<Param<TextureId>>,
    pixel_size: Option<Param<f32>>,
    uv_size: Option<Param<Vec2>>,
    origin: Option<Param<Vec2>>,
    time: Option<Param<f32>>,
}

/// Pixelate renderer for one cell shape.
#[derive(Debug)]
pub struct PixelateBlur {
    program: Option<PixelateProgram>,
    pyramid: PyramidBlur,
}

/// Pyramid strength applied before pixelating: `smoothing_pct` percent of
/// the radius.
#[must_use]
pub fn smoothing_strength(options: &FilterOptions) -> f32 {
    options.pixelate.smoothing_pct / 100.0 * options.blur.radius
}

impl PixelateBlur {
    /// Load the program for `shape` and the smoothing pyramid.
    pub fn load(gfx: &mut GraphicsScope<'_>, loader: &ShaderLoader, shape: PixelateType) -> Self {
        let program = Effect::load(gfx, loader, shape.program()).map(|effect| PixelateProgram {
            image: effect.param("image"),
            pixel_size: effect.param("pixel_size"),
            uv_size: effect.param("uv_size"),
            origin: effect.param("origin"),
            time: effect.param("time"),
            effect,
        });
        Self {
            program,
            pyramid: PyramidBlur::load(gfx, loader),
        }
    }

    /// Pixelate `source` into the output slot.
    ///
    /// # Errors
    ///
    /// Propagates allocation and draw failures.
    pub fn render(
        &mut self,
        ctx: &mut PassContext<'_, '_>,
        source: TextureId,
        options: &FilterOptions,
    ) -> Result<(), BlurError> {
        let pixel_size = options.blur.radius.max(1.0);
        if pixel_size < MIN_PIXEL_SIZE {
            return ctx.pass_through(source);
        }
        let Some(program) = self.program.as_mut() else {
            return ctx.pass_through(source);
        };

        let strength = smoothing_strength(options);
        let image = if strength > MIN_STRENGTH {
            self.pyramid.render(ctx, source, strength, Slot::Output)?;
            ctx.pool
                .get(Slot::Output)
                .ok_or_else(|| BlurError::InvalidDraw("smoothed input missing".to_owned()))?
        } else {
            source
        };

        let pixelate = &options.pixelate;
        let time = if pixelate.animate {
            ctx.time * pixelate.time_scale
        } else {
            0.0
        };
        program.effect.set(program.image, image);
        program.effect.set(program.pixel_size, pixel_size);
        program.effect.set(program.uv_size, ctx.uv_size());
        program.effect.set(program.origin, Vec2::from(pixelate.origin));
        program.effect.set(program.time, time);
        let _ = ctx.draw_to_output(&program.effect)?;
        Ok(())
    }

    /// Release the programs.
    pub fn destroy(self, gfx: &mut GraphicsScope<'_>) {
        if let Some(program) = self.program {
            program.effect.destroy(gfx);
        }
        self.pyramid.destroy(gfx);
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec4;

    use super::*;
    use crate::gpu::backend::{GraphicsBackend, TextureFormat};
    use crate::gpu::cpu::CpuBackend;
    use crate::gpu::render_target::RenderTargetPool;
    use crate::options::BlurAlgorithm;
    use crate::renderer::test_support::{common, gradient_image, max_difference};

    fn options(shape: PixelateType, radius: f32, smoothing_pct: f32) -> FilterOptions {
        let mut options = FilterOptions::default();
        options.blur.algorithm = BlurAlgorithm::Pixelate;
        options.blur.radius = radius;
        options.pixelate.shape = shape;
        options.pixelate.smoothing_pct = smoothing_pct;
        options
    }

    fn run(backend: &mut CpuBackend, source: TextureId, options: &FilterOptions) -> TextureId {
        let (w, h) = backend.texture_size(source).unwrap();
        let mut pool = RenderTargetPool::new(TextureFormat::Rgba16Float);
        let mut gfx = GraphicsScope::enter(backend).unwrap();
        let mut shared = common(&mut gfx);
        let mut blur =
            PixelateBlur::load(&mut gfx, &ShaderLoader::embedded(), options.pixelate.shape);
        let mut ctx = PassContext {
            gfx: &mut gfx,
            pool: &mut pool,
            common: &mut shared,
            width: w,
            height: h,
            time: 0.0,
            transition: None,
        };
        blur.render(&mut ctx, source, options).unwrap();
        pool.get(Slot::Output).unwrap()
    }

    #[test]
    fn smoothing_is_a_share_of_the_radius() {
        assert_eq!(smoothing_strength(&options(PixelateType::Square, 8.0, 50.0)), 4.0);
        assert_eq!(smoothing_strength(&options(PixelateType::Square, 8.0, 0.0)), 0.0);
    }

    #[test]
    fn smoothing_runs_the_pyramid_first() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(16, 16));
        let before = backend.draw_count();
        let _ = run(&mut backend, source, &options(PixelateType::Square, 8.0, 50.0));
        // Pyramid at strength 4 is four draws, then the pixelate draw.
        assert_eq!(backend.draw_count() - before, 5);

        let before = backend.draw_count();
        let _ = run(&mut backend, source, &options(PixelateType::Square, 8.0, 0.0));
        assert_eq!(backend.draw_count() - before, 1);
    }

    #[test]
    fn square_cells_are_flat() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(16, 16));
        let out = run(&mut backend, source, &options(PixelateType::Square, 4.0, 0.0));
        let image = backend.image(out).unwrap();
        assert_eq!(image.texel(0, 0), image.texel(3, 3));
        assert_ne!(image.texel(3, 0), image.texel(4, 0));
    }

    #[test]
    fn circle_cells_clear_their_corners() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(16, 16));
        let out = run(&mut backend, source, &options(PixelateType::Circle, 4.0, 0.0));
        let image = backend.image(out).unwrap();
        assert_eq!(image.texel(0, 0), Vec4::ZERO);
        assert_ne!(image.texel(2, 2), Vec4::ZERO);
    }

    #[test]
    fn unit_pixels_pass_through() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(8, 8));
        let out = run(&mut backend, source, &options(PixelateType::Hexagonal, 1.0, 50.0));
        assert_eq!(
            max_difference(backend.image(out).unwrap(), backend.image(source).unwrap()),
            0.0
        );
    }
}
