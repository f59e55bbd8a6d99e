//! Box convolution, repeated `passes` times.

use glam::Vec2;

use super::{direction, FocusBinding, MIN_RADIUS};
use crate::error::BlurError;
use crate::gpu::backend::{GraphicsScope, TextureId};
use crate::gpu::effect::{Effect, Param};
use crate::gpu::render_target::Slot;
use crate::gpu::shader_loader::ShaderLoader;
use crate::options::{BlurOptions, BlurType};
use crate::renderer::PassContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Area,
    Directional,
    Zoom,
    TiltShift,
}

#[derive(Debug)]
struct BoxProgram {
    effect: Effect,
    image: Option<Param<TextureId>>,
    radius: Option<Param<f32>>,
    texel_step: Option<Param<Vec2>>,
    radial_center: Option<Param<Vec2>>,
    radial_uv_size: Option<Param<Vec2>>,
    focus: FocusBinding,
}

/// Box family renderer.
#[derive(Debug)]
pub struct BoxBlur {
    shape: Shape,
    program: Option<BoxProgram>,
}

impl BoxBlur {
    /// Load the program for `blur_type`. Sub-types without a box variant
    /// render as area.
    pub fn load(
        gfx: &mut GraphicsScope<'_>,
        loader: &ShaderLoader,
        blur_type: BlurType,
    ) -> Self {
        let (shape, name) = match blur_type {
            BlurType::Directional => (Shape::Directional, "box_1d"),
            BlurType::Zoom => (Shape::Zoom, "box_radial"),
            BlurType::TiltShift => (Shape::TiltShift, "box_tiltshift"),
            BlurType::None | BlurType::Area | BlurType::Motion | BlurType::Vector => {
                (Shape::Area, "box_1d")
            }
        };
        let program = Effect::load(gfx, loader, name).map(|effect| BoxProgram {
            image: effect.param("image"),
            radius: effect.param("radius"),
            texel_step: effect.param("texel_step"),
            radial_center: effect.param("radial_center"),
            radial_uv_size: effect.param("uv_size"),
            focus: FocusBinding::resolve(&effect),
            effect,
        });
        Self { shape, program }
    }

    /// Blur `source` into the output slot.
    ///
    /// # Errors
    ///
    /// Propagates allocation and draw failures.
    pub fn render(
        &mut self,
        ctx: &mut PassContext<'_, '_>,
        source: TextureId,
        blur: &BlurOptions,
    ) -> Result<(), BlurError> {
        if blur.radius < MIN_RADIUS {
            return ctx.pass_through(source);
        }
        let Some(program) = self.program.as_mut() else {
            return ctx.pass_through(source);
        };
        program.effect.set(program.radius, blur.radius);
        let texel = ctx.texel();
        match self.shape {
            Shape::TiltShift => {
                program.focus.apply(&mut program.effect, blur, ctx.uv_size());
            }
            Shape::Zoom => {
                program.effect.set(program.radial_uv_size, ctx.uv_size());
                program
                    .effect
                    .set(program.radial_center, Vec2::from(blur.center));
            }
            Shape::Area | Shape::Directional => {}
        }

        let mut current = source;
        for _ in 0..blur.passes.max(1) {
            program.effect.set(program.image, current);
            match self.shape {
                Shape::Area | Shape::TiltShift => {
                    program.effect.set(program.texel_step, Vec2::new(texel.x, 0.0));
                    let first =
                        ctx.draw(&program.effect, Slot::Render2, ctx.width, ctx.height)?;
                    program.effect.set(program.image, first);
                    program.effect.set(program.texel_step, Vec2::new(0.0, texel.y));
                }
                Shape::Directional => {
                    program
                        .effect
                        .set(program.texel_step, direction(blur.angle, texel));
                }
                Shape::Zoom => {}
            }
            current = ctx.draw_to_output(&program.effect)?;
        }
        Ok(())
    }

    /// Release the program.
    pub fn destroy(self, gfx: &mut GraphicsScope<'_>) {
        if let Some(program) = self.program {
            program.effect.destroy(gfx);
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec4;

    use super::*;
    use crate::gpu::backend::{GraphicsBackend, TextureFormat};
    use crate::gpu::cpu::CpuBackend;
    use crate::gpu::render_target::RenderTargetPool;
    use crate::renderer::test_support::{common, gradient_image, max_difference, solid};

    fn run(backend: &mut CpuBackend, source: TextureId, blur: &BlurOptions) -> TextureId {
        let (w, h) = backend.texture_size(source).unwrap();
        let mut pool = RenderTargetPool::new(TextureFormat::Rgba16Float);
        let mut gfx = GraphicsScope::enter(backend).unwrap();
        let mut shared = common(&mut gfx);
        let mut renderer = BoxBlur::load(&mut gfx, &ShaderLoader::embedded(), blur.blur_type);
        let mut ctx = PassContext {
            gfx: &mut gfx,
            pool: &mut pool,
            common: &mut shared,
            width: w,
            height: h,
            time: 0.0,
            transition: None,
        };
        renderer.render(&mut ctx, source, blur).unwrap();
        pool.get(Slot::Output).unwrap()
    }

    #[test]
    fn passes_repeat_the_whole_shape() {
        let mut backend = CpuBackend::new();
        let source = solid(&mut backend, 8, 8, Vec4::ONE);
        let blur = BlurOptions {
            blur_type: BlurType::Area,
            radius: 2.0,
            passes: 3,
            ..BlurOptions::default()
        };
        let before = backend.draw_count();
        let out = run(&mut backend, source, &blur);
        assert_eq!(backend.draw_count() - before, 6);
        assert!(backend
            .image(out)
            .unwrap()
            .texels()
            .iter()
            .all(|t| (*t - Vec4::ONE).abs().max_element() < 1e-5));
    }

    #[test]
    fn area_averages_neighbours() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(9, 1));
        let blur = BlurOptions {
            blur_type: BlurType::Area,
            radius: 1.0,
            ..BlurOptions::default()
        };
        let out = run(&mut backend, source, &blur);
        // Interior texel 4: mean of red at 3, 4, 5 is red at 4.
        let src = backend.image(source).unwrap().texels()[4];
        let dst = backend.image(out).unwrap().texels()[4];
        assert!((src.x - dst.x).abs() < 1e-5);
        // Edge texel 0 clamps: (0 + 0 + 1/8) / 3.
        let edge = backend.image(out).unwrap().texels()[0];
        assert!((edge.x - 1.0 / 24.0).abs() < 1e-5);
    }

    #[test]
    fn below_threshold_is_identity() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(6, 6));
        let blur = BlurOptions {
            blur_type: BlurType::Zoom,
            radius: 0.0,
            ..BlurOptions::default()
        };
        let out = run(&mut backend, source, &blur);
        assert_eq!(
            max_difference(backend.image(out).unwrap(), backend.image(source).unwrap()),
            0.0
        );
    }
}
