//! Gradient-directed Gaussian blur.
//!
//! The gradient program writes a direction field into [`Slot::Direction`],
//! the pyramid smooths it in place, and the blur program convolves along the
//! perpendicular of the smoothed field.

use glam::Vec2;

use super::gaussian::{KernelBinding, KernelUpload};
use super::PyramidBlur;
use crate::error::BlurError;
use crate::gpu::backend::{GraphicsScope, TextureId};
use crate::gpu::effect::{Effect, Param};
use crate::gpu::render_target::Slot;
use crate::gpu::shader_loader::ShaderLoader;
use crate::options::FilterOptions;
use crate::renderer::PassContext;

#[derive(Debug)]
struct GradientProgram {
    effect: Effect,
    image: Option<Param<TextureId>>,
    texel_step: Option<Param<Vec2>>,
    channel: Option<Param<i32>>,
    gradient_type: Option<Param<i32>>,
}

#[derive(Debug)]
struct VectorProgram {
    effect: Effect,
    image: Option<Param<TextureId>>,
    direction_map: Option<Param<TextureId>>,
    uv_size: Option<Param<Vec2>>,
    amount: Option<Param<f32>>,
    kernel: KernelBinding,
}

/// Vector sub-type of the Gaussian algorithm.
#[derive(Debug)]
pub struct VectorBlur {
    gradient: Option<GradientProgram>,
    blur: Option<VectorProgram>,
    pyramid: PyramidBlur,
}

impl VectorBlur {
    /// Load the gradient, blur and pyramid programs.
    pub fn load(gfx: &mut GraphicsScope<'_>, loader: &ShaderLoader) -> Self {
        let gradient = Effect::load(gfx, loader, "vector_gradient").map(|effect| GradientProgram {
            image: effect.param("image"),
            texel_step: effect.param("texel_step"),
            channel: effect.param("channel"),
            gradient_type: effect.param("gradient_type"),
            effect,
        });
        let blur = Effect::load(gfx, loader, "vector_blur").map(|effect| VectorProgram {
            image: effect.param("image"),
            direction_map: effect.param("direction_map"),
            uv_size: effect.param("uv_size"),
            amount: effect.param("amount"),
            kernel: KernelBinding::resolve(&effect),
            effect,
        });
        Self {
            gradient,
            blur,
            pyramid: PyramidBlur::load(gfx, loader),
        }
    }

    /// Blur `source` into the output slot with the Gaussian `kernel` sized by
    /// the blur radius.
    ///
    /// # Errors
    ///
    /// Propagates allocation and draw failures.
    pub(crate) fn render(
        &mut self,
        ctx: &mut PassContext<'_, '_>,
        source: TextureId,
        options: &FilterOptions,
        kernel: &mut KernelUpload,
    ) -> Result<(), BlurError> {
        let (Some(gradient), Some(blur)) = (self.gradient.as_mut(), self.blur.as_mut()) else {
            return ctx.pass_through(source);
        };
        let vector = &options.vector;

        gradient.effect.set(gradient.image, source);
        gradient.effect.set(gradient.texel_step, ctx.texel());
        gradient.effect.set(gradient.channel, vector.channel.code());
        gradient.effect.set(gradient.gradient_type, vector.gradient_type.code());
        let field = ctx.draw(&gradient.effect, Slot::Direction, ctx.width, ctx.height)?;
        self.pyramid
            .render(ctx, field, vector.smoothing, Slot::Direction)?;
        let field = ctx
            .pool
            .get(Slot::Direction)
            .ok_or_else(|| BlurError::InvalidDraw("direction map missing".to_owned()))?;

        kernel.prepare(ctx.gfx, options.blur.radius)?;
        blur.kernel.apply(&mut blur.effect, kernel);
        blur.effect.set(blur.image, source);
        blur.effect.set(blur.direction_map, field);
        blur.effect.set(blur.uv_size, ctx.uv_size());
        blur.effect.set(blur.amount, vector.amount);
        let _ = ctx.draw_to_output(&blur.effect)?;
        Ok(())
    }

    /// Release every program.
    pub fn destroy(self, gfx: &mut GraphicsScope<'_>) {
        if let Some(gradient) = self.gradient {
            gradient.effect.destroy(gfx);
        }
        if let Some(blur) = self.blur {
            blur.effect.destroy(gfx);
        }
        self.pyramid.destroy(gfx);
    }
}
