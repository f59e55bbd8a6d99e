//! Per-algorithm blur renderers and the dispatcher that owns the active one.
//!
//! [`BlurRenderer::load`] resolves every program and parameter handle the
//! selected algorithm needs once per configuration change. Per frame,
//! [`BlurRenderer::render`] only writes values through those handles and
//! draws. An algorithm whose programs failed to load passes its input
//! through unchanged.

pub mod box_blur;
pub mod dual_kawase;
pub mod gaussian;
pub mod pixelate;
pub mod temporal;
pub mod vector;

use glam::Vec2;

pub use self::box_blur::BoxBlur;
pub use self::dual_kawase::{DualKawaseBlur, PyramidBlur, PyramidPlan, Residual};
pub use self::gaussian::GaussianBlur;
pub use self::pixelate::PixelateBlur;
pub use self::temporal::TemporalBlur;
pub use self::vector::VectorBlur;
use super::PassContext;
use crate::error::BlurError;
use crate::gpu::backend::{GraphicsScope, TextureId};
use crate::gpu::effect::{Effect, Param};
use crate::gpu::shader_loader::ShaderLoader;
use crate::options::{BlurAlgorithm, BlurOptions, FilterOptions};

/// Gaussian and Box radii below this pass the input through.
pub const MIN_RADIUS: f32 = 0.01;

/// Pixel sizes below this pass the input through.
pub const MIN_PIXEL_SIZE: f32 = 1.01;

/// The active algorithm with its loaded programs.
#[derive(Debug)]
pub enum BlurRenderer {
    /// No algorithm: the input passes through.
    None,
    /// Gaussian family.
    Gaussian(GaussianBlur),
    /// Box family.
    Box(BoxBlur),
    /// Fractional dual-Kawase pyramid.
    DualKawase(DualKawaseBlur),
    /// Tessellated pixelation.
    Pixelate(PixelateBlur),
    /// Exponential accumulation over frames.
    Temporal(TemporalBlur),
}

impl BlurRenderer {
    /// Load the programs of the algorithm selected in `options`.
    pub fn load(
        gfx: &mut GraphicsScope<'_>,
        loader: &ShaderLoader,
        options: &FilterOptions,
    ) -> Self {
        let renderer = match options.blur.algorithm {
            BlurAlgorithm::None => Self::None,
            BlurAlgorithm::Gaussian => {
                Self::Gaussian(GaussianBlur::load(gfx, loader, options.blur.blur_type))
            }
            BlurAlgorithm::Box => {
                Self::Box(BoxBlur::load(gfx, loader, options.blur.blur_type))
            }
            BlurAlgorithm::DualKawase => {
                Self::DualKawase(DualKawaseBlur::load(gfx, loader))
            }
            BlurAlgorithm::Pixelate => {
                Self::Pixelate(PixelateBlur::load(gfx, loader, options.pixelate.shape))
            }
            BlurAlgorithm::Temporal => Self::Temporal(TemporalBlur::load(gfx, loader)),
        };
        log::debug!("loaded {:?} renderer", renderer.algorithm());
        renderer
    }

    /// Algorithm this renderer implements.
    #[must_use]
    pub const fn algorithm(&self) -> BlurAlgorithm {
        match self {
            Self::None => BlurAlgorithm::None,
            Self::Gaussian(_) => BlurAlgorithm::Gaussian,
            Self::Box(_) => BlurAlgorithm::Box,
            Self::DualKawase(_) => BlurAlgorithm::DualKawase,
            Self::Pixelate(_) => BlurAlgorithm::Pixelate,
            Self::Temporal(_) => BlurAlgorithm::Temporal,
        }
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
        options: &FilterOptions,
    ) -> Result<(), BlurError> {
        match self {
            Self::None => ctx.pass_through(source),
            Self::Gaussian(blur) => blur.render(ctx, source, options),
            Self::Box(blur) => blur.render(ctx, source, &options.blur),
            Self::DualKawase(blur) => blur.render(ctx, source, &options.blur),
            Self::Pixelate(blur) => blur.render(ctx, source, options),
            Self::Temporal(blur) => blur.render(ctx, source, &options.temporal),
        }
    }

    /// Forget accumulated history so the next frame starts fresh.
    pub fn reset(&mut self) {
        if let Self::Temporal(blur) = self {
            blur.reset();
        }
    }

    /// Release every program and texture.
    pub fn destroy(self, gfx: &mut GraphicsScope<'_>) {
        match self {
            Self::None => {}
            Self::Gaussian(blur) => blur.destroy(gfx),
            Self::Box(blur) => blur.destroy(gfx),
            Self::DualKawase(blur) => blur.destroy(gfx),
            Self::Pixelate(blur) => blur.destroy(gfx),
            Self::Temporal(blur) => blur.destroy(gfx),
        }
    }
}

/// Per-pixel step along `angle` degrees, clockwise on screen.
fn direction(angle: f32, texel: Vec2) -> Vec2 {
    let rads = (-angle).to_radians();
    Vec2::new(rads.cos(), rads.sin()) * texel
}

/// Tilt-shift focus line parameters shared by the Box and Gaussian
/// programs.
#[derive(Debug, Clone, Copy)]
struct FocusBinding {
    uv_size: Option<Param<Vec2>>,
    center: Option<Param<f32>>,
    width: Option<Param<f32>>,
    angle: Option<Param<f32>>,
}

impl FocusBinding {
    fn resolve(effect: &Effect) -> Self {
        Self {
            uv_size: effect.param("uv_size"),
            center: effect.param("focus_center"),
            width: effect.param("focus_width"),
            angle: effect.param("focus_angle"),
        }
    }

    /// Focus center counts from the top in uv space; the setting counts from
    /// the bottom.
    fn apply(self, effect: &mut Effect, blur: &BlurOptions, uv_size: Vec2) {
        effect.set(self.uv_size, uv_size);
        effect.set(self.center, 1.0 - blur.tilt_shift_center);
        effect.set(self.width, blur.tilt_shift_width / 2.0);
        effect.set(self.angle, blur.tilt_shift_angle.to_radians());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_follows_angle() {
        let texel = Vec2::new(0.5, 0.25);
        let d = direction(0.0, texel);
        assert!((d - Vec2::new(0.5, 0.0)).length() < 1e-6);
        let d = direction(90.0, texel);
        assert!((d - Vec2::new(0.0, -0.25)).length() < 1e-6);
    }
}
