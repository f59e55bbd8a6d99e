//! Exponential accumulation across frames.
//!
//! The accumulator lives in [`Slot::Prior`] and survives between frames. The
//! first frame after a reset only captures the input.

use crate::error::BlurError;
use crate::gpu::backend::{GraphicsScope, TextureId};
use crate::gpu::effect::{Effect, Param};
use crate::gpu::render_target::Slot;
use crate::gpu::shader_loader::ShaderLoader;
use crate::options::TemporalOptions;
use crate::renderer::PassContext;

#[derive(Debug)]
struct TemporalProgram {
    effect: Effect,
    image: Option<Param<TextureId>>,
    prior_image: Option<Param<TextureId>>,
    current_weight: Option<Param<f32>>,
    clear_threshold: Option<Param<f32>>,
}

/// Temporal renderer.
#[derive(Debug)]
pub struct TemporalBlur {
    program: Option<TemporalProgram>,
    primed: bool,
}

impl TemporalBlur {
    /// Load the `temporal` program with an empty accumulator.
    pub fn load(gfx: &mut GraphicsScope<'_>, loader: &ShaderLoader) -> Self {
        let program = Effect::load(gfx, loader, "temporal").map(|effect| TemporalProgram {
            image: effect.param("image"),
            prior_image: effect.param("prior_image"),
            current_weight: effect.param("current_weight"),
            clear_threshold: effect.param("clear_threshold"),
            effect,
        });
        Self {
            program,
            primed: false,
        }
    }

    /// Whether the accumulator holds a previous frame.
    #[must_use]
    pub const fn is_primed(&self) -> bool {
        self.primed
    }

    /// Drop the accumulated history.
    pub fn reset(&mut self) {
        self.primed = false;
    }

    /// Blend `source` into the accumulator and copy the result to the output.
    ///
    /// # Errors
    ///
    /// Propagates allocation and draw failures.
    pub fn render(
        &mut self,
        ctx: &mut PassContext<'_, '_>,
        source: TextureId,
        temporal: &TemporalOptions,
    ) -> Result<(), BlurError> {
        let Some(program) = self.program.as_mut() else {
            return ctx.pass_through(source);
        };
        let prior = match ctx.pool.get(Slot::Prior) {
            Some(prior) if self.primed => prior,
            _ => {
                let _ = ctx.copy(source, Slot::Prior)?;
                self.primed = true;
                return ctx.pass_through(source);
            }
        };
        program.effect.set(program.image, source);
        program.effect.set(program.prior_image, prior);
        program.effect.set(program.current_weight, temporal.current_weight);
        program.effect.set(program.clear_threshold, temporal.clear_threshold);
        let _ = ctx.draw(&program.effect, Slot::Accum, ctx.width, ctx.height)?;
        ctx.pool.swap(Slot::Accum, Slot::Prior);
        let blended = ctx
            .pool
            .get(Slot::Prior)
            .ok_or_else(|| BlurError::InvalidDraw("temporal accumulator missing".to_owned()))?;
        let _ = ctx.copy(blended, Slot::Output)?;
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
    use crate::gpu::backend::TextureFormat;
    use crate::gpu::cpu::CpuBackend;
    use crate::gpu::render_target::RenderTargetPool;
    use crate::renderer::test_support::{common, solid};
    use crate::renderer::CommonPrograms;

    struct Harness {
        backend: CpuBackend,
        pool: RenderTargetPool,
        common: CommonPrograms,
        blur: TemporalBlur,
    }

    impl Harness {
        fn new() -> Self {
            let mut backend = CpuBackend::new();
            let (common, blur) = {
                let mut gfx = GraphicsScope::enter(&mut backend).unwrap();
                let common = common(&mut gfx);
                let blur = TemporalBlur::load(&mut gfx, &ShaderLoader::embedded());
                (common, blur)
            };
            Self {
                backend,
                pool: RenderTargetPool::new(TextureFormat::Rgba16Float),
                common,
                blur,
            }
        }

        /// Render one 4x4 frame of `color`; returns the output's first texel.
        fn frame(&mut self, color: Vec4, options: &TemporalOptions) -> Vec4 {
            let source = solid(&mut self.backend, 4, 4, color);
            let out = {
                let mut gfx = GraphicsScope::enter(&mut self.backend).unwrap();
                let mut ctx = PassContext {
                    gfx: &mut gfx,
                    pool: &mut self.pool,
                    common: &mut self.common,
                    width: 4,
                    height: 4,
                    time: 0.0,
                    transition: None,
                };
                self.blur.render(&mut ctx, source, options).unwrap();
                self.pool.get(Slot::Output).unwrap()
            };
            self.backend.image(out).unwrap().texels()[0]
        }
    }

    #[test]
    fn first_frame_passes_through_then_blends() {
        let mut h = Harness::new();
        let options = TemporalOptions {
            current_weight: 0.05,
            clear_threshold: 1.0,
        };
        let black = Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_eq!(h.frame(black, &options), black);
        assert!(h.blur.is_primed());

        let second = h.frame(Vec4::ONE, &options);
        assert!((second.x - 0.05).abs() < 1e-5);
        assert!((second.w - 1.0).abs() < 1e-5);

        let third = h.frame(Vec4::ONE, &options);
        assert!((third.x - (0.05 + 0.95 * 0.05)).abs() < 1e-5);
    }

    #[test]
    fn large_change_clears_history() {
        let mut h = Harness::new();
        let options = TemporalOptions {
            current_weight: 0.05,
            clear_threshold: 0.5,
        };
        let _ = h.frame(Vec4::new(0.0, 0.0, 0.0, 1.0), &options);
        assert_eq!(h.frame(Vec4::ONE, &options), Vec4::ONE);
    }

    #[test]
    fn reset_recaptures() {
        let mut h = Harness::new();
        let options = TemporalOptions::default();
        let _ = h.frame(Vec4::ZERO, &options);
        h.blur.reset();
        assert_eq!(h.frame(Vec4::ONE, &options), Vec4::ONE);
    }
}
