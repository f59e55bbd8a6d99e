//! Fractional dual-Kawase pyramid.
//!
//! A strength `N` downsamples by 2, 4, 8 ... up to the largest power of two
//! `last <= N`, then upsamples back to the frame size. A remainder between
//! `last` and `next = 2 * last` adds one extra level whose upsampled result
//! is mixed with the `last` level by `(N - last) / (next - last)`, so the
//! strength animates continuously instead of jumping between levels.
//!
//! The pyramid is also the pre-smoothing stage of the pixelate and vector
//! renderers, which call [`PyramidBlur::render`] directly.

use glam::Vec2;

use crate::error::BlurError;
use crate::gpu::backend::{GraphicsScope, TextureId};
use crate::gpu::effect::{Effect, Param};
use crate::gpu::render_target::Slot;
use crate::gpu::shader_loader::ShaderLoader;
use crate::options::BlurOptions;
use crate::renderer::PassContext;

/// Strengths at or below this pass the input through.
pub const MIN_STRENGTH: f32 = 0.001;

/// Deepest divisor the pyramid visits.
const MAX_DIVISOR: u32 = 1 << 16;

/// The extra level blended in for a fractional strength.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Residual {
    /// Divisor of the extra level, twice the last integer level.
    pub divisor: u32,
    /// Weight of the extra level in the final mix.
    pub ratio: f32,
}

/// Levels visited for a given strength.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PyramidPlan {
    /// Largest power-of-two divisor `<= N`, or 1 when `N < 2`.
    pub last: u32,
    /// Fractional remainder, if any.
    pub residual: Option<Residual>,
}

impl PyramidPlan {
    /// Plan the pyramid for strength `n`. `None` means pass-through.
    ///
    /// `n <= 1` is the identity; between 1 and 2 the first level fades in
    /// with ratio `n - 1`.
    #[must_use]
    pub fn new(n: f32) -> Option<Self> {
        if n.is_nan() || n <= MIN_STRENGTH {
            return None;
        }
        let mut last = 1;
        while last < MAX_DIVISOR && (last * 2) as f32 <= n {
            last *= 2;
        }
        let next = last * 2;
        let ratio = (n - last as f32) / (next - last) as f32;
        let residual = (ratio > 1e-6 && last < MAX_DIVISOR).then_some(Residual {
            divisor: next,
            ratio: ratio.min(1.0),
        });
        if last == 1 && residual.is_none() {
            return None;
        }
        Some(Self { last, residual })
    }

    /// Integer downsample steps before the residual level.
    #[must_use]
    pub const fn depth(&self) -> u32 {
        self.last.trailing_zeros()
    }

    /// Total draws the plan costs: down and up per level, plus the residual
    /// down, up and mix.
    #[must_use]
    pub const fn draw_count(&self) -> u32 {
        let integer = self.depth() * 2;
        if self.residual.is_some() {
            integer + 3
        } else {
            integer
        }
    }
}

#[derive(Debug)]
struct SampleProgram {
    effect: Effect,
    image: Option<Param<TextureId>>,
    texel_step: Option<Param<Vec2>>,
}

impl SampleProgram {
    fn load(gfx: &mut GraphicsScope<'_>, loader: &ShaderLoader, name: &str) -> Option<Self> {
        Effect::load(gfx, loader, name).map(|effect| Self {
            image: effect.param("image"),
            texel_step: effect.param("texel_step"),
            effect,
        })
    }
}

/// Down/up sample programs plus the pyramid walk.
#[derive(Debug)]
pub struct PyramidBlur {
    down: Option<SampleProgram>,
    up: Option<SampleProgram>,
}

impl PyramidBlur {
    /// Load `dual_kawase_down` and `dual_kawase_up`.
    pub fn load(gfx: &mut GraphicsScope<'_>, loader: &ShaderLoader) -> Self {
        Self {
            down: SampleProgram::load(gfx, loader, "dual_kawase_down"),
            up: SampleProgram::load(gfx, loader, "dual_kawase_up"),
        }
    }

    /// Blur `source` with strength `n` and leave the frame-sized result in
    /// `out`. `source` may already live in `out`.
    ///
    /// # Errors
    ///
    /// Propagates allocation and draw failures, and
    /// [`BlurError::InvalidDraw`] when a residual needs the missing `mix`
    /// program.
    pub fn render(
        &mut self,
        ctx: &mut PassContext<'_, '_>,
        source: TextureId,
        n: f32,
        out: Slot,
    ) -> Result<(), BlurError> {
        let (Some(plan), Some(down), Some(up)) =
            (PyramidPlan::new(n), self.down.as_mut(), self.up.as_mut())
        else {
            return bypass(ctx, source, out);
        };
        let (width, height) = (ctx.width, ctx.height);
        let level = move |d: u32| ((width / d).max(1), (height / d).max(1));

        let mut current = source;
        let mut divisor = 2;
        while divisor <= plan.last {
            let size = level(divisor);
            down.effect.set(down.texel_step, texel_of(size));
            current = sample(ctx, down, current, size)?;
            divisor *= 2;
        }

        if let Some(residual) = plan.residual {
            let last_size = level(plan.last);
            let next_size = level(residual.divisor);
            down.effect.set(down.texel_step, texel_of(next_size));
            let deeper = sample(ctx, down, current, next_size)?;
            // Keep the last integer level alive while Render/Render2 rotate.
            let mut base_target = (plan.last > 1).then(|| ctx.pool.take(Slot::Render2));
            up.effect.set(up.texel_step, texel_of(next_size));
            let mixed = mix_residual(ctx, up, current, deeper, residual.ratio, last_size);
            if let Some(target) = base_target.as_mut() {
                target.release(ctx.gfx);
            }
            current = mixed?;
        }

        let mut divisor = plan.last;
        while divisor > 1 {
            let source_size = level(divisor);
            divisor /= 2;
            up.effect.set(up.texel_step, texel_of(source_size));
            current = sample(ctx, up, current, level(divisor))?;
        }

        ctx.pool.swap(Slot::Render, out);
        log::trace!("pyramid n={n} last={} residual={:?}", plan.last, plan.residual);
        Ok(())
    }

    /// Release both programs.
    pub fn destroy(self, gfx: &mut GraphicsScope<'_>) {
        for program in [self.down, self.up].into_iter().flatten() {
            program.effect.destroy(gfx);
        }
    }
}

fn texel_of((width, height): (u32, u32)) -> Vec2 {
    Vec2::ONE / Vec2::new(width as f32, height as f32)
}

/// Rotate the ping-pong pair and draw `input` through `program` into
/// [`Slot::Render`].
fn sample(
    ctx: &mut PassContext<'_, '_>,
    program: &mut SampleProgram,
    input: TextureId,
    (width, height): (u32, u32),
) -> Result<TextureId, BlurError> {
    ctx.pool.swap(Slot::Render, Slot::Render2);
    program.effect.set(program.image, input);
    ctx.draw(&program.effect, Slot::Render, width, height)
}

/// Upsample `deeper` to the last integer level and blend it over `base`.
fn mix_residual(
    ctx: &mut PassContext<'_, '_>,
    up: &mut SampleProgram,
    base: TextureId,
    deeper: TextureId,
    ratio: f32,
    size: (u32, u32),
) -> Result<TextureId, BlurError> {
    let residual = sample(ctx, up, deeper, size)?;
    ctx.pool.swap(Slot::Render, Slot::Render2);
    ctx.mix(base, residual, ratio, Slot::Render, size)
}

fn bypass(ctx: &mut PassContext<'_, '_>, source: TextureId, out: Slot) -> Result<(), BlurError> {
    if ctx.pool.get(out) == Some(source) {
        return Ok(());
    }
    let _ = ctx.copy(source, out)?;
    Ok(())
}

/// The `DualKawase` algorithm: the pyramid at `kawase_passes`.
#[derive(Debug)]
pub struct DualKawaseBlur {
    pyramid: PyramidBlur,
}

impl DualKawaseBlur {
    /// Load the pyramid programs.
    pub fn load(gfx: &mut GraphicsScope<'_>, loader: &ShaderLoader) -> Self {
        Self {
            pyramid: PyramidBlur::load(gfx, loader),
        }
    }

    /// Blur `source` into the output slot. During a transition the strength
    /// is interpolated toward the other configuration's value first.
    ///
    /// # Errors
    ///
    /// See [`PyramidBlur::render`].
    pub fn render(
        &mut self,
        ctx: &mut PassContext<'_, '_>,
        source: TextureId,
        blur: &BlurOptions,
    ) -> Result<(), BlurError> {
        let strength = ctx
            .transition
            .map_or(blur.kawase_passes, |t| t.interpolate(blur.kawase_passes));
        self.pyramid.render(ctx, source, strength, Slot::Output)
    }

    /// Release the programs.
    pub fn destroy(self, gfx: &mut GraphicsScope<'_>) {
        self.pyramid.destroy(gfx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::backend::{GraphicsBackend, TextureFormat};
    use crate::gpu::cpu::CpuBackend;
    use crate::gpu::render_target::RenderTargetPool;
    use crate::renderer::test_support::{common, gradient_image, max_difference};
    use crate::util::transition::TransitionContext;

    fn run(
        backend: &mut CpuBackend,
        source: TextureId,
        n: f32,
        transition: Option<TransitionContext>,
    ) -> TextureId {
        let (w, h) = backend.texture_size(source).unwrap();
        let mut pool = RenderTargetPool::new(TextureFormat::Rgba16Float);
        let mut gfx = GraphicsScope::enter(backend).unwrap();
        let mut shared = common(&mut gfx);
        let mut blur = DualKawaseBlur::load(&mut gfx, &ShaderLoader::embedded());
        let mut ctx = PassContext {
            gfx: &mut gfx,
            pool: &mut pool,
            common: &mut shared,
            width: w,
            height: h,
            time: 0.0,
            transition,
        };
        let options = BlurOptions {
            kawase_passes: n,
            ..BlurOptions::default()
        };
        blur.render(&mut ctx, source, &options).unwrap();
        pool.get(Slot::Output).unwrap()
    }

    #[test]
    fn plan_levels_and_ratio() {
        let plan = PyramidPlan::new(3.5).unwrap();
        assert_eq!(plan.last, 2);
        assert_eq!(plan.depth(), 1);
        assert_eq!(
            plan.residual,
            Some(Residual {
                divisor: 4,
                ratio: 0.75
            })
        );
        assert_eq!(plan.draw_count(), 5);

        let plan = PyramidPlan::new(4.0).unwrap();
        assert_eq!((plan.last, plan.residual), (4, None));
        assert_eq!(plan.draw_count(), 4);

        let ratio = PyramidPlan::new(7.99).unwrap().residual.unwrap().ratio;
        assert!((ratio - 0.9975).abs() < 1e-4);

        let onset = PyramidPlan::new(1.5).unwrap();
        assert_eq!(onset.last, 1);
        assert_eq!(onset.residual.unwrap().ratio, 0.5);
        assert_eq!(onset.draw_count(), 3);

        assert!(PyramidPlan::new(1.0).is_none());
        assert!(PyramidPlan::new(0.5).is_none());
        assert!(PyramidPlan::new(0.0).is_none());
        assert!(PyramidPlan::new(f32::NAN).is_none());
    }

    #[test]
    fn fractional_strength_costs_one_mix() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(16, 16));
        let before = backend.draw_count();
        let _ = run(&mut backend, source, 3.5, None);
        assert_eq!(backend.draw_count() - before, 5);
    }

    #[test]
    fn output_keeps_frame_size() {
        for n in [1.0, 2.0, 3.0, 4.0, 5.5, 16.0] {
            let mut backend = CpuBackend::new();
            let source = backend.upload(gradient_image(10, 6));
            let out = run(&mut backend, source, n, None);
            assert_eq!(backend.texture_size(out), Some((10, 6)), "n={n}");
        }
    }

    #[test]
    fn strength_is_continuous_at_levels() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(16, 16));
        for (a, b) in [(4.0, 4.001), (7.999, 8.0)] {
            let out_a = run(&mut backend, source, a, None);
            let image_a = backend.image(out_a).unwrap().clone();
            let out_b = run(&mut backend, source, b, None);
            let diff = max_difference(&image_a, backend.image(out_b).unwrap());
            assert!(diff < 1e-3, "{a} vs {b}: {diff}");
        }
    }

    #[test]
    fn zero_strength_is_identity() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(8, 8));
        let out = run(&mut backend, source, 0.0, None);
        assert_eq!(
            max_difference(backend.image(out).unwrap(), backend.image(source).unwrap()),
            0.0
        );
    }

    #[test]
    fn single_pass_is_identity() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(16, 16));
        let before = backend.draw_count();
        let out = run(&mut backend, source, 1.0, None);
        // Only the copy into the output slot.
        assert_eq!(backend.draw_count() - before, 1);
        assert_eq!(
            max_difference(backend.image(out).unwrap(), backend.image(source).unwrap()),
            0.0
        );
    }

    #[test]
    fn onset_is_continuous_into_the_first_level() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(16, 16));
        let out = run(&mut backend, source, 1.001, None);
        let near_identity =
            max_difference(backend.image(out).unwrap(), backend.image(source).unwrap());
        assert!(near_identity < 2e-3, "{near_identity}");

        let out_a = run(&mut backend, source, 1.999, None);
        let image_a = backend.image(out_a).unwrap().clone();
        let out_b = run(&mut backend, source, 2.0, None);
        let diff = max_difference(&image_a, backend.image(out_b).unwrap());
        assert!(diff < 2e-3, "{diff}");
    }

    #[test]
    fn transition_interpolates_strength() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(8, 8));
        // Halfway from 0 toward 8 is 4: two integer levels, no residual.
        let before = backend.draw_count();
        let _ = run(&mut backend, source, 0.0, Some(TransitionContext::new(8.0, 0.5)));
        assert_eq!(backend.draw_count() - before, 4);
    }
}
