//! Gaussian convolution over the compressed kernel.
//!
//! Area and tilt-shift are separable: a horizontal pass into a scratch target
//! then a vertical pass into the output. Directional and motion blurs run one
//! pass along the angle, zoom one pass whose direction the program derives
//! per texel from the center point. The vector sub-type delegates to
//! [`VectorBlur`].

use glam::Vec2;

use super::{direction, FocusBinding, VectorBlur, MIN_RADIUS};
use crate::error::BlurError;
use crate::gpu::backend::{GraphicsScope, KernelEncoding, TextureFormat, TextureId};
use crate::gpu::effect::{Effect, Param};
use crate::gpu::render_target::Slot;
use crate::gpu::shader_loader::ShaderLoader;
use crate::kernel::{Kernel, KERNEL_CAPACITY};
use crate::options::{BlurType, FilterOptions};
use crate::renderer::PassContext;

/// The compressed kernel plus its texture upload, rebuilt when the radius
/// changes.
#[derive(Debug, Default)]
pub(crate) struct KernelUpload {
    kernel: Kernel,
    texture: Option<TextureId>,
    use_texture: bool,
}

impl KernelUpload {
    /// Rebuild for `radius` if it changed and upload the texture encoding
    /// when the backend prefers it.
    pub(crate) fn prepare(
        &mut self,
        gfx: &mut GraphicsScope<'_>,
        radius: f32,
    ) -> Result<(), BlurError> {
        if self.kernel.radius().to_bits() != radius.to_bits() {
            self.kernel = Kernel::new(radius);
            if let Some(texture) = self.texture.take() {
                gfx.destroy_texture(texture);
            }
            log::debug!(
                "gaussian kernel rebuilt: radius {radius}, {} taps",
                self.kernel.size()
            );
        }
        self.use_texture = gfx.caps().kernel_encoding == KernelEncoding::Texture;
        if self.use_texture && self.texture.is_none() {
            let texels = self.kernel.texels();
            self.texture = Some(gfx.create_texture(
                KERNEL_CAPACITY as u32,
                1,
                TextureFormat::Rgba16Float,
                &texels,
            )?);
        }
        Ok(())
    }

    pub(crate) fn destroy(&mut self, gfx: &mut GraphicsScope<'_>) {
        if let Some(texture) = self.texture.take() {
            gfx.destroy_texture(texture);
        }
    }
}

/// Kernel parameters common to every kernel-driven program.
#[derive(Debug, Clone, Copy)]
pub(crate) struct KernelBinding {
    weight: Option<Param<[f32; KERNEL_CAPACITY]>>,
    offset: Option<Param<[f32; KERNEL_CAPACITY]>>,
    kernel_size: Option<Param<i32>>,
    kernel_texture: Option<Param<TextureId>>,
    use_kernel_texture: Option<Param<bool>>,
}

impl KernelBinding {
    pub(crate) fn resolve(effect: &Effect) -> Self {
        Self {
            weight: effect.param("weight"),
            offset: effect.param("offset"),
            kernel_size: effect.param("kernel_size"),
            kernel_texture: effect.param("kernel_texture"),
            use_kernel_texture: effect.param("use_kernel_texture"),
        }
    }

    pub(crate) fn apply(self, effect: &mut Effect, upload: &KernelUpload) {
        let kernel = &upload.kernel;
        effect.set(self.kernel_size, kernel.size() as i32);
        match upload.texture.filter(|_| upload.use_texture) {
            Some(texture) => {
                effect.set(self.kernel_texture, texture);
                effect.set(self.use_kernel_texture, true);
            }
            None => {
                effect.set(self.weight, *kernel.weights());
                effect.set(self.offset, *kernel.offsets());
                effect.set(self.use_kernel_texture, false);
            }
        }
    }
}

/// Loaded Gaussian program with resolved handles.
#[derive(Debug)]
struct GaussianProgram {
    effect: Effect,
    image: Option<Param<TextureId>>,
    kernel: KernelBinding,
    texel_step: Option<Param<Vec2>>,
    radial_center: Option<Param<Vec2>>,
    radial_uv_size: Option<Param<Vec2>>,
    focus: FocusBinding,
}

impl GaussianProgram {
    fn load(gfx: &mut GraphicsScope<'_>, loader: &ShaderLoader, name: &str) -> Option<Self> {
        let effect = Effect::load(gfx, loader, name)?;
        Some(Self {
            image: effect.param("image"),
            kernel: KernelBinding::resolve(&effect),
            texel_step: effect.param("texel_step"),
            radial_center: effect.param("radial_center"),
            radial_uv_size: effect.param("uv_size"),
            focus: FocusBinding::resolve(&effect),
            effect,
        })
    }
}

/// Gaussian shape actually rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Area,
    Directional,
    Zoom,
    Motion,
    TiltShift,
}

/// Gaussian family renderer.
#[derive(Debug)]
pub struct GaussianBlur {
    shape: Shape,
    program: Option<GaussianProgram>,
    vector: Option<VectorBlur>,
    kernel: KernelUpload,
}

impl GaussianBlur {
    /// Load the program for `blur_type`. An unset sub-type renders as area.
    pub fn load(
        gfx: &mut GraphicsScope<'_>,
        loader: &ShaderLoader,
        blur_type: BlurType,
    ) -> Self {
        let shape = match blur_type {
            BlurType::None | BlurType::Area | BlurType::Vector => Shape::Area,
            BlurType::Directional => Shape::Directional,
            BlurType::Zoom => Shape::Zoom,
            BlurType::Motion => Shape::Motion,
            BlurType::TiltShift => Shape::TiltShift,
        };
        let (program, vector) = if blur_type == BlurType::Vector {
            (None, Some(VectorBlur::load(gfx, loader)))
        } else {
            let name = match shape {
                Shape::Area | Shape::Directional => "gaussian_1d",
                Shape::Zoom => "gaussian_radial",
                Shape::Motion => "gaussian_motion",
                Shape::TiltShift => "gaussian_tiltshift",
            };
            (GaussianProgram::load(gfx, loader, name), None)
        };
        Self {
            shape,
            program,
            vector,
            kernel: KernelUpload::default(),
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
        let blur = &options.blur;
        if blur.radius < MIN_RADIUS {
            return ctx.pass_through(source);
        }
        if let Some(vector) = self.vector.as_mut() {
            return vector.render(ctx, source, options, &mut self.kernel);
        }
        let Some(program) = self.program.as_mut() else {
            return ctx.pass_through(source);
        };
        self.kernel.prepare(ctx.gfx, blur.radius)?;
        program.kernel.apply(&mut program.effect, &self.kernel);
        program.effect.set(program.image, source);

        let texel = ctx.texel();
        match self.shape {
            Shape::Area | Shape::TiltShift => {
                if self.shape == Shape::TiltShift {
                    program.focus.apply(&mut program.effect, blur, ctx.uv_size());
                }
                program.effect.set(program.texel_step, Vec2::new(texel.x, 0.0));
                let first =
                    ctx.draw(&program.effect, Slot::Render2, ctx.width, ctx.height)?;
                program.effect.set(program.image, first);
                program.effect.set(program.texel_step, Vec2::new(0.0, texel.y));
            }
            Shape::Directional | Shape::Motion => {
                program
                    .effect
                    .set(program.texel_step, direction(blur.angle, texel));
            }
            Shape::Zoom => {
                program.effect.set(program.radial_uv_size, ctx.uv_size());
                program
                    .effect
                    .set(program.radial_center, Vec2::from(blur.center));
            }
        }
        let _ = ctx.draw_to_output(&program.effect)?;
        Ok(())
    }

    /// Release programs and the kernel texture.
    pub fn destroy(mut self, gfx: &mut GraphicsScope<'_>) {
        self.kernel.destroy(gfx);
        if let Some(program) = self.program {
            program.effect.destroy(gfx);
        }
        if let Some(vector) = self.vector {
            vector.destroy(gfx);
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec4;

    use super::*;
    use crate::gpu::backend::GraphicsBackend;
    use crate::gpu::cpu::CpuBackend;
    use crate::gpu::render_target::RenderTargetPool;
    use crate::options::BlurAlgorithm;
    use crate::renderer::test_support::{common, gradient_image, max_difference, solid};

    fn options(blur_type: BlurType, radius: f32) -> FilterOptions {
        let mut options = FilterOptions::default();
        options.blur.algorithm = BlurAlgorithm::Gaussian;
        options.blur.blur_type = blur_type;
        options.blur.radius = radius;
        options
    }

    fn run(backend: &mut CpuBackend, source: TextureId, options: &FilterOptions) -> TextureId {
        let (w, h) = backend.texture_size(source).unwrap();
        let mut pool = RenderTargetPool::new(TextureFormat::Rgba16Float);
        let mut gfx = GraphicsScope::enter(backend).unwrap();
        let mut shared = common(&mut gfx);
        let mut blur =
            GaussianBlur::load(&mut gfx, &ShaderLoader::embedded(), options.blur.blur_type);
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
    fn area_keeps_size_and_flat_color() {
        let mut backend = CpuBackend::new();
        let color = Vec4::new(0.3, 0.6, 0.9, 1.0);
        let source = solid(&mut backend, 24, 16, color);
        let before = backend.draw_count();
        let out = run(&mut backend, source, &options(BlurType::Area, 10.0));
        // copy/mix loading draws nothing; area is exactly two passes
        assert_eq!(backend.draw_count() - before, 2);
        let image = backend.image(out).unwrap();
        assert_eq!((image.width(), image.height()), (24, 16));
        assert!(image.texels().iter().all(|t| (*t - color).abs().max_element() < 2e-3));
    }

    #[test]
    fn tiny_radius_passes_through() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(8, 8));
        let out = run(&mut backend, source, &options(BlurType::Area, 0.001));
        let diff = max_difference(backend.image(out).unwrap(), backend.image(source).unwrap());
        assert!(diff < 1e-3);
    }

    #[test]
    fn directional_blur_only_smooths_along_its_axis() {
        let mut backend = CpuBackend::new();
        // Red varies along x only; a vertical blur leaves it unchanged.
        let source = backend.upload(gradient_image(16, 16));
        let mut opts = options(BlurType::Directional, 3.0);
        opts.blur.angle = 90.0;
        let out = run(&mut backend, source, &opts);
        let src = backend.image(source).unwrap();
        let dst = backend.image(out).unwrap();
        for (a, b) in src.texels().iter().zip(dst.texels()) {
            assert!((a.x - b.x).abs() < 2e-3);
        }
    }

    #[test]
    fn texture_encoding_matches_uniform_arrays() {
        let opts = options(BlurType::Area, 2.0);
        let mut arrays = CpuBackend::new();
        let a = arrays.upload(gradient_image(16, 8));
        let out_a = run(&mut arrays, a, &opts);

        let mut textured = CpuBackend::with_kernel_encoding(KernelEncoding::Texture);
        let b = textured.upload(gradient_image(16, 8));
        let out_b = run(&mut textured, b, &opts);

        let diff = max_difference(arrays.image(out_a).unwrap(), textured.image(out_b).unwrap());
        assert!(diff < 5e-3, "encodings differ by {diff}");
    }

    #[test]
    fn every_shape_renders_at_frame_size() {
        for blur_type in [
            BlurType::Area,
            BlurType::Directional,
            BlurType::Zoom,
            BlurType::Motion,
            BlurType::TiltShift,
            BlurType::Vector,
        ] {
            let mut backend = CpuBackend::new();
            let source = backend.upload(gradient_image(12, 10));
            let mut opts = options(blur_type, 4.0);
            opts.blur.center = [6.0, 5.0];
            let out = run(&mut backend, source, &opts);
            assert_eq!(backend.texture_size(out), Some((12, 10)), "{blur_type:?}");
        }
    }
}
