//! Stages around the blur: compositing the input over a background source,
//! and masking the blurred result back against the original input.
//!
//! Mask geometry is given in percent of the frame by the options and
//! converted here into the uv-space values the mask programs expect.

use glam::{Vec2, Vec4};

use super::PassContext;
use crate::error::BlurError;
use crate::gpu::backend::{GraphicsScope, TextureId};
use crate::gpu::effect::{Effect, Param};
use crate::gpu::render_target::Slot;
use crate::gpu::shader_loader::ShaderLoader;
use crate::options::{CircleMask, CropMask, MaskOptions, MaskType};

/// Uniform values of the rounded-box mask.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropGeometry {
    /// Maps the box to `[0, 1]` per axis.
    pub scale: Vec2,
    /// Top-left corner of the box in uv; -1000 on a collapsed axis.
    pub offset: Vec2,
    /// Box size relative to the shorter frame side.
    pub box_aspect_ratio: Vec2,
    /// Corner radius in the same units as `box_aspect_ratio`.
    pub corner_radius: f32,
    /// Edge softness.
    pub feathering: f32,
    /// Blur outside the box.
    pub invert: bool,
}

impl CropGeometry {
    /// Geometry of `crop` on a `width x height` frame.
    #[must_use]
    pub fn new(crop: &CropMask, width: u32, height: u32) -> Self {
        let (left, right) = (crop.left / 100.0, crop.right / 100.0);
        let (top, bottom) = (crop.top / 100.0, crop.bottom / 100.0);
        let span = Vec2::new(1.0 - right - left, 1.0 - bottom - top);
        let frame = Vec2::new(width.max(1) as f32, height.max(1) as f32);
        let box_aspect_ratio = span * frame / frame.min_element();
        let offset = Vec2::new(
            if span.x > 0.0 { left } else { -1000.0 },
            if span.y > 0.0 { top } else { -1000.0 },
        );
        Self {
            scale: Vec2::ONE / span.max(Vec2::splat(1e-6)),
            offset,
            box_aspect_ratio,
            corner_radius: crop.corner_radius / 100.0 * box_aspect_ratio.min_element(),
            feathering: crop.feathering / 100.0,
            invert: crop.invert,
        }
    }
}

/// Uniform values of the disc mask.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleGeometry {
    /// Center in uv.
    pub center: Vec2,
    /// Radius relative to the shorter frame side.
    pub radius: f32,
    /// Edge softness.
    pub feathering: f32,
    /// Stretches uv so distances are isotropic.
    pub uv_scale: Vec2,
    /// Blur outside the disc.
    pub invert: bool,
}

impl CircleGeometry {
    /// Geometry of `circle` on a `width x height` frame.
    #[must_use]
    pub fn new(circle: &CircleMask, width: u32, height: u32) -> Self {
        let frame = Vec2::new(width.max(1) as f32, height.max(1) as f32);
        Self {
            center: Vec2::new(circle.center_x, circle.center_y) / 100.0,
            radius: circle.radius / 100.0,
            feathering: circle.feathering / 100.0,
            uv_scale: frame / frame.min_element(),
            invert: circle.invert,
        }
    }
}

#[derive(Debug)]
struct CompositeProgram {
    effect: Effect,
    image: Option<Param<TextureId>>,
    background: Option<Param<TextureId>>,
}

/// Handles of whichever mask program is loaded; parameters the program does
/// not declare stay unresolved.
#[derive(Debug)]
struct MaskProgram {
    effect: Effect,
    image: Option<Param<TextureId>>,
    filtered_image: Option<Param<TextureId>>,
    inv: Option<Param<bool>>,
    feathering: Option<Param<f32>>,
    scale: Option<Param<Vec2>>,
    offset: Option<Param<Vec2>>,
    box_aspect_ratio: Option<Param<Vec2>>,
    corner_radius: Option<Param<f32>>,
    alpha_source: Option<Param<TextureId>>,
    rgba_weights: Option<Param<Vec4>>,
    multiplier: Option<Param<f32>>,
    center: Option<Param<Vec2>>,
    circle_radius: Option<Param<f32>>,
    uv_scale: Option<Param<Vec2>>,
}

impl MaskProgram {
    fn load(gfx: &mut GraphicsScope<'_>, loader: &ShaderLoader, name: &str) -> Option<Self> {
        let effect = Effect::load(gfx, loader, name)?;
        Some(Self {
            image: effect.param("image"),
            filtered_image: effect.param("filtered_image"),
            inv: effect.param("inv"),
            feathering: effect.param("feathering"),
            scale: effect.param("scale"),
            offset: effect.param("offset"),
            box_aspect_ratio: effect.param("box_aspect_ratio"),
            corner_radius: effect.param("corner_radius"),
            alpha_source: effect.param("alpha_source"),
            rgba_weights: effect.param("rgba_weights"),
            multiplier: effect.param("multiplier"),
            center: effect.param("center"),
            circle_radius: effect.param("circle_radius"),
            uv_scale: effect.param("uv_scale"),
            effect,
        })
    }

    fn set_crop(&mut self, geometry: &CropGeometry) {
        self.effect.set(self.scale, geometry.scale);
        self.effect.set(self.offset, geometry.offset);
        self.effect.set(self.box_aspect_ratio, geometry.box_aspect_ratio);
        self.effect.set(self.corner_radius, geometry.corner_radius);
        self.effect.set(self.feathering, geometry.feathering);
        self.effect.set(self.inv, geometry.invert);
    }

    fn set_circle(&mut self, geometry: &CircleGeometry) {
        self.effect.set(self.center, geometry.center);
        self.effect.set(self.circle_radius, geometry.radius);
        self.effect.set(self.feathering, geometry.feathering);
        self.effect.set(self.uv_scale, geometry.uv_scale);
        self.effect.set(self.inv, geometry.invert);
    }
}

/// Background composite and mask programs of one filter instance.
#[derive(Debug)]
pub struct Compositor {
    composite: Option<CompositeProgram>,
    mask_type: MaskType,
    mask: Option<MaskProgram>,
}

impl Compositor {
    /// Load the composite program and the program for `mask_type`.
    pub fn load(gfx: &mut GraphicsScope<'_>, loader: &ShaderLoader, mask_type: MaskType) -> Self {
        let composite = Effect::load(gfx, loader, "composite").map(|effect| CompositeProgram {
            image: effect.param("image"),
            background: effect.param("background"),
            effect,
        });
        let mask = mask_type
            .program()
            .and_then(|name| MaskProgram::load(gfx, loader, name));
        Self {
            composite,
            mask_type,
            mask,
        }
    }

    /// Mask this compositor was loaded for.
    #[must_use]
    pub const fn mask_type(&self) -> MaskType {
        self.mask_type
    }

    /// Swap in the program for a different mask type.
    pub fn reload_mask(
        &mut self,
        gfx: &mut GraphicsScope<'_>,
        loader: &ShaderLoader,
        mask_type: MaskType,
    ) {
        if let Some(old) = self.mask.take() {
            old.effect.destroy(gfx);
        }
        self.mask_type = mask_type;
        self.mask = mask_type
            .program()
            .and_then(|name| MaskProgram::load(gfx, loader, name));
        log::debug!("mask program reloaded for {mask_type:?}");
    }

    /// Composite `input` over `background` into [`Slot::Composite`] and
    /// return the texture the blur should read. Without a background, or
    /// without the composite program, `input` is returned unchanged.
    ///
    /// # Errors
    ///
    /// Propagates allocation and draw failures.
    pub fn composite_background(
        &mut self,
        ctx: &mut PassContext<'_, '_>,
        input: TextureId,
        background: Option<TextureId>,
    ) -> Result<TextureId, BlurError> {
        let (Some(background), Some(program)) = (background, self.composite.as_mut()) else {
            return Ok(input);
        };
        program.effect.set(program.image, input);
        program.effect.set(program.background, background);
        ctx.draw(&program.effect, Slot::Composite, ctx.width, ctx.height)
    }

    /// Blend the blurred output back toward `original` outside the mask.
    ///
    /// The mask shape reads `mask_source` for source and image masks; a
    /// source mask with no texture this frame leaves the output unmasked.
    ///
    /// # Errors
    ///
    /// Propagates allocation and draw failures.
    pub fn apply_mask(
        &mut self,
        ctx: &mut PassContext<'_, '_>,
        original: TextureId,
        options: &MaskOptions,
        mask_source: Option<TextureId>,
    ) -> Result<(), BlurError> {
        let Some(program) = self.mask.as_mut() else {
            return Ok(());
        };
        let (width, height) = (ctx.width, ctx.height);
        match self.mask_type {
            MaskType::None => return Ok(()),
            MaskType::Crop => program.set_crop(&CropGeometry::new(&options.crop, width, height)),
            MaskType::Rect => {
                program.set_crop(&CropGeometry::new(&options.rect.to_crop(), width, height));
            }
            MaskType::Circle => {
                program.set_circle(&CircleGeometry::new(&options.circle, width, height));
            }
            MaskType::Source | MaskType::Image => {
                match (self.mask_type, mask_source) {
                    (_, Some(texture)) => program.effect.set(program.alpha_source, texture),
                    (MaskType::Source, None) => return Ok(()),
                    // Unreadable image file: the program samples a transparent texel.
                    _ => program.effect.unset(program.alpha_source),
                }
                let source = &options.source;
                program
                    .effect
                    .set(program.rgba_weights, Vec4::from(source.weights()));
                program.effect.set(program.multiplier, source.multiplier);
                program.effect.set(program.inv, source.invert);
            }
        }

        ctx.pool.swap(Slot::Output, Slot::Render);
        let filtered = ctx
            .pool
            .get(Slot::Render)
            .ok_or_else(|| BlurError::InvalidDraw("blurred output missing".to_owned()))?;
        program.effect.set(program.image, original);
        program.effect.set(program.filtered_image, filtered);
        let _ = ctx.draw(&program.effect, Slot::Output, width, height)?;
        Ok(())
    }

    /// Release every program.
    pub fn destroy(self, gfx: &mut GraphicsScope<'_>) {
        if let Some(composite) = self.composite {
            composite.effect.destroy(gfx);
        }
        if let Some(mask) = self.mask {
            mask.effect.destroy(gfx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::backend::TextureFormat;
    use crate::gpu::cpu::CpuBackend;
    use crate::gpu::render_target::RenderTargetPool;
    use crate::renderer::test_support::{common, solid};
    use crate::renderer::CommonPrograms;

    const RED: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);
    const BLUE: Vec4 = Vec4::new(0.0, 0.0, 1.0, 1.0);

    /// Runs the mask stage over a blue "blurred" output and a red original.
    fn masked(
        options: &MaskOptions,
        width: u32,
        height: u32,
        mask_color: Option<Vec4>,
    ) -> (CpuBackend, TextureId) {
        let mut backend = CpuBackend::new();
        let original = solid(&mut backend, width, height, RED);
        let blurred = solid(&mut backend, width, height, BLUE);
        let mask_source = mask_color.map(|c| solid(&mut backend, width, height, c));
        let mut pool = RenderTargetPool::new(TextureFormat::Rgba16Float);
        let out = {
            let mut gfx = GraphicsScope::enter(&mut backend).unwrap();
            let mut shared = common(&mut gfx);
            let mut compositor =
                Compositor::load(&mut gfx, &ShaderLoader::embedded(), options.mask_type);
            let mut ctx = PassContext {
                gfx: &mut gfx,
                pool: &mut pool,
                common: &mut shared,
                width,
                height,
                time: 0.0,
                transition: None,
            };
            let _ = ctx.copy(blurred, Slot::Output).unwrap();
            compositor
                .apply_mask(&mut ctx, original, options, mask_source)
                .unwrap();
            pool.get(Slot::Output).unwrap()
        };
        (backend, out)
    }

    #[test]
    fn crop_geometry_matches_margins() {
        let crop = CropMask {
            left: 10.0,
            right: 30.0,
            top: 25.0,
            bottom: 25.0,
            corner_radius: 50.0,
            ..CropMask::default()
        };
        let g = CropGeometry::new(&crop, 200, 100);
        assert!((g.scale - Vec2::new(1.0 / 0.6, 2.0)).length() < 1e-5);
        assert!((g.offset - Vec2::new(0.1, 0.25)).length() < 1e-6);
        assert!((g.box_aspect_ratio - Vec2::new(1.2, 0.5)).length() < 1e-5);
        assert!((g.corner_radius - 0.25).abs() < 1e-6);

        let collapsed = CropMask {
            left: 70.0,
            right: 40.0,
            ..CropMask::default()
        };
        let g = CropGeometry::new(&collapsed, 100, 100);
        assert_eq!(g.offset.x, -1000.0);
        assert!(g.scale.x > 1e5);
    }

    #[test]
    fn circle_geometry_is_isotropic() {
        let g = CircleGeometry::new(&CircleMask::default(), 1920, 1080);
        assert!((g.uv_scale - Vec2::new(1920.0 / 1080.0, 1.0)).length() < 1e-6);
        assert!((g.center - Vec2::splat(0.5)).length() < 1e-6);
        assert!((g.radius - 0.4).abs() < 1e-6);
    }

    #[test]
    fn crop_keeps_blur_inside_the_box() {
        let options = MaskOptions {
            mask_type: MaskType::Crop,
            ..MaskOptions::default()
        };
        let (backend, out) = masked(&options, 10, 10, None);
        let image = backend.image(out).unwrap();
        assert_eq!(image.texel(5, 5), BLUE);
        assert_eq!(image.texel(0, 0), RED);
    }

    #[test]
    fn inverted_circle_blurs_outside() {
        let mut options = MaskOptions {
            mask_type: MaskType::Circle,
            ..MaskOptions::default()
        };
        options.circle.invert = true;
        let (backend, out) = masked(&options, 20, 10, None);
        let image = backend.image(out).unwrap();
        assert_eq!(image.texel(10, 5), RED);
        assert_eq!(image.texel(0, 0), BLUE);
    }

    #[test]
    fn source_mask_weights_coverage() {
        let options = MaskOptions {
            mask_type: MaskType::Source,
            ..MaskOptions::default()
        };
        // Alpha filter: half-transparent mask gives an even blend.
        let (backend, out) = masked(&options, 4, 4, Some(Vec4::new(0.0, 0.0, 0.0, 0.5)));
        let texel = backend.image(out).unwrap().texel(1, 1);
        assert!((texel - Vec4::new(0.5, 0.0, 0.5, 1.0)).abs().max_element() < 1e-5);

        // No source this frame: the blurred output is left alone.
        let (backend, out) = masked(&options, 4, 4, None);
        assert_eq!(backend.image(out).unwrap().texel(1, 1), BLUE);
    }

    #[test]
    fn background_shows_through_transparency() {
        let mut backend = CpuBackend::new();
        let input = solid(&mut backend, 4, 4, Vec4::new(0.5, 0.0, 0.0, 0.5));
        let background = solid(&mut backend, 4, 4, BLUE);
        let mut pool = RenderTargetPool::new(TextureFormat::Rgba16Float);
        let mut shared = CommonPrograms::default();
        let out = {
            let mut gfx = GraphicsScope::enter(&mut backend).unwrap();
            let mut compositor =
                Compositor::load(&mut gfx, &ShaderLoader::embedded(), MaskType::None);
            let mut ctx = PassContext {
                gfx: &mut gfx,
                pool: &mut pool,
                common: &mut shared,
                width: 4,
                height: 4,
                time: 0.0,
                transition: None,
            };
            assert_eq!(
                compositor.composite_background(&mut ctx, input, None).unwrap(),
                input
            );
            compositor
                .composite_background(&mut ctx, input, Some(background))
                .unwrap()
        };
        let texel = backend.image(out).unwrap().texel(0, 0);
        assert!((texel - Vec4::new(0.5, 0.0, 0.5, 1.0)).abs().max_element() < 1e-5);
    }
}
