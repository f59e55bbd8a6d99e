//! One composite-blur filter instance and its host-facing lifecycle.
//!
//! The host drives an instance through [`CompositeBlurFilter::create`],
//! [`update`](CompositeBlurFilter::update) on every settings change,
//! [`video_tick`](CompositeBlurFilter::video_tick) once per frame and
//! [`video_render`](CompositeBlurFilter::video_render) once per frame per
//! output, and finally [`destroy`](CompositeBlurFilter::destroy). Programs are
//! (re)loaded lazily inside the render's graphics scope whenever a selection
//! that decides them changes.

use crate::error::BlurError;
use crate::gpu::backend::{
    GraphicsBackend, GraphicsScope, TextureFormat, TextureId,
};
use crate::gpu::render_target::{RenderTargetPool, Slot};
use crate::gpu::shader_loader::ShaderLoader;
use crate::options::{FilterOptions, MaskType, ReloadKey, Settings};
use crate::renderer::blur::BlurRenderer;
use crate::renderer::composite::Compositor;
use crate::renderer::{CommonPrograms, PassContext};
use crate::util::transition::TransitionContext;

/// Textures the host lends to one render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInputs {
    /// The frame to blur, at the size given to the last tick.
    pub source: TextureId,
    /// Rendered background source, when one is configured.
    pub background: Option<TextureId>,
    /// Rendered mask source for [`MaskType::Source`].
    pub mask_source: Option<TextureId>,
}

impl FrameInputs {
    /// Inputs with only the source frame.
    #[must_use]
    pub const fn new(source: TextureId) -> Self {
        Self {
            source,
            background: None,
            mask_source: None,
        }
    }
}

/// What the host should show for this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutput {
    /// The filtered frame. Owned by the filter; valid until the next render.
    Texture(TextureId),
    /// Nothing was rendered; the host skips this frame.
    Skip,
}

impl FrameOutput {
    /// The rendered texture, if any.
    #[must_use]
    pub const fn texture(self) -> Option<TextureId> {
        match self {
            Self::Texture(texture) => Some(texture),
            Self::Skip => None,
        }
    }
}

/// Every program one configuration needs.
#[derive(Debug)]
struct Programs {
    common: CommonPrograms,
    blur: BlurRenderer,
    compositor: Compositor,
}

impl Programs {
    fn load(
        gfx: &mut GraphicsScope<'_>,
        loader: &ShaderLoader,
        options: &FilterOptions,
    ) -> Self {
        Self {
            common: CommonPrograms::load(gfx, loader),
            blur: BlurRenderer::load(gfx, loader, options),
            compositor: Compositor::load(gfx, loader, options.mask.mask_type),
        }
    }

    fn destroy(self, gfx: &mut GraphicsScope<'_>) {
        self.common.destroy(gfx);
        self.blur.destroy(gfx);
        self.compositor.destroy(gfx);
    }
}

/// Image file backing [`MaskType::Image`].
///
/// Decoding happens on update; the upload waits for the next graphics scope.
#[derive(Debug, Default)]
struct MaskImage {
    path: String,
    pending: Option<image::RgbaImage>,
    dirty: bool,
    texture: Option<TextureId>,
}

impl MaskImage {
    fn set_path(&mut self, path: &str) {
        path.clone_into(&mut self.path);
        self.pending = None;
        self.dirty = true;
        if path.is_empty() {
            return;
        }
        match image::open(path) {
            Ok(decoded) => {
                let decoded = decoded.to_rgba8();
                log::debug!(
                    "mask image {path}: {}x{}",
                    decoded.width(),
                    decoded.height()
                );
                if decoded.width() > 0 && decoded.height() > 0 {
                    self.pending = Some(decoded);
                }
            }
            Err(e) => log::warn!("unable to read mask image {path}: {e}"),
        }
    }

    fn upload(&mut self, gfx: &mut GraphicsScope<'_>) -> Result<(), BlurError> {
        if !self.dirty {
            return Ok(());
        }
        self.release(gfx);
        self.dirty = false;
        if let Some(decoded) = self.pending.take() {
            let texels: Vec<[f32; 4]> = decoded
                .pixels()
                .map(|p| p.0.map(|c| f32::from(c) / 255.0))
                .collect();
            self.texture = Some(gfx.create_texture(
                decoded.width(),
                decoded.height(),
                TextureFormat::Rgba8Unorm,
                &texels,
            )?);
        }
        Ok(())
    }

    fn release(&mut self, gfx: &mut GraphicsScope<'_>) {
        if let Some(texture) = self.texture.take() {
            gfx.destroy_texture(texture);
        }
    }
}

/// State of one filter instance.
#[derive(Debug)]
pub struct CompositeBlurFilter {
    options: FilterOptions,
    loader: ShaderLoader,
    width: u32,
    height: u32,
    clock: f32,
    reload: bool,
    loaded: Option<ReloadKey>,
    size_changed: bool,
    rendering: bool,
    rendered: bool,
    pool: RenderTargetPool,
    programs: Option<Programs>,
    mask_image: MaskImage,
}

impl CompositeBlurFilter {
    /// A new instance configured from `settings`. Programs load on the first
    /// render.
    #[must_use]
    pub fn create(settings: &Settings) -> Self {
        let mut filter = Self {
            options: FilterOptions::default(),
            loader: ShaderLoader::embedded(),
            width: 0,
            height: 0,
            clock: 0.0,
            reload: true,
            loaded: None,
            size_changed: false,
            rendering: false,
            rendered: false,
            pool: RenderTargetPool::new(TextureFormat::Rgba16Float),
            programs: None,
            mask_image: MaskImage::default(),
        };
        filter.update(settings);
        log::info!(
            "composite blur filter created ({:?})",
            filter.options.blur.algorithm
        );
        filter
    }

    /// Load programs through `loader` instead of the embedded sources.
    #[must_use]
    pub fn with_shader_loader(mut self, loader: ShaderLoader) -> Self {
        self.loader = loader;
        self.reload = true;
        self
    }

    /// Apply changed host settings.
    pub fn update(&mut self, settings: &Settings) {
        self.set_options(FilterOptions::from_settings(settings));
    }

    /// Apply typed options directly, e.g. from a preset file.
    pub fn set_options(&mut self, options: FilterOptions) {
        if self.loaded != Some(options.reload_key()) {
            self.reload = true;
        }
        if options.mask.source.image_file != self.mask_image.path {
            self.mask_image.set_path(&options.mask.source.image_file);
        }
        self.options = options;
    }

    /// Current options.
    #[must_use]
    pub const fn options(&self) -> &FilterOptions {
        &self.options
    }

    /// Host source to render and pass as [`FrameInputs::background`].
    #[must_use]
    pub fn background_source(&self) -> Option<&str> {
        self.options.background_source()
    }

    /// Output width.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Output height.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Start a new frame of `width x height`, `seconds` after the last one.
    pub fn video_tick(&mut self, seconds: f32, width: u32, height: u32) {
        if (width, height) != (self.width, self.height) {
            self.size_changed = true;
            self.width = width;
            self.height = height;
        }
        if seconds.is_finite() && seconds > 0.0 {
            self.clock += seconds;
        }
        self.rendered = false;
    }

    /// Render the current frame.
    ///
    /// A second call within the same tick returns the cached output. Every
    /// failure is logged and reported as [`FrameOutput::Skip`].
    pub fn video_render(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        inputs: &FrameInputs,
        transition: Option<TransitionContext>,
    ) -> FrameOutput {
        if self.rendered {
            if let Some(output) = self.pool.get(Slot::Output) {
                return FrameOutput::Texture(output);
            }
        }
        if self.rendering {
            log::debug!("{}", BlurError::Reentrant);
            return FrameOutput::Skip;
        }

        self.rendering = true;
        let result = self.render_frame(backend, inputs, transition);
        self.rendering = false;

        match result {
            Ok(output) => {
                self.rendered = true;
                FrameOutput::Texture(output)
            }
            Err(e @ BlurError::GraphicsUnavailable(_)) => {
                log::debug!("skipping frame: {e}");
                FrameOutput::Skip
            }
            Err(e) => {
                log::warn!("skipping frame: {e}");
                FrameOutput::Skip
            }
        }
    }

    fn render_frame(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        inputs: &FrameInputs,
        transition: Option<TransitionContext>,
    ) -> Result<TextureId, BlurError> {
        if self.width == 0 || self.height == 0 {
            return Err(BlurError::InvalidDraw(format!(
                "frame size {}x{}",
                self.width, self.height
            )));
        }
        let mut gfx = GraphicsScope::enter(backend)?;
        if self.reload || self.programs.is_none() {
            self.reload_programs(&mut gfx);
        }
        self.mask_image.upload(&mut gfx)?;

        let Self {
            options,
            pool,
            programs,
            mask_image,
            width,
            height,
            clock,
            size_changed,
            ..
        } = self;
        let programs = programs.as_mut().ok_or_else(|| {
            BlurError::InvalidDraw("programs not loaded".to_owned())
        })?;
        if std::mem::take(size_changed) {
            programs.blur.reset();
        }

        let mut ctx = PassContext {
            gfx: &mut gfx,
            pool,
            common: &mut programs.common,
            width: *width,
            height: *height,
            time: *clock,
            transition,
        };
        if let (None, Some(name)) = (inputs.background, options.background_source()) {
            log::debug!("background {name} configured but not supplied");
        }
        let input = ctx.copy(inputs.source, Slot::Input)?;
        let source = programs.compositor.composite_background(
            &mut ctx,
            input,
            inputs.background,
        )?;
        programs.blur.render(&mut ctx, source, options)?;

        let mask_source = match options.mask.mask_type {
            MaskType::Source => inputs.mask_source,
            MaskType::Image => mask_image.texture,
            _ => None,
        };
        programs
            .compositor
            .apply_mask(&mut ctx, input, &options.mask, mask_source)?;

        ctx.pool.get(Slot::Output).ok_or_else(|| {
            BlurError::InvalidDraw("output target missing".to_owned())
        })
    }

    /// Load the programs for the current options. A change of mask type
    /// alone swaps just the mask program.
    fn reload_programs(&mut self, gfx: &mut GraphicsScope<'_>) {
        let key = self.options.reload_key();
        let mask_only = self
            .loaded
            .is_some_and(|loaded| ReloadKey { mask: key.mask, ..loaded } == key);

        match self.programs.as_mut() {
            Some(programs) if mask_only => {
                programs.compositor.reload_mask(gfx, &self.loader, key.mask);
            }
            _ => {
                if let Some(old) = self.programs.take() {
                    old.destroy(gfx);
                }
                self.programs =
                    Some(Programs::load(gfx, &self.loader, &self.options));
                log::info!(
                    "loaded {:?} ({:?}) with {:?} mask",
                    key.algorithm,
                    key.blur_type,
                    key.mask
                );
            }
        }
        self.loaded = Some(key);
        self.reload = false;
    }

    /// Release every program and render target.
    pub fn destroy(mut self, backend: &mut dyn GraphicsBackend) {
        match GraphicsScope::enter(backend) {
            Ok(mut gfx) => {
                if let Some(programs) = self.programs.take() {
                    programs.destroy(&mut gfx);
                }
                self.pool.release_all(&mut gfx);
                self.mask_image.release(&mut gfx);
            }
            Err(e) => log::warn!("leaking filter resources: {e}"),
        }
        log::info!("composite blur filter destroyed");
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec4;

    use super::*;
    use crate::gpu::cpu::CpuBackend;
    use crate::options::BlurAlgorithm;
    use crate::renderer::test_support::{gradient_image, max_difference, solid};

    fn settings(pairs: &[(&str, f64)]) -> Settings {
        let mut settings = Settings::with_defaults();
        for (key, value) in pairs {
            settings.set_double(key, *value);
        }
        settings
    }

    /// Tick and render one frame of `source`, returning the output and the
    /// number of draws it cost.
    fn frame(
        filter: &mut CompositeBlurFilter,
        backend: &mut CpuBackend,
        source: TextureId,
    ) -> (FrameOutput, usize) {
        let (w, h) = backend.texture_size(source).unwrap();
        filter.video_tick(1.0 / 60.0, w, h);
        let before = backend.draw_count();
        let output = filter.video_render(backend, &FrameInputs::new(source), None);
        (output, backend.draw_count() - before)
    }

    fn texel(backend: &CpuBackend, output: FrameOutput) -> Vec4 {
        backend.image(output.texture().unwrap()).unwrap().texels()[0]
    }

    #[test]
    fn gaussian_area_runs_two_passes_at_frame_size() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(16, 12));
        let mut filter = CompositeBlurFilter::create(&settings(&[
            ("blur_algorithm", 1.0),
            ("blur_type", 1.0),
            ("radius", 10.0),
        ]));
        let (output, draws) = frame(&mut filter, &mut backend, source);
        // Input copy, then horizontal and vertical passes.
        assert_eq!(draws, 3);
        assert_eq!(backend.texture_size(output.texture().unwrap()), Some((16, 12)));
        assert_eq!(backend.graphics_depth(), 0);
    }

    #[test]
    fn background_name_is_left_to_the_host() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(8, 8));
        let mut settings = Settings::with_defaults();
        settings.set_string("background", "Desk Cam");
        let mut filter = CompositeBlurFilter::create(&settings);
        assert_eq!(filter.background_source(), Some("Desk Cam"));

        // Not supplied this frame: the input passes through uncomposited.
        let (output, _) = frame(&mut filter, &mut backend, source);
        let out = backend.image(output.texture().unwrap()).unwrap();
        assert_eq!(max_difference(out, backend.image(source).unwrap()), 0.0);
    }

    #[test]
    fn fractional_kawase_mixes_one_residual() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(16, 16));
        let mut filter = CompositeBlurFilter::create(&settings(&[
            ("blur_algorithm", 3.0),
            ("kawase_passes", 3.5),
        ]));
        let (output, draws) = frame(&mut filter, &mut backend, source);
        // Input copy plus the 3.5 pyramid: down, down, residual up, mix, up.
        assert_eq!(draws, 6);
        assert_eq!(backend.texture_size(output.texture().unwrap()), Some((16, 16)));
    }

    #[test]
    fn temporal_captures_then_blends() {
        let mut backend = CpuBackend::new();
        let mut filter = CompositeBlurFilter::create(&settings(&[
            ("blur_algorithm", 5.0),
            ("temporal_current_weight", 0.05),
        ]));
        let black = solid(&mut backend, 4, 4, Vec4::new(0.0, 0.0, 0.0, 1.0));
        let white = solid(&mut backend, 4, 4, Vec4::ONE);

        let (first, _) = frame(&mut filter, &mut backend, black);
        assert_eq!(texel(&backend, first), Vec4::new(0.0, 0.0, 0.0, 1.0));

        let (second, _) = frame(&mut filter, &mut backend, white);
        let blended = texel(&backend, second);
        assert!((blended.x - 0.05).abs() < 1e-5);
        assert!((blended.w - 1.0).abs() < 1e-5);
    }

    #[test]
    fn size_change_restarts_accumulation() {
        let mut backend = CpuBackend::new();
        let mut filter =
            CompositeBlurFilter::create(&settings(&[("blur_algorithm", 5.0)]));
        let black = solid(&mut backend, 4, 4, Vec4::new(0.0, 0.0, 0.0, 1.0));
        let white = solid(&mut backend, 6, 6, Vec4::ONE);
        let _ = frame(&mut filter, &mut backend, black);
        let (output, _) = frame(&mut filter, &mut backend, white);
        assert_eq!(texel(&backend, output), Vec4::ONE);
    }

    #[test]
    fn pixelate_pre_smooths_with_half_the_radius() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(16, 16));
        let mut filter = CompositeBlurFilter::create(&settings(&[
            ("blur_algorithm", 4.0),
            ("pixelate_type", 1.0),
            ("radius", 8.0),
            ("pixelate_smoothing_pct", 50.0),
        ]));
        let (_, draws) = frame(&mut filter, &mut backend, source);
        // Input copy, a four-draw pyramid, the pixelate draw.
        assert_eq!(draws, 6);
    }

    #[test]
    fn no_algorithm_passes_the_frame_through() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(8, 8));
        let mut filter = CompositeBlurFilter::create(&Settings::with_defaults());
        assert_eq!(filter.options().blur.algorithm, BlurAlgorithm::None);
        let (output, _) = frame(&mut filter, &mut backend, source);
        let out = backend.image(output.texture().unwrap()).unwrap();
        assert_eq!(max_difference(out, backend.image(source).unwrap()), 0.0);
    }

    #[test]
    fn second_render_in_a_tick_is_cached() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(8, 8));
        let mut filter = CompositeBlurFilter::create(&settings(&[
            ("blur_algorithm", 1.0),
            ("blur_type", 1.0),
        ]));
        let (first, _) = frame(&mut filter, &mut backend, source);
        let before = backend.draw_count();
        let again = filter.video_render(&mut backend, &FrameInputs::new(source), None);
        assert_eq!(again, first);
        assert_eq!(backend.draw_count(), before);
    }

    #[test]
    fn reentrant_render_is_skipped() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(8, 8));
        let mut filter = CompositeBlurFilter::create(&Settings::with_defaults());
        filter.video_tick(0.0, 8, 8);
        filter.rendering = true;
        assert_eq!(
            filter.video_render(&mut backend, &FrameInputs::new(source), None),
            FrameOutput::Skip
        );
        assert_eq!(backend.draw_count(), 0);
    }

    #[test]
    fn unavailable_context_skips_the_frame() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(8, 8));
        let mut filter = CompositeBlurFilter::create(&Settings::with_defaults());
        backend.set_context_available(false);
        let (output, draws) = frame(&mut filter, &mut backend, source);
        assert_eq!(output, FrameOutput::Skip);
        assert_eq!(draws, 0);
        assert_eq!(backend.graphics_depth(), 0);

        // The next frame recovers.
        backend.set_context_available(true);
        let (output, _) = frame(&mut filter, &mut backend, source);
        assert!(output.texture().is_some());
    }

    #[test]
    fn zero_size_skips_the_frame() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(8, 8));
        let mut filter = CompositeBlurFilter::create(&Settings::with_defaults());
        filter.video_tick(0.0, 0, 0);
        assert_eq!(
            filter.video_render(&mut backend, &FrameInputs::new(source), None),
            FrameOutput::Skip
        );
    }

    #[test]
    fn algorithm_change_reloads_programs() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(8, 8));
        let mut config = settings(&[("blur_algorithm", 1.0), ("blur_type", 1.0)]);
        let mut filter = CompositeBlurFilter::create(&config);
        let _ = frame(&mut filter, &mut backend, source);

        config.set_int("blur_algorithm", 3);
        filter.update(&config);
        assert!(filter.reload);
        let _ = frame(&mut filter, &mut backend, source);
        assert!(!filter.reload);
        let programs = filter.programs.as_ref().unwrap();
        assert_eq!(programs.blur.algorithm(), BlurAlgorithm::DualKawase);
    }

    #[test]
    fn mask_change_keeps_blur_state() {
        let mut backend = CpuBackend::new();
        let mut config = settings(&[
            ("blur_algorithm", 5.0),
            ("temporal_current_weight", 0.5),
        ]);
        let mut filter = CompositeBlurFilter::create(&config);
        let black = solid(&mut backend, 4, 4, Vec4::new(0.0, 0.0, 0.0, 1.0));
        let white = solid(&mut backend, 4, 4, Vec4::ONE);
        let _ = frame(&mut filter, &mut backend, black);

        config.set_int("effect_mask", 1);
        config.set_double("effect_mask_crop_top", 0.0);
        config.set_double("effect_mask_crop_bottom", 0.0);
        config.set_double("effect_mask_crop_left", 0.0);
        config.set_double("effect_mask_crop_right", 0.0);
        filter.update(&config);
        let _ = frame(&mut filter, &mut backend, white);
        let programs = filter.programs.as_ref().unwrap();
        assert_eq!(programs.compositor.mask_type(), MaskType::Crop);
        assert!(matches!(
            &programs.blur,
            BlurRenderer::Temporal(temporal) if temporal.is_primed()
        ));
    }

    #[test]
    fn opaque_mask_image_keeps_the_whole_blur() {
        let dir = std::env::temp_dir()
            .join(format!("composite-blur-mask-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("opaque.png");
        image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 255, 255, 255]))
            .save(&path)
            .unwrap();

        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(12, 12));
        let blur = settings(&[
            ("blur_algorithm", 1.0),
            ("blur_type", 1.0),
            ("radius", 4.0),
        ]);
        let mut plain = CompositeBlurFilter::create(&blur);
        let (expected, _) = frame(&mut plain, &mut backend, source);

        let mut masked_settings = blur;
        masked_settings.set_int("effect_mask", 3);
        masked_settings
            .set_string("effect_mask_source_file", &path.to_string_lossy());
        let mut masked = CompositeBlurFilter::create(&masked_settings);
        let (output, _) = frame(&mut masked, &mut backend, source);

        let a = backend.image(expected.texture().unwrap()).unwrap();
        let b = backend.image(output.texture().unwrap()).unwrap();
        assert!(max_difference(a, b) < 1e-6);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn destroy_releases_everything() {
        let mut backend = CpuBackend::new();
        let source = backend.upload(gradient_image(8, 8));
        let mut filter = CompositeBlurFilter::create(&settings(&[
            ("blur_algorithm", 3.0),
            ("kawase_passes", 5.5),
        ]));
        let _ = frame(&mut filter, &mut backend, source);
        assert!(backend.live_textures() > 1);
        filter.destroy(&mut backend);
        assert_eq!(backend.live_textures(), 1);
    }
}
