//! Software reference backend.
//!
//! Runs every shipped program on the CPU over `f32` RGBA images, with the
//! same parameter tables the WGSL programs reflect to. Used by tests, by the
//! command-line tool and by hosts without a GPU. Program source text is not
//! interpreted: a program is selected by name.

mod programs;
mod surface;

use rustc_hash::FxHashMap;

pub use self::surface::CpuImage;
use self::programs::{Bindings, CpuProgram};
use crate::error::BlurError;
use crate::gpu::backend::{
    BackendCaps, BackendKind, DrawCall, GraphicsBackend, KernelEncoding,
    ParamInfo, ParamValue, ProgramId, ProgramSource, TextureFormat, TextureId,
};

struct CompiledProgram {
    program: CpuProgram,
    params: Vec<ParamInfo>,
}

/// CPU implementation of [`GraphicsBackend`].
pub struct CpuBackend {
    textures: FxHashMap<TextureId, CpuImage>,
    programs: FxHashMap<ProgramId, CompiledProgram>,
    next_texture: u32,
    next_program: u32,
    depth: u32,
    context_available: bool,
    kernel_encoding: KernelEncoding,
    textures_created: usize,
    draws: usize,
    dummy: CpuImage,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuBackend {
    /// Backend that binds Gaussian kernels as uniform arrays.
    #[must_use]
    pub fn new() -> Self {
        Self::with_kernel_encoding(KernelEncoding::UniformArrays)
    }

    /// Backend reporting the given kernel encoding preference.
    #[must_use]
    pub fn with_kernel_encoding(kernel_encoding: KernelEncoding) -> Self {
        Self {
            textures: FxHashMap::default(),
            programs: FxHashMap::default(),
            next_texture: 1,
            next_program: 1,
            depth: 0,
            context_available: true,
            kernel_encoding,
            textures_created: 0,
            draws: 0,
            dummy: CpuImage::new(1, 1, TextureFormat::Rgba8Unorm),
        }
    }

    /// Simulate the host refusing the graphics context.
    pub fn set_context_available(&mut self, available: bool) {
        self.context_available = available;
    }

    /// Current graphics-context nesting depth.
    #[must_use]
    pub const fn graphics_depth(&self) -> u32 {
        self.depth
    }

    /// Total render targets and textures ever allocated.
    #[must_use]
    pub const fn textures_created(&self) -> usize {
        self.textures_created
    }

    /// Textures currently alive.
    #[must_use]
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Total draws executed.
    #[must_use]
    pub const fn draw_count(&self) -> usize {
        self.draws
    }

    /// Contents of a texture.
    #[must_use]
    pub fn image(&self, texture: TextureId) -> Option<&CpuImage> {
        self.textures.get(&texture)
    }

    /// Upload a decoded image as a new texture. Usable outside a graphics
    /// scope; the software backend has no context to enter.
    pub fn upload(&mut self, image: CpuImage) -> TextureId {
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.textures_created += 1;
        let _ = self.textures.insert(id, image);
        id
    }

    fn check_sources(&self, call: &DrawCall<'_>) -> Result<(), BlurError> {
        for value in call.values.iter().flatten() {
            if let ParamValue::Texture(id) = value {
                if *id == call.target {
                    return Err(BlurError::InvalidDraw(format!(
                        "target {id:?} is also bound as a source"
                    )));
                }
                if !self.textures.contains_key(id) {
                    return Err(BlurError::UnknownTexture(*id));
                }
            }
        }
        Ok(())
    }
}

impl GraphicsBackend for CpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cpu
    }

    fn caps(&self) -> BackendCaps {
        BackendCaps {
            kernel_encoding: self.kernel_encoding,
        }
    }

    fn enter_graphics(&mut self) -> Result<(), BlurError> {
        if !self.context_available {
            return Err(BlurError::GraphicsUnavailable(
                "software context disabled".to_owned(),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave_graphics(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<TextureId, BlurError> {
        Ok(self.upload(CpuImage::new(width, height, format)))
    }

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        format: TextureFormat,
        texels: &[[f32; 4]],
    ) -> Result<TextureId, BlurError> {
        let image = CpuImage::from_texels(width, height, format, texels)
            .ok_or_else(|| {
                BlurError::InvalidDraw(format!(
                    "{} texels supplied for a {width}x{height} texture",
                    texels.len()
                ))
            })?;
        Ok(self.upload(image))
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        let _ = self.textures.remove(&texture);
    }

    fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures
            .get(&texture)
            .map(|image| (image.width(), image.height()))
    }

    fn compile_program(
        &mut self,
        source: &ProgramSource,
    ) -> Result<ProgramId, BlurError> {
        let program = CpuProgram::from_name(&source.name).ok_or_else(|| {
            BlurError::ShaderCompile {
                name: source.name.clone(),
                message: "no software implementation for this program"
                    .to_owned(),
            }
        })?;
        let id = ProgramId(self.next_program);
        self.next_program += 1;
        let _ = self.programs.insert(
            id,
            CompiledProgram {
                program,
                params: program.params(),
            },
        );
        Ok(id)
    }

    fn destroy_program(&mut self, program: ProgramId) {
        let _ = self.programs.remove(&program);
    }

    fn program_params(&self, program: ProgramId) -> Option<&[ParamInfo]> {
        self.programs.get(&program).map(|p| p.params.as_slice())
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), BlurError> {
        self.check_sources(call)?;
        let compiled = self
            .programs
            .get(&call.program)
            .ok_or(BlurError::UnknownProgram(call.program))?;
        if call.values.len() != compiled.params.len() {
            return Err(BlurError::InvalidDraw(format!(
                "{} values for {} parameters",
                call.values.len(),
                compiled.params.len()
            )));
        }
        let mut out = self
            .textures
            .remove(&call.target)
            .ok_or(BlurError::UnknownTexture(call.target))?;
        let bindings = Bindings {
            params: &compiled.params,
            values: call.values,
            textures: &self.textures,
            dummy: &self.dummy,
        };
        compiled.program.render(&bindings, &mut out);
        let _ = self.textures.insert(call.target, out);
        self.draws += 1;
        Ok(())
    }
}
