//! Graphics backend abstraction.
//!
//! Every blur pass talks to the GPU through [`GraphicsBackend`]: textures and
//! programs are opaque integer handles, programs expose their inputs as a
//! table of named parameters, and a draw is "run this program over that
//! target with these parameter values". All resource mutation happens through
//! a [`GraphicsScope`], which enters the host's graphics context on creation
//! and leaves it on drop, on every exit path.

use std::ops::{Deref, DerefMut};

use glam::{Vec2, Vec4};

use crate::error::BlurError;

/// Opaque texture handle owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Opaque compiled-program handle owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// Pixel formats used by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit normalized RGBA (host frames, mask images).
    Rgba8Unorm,
    /// Half-float RGBA (render targets, kernel lookup textures).
    Rgba16Float,
}

/// Which physical encoding a backend prefers for Gaussian kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelEncoding {
    /// Two flat uniform arrays (`weight`, `offset`).
    UniformArrays,
    /// One 128x1 texture with (weight, offset) in the red/green channels.
    Texture,
}

/// Static capabilities a backend reports to the passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCaps {
    /// Preferred kernel upload path.
    pub kernel_encoding: KernelEncoding,
}

/// Backend family, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Software reference rasterizer.
    Cpu,
    /// wgpu device.
    Wgpu,
}

/// Declared type of a named program parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// `f32` scalar.
    Float,
    /// `i32` scalar.
    Int,
    /// Boolean flag.
    Bool,
    /// Two-component float vector.
    Vec2,
    /// Four-component float vector.
    Vec4,
    /// Fixed-length float array.
    FloatArray(usize),
    /// Sampled texture.
    Texture,
}

/// A value bound to a named program parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// `f32` scalar.
    Float(f32),
    /// `i32` scalar.
    Int(i32),
    /// Boolean flag.
    Bool(bool),
    /// Two-component float vector.
    Vec2(Vec2),
    /// Four-component float vector.
    Vec4(Vec4),
    /// Float array; shorter arrays are zero-padded by the backend.
    FloatArray(Vec<f32>),
    /// Sampled texture.
    Texture(TextureId),
}

impl ParamValue {
    /// The parameter kind this value satisfies.
    #[must_use]
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::Float(_) => ParamKind::Float,
            Self::Int(_) => ParamKind::Int,
            Self::Bool(_) => ParamKind::Bool,
            Self::Vec2(_) => ParamKind::Vec2,
            Self::Vec4(_) => ParamKind::Vec4,
            Self::FloatArray(v) => ParamKind::FloatArray(v.len()),
            Self::Texture(_) => ParamKind::Texture,
        }
    }
}

/// One entry of a program's parameter table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamInfo {
    /// Parameter name as written in the program source.
    pub name: String,
    /// Declared type.
    pub kind: ParamKind,
}

impl ParamInfo {
    /// Shorthand constructor.
    #[must_use]
    pub fn new(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_owned(),
            kind,
        }
    }
}

/// Program source after `#include` expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSource {
    /// Program name (file stem, e.g. `gaussian_1d`).
    pub name: String,
    /// Fully expanded source text.
    pub text: String,
}

/// A single fullscreen draw.
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    /// Program to run.
    pub program: ProgramId,
    /// Render target written by the draw. Must not appear in `values`.
    pub target: TextureId,
    /// One slot per entry of the program's parameter table; `None` leaves
    /// the parameter at its zero value (textures bind a 1x1 transparent
    /// dummy).
    pub values: &'a [Option<ParamValue>],
}

/// The graphics device the blur passes render through.
///
/// Implementations are not required to be thread-safe; a filter instance
/// renders on the host's graphics thread only.
pub trait GraphicsBackend {
    /// Backend family.
    fn kind(&self) -> BackendKind;

    /// Static capabilities.
    fn caps(&self) -> BackendCaps;

    /// Enter the host's graphics context. Prefer [`GraphicsScope::enter`].
    ///
    /// # Errors
    ///
    /// Returns [`BlurError::GraphicsUnavailable`] when the context cannot be
    /// acquired this frame.
    fn enter_graphics(&mut self) -> Result<(), BlurError>;

    /// Leave the host's graphics context.
    fn leave_graphics(&mut self);

    /// Allocate an offscreen surface that can be drawn into and sampled.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface cannot be allocated.
    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<TextureId, BlurError>;

    /// Upload a sampled texture. `texels` holds `width * height` RGBA values,
    /// row-major from the top-left corner.
    ///
    /// # Errors
    ///
    /// Returns [`BlurError::InvalidDraw`] if `texels` has the wrong length.
    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        format: TextureFormat,
        texels: &[[f32; 4]],
    ) -> Result<TextureId, BlurError>;

    /// Release a texture. Unknown handles are ignored.
    fn destroy_texture(&mut self, texture: TextureId);

    /// Dimensions of a live texture.
    fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)>;

    /// Compile a program.
    ///
    /// # Errors
    ///
    /// Returns [`BlurError::ShaderCompile`] with the compiler diagnostic.
    fn compile_program(
        &mut self,
        source: &ProgramSource,
    ) -> Result<ProgramId, BlurError>;

    /// Release a program. Unknown handles are ignored.
    fn destroy_program(&mut self, program: ProgramId);

    /// The parameter table of a compiled program.
    fn program_params(&self, program: ProgramId) -> Option<&[ParamInfo]>;

    /// Run `call.program` over every texel of `call.target`.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown handles, mismatched value tables or a
    /// target that is also bound as a source.
    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), BlurError>;
}

/// RAII guard over the host graphics context.
///
/// Dereferences to the backend, so passes call backend methods directly on
/// the scope. Dropping the scope leaves the context.
pub struct GraphicsScope<'a> {
    backend: &'a mut dyn GraphicsBackend,
}

impl<'a> GraphicsScope<'a> {
    /// Enter the graphics context.
    ///
    /// # Errors
    ///
    /// Propagates the backend's acquisition failure; nothing needs to be
    /// released in that case.
    pub fn enter(backend: &'a mut dyn GraphicsBackend) -> Result<Self, BlurError> {
        backend.enter_graphics()?;
        Ok(Self { backend })
    }
}

impl<'a> Deref for GraphicsScope<'a> {
    type Target = dyn GraphicsBackend + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.backend
    }
}

impl DerefMut for GraphicsScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.backend
    }
}

impl Drop for GraphicsScope<'_> {
    fn drop(&mut self) {
        self.backend.leave_graphics();
    }
}
