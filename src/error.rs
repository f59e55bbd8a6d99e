//! Crate-level error types.

use std::fmt;
use std::path::PathBuf;

use crate::gpu::backend::{ProgramId, TextureId};
use crate::gpu::wgpu_backend::WgpuInitError;

/// Errors produced by the composite-blur crate.
#[derive(Debug)]
pub enum BlurError {
    /// The host refused or failed to hand out the graphics context.
    GraphicsUnavailable(String),
    /// wgpu adapter/device initialization failure.
    Gpu(WgpuInitError),
    /// A texture handle that the backend does not know about.
    UnknownTexture(TextureId),
    /// A program handle that the backend does not know about.
    UnknownProgram(ProgramId),
    /// A draw call the backend cannot execute (e.g. target bound as source).
    InvalidDraw(String),
    /// Failed to read a shader source file.
    ShaderSource {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// An `#include` chain that refers back to itself.
    ShaderIncludeCycle(PathBuf),
    /// Shader program failed to compile.
    ShaderCompile {
        /// Program name.
        name: String,
        /// Compiler diagnostic.
        message: String,
    },
    /// Copying a texture back to host memory failed.
    Readback(String),
    /// Settings (TOML/JSON) parsing/serialization failure.
    Settings(String),
    /// Mask or frame image decode/encode failure.
    Image(image::ImageError),
    /// A render call arrived while a previous one was still in flight.
    Reentrant,
    /// Generic I/O failure.
    Io(std::io::Error),
}

impl fmt::Display for BlurError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GraphicsUnavailable(msg) => {
                write!(f, "graphics context unavailable: {msg}")
            }
            Self::Gpu(e) => write!(f, "GPU error: {e}"),
            Self::UnknownTexture(id) => write!(f, "unknown texture {id:?}"),
            Self::UnknownProgram(id) => write!(f, "unknown program {id:?}"),
            Self::InvalidDraw(msg) => write!(f, "invalid draw: {msg}"),
            Self::ShaderSource { path, source } => {
                write!(f, "failed to read shader {}: {source}", path.display())
            }
            Self::ShaderIncludeCycle(path) => {
                write!(f, "recursive #include of {}", path.display())
            }
            Self::ShaderCompile { name, message } => {
                write!(f, "shader '{name}' failed to compile:\n{message}")
            }
            Self::Readback(msg) => write!(f, "texture readback failed: {msg}"),
            Self::Settings(msg) => write!(f, "settings parse error: {msg}"),
            Self::Image(e) => write!(f, "image error: {e}"),
            Self::Reentrant => write!(f, "render already in progress"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for BlurError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Gpu(e) => Some(e),
            Self::ShaderSource { source, .. } => Some(source),
            Self::Image(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<WgpuInitError> for BlurError {
    fn from(e: WgpuInitError) -> Self {
        Self::Gpu(e)
    }
}

impl From<image::ImageError> for BlurError {
    fn from(e: image::ImageError) -> Self {
        Self::Image(e)
    }
}

impl From<std::io::Error> for BlurError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
