//! Shader source loading with `#include "relative/path"` expansion.
//!
//! Programs live under `data/shaders/` as WGSL. They are either read from a
//! host-provided data directory at load time or taken from the copies
//! embedded in the binary. Includes are expanded by textual substitution,
//! resolved relative to the including file's directory.

use std::path::{Component, Path, PathBuf};

use crate::error::BlurError;
use crate::gpu::backend::ProgramSource;

/// Shader files compiled into the crate, keyed by path under `data/shaders/`.
const EMBEDDED: &[(&str, &str)] = &[
    ("common.wgsl", include_str!("../../data/shaders/common.wgsl")),
    ("copy.wgsl", include_str!("../../data/shaders/copy.wgsl")),
    ("composite.wgsl", include_str!("../../data/shaders/composite.wgsl")),
    ("mix.wgsl", include_str!("../../data/shaders/mix.wgsl")),
    (
        "dual_kawase_down.wgsl",
        include_str!("../../data/shaders/dual_kawase_down.wgsl"),
    ),
    (
        "dual_kawase_up.wgsl",
        include_str!("../../data/shaders/dual_kawase_up.wgsl"),
    ),
    ("kernel.wgsl", include_str!("../../data/shaders/kernel.wgsl")),
    ("gaussian_1d.wgsl", include_str!("../../data/shaders/gaussian_1d.wgsl")),
    (
        "gaussian_motion.wgsl",
        include_str!("../../data/shaders/gaussian_motion.wgsl"),
    ),
    (
        "gaussian_radial.wgsl",
        include_str!("../../data/shaders/gaussian_radial.wgsl"),
    ),
    (
        "gaussian_tiltshift.wgsl",
        include_str!("../../data/shaders/gaussian_tiltshift.wgsl"),
    ),
    ("box.wgsl", include_str!("../../data/shaders/box.wgsl")),
    ("box_1d.wgsl", include_str!("../../data/shaders/box_1d.wgsl")),
    ("box_radial.wgsl", include_str!("../../data/shaders/box_radial.wgsl")),
    (
        "box_tiltshift.wgsl",
        include_str!("../../data/shaders/box_tiltshift.wgsl"),
    ),
    (
        "pixelate_square.wgsl",
        include_str!("../../data/shaders/pixelate_square.wgsl"),
    ),
    (
        "pixelate_hexagonal.wgsl",
        include_str!("../../data/shaders/pixelate_hexagonal.wgsl"),
    ),
    (
        "pixelate_circle.wgsl",
        include_str!("../../data/shaders/pixelate_circle.wgsl"),
    ),
    (
        "pixelate_triangle.wgsl",
        include_str!("../../data/shaders/pixelate_triangle.wgsl"),
    ),
    (
        "pixelate_voronoi.wgsl",
        include_str!("../../data/shaders/pixelate_voronoi.wgsl"),
    ),
    ("temporal.wgsl", include_str!("../../data/shaders/temporal.wgsl")),
    (
        "vector_gradient.wgsl",
        include_str!("../../data/shaders/vector_gradient.wgsl"),
    ),
    ("vector_blur.wgsl", include_str!("../../data/shaders/vector_blur.wgsl")),
    ("mask.wgsl", include_str!("../../data/shaders/mask.wgsl")),
    ("mask_crop.wgsl", include_str!("../../data/shaders/mask_crop.wgsl")),
    ("mask_source.wgsl", include_str!("../../data/shaders/mask_source.wgsl")),
    ("mask_circle.wgsl", include_str!("../../data/shaders/mask_circle.wgsl")),
];

/// Names of every drawable program (files that are not include-only).
pub const PROGRAM_NAMES: &[&str] = &[
    "copy",
    "composite",
    "mix",
    "dual_kawase_down",
    "dual_kawase_up",
    "gaussian_1d",
    "gaussian_motion",
    "gaussian_radial",
    "gaussian_tiltshift",
    "box_1d",
    "box_radial",
    "box_tiltshift",
    "pixelate_square",
    "pixelate_hexagonal",
    "pixelate_circle",
    "pixelate_triangle",
    "pixelate_voronoi",
    "temporal",
    "vector_gradient",
    "vector_blur",
    "mask_crop",
    "mask_source",
    "mask_circle",
];

/// Where shader files are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ShaderRoot {
    Embedded,
    Directory(PathBuf),
}

/// Resolves program names to expanded [`ProgramSource`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderLoader {
    root: ShaderRoot,
}

impl Default for ShaderLoader {
    fn default() -> Self {
        Self::embedded()
    }
}

impl ShaderLoader {
    /// Loader over the shader files compiled into the crate.
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            root: ShaderRoot::Embedded,
        }
    }

    /// Loader over a host data directory containing `<name>.wgsl` files.
    #[must_use]
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            root: ShaderRoot::Directory(dir.into()),
        }
    }

    /// Load `<name>.wgsl` and expand its includes.
    ///
    /// # Errors
    ///
    /// Returns [`BlurError::ShaderSource`] if a file is missing or unreadable
    /// and [`BlurError::ShaderIncludeCycle`] for self-referencing includes.
    pub fn load(&self, name: &str) -> Result<ProgramSource, BlurError> {
        let path = PathBuf::from(format!("{name}.wgsl"));
        let mut stack = vec![path.clone()];
        let text = self.expand(&path, &mut stack)?;
        Ok(ProgramSource {
            name: name.to_owned(),
            text,
        })
    }

    fn expand(
        &self,
        path: &Path,
        stack: &mut Vec<PathBuf>,
    ) -> Result<String, BlurError> {
        let raw = self.read(path)?;
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        let mut out = String::with_capacity(raw.len());
        for line in raw.lines() {
            match parse_include(line) {
                Some(target) => {
                    let included = normalize(&dir.join(target));
                    if stack.contains(&included) {
                        return Err(BlurError::ShaderIncludeCycle(included));
                    }
                    stack.push(included.clone());
                    out.push_str(&self.expand(&included, stack)?);
                    let _ = stack.pop();
                }
                None => {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        Ok(out)
    }

    fn read(&self, path: &Path) -> Result<String, BlurError> {
        match &self.root {
            ShaderRoot::Embedded => EMBEDDED
                .iter()
                .find(|(file, _)| Path::new(file) == path)
                .map(|(_, text)| (*text).to_owned())
                .ok_or_else(|| BlurError::ShaderSource {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "no embedded shader with this name",
                    ),
                }),
            ShaderRoot::Directory(dir) => {
                let full = dir.join(path);
                std::fs::read_to_string(&full).map_err(|source| {
                    BlurError::ShaderSource { path: full, source }
                })
            }
        }
    }
}

/// The quoted target of an `#include "..."` line.
fn parse_include(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix("#include")?;
    let start = rest.find('"')? + 1;
    let len = rest[start..].find('"')?;
    Some(&rest[start..start + len])
}

/// Lexically resolve `.` and `..` so include stacks compare reliably.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let _ = out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
