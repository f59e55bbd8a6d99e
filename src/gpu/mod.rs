//! GPU resource management.
//!
//! Provides the backend abstraction the blur passes draw through, loaded
//! shader effects with named parameters, offscreen render targets, and the two
//! backend implementations (software reference and wgpu).

/// Graphics backend trait, opaque handles, and the scoped context guard.
pub mod backend;
/// Software reference backend executing every program on the CPU.
pub mod cpu;
/// Loaded shader programs with cached named-parameter handles.
pub mod effect;
/// Shared wgpu boilerplate helpers for fullscreen program pipelines.
pub mod pipeline_helpers;
/// Offscreen render targets and the fixed-slot target pool.
pub mod render_target;
/// Shader source loading with `#include` expansion.
pub mod shader_loader;
/// wgpu backend: WGSL programs reflected into named parameters.
pub mod wgpu_backend;
