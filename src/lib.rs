// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Complexity limits (thresholds in clippy.toml)
#![deny(clippy::cognitive_complexity)]
#![deny(clippy::too_many_lines)]
#![deny(clippy::excessive_nesting)]
// Function signature hygiene
#![deny(clippy::too_many_arguments)]
#![deny(clippy::fn_params_excessive_bools)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// String hygiene
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::redundant_closure_for_method_calls)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::str_to_string)]
// Cargo lints (warn, not deny since cargo lints can be noisy)
#![warn(clippy::cargo)]
// Unused / redundant code
#![deny(unused_results)]
#![deny(unused_qualifications)]
// Cast hygiene
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]

//! Real-time multi-algorithm blur and compositing for video-production
//! hosts.
//!
//! One [`filter::CompositeBlurFilter`] per filter instance blurs the host's
//! frame with one of several algorithms (Gaussian, Box, fractional
//! dual-Kawase, pixelate, temporal), optionally over a background source and
//! optionally restricted by a mask.
//!
//! # Key entry points
//!
//! - [`filter::CompositeBlurFilter`] - lifecycle entry points the host calls
//! - [`options::Settings`] / [`options::FilterOptions`] - configuration
//! - [`gpu::backend::GraphicsBackend`] - the device the passes draw through,
//!   with a software [`gpu::cpu::CpuBackend`] and a
//!   [`gpu::wgpu_backend::WgpuBackend`]
//! - [`kernel::Kernel`] - Gaussian kernel compression into linear-sampled taps
//!
//! # Architecture
//!
//! Each frame copies the host input into a fixed pool of render targets,
//! composites it over the background, runs the selected algorithm and blends
//! the blurred result back toward the input outside the mask. Programs and
//! their parameter handles are resolved once per configuration change.

pub mod error;
pub mod filter;
pub mod gpu;
pub mod kernel;
pub mod options;
pub mod renderer;
pub mod util;

pub use error::BlurError;
pub use filter::{CompositeBlurFilter, FrameInputs, FrameOutput};
pub use options::{FilterOptions, Settings};
