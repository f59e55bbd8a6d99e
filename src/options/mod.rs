//! Filter settings: the host's key/value store and the typed view the
//! renderers read.
//!
//! The host pushes a flat [`Settings`] store on create and on every property
//! change. [`FilterOptions::from_settings`] converts it into validated,
//! strongly typed sub-structs. Options also serialize to/from TOML presets;
//! every sub-struct uses `#[serde(default)]` so partial files work.

mod blur;
mod mask;
mod pixelate;
mod settings;
mod temporal;
mod vector;

use std::path::Path;

pub use blur::{BlurAlgorithm, BlurOptions, BlurType};
pub use mask::{
    CircleMask, CropMask, MaskOptions, MaskSourceFilter, MaskType, RectMask,
    SourceMask,
};
pub use pixelate::{PixelateOptions, PixelateType};
use serde::{Deserialize, Serialize};
pub use settings::{SettingValue, Settings};
pub use temporal::TemporalOptions;
pub use vector::{GradientType, VectorBlurOptions, VectorChannel};

use crate::error::BlurError;

fn register_defaults(settings: &mut Settings) {
    BlurOptions::register_defaults(settings);
    PixelateOptions::register_defaults(settings);
    TemporalOptions::register_defaults(settings);
    VectorBlurOptions::register_defaults(settings);
    MaskOptions::register_defaults(settings);
}

/// Selections whose change requires new programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReloadKey {
    /// Algorithm.
    pub algorithm: BlurAlgorithm,
    /// Gaussian/Box sub-type.
    pub blur_type: BlurType,
    /// Pixelation shape.
    pub pixelate: PixelateType,
    /// Mask shape.
    pub mask: MaskType,
}

/// Top-level typed options of one filter instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct FilterOptions {
    /// Algorithm selection and shared geometry.
    pub blur: BlurOptions,
    /// Pixelate parameters.
    pub pixelate: PixelateOptions,
    /// Temporal accumulation parameters.
    pub temporal: TemporalOptions,
    /// Vector blur parameters.
    pub vector: VectorBlurOptions,
    /// Mask stage.
    pub mask: MaskOptions,
    /// Name of the host source to render as the background; empty for none.
    ///
    /// The filter never resolves it. The host renders that source and lends
    /// the texture through `FrameInputs::background`.
    pub background: String,
}

impl FilterOptions {
    /// The configured background source name, if any.
    #[must_use]
    pub fn background_source(&self) -> Option<&str> {
        (!self.background.is_empty()).then_some(self.background.as_str())
    }

    /// Typed view of a settings store.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            blur: BlurOptions::from_settings(settings),
            pixelate: PixelateOptions::from_settings(settings),
            temporal: TemporalOptions::from_settings(settings),
            vector: VectorBlurOptions::from_settings(settings),
            mask: MaskOptions::from_settings(settings),
            background: settings.get_string("background").to_owned(),
        }
    }

    /// The selections that decide which programs are loaded.
    #[must_use]
    pub const fn reload_key(&self) -> ReloadKey {
        ReloadKey {
            algorithm: self.blur.algorithm,
            blur_type: self.blur.blur_type,
            pixelate: self.pixelate.shape,
            mask: self.mask.mask_type,
        }
    }

    /// Load options from a TOML file. Missing fields use defaults.
    ///
    /// # Errors
    ///
    /// Returns [`BlurError::Io`] or [`BlurError::Settings`].
    pub fn load(path: &Path) -> Result<Self, BlurError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| BlurError::Settings(e.to_string()))
    }

    /// Save options to a TOML file (pretty-printed).
    ///
    /// # Errors
    ///
    /// Returns [`BlurError::Settings`] or [`BlurError::Io`].
    pub fn save(&self, path: &Path) -> Result<(), BlurError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BlurError::Settings(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}
