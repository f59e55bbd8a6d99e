use serde::{Deserialize, Serialize};

use super::settings::{SettingValue, Settings};

/// Temporal blur parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TemporalOptions {
    /// Weight of the current frame in the running average (1 − decay).
    pub current_weight: f32,
    /// Per-channel difference above which a pixel restarts from the current
    /// frame. 1.0 never restarts.
    pub clear_threshold: f32,
}

impl Default for TemporalOptions {
    fn default() -> Self {
        Self {
            current_weight: 0.1,
            clear_threshold: 1.0,
        }
    }
}

impl TemporalOptions {
    pub(super) fn register_defaults(settings: &mut Settings) {
        let d = Self::default();
        settings.set_default(
            "temporal_current_weight",
            SettingValue::Float(f64::from(d.current_weight)),
        );
        settings.set_default(
            "temporal_clear_threshold",
            SettingValue::Float(f64::from(d.clear_threshold)),
        );
    }

    pub(super) fn from_settings(settings: &Settings) -> Self {
        Self {
            current_weight: settings
                .get_double("temporal_current_weight")
                .clamp(0.0, 1.0) as f32,
            clear_threshold: settings
                .get_double("temporal_clear_threshold")
                .clamp(0.0, 1.0) as f32,
        }
    }
}
