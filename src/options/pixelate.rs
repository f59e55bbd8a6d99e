use serde::{Deserialize, Serialize};

use super::settings::{SettingValue, Settings};

/// Pixelation cell shape (`pixelate_type`).
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum PixelateType {
    /// Axis-aligned squares.
    #[default]
    Square,
    /// Hexagons.
    Hexagonal,
    /// Discs on a square grid; corners are transparent.
    Circle,
    /// Squares split along the anti-diagonal.
    Triangle,
    /// Jittered Voronoi cells.
    Voronoi,
}

impl PixelateType {
    /// Decode a settings integer; unknown codes select [`Self::Square`].
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            2 => Self::Hexagonal,
            3 => Self::Circle,
            4 => Self::Triangle,
            5 => Self::Voronoi,
            _ => Self::Square,
        }
    }

    /// Name of the program drawing this shape.
    #[must_use]
    pub const fn program(self) -> &'static str {
        match self {
            Self::Square => "pixelate_square",
            Self::Hexagonal => "pixelate_hexagonal",
            Self::Circle => "pixelate_circle",
            Self::Triangle => "pixelate_triangle",
            Self::Voronoi => "pixelate_voronoi",
        }
    }
}

/// Pixelate parameters. The cell size is the blur radius.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PixelateOptions {
    /// Cell shape.
    pub shape: PixelateType,
    /// Pre-smoothing strength as a percentage of the radius.
    pub smoothing_pct: f32,
    /// Grid origin in pixels.
    pub origin: [f32; 2],
    /// Drift Voronoi seeds over time.
    pub animate: bool,
    /// Animation clock multiplier.
    pub time_scale: f32,
}

impl Default for PixelateOptions {
    fn default() -> Self {
        Self {
            shape: PixelateType::Square,
            smoothing_pct: 0.0,
            origin: [0.0, 0.0],
            animate: false,
            time_scale: 1.0,
        }
    }
}

impl PixelateOptions {
    pub(super) fn register_defaults(settings: &mut Settings) {
        settings.set_default("pixelate_type", SettingValue::Int(1));
        settings.set_default("pixelate_time_scale", SettingValue::Float(1.0));
    }

    pub(super) fn from_settings(settings: &Settings) -> Self {
        Self {
            shape: PixelateType::from_code(settings.get_int("pixelate_type")),
            smoothing_pct: settings
                .get_double("pixelate_smoothing_pct")
                .clamp(0.0, 100.0) as f32,
            origin: [
                settings.get_double("pixelate_origin_x") as f32,
                settings.get_double("pixelate_origin_y") as f32,
            ],
            animate: settings.get_bool("pixelate_animate"),
            time_scale: settings.get_double("pixelate_time_scale") as f32,
        }
    }
}
