use serde::{Deserialize, Serialize};

use super::settings::{SettingValue, Settings};

/// Selected blur algorithm (`blur_algorithm`).
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum BlurAlgorithm {
    /// Pass the input through unchanged.
    #[default]
    None,
    /// Separable Gaussian convolution.
    Gaussian,
    /// Separable box convolution.
    Box,
    /// Fractional dual-Kawase pyramid.
    DualKawase,
    /// Tessellated pixelation.
    Pixelate,
    /// Exponential moving average over frames.
    Temporal,
}

impl BlurAlgorithm {
    /// Decode a settings integer; unknown codes select [`Self::None`].
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Gaussian,
            2 => Self::Box,
            3 => Self::DualKawase,
            4 => Self::Pixelate,
            5 => Self::Temporal,
            _ => Self::None,
        }
    }
}

/// Sub-type of the Gaussian and Box algorithms (`blur_type`).
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum BlurType {
    /// No sub-type selected.
    #[default]
    None,
    /// Horizontal then vertical.
    Area,
    /// Along `angle` only.
    Directional,
    /// Radially away from `center`.
    Zoom,
    /// One-sided trail along `angle`.
    Motion,
    /// Area blur attenuated near a focus line.
    TiltShift,
    /// Along the isolines of a smoothed gradient field.
    Vector,
}

impl BlurType {
    /// Decode a settings integer; unknown codes select [`Self::None`].
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Area,
            2 => Self::Directional,
            3 => Self::Zoom,
            4 => Self::Motion,
            5 => Self::TiltShift,
            6 => Self::Vector,
            _ => Self::None,
        }
    }
}

/// Core blur parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BlurOptions {
    /// Algorithm selection.
    pub algorithm: BlurAlgorithm,
    /// Gaussian/Box sub-type.
    pub blur_type: BlurType,
    /// Blur radius in host units (pixels for Box and Pixelate).
    pub radius: f32,
    /// Repetitions of the Box shape, 1..=5.
    pub passes: u32,
    /// Pyramid strength of the dual-Kawase algorithm.
    pub kawase_passes: f32,
    /// Direction of Directional and Motion blurs, degrees.
    pub angle: f32,
    /// Zoom center in pixels.
    pub center: [f32; 2],
    /// Focus line position, 0 = bottom, 1 = top.
    pub tilt_shift_center: f32,
    /// Focus band width as a fraction of the height.
    pub tilt_shift_width: f32,
    /// Focus line rotation, degrees.
    pub tilt_shift_angle: f32,
}

impl Default for BlurOptions {
    fn default() -> Self {
        Self {
            algorithm: BlurAlgorithm::None,
            blur_type: BlurType::None,
            radius: 10.0,
            passes: 1,
            kawase_passes: 10.0,
            angle: 0.0,
            center: [0.0, 0.0],
            tilt_shift_center: 0.5,
            tilt_shift_width: 0.3,
            tilt_shift_angle: 0.0,
        }
    }
}

impl BlurOptions {
    pub(super) fn register_defaults(settings: &mut Settings) {
        let d = Self::default();
        settings.set_default("radius", SettingValue::Float(f64::from(d.radius)));
        settings.set_default("passes", SettingValue::Int(i64::from(d.passes)));
        settings.set_default(
            "kawase_passes",
            SettingValue::Float(f64::from(d.kawase_passes)),
        );
        settings.set_default(
            "tilt_shift_center",
            SettingValue::Float(f64::from(d.tilt_shift_center)),
        );
        settings.set_default(
            "tilt_shift_width",
            SettingValue::Float(f64::from(d.tilt_shift_width)),
        );
    }

    pub(super) fn from_settings(settings: &Settings) -> Self {
        Self {
            algorithm: BlurAlgorithm::from_code(settings.get_int("blur_algorithm")),
            blur_type: BlurType::from_code(settings.get_int("blur_type")),
            radius: settings.get_double("radius").max(0.0) as f32,
            passes: settings.get_int("passes").clamp(1, 5) as u32,
            kawase_passes: settings.get_double("kawase_passes").max(0.0) as f32,
            angle: settings.get_double("angle") as f32,
            center: [
                settings.get_double("center_x") as f32,
                settings.get_double("center_y") as f32,
            ],
            tilt_shift_center: settings.get_double("tilt_shift_center") as f32,
            tilt_shift_width: settings.get_double("tilt_shift_width") as f32,
            tilt_shift_angle: settings.get_double("tilt_shift_angle") as f32,
        }
    }
}
