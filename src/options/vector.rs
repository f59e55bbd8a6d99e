use serde::{Deserialize, Serialize};

use super::settings::{SettingValue, Settings};

/// Channel the vector blur differentiates (`vector_blur_channel`).
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum VectorChannel {
    /// Red.
    Red,
    /// Green.
    Green,
    /// Blue.
    Blue,
    /// Alpha.
    Alpha,
    /// Rec. 601 luma.
    #[default]
    Luminance,
    /// HSV saturation.
    Saturation,
}

impl VectorChannel {
    /// Decode a settings integer; unknown codes select luminance.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Red,
            1 => Self::Green,
            2 => Self::Blue,
            3 => Self::Alpha,
            5 => Self::Saturation,
            _ => Self::Luminance,
        }
    }

    /// Integer code passed to the gradient program.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

/// Finite-difference scheme of the gradient estimator
/// (`vector_blur_gradient_type`).
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum GradientType {
    /// 3x3 Sobel.
    #[default]
    Sobel,
    /// One-sided forward difference.
    ForwardDifference,
    /// Central difference.
    CentralDifference,
}

impl GradientType {
    /// Decode a settings integer; unknown codes select Sobel.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            1 => Self::ForwardDifference,
            2 => Self::CentralDifference,
            _ => Self::Sobel,
        }
    }

    /// Integer code passed to the gradient program.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

/// Vector blur parameters. The kernel radius is the blur radius.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VectorBlurOptions {
    /// Differentiated channel.
    pub channel: VectorChannel,
    /// Gradient estimator.
    pub gradient_type: GradientType,
    /// Pixels per kernel pixel along the field.
    pub amount: f32,
    /// Pyramid strength used to smooth the direction field.
    pub smoothing: f32,
}

impl Default for VectorBlurOptions {
    fn default() -> Self {
        Self {
            channel: VectorChannel::Luminance,
            gradient_type: GradientType::Sobel,
            amount: 1.0,
            smoothing: 4.0,
        }
    }
}

impl VectorBlurOptions {
    pub(super) fn register_defaults(settings: &mut Settings) {
        let d = Self::default();
        settings.set_default(
            "vector_blur_channel",
            SettingValue::Int(i64::from(d.channel.code())),
        );
        settings.set_default(
            "vector_blur_amount",
            SettingValue::Float(f64::from(d.amount)),
        );
        settings.set_default(
            "vector_blur_smoothing",
            SettingValue::Float(f64::from(d.smoothing)),
        );
    }

    pub(super) fn from_settings(settings: &Settings) -> Self {
        Self {
            channel: VectorChannel::from_code(settings.get_int("vector_blur_channel")),
            gradient_type: GradientType::from_code(
                settings.get_int("vector_blur_gradient_type"),
            ),
            amount: settings.get_double("vector_blur_amount") as f32,
            smoothing: settings.get_double("vector_blur_smoothing").max(0.0) as f32,
        }
    }
}
