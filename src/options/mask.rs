use serde::{Deserialize, Serialize};

use super::settings::{SettingValue, Settings};

/// Shape that limits where the blur shows (`effect_mask`).
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum MaskType {
    /// Blur everywhere.
    #[default]
    None,
    /// Rounded box from edge margins.
    Crop,
    /// Weighted channels of another host source.
    Source,
    /// Weighted channels of an image file.
    Image,
    /// Rounded box from center and size.
    Rect,
    /// Disc.
    Circle,
}

impl MaskType {
    /// Decode a settings integer; unknown codes select [`Self::None`].
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Crop,
            2 => Self::Source,
            3 => Self::Image,
            4 => Self::Rect,
            5 => Self::Circle,
            _ => Self::None,
        }
    }

    /// Name of the program drawing this mask.
    #[must_use]
    pub const fn program(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Crop | Self::Rect => Some("mask_crop"),
            Self::Source | Self::Image => Some("mask_source"),
            Self::Circle => Some("mask_circle"),
        }
    }
}

/// How a source/image mask turns color into coverage
/// (`effect_mask_source_filter_list`).
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum MaskSourceFilter {
    /// Alpha channel.
    #[default]
    Alpha,
    /// Unweighted RGB mean.
    Grayscale,
    /// Rec. 601 luma.
    Luminosity,
    /// User channel weights.
    Sliders,
}

impl MaskSourceFilter {
    /// Decode a settings integer; unknown codes select alpha.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Grayscale,
            2 => Self::Luminosity,
            3 => Self::Sliders,
            _ => Self::Alpha,
        }
    }
}

/// Rounded box given by margins, in percent of the frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CropMask {
    /// Top margin.
    pub top: f32,
    /// Bottom margin.
    pub bottom: f32,
    /// Left margin.
    pub left: f32,
    /// Right margin.
    pub right: f32,
    /// Corner radius, percent of the shorter box side.
    pub corner_radius: f32,
    /// Edge softness, percent.
    pub feathering: f32,
    /// Blur outside instead of inside.
    pub invert: bool,
}

impl Default for CropMask {
    fn default() -> Self {
        Self {
            top: 20.0,
            bottom: 20.0,
            left: 20.0,
            right: 20.0,
            corner_radius: 0.0,
            feathering: 0.0,
            invert: false,
        }
    }
}

/// Rounded box given by center and size, in percent of the frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RectMask {
    /// Horizontal center.
    pub center_x: f32,
    /// Vertical center.
    pub center_y: f32,
    /// Box width.
    pub width: f32,
    /// Box height.
    pub height: f32,
    /// Corner radius, percent of the shorter box side.
    pub corner_radius: f32,
    /// Edge softness, percent.
    pub feathering: f32,
    /// Blur outside instead of inside.
    pub invert: bool,
}

impl Default for RectMask {
    fn default() -> Self {
        Self {
            center_x: 50.0,
            center_y: 50.0,
            width: 50.0,
            height: 50.0,
            corner_radius: 0.0,
            feathering: 0.0,
            invert: false,
        }
    }
}

impl RectMask {
    /// The equivalent crop margins.
    #[must_use]
    pub fn to_crop(&self) -> CropMask {
        CropMask {
            top: self.center_y - self.height / 2.0,
            bottom: 100.0 - self.center_y - self.height / 2.0,
            left: self.center_x - self.width / 2.0,
            right: 100.0 - self.center_x - self.width / 2.0,
            corner_radius: self.corner_radius,
            feathering: self.feathering,
            invert: self.invert,
        }
    }
}

/// Disc, in percent of the shorter frame side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CircleMask {
    /// Horizontal center, percent of the width.
    pub center_x: f32,
    /// Vertical center, percent of the height.
    pub center_y: f32,
    /// Radius.
    pub radius: f32,
    /// Edge softness.
    pub feathering: f32,
    /// Blur outside instead of inside.
    pub invert: bool,
}

impl Default for CircleMask {
    fn default() -> Self {
        Self {
            center_x: 50.0,
            center_y: 50.0,
            radius: 40.0,
            feathering: 0.0,
            invert: false,
        }
    }
}

/// Coverage taken from another source or an image file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceMask {
    /// Channel weighting preset.
    pub filter: MaskSourceFilter,
    /// RGBA weights used by [`MaskSourceFilter::Sliders`].
    pub sliders: [f32; 4],
    /// Coverage multiplier.
    pub multiplier: f32,
    /// Blur where coverage is low instead of high.
    pub invert: bool,
    /// Host source name for [`MaskType::Source`].
    pub source_name: String,
    /// Image path for [`MaskType::Image`].
    pub image_file: String,
}

impl Default for SourceMask {
    fn default() -> Self {
        Self {
            filter: MaskSourceFilter::Alpha,
            sliders: [0.0; 4],
            multiplier: 1.0,
            invert: false,
            source_name: String::new(),
            image_file: String::new(),
        }
    }
}

impl SourceMask {
    /// RGBA weights dotted with the mask texel.
    #[must_use]
    pub const fn weights(&self) -> [f32; 4] {
        match self.filter {
            MaskSourceFilter::Alpha => [0.0, 0.0, 0.0, 1.0],
            MaskSourceFilter::Grayscale => [0.33334, 0.33333, 0.33333, 0.0],
            MaskSourceFilter::Luminosity => [0.299, 0.587, 0.114, 0.0],
            MaskSourceFilter::Sliders => self.sliders,
        }
    }
}

/// Mask stage parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MaskOptions {
    /// Active mask.
    pub mask_type: MaskType,
    /// Crop geometry.
    pub crop: CropMask,
    /// Rect geometry.
    pub rect: RectMask,
    /// Circle geometry.
    pub circle: CircleMask,
    /// Source/image coverage.
    pub source: SourceMask,
}

impl MaskOptions {
    pub(super) fn register_defaults(settings: &mut Settings) {
        let crop = CropMask::default();
        let rect = RectMask::default();
        let circle = CircleMask::default();
        let float = |v: f32| SettingValue::Float(f64::from(v));
        for (key, value) in [
            ("effect_mask_crop_top", crop.top),
            ("effect_mask_crop_bottom", crop.bottom),
            ("effect_mask_crop_left", crop.left),
            ("effect_mask_crop_right", crop.right),
            ("effect_mask_rect_center_x", rect.center_x),
            ("effect_mask_rect_center_y", rect.center_y),
            ("effect_mask_rect_width", rect.width),
            ("effect_mask_rect_height", rect.height),
            ("effect_mask_circle_center_x", circle.center_x),
            ("effect_mask_circle_center_y", circle.center_y),
            ("effect_mask_circle_radius", circle.radius),
            (
                "effect_mask_source_filter_multiplier",
                SourceMask::default().multiplier,
            ),
        ] {
            settings.set_default(key, float(value));
        }
    }

    pub(super) fn from_settings(settings: &Settings) -> Self {
        let float = |key: &str| settings.get_double(key) as f32;
        Self {
            mask_type: MaskType::from_code(settings.get_int("effect_mask")),
            crop: CropMask {
                top: float("effect_mask_crop_top"),
                bottom: float("effect_mask_crop_bottom"),
                left: float("effect_mask_crop_left"),
                right: float("effect_mask_crop_right"),
                corner_radius: float("effect_mask_crop_corner_radius"),
                feathering: float("effect_mask_crop_feathering"),
                invert: settings.get_bool("effect_mask_crop_invert"),
            },
            rect: RectMask {
                center_x: float("effect_mask_rect_center_x"),
                center_y: float("effect_mask_rect_center_y"),
                width: float("effect_mask_rect_width"),
                height: float("effect_mask_rect_height"),
                corner_radius: float("effect_mask_rect_corner_radius"),
                feathering: float("effect_mask_rect_feathering"),
                invert: settings.get_bool("effect_mask_rect_invert"),
            },
            circle: CircleMask {
                center_x: float("effect_mask_circle_center_x"),
                center_y: float("effect_mask_circle_center_y"),
                radius: float("effect_mask_circle_radius"),
                feathering: float("effect_mask_circle_feathering"),
                invert: settings.get_bool("effect_mask_circle_invert"),
            },
            source: SourceMask {
                filter: MaskSourceFilter::from_code(
                    settings.get_int("effect_mask_source_filter_list"),
                ),
                sliders: [
                    float("effect_mask_source_filter_red"),
                    float("effect_mask_source_filter_green"),
                    float("effect_mask_source_filter_blue"),
                    float("effect_mask_source_filter_alpha"),
                ],
                multiplier: float("effect_mask_source_filter_multiplier"),
                invert: settings.get_bool("effect_mask_source_invert"),
                source_name: settings
                    .get_string("effect_mask_source_source")
                    .to_owned(),
                image_file: settings.get_string("effect_mask_source_file").to_owned(),
            },
        }
    }
}
