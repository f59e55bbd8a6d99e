//! CPU implementations of the shipped programs.
//!
//! Each program mirrors its WGSL counterpart in `data/shaders/`: same
//! parameter table, same per-texel math. Parameters are resolved once per
//! draw into a shading closure that is then evaluated at every texel center.

use glam::{Vec2, Vec4};
use rustc_hash::FxHashMap;

use super::surface::CpuImage;
use crate::gpu::backend::{ParamInfo, ParamKind, ParamValue, TextureId};
use crate::kernel::KERNEL_CAPACITY;

const TEXTURE: ParamKind = ParamKind::Texture;
const FLOAT: ParamKind = ParamKind::Float;
const INT: ParamKind = ParamKind::Int;
const BOOL: ParamKind = ParamKind::Bool;
const VEC2: ParamKind = ParamKind::Vec2;
const VEC4: ParamKind = ParamKind::Vec4;
const KERNEL_ARRAY: ParamKind = ParamKind::FloatArray(KERNEL_CAPACITY);

const KERNEL_PARAMS: &[(&str, ParamKind)] = &[
    ("kernel_texture", TEXTURE),
    ("weight", KERNEL_ARRAY),
    ("offset", KERNEL_ARRAY),
    ("kernel_size", INT),
    ("use_kernel_texture", BOOL),
];

const PIXELATE_PARAMS: &[(&str, ParamKind)] = &[
    ("image", TEXTURE),
    ("pixel_size", FLOAT),
    ("uv_size", VEC2),
    ("origin", VEC2),
    ("time", FLOAT),
];

type Shader<'a> = Box<dyn Fn(Vec2) -> Vec4 + 'a>;

/// Every program the software backend can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum CpuProgram {
    Copy,
    Composite,
    Mix,
    KawaseDown,
    KawaseUp,
    Gaussian1d,
    GaussianMotion,
    GaussianRadial,
    GaussianTiltShift,
    Box1d,
    BoxRadial,
    BoxTiltShift,
    PixelateSquare,
    PixelateHexagonal,
    PixelateCircle,
    PixelateTriangle,
    PixelateVoronoi,
    Temporal,
    VectorGradient,
    VectorBlur,
    MaskCrop,
    MaskSource,
    MaskCircle,
}

impl CpuProgram {
    pub(super) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "copy" => Self::Copy,
            "composite" => Self::Composite,
            "mix" => Self::Mix,
            "dual_kawase_down" => Self::KawaseDown,
            "dual_kawase_up" => Self::KawaseUp,
            "gaussian_1d" => Self::Gaussian1d,
            "gaussian_motion" => Self::GaussianMotion,
            "gaussian_radial" => Self::GaussianRadial,
            "gaussian_tiltshift" => Self::GaussianTiltShift,
            "box_1d" => Self::Box1d,
            "box_radial" => Self::BoxRadial,
            "box_tiltshift" => Self::BoxTiltShift,
            "pixelate_square" => Self::PixelateSquare,
            "pixelate_hexagonal" => Self::PixelateHexagonal,
            "pixelate_circle" => Self::PixelateCircle,
            "pixelate_triangle" => Self::PixelateTriangle,
            "pixelate_voronoi" => Self::PixelateVoronoi,
            "temporal" => Self::Temporal,
            "vector_gradient" => Self::VectorGradient,
            "vector_blur" => Self::VectorBlur,
            "mask_crop" => Self::MaskCrop,
            "mask_source" => Self::MaskSource,
            "mask_circle" => Self::MaskCircle,
            _ => return None,
        })
    }

    /// Parameter table, identical to what reflection yields for the WGSL.
    pub(super) fn params(self) -> Vec<ParamInfo> {
        let mut table: Vec<(&str, ParamKind)> = vec![("image", TEXTURE)];
        match self {
            Self::Copy => {}
            Self::Composite => table.push(("background", TEXTURE)),
            Self::Mix => table.extend([("image2", TEXTURE), ("ratio", FLOAT)]),
            Self::KawaseDown | Self::KawaseUp => {
                table.push(("texel_step", VEC2));
            }
            Self::Gaussian1d | Self::GaussianMotion => {
                table.extend_from_slice(KERNEL_PARAMS);
                table.push(("texel_step", VEC2));
            }
            Self::GaussianRadial => {
                table.extend_from_slice(KERNEL_PARAMS);
                table.extend([("uv_size", VEC2), ("radial_center", VEC2)]);
            }
            Self::GaussianTiltShift => {
                table.extend_from_slice(KERNEL_PARAMS);
                table.extend([
                    ("texel_step", VEC2),
                    ("uv_size", VEC2),
                    ("focus_center", FLOAT),
                    ("focus_width", FLOAT),
                    ("focus_angle", FLOAT),
                ]);
            }
            Self::Box1d => table.extend([("texel_step", VEC2), ("radius", FLOAT)]),
            Self::BoxRadial => table.extend([
                ("uv_size", VEC2),
                ("radial_center", VEC2),
                ("radius", FLOAT),
            ]),
            Self::BoxTiltShift => table.extend([
                ("texel_step", VEC2),
                ("radius", FLOAT),
                ("uv_size", VEC2),
                ("focus_center", FLOAT),
                ("focus_width", FLOAT),
                ("focus_angle", FLOAT),
            ]),
            Self::PixelateSquare
            | Self::PixelateHexagonal
            | Self::PixelateCircle
            | Self::PixelateTriangle
            | Self::PixelateVoronoi => {
                table = PIXELATE_PARAMS.to_vec();
            }
            Self::Temporal => table.extend([
                ("prior_image", TEXTURE),
                ("current_weight", FLOAT),
                ("clear_threshold", FLOAT),
            ]),
            Self::VectorGradient => table.extend([
                ("texel_step", VEC2),
                ("channel", INT),
                ("gradient_type", INT),
            ]),
            Self::VectorBlur => {
                table.push(("direction_map", TEXTURE));
                table.extend_from_slice(KERNEL_PARAMS);
                table.extend([("uv_size", VEC2), ("amount", FLOAT)]);
            }
            Self::MaskCrop => table.extend([
                ("filtered_image", TEXTURE),
                ("scale", VEC2),
                ("offset", VEC2),
                ("box_aspect_ratio", VEC2),
                ("corner_radius", FLOAT),
                ("feathering", FLOAT),
                ("inv", BOOL),
            ]),
            Self::MaskSource => table.extend([
                ("filtered_image", TEXTURE),
                ("alpha_source", TEXTURE),
                ("rgba_weights", VEC4),
                ("multiplier", FLOAT),
                ("inv", BOOL),
            ]),
            Self::MaskCircle => table.extend([
                ("filtered_image", TEXTURE),
                ("center", VEC2),
                ("circle_radius", FLOAT),
                ("feathering", FLOAT),
                ("uv_scale", VEC2),
                ("inv", BOOL),
            ]),
        }
        table
            .into_iter()
            .map(|(name, kind)| ParamInfo::new(name, kind))
            .collect()
    }

    /// Shade every texel of `out`.
    pub(super) fn render(self, b: &Bindings<'_>, out: &mut CpuImage) {
        let shade = self.shader(b);
        let width = out.width() as usize;
        let size = Vec2::new(out.width() as f32, out.height() as f32);
        for (i, texel) in out.texels_mut().iter_mut().enumerate() {
            let pixel = Vec2::new((i % width) as f32, (i / width) as f32);
            *texel = shade((pixel + 0.5) / size);
        }
    }

    fn shader<'a>(self, b: &Bindings<'a>) -> Shader<'a> {
        let image = b.texture("image");
        match self {
            Self::Copy => Box::new(move |uv| image.sample(uv)),
            Self::Composite => {
                let background = b.texture("background");
                Box::new(move |uv| {
                    let c = image.sample(uv);
                    c + background.sample(uv) * (1.0 - c.w)
                })
            }
            Self::Mix => {
                let image2 = b.texture("image2");
                let ratio = b.float("ratio");
                Box::new(move |uv| image.sample(uv).lerp(image2.sample(uv), ratio))
            }
            Self::KawaseDown => {
                let hp = b.vec2("texel_step") * 0.5;
                let flip = Vec2::new(hp.x, -hp.y);
                Box::new(move |uv| {
                    (image.sample(uv) * 4.0
                        + image.sample(uv - hp)
                        + image.sample(uv + hp)
                        + image.sample(uv + flip)
                        + image.sample(uv - flip))
                        / 8.0
                })
            }
            Self::KawaseUp => {
                let hp = b.vec2("texel_step") * 0.5;
                Box::new(move |uv| kawase_up(image, uv, hp))
            }
            Self::Gaussian1d => {
                let taps = KernelTaps::bind(b);
                let step = b.vec2("texel_step");
                Box::new(move |uv| taps.convolve(image, uv, step))
            }
            Self::GaussianMotion => {
                let taps = KernelTaps::bind(b);
                let step = b.vec2("texel_step");
                Box::new(move |uv| taps.trail(image, uv, step))
            }
            Self::GaussianRadial => {
                let taps = KernelTaps::bind(b);
                let uv_size = b.vec2("uv_size");
                let center = b.vec2("radial_center");
                Box::new(move |uv| {
                    taps.convolve(image, uv, radial_step(uv, center, uv_size))
                })
            }
            Self::GaussianTiltShift => {
                let taps = KernelTaps::bind(b);
                let step = b.vec2("texel_step");
                let focus = Focus::bind(b);
                Box::new(move |uv| taps.convolve(image, uv, step * focus.amount(uv)))
            }
            Self::Box1d => {
                let step = b.vec2("texel_step");
                let radius = b.float("radius");
                Box::new(move |uv| box_sum(image, uv, step, radius))
            }
            Self::BoxRadial => {
                let uv_size = b.vec2("uv_size");
                let center = b.vec2("radial_center");
                let radius = b.float("radius");
                Box::new(move |uv| {
                    box_sum(image, uv, radial_step(uv, center, uv_size), radius)
                })
            }
            Self::BoxTiltShift => {
                let step = b.vec2("texel_step");
                let radius = b.float("radius");
                let focus = Focus::bind(b);
                Box::new(move |uv| {
                    box_sum(image, uv, step * focus.amount(uv), radius)
                })
            }
            Self::PixelateSquare
            | Self::PixelateHexagonal
            | Self::PixelateCircle
            | Self::PixelateTriangle
            | Self::PixelateVoronoi => self.pixelate(b, image),
            Self::Temporal => {
                let prior = b.texture("prior_image");
                let weight = b.float("current_weight");
                let threshold = b.float("clear_threshold");
                Box::new(move |uv| {
                    let current = image.sample(uv);
                    let previous = prior.sample(uv);
                    if (current - previous).abs().max_element() > threshold {
                        current
                    } else {
                        current * weight + previous * (1.0 - weight)
                    }
                })
            }
            Self::VectorGradient => {
                let step = b.vec2("texel_step");
                let channel = b.int("channel");
                let gradient_type = b.int("gradient_type");
                Box::new(move |uv| {
                    let g = gradient(image, uv, step, channel, gradient_type);
                    Vec4::new(g.x, g.y, g.length(), 1.0)
                })
            }
            Self::VectorBlur => {
                let taps = KernelTaps::bind(b);
                let direction = b.texture("direction_map");
                let uv_size = b.vec2("uv_size");
                let amount = b.float("amount");
                Box::new(move |uv| {
                    let g = direction.sample(uv).truncate().truncate();
                    let len = g.length();
                    let step = if len > 1.0e-6 {
                        Vec2::new(-g.y, g.x) / len / uv_size * amount
                    } else {
                        Vec2::ZERO
                    };
                    taps.convolve(image, uv, step)
                })
            }
            Self::MaskCrop => {
                let filtered = b.texture("filtered_image");
                let scale = b.vec2("scale");
                let offset = b.vec2("offset");
                let box_ar = b.vec2("box_aspect_ratio");
                let corner = b.float("corner_radius");
                let feather = b.float("feathering");
                let inv = b.flag("inv");
                Box::new(move |uv| {
                    let p = ((uv - offset) * scale - 0.5) * box_ar;
                    let d = rounded_box_distance(p, box_ar * 0.5, corner);
                    masked(image, filtered, uv, edge_mask(d, feather), inv)
                })
            }
            Self::MaskSource => {
                let filtered = b.texture("filtered_image");
                let alpha = b.texture("alpha_source");
                let weights = b.vec4("rgba_weights");
                let multiplier = b.float("multiplier");
                let inv = b.flag("inv");
                Box::new(move |uv| {
                    let m = (alpha.sample(uv).dot(weights) * multiplier).clamp(0.0, 1.0);
                    masked(image, filtered, uv, m, inv)
                })
            }
            Self::MaskCircle => {
                let filtered = b.texture("filtered_image");
                let center = b.vec2("center");
                let radius = b.float("circle_radius");
                let feather = b.float("feathering");
                let uv_scale = b.vec2("uv_scale");
                let inv = b.flag("inv");
                Box::new(move |uv| {
                    let d = ((uv - center) * uv_scale).length() - radius;
                    masked(image, filtered, uv, edge_mask(d, feather), inv)
                })
            }
        }
    }

    fn pixelate<'a>(self, b: &Bindings<'a>, image: &'a CpuImage) -> Shader<'a> {
        let size = b.float("pixel_size").max(1.0);
        let uv_size = b.vec2("uv_size").max(Vec2::ONE);
        let origin = b.vec2("origin");
        let time = b.float("time");
        Box::new(move |uv| {
            let q = uv * uv_size - origin;
            let cell = (q / size).floor();
            let center = match self {
                Self::PixelateHexagonal => hex_center(q, size),
                Self::PixelateCircle => {
                    let c = (cell + 0.5) * size;
                    if (q - c).length() > size * 0.5 {
                        return Vec4::ZERO;
                    }
                    c
                }
                Self::PixelateTriangle => {
                    let f = q / size - cell;
                    let centroid = if f.x + f.y < 1.0 {
                        Vec2::splat(1.0 / 3.0)
                    } else {
                        Vec2::splat(2.0 / 3.0)
                    };
                    (cell + centroid) * size
                }
                Self::PixelateVoronoi => voronoi_center(q / size, time) * size,
                _ => (cell + 0.5) * size,
            };
            image.sample((center + origin) / uv_size)
        })
    }
}

/// Parameter values of one draw, looked up by name.
pub(super) struct Bindings<'a> {
    pub(super) params: &'a [ParamInfo],
    pub(super) values: &'a [Option<ParamValue>],
    pub(super) textures: &'a FxHashMap<TextureId, CpuImage>,
    pub(super) dummy: &'a CpuImage,
}

impl<'a> Bindings<'a> {
    fn value(&self, name: &str) -> Option<&'a ParamValue> {
        let index = self.params.iter().position(|p| p.name == name)?;
        self.values.get(index)?.as_ref()
    }

    fn float(&self, name: &str) -> f32 {
        match self.value(name) {
            Some(ParamValue::Float(v)) => *v,
            _ => 0.0,
        }
    }

    fn int(&self, name: &str) -> i32 {
        match self.value(name) {
            Some(ParamValue::Int(v)) => *v,
            _ => 0,
        }
    }

    fn flag(&self, name: &str) -> bool {
        matches!(self.value(name), Some(ParamValue::Bool(true)))
    }

    fn vec2(&self, name: &str) -> Vec2 {
        match self.value(name) {
            Some(ParamValue::Vec2(v)) => *v,
            _ => Vec2::ZERO,
        }
    }

    fn vec4(&self, name: &str) -> Vec4 {
        match self.value(name) {
            Some(ParamValue::Vec4(v)) => *v,
            _ => Vec4::ZERO,
        }
    }

    fn floats(&self, name: &str) -> &'a [f32] {
        match self.value(name) {
            Some(ParamValue::FloatArray(v)) => v,
            _ => &[],
        }
    }

    fn texture(&self, name: &str) -> &'a CpuImage {
        match self.value(name) {
            Some(ParamValue::Texture(id)) => {
                self.textures.get(id).unwrap_or(self.dummy)
            }
            _ => self.dummy,
        }
    }
}

/// Kernel taps read from either encoding.
struct KernelTaps {
    center: f32,
    taps: Vec<(f32, f32)>,
}

impl KernelTaps {
    fn bind(b: &Bindings<'_>) -> Self {
        let size = usize::try_from(b.int("kernel_size"))
            .unwrap_or(0)
            .min(KERNEL_CAPACITY);
        let all: Vec<(f32, f32)> = if b.flag("use_kernel_texture") {
            let texture = b.texture("kernel_texture");
            (0..KERNEL_CAPACITY)
                .map(|i| {
                    let t = texture.texel(i as i64, 0);
                    (t.x, t.y)
                })
                .collect()
        } else {
            let weights = b.floats("weight");
            let offsets = b.floats("offset");
            (0..KERNEL_CAPACITY)
                .map(|i| {
                    (
                        weights.get(i).copied().unwrap_or(0.0),
                        offsets.get(i).copied().unwrap_or(0.0),
                    )
                })
                .collect()
        };
        Self {
            center: all[0].0,
            taps: all.into_iter().take(size).skip(1).collect(),
        }
    }

    /// Symmetric convolution along `step` (uv per kernel pixel).
    fn convolve(&self, image: &CpuImage, uv: Vec2, step: Vec2) -> Vec4 {
        let mut acc = image.sample(uv) * self.center;
        for &(weight, offset) in &self.taps {
            let d = step * offset;
            acc += (image.sample(uv + d) + image.sample(uv - d)) * weight;
        }
        acc
    }

    /// One-sided trailing convolution; mirrored weight lands on the trail.
    fn trail(&self, image: &CpuImage, uv: Vec2, step: Vec2) -> Vec4 {
        let mut acc = image.sample(uv) * self.center;
        for &(weight, offset) in &self.taps {
            acc += image.sample(uv - step * offset) * (2.0 * weight);
        }
        acc
    }
}

/// Tilt-shift focus band parameters.
#[derive(Clone, Copy)]
struct Focus {
    uv_size: Vec2,
    center: f32,
    width: f32,
    angle: f32,
}

impl Focus {
    fn bind(b: &Bindings<'_>) -> Self {
        Self {
            uv_size: b.vec2("uv_size"),
            center: b.float("focus_center"),
            width: b.float("focus_width"),
            angle: b.float("focus_angle"),
        }
    }

    /// 0 inside the focus band, easing to 1 one band-width outside it.
    fn amount(self, uv: Vec2) -> f32 {
        let aspect = if self.uv_size.y > 0.0 {
            self.uv_size.x / self.uv_size.y
        } else {
            1.0
        };
        let p = Vec2::new((uv.x - 0.5) * aspect, uv.y - self.center);
        let normal = Vec2::new(-self.angle.sin(), self.angle.cos());
        let dist = p.dot(normal).abs();
        let band = self.width.max(0.05);
        smoothstep(self.width, self.width + band, dist)
    }
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Per-texel zoom direction: points away from the center, one kernel pixel
/// spanning `distance / max(width, height)` pixels.
fn radial_step(uv: Vec2, center: Vec2, uv_size: Vec2) -> Vec2 {
    let size = uv_size.max(Vec2::ONE);
    let d = (uv - center / size) * size;
    d / (size * size.max_element())
}

fn kawase_up(image: &CpuImage, uv: Vec2, hp: Vec2) -> Vec4 {
    let mut sum = image.sample(uv + Vec2::new(-hp.x * 2.0, 0.0));
    sum += image.sample(uv + Vec2::new(-hp.x, hp.y)) * 2.0;
    sum += image.sample(uv + Vec2::new(0.0, hp.y * 2.0));
    sum += image.sample(uv + Vec2::new(hp.x, hp.y)) * 2.0;
    sum += image.sample(uv + Vec2::new(hp.x * 2.0, 0.0));
    sum += image.sample(uv + Vec2::new(hp.x, -hp.y)) * 2.0;
    sum += image.sample(uv + Vec2::new(0.0, -hp.y * 2.0));
    sum += image.sample(uv + Vec2::new(-hp.x, -hp.y)) * 2.0;
    sum / 12.0
}

/// Box average over `[-radius, radius]` kernel pixels along `step`; the
/// outermost pair is weighted by the fractional part of the radius.
fn box_sum(image: &CpuImage, uv: Vec2, step: Vec2, radius: f32) -> Vec4 {
    let radius = radius.max(0.0);
    let whole = radius.floor();
    let frac = radius - whole;
    let mut acc = image.sample(uv);
    let mut total = 1.0;
    let mut i = 1.0;
    while i <= whole {
        acc += image.sample(uv + step * i) + image.sample(uv - step * i);
        total += 2.0;
        i += 1.0;
    }
    if frac > 0.0 {
        acc += (image.sample(uv + step * i) + image.sample(uv - step * i)) * frac;
        total += 2.0 * frac;
    }
    acc / total
}

fn channel_value(c: Vec4, channel: i32) -> f32 {
    match channel {
        0 => c.x,
        1 => c.y,
        2 => c.z,
        3 => c.w,
        4 => c.truncate().dot(glam::Vec3::new(0.299, 0.587, 0.114)),
        _ => {
            let rgb = c.truncate();
            let hi = rgb.max_element();
            if hi > 0.0 {
                (hi - rgb.min_element()) / hi
            } else {
                0.0
            }
        }
    }
}

/// Gradient of the selected channel: 0 Sobel, 1 forward, 2 central.
fn gradient(image: &CpuImage, uv: Vec2, step: Vec2, channel: i32, kind: i32) -> Vec2 {
    let v = |i: f32, j: f32| {
        channel_value(image.sample(uv + step * Vec2::new(i, j)), channel)
    };
    match kind {
        1 => Vec2::new(v(1.0, 0.0) - v(0.0, 0.0), v(0.0, 1.0) - v(0.0, 0.0)),
        2 => Vec2::new(v(1.0, 0.0) - v(-1.0, 0.0), v(0.0, 1.0) - v(0.0, -1.0)) * 0.5,
        _ => {
            let gx = (v(1.0, -1.0) + 2.0 * v(1.0, 0.0) + v(1.0, 1.0))
                - (v(-1.0, -1.0) + 2.0 * v(-1.0, 0.0) + v(-1.0, 1.0));
            let gy = (v(-1.0, 1.0) + 2.0 * v(0.0, 1.0) + v(1.0, 1.0))
                - (v(-1.0, -1.0) + 2.0 * v(0.0, -1.0) + v(1.0, -1.0));
            Vec2::new(gx, gy) / 8.0
        }
    }
}

/// Signed distance to a rounded box of half-extent `half` centered at 0.
fn rounded_box_distance(p: Vec2, half: Vec2, radius: f32) -> f32 {
    let q = p.abs() - half + radius;
    q.max(Vec2::ZERO).length() + q.max_element().min(0.0) - radius
}

/// 1 inside (d <= 0), fading to 0 over `feather` toward the edge.
fn edge_mask(d: f32, feather: f32) -> f32 {
    if feather > 0.0 {
        smoothstep(0.0, feather, -d)
    } else if d <= 0.0 {
        1.0
    } else {
        0.0
    }
}

fn masked(image: &CpuImage, filtered: &CpuImage, uv: Vec2, m: f32, inv: bool) -> Vec4 {
    let m = if inv { 1.0 - m } else { m };
    image.sample(uv).lerp(filtered.sample(uv), m)
}

fn positive_mod(x: Vec2, y: Vec2) -> Vec2 {
    x - y * (x / y).floor()
}

fn hex_center(q: Vec2, size: f32) -> Vec2 {
    let r = Vec2::new(1.0, 1.732_050_8) * size;
    let h = r * 0.5;
    let a = positive_mod(q, r) - h;
    let b = positive_mod(q - h, r) - h;
    if a.dot(a) < b.dot(b) {
        q - a
    } else {
        q - b
    }
}

fn hash2(c: Vec2) -> Vec2 {
    let s = Vec2::new(
        c.dot(Vec2::new(127.1, 311.7)).sin(),
        c.dot(Vec2::new(269.5, 183.3)).sin(),
    ) * 43_758.547;
    s - s.floor()
}

/// Nearest jittered seed (in cell units) to `g`, seeds drifting with `time`.
fn voronoi_center(g: Vec2, time: f32) -> Vec2 {
    let cell = g.floor();
    let mut best = cell + 0.5;
    let mut best_dist = f32::MAX;
    for j in -1..=1 {
        for i in -1..=1 {
            let n = cell + Vec2::new(i as f32, j as f32);
            let h = hash2(n) * std::f32::consts::TAU + time;
            let seed = n + 0.5 + Vec2::new(h.x.sin(), h.y.sin()) * 0.35;
            let dist = (g - seed).length_squared();
            if dist < best_dist {
                best_dist = dist;
                best = seed;
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_program_name_resolves() {
        for name in crate::gpu::shader_loader::PROGRAM_NAMES {
            assert!(CpuProgram::from_name(name).is_some(), "{name}");
        }
        assert!(CpuProgram::from_name("bogus").is_none());
    }

    #[test]
    fn param_tables_have_unique_names() {
        for name in crate::gpu::shader_loader::PROGRAM_NAMES {
            let params = CpuProgram::from_name(name).unwrap().params();
            let mut names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), params.len(), "{name}");
        }
    }

    #[test]
    fn rounded_box_distance_signs() {
        let half = Vec2::new(1.0, 0.5);
        assert!(rounded_box_distance(Vec2::ZERO, half, 0.0) < 0.0);
        assert!(rounded_box_distance(Vec2::new(2.0, 0.0), half, 0.0) > 0.0);
        assert!((rounded_box_distance(Vec2::new(1.5, 0.0), half, 0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn saturation_and_luma_channels() {
        let c = Vec4::new(1.0, 0.5, 0.0, 1.0);
        assert!((channel_value(c, 5) - 1.0).abs() < 1e-6);
        assert!((channel_value(Vec4::ONE, 4) - 1.0).abs() < 1e-6);
        assert_eq!(channel_value(Vec4::ZERO, 5), 0.0);
    }

    #[test]
    fn hex_center_is_within_a_cell() {
        let size = 10.0;
        for &q in &[Vec2::new(3.0, 4.0), Vec2::new(57.0, 21.0), Vec2::new(-8.0, 13.0)] {
            assert!((hex_center(q, size) - q).length() <= size);
        }
    }

    #[test]
    fn focus_band_is_sharp_inside() {
        let focus = Focus {
            uv_size: Vec2::new(100.0, 100.0),
            center: 0.5,
            width: 0.1,
            angle: 0.0,
        };
        assert_eq!(focus.amount(Vec2::new(0.3, 0.5)), 0.0);
        assert_eq!(focus.amount(Vec2::new(0.3, 0.95)), 1.0);
    }
}
