use glam::{Vec2, Vec4};

use crate::gpu::backend::TextureFormat;

/// Sample positions within this distance of a texel center read that texel
/// exactly, so same-size passes are bit-exact despite uv rounding.
const SNAP: f32 = 1.0e-4;

/// An RGBA image held as `f32` channels, regardless of the declared format.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuImage {
    width: u32,
    height: u32,
    format: TextureFormat,
    texels: Vec<Vec4>,
}

impl CpuImage {
    /// Transparent-black image.
    #[must_use]
    pub fn new(width: u32, height: u32, format: TextureFormat) -> Self {
        Self::filled(width, height, format, Vec4::ZERO)
    }

    /// Image where every texel is `color`.
    #[must_use]
    pub fn filled(
        width: u32,
        height: u32,
        format: TextureFormat,
        color: Vec4,
    ) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        Self {
            width,
            height,
            format,
            texels: vec![color; width as usize * height as usize],
        }
    }

    /// Image from row-major texels; `None` if the length does not match.
    #[must_use]
    pub fn from_texels(
        width: u32,
        height: u32,
        format: TextureFormat,
        texels: &[[f32; 4]],
    ) -> Option<Self> {
        if width == 0 || height == 0 || texels.len() != width as usize * height as usize
        {
            return None;
        }
        Some(Self {
            width,
            height,
            format,
            texels: texels.iter().map(|t| Vec4::from_array(*t)).collect(),
        })
    }

    /// Decode an 8-bit RGBA image.
    #[must_use]
    pub fn from_rgba8(image: &image::RgbaImage) -> Self {
        let texels = image
            .pixels()
            .map(|p| {
                Vec4::new(
                    f32::from(p[0]),
                    f32::from(p[1]),
                    f32::from(p[2]),
                    f32::from(p[3]),
                ) / 255.0
            })
            .collect();
        Self {
            width: image.width().max(1),
            height: image.height().max(1),
            format: TextureFormat::Rgba8Unorm,
            texels,
        }
    }

    /// Encode as 8-bit RGBA, clamping to `[0, 1]`.
    #[must_use]
    pub fn to_rgba8(&self) -> image::RgbaImage {
        let mut out = image::RgbaImage::new(self.width, self.height);
        for (pixel, texel) in out.pixels_mut().zip(&self.texels) {
            let c = (texel.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
            *pixel = image::Rgba([c.x as u8, c.y as u8, c.z as u8, c.w as u8]);
        }
        out
    }

    /// Row-major texels as arrays, for uploading to another backend.
    #[must_use]
    pub fn to_texels(&self) -> Vec<[f32; 4]> {
        self.texels.iter().map(|t| t.to_array()).collect()
    }

    /// Width in texels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in texels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Declared format.
    #[must_use]
    pub const fn format(&self) -> TextureFormat {
        self.format
    }

    /// Row-major texels.
    #[must_use]
    pub fn texels(&self) -> &[Vec4] {
        &self.texels
    }

    pub(super) fn texels_mut(&mut self) -> &mut [Vec4] {
        &mut self.texels
    }

    /// Texel at integer coordinates, clamped to the edge.
    #[must_use]
    pub fn texel(&self, x: i64, y: i64) -> Vec4 {
        let x = x.clamp(0, i64::from(self.width) - 1) as usize;
        let y = y.clamp(0, i64::from(self.height) - 1) as usize;
        self.texels[y * self.width as usize + x]
    }

    /// Bilinear sample at normalized coordinates, clamp-to-edge.
    #[must_use]
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let (x0, fx) = split(uv.x * self.width as f32 - 0.5);
        let (y0, fy) = split(uv.y * self.height as f32 - 0.5);
        let top = self.texel(x0, y0).lerp(self.texel(x0 + 1, y0), fx);
        let bottom =
            self.texel(x0, y0 + 1).lerp(self.texel(x0 + 1, y0 + 1), fx);
        top.lerp(bottom, fy)
    }
}

/// Integer texel and interpolation weight for a texel-space coordinate.
fn split(v: f32) -> (i64, f32) {
    if !v.is_finite() {
        return (0, 0.0);
    }
    let base = v.floor();
    let frac = v - base;
    if frac < SNAP {
        (base as i64, 0.0)
    } else if frac > 1.0 - SNAP {
        (base as i64 + 1, 0.0)
    } else {
        (base as i64, frac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> CpuImage {
        let texels: Vec<[f32; 4]> =
            (0..4).map(|i| [i as f32, 0.0, 0.0, 1.0]).collect();
        CpuImage::from_texels(4, 1, TextureFormat::Rgba16Float, &texels)
            .unwrap()
    }

    #[test]
    fn texel_centers_sample_exactly() {
        let image = ramp();
        for i in 0..4 {
            let uv = Vec2::new((i as f32 + 0.5) / 4.0, 0.5);
            assert_eq!(image.sample(uv).x, i as f32);
        }
    }

    #[test]
    fn midpoints_interpolate_and_edges_clamp() {
        let image = ramp();
        assert!((image.sample(Vec2::new(0.25, 0.5)).x - 0.5).abs() < 1e-5);
        assert_eq!(image.sample(Vec2::new(-3.0, 0.5)).x, 0.0);
        assert_eq!(image.sample(Vec2::new(7.0, 0.5)).x, 3.0);
    }

    #[test]
    fn rgba8_round_trip_is_lossless_for_bytes() {
        let mut source = image::RgbaImage::new(2, 2);
        source.put_pixel(1, 0, image::Rgba([10, 128, 255, 3]));
        let decoded = CpuImage::from_rgba8(&source);
        assert_eq!(decoded.to_rgba8(), source);
    }

    #[test]
    fn wrong_texel_count_is_rejected() {
        assert!(CpuImage::from_texels(
            2,
            2,
            TextureFormat::Rgba8Unorm,
            &[[0.0; 4]; 3]
        )
        .is_none());
    }
}
