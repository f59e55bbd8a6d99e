//! Gaussian kernel compression.
//!
//! A continuous Gaussian is represented by a fixed reference table of
//! [`REFERENCE_BINS`] one-sided bin weights. For a requested radius the table
//! is stretched over `1 + 2·radius` pixels, integrated per pixel, and the
//! resulting weights are folded pairwise into linearly-resampled taps so one
//! bilinear texture fetch covers two pixels. The result always fits in
//! [`KERNEL_CAPACITY`] taps.

use std::sync::LazyLock;

/// Fixed tap capacity of a [`Kernel`] (uniform array length in programs).
pub const KERNEL_CAPACITY: usize = 128;

/// Largest internal radius, in pixels.
pub const MAX_RADIUS: f32 = 250.0;

/// Host radius units are scaled by this factor into pixels.
pub const RADIUS_SCALE: f32 = 3.0;

/// Bin count of the one-sided reference Gaussian.
pub const REFERENCE_BINS: usize = 1024;

/// Taps with a weight outside `[0, MAX_TAP_WEIGHT]` are discarded.
const MAX_TAP_WEIGHT: f64 = 1.0001;

/// One-sided Gaussian reference. Bin `k` covers `[k - 0.5, k + 0.5]`; the
/// full symmetric kernel (bin 0 once, every other bin mirrored) sums to 1.
struct ReferenceTable {
    bins: Vec<f64>,
    /// Integral of the positive half up to the lower edge of bin `k`
    /// (bin 0 starts at 0, so only its right half counts).
    prefix: Vec<f64>,
}

static REFERENCE: LazyLock<ReferenceTable> = LazyLock::new(ReferenceTable::build);

impl ReferenceTable {
    fn build() -> Self {
        let sigma = (REFERENCE_BINS as f64 - 0.5) / 3.0;
        let raw: Vec<f64> = (0..REFERENCE_BINS)
            .map(|k| {
                let x = k as f64;
                (-x * x / (2.0 * sigma * sigma)).exp()
            })
            .collect();
        let total = raw[0] + 2.0 * raw[1..].iter().sum::<f64>();
        let bins: Vec<f64> = raw.iter().map(|w| w / total).collect();

        let mut prefix = Vec::with_capacity(REFERENCE_BINS + 1);
        prefix.push(0.0);
        prefix.push(bins[0] * 0.5);
        for k in 1..REFERENCE_BINS {
            let next = prefix[k] + bins[k];
            prefix.push(next);
        }
        Self { bins, prefix }
    }

    /// Integral of the positive half over `[0, x]`, in bin units.
    fn cumulative(&self, x: f64) -> f64 {
        let end = REFERENCE_BINS as f64 - 0.5;
        let x = x.clamp(0.0, end);
        if x < 0.5 {
            return self.bins[0] * x;
        }
        let k = (x + 0.5).floor() as usize;
        if k >= REFERENCE_BINS {
            return self.prefix[REFERENCE_BINS];
        }
        self.prefix[k] + self.bins[k] * (x - (k as f64 - 0.5))
    }
}

/// Per-pixel weights of the positive half-kernel for an internal radius,
/// before the center weight is doubled.
///
/// Pixel 0 spans the right half of the center pixel; pixels `1..=ceil(r)`
/// span one pixel each, the last one running to the end of the table.
pub(crate) fn discretize(radius: f64) -> Vec<f64> {
    let table = &*REFERENCE;
    let bins_per_pixel =
        (2.0 * REFERENCE_BINS as f64 - 1.0) / (1.0 + 2.0 * radius);
    let pixels = radius.ceil() as usize;

    let mut weights = Vec::with_capacity(pixels + 1);
    let mut lower = table.cumulative(0.5 * bins_per_pixel);
    weights.push(lower);
    for i in 1..=pixels {
        let upper = table.cumulative((i as f64 + 0.5) * bins_per_pixel);
        weights.push(upper - lower);
        lower = upper;
    }
    weights
}

/// A compressed, linearly-resampled half-Gaussian.
///
/// Tap 0 is the center (offset 0); taps `1..size` are mirrored by the
/// programs, so `weight[0] + 2·Σ weight[1..size] ≈ 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    weights: [f32; KERNEL_CAPACITY],
    offsets: [f32; KERNEL_CAPACITY],
    size: usize,
    radius: f32,
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Kernel {
    /// Build the kernel for a host-facing radius.
    #[must_use]
    pub fn new(radius: f32) -> Self {
        let radius = if radius.is_finite() { radius } else { 0.0 };
        let internal = (radius * RADIUS_SCALE).clamp(0.0, MAX_RADIUS);
        let raw = discretize(f64::from(internal));

        let mut weights = [0.0_f32; KERNEL_CAPACITY];
        let mut offsets = [0.0_f32; KERNEL_CAPACITY];
        let mut taps = vec![(raw[0] * 2.0, 0.0)];
        for i in (1..raw.len()).step_by(2) {
            let (w1, o1) = (raw[i], i as f64);
            let tap = match raw.get(i + 1) {
                Some(&w2) => {
                    let sum = w1 + w2;
                    let offset = if sum > 0.0 {
                        (o1 * w1 + (o1 + 1.0) * w2) / sum
                    } else {
                        o1
                    };
                    (sum, offset)
                }
                None => (w1, o1),
            };
            taps.push(tap);
        }

        let size = taps.len().min(KERNEL_CAPACITY);
        for (i, &(weight, offset)) in taps.iter().take(size).enumerate() {
            weights[i] = checked_weight(weight, i, internal);
            offsets[i] = offset as f32;
        }

        Self {
            weights,
            offsets,
            size,
            radius,
        }
    }

    /// Tap weights, zero-padded past [`size`](Self::size).
    #[must_use]
    pub const fn weights(&self) -> &[f32; KERNEL_CAPACITY] {
        &self.weights
    }

    /// Tap offsets in pixels, zero-padded past [`size`](Self::size).
    #[must_use]
    pub const fn offsets(&self) -> &[f32; KERNEL_CAPACITY] {
        &self.offsets
    }

    /// Number of used taps.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Host-facing radius the kernel was built for.
    #[must_use]
    pub const fn radius(&self) -> f32 {
        self.radius
    }

    /// Texture encoding: `KERNEL_CAPACITY` texels of (weight, offset, 0, 0).
    #[must_use]
    pub fn texels(&self) -> Vec<[f32; 4]> {
        self.weights
            .iter()
            .zip(&self.offsets)
            .map(|(&w, &o)| [w, o, 0.0, 0.0])
            .collect()
    }

    /// `weight[0] + 2·Σ weight[1..size]`.
    #[must_use]
    pub fn mirrored_sum(&self) -> f32 {
        self.weights[0] + 2.0 * self.weights[1..self.size].iter().sum::<f32>()
    }
}

/// A tap weight outside `[0, MAX_TAP_WEIGHT]` (or NaN) is logged and zeroed.
fn checked_weight(weight: f64, tap: usize, internal_radius: f32) -> f32 {
    if (0.0..=MAX_TAP_WEIGHT).contains(&weight) {
        weight as f32
    } else {
        log::warn!(
            "kernel tap {tap} weight {weight} out of range at radius \
             {internal_radius}; clamped to 0"
        );
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RADII: &[f32] =
        &[0.0, 0.004, 0.1, 0.5, 1.0, 3.3, 10.0, 27.7, 41.0, 83.3, 100.0, 500.0];

    #[test]
    fn out_of_range_weights_are_zeroed() {
        assert_eq!(checked_weight(1.01, 3, 10.0), 0.0);
        assert_eq!(checked_weight(-1e-9, 3, 10.0), 0.0);
        assert_eq!(checked_weight(f64::NAN, 3, 10.0), 0.0);
        assert_eq!(checked_weight(0.0, 0, 10.0), 0.0);
        assert_eq!(checked_weight(0.25, 1, 10.0), 0.25);
    }

    #[test]
    fn reference_table_is_normalized() {
        let table = &*REFERENCE;
        let sum = table.bins[0] + 2.0 * table.bins[1..].iter().sum::<f64>();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!((table.prefix[REFERENCE_BINS] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn zero_radius_is_identity_tap() {
        let kernel = Kernel::new(0.0);
        assert_eq!(kernel.size(), 1);
        assert!((kernel.weights()[0] - 1.0).abs() < 1e-6);
        assert_eq!(kernel.offsets()[0], 0.0);
    }

    #[test]
    fn kernel_fits_capacity_and_is_normalized() {
        for &radius in RADII {
            let kernel = Kernel::new(radius);
            assert!(kernel.size() <= KERNEL_CAPACITY, "radius {radius}");
            let sum = kernel.mirrored_sum();
            assert!((sum - 1.0).abs() < 1e-4, "radius {radius}: sum {sum}");
            assert!(kernel.weights()[kernel.size()..].iter().all(|&w| w == 0.0));
            assert!(kernel.weights().iter().all(|&w| w >= 0.0));
        }
    }

    #[test]
    fn center_tap_is_doubled_half() {
        for &radius in RADII {
            let internal = (radius * RADIUS_SCALE).clamp(0.0, MAX_RADIUS);
            let raw = discretize(f64::from(internal));
            let kernel = Kernel::new(radius);
            assert!(
                (kernel.weights()[0] - (raw[0] * 2.0) as f32).abs() < 1e-7,
                "radius {radius}"
            );
        }
    }

    #[test]
    fn max_radius_uses_126_taps() {
        assert_eq!(Kernel::new(MAX_RADIUS).size(), 126);
        assert_eq!(Kernel::new(10_000.0).size(), 126);
    }

    #[test]
    fn tap_count_tracks_support() {
        // ceil(r) pixels plus the center, paired up.
        let kernel = Kernel::new(10.0);
        assert_eq!(kernel.size(), 1 + 30 / 2);
        let kernel = Kernel::new(1.0);
        assert_eq!(kernel.size(), 1 + 3_usize.div_ceil(2));
    }

    #[test]
    fn paired_offsets_lie_between_pixels() {
        let kernel = Kernel::new(10.0);
        for tap in 1..kernel.size() {
            let first = (2 * tap - 1) as f32;
            let o = kernel.offsets()[tap];
            assert!(o >= first && o <= first + 1.0, "tap {tap}: {o}");
        }
    }

    #[test]
    fn non_finite_radius_is_zero() {
        assert_eq!(Kernel::new(f32::NAN).size(), 1);
    }

    #[test]
    fn texel_encoding_matches_arrays() {
        let kernel = Kernel::new(5.0);
        let texels = kernel.texels();
        assert_eq!(texels.len(), KERNEL_CAPACITY);
        assert_eq!(texels[3][0], kernel.weights()[3]);
        assert_eq!(texels[3][1], kernel.offsets()[3]);
    }
}
