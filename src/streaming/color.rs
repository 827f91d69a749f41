//! Per-point draw colors
//!
//! Colors are packed as `r | g << 8 | b << 16` with 8 bit channels and no
//! alpha.

use crate::point::PointAccessor;
use crate::streaming::config::{ColorMode, DEFAULT_INTENSITY_MAX, DEFAULT_MAX_LABEL};

/// Color used when the requested attribute is missing
pub const FALLBACK_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

/// Stops of the label gradient: blue, green, yellow, red
pub const LABEL_GRADIENT: [[f32; 3]; 4] = [
    [0.0, 0.0, 1.0],
    [0.0, 1.0, 0.0],
    [1.0, 1.0, 0.0],
    [1.0, 0.0, 0.0],
];

/// Types that can be linearly interpolated
pub trait Lerp: Copy {
    fn lerp(&self, other: &Self, t: f32) -> Self;
}

impl Lerp for f32 {
    #[inline]
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Lerp for [f32; 3] {
    #[inline]
    fn lerp(&self, other: &Self, t: f32) -> Self {
        [
            self[0].lerp(&other[0], t),
            self[1].lerp(&other[1], t),
            self[2].lerp(&other[2], t),
        ]
    }
}

/// Pack 8 bit channels
#[inline]
pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    r as u32 | (g as u32) << 8 | (b as u32) << 16
}

/// Unpack into `[r, g, b]`
#[inline]
pub fn unpack_rgb(packed: u32) -> [u8; 3] {
    [packed as u8, (packed >> 8) as u8, (packed >> 16) as u8]
}

/// Pack a 0..=1 float color
#[inline]
pub fn pack_unit(rgb: [f32; 3]) -> u32 {
    let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    pack_rgb(c(rgb[0]), c(rgb[1]), c(rgb[2]))
}

/// Pack 16 bit range channels (0..=65535) by dropping the low byte
#[inline]
pub fn pack_native(rgb: [f32; 3]) -> u32 {
    let c = |v: f32| (v / 256.0).clamp(0.0, 255.0) as u8;
    pack_rgb(c(rgb[0]), c(rgb[1]), c(rgb[2]))
}

/// Grayscale for an intensity, full white at `intensity_max`
#[inline]
pub fn intensity_gray(intensity: u16, intensity_max: f32) -> u32 {
    let v = (intensity as f32 / intensity_max * 256.0).clamp(0.0, 255.0) as u8;
    pack_rgb(v, v, v)
}

/// Gradient color for `label` over `0..=max_label`.
///
/// Label 0 maps exactly to the first stop, `max_label` and above exactly to
/// the last, with linear interpolation between the bracketing stops.
pub fn label_gradient(label: u8, max_label: u8) -> [f32; 3] {
    let max = max_label.max(1) as f32;
    let t = (label as f32 / max).clamp(0.0, 1.0);
    let segments = (LABEL_GRADIENT.len() - 1) as f32;
    let scaled = t * segments;
    let i = (scaled.floor() as usize).min(LABEL_GRADIENT.len() - 2);
    let frac = scaled - i as f32;
    LABEL_GRADIENT[i].lerp(&LABEL_GRADIENT[i + 1], frac)
}

/// The attribute a color is read from, resolved once per node
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColorSource {
    Native,
    Intensity { max: f32 },
    Label { max: u8 },
    Constant(u32),
}

impl ColorSource {
    /// Resolve `mode` against what the accessor's schema provides
    pub fn resolve<A: PointAccessor>(acc: &A, mode: ColorMode, intensity_max: f32, max_label: u8) -> Self {
        let intensity_max = if intensity_max > 0.0 { intensity_max } else { DEFAULT_INTENSITY_MAX };
        let max_label = if max_label > 0 { max_label } else { DEFAULT_MAX_LABEL };
        let fallback = ColorSource::Constant(pack_unit(FALLBACK_COLOR));
        match mode {
            ColorMode::Single(rgb) => ColorSource::Constant(pack_unit(rgb)),
            ColorMode::VertexColor if acc.has_color32() => ColorSource::Native,
            ColorMode::Intensity if acc.has_intensity16() => ColorSource::Intensity { max: intensity_max },
            ColorMode::Label if acc.has_label8() => ColorSource::Label { max: max_label },
            ColorMode::Auto => {
                if acc.has_color32() {
                    ColorSource::Native
                } else if acc.has_intensity16() {
                    ColorSource::Intensity { max: intensity_max }
                } else if acc.has_label8() {
                    ColorSource::Label { max: max_label }
                } else {
                    fallback
                }
            }
            _ => fallback,
        }
    }

    /// Packed color of one point
    #[inline]
    pub fn color_of<A: PointAccessor>(&self, acc: &A, point: &A::Point) -> u32 {
        match *self {
            ColorSource::Native => {
                let c = acc.color32(point);
                pack_native([c.x, c.y, c.z])
            }
            ColorSource::Intensity { max } => intensity_gray(acc.intensity16(point), max),
            ColorSource::Label { max } => pack_unit(label_gradient(acc.label8(point), max)),
            ColorSource::Constant(packed) => packed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DVec3, Vec3};
    use crate::point::{PointRecord, Pos64, Pos64Col32IShort, Pos64IShort, Pos64Label8};

    #[test]
    fn test_pack_layout() {
        assert_eq!(pack_rgb(0x11, 0x22, 0x33), 0x0033_2211);
        assert_eq!(unpack_rgb(0x0033_2211), [0x11, 0x22, 0x33]);
        assert_eq!(pack_native([65535.0, 256.0, 0.0]), pack_rgb(255, 1, 0));
        assert_eq!(pack_unit([1.0, 0.0, 2.0]), pack_rgb(255, 0, 255));
    }

    #[test]
    fn test_intensity_ramp() {
        assert_eq!(intensity_gray(0, 4096.0), 0);
        assert_eq!(intensity_gray(2048, 4096.0), pack_rgb(128, 128, 128));
        assert_eq!(intensity_gray(4096, 4096.0), pack_rgb(255, 255, 255));
        assert_eq!(intensity_gray(60000, 4096.0), pack_rgb(255, 255, 255));
    }

    #[test]
    fn test_label_gradient_endpoints() {
        assert_eq!(label_gradient(0, 32), LABEL_GRADIENT[0]);
        assert_eq!(label_gradient(32, 32), LABEL_GRADIENT[3]);
        assert_eq!(label_gradient(200, 32), LABEL_GRADIENT[3]);
    }

    #[test]
    fn test_label_gradient_continuous_and_monotonic() {
        // Red never decreases and blue never increases along the ramp
        let mut prev = label_gradient(0, 30);
        for label in 1..=30u8 {
            let c = label_gradient(label, 30);
            assert!(c[0] >= prev[0]);
            assert!(c[2] <= prev[2]);
            let step: f32 = (0..3).map(|i| (c[i] - prev[i]).abs()).sum();
            assert!(step <= 0.21, "jump of {step} at label {label}");
            prev = c;
        }
        // Stop boundaries land exactly on stops
        assert_eq!(label_gradient(10, 30), LABEL_GRADIENT[1]);
        assert_eq!(label_gradient(20, 30), LABEL_GRADIENT[2]);
    }

    #[test]
    fn test_resolve_auto_prefers_native() {
        let auto = ColorMode::Auto;
        assert_eq!(ColorSource::resolve(&Pos64Col32IShort::accessor(), auto, 4096.0, 32), ColorSource::Native);
        assert_eq!(
            ColorSource::resolve(&Pos64IShort::accessor(), auto, 4096.0, 32),
            ColorSource::Intensity { max: 4096.0 }
        );
        assert_eq!(
            ColorSource::resolve(&Pos64Label8::accessor(), auto, 4096.0, 32),
            ColorSource::Label { max: 32 }
        );
        assert_eq!(
            ColorSource::resolve(&Pos64::accessor(), auto, 4096.0, 32),
            ColorSource::Constant(pack_unit(FALLBACK_COLOR))
        );
    }

    #[test]
    fn test_missing_capability_falls_back() {
        let acc = Pos64IShort::accessor();
        let source = ColorSource::resolve(&acc, ColorMode::VertexColor, 4096.0, 32);
        assert_eq!(source, ColorSource::Constant(pack_unit(FALLBACK_COLOR)));
        // Never touches the missing field
        let p = Pos64IShort::new(DVec3::ZERO, 7);
        assert_eq!(source.color_of(&acc, &p), pack_rgb(255, 255, 255));
    }

    #[test]
    fn test_color_of_native() {
        let acc = Pos64Col32IShort::accessor();
        let p = Pos64Col32IShort::new(DVec3::ZERO, Vec3::new(512.0, 1024.0, 65535.0), 0);
        assert_eq!(ColorSource::Native.color_of(&acc, &p), pack_rgb(2, 4, 255));
    }
}
