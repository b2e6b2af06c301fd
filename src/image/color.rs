//! sRGB to CIE L*a*b* conversion (D65 white point).
//!
//! The search and reconstruction passes run entirely in L*a*b* so that the
//! sum-of-squared-differences distance approximates perceptual difference.
//! Conversion happens once before the core runs and once after it finishes.
//! L is in [0, 100]; a* and b* roughly in [-128, 127].

use crate::image::Image;
use crate::util::{PatchFillError, PatchFillResult};

const XN: f32 = 0.95047;
const YN: f32 = 1.0;
const ZN: f32 = 1.08883;

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn lab_f(t: f32) -> f32 {
    const DELTA: f32 = 6.0 / 29.0;
    if t > DELTA * DELTA * DELTA {
        t.cbrt()
    } else {
        t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
    }
}

fn lab_f_inv(t: f32) -> f32 {
    const DELTA: f32 = 6.0 / 29.0;
    if t > DELTA {
        t * t * t
    } else {
        3.0 * DELTA * DELTA * (t - 4.0 / 29.0)
    }
}

/// Converts one sRGB pixel (components in [0, 1]) to L*a*b*.
pub fn rgb_to_lab(rgb: [f32; 3]) -> [f32; 3] {
    let r = srgb_to_linear(rgb[0]);
    let g = srgb_to_linear(rgb[1]);
    let b = srgb_to_linear(rgb[2]);

    let x = 0.412_456_4 * r + 0.357_576_1 * g + 0.180_437_5 * b;
    let y = 0.212_672_9 * r + 0.715_152_2 * g + 0.072_175_0 * b;
    let z = 0.019_333_9 * r + 0.119_192_0 * g + 0.950_304_1 * b;

    let fx = lab_f(x / XN);
    let fy = lab_f(y / YN);
    let fz = lab_f(z / ZN);

    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// Converts one L*a*b* pixel back to sRGB, clamped to [0, 1].
pub fn lab_to_rgb(lab: [f32; 3]) -> [f32; 3] {
    let fy = (lab[0] + 16.0) / 116.0;
    let fx = fy + lab[1] / 500.0;
    let fz = fy - lab[2] / 200.0;

    let x = XN * lab_f_inv(fx);
    let y = YN * lab_f_inv(fy);
    let z = ZN * lab_f_inv(fz);

    let r = 3.240_454_2 * x - 1.537_138_5 * y - 0.498_531_4 * z;
    let g = -0.969_266_0 * x + 1.876_010_8 * y + 0.041_556_0 * z;
    let b = 0.055_643_4 * x - 0.204_025_9 * y + 1.057_225_2 * z;

    [
        linear_to_srgb(r).clamp(0.0, 1.0),
        linear_to_srgb(g).clamp(0.0, 1.0),
        linear_to_srgb(b).clamp(0.0, 1.0),
    ]
}

/// Converts a 3-channel sRGB image to L*a*b*.
pub fn image_to_lab(img: &Image) -> PatchFillResult<Image> {
    convert(img, rgb_to_lab)
}

/// Converts a 3-channel L*a*b* image back to sRGB.
pub fn image_to_rgb(img: &Image) -> PatchFillResult<Image> {
    convert(img, lab_to_rgb)
}

fn convert(img: &Image, f: fn([f32; 3]) -> [f32; 3]) -> PatchFillResult<Image> {
    if img.channels() != 3 {
        return Err(PatchFillError::ChannelMismatch {
            expected: 3,
            got: img.channels(),
        });
    }
    let mut out = Image::new(img.width(), img.height(), 3)?;
    for y in 0..img.height() {
        for x in 0..img.width() {
            let p = img.pixel(x, y);
            out.set_pixel(x, y, &f([p[0], p[1], p[2]]));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{lab_to_rgb, rgb_to_lab};

    #[test]
    fn white_maps_to_full_lightness() {
        let lab = rgb_to_lab([1.0, 1.0, 1.0]);
        assert!((lab[0] - 100.0).abs() < 0.1);
        assert!(lab[1].abs() < 0.1);
        assert!(lab[2].abs() < 0.1);
    }

    #[test]
    fn black_maps_to_zero_lightness() {
        let lab = rgb_to_lab([0.0, 0.0, 0.0]);
        assert!(lab[0].abs() < 0.1);
    }

    #[test]
    fn round_trip_is_close() {
        for rgb in [[0.2, 0.5, 0.8], [0.9, 0.1, 0.3], [0.5, 0.5, 0.5]] {
            let back = lab_to_rgb(rgb_to_lab(rgb));
            for (a, b) in rgb.iter().zip(back.iter()) {
                assert!((a - b).abs() < 1e-3, "{rgb:?} -> {back:?}");
            }
        }
    }
}
