//! # Colour Space
//!
//! The stages work in *tonemapped, exposure-normalized YCoCg*:
//!
//! ```text
//!   scene rgb ──prepare──► rgb / pre_exposure ──tonemap──► [0,1) ──► YCoCg
//!        ▲                                                            │
//!        └──unprepare◄── rgb * pre_exposure ◄──inverse_tonemap◄───────┘
//! ```
//!
//! The tonemap is the reversible `x / (max3(x) + 1)`, so the pair is an exact
//! inverse up to float rounding and the encoded channels always fit [0, 1].

// Pixel math moves between integer extents and float coordinates
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]

use glam::{Vec3, Vec4};
use half::f16;

use crate::config::LumaCurve;

/// Smallest positive normal IEEE half, used as a "zero" sentinel.
pub const HALF_MIN: f32 = 6.103_515_6e-5;

/// Smallest `1 - max3` the inverse tonemap divides by.
const INVERSE_TONEMAP_FLOOR: f32 = 1.0 / 32768.0;

/// Rec.709 luminance weights.
const LUMA_WEIGHTS: Vec3 = Vec3::new(0.2126, 0.7152, 0.0722);

#[inline]
fn max3(v: Vec3) -> f32 {
    v.x.max(v.y).max(v.z)
}

/// Clamps negatives and divides out the pre-exposure.
#[inline]
#[must_use]
pub fn prepare(rgb: Vec3, pre_exposure: f32) -> Vec3 {
    rgb.max(Vec3::ZERO) / safe_exposure(pre_exposure)
}

/// Re-applies the pre-exposure.
#[inline]
#[must_use]
pub fn unprepare(rgb: Vec3, pre_exposure: f32) -> Vec3 {
    rgb * safe_exposure(pre_exposure)
}

#[inline]
fn safe_exposure(pre_exposure: f32) -> f32 {
    if pre_exposure.is_finite() && pre_exposure > f32::EPSILON {
        pre_exposure
    } else {
        1.0
    }
}

/// Reversible tonemap into [0, 1).
#[inline]
#[must_use]
pub fn tonemap(rgb: Vec3) -> Vec3 {
    rgb / (max3(rgb) + 1.0)
}

/// Inverse of [`tonemap`].
#[inline]
#[must_use]
pub fn inverse_tonemap(rgb: Vec3) -> Vec3 {
    rgb / (1.0 - max3(rgb)).max(INVERSE_TONEMAP_FLOOR)
}

/// RGB to (Y, Co, Cg) with chroma centred on zero.
#[inline]
#[must_use]
pub fn rgb_to_ycocg(rgb: Vec3) -> Vec3 {
    Vec3::new(
        0.25 * rgb.x + 0.5 * rgb.y + 0.25 * rgb.z,
        0.5 * rgb.x - 0.5 * rgb.z,
        -0.25 * rgb.x + 0.5 * rgb.y - 0.25 * rgb.z,
    )
}

/// (Y, Co, Cg) back to RGB.
#[inline]
#[must_use]
pub fn ycocg_to_rgb(ycocg: Vec3) -> Vec3 {
    let tmp = ycocg.x - ycocg.z;
    Vec3::new(tmp + ycocg.y, ycocg.x + ycocg.z, tmp - ycocg.y)
}

/// Scene colour to the working space: prepared, tonemapped YCoCg.
#[inline]
#[must_use]
pub fn to_working(rgb: Vec3, pre_exposure: f32) -> Vec3 {
    rgb_to_ycocg(tonemap(prepare(rgb, pre_exposure)))
}

/// Working space back to scene colour.
#[inline]
#[must_use]
pub fn from_working(ycocg: Vec3, pre_exposure: f32) -> Vec3 {
    unprepare(inverse_tonemap(ycocg_to_rgb(ycocg).max(Vec3::ZERO)), pre_exposure)
}

/// Shifts chroma into [0, 1] for storage.
#[inline]
#[must_use]
pub fn normalize_ycocg(ycocg: Vec3) -> Vec3 {
    (ycocg + Vec3::new(0.0, 0.5, 0.5)).clamp(Vec3::ZERO, Vec3::ONE)
}

/// Undoes [`normalize_ycocg`].
#[inline]
#[must_use]
pub fn denormalize_ycocg(stored: Vec3) -> Vec3 {
    stored - Vec3::new(0.0, 0.5, 0.5)
}

/// Packs normalized YCoCg into 11/11/10 bits: Y in 31..21, Co in 20..10,
/// Cg in 9..0.
#[inline]
#[must_use]
pub fn pack_11_11_10(normalized: Vec3) -> u32 {
    let v = normalized.clamp(Vec3::ZERO, Vec3::ONE);
    let y = (v.x * 2047.5) as u32;
    let co = (v.y * 2047.5) as u32;
    let cg = (v.z * 1023.5) as u32;
    (y << 21) | (co << 10) | cg
}

/// Unpacks [`pack_11_11_10`].
#[inline]
#[must_use]
pub fn unpack_11_11_10(packed: u32) -> Vec3 {
    Vec3::new(
        (packed >> 21) as f32 / 2047.5,
        ((packed >> 10) & 0x7ff) as f32 / 2047.5,
        (packed & 0x3ff) as f32 / 1023.5,
    )
}

/// Stores normalized YCoCg as three halves.
#[inline]
#[must_use]
pub fn pack_half(normalized: Vec3) -> [f16; 3] {
    [
        f16::from_f32(normalized.x),
        f16::from_f32(normalized.y),
        f16::from_f32(normalized.z),
    ]
}

/// Unpacks [`pack_half`].
#[inline]
#[must_use]
pub fn unpack_half(stored: [f16; 3]) -> Vec3 {
    Vec3::new(stored[0].to_f32(), stored[1].to_f32(), stored[2].to_f32())
}

/// Rounds a value through IEEE half.
#[inline]
#[must_use]
pub fn round_half(v: f32) -> f32 {
    f16::from_f32(v).to_f32()
}

/// Rounds every lane through IEEE half.
#[inline]
#[must_use]
pub fn round_half4(v: Vec4) -> Vec4 {
    Vec4::new(round_half(v.x), round_half(v.y), round_half(v.z), round_half(v.w))
}

/// Perceptual luma of prepared linear RGB, used only for similarity tests.
#[must_use]
pub fn luma(prepared_rgb: Vec3, curve: LumaCurve) -> f32 {
    let l = tonemap(prepared_rgb).dot(LUMA_WEIGHTS).max(0.0);
    match curve {
        LumaCurve::Simplified => l.powf(1.0 / 18.0),
        LumaCurve::Perceptual => {
            let lightness = if l < 216.0 / 24389.0 {
                l * (24389.0 / 27.0)
            } else {
                l.cbrt() * 116.0 - 16.0
            };
            (lightness * 0.01).max(0.0).powf(1.0 / 6.0)
        }
    }
}
