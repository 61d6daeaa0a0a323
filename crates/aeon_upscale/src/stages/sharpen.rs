//! # Sharpen Stage
//!
//! Contrast-adaptive sharpening over the upscaled history colour.
//!
//! ```text
//!       b
//!     d e f      lobe from min/max of the cross, damped where the
//!       h        centre looks like noise against its neighbours
//! ```
//!
//! Works on tonemapped, exposure-normalized RGB so the headroom test
//! `1 - max` stays meaningful for HDR input.

// Pixel math moves between integer extents and float coordinates
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::many_single_char_names
)]

use bytemuck::{Pod, Zeroable};
use glam::{IVec2, UVec2, Vec3, Vec4};

use crate::color;
use crate::config::UpscalerConfig;
use crate::geometry::ViewportGeometry;
use crate::texture::{dispatch, Texture2D};

/// Most negative lobe after scaling; keeps `4 * lobe + 1` positive.
const LOBE_FLOOR: f32 = -0.24;

/// Weights for the noise detector's luma.
const NOISE_LUMA: Vec3 = Vec3::new(0.5, 1.0, 0.5);

/// Uniforms for the sharpen kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SharpenUniforms {
    /// History viewport (width, height, 1/width, 1/height).
    pub history_info: [f32; 4],
    /// Sharpness, lobe limit, pre-exposure, unused.
    pub params: [f32; 4],
}

impl SharpenUniforms {
    /// Builds the block for one frame.
    #[must_use]
    pub fn new(geometry: &ViewportGeometry, pre_exposure: f32, config: &UpscalerConfig) -> Self {
        Self {
            history_info: geometry.history.as_uniform(),
            params: [config.sharpness, config.tunables.sharpen_limit, pre_exposure, 0.0],
        }
    }

    /// Raw bytes for GPU upload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[inline]
fn safe_div(n: Vec3, d: Vec3) -> Vec3 {
    Vec3::select(d.abs().cmpgt(Vec3::splat(1e-6)), n / d, Vec3::ZERO)
}

/// Sharpens one pixel of `history` (scene RGB in `xyz`).
#[must_use]
pub fn sharpen_pixel(
    history: &Texture2D<Vec4>,
    pos: IVec2,
    sharpness: f32,
    limit: f32,
    pre_exposure: f32,
) -> Vec3 {
    let fetch = |dx: i32, dy: i32| {
        let rgb = history.load_clamped(pos + IVec2::new(dx, dy)).truncate();
        color::tonemap(color::prepare(rgb, pre_exposure))
    };
    let b = fetch(0, -1);
    let d = fetch(-1, 0);
    let e = fetch(0, 0);
    let f = fetch(1, 0);
    let h = fetch(0, 1);

    let min4 = b.min(d).min(f).min(h);
    let max4 = b.max(d).max(f).max(h);

    let hit_min = safe_div(min4, max4 * 4.0);
    let hit_max = safe_div(Vec3::ONE - max4, min4 * 4.0 - Vec3::splat(4.0));
    let lobe3 = (-hit_min).max(hit_max);
    let mut lobe = lobe3.max_element().min(0.0).max(-limit) * sharpness;

    let luma4 = [b, f, h, d].map(|c| c.dot(NOISE_LUMA));
    let luma_center = e.dot(NOISE_LUMA);
    let luma_max = luma4.iter().copied().fold(luma_center, f32::max);
    let luma_min = luma4.iter().copied().fold(luma_center, f32::min);
    let range = luma_max - luma_min;
    let noise = if range > 1e-6 {
        ((luma4.iter().sum::<f32>() * 0.25 - luma_center).abs() / range).clamp(0.0, 1.0)
    } else {
        0.0
    };
    lobe *= -0.5 * noise + 1.0;
    lobe = lobe.max(LOBE_FLOOR);

    let sharpened = ((b + d + h + f) * lobe + e) / (4.0 * lobe + 1.0);
    let sharpened = sharpened.clamp(Vec3::ZERO, Vec3::splat(1.0 - 1.0 / 32768.0));
    color::unprepare(color::inverse_tonemap(sharpened), pre_exposure)
}

/// Runs the sharpen kernel over the history viewport.
#[must_use]
pub fn run(history: &Texture2D<Vec4>, uniforms: &SharpenUniforms) -> Texture2D<Vec3> {
    let extent = UVec2::new(uniforms.history_info[0] as u32, uniforms.history_info[1] as u32);
    let [sharpness, limit, pre_exposure, _] = uniforms.params;
    dispatch(extent, |px| sharpen_pixel(history, px.as_ivec2(), sharpness, limit, pre_exposure))
}
