//! # Activate Stage
//!
//! Decides, per input pixel, how much last frame's history can be trusted
//! and which pixels carry thin features worth locking.
//!
//! ## Depth clip
//!
//! The previous frame's dilated depth is sampled at the reprojected UV with
//! a 4-tap bilinear footprint. Each tap is compared in view space against
//! the current depth; the separation that counts as "a different surface"
//! grows with view depth, field of view and viewport diagonal so the test
//! behaves the same at any resolution. The result is a depth-clip factor in
//! [0, 1] (1 = disoccluded); confidence is its complement.
//!
//! ## Lock seeding
//!
//! ```text
//!   0 1 2      quadrants: {0,1,3,4} {1,2,4,5}
//!   3 4 5                 {3,4,6,7} {4,5,7,8}
//!   6 7 8
//! ```
//!
//! A neighbour is "similar" when its luma ratio to the centre is below the
//! similarity threshold. If any quadrant is fully similar the pixel sits on
//! a flat region and is rejected early. A pixel survives only if it is a
//! strict luma extremum against all dissimilar neighbours: a ridge such as
//! a wire or a grate bar. Survivors write a lock seed of 2.0 at their
//! history-resolution position.

// Pixel math moves between integer extents and float coordinates
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]

use bytemuck::{Pod, Zeroable};
use glam::{IVec2, UVec2, Vec2, Vec4};

use crate::camera::{CameraParams, DeviceToViewDepth};
use crate::color::HALF_MIN;
use crate::config::UpscalerConfig;
use crate::geometry::ViewportGeometry;
use crate::texture::{dispatch, BilinearTaps, Texture2D};

/// Value written for a freshly seeded lock.
pub const LOCK_SEED: f32 = 2.0;

/// Resolution above which the separation curve is at its steepest.
const REFERENCE_DIAGONAL: Vec2 = Vec2::new(1920.0, 1080.0);

/// Motion below this many history pixels is treated as none.
const MOTION_DEADZONE: f32 = 0.01;

const UPPER_LEFT: u32 = 1 << 0 | 1 << 1 | 1 << 3 | 1 << 4;
const UPPER_RIGHT: u32 = 1 << 1 | 1 << 2 | 1 << 4 | 1 << 5;
const LOWER_LEFT: u32 = 1 << 3 | 1 << 4 | 1 << 6 | 1 << 7;
const LOWER_RIGHT: u32 = 1 << 4 | 1 << 5 | 1 << 7 | 1 << 8;

/// Uniforms for the activate kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ActivateUniforms {
    /// Input viewport (width, height, 1/width, 1/height).
    pub input_info: [f32; 4],
    /// History viewport (width, height, 1/width, 1/height).
    pub history_info: [f32; 4],
    /// Device-to-view-depth constants.
    pub device_to_view_depth: [f32; 4],
    /// Jitter x, jitter y, depth separation, similarity threshold.
    pub params: [f32; 4],
    /// Pixel lock enabled, unused x3.
    pub flags: [u32; 4],
}

impl ActivateUniforms {
    /// Builds the block for one frame.
    #[must_use]
    pub fn new(
        geometry: &ViewportGeometry,
        camera: &CameraParams,
        jitter: Vec2,
        config: &UpscalerConfig,
    ) -> Self {
        let aspect = geometry.input.size().x / geometry.input.size().y;
        Self {
            input_info: geometry.input.as_uniform(),
            history_info: geometry.history.as_uniform(),
            device_to_view_depth: DeviceToViewDepth::new(camera, aspect).0,
            params: [
                jitter.x,
                jitter.y,
                config.tunables.depth_separation,
                config.tunables.similarity_threshold,
            ],
            flags: [u32::from(config.pixel_lock), 0, 0, 0],
        }
    }

    /// Raw bytes for GPU upload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    fn input_size(&self) -> Vec2 {
        Vec2::new(self.input_info[0], self.input_info[1])
    }

    fn history_size(&self) -> Vec2 {
        Vec2::new(self.history_info[0], self.history_info[1])
    }
}

/// Textures the activate kernel reads.
#[derive(Debug, Clone, Copy)]
pub struct ActivateInputs<'a> {
    /// Convert output: `(motion.xy, dilated depth, luma)`.
    pub motion_depth_luma: &'a Texture2D<Vec4>,
    /// Last frame's dilated depth, or this frame's on a reset.
    pub previous_depth: &'a Texture2D<f32>,
}

/// Textures the activate kernel writes.
#[derive(Debug, Clone)]
pub struct ActivateOutput {
    /// Depth-clip factor per input pixel, 1 = disoccluded.
    pub reactive: Texture2D<f32>,
    /// Lock seeds at history resolution, zero elsewhere.
    pub new_locks: Texture2D<f32>,
    /// Number of seeds written.
    pub lock_seeds: u32,
}

/// Disocclusion estimate for one pixel: 0 = same surface, 1 = disoccluded.
#[must_use]
pub fn depth_clip(
    previous_depth: &Texture2D<f32>,
    prev_uv: Vec2,
    current_depth: f32,
    table: &DeviceToViewDepth,
    depth_separation: f32,
) -> f32 {
    let size = previous_depth.extent().as_vec2();
    let current_view = table.view_depth(current_depth);
    let taps = BilinearTaps::new(prev_uv, size);

    let diagonal = size.length();
    let k_fov = table.fov_factor();
    let resolution_factor = (diagonal / REFERENCE_DIAGONAL.length()).clamp(0.0, 1.0);
    let power = 1.0 + 2.0 * resolution_factor;

    let mut depth_sum = 0.0;
    let mut weight_sum = 0.0;
    for (offset, weight) in BilinearTaps::OFFSETS.iter().zip(taps.weights) {
        let pos = taps.origin + *offset;
        if !previous_depth.contains(pos) || weight <= 0.01 {
            continue;
        }
        let prev_device = previous_depth.load_clamped(pos);
        if !prev_device.is_finite() {
            continue;
        }
        let prev_view = table.view_depth(prev_device);
        let diff = (current_view - prev_view).abs();
        let required = depth_separation * k_fov * diagonal * current_view.max(prev_view);
        let same_surface = (required / (diff + f32::EPSILON)).clamp(0.0, 1.0);

        depth_sum += same_surface.powf(power) * weight;
        weight_sum += weight;
    }

    let clip = 1.0 - depth_sum / weight_sum;
    if weight_sum > 0.0 && clip.is_finite() {
        clip.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// True when `depth` is a usable device depth. Zero, near-zero and
/// non-finite depths opt a pixel out of depth clip and lock seeding.
#[inline]
#[must_use]
pub fn has_depth(depth: f32) -> bool {
    depth.is_finite() && depth > HALF_MIN
}

/// Zero on a steadily receding vertical slope, where depth clip misfires.
///
/// Reads this frame's dilated depth around the reprojected position.
fn surface_factor(motion_depth_luma: &Texture2D<Vec4>, pos: IVec2, table: &DeviceToViewDepth) -> f32 {
    let depth_at = |dy: i32| table.view_depth(motion_depth_luma.load_clamped(pos + IVec2::new(0, dy)).z);
    let (d0, d1, d2) = (depth_at(-1), depth_at(0), depth_at(1));
    if d0 - d1 > d1 * 0.01 && d1 - d2 > d2 * 0.01 {
        0.0
    } else {
        1.0
    }
}

/// Returns true if the pixel at `pos` is a thin luma ridge.
#[must_use]
pub fn is_thin_feature(motion_depth_luma: &Texture2D<Vec4>, pos: IVec2, similarity_threshold: f32) -> bool {
    let luma_at = |dx: i32, dy: i32| motion_depth_luma.load_clamped(pos + IVec2::new(dx, dy)).w;
    let nucleus = luma_at(0, 0);

    let mut mask = 1u32 << 4;
    let mut dissimilar_min = f32::MAX;
    let mut dissimilar_max = 0.0f32;
    let mut classify = |index: u32, sample: f32| {
        let ratio = sample.max(nucleus) / sample.min(nucleus);
        if ratio > 0.0 && ratio < similarity_threshold {
            mask |= 1 << index;
        } else {
            dissimilar_min = dissimilar_min.min(sample);
            dissimilar_max = dissimilar_max.max(sample);
        }
        mask
    };

    classify(0, luma_at(-1, -1));
    classify(1, luma_at(0, -1));
    if classify(3, luma_at(-1, 0)) & UPPER_LEFT == UPPER_LEFT {
        return false;
    }

    classify(5, luma_at(1, 0));
    classify(7, luma_at(0, 1));
    if classify(8, luma_at(1, 1)) & LOWER_RIGHT == LOWER_RIGHT {
        return false;
    }

    if classify(2, luma_at(1, -1)) & UPPER_RIGHT == UPPER_RIGHT {
        return false;
    }

    let mask = classify(6, luma_at(-1, 1));
    let is_ridge = nucleus > dissimilar_max || nucleus < dissimilar_min;
    is_ridge && mask & LOWER_LEFT != LOWER_LEFT
}

/// History-resolution texel covered by input pixel `pos` under `jitter`.
#[inline]
#[must_use]
pub fn history_position(pos: IVec2, jitter: Vec2, input_size: Vec2, history_size: Vec2) -> IVec2 {
    let jittered = pos.as_vec2() + 0.5 - jitter;
    (jittered / input_size * history_size).floor().as_ivec2()
}

/// Runs the activate kernel over the input viewport.
#[must_use]
pub fn run(inputs: &ActivateInputs<'_>, uniforms: &ActivateUniforms) -> ActivateOutput {
    let input_size = uniforms.input_size();
    let history_size = uniforms.history_size();
    let inv_input = Vec2::new(uniforms.input_info[2], uniforms.input_info[3]);
    let jitter = Vec2::new(uniforms.params[0], uniforms.params[1]);
    let depth_separation = uniforms.params[2];
    let similarity_threshold = uniforms.params[3];
    let pixel_lock = uniforms.flags[0] != 0;
    let table = DeviceToViewDepth(uniforms.device_to_view_depth);

    let reactive = dispatch(input_size.as_uvec2(), |px| {
        let texel = inputs.motion_depth_luma.load(px);
        let motion = texel.truncate().truncate();
        let depth = texel.z;

        if !has_depth(depth) {
            return 0.0;
        }

        let motion = if (motion * history_size).length() > MOTION_DEADZONE {
            motion
        } else {
            Vec2::ZERO
        };
        let uv = (px.as_vec2() + 0.5) * inv_input;
        let prev_uv = uv + motion;

        let clip = depth_clip(inputs.previous_depth, prev_uv, depth, &table, depth_separation);
        let surface_pos = (prev_uv * input_size).as_ivec2();
        clip * surface_factor(inputs.motion_depth_luma, surface_pos, &table)
    });

    let mut new_locks = Texture2D::new(history_size.as_uvec2(), 0.0);
    let mut lock_seeds = 0;
    if pixel_lock {
        for y in 0..input_size.y as u32 {
            for x in 0..input_size.x as u32 {
                let pos = UVec2::new(x, y).as_ivec2();
                if !has_depth(inputs.motion_depth_luma.load_clamped(pos).z) {
                    continue;
                }
                if is_thin_feature(inputs.motion_depth_luma, pos, similarity_threshold) {
                    new_locks.store(history_position(pos, jitter, input_size, history_size), LOCK_SEED);
                    lock_seeds += 1;
                }
            }
        }
    }

    ActivateOutput {
        reactive,
        new_locks,
        lock_seeds,
    }
}
