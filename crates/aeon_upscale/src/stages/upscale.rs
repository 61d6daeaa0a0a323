//! # Upscale Stage
//!
//! The core resample-and-accumulate kernel, run once per history pixel.
//!
//! ```text
//!   hr pixel ──► jittered lr position ──► 5/9-tap Lanczos ──► upsampled (colour, weight)
//!      │                                        │
//!      │                                        └─► exp-weighted mean/variance box
//!      ▼
//!   prev uv = uv + motion ──► history (colour, signed reactive) ──► rectify into box
//!                                                                     │
//!   alpha = weight / (base accumulation + weight) ◄──────────────────┘
//! ```
//!
//! All blending happens in working space (tonemapped YCoCg). History is
//! stored as scene-referred RGB plus a signed temporal reactive factor whose
//! sign records "was moving last frame".

// Pixel math moves between integer extents and float coordinates
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::similar_names
)]

use bytemuck::{Pod, Zeroable};
use glam::{IVec2, Vec2, Vec3, Vec4};

use super::activate::LOCK_SEED;
use super::EncodedColor;
use crate::color::{self, HALF_MIN};
use crate::config::{SampleCount, UpscalerConfig};
use crate::geometry::ViewportGeometry;
use crate::texture::{dispatch, Texture2D};

/// Cross first, then diagonals. Five-tap kernels use the first five.
const SAMPLE_OFFSETS: [IVec2; 9] = [
    IVec2::new(1, 0),
    IVec2::new(-1, 0),
    IVec2::new(0, 0),
    IVec2::new(0, 1),
    IVec2::new(0, -1),
    IVec2::new(1, 1),
    IVec2::new(-1, -1),
    IVec2::new(1, -1),
    IVec2::new(-1, 1),
];

/// Index of the centre tap in [`SAMPLE_OFFSETS`].
const CENTER_TAP: usize = 2;

/// Neighbours compared against history luma when updating a lock.
const LOCK_LUMA_OFFSETS: [IVec2; 5] = [
    IVec2::new(0, 0),
    IVec2::new(1, 0),
    IVec2::new(0, 1),
    IVec2::new(-1, 0),
    IVec2::new(0, -1),
];

/// Uniforms for the upscale kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct UpscaleUniforms {
    /// Input viewport (width, height, 1/width, 1/height).
    pub input_info: [f32; 4],
    /// History viewport (width, height, 1/width, 1/height).
    pub history_info: [f32; 4],
    /// Output viewport (width, height, 1/width, 1/height).
    pub output_info: [f32; 4],
    /// Jitter x, jitter y, pre-exposure, jitter sequence length.
    pub frame: [f32; 4],
    /// Kernel bias scale, box scale limit, lock luma similarity, new lock threshold.
    pub tuning: [f32; 4],
    /// Average Lanczos weight, unused x3.
    pub tuning_ext: [f32; 4],
    /// Tap count, pixel lock, reset, half precision.
    pub flags: [u32; 4],
}

impl UpscaleUniforms {
    /// Builds the block for one frame.
    #[must_use]
    pub fn new(
        geometry: &ViewportGeometry,
        jitter: Vec2,
        pre_exposure: f32,
        jitter_sequence_length: u32,
        reset: bool,
        config: &UpscalerConfig,
    ) -> Self {
        let t = &config.tunables;
        Self {
            input_info: geometry.input.as_uniform(),
            history_info: geometry.history.as_uniform(),
            output_info: geometry.output.as_uniform(),
            frame: [jitter.x, jitter.y, pre_exposure, jitter_sequence_length.max(1) as f32],
            tuning: [
                t.kernel_bias_scale,
                t.box_scale_limit,
                t.lock_luma_similarity,
                t.new_lock_threshold,
            ],
            tuning_ext: [t.average_lanczos_weight, 0.0, 0.0, 0.0],
            flags: [
                config.sample_count.taps() as u32,
                u32::from(config.pixel_lock),
                u32::from(reset),
                u32::from(config.half_precision),
            ],
        }
    }

    /// Raw bytes for GPU upload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    fn sample_count(&self) -> SampleCount {
        if self.flags[0] >= 9 {
            SampleCount::Nine
        } else {
            SampleCount::Five
        }
    }
}

/// Last frame's history for this view.
#[derive(Debug, Clone, Copy)]
pub struct PreviousHistory<'a> {
    /// Scene RGB + signed temporal reactive factor.
    pub color: &'a Texture2D<Vec4>,
    /// Lock lifetimes.
    pub locks: &'a Texture2D<f32>,
}

/// Textures the upscale kernel reads.
#[derive(Debug, Clone, Copy)]
pub struct UpscaleInputs<'a> {
    /// Convert output colour.
    pub color: &'a EncodedColor,
    /// Convert output `(motion.xy, depth, luma)`.
    pub motion_depth_luma: &'a Texture2D<Vec4>,
    /// Depth-clip factor at input resolution, if Activate ran.
    pub reactive: Option<&'a Texture2D<f32>>,
    /// Translucency mask at input resolution.
    pub translucency: Option<&'a Texture2D<f32>>,
    /// This frame's lock seeds at history resolution.
    pub new_locks: Option<&'a Texture2D<f32>>,
    /// Previous history; `None` forces every pixel to be a new sample.
    pub previous: Option<PreviousHistory<'a>>,
}

/// Textures the upscale kernel writes.
#[derive(Debug, Clone)]
pub struct UpscaleOutput {
    /// Scene RGB + signed temporal reactive factor.
    pub history: Texture2D<Vec4>,
    /// Lock lifetimes for next frame.
    pub locks: Texture2D<f32>,
    /// Pixels that took the new-sample branch.
    pub new_samples: u32,
}

impl UpscaleOutput {
    /// History colour without the reactive channel.
    #[must_use]
    pub fn color(&self) -> Texture2D<Vec3> {
        self.history.map(|t| t.truncate())
    }
}

/// Windowed Lanczos-2 approximation on squared distance.
#[inline]
#[must_use]
pub fn fast_lanczos(x2: f32) -> f32 {
    let a = 0.4 * x2 - 1.0;
    let b = 0.25 * x2 - 1.0;
    ((25.0 / 16.0) * a * a - (9.0 / 16.0)) * (b * b)
}

/// Weighted reconstruction of the jittered low-resolution neighbourhood.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Reconstruction {
    /// Upsampled colour, clamped to the raw neighbourhood.
    color: Vec3,
    /// Kernel weight averaged per tap, 0 when the kernel collapsed.
    weight: f32,
    box_min: Vec3,
    box_max: Vec3,
    box_center: Vec3,
    box_deviation: Vec3,
}

fn reconstruct(
    color: &EncodedColor,
    input_pos: IVec2,
    sample_delta: Vec2,
    kernel_bias: f32,
    curve_bias: f32,
    samples: SampleCount,
) -> Reconstruction {
    let taps = samples.taps();
    let mut sum = Vec3::ZERO;
    let mut weight_sum = 0.0;
    let mut box_min = Vec3::splat(f32::MAX);
    let mut box_max = Vec3::splat(f32::MIN);
    let mut box_center = Vec3::ZERO;
    let mut box_variance = Vec3::ZERO;
    let mut box_weight = 0.0;
    let mut center = Vec3::ZERO;

    for (index, offset) in SAMPLE_OFFSETS[..taps].iter().enumerate() {
        let sample = color.load(input_pos + *offset);
        if index == CENTER_TAP {
            center = sample;
        }

        let base_offset = (sample_delta + offset.as_vec2()) * kernel_bias;
        let distance2 = base_offset.dot(base_offset);
        let weight = fast_lanczos(distance2.min(4.0));
        sum += sample * weight;
        weight_sum += weight;

        let w = (distance2 * curve_bias).exp();
        box_min = box_min.min(sample);
        box_max = box_max.max(sample);
        box_center += sample * w;
        box_variance += sample * sample * w;
        box_weight += w;
    }

    let norm = if box_weight.abs() > 0.001 { box_weight } else { 1.0 };
    box_center /= norm;
    box_variance /= norm;
    let box_deviation = (box_variance - box_center * box_center).abs().powf(0.5);

    let (color, weight) = if weight_sum > 0.001 {
        ((sum / weight_sum).clamp(box_min, box_max), weight_sum / taps as f32)
    } else {
        (center, 0.0)
    };

    Reconstruction {
        color,
        weight,
        box_min,
        box_max,
        box_center,
        box_deviation,
    }
}

/// Base accumulation weight for history before adding this frame's sample.
fn base_accumulation(
    reactive: f32,
    depth_clip: f32,
    is_existing: bool,
    in_motion_last_frame: bool,
    upsampled_weight: f32,
    hr_velocity: f32,
) -> f32 {
    let existing: f32 = if is_existing { 1.0 } else { 0.0 };
    let moving: f32 = if in_motion_last_frame { 1.0 } else { 0.0 };
    let mut base = existing * (1.0 - reactive) * (1.0 - depth_clip);
    base = base.min(lerp(
        base,
        upsampled_weight * 10.0,
        moving.max((hr_velocity * 10.0).clamp(0.0, 1.0)),
    ));
    base.min(lerp(base, upsampled_weight, (hr_velocity / 20.0).clamp(0.0, 1.0)))
}

/// Signed reactive factor stored with history; negative means "in motion".
#[must_use]
pub fn temporal_reactive_factor(reactive: f32, depth_clip: f32, hr_velocity: f32, is_new: bool) -> f32 {
    let mut factor = reactive.min(0.99);
    factor = factor.max(lerp(factor, 0.4, hr_velocity.clamp(0.0, 1.0)));
    factor = (factor * factor).max(depth_clip * 0.1);
    if is_new {
        factor = 1.0;
    }
    if (hr_velocity * 10.0).clamp(0.0, 1.0) >= 1.0 {
        factor = -factor.max(1e-3);
    }
    factor
}

/// Share of this frame's sample in the blend, always in [0, 1].
#[inline]
#[must_use]
pub fn blend_alpha(upsampled_weight: f32, accumulation: f32) -> f32 {
    let alpha = upsampled_weight / accumulation;
    if alpha.is_finite() {
        alpha.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// Mask values outside [0, 1] are clamped; non-finite ones read as 0.
#[inline]
fn unit_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
fn is_uv_inside(uv: Vec2) -> bool {
    uv.cmpge(Vec2::ZERO).all() && uv.cmple(Vec2::ONE).all()
}

/// Runs the upscale kernel over the history viewport.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn run(inputs: &UpscaleInputs<'_>, uniforms: &UpscaleUniforms) -> UpscaleOutput {
    let input_size = Vec2::new(uniforms.input_info[0], uniforms.input_info[1]);
    let inv_input = Vec2::new(uniforms.input_info[2], uniforms.input_info[3]);
    let history_size = Vec2::new(uniforms.history_info[0], uniforms.history_info[1]);
    let inv_history = Vec2::new(uniforms.history_info[2], uniforms.history_info[3]);
    let output_size = Vec2::new(uniforms.output_info[0], uniforms.output_info[1]);
    let jitter = Vec2::new(uniforms.frame[0], uniforms.frame[1]);
    let pre_exposure = uniforms.frame[2];
    let jitter_sequence_length = uniforms.frame[3].max(1.0);
    let [kernel_bias_scale, box_scale_limit, lock_luma_similarity, new_lock_threshold] = uniforms.tuning;
    let average_lanczos_weight = uniforms.tuning_ext[0];
    let samples = uniforms.sample_count();
    let pixel_lock = uniforms.flags[1] != 0;
    let half_precision = uniforms.flags[3] != 0;
    let previous = if uniforms.flags[2] != 0 { None } else { inputs.previous };

    let extent = history_size.as_uvec2();
    let max_input = input_size.as_ivec2() - IVec2::ONE;
    let kernel_weight = history_size.x * inv_input.x;
    let scale = input_size / output_size;
    let scale_factor_influence = (1.0 / (scale.x * scale.y).abs().max(f32::EPSILON))
        .powi(3)
        .min(box_scale_limit);
    let lock_decay = jitter_sequence_length * average_lanczos_weight / samples.taps() as f32;

    let mut locks = Texture2D::new(extent, 0.0);
    let mut new_samples = 0;

    let history = dispatch(extent, |px| {
        let hr_uv = (px.as_vec2() + 0.5) * inv_history;
        let jitter_uv = (hr_uv + jitter * inv_input).clamp(Vec2::ZERO, Vec2::ONE);
        let input_pos = (jitter_uv * input_size).as_ivec2().min(max_input);

        let motion = inputs.motion_depth_luma.sample_bilinear(hr_uv).truncate().truncate();
        let depth_clip = unit_or_zero(inputs.reactive.map_or(0.0, |r| r.sample_bilinear(jitter_uv)));
        let alpha_mask = unit_or_zero(inputs.translucency.map_or(0.0, |t| t.sample_bilinear(jitter_uv)));
        let prev_uv = hr_uv + motion;

        let is_existing = is_uv_inside(prev_uv);
        let is_new = !is_existing || previous.is_none();

        let mut history_color = Vec3::ZERO;
        let mut temporal_reactive = 0.0;
        let mut in_motion_last_frame = false;
        let mut lock = 0.0;
        if let (false, Some(prev)) = (is_new, previous) {
            let texel = prev.color.sample_bilinear(prev_uv);
            history_color = color::to_working(texel.truncate(), pre_exposure);
            temporal_reactive = unit_or_zero(texel.w.abs());
            in_motion_last_frame = texel.w < 0.0;
            if pixel_lock {
                let seeded = inputs
                    .new_locks
                    .map_or(0.0, |n| n.load_clamped(px.as_ivec2()));
                lock = if seeded > new_lock_threshold {
                    seeded
                } else {
                    prev.locks.sample_point(prev_uv)
                };
            }
        }
        let reactive = temporal_reactive.max(alpha_mask);

        let mut lock_contribution = 0.0;
        if pixel_lock {
            let prev_luma = history_color.x;
            let luminance_diff: f32 = LOCK_LUMA_OFFSETS
                .iter()
                .map(|offset| {
                    let cur_luma = inputs.color.load(input_pos + *offset).x;
                    let max_luma = cur_luma.max(prev_luma);
                    if max_luma > HALF_MIN {
                        cur_luma.min(prev_luma) / max_luma
                    } else {
                        0.0
                    }
                })
                .sum();

            if lock < LOCK_SEED - 1e-4 && luminance_diff <= lock_luma_similarity {
                lock = 0.0;
            }
            if reactive.abs() >= HALF_MIN {
                lock = 0.0;
            }
            lock *= 1.0 - reactive;
            if depth_clip >= 0.1 {
                lock = 0.0;
            }
            lock_contribution = ((lock - 1.0).clamp(0.0, 1.0) * 4.0).clamp(0.0, 1.0);
        }

        let kernel_reactive = reactive.max(if is_new { 1.0 } else { 0.0 });
        let bias_max = kernel_weight.max(1.99) * (1.0 - kernel_reactive);
        let bias_min = ((1.0 + bias_max) * 0.3).max(1.0);
        let bias_factor = (0.25 * depth_clip).max(kernel_reactive).max(0.0);
        let kernel_bias = lerp(bias_max, bias_min, bias_factor) * kernel_bias_scale;

        let hr_velocity = (motion * history_size).length();
        let curve_bias = lerp(-2.0, -3.0, (hr_velocity * 0.02).clamp(0.0, 1.0));
        let sample_delta = input_pos.as_vec2() + 0.5 - jitter - hr_uv * input_size;

        let up = reconstruct(inputs.color, input_pos, sample_delta, kernel_bias, curve_bias, samples);

        let mut accumulation = base_accumulation(
            reactive,
            depth_clip,
            is_existing,
            in_motion_last_frame,
            up.weight,
            hr_velocity,
        );

        let blended = if is_new {
            new_samples += 1;
            up.color
        } else {
            let velocity_factor = (hr_velocity * 0.05).clamp(0.0, 1.0);
            let box_size = lerp(scale_factor_influence, 1.0, depth_clip.max(velocity_factor));
            let scaled = up.box_deviation * box_size;
            let rect_min = up.box_min.max(up.box_center - scaled);
            let rect_max = up.box_max.min(up.box_center + scaled).max(rect_min);
            let clamped = history_color.clamp(rect_min, rect_max);

            if rect_min.cmpgt(history_color).any() || history_color.cmpgt(rect_max).any() {
                history_color = clamped.lerp(history_color, lock_contribution);
                accumulation = lerp(accumulation.min(0.1), accumulation, lock_contribution);
            }

            accumulation = (accumulation + up.weight).max(1e-3);
            history_color.lerp(up.color, blend_alpha(up.weight, accumulation))
        };

        if pixel_lock {
            let next_uv = hr_uv - motion;
            lock = if is_uv_inside(next_uv) {
                (lock - up.weight / lock_decay).max(0.0)
            } else {
                0.0
            };
            locks.store(px.as_ivec2(), lock);
        }

        let factor = temporal_reactive_factor(reactive, depth_clip, hr_velocity, is_new);
        let rgb = color::from_working(blended, pre_exposure);
        let texel = rgb.extend(factor);
        if half_precision {
            color::round_half4(texel)
        } else {
            texel
        }
    });

    UpscaleOutput {
        history,
        locks,
        new_samples,
    }
}
