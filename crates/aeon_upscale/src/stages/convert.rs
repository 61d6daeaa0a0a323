//! # Convert Stage
//!
//! Per input pixel:
//! 1. Dilate depth: pick the nearest depth in the 3x3 neighbourhood and
//!    remember where it came from.
//! 2. Fetch motion at that dilated position, or reconstruct it from the
//!    camera transform when the host has none.
//! 3. Encode the colour into working-space YCoCg (packed or half).
//! 4. Emit `(motion.xy, nearest depth, luma)` for the later stages.
//!
//! With an opaque-only capture it also emits a translucency mask: how much
//! the final colour differs from the opaque one, scaled and saturated.

// Pixel math moves between integer extents and float coordinates
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]

use bytemuck::{Pod, Zeroable};
use glam::{IVec2, Mat4, UVec2, Vec2, Vec3, Vec4};

use super::EncodedColor;
use crate::camera::{CameraParams, DepthConvention};
use crate::color;
use crate::config::{ColorEncoding, LumaCurve, UpscalerConfig};
use crate::geometry::ViewportGeometry;
use crate::texture::{dispatch, Texture2D};

/// 3x3 neighbourhood, centre first so ties keep the pixel itself.
const DILATION_OFFSETS: [IVec2; 9] = [
    IVec2::new(0, 0),
    IVec2::new(1, 0),
    IVec2::new(0, 1),
    IVec2::new(0, -1),
    IVec2::new(-1, 0),
    IVec2::new(-1, 1),
    IVec2::new(1, 1),
    IVec2::new(-1, -1),
    IVec2::new(1, -1),
];

/// Uniforms for the convert kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ConvertUniforms {
    /// Input viewport (width, height, 1/width, 1/height).
    pub input_info: [f32; 4],
    /// Current clip to previous clip, column major.
    pub clip_to_prev_clip: [[f32; 4]; 4],
    /// Pre-exposure, translucency scale, unused, unused.
    pub params: [f32; 4],
    /// Inverted depth, half precision, colour encoding, luma curve.
    pub flags: [u32; 4],
}

impl ConvertUniforms {
    /// Builds the block for one frame.
    #[must_use]
    pub fn new(
        geometry: &ViewportGeometry,
        camera: &CameraParams,
        pre_exposure: f32,
        config: &UpscalerConfig,
    ) -> Self {
        Self {
            input_info: geometry.input.as_uniform(),
            clip_to_prev_clip: camera.clip_to_prev_clip.to_cols_array_2d(),
            params: [pre_exposure, config.tunables.translucency_scale, 0.0, 0.0],
            flags: [
                u32::from(camera.depth.inverted),
                u32::from(config.half_precision),
                match config.color_encoding {
                    ColorEncoding::Packed11_11_10 => 0,
                    ColorEncoding::Half => 1,
                },
                match config.luma_curve {
                    LumaCurve::Simplified => 0,
                    LumaCurve::Perceptual => 1,
                },
            ],
        }
    }

    /// Raw bytes for GPU upload.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    fn depth(&self) -> DepthConvention {
        DepthConvention {
            inverted: self.flags[0] != 0,
        }
    }

    fn half_precision(&self) -> bool {
        self.flags[1] != 0
    }

    fn encoding(&self) -> ColorEncoding {
        if self.flags[2] == 0 {
            ColorEncoding::Packed11_11_10
        } else {
            ColorEncoding::Half
        }
    }

    fn luma_curve(&self) -> LumaCurve {
        if self.flags[3] == 0 {
            LumaCurve::Simplified
        } else {
            LumaCurve::Perceptual
        }
    }

    fn camera(&self) -> CameraParams {
        CameraParams {
            clip_to_prev_clip: Mat4::from_cols_array_2d(&self.clip_to_prev_clip),
            depth: self.depth(),
            ..CameraParams::default()
        }
    }
}

/// Textures the convert kernel reads.
#[derive(Debug, Clone, Copy)]
pub struct ConvertInputs<'a> {
    /// Scene colour at input resolution.
    pub color: &'a Texture2D<Vec3>,
    /// Device depth at input resolution.
    pub depth: &'a Texture2D<f32>,
    /// UV-space motion, current to previous. Non-finite texels are absent.
    pub motion: Option<&'a Texture2D<Vec2>>,
    /// Scene colour before translucency.
    pub opaque_color: Option<&'a Texture2D<Vec3>>,
}

/// Textures the convert kernel writes.
#[derive(Debug, Clone)]
pub struct ConvertOutput {
    /// Working-space colour.
    pub color: EncodedColor,
    /// `(motion.xy, dilated depth, luma)`.
    pub motion_depth_luma: Texture2D<Vec4>,
    /// Translucency reactive mask, when an opaque capture was supplied.
    pub translucency: Option<Texture2D<f32>>,
}

impl ConvertOutput {
    /// Dilated depth plane, kept as next frame's previous depth.
    #[must_use]
    pub fn dilated_depth(&self) -> Texture2D<f32> {
        self.motion_depth_luma.map(|t| t.z)
    }
}

/// Finds the nearest depth around `pos` and the texel it came from.
///
/// Non-finite samples are skipped. A neighbourhood with no finite depth
/// reports 0, which downstream stages treat as "no depth".
#[must_use]
pub fn nearest_depth(depth: &Texture2D<f32>, pos: IVec2, convention: DepthConvention) -> (f32, IVec2) {
    let max = depth.extent().as_ivec2() - IVec2::ONE;
    let mut nearest: Option<(f32, IVec2)> = None;

    for offset in &DILATION_OFFSETS {
        let sample_pos = (pos + *offset).clamp(IVec2::ZERO, max);
        let sample = depth.load_clamped(sample_pos);
        if !sample.is_finite() {
            continue;
        }
        let closer = match nearest {
            Some((current, _)) => convention.is_nearer(sample, current),
            None => true,
        };
        if closer {
            nearest = Some((sample, sample_pos));
        }
    }
    nearest.unwrap_or((0.0, pos.clamp(IVec2::ZERO, max)))
}

/// Runs the convert kernel over the input viewport.
#[must_use]
pub fn run(inputs: &ConvertInputs<'_>, uniforms: &ConvertUniforms) -> ConvertOutput {
    let extent = UVec2::new(uniforms.input_info[0] as u32, uniforms.input_info[1] as u32);
    let inv_size = Vec2::new(uniforms.input_info[2], uniforms.input_info[3]);
    let pre_exposure = uniforms.params[0];
    let half_precision = uniforms.half_precision();
    let curve = uniforms.luma_curve();
    let convention = uniforms.depth();
    let camera = uniforms.camera();

    let motion_depth_luma = dispatch(extent, |px| {
        let pos = px.as_ivec2();
        let (depth, coord) = nearest_depth(inputs.depth, pos, convention);

        let host_motion = inputs
            .motion
            .map(|m| m.load_clamped(coord))
            .filter(|m| m.is_finite());
        let motion = host_motion.unwrap_or_else(|| {
            let uv = (coord.as_vec2() + 0.5) * inv_size;
            camera.reconstruct_motion(uv, depth)
        });

        let prepared = color::prepare(inputs.color.load_clamped(pos), pre_exposure);
        let luma = color::luma(prepared, curve);

        let texel = Vec4::new(motion.x, motion.y, depth, luma);
        if half_precision {
            // Depth keeps full precision; reversed-Z collapses in half
            Vec4::new(
                color::round_half(texel.x),
                color::round_half(texel.y),
                depth,
                color::round_half(texel.w),
            )
        } else {
            texel
        }
    });

    let normalized = |px: UVec2| {
        let working = color::to_working(inputs.color.load_clamped(px.as_ivec2()), pre_exposure);
        color::normalize_ycocg(working)
    };
    let encoded = match uniforms.encoding() {
        ColorEncoding::Packed11_11_10 => {
            EncodedColor::Packed(dispatch(extent, |px| color::pack_11_11_10(normalized(px))))
        }
        ColorEncoding::Half => EncodedColor::Half(dispatch(extent, |px| color::pack_half(normalized(px)))),
    };

    let translucency = inputs.opaque_color.map(|opaque| {
        let scale = uniforms.params[1];
        dispatch(extent, |px| {
            let pos = px.as_ivec2();
            let final_color = color::tonemap(color::prepare(inputs.color.load_clamped(pos), pre_exposure));
            let opaque_color = color::tonemap(color::prepare(opaque.load_clamped(pos), pre_exposure));
            (scale * (final_color - opaque_color).abs().max_element()).clamp(0.0, 1.0)
        })
    });

    ConvertOutput {
        color: encoded,
        motion_depth_luma,
        translucency,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniforms(size: UVec2, config: &UpscalerConfig, camera: &CameraParams) -> ConvertUniforms {
        let geometry = ViewportGeometry::from_input(size, config.quality, 1.0);
        ConvertUniforms::new(&geometry, camera, 1.0, config)
    }

    #[test]
    fn test_uniform_block_is_aligned() {
        assert_eq!(std::mem::size_of::<ConvertUniforms>() % 16, 0);
    }

    #[test]
    fn test_nearest_depth_follows_convention() {
        let mut depth = Texture2D::new(UVec2::new(3, 3), 0.5);
        depth.store(IVec2::new(2, 0), 0.9);
        depth.store(IVec2::new(0, 2), 0.1);

        let (d, at) = nearest_depth(&depth, IVec2::ONE, DepthConvention { inverted: true });
        assert_eq!((d, at), (0.9, IVec2::new(2, 0)));

        let (d, at) = nearest_depth(&depth, IVec2::ONE, DepthConvention { inverted: false });
        assert_eq!((d, at), (0.1, IVec2::new(0, 2)));
    }

    #[test]
    fn test_nearest_depth_skips_invalid_samples() {
        let mut depth = Texture2D::new(UVec2::new(3, 3), 0.5);
        depth.store(IVec2::ONE, f32::NAN);
        depth.store(IVec2::new(2, 2), f32::INFINITY);
        depth.store(IVec2::new(0, 1), 0.7);

        let (d, at) = nearest_depth(&depth, IVec2::ONE, DepthConvention { inverted: true });
        assert_eq!((d, at), (0.7, IVec2::new(0, 1)));

        let invalid = Texture2D::new(UVec2::new(3, 3), f32::NAN);
        let (d, at) = nearest_depth(&invalid, IVec2::ONE, DepthConvention { inverted: true });
        assert_eq!((d, at), (0.0, IVec2::ONE));
    }

    #[test]
    fn test_host_motion_is_dilated() {
        let size = UVec2::new(4, 4);
        let color = Texture2D::new(size, Vec3::splat(0.5));
        let mut depth = Texture2D::new(size, 0.1);
        depth.store(IVec2::new(2, 1), 0.8);
        let mut motion = Texture2D::new(size, Vec2::ZERO);
        motion.store(IVec2::new(2, 1), Vec2::new(0.25, -0.125));

        let config = UpscalerConfig::default();
        let camera = CameraParams::default();
        let out = run(
            &ConvertInputs {
                color: &color,
                depth: &depth,
                motion: Some(&motion),
                opaque_color: None,
            },
            &uniforms(size, &config, &camera),
        );

        // (1,1) touches the near texel at (2,1) and inherits its motion
        let texel = out.motion_depth_luma.load(UVec2::new(1, 1));
        assert_eq!(texel.truncate().truncate(), Vec2::new(0.25, -0.125));
        assert_eq!(texel.z, 0.8);
        // (0,3) does not
        assert_eq!(out.motion_depth_luma.load(UVec2::new(0, 3)).x, 0.0);
    }

    #[test]
    fn test_missing_motion_is_reconstructed() {
        let size = UVec2::new(4, 4);
        let color = Texture2D::new(size, Vec3::splat(0.5));
        let depth = Texture2D::new(size, 0.5);
        let mut motion = Texture2D::new(size, Vec2::ZERO);
        motion.fill(Vec2::NAN);

        let camera = CameraParams {
            clip_to_prev_clip: Mat4::from_translation(Vec3::new(0.2, 0.0, 0.0)),
            ..CameraParams::default()
        };
        let config = UpscalerConfig {
            half_precision: false,
            ..UpscalerConfig::default()
        };
        let out = run(
            &ConvertInputs {
                color: &color,
                depth: &depth,
                motion: Some(&motion),
                opaque_color: None,
            },
            &uniforms(size, &config, &camera),
        );

        let texel = out.motion_depth_luma.load(UVec2::new(2, 2));
        assert!((texel.x - 0.1).abs() < 1e-5);
        assert!(texel.y.abs() < 1e-6);
    }

    #[test]
    fn test_translucency_mask_from_opaque_capture() {
        let size = UVec2::new(2, 1);
        let color = Texture2D::from_vec(size, vec![Vec3::splat(0.3), Vec3::new(0.9, 0.3, 0.3)]).unwrap();
        let opaque = Texture2D::new(size, Vec3::splat(0.3));
        let depth = Texture2D::new(size, 0.5);

        let config = UpscalerConfig::default();
        let out = run(
            &ConvertInputs {
                color: &color,
                depth: &depth,
                motion: None,
                opaque_color: Some(&opaque),
            },
            &uniforms(size, &config, &CameraParams::default()),
        );

        let mask = out.translucency.unwrap();
        assert_eq!(mask.load(UVec2::new(0, 0)), 0.0);
        assert_eq!(mask.load(UVec2::new(1, 0)), 1.0);
    }
}
