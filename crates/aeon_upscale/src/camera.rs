//! # Camera Parameters
//!
//! What the stages need to know about the projection: the current-clip to
//! previous-clip transform for motion reconstruction, the depth convention,
//! and the constants that turn device depth back into view depth.

use glam::{Mat4, Vec2, Vec4};

/// Device depth convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthConvention {
    /// Reversed-Z: near plane at 1, far plane at 0.
    pub inverted: bool,
}

impl Default for DepthConvention {
    fn default() -> Self {
        Self { inverted: true }
    }
}

impl DepthConvention {
    /// Returns true if device depth `a` is nearer the camera than `b`.
    #[inline]
    #[must_use]
    pub fn is_nearer(self, a: f32, b: f32) -> bool {
        if self.inverted {
            a > b
        } else {
            a < b
        }
    }
}

/// Per-frame camera description supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraParams {
    /// Maps current clip-space positions to previous clip space.
    pub clip_to_prev_clip: Mat4,
    /// Distance to the near plane (infinite far plane assumed).
    pub near_plane: f32,
    /// Full vertical field of view in radians.
    pub vertical_fov: f32,
    /// Depth buffer convention.
    pub depth: DepthConvention,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            clip_to_prev_clip: Mat4::IDENTITY,
            near_plane: 0.1,
            vertical_fov: std::f32::consts::FRAC_PI_3,
            depth: DepthConvention::default(),
        }
    }
}

impl CameraParams {
    /// Builds the reprojection from this frame's and last frame's
    /// view-projection matrices.
    #[must_use]
    pub fn from_view_projections(
        current: Mat4,
        previous: Mat4,
        near_plane: f32,
        vertical_fov: f32,
        depth: DepthConvention,
    ) -> Self {
        Self {
            clip_to_prev_clip: previous * current.inverse(),
            near_plane,
            vertical_fov,
            depth,
        }
    }

    /// UV-space motion (current to previous) of the pixel at `uv` with
    /// device depth `depth`, reconstructed from the camera transform alone.
    #[must_use]
    pub fn reconstruct_motion(&self, uv: Vec2, depth: f32) -> Vec2 {
        let screen = Vec2::new(2.0 * uv.x - 1.0, 1.0 - 2.0 * uv.y);
        let prev = self.clip_to_prev_clip * Vec4::new(screen.x, screen.y, depth, 1.0);
        if prev.w.abs() < 1e-6 || !prev.is_finite() {
            return Vec2::ZERO;
        }
        let ndc_motion = screen - prev.truncate().truncate() / prev.w;
        ndc_motion * Vec2::new(-0.5, 0.5)
    }
}

/// Constants for `view_depth = d[1] / (device - d[0])` and for projecting
/// NDC back to view space (`d[2]`, `d[3]`), infinite far plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceToViewDepth(pub [f32; 4]);

impl DeviceToViewDepth {
    /// Derives the constants for a viewport of `aspect` (width / height).
    #[must_use]
    pub fn new(camera: &CameraParams, aspect: f32) -> Self {
        let near = camera.near_plane.max(f32::EPSILON);
        let (c, e) = if camera.depth.inverted {
            (f32::EPSILON, near)
        } else {
            (-1.0 - f32::EPSILON, -near - f32::EPSILON)
        };
        let cot_half_fov = 1.0 / (0.5 * camera.vertical_fov).tan().max(1e-4);
        let a = cot_half_fov / aspect.max(1e-4);
        let b = cot_half_fov;
        Self([-c, e, 1.0 / a, 1.0 / b])
    }

    /// View-space distance for a device depth.
    #[inline]
    #[must_use]
    pub fn view_depth(&self, device: f32) -> f32 {
        let denom = device - self.0[0];
        let denom = if denom.abs() < 1e-7 {
            1e-7_f32.copysign(denom)
        } else {
            denom
        };
        self.0[1] / denom
    }

    /// Ratio of the view-ray length at the viewport corner to the centre.
    #[must_use]
    pub fn fov_factor(&self) -> f32 {
        (1.0 + self.0[2] * self.0[2] + self.0[3] * self.0[3]).sqrt()
    }
}
