//! # Viewport Geometry
//!
//! The four rectangles one upscaled frame works with.
//!
//! ```text
//!   input (render) ──► depth (same extent as input)
//!        │
//!        │  x upscale ratio (quality mode)
//!        ▼
//!   output ──► history (output x history_size, in [1, 2])
//! ```
//!
//! Computed once per frame. Zero extents are a programmer error and are
//! asserted in debug builds; the orchestrator rejects them before getting
//! here in release builds.

// Pixel math moves between integer extents and float coordinates
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]

use glam::{UVec2, Vec2};

use crate::config::QualityMode;

/// One viewport rectangle and its inverse size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Width and height in pixels.
    pub extent: UVec2,
    /// Rectangle inside the target texture: (x0, y0, x1, y1).
    pub rect: [u32; 4],
    /// (1/width, 1/height).
    pub inv_size: Vec2,
}

impl Viewport {
    /// Creates a viewport anchored at the origin.
    #[must_use]
    pub fn new(extent: UVec2) -> Self {
        debug_assert!(extent.x > 0 && extent.y > 0, "viewport extent must be positive");
        let extent = extent.max(UVec2::ONE);
        Self {
            extent,
            rect: [0, 0, extent.x, extent.y],
            inv_size: Vec2::ONE / extent.as_vec2(),
        }
    }

    /// Width in pixels.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.extent.x
    }

    /// Height in pixels.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.extent.y
    }

    /// Extent as floats.
    #[inline]
    #[must_use]
    pub fn size(&self) -> Vec2 {
        self.extent.as_vec2()
    }

    /// Number of pixels covered.
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.extent.x as usize * self.extent.y as usize
    }

    /// Uniform layout: (width, height, 1/width, 1/height).
    #[must_use]
    pub fn as_uniform(&self) -> [f32; 4] {
        [
            self.extent.x as f32,
            self.extent.y as f32,
            self.inv_size.x,
            self.inv_size.y,
        ]
    }
}

/// Input, depth, history and output viewports for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportGeometry {
    /// Low-resolution render target.
    pub input: Viewport,
    /// Depth buffer, same extent as input.
    pub depth: Viewport,
    /// History buffers.
    pub history: Viewport,
    /// Final colour.
    pub output: Viewport,
}

impl ViewportGeometry {
    /// Derives all rectangles from the requested output size.
    ///
    /// `fraction` is input/output per axis; `history_size` is clamped to
    /// [1, 2].
    #[must_use]
    pub fn compute(output_size: UVec2, fraction: f32, history_size: f32) -> Self {
        debug_assert!(fraction > 0.0, "resolution fraction must be positive");
        let input = (output_size.as_vec2() * fraction).round().as_uvec2().max(UVec2::ONE);
        Self::build(input, output_size, history_size)
    }

    /// Derives all rectangles from a quality preset and the output size.
    #[must_use]
    pub fn from_output(output_size: UVec2, quality: QualityMode, history_size: f32) -> Self {
        Self::compute(output_size, quality.resolution_fraction(), history_size)
    }

    /// Derives all rectangles from the host's render size.
    #[must_use]
    pub fn from_input(input_size: UVec2, quality: QualityMode, history_size: f32) -> Self {
        let output = (input_size.as_vec2() * quality.upscale_ratio())
            .round()
            .as_uvec2()
            .max(UVec2::ONE);
        Self::build(input_size, output, history_size)
    }

    fn build(input: UVec2, output: UVec2, history_size: f32) -> Self {
        let factor = if history_size.is_finite() {
            history_size.clamp(1.0, 2.0)
        } else {
            1.0
        };
        let history = (output.as_vec2() * factor).ceil().as_uvec2();

        Self {
            input: Viewport::new(input),
            depth: Viewport::new(input),
            history: Viewport::new(history),
            output: Viewport::new(output),
        }
    }

    /// True when history is stored above output resolution.
    #[must_use]
    pub fn needs_resolve(&self) -> bool {
        self.history.extent != self.output.extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_geometry_matches_reference() {
        let geometry = ViewportGeometry::from_input(UVec2::new(960, 540), QualityMode::Quality, 1.0);
        assert_eq!(geometry.output.extent, UVec2::new(1440, 810));
        assert_eq!(geometry.history.extent, UVec2::new(1440, 810));
        assert_eq!(geometry.depth.extent, geometry.input.extent);
        assert!(!geometry.needs_resolve());
    }

    #[test]
    fn test_from_output_inverts_from_input() {
        for mode in QualityMode::ALL {
            let geometry = ViewportGeometry::from_output(UVec2::new(1920, 1080), mode, 1.0);
            assert!(geometry.input.extent.cmple(geometry.output.extent).all());
        }
        let geometry = ViewportGeometry::from_output(UVec2::new(1440, 810), QualityMode::Quality, 1.0);
        assert_eq!(geometry.input.extent, UVec2::new(960, 540));
    }

    #[test]
    fn test_history_factor_is_clamped() {
        let big = ViewportGeometry::from_output(UVec2::new(100, 50), QualityMode::Performance, 7.0);
        assert_eq!(big.history.extent, UVec2::new(200, 100));
        assert!(big.needs_resolve());

        let small = ViewportGeometry::from_output(UVec2::new(100, 50), QualityMode::Performance, 0.1);
        assert_eq!(small.history.extent, UVec2::new(100, 50));
    }

    #[test]
    fn test_viewport_uniform_layout() {
        let viewport = Viewport::new(UVec2::new(4, 2));
        assert_eq!(viewport.as_uniform(), [4.0, 2.0, 0.25, 0.5]);
        assert_eq!(viewport.rect, [0, 0, 4, 2]);
        assert_eq!(viewport.pixel_count(), 8);
    }
}
