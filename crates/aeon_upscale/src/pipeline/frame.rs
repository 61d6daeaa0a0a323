//! Per-frame host data.
//!
//! What the host hands in for one view and what it gets back.

use glam::{UVec2, Vec2, Vec3};

use super::PipelineStats;
use crate::camera::CameraParams;
use crate::state::StateHandle;
use crate::texture::Texture2D;

/// Host-assigned view identifier (one per split-screen viewport).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u64);

/// Monotonically increasing host frame counter.
pub type FrameIndex = u64;

/// Identifies one view in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewInfo {
    /// View being processed.
    pub id: ViewId,
    /// Current frame.
    pub frame_index: FrameIndex,
}

impl ViewInfo {
    /// Creates a view description.
    #[must_use]
    pub const fn new(id: u64, frame_index: FrameIndex) -> Self {
        Self {
            id: ViewId(id),
            frame_index,
        }
    }
}

/// Everything the host renders for one view in one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs<'a> {
    /// Scene colour at input resolution.
    pub scene_color: &'a Texture2D<Vec3>,
    /// Device depth at input resolution.
    pub scene_depth: &'a Texture2D<f32>,
    /// UV-space motion, current to previous. `None` or non-finite texels
    /// mean "reconstruct from the camera".
    pub motion: Option<&'a Texture2D<Vec2>>,
    /// Scene colour before translucency, if the host captured it.
    pub opaque_color: Option<&'a Texture2D<Vec3>>,
    /// Camera description.
    pub camera: CameraParams,
    /// Exposure the scene colour was pre-multiplied by.
    pub pre_exposure: f32,
    /// Sub-pixel jitter in input pixels.
    pub jitter: Vec2,
    /// Length of the jitter sequence.
    pub jitter_sequence_length: u32,
    /// Discontinuity: drop all history this frame.
    pub camera_cut: bool,
    /// Requested output resolution.
    pub output_size: UVec2,
}

impl<'a> FrameInputs<'a> {
    /// Inputs with a static camera, unit exposure and no jitter.
    #[must_use]
    pub fn new(scene_color: &'a Texture2D<Vec3>, scene_depth: &'a Texture2D<f32>, output_size: UVec2) -> Self {
        Self {
            scene_color,
            scene_depth,
            motion: None,
            opaque_color: None,
            camera: CameraParams::default(),
            pre_exposure: 1.0,
            jitter: Vec2::ZERO,
            jitter_sequence_length: 8,
            camera_cut: false,
            output_size,
        }
    }
}

/// What one `process` call produces.
#[derive(Debug, Clone)]
pub struct FrameOutputs {
    /// Final colour at output resolution.
    pub color: Texture2D<Vec3>,
    /// Valid rectangle of `color`: (x0, y0, x1, y1).
    pub color_rect: [u32; 4],
    /// True if history was discarded this frame.
    pub reset: bool,
    /// State the view's history lives in.
    pub state: StateHandle,
    /// Frame statistics.
    pub stats: PipelineStats,
}

impl FrameOutputs {
    /// Output extent.
    #[must_use]
    pub fn extent(&self) -> UVec2 {
        self.color.extent()
    }
}
