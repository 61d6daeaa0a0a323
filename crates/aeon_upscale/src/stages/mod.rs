//! # Pipeline Stages
//!
//! ```text
//!   scene colour ─┐
//!   depth ────────┼─► Convert ─► encoded colour ─────────────┐
//!   motion ───────┘       │                                   ▼
//!                         └─► motion/depth/luma ─► Activate ─► Upscale ─► (Sharpen)
//!                                                  reactive      │
//!                                                  new locks     └─► history
//! ```
//!
//! Each stage is a pure per-pixel kernel: it reads its parameters from a
//! `#[repr(C)]` uniform block and its inputs from textures, and returns new
//! textures. Which stages run is decided once per frame by [`StagePlan`].

pub mod activate;
pub mod convert;
pub mod sharpen;
pub mod upscale;

use glam::{IVec2, UVec2, Vec3};
use half::f16;

use crate::color;
use crate::config::{ColorEncoding, SampleCount, UpscalerConfig};
use crate::texture::Texture2D;

/// Convert-stage colour output, in the working space.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedColor {
    /// YCoCg packed 11/11/10.
    Packed(Texture2D<u32>),
    /// YCoCg as three halves.
    Half(Texture2D<[f16; 3]>),
}

impl EncodedColor {
    /// Encoding used.
    #[must_use]
    pub const fn encoding(&self) -> ColorEncoding {
        match self {
            Self::Packed(_) => ColorEncoding::Packed11_11_10,
            Self::Half(_) => ColorEncoding::Half,
        }
    }

    /// Width and height.
    #[must_use]
    pub fn extent(&self) -> UVec2 {
        match self {
            Self::Packed(t) => t.extent(),
            Self::Half(t) => t.extent(),
        }
    }

    /// Decodes the texel at `pos` (clamped) to working-space YCoCg.
    #[inline]
    #[must_use]
    pub fn load(&self, pos: IVec2) -> Vec3 {
        let stored = match self {
            Self::Packed(t) => color::unpack_11_11_10(t.load_clamped(pos)),
            Self::Half(t) => color::unpack_half(t.load_clamped(pos)),
        };
        color::denormalize_ycocg(stored)
    }
}

/// One stage of the per-view chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stage {
    /// Reproject motion, dilate depth, encode colour.
    Convert {
        /// An opaque-only colour was captured; derive translucency.
        opaque_capture: bool,
    },
    /// Depth-clip confidence and lock seeding.
    Activate {
        /// Seed pixel locks.
        pixel_lock: bool,
    },
    /// Resample and accumulate into history.
    Upscale {
        /// Kernel taps.
        samples: SampleCount,
    },
    /// Edge-aware sharpening of the history colour.
    Sharpen {
        /// Lobe multiplier.
        sharpness: f32,
    },
}

impl Stage {
    /// Short name for spans and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Convert { .. } => "convert",
            Self::Activate { .. } => "activate",
            Self::Upscale { .. } => "upscale",
            Self::Sharpen { .. } => "sharpen",
        }
    }
}

/// Ordered list of stages for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct StagePlan {
    stages: Vec<Stage>,
}

impl StagePlan {
    /// Selects stages from the configuration.
    ///
    /// Convert and Upscale always run. Activate runs when depth clipping is
    /// enabled, Sharpen when sharpening is.
    #[must_use]
    pub fn from_config(config: &UpscalerConfig, opaque_capture: bool) -> Self {
        let mut stages = Vec::with_capacity(4);
        stages.push(Stage::Convert { opaque_capture });
        if config.depth_clip {
            stages.push(Stage::Activate {
                pixel_lock: config.pixel_lock,
            });
        }
        stages.push(Stage::Upscale {
            samples: config.sample_count,
        });
        if config.sharpening {
            stages.push(Stage::Sharpen {
                sharpness: config.sharpness,
            });
        }
        Self { stages }
    }

    /// Stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false; a plan has at least Convert and Upscale.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
