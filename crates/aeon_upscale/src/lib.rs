//! # AEON Upscale
//!
//! Temporal super-resolution: renders at a fraction of the output size and
//! accumulates jittered samples over time into a full-resolution history.
//!
//! ```text
//!   low-res colour/depth/motion
//!        │
//!        ▼
//!   Convert ─► Activate ─► Upscale ─► Sharpen ─► output colour
//!                 ▲           │
//!                 └─ history ◄┘   (FrameState, pooled per view)
//! ```
//!
//! ## Architecture Rules
//!
//! 1. **Kernels are pure** - every stage reads a uniform block and textures
//!    and returns new textures
//! 2. **No global knobs** - all options travel in [`UpscalerConfig`]
//! 3. **Views never alias** - a state used by one view this frame is never
//!    handed to another until the next frame
//!
//! ## Example
//!
//! ```rust
//! use aeon_upscale::{FrameInputs, Texture2D, Upscaler, UpscalerConfig, ViewInfo, ViewportGeometry};
//! use glam::{UVec2, Vec3};
//!
//! let config = UpscalerConfig::default();
//! let output = UVec2::new(48, 27);
//! let geometry = ViewportGeometry::from_output(output, config.quality, config.history_size);
//!
//! let color = Texture2D::new(geometry.input.extent, Vec3::splat(0.25));
//! let depth = Texture2D::new(geometry.depth.extent, 0.5);
//!
//! let upscaler = Upscaler::new();
//! let frame = upscaler
//!     .process(&ViewInfo::new(0, 0), &FrameInputs::new(&color, &depth, output), &config)
//!     .unwrap();
//! assert_eq!(frame.extent(), output);
//! assert!(frame.reset);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
#![allow(clippy::module_name_repetitions)]

pub mod camera;
pub mod color;
pub mod config;
pub mod error;
pub mod geometry;
pub mod pipeline;
pub mod stages;
pub mod state;
pub mod texture;

pub use camera::{CameraParams, DepthConvention, DeviceToViewDepth};
pub use config::{ColorEncoding, LumaCurve, QualityMode, SampleCount, Tunables, UpscalerConfig};
pub use error::{UpscaleError, UpscaleResult};
pub use geometry::{Viewport, ViewportGeometry};
pub use pipeline::{
    FrameIndex, FrameInputs, FrameOutputs, PipelineStats, StateDecision, Upscaler, ViewId, ViewInfo,
};
pub use stages::{EncodedColor, Stage, StagePlan};
pub use state::{FrameState, HistoryBuffers, PoolStats, StateHandle, StatePool};
pub use texture::Texture2D;
