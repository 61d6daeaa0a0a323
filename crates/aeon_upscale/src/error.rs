//! # Upscaler Error Types
//!
//! Errors surfaced to the host. Numeric edge cases inside the kernels are
//! never errors; they are clamped locally and show up as quality loss.

use thiserror::Error;

/// Errors that can occur when configuring or running the upscaler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpscaleError {
    /// Invalid configuration document or value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A host buffer does not match this frame's viewport geometry.
    #[error("extent mismatch for {buffer}: expected {expected:?}, got {actual:?}")]
    ExtentMismatch {
        /// Name of the offending buffer.
        buffer: &'static str,
        /// Extent required by the geometry.
        expected: (u32, u32),
        /// Extent supplied by the host.
        actual: (u32, u32),
    },

    /// The requested output extent has a zero dimension.
    #[error("invalid extent {width}x{height}")]
    InvalidExtent {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
}

/// Result type for upscaler operations.
pub type UpscaleResult<T> = Result<T, UpscaleError>;
