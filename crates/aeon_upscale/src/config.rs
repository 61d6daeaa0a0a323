//! # Upscaler Configuration
//!
//! One explicit struct, threaded through every `process` call. Nothing is
//! read from globals inside a kernel.
//!
//! ```toml
//! quality = "balanced"
//! sample_count = "nine"
//! sharpening = true
//! sharpness = 0.8
//!
//! [tunables]
//! similarity_threshold = 1.08
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{UpscaleError, UpscaleResult};

/// Render-resolution presets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityMode {
    /// 1/1.25 of the output resolution per axis.
    UltraQuality,
    /// 1/1.5 of the output resolution per axis.
    #[default]
    Quality,
    /// 1/1.7 of the output resolution per axis.
    Balanced,
    /// 1/2 of the output resolution per axis.
    Performance,
}

impl QualityMode {
    /// All modes, ordered by console index.
    pub const ALL: [Self; 4] = [
        Self::UltraQuality,
        Self::Quality,
        Self::Balanced,
        Self::Performance,
    ];

    /// Maps a console index to a mode. Out-of-range indices clamp.
    #[must_use]
    pub fn from_index(index: i32) -> Self {
        Self::ALL[index.clamp(0, 3).unsigned_abs() as usize]
    }

    /// Console index of this mode.
    #[must_use]
    pub const fn index(self) -> i32 {
        match self {
            Self::UltraQuality => 0,
            Self::Quality => 1,
            Self::Balanced => 2,
            Self::Performance => 3,
        }
    }

    /// Output / input size ratio per axis.
    #[inline]
    #[must_use]
    pub const fn upscale_ratio(self) -> f32 {
        match self {
            Self::UltraQuality => 1.25,
            Self::Quality => 1.5,
            Self::Balanced => 1.7,
            Self::Performance => 2.0,
        }
    }

    /// Input / output size ratio per axis.
    #[inline]
    #[must_use]
    pub fn resolution_fraction(self) -> f32 {
        1.0 / self.upscale_ratio()
    }

    /// Smallest fraction any mode renders at.
    #[must_use]
    pub fn min_fraction() -> f32 {
        Self::Performance.resolution_fraction()
    }

    /// Largest fraction any mode renders at.
    #[must_use]
    pub fn max_fraction() -> f32 {
        Self::UltraQuality.resolution_fraction()
    }
}

/// Number of low-resolution taps the upscale kernel gathers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleCount {
    /// Center plus the 4-neighbour cross.
    #[default]
    Five,
    /// Cross plus diagonals.
    Nine,
}

impl SampleCount {
    /// Number of taps.
    #[must_use]
    pub const fn taps(self) -> usize {
        match self {
            Self::Five => 5,
            Self::Nine => 9,
        }
    }
}

/// Layout of the Convert stage's colour output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorEncoding {
    /// YCoCg packed into one 32-bit word, 11/11/10 bits.
    Packed11_11_10,
    /// YCoCg stored as three IEEE half floats.
    #[default]
    Half,
}

/// Curve applied to linear luminance before similarity tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LumaCurve {
    /// A single power curve.
    #[default]
    Simplified,
    /// CIE lightness with a linear toe, then a power curve.
    Perceptual,
}

/// Empirically tuned constants.
///
/// These have no derivation beyond "looked right" and should be
/// recalibrated against an image-quality metric before being trusted on new
/// content.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tunables {
    /// View-depth separation scale for the disocclusion test.
    pub depth_separation: f32,
    /// Gain applied to opaque/translucent colour difference.
    pub translucency_scale: f32,
    /// Max/min luma ratio under which two neighbours count as similar.
    pub similarity_threshold: f32,
    /// Lock values above this were seeded this frame.
    pub new_lock_threshold: f32,
    /// Luminance-change sum above which an established lock survives.
    pub lock_luma_similarity: f32,
    /// Average Lanczos weight per jittered frame, used for lock decay.
    pub average_lanczos_weight: f32,
    /// Final scale on the upscale kernel bias.
    pub kernel_bias_scale: f32,
    /// Upper bound for the rectification box scale.
    pub box_scale_limit: f32,
    /// Maximum negative sharpening lobe.
    pub sharpen_limit: f32,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            depth_separation: 1.37e-5,
            translucency_scale: 350.0,
            similarity_threshold: 1.05,
            new_lock_threshold: 1.999,
            lock_luma_similarity: 0.4,
            average_lanczos_weight: 0.74,
            kernel_bias_scale: 0.7,
            box_scale_limit: 20.0,
            sharpen_limit: 0.25 - 1.0 / 16.0,
        }
    }
}

/// Per-frame upscaler configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpscalerConfig {
    /// Render-resolution preset.
    pub quality: QualityMode,
    /// Upscale kernel taps.
    pub sample_count: SampleCount,
    /// Run the sharpen stage.
    pub sharpening: bool,
    /// Sharpening strength in [0, 2].
    pub sharpness: f32,
    /// Seed and honour pixel locks on thin features.
    pub pixel_lock: bool,
    /// Round intermediates through IEEE half.
    pub half_precision: bool,
    /// History extent relative to the output extent, in [1, 2].
    pub history_size: f32,
    /// Convert stage colour layout.
    pub color_encoding: ColorEncoding,
    /// Run the Activate stage. Without it nothing is ever rejected by depth.
    pub depth_clip: bool,
    /// Luma curve for similarity tests.
    pub luma_curve: LumaCurve,
    /// Tuned constants.
    pub tunables: Tunables,
}

impl Default for UpscalerConfig {
    fn default() -> Self {
        Self {
            quality: QualityMode::Quality,
            sample_count: SampleCount::Five,
            sharpening: false,
            sharpness: 1.12,
            pixel_lock: true,
            half_precision: true,
            history_size: 1.0,
            color_encoding: ColorEncoding::Half,
            depth_clip: true,
            luma_curve: LumaCurve::Simplified,
            tunables: Tunables::default(),
        }
    }
}

impl UpscalerConfig {
    /// Parses a TOML document. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::InvalidConfig`] if the document is malformed
    /// or a float field is not finite.
    pub fn from_toml_str(source: &str) -> UpscaleResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| UpscaleError::InvalidConfig(e.to_string()))?;

        if !config.sharpness.is_finite() || !config.history_size.is_finite() {
            return Err(UpscaleError::InvalidConfig(
                "sharpness and history_size must be finite".into(),
            ));
        }

        Ok(config.validated())
    }

    /// Clamps every ranged field into its documented range.
    #[must_use]
    pub fn validated(mut self) -> Self {
        self.sharpness = if self.sharpness.is_finite() {
            self.sharpness.clamp(0.0, 2.0)
        } else {
            Self::default().sharpness
        };
        self.history_size = if self.history_size.is_finite() {
            self.history_size.clamp(1.0, 2.0)
        } else {
            1.0
        };
        self
    }
}
