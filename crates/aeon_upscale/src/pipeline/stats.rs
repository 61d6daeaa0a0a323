//! Upscaler statistics.

/// How a view's frame state was chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StateDecision {
    /// Kept the view's own state from last frame.
    #[default]
    Continued,
    /// Took a state from the pool.
    Reused,
    /// Allocated a fresh state.
    Allocated,
}

/// Statistics from one `process` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Stages dispatched, including the resolve.
    pub stages_run: u32,
    /// History was discarded.
    pub reset: bool,
    /// How the state was chosen.
    pub decision: StateDecision,
    /// Lock seeds written by Activate.
    pub lock_seeds: u32,
    /// History pixels that took the new-sample branch.
    pub new_samples: u32,
    /// History pixels processed.
    pub history_pixels: u32,
}

impl PipelineStats {
    /// Fraction of history pixels that had to start over.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new_sample_ratio(&self) -> f32 {
        if self.history_pixels > 0 {
            self.new_samples as f32 / self.history_pixels as f32
        } else {
            0.0
        }
    }
}
