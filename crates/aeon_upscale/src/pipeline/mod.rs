//! # Upscaler Orchestration
//!
//! Runs the stage chain for one view per call and keeps each view's history
//! in a pooled [`FrameState`].
//!
//! ```text
//!   process(view, inputs, config)
//!     ├─ validate extents against ViewportGeometry
//!     ├─ select state:  own state ─► continue
//!     │                 none / used this frame ─► StatePool::acquire
//!     ├─ StagePlan:     Convert ─► [Activate] ─► Upscale ─► [Sharpen]
//!     ├─ resolve history to output extent (history_size > 1)
//!     └─ promote history + locks + dilated depth into the state
//! ```
//!
//! Views are independent: `process` takes `&self` and different views may be
//! processed from different threads. The pool keeps them from sharing a
//! state within a frame.

mod frame;
mod stats;

pub use frame::{FrameIndex, FrameInputs, FrameOutputs, ViewId, ViewInfo};
pub use stats::{PipelineStats, StateDecision};

use std::collections::HashMap;
use std::sync::Arc;

use glam::{UVec2, Vec3};
use parking_lot::Mutex;

use crate::config::UpscalerConfig;
use crate::error::{UpscaleError, UpscaleResult};
use crate::geometry::ViewportGeometry;
use crate::stages::activate::{self, ActivateInputs, ActivateOutput, ActivateUniforms};
use crate::stages::convert::{self, ConvertInputs, ConvertOutput, ConvertUniforms};
use crate::stages::sharpen::{self, SharpenUniforms};
use crate::stages::upscale::{self, PreviousHistory, UpscaleInputs, UpscaleOutput, UpscaleUniforms};
use crate::stages::{Stage, StagePlan};
use crate::state::{FrameState, HistoryBuffers, PoolStats, StateHandle, StatePool};
use crate::texture::{dispatch, Texture2D};

/// Temporal upscaler for any number of views.
pub struct Upscaler {
    /// Shared state pool.
    pool: StatePool,
    /// State currently attached to each view.
    views: Mutex<HashMap<ViewId, StateHandle>>,
    /// Opaque colour captured this frame, per view.
    opaque: Mutex<HashMap<ViewId, Arc<Texture2D<Vec3>>>>,
}

impl Upscaler {
    /// Creates an upscaler with an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pool: StatePool::new(),
            views: Mutex::new(HashMap::new()),
            opaque: Mutex::new(HashMap::new()),
        }
    }

    /// Upscales one frame of one view.
    ///
    /// # Errors
    ///
    /// Returns [`UpscaleError::InvalidExtent`] for a zero output size and
    /// [`UpscaleError::ExtentMismatch`] when a host buffer does not match the
    /// input extent derived from `config`. A rejected frame leaves the view's
    /// history untouched.
    pub fn process(
        &self,
        view: &ViewInfo,
        inputs: &FrameInputs<'_>,
        config: &UpscalerConfig,
    ) -> UpscaleResult<FrameOutputs> {
        let config = config.validated();
        if inputs.output_size.x == 0 || inputs.output_size.y == 0 {
            return Err(UpscaleError::InvalidExtent {
                width: inputs.output_size.x,
                height: inputs.output_size.y,
            });
        }

        let geometry = ViewportGeometry::from_output(inputs.output_size, config.quality, config.history_size);
        let captured = self.opaque.lock().get(&view.id).cloned();
        let opaque_color = inputs.opaque_color.or(captured.as_deref());

        check_extent("scene_color", geometry.input.extent, inputs.scene_color.extent())?;
        check_extent("scene_depth", geometry.depth.extent, inputs.scene_depth.extent())?;
        if let Some(motion) = inputs.motion {
            check_extent("motion", geometry.input.extent, motion.extent())?;
        }
        if let Some(opaque) = opaque_color {
            check_extent("opaque_color", geometry.input.extent, opaque.extent())?;
        }

        let (handle, state, decision) = self.select_state(view);
        let previous = state.take_history().filter(|h| h.matches(&geometry));
        let reset = inputs.camera_cut || decision != StateDecision::Continued || previous.is_none();
        let previous = if reset { None } else { previous };
        if reset {
            tracing::debug!(
                view = view.id.0,
                frame = view.frame_index,
                camera_cut = inputs.camera_cut,
                "history reset"
            );
        }

        let plan = StagePlan::from_config(&config, opaque_color.is_some());
        let mut stats = PipelineStats {
            reset,
            decision,
            history_pixels: u32::try_from(geometry.history.pixel_count()).unwrap_or(u32::MAX),
            ..PipelineStats::default()
        };

        let mut converted: Option<ConvertOutput> = None;
        let mut activated: Option<ActivateOutput> = None;
        let mut upscaled: Option<UpscaleOutput> = None;
        let mut sharpened: Option<Texture2D<Vec3>> = None;

        for stage in plan.stages() {
            let extent = match stage {
                Stage::Convert { .. } | Stage::Activate { .. } => geometry.input.extent,
                Stage::Upscale { .. } | Stage::Sharpen { .. } => geometry.history.extent,
            };
            let _span = tracing::debug_span!("stage", stage = stage.name(), width = extent.x, height = extent.y)
                .entered();

            match stage {
                Stage::Convert { .. } => {
                    let uniforms = ConvertUniforms::new(&geometry, &inputs.camera, inputs.pre_exposure, &config);
                    converted = Some(convert::run(
                        &ConvertInputs {
                            color: inputs.scene_color,
                            depth: inputs.scene_depth,
                            motion: inputs.motion,
                            opaque_color,
                        },
                        &uniforms,
                    ));
                }
                Stage::Activate { .. } => {
                    let Some(converted) = converted.as_ref() else { continue };
                    let current_depth;
                    let previous_depth = match &previous {
                        Some(history) => &history.depth,
                        None => {
                            current_depth = converted.dilated_depth();
                            &current_depth
                        }
                    };
                    let uniforms = ActivateUniforms::new(&geometry, &inputs.camera, inputs.jitter, &config);
                    let output = activate::run(
                        &ActivateInputs {
                            motion_depth_luma: &converted.motion_depth_luma,
                            previous_depth,
                        },
                        &uniforms,
                    );
                    stats.lock_seeds = output.lock_seeds;
                    activated = Some(output);
                }
                Stage::Upscale { .. } => {
                    let Some(converted) = converted.as_ref() else { continue };
                    let uniforms = UpscaleUniforms::new(
                        &geometry,
                        inputs.jitter,
                        inputs.pre_exposure,
                        inputs.jitter_sequence_length,
                        reset,
                        &config,
                    );
                    let output = upscale::run(
                        &UpscaleInputs {
                            color: &converted.color,
                            motion_depth_luma: &converted.motion_depth_luma,
                            reactive: activated.as_ref().map(|a| &a.reactive),
                            translucency: converted.translucency.as_ref(),
                            new_locks: activated.as_ref().map(|a| &a.new_locks),
                            previous: previous.as_ref().map(|h| PreviousHistory {
                                color: &h.color,
                                locks: &h.locks,
                            }),
                        },
                        &uniforms,
                    );
                    stats.new_samples = output.new_samples;
                    upscaled = Some(output);
                }
                Stage::Sharpen { .. } => {
                    let Some(upscaled) = upscaled.as_ref() else { continue };
                    let uniforms = SharpenUniforms::new(&geometry, inputs.pre_exposure, &config);
                    sharpened = Some(sharpen::run(&upscaled.history, &uniforms));
                }
            }
            stats.stages_run += 1;
        }

        let (Some(converted), Some(upscaled)) = (converted, upscaled) else {
            return Err(UpscaleError::InvalidConfig(
                "stage plan must contain convert and upscale".into(),
            ));
        };

        let history_color = sharpened.unwrap_or_else(|| upscaled.color());
        let color = if geometry.needs_resolve() {
            let output = geometry.output;
            let _span = tracing::debug_span!("stage", stage = "resolve", width = output.width(), height = output.height())
                .entered();
            stats.stages_run += 1;
            dispatch(output.extent, |px| history_color.sample_bilinear((px.as_vec2() + 0.5) * output.inv_size))
        } else {
            history_color
        };

        state.store_history(HistoryBuffers {
            color: upscaled.history,
            locks: upscaled.locks,
            depth: converted.dilated_depth(),
        });

        Ok(FrameOutputs {
            color,
            color_rect: geometry.output.rect,
            reset,
            state: handle,
            stats,
        })
    }

    /// Attaches a state to `view` for this frame, as `process` would.
    pub fn acquire_state(&self, view: &ViewInfo) -> StateHandle {
        self.select_state(view).0
    }

    /// Detaches `handle` from whichever view holds it and pools it.
    pub fn release_state(&self, handle: StateHandle) {
        self.views.lock().retain(|_, attached| *attached != handle);
        self.pool.release(handle);
    }

    /// Detaches the view's state, if any, and pools it.
    pub fn release_view(&self, id: ViewId) {
        self.opaque.lock().remove(&id);
        if let Some(handle) = self.views.lock().remove(&id) {
            self.pool.release(handle);
        }
    }

    /// Hands over the view's colour before translucency for this frame.
    pub fn capture_opaque_color(&self, id: ViewId, color: Texture2D<Vec3>) {
        self.opaque.lock().insert(id, Arc::new(color));
    }

    /// Drops per-frame references such as opaque captures.
    pub fn end_of_frame(&self) {
        self.opaque.lock().clear();
    }

    /// Releases every view and frees the pool. Returns the states freed.
    pub fn shutdown(&self) -> usize {
        self.end_of_frame();
        let handles: Vec<StateHandle> = self.views.lock().drain().map(|(_, handle)| handle).collect();
        for handle in handles {
            self.pool.release(handle);
        }
        self.pool.drain()
    }

    /// State attached to `id`, if any.
    #[must_use]
    pub fn view_state(&self, id: ViewId) -> Option<Arc<FrameState>> {
        let handle = *self.views.lock().get(&id)?;
        self.pool.get(handle)
    }

    /// Pool counters.
    #[must_use]
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    fn select_state(&self, view: &ViewInfo) -> (StateHandle, Arc<FrameState>, StateDecision) {
        let attached = self.views.lock().get(&view.id).copied();
        let current = attached.and_then(|handle| self.pool.get(handle).map(|state| (handle, state)));

        if let Some((handle, state)) = &current {
            if state.last_used_frame() != view.frame_index {
                state.stamp(view.id.0, view.frame_index);
                tracing::debug!(view = view.id.0, frame = view.frame_index, "continuing view state");
                return (*handle, Arc::clone(state), StateDecision::Continued);
            }
        }

        // Acquire before releasing so a second submission this frame never
        // gets its own just-written state back.
        let (handle, state, reused) = self.pool.acquire(view.id.0, view.frame_index);
        self.views.lock().insert(view.id, handle);
        if let Some((old, _)) = current {
            self.pool.release(old);
        }

        let decision = if reused {
            StateDecision::Reused
        } else {
            StateDecision::Allocated
        };
        (handle, state, decision)
    }
}

impl Default for Upscaler {
    fn default() -> Self {
        Self::new()
    }
}

fn check_extent(buffer: &'static str, expected: UVec2, actual: UVec2) -> UpscaleResult<()> {
    if expected == actual {
        return Ok(());
    }
    tracing::warn!(buffer, ?expected, ?actual, "rejecting frame with mismatched buffer");
    Err(UpscaleError::ExtentMismatch {
        buffer,
        expected: (expected.x, expected.y),
        actual: (actual.x, actual.y),
    })
}
