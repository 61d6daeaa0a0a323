//! # Per-View Frame State
//!
//! Everything that must survive from one frame to the next for a view:
//! history colour, lock lifetimes and last frame's dilated depth.
//!
//! ```text
//!   view A ──owns──► FrameState ──released──► StatePool ──acquired──► view B
//!                    (stamped with view + frame)
//! ```
//!
//! The stamp is what lets the pool keep split-screen views apart: a state
//! touched by another view in the current frame is never handed out again
//! until the next frame.

mod pool;

pub use pool::{PoolStats, StatePool};

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use aeon_core::ArenaHandle;
use glam::{UVec2, Vec4};
use parking_lot::Mutex;

use crate::geometry::ViewportGeometry;
use crate::texture::Texture2D;

/// Stable handle to a pooled [`FrameState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateHandle(pub(crate) ArenaHandle);

impl StateHandle {
    /// Slot index, for logging.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0.index()
    }
}

/// Buffers promoted from one frame into the next.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryBuffers {
    /// Scene RGB + signed temporal reactive factor, history resolution.
    pub color: Texture2D<Vec4>,
    /// Lock lifetimes, history resolution.
    pub locks: Texture2D<f32>,
    /// Dilated device depth, input resolution.
    pub depth: Texture2D<f32>,
}

impl HistoryBuffers {
    /// Returns true if the buffers fit this frame's geometry.
    #[must_use]
    pub fn matches(&self, geometry: &ViewportGeometry) -> bool {
        self.color.extent() == geometry.history.extent
            && self.locks.extent() == geometry.history.extent
            && self.depth.extent() == geometry.depth.extent
    }

    /// History extent.
    #[must_use]
    pub fn extent(&self) -> UVec2 {
        self.color.extent()
    }
}

/// Sentinel for "no view has used this state yet".
const NO_VIEW: u64 = u64::MAX;

/// Persistent per-view record.
///
/// Stamps are atomics so the pool can inspect them without taking the
/// history lock. History itself is only touched by the view that currently
/// owns the state.
#[derive(Debug)]
pub struct FrameState {
    last_used_frame: AtomicU64,
    owning_view: AtomicU64,
    pool_refs: AtomicU32,
    history: Mutex<Option<HistoryBuffers>>,
}

impl FrameState {
    /// Creates a state with no history and no owner.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_used_frame: AtomicU64::new(u64::MAX),
            owning_view: AtomicU64::new(NO_VIEW),
            pool_refs: AtomicU32::new(0),
            history: Mutex::new(None),
        }
    }

    /// Frame index of the last use; `u64::MAX` if never used.
    #[must_use]
    pub fn last_used_frame(&self) -> u64 {
        self.last_used_frame.load(Ordering::Acquire)
    }

    /// Id of the view that last used this state.
    #[must_use]
    pub fn owning_view(&self) -> u64 {
        self.owning_view.load(Ordering::Acquire)
    }

    /// Number of times this state is currently held by the pool.
    #[must_use]
    pub fn pool_refs(&self) -> u32 {
        self.pool_refs.load(Ordering::Acquire)
    }

    /// Marks the state as used by `view` in `frame`.
    pub fn stamp(&self, view: u64, frame: u64) {
        self.owning_view.store(view, Ordering::Release);
        self.last_used_frame.store(frame, Ordering::Release);
    }

    /// True if `view` may take this state in `frame`.
    #[must_use]
    pub fn is_available_to(&self, view: u64, frame: u64) -> bool {
        self.last_used_frame() != frame || self.owning_view() == view
    }

    pub(crate) fn add_pool_ref(&self) {
        self.pool_refs.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn remove_pool_ref(&self) {
        let _ = self
            .pool_refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |refs| refs.checked_sub(1));
    }

    /// Moves the stored history out, leaving none.
    pub fn take_history(&self) -> Option<HistoryBuffers> {
        self.history.lock().take()
    }

    /// Stores history for the next frame.
    pub fn store_history(&self, history: HistoryBuffers) {
        *self.history.lock() = Some(history);
    }
}

impl Default for FrameState {
    fn default() -> Self {
        Self::new()
    }
}
