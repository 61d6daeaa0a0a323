//! # State Pool
//!
//! Recycles [`FrameState`] records across camera cuts and split-screen views.
//!
//! `acquire` and `release` never block on each other: the free list is
//! lock-free, and the record arena is only write-locked when a brand new
//! state is allocated or the pool is drained.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use aeon_core::{FreeList, HandleArena};
use parking_lot::RwLock;

use super::{FrameState, StateHandle};

/// Record slots reserved up front: one per split-screen quadrant.
const INITIAL_STATES: usize = 4;

/// Pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// States alive (pooled or in use).
    pub live: usize,
    /// States currently waiting in the free list.
    pub pooled: usize,
    /// States ever allocated.
    pub allocated: u64,
    /// Acquisitions served from the free list.
    pub reused: u64,
    /// Entries skipped because another view used them this frame.
    pub deferred: u64,
}

/// Concurrent pool of frame states.
pub struct StatePool {
    available: FreeList<StateHandle>,
    records: RwLock<HandleArena<Arc<FrameState>>>,
    allocated: AtomicU64,
    reused: AtomicU64,
    deferred: AtomicU64,
}

impl StatePool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            available: FreeList::new(),
            records: RwLock::new(HandleArena::with_capacity(INITIAL_STATES)),
            allocated: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            deferred: AtomicU64::new(0),
        }
    }

    /// Looks up a state.
    #[must_use]
    pub fn get(&self, handle: StateHandle) -> Option<Arc<FrameState>> {
        self.records.read().get(handle.0).cloned()
    }

    /// Takes a state for `view` in `frame`.
    ///
    /// Pooled states stamped with `frame` by a different view are skipped
    /// and returned to the pool afterwards. The first eligible state is
    /// reused; if there is none a new one is allocated. The returned flag is
    /// true when the state came from the pool.
    pub fn acquire(&self, view: u64, frame: u64) -> (StateHandle, Arc<FrameState>, bool) {
        let mut skipped = Vec::new();
        let mut found = None;

        while let Some(handle) = self.available.pop() {
            let Some(state) = self.get(handle) else {
                // Drained while queued
                continue;
            };
            if state.is_available_to(view, frame) {
                found = Some((handle, state));
                break;
            }
            skipped.push(handle);
        }

        if !skipped.is_empty() {
            tracing::debug!(
                view,
                frame,
                count = skipped.len(),
                "deferring states used by another view this frame"
            );
            self.deferred.fetch_add(skipped.len() as u64, Ordering::Relaxed);
            for handle in skipped {
                self.available.push(handle);
            }
        }

        if let Some((handle, state)) = found {
            state.remove_pool_ref();
            state.stamp(view, frame);
            self.reused.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(view, frame, state = handle.index(), "reused pooled state");
            return (handle, state, true);
        }

        let state = Arc::new(FrameState::new());
        state.stamp(view, frame);
        let handle = StateHandle(self.records.write().insert(Arc::clone(&state)));
        self.allocated.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(view, frame, state = handle.index(), "allocated new state");
        (handle, state, false)
    }

    /// Returns a state to the pool. Its buffers are kept for reuse.
    ///
    /// Stale handles are ignored.
    pub fn release(&self, handle: StateHandle) {
        let Some(state) = self.get(handle) else {
            tracing::warn!(state = handle.index(), "release of unknown state ignored");
            return;
        };
        state.add_pool_ref();
        self.available.push(handle);
    }

    /// Frees every pooled state. States still held by views stay alive.
    ///
    /// Returns the number of states freed.
    pub fn drain(&self) -> usize {
        let mut records = self.records.write();
        let mut freed = 0;
        for handle in self.available.drain() {
            if records.remove(handle.0).is_some() {
                freed += 1;
            }
        }
        tracing::info!(freed, remaining = records.len(), "state pool drained");
        freed
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            live: self.records.read().len(),
            pooled: self.available.len(),
            allocated: self.allocated.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
        }
    }
}

impl Default for StatePool {
    fn default() -> Self {
        Self::new()
    }
}
