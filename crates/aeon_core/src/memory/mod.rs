//! # Memory Management
//!
//! Record storage that survives across frames.
//!
//! ## Design Philosophy
//!
//! Long-lived records (per-view history, pooled GPU-side state) are kept in
//! an arena and referred to by handle. Recycling goes through a lock-free
//! free list so several views can return and reclaim records in the same
//! frame without serializing on a mutex.

mod arena;
mod free_list;

pub use arena::{ArenaHandle, HandleArena};
pub use free_list::FreeList;
