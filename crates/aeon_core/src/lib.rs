//! # AEON Core
//!
//! Engine-agnostic memory primitives used by the temporal upscaler:
//! - Lock-free free lists that never block a caller on another caller
//! - Generational handle arenas for records that outlive a single frame
//!
//! ## Architecture Rules
//!
//! 1. **No GPU types here** - records are generic over their payload
//! 2. **Handles, not pointers** - stale handles resolve to `None`, never to
//!    another record
//! 3. **Push/pop are lock-free** - contention never parks a render path
//!
//! ## Example
//!
//! ```rust
//! use aeon_core::{FreeList, HandleArena};
//!
//! let mut arena: HandleArena<&str> = HandleArena::new();
//! let handle = arena.insert("history");
//!
//! let pool = FreeList::new();
//! pool.push(handle);
//! assert_eq!(pool.pop(), Some(handle));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod memory;

pub use memory::{ArenaHandle, FreeList, HandleArena};
