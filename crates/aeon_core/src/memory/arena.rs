//! # Handle Arena
//!
//! Slot storage for records that are created rarely and looked up every frame.

/// Handle to a record stored in a [`HandleArena`].
///
/// The generation is bumped every time a slot is reused, so a handle that
/// outlived its record never aliases the record that replaced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArenaHandle {
    /// Index into the slot array.
    index: u32,
    /// Generation of the slot when the handle was issued.
    generation: u32,
}

impl ArenaHandle {
    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the slot generation.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// A growable arena of records addressed by generational handles.
///
/// Insertion reuses vacated slots before growing. Removal is O(1) and
/// invalidates every outstanding handle to that slot.
///
/// # Thread Safety
///
/// This arena is NOT thread-safe. Wrap it in a lock when it is shared.
///
/// # Example
///
/// ```rust
/// use aeon_core::HandleArena;
///
/// let mut arena = HandleArena::new();
/// let a = arena.insert(1u32);
/// assert_eq!(arena.remove(a), Some(1));
/// assert!(arena.get(a).is_none());
/// ```
pub struct HandleArena<T> {
    /// Slot storage.
    slots: Vec<Slot<T>>,
    /// Indices of vacated slots.
    vacant: Vec<u32>,
    /// Number of occupied slots.
    len: usize,
}

impl<T> HandleArena<T> {
    /// Creates an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            vacant: Vec::new(),
            len: 0,
        }
    }

    /// Creates an empty arena with room for `capacity` records.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            vacant: Vec::new(),
            len: 0,
        }
    }

    /// Returns the number of live records.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no records are live.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores a record and returns its handle.
    pub fn insert(&mut self, value: T) -> ArenaHandle {
        self.len += 1;

        if let Some(index) = self.vacant.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.value = Some(value);
            return ArenaHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        ArenaHandle {
            index,
            generation: 0,
        }
    }

    /// Removes a record, returning it if the handle was still valid.
    pub fn remove(&mut self, handle: ArenaHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }

        let value = slot.value.take()?;
        self.vacant.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    /// Gets a reference to a live record.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: ArenaHandle) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }
}

impl<T> Default for HandleArena<T> {
    fn default() -> Self {
        Self::new()
    }
}
