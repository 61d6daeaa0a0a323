//! # Lock-Free Free List
//!
//! FIFO list of recyclable entries shared by several producers and consumers.
//!
//! ```text
//!   view A ──push──┐                 ┌──pop── view B
//!                  ▼                 │
//!            [ h3 | h1 | h7 | ... ] ─┘
//!
//! push/pop are lock-free: a caller is never parked behind another caller.
//! ```

use crossbeam_channel::{Receiver, Sender, TryRecvError};

/// A lock-free FIFO free list.
///
/// Entries are handed out in the order they were returned. Both ends can be
/// used concurrently from any number of threads; an entry popped by one
/// caller is never observed by another caller until it is pushed again.
///
/// The list owns its entries: whatever is still queued when the list is
/// dropped is dropped with it.
pub struct FreeList<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
}

impl<T> FreeList<T> {
    /// Creates an empty, unbounded free list.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    /// Returns an entry to the list.
    pub fn push(&self, entry: T) {
        let sent = self.sender.send(entry);
        debug_assert!(sent.is_ok(), "free list receiver dropped while its sender is alive");
    }

    /// Takes the oldest entry, or `None` if the list is empty.
    #[must_use]
    pub fn pop(&self) -> Option<T> {
        match self.receiver.try_recv() {
            Ok(entry) => Some(entry),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Returns the number of queued entries.
    ///
    /// Only a snapshot: concurrent pushes and pops may change it immediately.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Returns true if no entries are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Pops every queued entry.
    ///
    /// Entries pushed while draining may or may not be included.
    pub fn drain(&self) -> impl Iterator<Item = T> + '_ {
        self.receiver.try_iter()
    }
}

impl<T> Default for FreeList<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_free_list_fifo_order() {
        let list = FreeList::new();
        list.push(1);
        list.push(2);
        list.push(3);

        assert_eq!(list.len(), 3);
        assert_eq!(list.pop(), Some(1));
        assert_eq!(list.pop(), Some(2));
        assert_eq!(list.pop(), Some(3));
        assert_eq!(list.pop(), None);
        assert!(list.is_empty());
    }

    #[test]
    fn test_free_list_drain() {
        let list = FreeList::new();
        for i in 0..10 {
            list.push(i);
        }

        let drained: Vec<_> = list.drain().collect();
        assert_eq!(drained, (0..10).collect::<Vec<_>>());
        assert!(list.is_empty());
    }

    #[test]
    fn test_free_list_concurrent_pop_is_exclusive() {
        let list = Arc::new(FreeList::new());
        for i in 0..1000u32 {
            list.push(i);
        }

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let list = Arc::clone(&list);
                std::thread::spawn(move || {
                    let mut taken = Vec::new();
                    while let Some(entry) = list.pop() {
                        taken.push(entry);
                    }
                    taken
                })
            })
            .collect();

        let mut all: Vec<u32> = workers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .collect();
        all.sort_unstable();

        // Every entry popped exactly once
        assert_eq!(all, (0..1000).collect::<Vec<_>>());
    }
}
