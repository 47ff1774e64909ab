//! Core fixed-capacity FIFO ring data structure.
//!
//! This module provides the plain bounded buffer underneath the blocking
//! MPMC channel in [`crate::sync::mpmc`]. The ring has no concurrency
//! awareness of its own: the channel serializes every access under a single
//! mutex, so slots are ordinary `Option<T>` cells and the cursors are plain
//! integers.

/// Fixed-capacity FIFO ring.
///
/// Items are appended at the tail and removed from the head; the head cursor
/// wraps around the slot slab. A slot is `Some` exactly when it holds a live
/// item, so `head..head + len` (wrapped) is always the live region.
pub struct Ring<T> {
    /// Slot slab; length equals the ring capacity.
    slots: Box<[Option<T>]>,
    /// Index of the oldest live item.
    head: usize,
    /// Number of live items, always in `0..=capacity`.
    len: usize,
}

impl<T> Ring<T> {
    /// Creates an empty ring with the given number of slots.
    ///
    /// Callers validate `capacity >= 1`; the channel constructor rejects a
    /// zero capacity before a ring is ever built.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "ring capacity must be at least 1");
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots: slots.into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    /// Advances a cursor to the next slot index, wrapping to 0 at capacity.
    ///
    /// Equivalent to `(cursor + 1) % capacity` without the division.
    #[inline]
    fn bump_cursor(&self, cursor: usize) -> usize {
        let next = cursor + 1;
        if next == self.slots.len() { 0 } else { next }
    }

    /// Index of the next free slot. Only meaningful while `!self.is_full()`.
    #[inline]
    fn tail(&self) -> usize {
        let tail = self.head + self.len;
        if tail >= self.slots.len() {
            tail - self.slots.len()
        } else {
            tail
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the ring holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether every slot holds a live item.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Appends an item at the tail.
    ///
    /// # Errors
    ///
    /// Returns `Err(item)` if the ring is full, handing the item back.
    pub fn try_put(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }
        let tail = self.tail();
        debug_assert!(self.slots[tail].is_none());
        self.slots[tail] = Some(item);
        self.len += 1;
        Ok(())
    }

    /// Removes and returns the oldest item.
    ///
    /// Returns `None` if the ring is empty.
    pub fn try_take(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let item = self.slots[self.head].take();
        debug_assert!(item.is_some());
        self.head = self.bump_cursor(self.head);
        self.len -= 1;
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_put_take() {
        let mut ring = Ring::with_capacity(8);

        assert!(ring.try_put(42u64).is_ok());
        assert_eq!(ring.try_take(), Some(42));
        assert_eq!(ring.try_take(), None);
    }

    #[test]
    fn test_fifo_order() {
        let mut ring = Ring::with_capacity(16);

        for i in 0..10u64 {
            assert!(ring.try_put(i).is_ok());
        }
        for i in 0..10u64 {
            assert_eq!(ring.try_take(), Some(i));
        }
        assert_eq!(ring.try_take(), None);
    }

    #[test]
    fn test_full_hands_item_back() {
        let mut ring = Ring::with_capacity(4);

        for i in 0..4u64 {
            assert!(ring.try_put(i).is_ok(), "failed to put item {i}");
        }
        assert!(ring.is_full());
        assert_eq!(ring.try_put(999), Err(999));

        assert_eq!(ring.try_take(), Some(0));
        assert!(ring.try_put(4).is_ok());
        assert_eq!(ring.try_put(1000), Err(1000));
    }

    #[test]
    fn test_wrapping_behavior() {
        let mut ring = Ring::with_capacity(4);

        for round in 0..5u64 {
            for i in 0..4 {
                assert!(ring.try_put(round * 10 + i).is_ok());
            }
            for i in 0..4 {
                assert_eq!(ring.try_take(), Some(round * 10 + i));
            }
            assert_eq!(ring.try_take(), None);
        }
    }

    #[test]
    fn test_len_tracks_mixed_operations() {
        let mut ring = Ring::with_capacity(3);

        assert_eq!(ring.len(), 0);
        assert!(ring.is_empty());

        ring.try_put(1u32).unwrap();
        ring.try_put(2).unwrap();
        assert_eq!(ring.len(), 2);

        assert_eq!(ring.try_take(), Some(1));
        assert_eq!(ring.len(), 1);

        ring.try_put(3).unwrap();
        ring.try_put(4).unwrap();
        assert!(ring.is_full());
        assert_eq!(ring.len(), ring.capacity());

        assert_eq!(ring.try_take(), Some(2));
        assert_eq!(ring.try_take(), Some(3));
        assert_eq!(ring.try_take(), Some(4));
        assert!(ring.is_empty());
    }

    #[test]
    fn test_non_copy_type() {
        let mut ring = Ring::with_capacity(2);

        ring.try_put("hello".to_string()).unwrap();
        ring.try_put("world".to_string()).unwrap();

        assert_eq!(ring.try_take(), Some("hello".to_string()));
        assert_eq!(ring.try_take(), Some("world".to_string()));
        assert_eq!(ring.try_take(), None);
    }
}
