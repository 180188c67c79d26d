//! Texture slot allocator
//!
//! Fixed-capacity ring mapping texture identities to small hardware binding
//! slots. Reuse policy is FIFO, not LRU: slots are handed out in ring order
//! and only reclaimed wholesale by `clear()`, which the flush engine calls
//! at a draw flush boundary — so a slot is never rebound while an unissued
//! draw still references it.

use crate::material::TextureHandle;

/// Number of hardware texture binding slots the renderer exposes to shaders.
pub const MAX_TEXTURE_SLOTS: usize = 8;

/// Result of a slot query: which slot the texture occupies, and whether it
/// was already bound there (no upload/bind work needed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotAssignment {
    pub slot: u32,
    pub already_bound: bool,
}

/// Ring of `slot -> texture` bindings with `head`/`tail` cursors.
#[derive(Debug)]
pub struct TextureSlotAllocator {
    slots: Box<[TextureHandle]>,
    head: usize,
    tail: usize,
    full: bool,
}

impl TextureSlotAllocator {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "slot ring capacity must be non-zero");
        Self {
            slots: vec![TextureHandle::INVALID; capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
            full: false,
        }
    }

    /// The ring has no free slot left. Callers must flush pending draws and
    /// `clear()` before requesting another slot.
    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Resolve the slot for `texture`, allocating one if it is not bound.
    ///
    /// At most one slot maps to a given texture at a time: the occupied range
    /// is scanned before a new slot is taken.
    ///
    /// # Panics
    ///
    /// Panics if the ring is full. Fullness is a hard flush boundary — the
    /// flush engine checks [`is_full`](Self::is_full) first and flushes, then
    /// clears the ring.
    pub fn get_slot(&mut self, texture: TextureHandle) -> SlotAssignment {
        let capacity = self.slots.len();

        let mut cursor = self.tail;
        for _ in 0..self.occupied() {
            if self.slots[cursor] == texture {
                return SlotAssignment {
                    slot: cursor as u32,
                    already_bound: true,
                };
            }
            cursor = (cursor + 1) % capacity;
        }

        assert!(
            !self.full,
            "texture slot ring is full; flush and clear before binding more textures"
        );

        let slot = self.head;
        self.slots[slot] = texture;
        self.head = (self.head + 1) % capacity;
        if self.head == self.tail {
            self.full = true;
        }

        SlotAssignment {
            slot: slot as u32,
            already_bound: false,
        }
    }

    /// Invalidate every binding and reset the cursors.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.full = false;
        self.slots.fill(TextureHandle::INVALID);
    }

    /// Occupied `(slot, texture)` pairs, in binding order. The GPU layer
    /// materializes these as the per-sub-batch texture bind group.
    pub fn bindings(&self) -> impl Iterator<Item = (u32, TextureHandle)> + '_ {
        let capacity = self.slots.len();
        let tail = self.tail;
        (0..self.occupied()).map(move |i| {
            let slot = (tail + i) % capacity;
            (slot as u32, self.slots[slot])
        })
    }

    fn occupied(&self) -> usize {
        let capacity = self.slots.len();
        if self.full {
            capacity
        } else {
            (self.head + capacity - self.tail) % capacity
        }
    }
}

impl Default for TextureSlotAllocator {
    fn default() -> Self {
        Self::new(MAX_TEXTURE_SLOTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_reuse_reports_already_bound() {
        let mut ring = TextureSlotAllocator::new(4);

        let first = ring.get_slot(TextureHandle(10));
        assert_eq!(first.slot, 0);
        assert!(!first.already_bound);

        let second = ring.get_slot(TextureHandle(10));
        assert_eq!(second.slot, 0);
        assert!(second.already_bound);

        // A different texture takes the next slot.
        let other = ring.get_slot(TextureHandle(11));
        assert_eq!(other.slot, 1);
        assert!(!other.already_bound);
    }

    #[test]
    fn test_full_after_capacity_distinct_textures() {
        let mut ring = TextureSlotAllocator::new(3);
        for id in 1..=3 {
            assert!(!ring.is_full());
            ring.get_slot(TextureHandle(id));
        }
        assert!(ring.is_full());

        // Lookups of already-bound textures still succeed while full.
        let hit = ring.get_slot(TextureHandle(2));
        assert_eq!(hit.slot, 1);
        assert!(hit.already_bound);
    }

    #[test]
    #[should_panic(expected = "texture slot ring is full")]
    fn test_allocation_while_full_panics() {
        let mut ring = TextureSlotAllocator::new(2);
        ring.get_slot(TextureHandle(1));
        ring.get_slot(TextureHandle(2));
        ring.get_slot(TextureHandle(3));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut ring = TextureSlotAllocator::new(2);
        ring.get_slot(TextureHandle(1));
        ring.get_slot(TextureHandle(2));
        assert!(ring.is_full());

        ring.clear();
        assert!(!ring.is_full());
        assert_eq!(ring.bindings().count(), 0);

        // Previously bound textures allocate fresh slots after a clear.
        let again = ring.get_slot(TextureHandle(2));
        assert_eq!(again.slot, 0);
        assert!(!again.already_bound);
    }

    #[test]
    fn test_bindings_reports_occupied_range() {
        let mut ring = TextureSlotAllocator::new(4);
        ring.get_slot(TextureHandle(5));
        ring.get_slot(TextureHandle(6));

        let bound: Vec<_> = ring.bindings().collect();
        assert_eq!(
            bound,
            vec![(0, TextureHandle(5)), (1, TextureHandle(6))]
        );
    }
}
