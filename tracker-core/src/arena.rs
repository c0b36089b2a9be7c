// SPDX-License-Identifier: LGPL-3.0-only
//! Growable slot storage with stable indices.
//!
//! All slots live in one contiguous buffer. Growing the buffer moves every
//! element, so a borrow handed out by [IndexStableArena::at] is only good until
//! the next [IndexStableArena::add]. A [SlotIndex] on the other hand keeps
//! naming the same element until that element is removed.
//!
//! Every slot carries a `next` link. While the slot is occupied the link belongs
//! to whoever chains elements together (the hash index uses it for collision
//! chains); once the slot is vacated the arena reuses it for the free list.

use std::fmt;
use std::mem;

use crate::error::CoreError;

/// Stable handle to an element of an [IndexStableArena].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(u32);

impl SlotIndex {
    /// Create a handle from a raw slot number.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the slot number as a `usize`.
    pub const fn get(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
enum SlotState<T> {
    Vacant,
    Occupied(T),
}

#[derive(Debug)]
struct Slot<T> {
    next: Option<SlotIndex>,
    state: SlotState<T>,
}

/// Pool of slots handing out [SlotIndex] handles.
///
/// Vacated slots are threaded onto a free list and handed out again before the
/// buffer grows. Growth adds a fixed chunk of slots at a time.
#[derive(Debug)]
pub struct IndexStableArena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<SlotIndex>,
    chunk: usize,
    live: usize,
}

impl<T> IndexStableArena<T> {
    /// Number of slots added per growth step when none is given.
    pub const DEFAULT_CHUNK: usize = 32;

    /// Create an empty arena. Nothing is allocated until the first `add`.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            chunk: Self::DEFAULT_CHUNK,
            live: 0,
        }
    }

    /// Create an arena with `initial` slots preallocated that grows by `chunk`.
    pub fn with_capacity(initial: usize, chunk: usize) -> Result<Self, CoreError> {
        let mut arena = Self {
            slots: Vec::new(),
            free_head: None,
            chunk: chunk.max(1),
            live: 0,
        };
        if initial > 0 {
            arena.grow_by(initial)?;
        }
        Ok(arena)
    }

    /// Move `element` into a free slot and return its handle.
    ///
    /// May reallocate the backing buffer.
    pub fn add(&mut self, element: T) -> Result<SlotIndex, CoreError> {
        if self.free_head.is_none() {
            self.grow_by(self.chunk)?;
        }
        let index = self
            .free_head
            .ok_or(CoreError::AllocationFailed { requested: self.slots.len() })?;

        let slot = &mut self.slots[index.get()];
        self.free_head = slot.next.take();
        slot.state = SlotState::Occupied(element);
        self.live += 1;
        Ok(index)
    }

    /// Add a default-constructed element.
    pub fn add_default(&mut self) -> Result<SlotIndex, CoreError>
    where
        T: Default,
    {
        self.add(T::default())
    }

    /// Take the element out of its slot and put the slot on the free list.
    pub fn remove(&mut self, index: SlotIndex) -> Result<T, CoreError> {
        let slot = self
            .slots
            .get_mut(index.get())
            .ok_or(CoreError::InvalidIndex(index))?;

        match mem::replace(&mut slot.state, SlotState::Vacant) {
            SlotState::Occupied(element) => {
                slot.next = self.free_head;
                self.free_head = Some(index);
                self.live -= 1;
                Ok(element)
            },
            SlotState::Vacant => Err(CoreError::InvalidIndex(index)),
        }
    }

    /// Borrow the element at `index`.
    pub fn at(&self, index: SlotIndex) -> Option<&T> {
        match &self.slots.get(index.get())?.state {
            SlotState::Occupied(element) => Some(element),
            SlotState::Vacant => None,
        }
    }

    /// Mutably borrow the element at `index`.
    pub fn at_mut(&mut self, index: SlotIndex) -> Option<&mut T> {
        match &mut self.slots.get_mut(index.get())?.state {
            SlotState::Occupied(element) => Some(element),
            SlotState::Vacant => None,
        }
    }

    /// Whether `index` currently names a live element.
    pub fn contains(&self, index: SlotIndex) -> bool {
        self.at(index).is_some()
    }

    /// Recover the handle of a borrowed element from its address.
    ///
    /// Only meaningful for a borrow obtained from this arena's current buffer;
    /// anything else yields `None`.
    pub fn index_of(&self, element: &T) -> Option<SlotIndex> {
        let base = self.slots.as_ptr() as usize;
        let address = element as *const T as usize;
        let stride = mem::size_of::<Slot<T>>();
        if address < base {
            return None;
        }

        let position = (address - base) / stride;
        match &self.slots.get(position)?.state {
            SlotState::Occupied(candidate) if std::ptr::eq(candidate, element) => {
                Some(SlotIndex(position as u32))
            },
            _ => None,
        }
    }

    /// Slot capacity of the backing buffer (live and vacant slots).
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether the arena holds no live element.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterate over live elements with their handles, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotIndex, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(position, slot)| match &slot.state {
                SlotState::Occupied(element) => Some((SlotIndex(position as u32), element)),
                SlotState::Vacant => None,
            })
    }

    /// Link stored in a live slot.
    pub(crate) fn next(&self, index: SlotIndex) -> Option<SlotIndex> {
        self.slots.get(index.get()).and_then(|slot| slot.next)
    }

    pub(crate) fn set_next(&mut self, index: SlotIndex, next: Option<SlotIndex>) {
        if let Some(slot) = self.slots.get_mut(index.get()) {
            debug_assert!(matches!(slot.state, SlotState::Occupied(_)));
            slot.next = next;
        }
    }

    fn grow_by(&mut self, count: usize) -> Result<(), CoreError> {
        let old_len = self.slots.len();
        let new_len = old_len.saturating_add(count);
        if new_len > u32::MAX as usize {
            return Err(CoreError::AllocationFailed { requested: new_len });
        }
        self.slots
            .try_reserve_exact(count)
            .map_err(|_| CoreError::AllocationFailed { requested: new_len })?;

        // New slots are handed out in ascending order, ahead of older free ones.
        for position in old_len..new_len {
            let next = if position + 1 < new_len {
                Some(SlotIndex(position as u32 + 1))
            } else {
                self.free_head
            };
            self.slots.push(Slot { next, state: SlotState::Vacant });
        }
        if new_len > old_len {
            self.free_head = Some(SlotIndex(old_len as u32));
        }
        Ok(())
    }

    /// Walk the free list and check it against the slot states.
    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        let mut vacant = 0;
        let mut cursor = self.free_head;
        while let Some(index) = cursor {
            let slot = &self.slots[index.get()];
            assert!(matches!(slot.state, SlotState::Vacant), "occupied slot {} on free list", index);
            vacant += 1;
            assert!(vacant <= self.slots.len(), "free list cycles");
            cursor = slot.next;
        }
        assert_eq!(vacant + self.live, self.slots.len());
    }
}

impl<T> Default for IndexStableArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_survive_growth() {
        let mut arena = IndexStableArena::with_capacity(2, 2).unwrap();
        let first = arena.add(String::from("first")).unwrap();
        let second = arena.add(String::from("second")).unwrap();
        assert_eq!(arena.size(), 2);

        let mut later = Vec::new();
        for n in 0..50 {
            later.push((arena.add(format!("item {n}")).unwrap(), n));
        }
        assert!(arena.size() >= 52);

        assert_eq!(arena.at(first).map(String::as_str), Some("first"));
        assert_eq!(arena.at(second).map(String::as_str), Some("second"));
        for (index, n) in later {
            assert_eq!(arena.at(index), Some(&format!("item {n}")));
        }
        arena.debug_validate_invariants();
    }

    #[test]
    fn removed_slots_are_reused_before_growing() {
        let mut arena = IndexStableArena::with_capacity(4, 4).unwrap();
        let ids: Vec<_> = (0..4).map(|n| arena.add(n).unwrap()).collect();
        assert_eq!(arena.remove(ids[1]), Ok(1));
        assert_eq!(arena.remove(ids[3]), Ok(3));

        let reused = arena.add(10).unwrap();
        assert_eq!(reused, ids[3]);
        let reused = arena.add(11).unwrap();
        assert_eq!(reused, ids[1]);
        assert_eq!(arena.size(), 4);
        assert_eq!(arena.len(), 4);
        arena.debug_validate_invariants();
    }

    #[test]
    fn removing_twice_is_reported() {
        let mut arena = IndexStableArena::new();
        let id = arena.add(7u8).unwrap();
        assert_eq!(arena.remove(id), Ok(7));
        assert_eq!(arena.remove(id), Err(CoreError::InvalidIndex(id)));
        assert_eq!(arena.remove(SlotIndex::new(999)), Err(CoreError::InvalidIndex(SlotIndex::new(999))));
        assert!(arena.at(id).is_none());
    }

    #[test]
    fn index_of_matches_only_own_elements() {
        let mut arena = IndexStableArena::new();
        let a = arena.add(1u64).unwrap();
        let b = arena.add(2u64).unwrap();

        let borrowed = arena.at(b).unwrap();
        assert_eq!(arena.index_of(borrowed), Some(b));
        assert_eq!(arena.index_of(arena.at(a).unwrap()), Some(a));

        let outside = 2u64;
        assert_eq!(arena.index_of(&outside), None);
    }

    #[test]
    fn default_elements_are_constructed() {
        let mut arena: IndexStableArena<Vec<u8>> = IndexStableArena::new();
        let id = arena.add_default().unwrap();
        assert_eq!(arena.at(id), Some(&Vec::new()));
        arena.at_mut(id).unwrap().push(3);
        assert_eq!(arena.at(id), Some(&vec![3]));
    }

    #[test]
    fn iter_skips_vacant_slots() {
        let mut arena = IndexStableArena::new();
        let ids: Vec<_> = (0..5).map(|n| arena.add(n).unwrap()).collect();
        arena.remove(ids[0]).unwrap();
        arena.remove(ids[2]).unwrap();
        let live: Vec<_> = arena.iter().map(|(_, value)| *value).collect();
        assert_eq!(live, vec![1, 3, 4]);
    }
}
