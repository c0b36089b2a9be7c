// SPDX-License-Identifier: LGPL-3.0-only
//! Chained hash index over an [IndexStableArena].
//!
//! Each bucket stores the index of the first element of its collision chain;
//! chains continue through the arena's per-slot `next` links. The bucket count is
//! picked once from [PRIME_LADDER] and never changes afterwards, only the arena
//! grows. Under heavy key diversity chains get longer instead of the table
//! rehashing.

use crate::arena::{IndexStableArena, SlotIndex};
use crate::error::CoreError;

/// Bucket counts a table may be created with, ascending.
pub const PRIME_LADDER: [usize; 28] = [
    8 + 3,
    16 + 3,
    32 + 5,
    64 + 3,
    128 + 3,
    256 + 27,
    512 + 9,
    1024 + 9,
    2048 + 5,
    4096 + 3,
    8192 + 27,
    16384 + 43,
    32768 + 3,
    65536 + 45,
    131072 + 29,
    262144 + 3,
    524288 + 21,
    1048576 + 7,
    2097152 + 17,
    4194304 + 15,
    8388608 + 9,
    16777216 + 43,
    33554432 + 35,
    67108864 + 15,
    134217728 + 29,
    268435456 + 3,
    536870912 + 11,
    1073741824 + 85,
];

/// Smallest ladder entry that is at least `min_size`, or the largest entry.
pub fn table_size_for(min_size: usize) -> usize {
    PRIME_LADDER
        .iter()
        .copied()
        .find(|&size| size >= min_size)
        .unwrap_or(PRIME_LADDER[PRIME_LADDER.len() - 1])
}

/// Hash a string, continuing from `seed`.
pub fn hash_string(string: &str, seed: u32) -> u32 {
    string.bytes().fold(seed, |hash, byte| {
        u32::from(byte)
            .wrapping_add(hash << 6)
            .wrapping_add(hash << 16)
            .wrapping_sub(hash)
    })
}

/// Elements stored in an [OpenHashIndex] know their own hash.
pub trait HashedElement {
    /// Hash of the key this element is stored under.
    fn hash_value(&self) -> u32;
}

/// Hash index mapping hashes to chains of elements.
#[derive(Debug)]
pub struct OpenHashIndex<T> {
    buckets: Vec<Option<SlotIndex>>,
    arena: IndexStableArena<T>,
}

impl<T: HashedElement> OpenHashIndex<T> {
    /// Create an index with at least `min_size` buckets.
    pub fn new(min_size: usize) -> Result<Self, CoreError> {
        Self::with_chunk(min_size, IndexStableArena::<T>::DEFAULT_CHUNK)
    }

    /// Create an index whose arena grows by `chunk` slots at a time.
    pub fn with_chunk(min_size: usize, chunk: usize) -> Result<Self, CoreError> {
        let capacity = table_size_for(min_size);
        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(capacity)
            .map_err(|_| CoreError::AllocationFailed { requested: capacity })?;
        buckets.resize(capacity, None);

        Ok(Self {
            buckets,
            arena: IndexStableArena::with_capacity(0, chunk)?,
        })
    }

    /// Number of buckets.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    fn bucket(&self, hash: u32) -> usize {
        hash as usize % self.buckets.len()
    }

    /// Head of the chain `hash` falls into.
    pub fn find_first(&self, hash: u32) -> Option<SlotIndex> {
        self.buckets[self.bucket(hash)]
    }

    /// Element following `index` in its chain.
    pub fn next_in_chain(&self, index: SlotIndex) -> Option<SlotIndex> {
        if self.arena.contains(index) {
            self.arena.next(index)
        } else {
            None
        }
    }

    /// Iterate over the chain `hash` falls into.
    ///
    /// The chain holds every element whose hash shares the bucket, so callers
    /// still compare keys.
    pub fn chain(&self, hash: u32) -> Chain<'_, T> {
        Chain {
            index: self,
            cursor: self.find_first(hash),
        }
    }

    /// First element in the chain of `hash` accepted by `matches`.
    pub fn find(&self, hash: u32, matches: impl Fn(&T) -> bool) -> Option<SlotIndex> {
        self.chain(hash)
            .find(|(_, element)| matches(element))
            .map(|(index, _)| index)
    }

    /// Store `element` as the new head of the chain for `hash`.
    ///
    /// `hash` must be the hash of the key `element` is stored under. Adding may
    /// grow the arena, which invalidates outstanding borrows but not indices.
    pub fn add(&mut self, hash: u32, element: T) -> Result<SlotIndex, CoreError> {
        let index = self.arena.add(element)?;
        let bucket = self.bucket(hash);
        self.arena.set_next(index, self.buckets[bucket]);
        self.buckets[bucket] = Some(index);
        Ok(index)
    }

    /// Store a default-constructed element under `hash`.
    pub fn add_default(&mut self, hash: u32) -> Result<SlotIndex, CoreError>
    where
        T: Default,
    {
        self.add(hash, T::default())
    }

    /// Unlink the element at `index` from its chain and free its slot.
    pub fn remove(&mut self, index: SlotIndex) -> Result<T, CoreError> {
        let hash = self
            .arena
            .at(index)
            .ok_or(CoreError::InvalidIndex(index))?
            .hash_value();
        let bucket = self.bucket(hash);

        let mut previous: Option<SlotIndex> = None;
        let mut cursor = self.buckets[bucket];
        while let Some(current) = cursor {
            let next = self.arena.next(current);
            if current == index {
                match previous {
                    Some(previous) => self.arena.set_next(previous, next),
                    None => self.buckets[bucket] = next,
                }
                return self.arena.remove(index);
            }
            previous = Some(current);
            cursor = next;
        }

        Err(CoreError::NotFound(index))
    }

    /// Remove every live element accepted by `matches`, sweeping all slots.
    ///
    /// Nothing is removed if any accepted element is missing from its chain.
    pub fn remove_where(&mut self, matches: impl Fn(&T) -> bool) -> Result<Vec<T>, CoreError> {
        let doomed: Vec<SlotIndex> = self
            .iter()
            .filter(|&(_, element)| matches(element))
            .map(|(index, _)| index)
            .collect();
        if let Some(&stray) = doomed.iter().find(|&&index| !self.is_linked(index)) {
            return Err(CoreError::NotFound(stray));
        }
        doomed.into_iter().map(|index| self.remove(index)).collect()
    }

    /// Whether `index` is live and linked into the chain for its hash.
    pub fn is_linked(&self, index: SlotIndex) -> bool {
        self.arena.at(index).is_some_and(|element| {
            self.chain(element.hash_value())
                .any(|(linked, _)| linked == index)
        })
    }

    /// Handle of a borrowed element.
    pub fn element_index(&self, element: &T) -> Option<SlotIndex> {
        self.arena.index_of(element)
    }

    /// Borrow the element at `index`.
    pub fn element_at(&self, index: SlotIndex) -> Option<&T> {
        self.arena.at(index)
    }

    /// Mutably borrow the element at `index`.
    pub fn element_at_mut(&mut self, index: SlotIndex) -> Option<&mut T> {
        self.arena.at_mut(index)
    }

    /// Slot capacity of the underlying arena.
    pub fn vector_size(&self) -> usize {
        self.arena.size()
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Whether the index holds no element.
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Iterate over all live elements in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotIndex, &T)> {
        self.arena.iter()
    }
}

/// Iterator over one collision chain.
pub struct Chain<'a, T> {
    index: &'a OpenHashIndex<T>,
    cursor: Option<SlotIndex>,
}

impl<'a, T: HashedElement> Iterator for Chain<'a, T> {
    type Item = (SlotIndex, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.cursor?;
        let element = self.index.arena.at(current)?;
        self.cursor = self.index.arena.next(current);
        Some((current, element))
    }
}
