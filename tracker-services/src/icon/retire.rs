// SPDX-License-Identifier: LGPL-3.0-only
//! Deferred release of bitmaps that asynchronous draws may still read.

use std::collections::VecDeque;

use crate::icon::bitmap::Bitmap;

/// Length above which the oldest batch is released.
pub const DEFAULT_RETIRE_THRESHOLD: usize = 10 * 1024;

/// Number of bitmaps released at once.
pub const DEFAULT_RETIRE_BATCH: usize = 512;

/// FIFO of bitmaps taken out of the shared cache.
///
/// An asynchronous draw may still be reading a bitmap after its entry is
/// dropped, so the bitmap is kept here for a while. Once the list grows past the
/// threshold, the oldest batch is released in one go.
#[derive(Debug)]
pub struct RetiredBitmaps<B = Bitmap> {
    list: VecDeque<B>,
    threshold: usize,
    batch: usize,
}

impl<B> RetiredBitmaps<B> {
    /// Create an empty list.
    pub fn new(threshold: usize, batch: usize) -> Self {
        Self {
            list: VecDeque::new(),
            threshold,
            batch: batch.max(1),
        }
    }

    /// Keep `bitmap` alive until it ages out.
    pub fn retire(&mut self, bitmap: B) {
        self.list.push_back(bitmap);
        self.prune();
    }

    /// Release the oldest batch if the list is over the threshold.
    ///
    /// Returns the number of bitmaps released.
    pub fn prune(&mut self) -> usize {
        if self.list.len() <= self.threshold {
            return 0;
        }
        let count = self.batch.min(self.list.len());
        self.list.drain(..count);
        log::info!("Released {} retired icon bitmaps", count);
        count
    }

    /// Number of bitmaps held.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Held bitmaps, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &B> {
        self.list.iter()
    }
}

impl<B> Default for RetiredBitmaps<B> {
    fn default() -> Self {
        Self::new(DEFAULT_RETIRE_THRESHOLD, DEFAULT_RETIRE_BATCH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Stand-in bitmap that records when it is dropped.
    struct Tracked {
        id: u32,
        dropped: Rc<RefCell<Vec<u32>>>,
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.dropped.borrow_mut().push(self.id);
        }
    }

    #[test]
    fn nothing_released_up_to_threshold() {
        let mut retired = RetiredBitmaps::new(10, 4);
        for value in 0..10u32 {
            retired.retire(value);
        }
        assert_eq!(retired.len(), 10);
    }

    #[test]
    fn crossing_threshold_releases_oldest_batch() {
        let mut retired = RetiredBitmaps::new(10, 4);
        for value in 0..11u32 {
            retired.retire(value);
        }
        assert_eq!(retired.len(), 7);
        assert_eq!(retired.iter().copied().collect::<Vec<_>>(), (4..11).collect::<Vec<_>>());
    }

    #[test]
    fn bitmaps_are_dropped_oldest_first() {
        let dropped = Rc::new(RefCell::new(Vec::new()));
        let mut retired = RetiredBitmaps::new(3, 2);
        for id in 0..4 {
            retired.retire(Tracked {
                id,
                dropped: dropped.clone(),
            });
        }
        assert_eq!(*dropped.borrow(), vec![0, 1]);

        retired.retire(Tracked {
            id: 4,
            dropped: dropped.clone(),
        });
        assert_eq!(*dropped.borrow(), vec![0, 1]);

        retired.retire(Tracked {
            id: 5,
            dropped: dropped.clone(),
        });
        assert_eq!(*dropped.borrow(), vec![0, 1, 2, 3]);
        assert_eq!(retired.iter().map(|bitmap| bitmap.id).collect::<Vec<_>>(), vec![4, 5]);
    }

    #[test]
    fn default_limits() {
        let mut retired: RetiredBitmaps<u16> = RetiredBitmaps::default();
        for value in 0..=DEFAULT_RETIRE_THRESHOLD as u16 {
            retired.retire(value);
        }
        assert_eq!(retired.len(), DEFAULT_RETIRE_THRESHOLD + 1 - DEFAULT_RETIRE_BATCH);
        assert_eq!(retired.iter().next(), Some(&(DEFAULT_RETIRE_BATCH as u16)));
    }
}
