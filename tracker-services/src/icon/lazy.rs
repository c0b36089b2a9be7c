// SPDX-License-Identifier: LGPL-3.0-only
//! Deferred bitmap allocation for cache misses.

use crate::icon::bitmap::{Bitmap, ColorSpace, IconSize};
use crate::icon::error::IconError;

/// Holds at most one bitmap, allocated on first use.
///
/// A lookup creates one allocator and hands it down the fallback chain. A
/// collaborator fills [LazyBitmapAllocator::get]; the cache then takes the
/// bitmap with [LazyBitmapAllocator::adopt]. Anything not adopted is dropped
/// with the allocator.
#[derive(Debug)]
pub struct LazyBitmapAllocator {
    bitmap: Option<Bitmap>,
    size: IconSize,
    color_space: ColorSpace,
}

impl LazyBitmapAllocator {
    /// Allocator for RGBA bitmaps of `size`.
    pub fn new(size: IconSize) -> Self {
        Self {
            bitmap: None,
            size,
            color_space: ColorSpace::Rgba32,
        }
    }

    /// Allocator for a specific color space, optionally allocating right away.
    pub fn with_color_space(
        size: IconSize,
        color_space: ColorSpace,
        preallocate: bool,
    ) -> Result<Self, IconError> {
        let mut allocator = Self {
            bitmap: None,
            size,
            color_space,
        };
        if preallocate {
            allocator.get()?;
        }
        Ok(allocator)
    }

    /// Current bitmap, allocating it if needed.
    pub fn get(&mut self) -> Result<&mut Bitmap, IconError> {
        if self.bitmap.is_none() {
            self.bitmap = Some(Bitmap::square(self.size, self.color_space)?);
        }
        self.bitmap.as_mut().ok_or(IconError::AllocationFailed {
            width: self.size.pixels(),
            height: self.size.pixels(),
        })
    }

    /// Take ownership of the bitmap, allocating one if none exists yet.
    pub fn adopt(&mut self) -> Result<Bitmap, IconError> {
        match self.bitmap.take() {
            Some(bitmap) => Ok(bitmap),
            None => Bitmap::square(self.size, self.color_space),
        }
    }

    /// Whether a bitmap is currently held.
    pub fn is_allocated(&self) -> bool {
        self.bitmap.is_some()
    }

    /// Size of the bitmaps this allocator produces.
    pub fn size(&self) -> IconSize {
        self.size
    }

    /// Color space of the bitmaps this allocator produces.
    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_on_first_get_only() {
        let mut lazy = LazyBitmapAllocator::new(IconSize::LARGE);
        assert!(!lazy.is_allocated());

        lazy.get().unwrap().bits_mut()[0] = 7;
        assert!(lazy.is_allocated());
        assert_eq!(lazy.get().unwrap().bits()[0], 7);
    }

    #[test]
    fn adopt_transfers_ownership() {
        let mut lazy = LazyBitmapAllocator::new(IconSize::MINI);
        lazy.get().unwrap().bits_mut()[1] = 9;

        let bitmap = lazy.adopt().unwrap();
        assert_eq!(bitmap.bits()[1], 9);
        assert!(!lazy.is_allocated());

        // A second adopt hands out a fresh bitmap.
        let fresh = lazy.adopt().unwrap();
        assert_eq!(fresh.bits()[1], 0);
        assert_eq!(fresh.width(), 16);
    }

    #[test]
    fn preallocation() {
        let lazy =
            LazyBitmapAllocator::with_color_space(IconSize::MINI, ColorSpace::Cmap8, true).unwrap();
        assert!(lazy.is_allocated());
        assert_eq!(lazy.color_space(), ColorSpace::Cmap8);
    }
}
