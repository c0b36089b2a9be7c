// SPDX-License-Identifier: LGPL-3.0-only
//! Cache entries: up to four bitmaps, or an alias to another entry.

use tracker_core::SlotIndex;

use crate::icon::bitmap::{Bitmap, ColorSpace, IconSize, Point, TRANSPARENT_8_BIT};
use crate::icon::error::{invariant_violation, IconError};
use crate::icon::lazy::LazyBitmapAllocator;
use crate::icon::mode::IconDrawMode;
use crate::icon::retire::RetiredBitmaps;
use crate::icon::transform::IconTransform;

/// Alpha above which an RGBA pixel counts as a hit.
const HIT_ALPHA_THRESHOLD: u8 = 20;

/// Bitmaps an owning entry may hold.
#[derive(Debug, Default)]
pub struct IconBitmaps {
    large: Option<Bitmap>,
    highlighted_large: Option<Bitmap>,
    mini: Option<Bitmap>,
    highlighted_mini: Option<Bitmap>,
}

impl IconBitmaps {
    fn slot(&self, mode: IconDrawMode, size: IconSize) -> Option<&Option<Bitmap>> {
        match (mode == IconDrawMode::SELECTED_ICON, size.is_mini()) {
            _ if !mode.is_materialized() => None,
            (false, false) => Some(&self.large),
            (true, false) => Some(&self.highlighted_large),
            (false, true) => Some(&self.mini),
            (true, true) => Some(&self.highlighted_mini),
        }
    }

    fn slot_mut(&mut self, mode: IconDrawMode, size: IconSize) -> Option<&mut Option<Bitmap>> {
        match (mode == IconDrawMode::SELECTED_ICON, size.is_mini()) {
            _ if !mode.is_materialized() => None,
            (false, false) => Some(&mut self.large),
            (true, false) => Some(&mut self.highlighted_large),
            (false, true) => Some(&mut self.mini),
            (true, true) => Some(&mut self.highlighted_mini),
        }
    }

    fn take_all(&mut self) -> impl Iterator<Item = Bitmap> {
        [
            self.large.take(),
            self.highlighted_large.take(),
            self.mini.take(),
            self.highlighted_mini.take(),
        ]
        .into_iter()
        .flatten()
    }
}

/// An entry either owns its bitmaps or points at the entry that does.
///
/// Alias targets always own their bitmaps, so one hop resolves any alias.
#[derive(Debug)]
pub enum EntryState {
    /// Holds bitmaps.
    Owning(IconBitmaps),
    /// Borrows the bitmaps of the shared cache entry at this index.
    AliasOf(SlotIndex),
}

impl Default for EntryState {
    fn default() -> Self {
        Self::Owning(IconBitmaps::default())
    }
}

/// Bitmap holder shared by both caches.
#[derive(Debug, Default)]
pub struct IconCacheEntry {
    state: EntryState,
}

impl IconCacheEntry {
    /// Empty owning entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry aliasing the shared cache entry at `target`.
    pub fn alias_of(target: SlotIndex) -> Self {
        Self {
            state: EntryState::AliasOf(target),
        }
    }

    /// Current state.
    pub fn state(&self) -> &EntryState {
        &self.state
    }

    /// Whether this entry borrows another entry's bitmaps.
    pub fn is_alias(&self) -> bool {
        matches!(self.state, EntryState::AliasOf(_))
    }

    /// Target of the alias, if this entry is one.
    pub fn alias_target(&self) -> Option<SlotIndex> {
        match self.state {
            EntryState::AliasOf(target) => Some(target),
            EntryState::Owning(_) => None,
        }
    }

    /// Turn this entry into an alias of `target`, dropping any owned bitmaps.
    ///
    /// `target` must own its bitmaps; callers resolve it first.
    pub fn set_alias_for(&mut self, target: SlotIndex) {
        self.state = EntryState::AliasOf(target);
    }

    fn bitmaps(&self) -> Result<&IconBitmaps, IconError> {
        match &self.state {
            EntryState::Owning(bitmaps) => Ok(bitmaps),
            EntryState::AliasOf(target) => Err(invariant_violation(format!(
                "bitmap access on an alias of {target}"
            ))),
        }
    }

    fn bitmaps_mut(&mut self) -> Result<&mut IconBitmaps, IconError> {
        match &mut self.state {
            EntryState::Owning(bitmaps) => Ok(bitmaps),
            EntryState::AliasOf(target) => Err(invariant_violation(format!(
                "bitmap update on an alias of {target}"
            ))),
        }
    }

    /// Whether a bitmap for `mode` at `size` is present.
    ///
    /// Large bitmaps must also match the requested width, so a 32 pixel icon
    /// does not satisfy a 48 pixel request.
    pub fn have_icon_bitmap(&self, mode: IconDrawMode, size: IconSize) -> bool {
        let Ok(bitmaps) = self.bitmaps() else {
            return false;
        };
        match bitmaps.slot(mode, size) {
            Some(Some(bitmap)) => size.is_mini() || bitmap.width() == size.pixels(),
            _ => false,
        }
    }

    /// Bitmap for `mode` at `size`, if present.
    pub fn icon_for_mode(&self, mode: IconDrawMode, size: IconSize) -> Option<&Bitmap> {
        self.bitmaps()
            .ok()?
            .slot(mode, size)
            .and_then(|slot| slot.as_ref())
    }

    /// Store `bitmap` for `mode` at `size`, dropping any previous one.
    pub fn set_icon(
        &mut self,
        bitmap: Bitmap,
        mode: IconDrawMode,
        size: IconSize,
    ) -> Result<(), IconError> {
        let slot = self
            .bitmaps_mut()?
            .slot_mut(mode, size)
            .ok_or(IconError::UnsupportedMode(mode))?;
        *slot = Some(bitmap);
        Ok(())
    }

    /// Whether [IconCacheEntry::construct_bitmap] can build `mode`.
    pub fn can_construct_bitmap(mode: IconDrawMode) -> bool {
        mode.can_construct()
    }

    /// Build the `mode` bitmap from the normal one.
    ///
    /// Returns `None` for modes that cannot be built or when the transform
    /// rejects the source format.
    pub fn construct_bitmap(
        &self,
        mode: IconDrawMode,
        size: IconSize,
        transform: &dyn IconTransform,
        lazy: &mut LazyBitmapAllocator,
    ) -> Result<Option<Bitmap>, IconError> {
        if !Self::can_construct_bitmap(mode) {
            return Ok(None);
        }
        let Some(normal) = self.icon_for_mode(IconDrawMode::NORMAL_ICON, size) else {
            return Err(invariant_violation(
                "constructing a selected icon without a normal one",
            ));
        };

        if transform.make_selected(normal, lazy.get()?) {
            lazy.adopt().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Make sure a `mode` bitmap exists, building it from the normal one if
    /// possible.
    ///
    /// Returns whether the `mode` bitmap is present afterwards.
    pub fn ensure_mode(
        &mut self,
        mode: IconDrawMode,
        size: IconSize,
        transform: &dyn IconTransform,
        lazy: &mut LazyBitmapAllocator,
    ) -> Result<bool, IconError> {
        if self.have_icon_bitmap(mode, size) {
            return Ok(true);
        }
        if mode == IconDrawMode::NORMAL_ICON
            || !self.have_icon_bitmap(IconDrawMode::NORMAL_ICON, size)
        {
            return Ok(false);
        }

        if let Some(bitmap) = self.construct_bitmap(mode, size, transform, lazy)? {
            self.set_icon(bitmap, mode, size)?;
        }
        Ok(self.have_icon_bitmap(mode, size))
    }

    /// Whether `point`, relative to the icon origin, hits the icon.
    ///
    /// The inner area inset by an eighth of each dimension always hits. Outside
    /// of it, RGBA pixels hit above a small alpha and palette pixels hit unless
    /// transparent.
    pub fn icon_hit_test(&self, point: Point, mode: IconDrawMode, size: IconSize) -> bool {
        let Some(bitmap) = self.icon_for_mode(mode, size) else {
            return false;
        };
        if point.x < 0.0 || point.y < 0.0 {
            return false;
        }

        let width = bitmap.width() as f32;
        let height = bitmap.height() as f32;
        let inset_x = (bitmap.width() / 8) as f32;
        let inset_y = (bitmap.height() / 8) as f32;
        if point.x >= inset_x
            && point.x <= width - 1.0 - inset_x
            && point.y >= inset_y
            && point.y <= height - 1.0 - inset_y
        {
            return true;
        }

        let x = point.x.floor() as usize;
        let y = point.y.floor() as usize;
        if x >= bitmap.width() as usize || y >= bitmap.height() as usize {
            return false;
        }

        match bitmap.color_space() {
            ColorSpace::Rgba32 => {
                bitmap.bits()[y * bitmap.bytes_per_row() + x * 4 + 3] > HIT_ALPHA_THRESHOLD
            }
            ColorSpace::Cmap8 => bitmap.bits()[y * bitmap.bytes_per_row() + x] != TRANSPARENT_8_BIT,
            ColorSpace::Rgb32 | ColorSpace::Gray8 => true,
        }
    }

    /// Move every owned bitmap onto the retirement list.
    pub fn retire_icons(&mut self, retired: &mut RetiredBitmaps) {
        if let EntryState::Owning(bitmaps) = &mut self.state {
            for bitmap in bitmaps.take_all() {
                retired.retire(bitmap);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icon::transform::HighlightTransform;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTransform(AtomicUsize);

    impl IconTransform for CountingTransform {
        fn make_selected(&self, normal: &Bitmap, target: &mut Bitmap) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            target.copy_from(normal).is_ok()
        }
    }

    #[test]
    fn large_slot_checks_width() {
        let mut entry = IconCacheEntry::new();
        entry
            .set_icon(
                Bitmap::solid(IconSize::LARGE, [0; 4]).unwrap(),
                IconDrawMode::NORMAL_ICON,
                IconSize::LARGE,
            )
            .unwrap();

        assert!(entry.have_icon_bitmap(IconDrawMode::NORMAL_ICON, IconSize::LARGE));
        assert!(!entry.have_icon_bitmap(IconDrawMode::NORMAL_ICON, IconSize::new(48)));
        assert!(!entry.have_icon_bitmap(IconDrawMode::NORMAL_ICON, IconSize::MINI));
        assert!(!entry.have_icon_bitmap(IconDrawMode::SELECTED_ICON, IconSize::LARGE));
    }

    #[test]
    fn reserved_modes_are_rejected() {
        let mut entry = IconCacheEntry::new();
        let result = entry.set_icon(
            Bitmap::solid(IconSize::MINI, [0; 4]).unwrap(),
            IconDrawMode::OPEN_ICON,
            IconSize::MINI,
        );
        assert!(matches!(result, Err(IconError::UnsupportedMode(_))));
        assert!(!entry.have_icon_bitmap(IconDrawMode::OPEN_ICON, IconSize::MINI));
    }

    #[test]
    fn selected_bitmap_is_built_once() {
        let transform = CountingTransform(AtomicUsize::new(0));
        let mut entry = IconCacheEntry::new();
        entry
            .set_icon(
                Bitmap::solid(IconSize::MINI, [9; 4]).unwrap(),
                IconDrawMode::NORMAL_ICON,
                IconSize::MINI,
            )
            .unwrap();

        for _ in 0..3 {
            let mut lazy = LazyBitmapAllocator::new(IconSize::MINI);
            assert!(entry
                .ensure_mode(IconDrawMode::SELECTED_ICON, IconSize::MINI, &transform, &mut lazy)
                .unwrap());
        }
        assert_eq!(transform.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ensure_mode_without_normal_icon() {
        let mut entry = IconCacheEntry::new();
        let mut lazy = LazyBitmapAllocator::new(IconSize::MINI);
        let built = entry
            .ensure_mode(
                IconDrawMode::SELECTED_ICON,
                IconSize::MINI,
                &HighlightTransform::default(),
                &mut lazy,
            )
            .unwrap();
        assert!(!built);
        assert!(!lazy.is_allocated());
    }

    #[test]
    fn hit_test_inner_area_and_alpha() {
        let mut bits = vec![0u8; 32 * 32 * 4];
        // Opaque pixel in the outer margin at (1, 1).
        bits[(32 + 1) * 4 + 3] = 255;
        let bitmap = Bitmap::from_bits(32, 32, ColorSpace::Rgba32, bits).unwrap();

        let mut entry = IconCacheEntry::new();
        entry
            .set_icon(bitmap, IconDrawMode::NORMAL_ICON, IconSize::LARGE)
            .unwrap();

        let normal = IconDrawMode::NORMAL_ICON;
        assert!(entry.icon_hit_test(Point::new(16.0, 16.0), normal, IconSize::LARGE));
        assert!(entry.icon_hit_test(Point::new(1.5, 1.5), normal, IconSize::LARGE));
        assert!(!entry.icon_hit_test(Point::new(0.0, 0.0), normal, IconSize::LARGE));
        assert!(!entry.icon_hit_test(Point::new(40.0, 3.0), normal, IconSize::LARGE));
        assert!(!entry.icon_hit_test(Point::new(16.0, 16.0), IconDrawMode::SELECTED_ICON, IconSize::LARGE));
    }

    #[test]
    fn hit_test_palette_transparency() {
        let mut bits = vec![TRANSPARENT_8_BIT; 16 * 16];
        bits[16 + 15] = 3;
        let bitmap = Bitmap::from_bits(16, 16, ColorSpace::Cmap8, bits).unwrap();

        let mut entry = IconCacheEntry::new();
        entry
            .set_icon(bitmap, IconDrawMode::NORMAL_ICON, IconSize::MINI)
            .unwrap();

        let normal = IconDrawMode::NORMAL_ICON;
        assert!(entry.icon_hit_test(Point::new(15.0, 1.0), normal, IconSize::MINI));
        assert!(!entry.icon_hit_test(Point::new(0.0, 1.0), normal, IconSize::MINI));
    }

    #[test]
    fn retiring_empties_the_entry() {
        let mut entry = IconCacheEntry::new();
        for (mode, size) in [
            (IconDrawMode::NORMAL_ICON, IconSize::LARGE),
            (IconDrawMode::SELECTED_ICON, IconSize::LARGE),
            (IconDrawMode::NORMAL_ICON, IconSize::MINI),
        ] {
            entry
                .set_icon(Bitmap::solid(size, [1; 4]).unwrap(), mode, size)
                .unwrap();
        }

        let mut retired = RetiredBitmaps::default();
        entry.retire_icons(&mut retired);

        assert_eq!(retired.len(), 3);
        assert!(!entry.have_icon_bitmap(IconDrawMode::NORMAL_ICON, IconSize::LARGE));
    }

    #[test]
    fn aliases_own_nothing() {
        let mut entry = IconCacheEntry::new();
        entry.set_alias_for(SlotIndex::new(4));
        assert!(entry.is_alias());
        assert_eq!(entry.alias_target(), Some(SlotIndex::new(4)));
    }
}
