// SPDX-License-Identifier: LGPL-3.0-only
//! Cache of icons keyed by file type and application signature.

use std::borrow::Cow;

use tracker_core::{hash_string, CoreError, HashedElement, OpenHashIndex, SlotIndex};

use crate::icon::bitmap::{Bitmap, IconSize, Point};
use crate::icon::draw::{draw_icon, DrawTarget};
use crate::icon::entry::IconCacheEntry;
use crate::icon::error::{invariant_violation, IconError};
use crate::icon::mode::IconDrawMode;
use crate::icon::provider::FILE_MIME_TYPE;
use crate::icon::retire::RetiredBitmaps;
use crate::settings::IconCacheSettings;

fn normalize(key: &str) -> Cow<'_, str> {
    if key.bytes().any(|byte| byte.is_ascii_uppercase()) {
        Cow::Owned(key.to_ascii_lowercase())
    } else {
        Cow::Borrowed(key)
    }
}

/// Entry keyed by `(file type, app signature)`; the signature may be empty.
#[derive(Debug)]
pub struct SharedCacheEntry {
    file_type: String,
    app_signature: String,
    entry: IconCacheEntry,
}

impl SharedCacheEntry {
    fn new(file_type: &str, app_signature: &str) -> Self {
        Self {
            file_type: normalize(file_type).into_owned(),
            app_signature: normalize(app_signature).into_owned(),
            entry: IconCacheEntry::new(),
        }
    }

    /// Hash of a normalized key.
    pub fn key_hash(file_type: &str, app_signature: &str) -> u32 {
        let hash = hash_string(file_type, 0);
        if app_signature.is_empty() {
            hash
        } else {
            hash_string(app_signature, hash)
        }
    }

    fn matches(&self, file_type: &str, app_signature: &str) -> bool {
        self.file_type == file_type && self.app_signature == app_signature
    }

    /// Lowercased file type.
    pub fn file_type(&self) -> &str {
        &self.file_type
    }

    /// Lowercased app signature, empty if none.
    pub fn app_signature(&self) -> &str {
        &self.app_signature
    }

    /// Bitmap holder.
    pub fn entry(&self) -> &IconCacheEntry {
        &self.entry
    }

    /// Mutable bitmap holder.
    pub fn entry_mut(&mut self) -> &mut IconCacheEntry {
        &mut self.entry
    }
}

impl HashedElement for SharedCacheEntry {
    fn hash_value(&self) -> u32 {
        Self::key_hash(&self.file_type, &self.app_signature)
    }
}

/// Icons shared by every file of a type.
///
/// Entries are never evicted for memory pressure; they only go away when the
/// icon of their type changes. Their bitmaps then go to a retirement list
/// since asynchronous draws may still read them.
#[derive(Debug)]
pub struct SharedIconCache {
    table: OpenHashIndex<SharedCacheEntry>,
    retired: RetiredBitmaps,
}

impl SharedIconCache {
    /// Create a cache sized from `settings`.
    pub fn new(settings: &IconCacheSettings) -> Result<Self, IconError> {
        Ok(Self {
            table: OpenHashIndex::with_chunk(settings.shared_table_size, settings.arena_chunk)?,
            retired: RetiredBitmaps::new(settings.retire_threshold, settings.retire_batch),
        })
    }

    /// Find the newest entry with this key.
    ///
    /// Keys compare case-insensitively. An empty file type stands for the
    /// generic file type.
    pub fn find_item(&self, file_type: &str, app_signature: &str) -> Option<SlotIndex> {
        let file_type = if file_type.is_empty() {
            Cow::Borrowed(FILE_MIME_TYPE)
        } else {
            normalize(file_type)
        };
        let app_signature = normalize(app_signature);
        let hash = SharedCacheEntry::key_hash(&file_type, &app_signature);
        self.table
            .find(hash, |element| element.matches(&file_type, &app_signature))
    }

    /// Add an empty owning entry.
    ///
    /// Indices handed out earlier stay valid across the insertion.
    pub fn add_item(&mut self, file_type: &str, app_signature: &str) -> Result<SlotIndex, IconError> {
        let file_type = if file_type.is_empty() {
            FILE_MIME_TYPE
        } else {
            file_type
        };
        let element = SharedCacheEntry::new(file_type, app_signature);
        let hash = element.hash_value();
        log::trace!(
            "Adding shared icon entry ({}, {})",
            element.file_type,
            element.app_signature
        );
        Ok(self.table.add(hash, element)?)
    }

    /// Element at `index`.
    pub fn element(&self, index: SlotIndex) -> Option<&SharedCacheEntry> {
        self.table.element_at(index)
    }

    /// Bitmap holder at `index`.
    pub fn entry(&self, index: SlotIndex) -> Result<&IconCacheEntry, IconError> {
        self.table
            .element_at(index)
            .map(SharedCacheEntry::entry)
            .ok_or(IconError::Core(CoreError::InvalidIndex(index)))
    }

    /// Mutable bitmap holder at `index`.
    pub fn entry_mut(&mut self, index: SlotIndex) -> Result<&mut IconCacheEntry, IconError> {
        self.table
            .element_at_mut(index)
            .map(SharedCacheEntry::entry_mut)
            .ok_or(IconError::Core(CoreError::InvalidIndex(index)))
    }

    /// Whether the owning entry at `index` has a bitmap for `mode` at `size`.
    ///
    /// Aliases report `false`; resolve them first.
    pub fn have_icon_bitmap(&self, index: SlotIndex, mode: IconDrawMode, size: IconSize) -> bool {
        self.table.element_at(index).is_some_and(|element| {
            !element.entry.is_alias() && element.entry.have_icon_bitmap(mode, size)
        })
    }

    /// Alias target of the entry at `index`, or `index` itself.
    pub fn resolve_if_alias(&self, index: SlotIndex) -> SlotIndex {
        self.table
            .element_at(index)
            .and_then(|element| element.entry.alias_target())
            .unwrap_or(index)
    }

    /// Make the entry at `index` an alias of the entry at `target`.
    ///
    /// `target` is resolved first, so aliases never chain.
    pub fn set_alias_for(&mut self, index: SlotIndex, target: SlotIndex) -> Result<(), IconError> {
        let target = self.resolve_if_alias(target);
        if target == index {
            return Err(invariant_violation(format!("entry {index} aliasing itself")));
        }
        if self.table.element_at(target).is_none() {
            return Err(IconError::Core(CoreError::InvalidIndex(target)));
        }
        self.entry_mut(index)?.set_alias_for(target);
        Ok(())
    }

    /// Remove every alias pointing at `target`; returns how many went away.
    pub fn remove_aliases_to(&mut self, target: SlotIndex) -> Result<usize, IconError> {
        let removed = self
            .table
            .remove_where(|element| element.entry.alias_target() == Some(target))?;
        Ok(removed.len())
    }

    /// Drop the owning entry at `index` after its icon changed.
    ///
    /// Its bitmaps are retired rather than freed. Aliases to it must already be
    /// gone.
    pub fn icon_changed(&mut self, index: SlotIndex) -> Result<(), IconError> {
        if self.entry(index)?.is_alias() {
            return Err(invariant_violation(format!(
                "icon change reported for alias entry {index}"
            )));
        }
        #[cfg(debug_assertions)]
        if self
            .table
            .iter()
            .any(|(_, element)| element.entry.alias_target() == Some(index))
        {
            return Err(invariant_violation(format!(
                "entry {index} removed while still aliased"
            )));
        }

        let mut element = self.table.remove(index)?;
        log::debug!(
            "Icon changed for ({}, {})",
            element.file_type,
            element.app_signature
        );
        element.entry.retire_icons(&mut self.retired);
        Ok(())
    }

    /// Draw the bitmap of the owning entry at `index`, possibly asynchronously.
    pub fn draw(
        &self,
        index: SlotIndex,
        view: &mut dyn DrawTarget,
        location: Point,
        mode: IconDrawMode,
        size: IconSize,
        asynchronous: bool,
    ) {
        if let Some(bitmap) = self.bitmap_for(index, mode, size) {
            draw_icon(bitmap, view, location, asynchronous);
        }
    }

    /// Hand the bitmap of the entry at `index` to `blit`.
    pub fn sync_draw(
        &self,
        index: SlotIndex,
        view: &mut dyn DrawTarget,
        location: Point,
        mode: IconDrawMode,
        size: IconSize,
        blit: &mut dyn FnMut(&mut dyn DrawTarget, Point, &Bitmap),
    ) {
        if let Some(bitmap) = self.bitmap_for(index, mode, size) {
            blit(view, location, bitmap);
        }
    }

    fn bitmap_for(&self, index: SlotIndex, mode: IconDrawMode, size: IconSize) -> Option<&Bitmap> {
        let element = self.table.element_at(index)?;
        if element.entry.is_alias() {
            return None;
        }
        element.entry.icon_for_mode(mode, size)
    }

    /// Bitmaps waiting to be released.
    pub fn retired(&self) -> &RetiredBitmaps {
        &self.retired
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// All entries with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (SlotIndex, &SharedCacheEntry)> {
        self.table.iter()
    }
}
