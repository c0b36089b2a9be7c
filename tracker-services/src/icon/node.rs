// SPDX-License-Identifier: LGPL-3.0-only
//! Cache of icons stored on individual filesystem nodes.

use std::fmt;

use tracker_core::{CoreError, HashedElement, OpenHashIndex, SlotIndex};

use crate::icon::bitmap::{Bitmap, IconSize, Point};
use crate::icon::draw::{draw_icon, DrawTarget};
use crate::icon::entry::IconCacheEntry;
use crate::icon::error::IconError;
use crate::icon::mode::IconDrawMode;
use crate::settings::IconCacheSettings;

/// Identity of a filesystem node: device plus inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeRef {
    /// Device the node lives on.
    pub device: i32,
    /// Inode number on that device.
    pub node: i64,
}

impl NodeRef {
    /// Create a node reference.
    pub const fn new(device: i32, node: i64) -> Self {
        Self { device, node }
    }

    /// Device xor both halves of the inode number.
    pub fn hash_value(&self) -> u32 {
        let node = self.node as u64;
        (self.device as u32) ^ (node as u32) ^ ((node >> 32) as u32)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.node)
    }
}

/// Entry keyed by node.
#[derive(Debug)]
pub struct NodeCacheEntry {
    node: NodeRef,
    permanent: bool,
    entry: IconCacheEntry,
}

impl NodeCacheEntry {
    /// Node this entry belongs to.
    pub fn node(&self) -> NodeRef {
        self.node
    }

    /// Whether [NodeIconCache::deleting] leaves this entry alone.
    pub fn permanent(&self) -> bool {
        self.permanent
    }

    /// Mark the entry as surviving [NodeIconCache::deleting].
    pub fn make_permanent(&mut self) {
        self.permanent = true;
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

impl HashedElement for NodeCacheEntry {
    fn hash_value(&self) -> u32 {
        self.node.hash_value()
    }
}

/// Icons read from nodes that carry their own icon.
///
/// Only accessed synchronously, so bitmaps are dropped together with their
/// entries.
#[derive(Debug)]
pub struct NodeIconCache {
    table: OpenHashIndex<NodeCacheEntry>,
}

impl NodeIconCache {
    /// Create a cache sized from `settings`.
    pub fn new(settings: &IconCacheSettings) -> Result<Self, IconError> {
        Ok(Self {
            table: OpenHashIndex::with_chunk(settings.node_table_size, settings.arena_chunk)?,
        })
    }

    /// Find the newest entry for `node`.
    pub fn find_item(&self, node: NodeRef) -> Option<SlotIndex> {
        self.table
            .find(node.hash_value(), |element| element.node == node)
    }

    /// Add an empty owning entry for `node`.
    pub fn add_item(&mut self, node: NodeRef, permanent: bool) -> Result<SlotIndex, IconError> {
        log::trace!("Adding node icon entry {} (permanent: {})", node, permanent);
        let element = NodeCacheEntry {
            node,
            permanent,
            entry: IconCacheEntry::new(),
        };
        Ok(self.table.add(node.hash_value(), element)?)
    }

    /// Add an entry for `node` borrowing the shared cache entry at `target`.
    ///
    /// `target` must be an owning shared entry.
    pub fn add_alias(&mut self, node: NodeRef, target: SlotIndex) -> Result<SlotIndex, IconError> {
        let index = self.add_item(node, false)?;
        self.entry_mut(index)?.set_alias_for(target);
        Ok(index)
    }

    /// Element at `index`.
    pub fn element(&self, index: SlotIndex) -> Option<&NodeCacheEntry> {
        self.table.element_at(index)
    }

    /// Mutable element at `index`.
    pub fn element_mut(&mut self, index: SlotIndex) -> Option<&mut NodeCacheEntry> {
        self.table.element_at_mut(index)
    }

    /// Bitmap holder at `index`.
    pub fn entry(&self, index: SlotIndex) -> Result<&IconCacheEntry, IconError> {
        self.table
            .element_at(index)
            .map(NodeCacheEntry::entry)
            .ok_or(IconError::Core(CoreError::InvalidIndex(index)))
    }

    /// Mutable bitmap holder at `index`.
    pub fn entry_mut(&mut self, index: SlotIndex) -> Result<&mut IconCacheEntry, IconError> {
        self.table
            .element_at_mut(index)
            .map(NodeCacheEntry::entry_mut)
            .ok_or(IconError::Core(CoreError::InvalidIndex(index)))
    }

    /// Whether the owning entry at `index` has a bitmap for `mode` at `size`.
    pub fn have_icon_bitmap(&self, index: SlotIndex, mode: IconDrawMode, size: IconSize) -> bool {
        self.table.element_at(index).is_some_and(|element| {
            !element.entry.is_alias() && element.entry.have_icon_bitmap(mode, size)
        })
    }

    /// The node was deleted; drop its entry unless it is permanent.
    ///
    /// Returns whether an entry was removed.
    pub fn deleting(&mut self, node: NodeRef) -> bool {
        let Some(index) = self.find_item(node) else {
            log::debug!("No node icon entry to delete for {}", node);
            return false;
        };
        if self.table.element_at(index).is_some_and(|element| element.permanent) {
            return false;
        }
        self.table.remove(index).is_ok()
    }

    /// Drop the entry for `node`, permanent or not.
    pub fn removing(&mut self, node: NodeRef) -> bool {
        match self.find_item(node) {
            Some(index) => self.table.remove(index).is_ok(),
            None => false,
        }
    }

    /// The node's icon changed; same as [NodeIconCache::deleting].
    pub fn icon_changed(&mut self, node: NodeRef) -> bool {
        self.deleting(node)
    }

    /// A view is going away. Node bitmaps are never drawn asynchronously, so
    /// nothing refers to the view.
    pub fn deleting_view(&mut self, _view: &dyn DrawTarget) {}

    /// Remove every alias pointing at the shared entry `target`.
    pub fn remove_aliases_to(&mut self, target: SlotIndex) -> Result<usize, IconError> {
        let removed = self
            .table
            .remove_where(|element| element.entry.alias_target() == Some(target))?;
        Ok(removed.len())
    }

    /// Draw the bitmap of the entry at `index`; always synchronous.
    pub fn draw(
        &self,
        index: SlotIndex,
        view: &mut dyn DrawTarget,
        location: Point,
        mode: IconDrawMode,
        size: IconSize,
    ) {
        if let Some(bitmap) = self.bitmap_for(index, mode, size) {
            draw_icon(bitmap, view, location, false);
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

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// All entries with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (SlotIndex, &NodeCacheEntry)> {
        self.table.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icon::draw::{DrawingMode, RecordingTarget};

    fn cache() -> NodeIconCache {
        NodeIconCache::new(&IconCacheSettings::default()).unwrap()
    }

    #[test]
    fn node_hash_folds_inode_halves() {
        let node = NodeRef::new(3, 0x0000_0001_0000_0002);
        assert_eq!(node.hash_value(), 3 ^ 2 ^ 1);
    }

    #[test]
    fn deleting_spares_permanent_entries() {
        let mut cache = cache();
        let kept = NodeRef::new(1, 10);
        let dropped = NodeRef::new(1, 11);
        cache.add_item(kept, true).unwrap();
        cache.add_item(dropped, false).unwrap();

        assert!(!cache.deleting(kept));
        assert!(cache.deleting(dropped));
        assert!(cache.find_item(kept).is_some());
        assert!(cache.find_item(dropped).is_none());

        assert!(!cache.icon_changed(kept));
        assert!(cache.removing(kept));
        assert!(cache.is_empty());
    }

    #[test]
    fn deleting_unknown_node_is_harmless() {
        let mut cache = cache();
        assert!(!cache.deleting(NodeRef::new(9, 9)));
    }

    #[test]
    fn draws_are_synchronous() {
        let mut cache = cache();
        let node = NodeRef::new(2, 5);
        let index = cache.add_item(node, false).unwrap();
        cache
            .entry_mut(index)
            .unwrap()
            .set_icon(
                Bitmap::solid(IconSize::MINI, [1, 1, 1, 255]).unwrap(),
                IconDrawMode::NORMAL_ICON,
                IconSize::MINI,
            )
            .unwrap();

        let mut view = RecordingTarget::new(DrawingMode::Copy);
        cache.draw(index, &mut view, Point::origin(), IconDrawMode::NORMAL_ICON, IconSize::MINI);
        assert_eq!(view.draws.len(), 1);
        assert!(!view.draws[0].asynchronous);
    }

    #[test]
    fn aliases_are_removed_by_target() {
        let mut cache = cache();
        cache.add_alias(NodeRef::new(1, 1), SlotIndex::new(3)).unwrap();
        cache.add_alias(NodeRef::new(1, 2), SlotIndex::new(4)).unwrap();

        assert_eq!(cache.remove_aliases_to(SlotIndex::new(3)).unwrap(), 1);
        assert_eq!(cache.len(), 1);
    }
}
