// SPDX-License-Identifier: LGPL-3.0-only
//! In-memory collaborators for headless use and tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::icon::bitmap::{Bitmap, IconSize};
use crate::icon::error::IconError;
use crate::icon::node::NodeRef;
use crate::icon::provider::{MimeDatabase, VolumeRoster, WellKnownEntries, WellKnownEntry};

#[derive(Debug, Default)]
struct MimeRecord {
    icons: HashMap<u32, Bitmap>,
    preferred_app: Option<String>,
    icons_for_types: HashMap<String, HashMap<u32, Bitmap>>,
}

/// MIME database held in memory.
///
/// Types are matched case-insensitively. Queries are counted so callers can
/// tell cache hits from database reads.
#[derive(Debug, Default)]
pub struct MemoryMimeDatabase {
    records: RwLock<HashMap<String, MimeRecord>>,
    icon_queries: AtomicUsize,
    app_icon_queries: AtomicUsize,
}

impl MemoryMimeDatabase {
    /// Empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the icon of `mime_type`; the bitmap width picks the size.
    pub fn set_icon(&self, mime_type: &str, bitmap: Bitmap) {
        self.records
            .write()
            .entry(mime_type.to_ascii_lowercase())
            .or_default()
            .icons
            .insert(bitmap.width(), bitmap);
    }

    /// Remove every icon of `mime_type`.
    pub fn remove_icons(&self, mime_type: &str) {
        if let Some(record) = self.records.write().get_mut(&mime_type.to_ascii_lowercase()) {
            record.icons.clear();
        }
    }

    /// Set the preferred application of `mime_type`.
    pub fn set_preferred_app(&self, mime_type: &str, app_signature: &str) {
        self.records
            .write()
            .entry(mime_type.to_ascii_lowercase())
            .or_default()
            .preferred_app = Some(app_signature.to_string());
    }

    /// Declare the icon `app_signature` uses for documents of `file_type`.
    pub fn set_icon_for_type(&self, app_signature: &str, file_type: &str, bitmap: Bitmap) {
        self.records
            .write()
            .entry(app_signature.to_ascii_lowercase())
            .or_default()
            .icons_for_types
            .entry(file_type.to_ascii_lowercase())
            .or_default()
            .insert(bitmap.width(), bitmap);
    }

    /// Number of [MimeDatabase::icon] calls so far.
    pub fn icon_queries(&self) -> usize {
        self.icon_queries.load(Ordering::SeqCst)
    }

    /// Number of [MimeDatabase::icon_for_type] calls so far.
    pub fn app_icon_queries(&self) -> usize {
        self.app_icon_queries.load(Ordering::SeqCst)
    }
}

impl MimeDatabase for MemoryMimeDatabase {
    fn icon(&self, mime_type: &str, size: IconSize, target: &mut Bitmap) -> Result<(), IconError> {
        self.icon_queries.fetch_add(1, Ordering::SeqCst);
        let records = self.records.read();
        let bitmap = records
            .get(&mime_type.to_ascii_lowercase())
            .and_then(|record| record.icons.get(&size.pixels()))
            .ok_or_else(|| IconError::NotFound(mime_type.to_string()))?;
        target.copy_from(bitmap)
    }

    fn icon_for_type(
        &self,
        app_signature: &str,
        file_type: &str,
        size: IconSize,
        target: &mut Bitmap,
    ) -> Result<(), IconError> {
        self.app_icon_queries.fetch_add(1, Ordering::SeqCst);
        let records = self.records.read();
        let bitmap = records
            .get(&app_signature.to_ascii_lowercase())
            .and_then(|record| record.icons_for_types.get(&file_type.to_ascii_lowercase()))
            .and_then(|icons| icons.get(&size.pixels()))
            .ok_or_else(|| IconError::NotFound(format!("{app_signature} for {file_type}")))?;
        target.copy_from(bitmap)
    }

    fn preferred_app(&self, mime_type: &str) -> Option<String> {
        self.records
            .read()
            .get(&mime_type.to_ascii_lowercase())
            .and_then(|record| record.preferred_app.clone())
    }
}

/// Volume roster held in memory.
#[derive(Debug, Default)]
pub struct MemoryVolumeRoster {
    shared: RwLock<HashSet<i32>>,
    icons: RwLock<HashMap<(i32, u32), Bitmap>>,
}

impl MemoryVolumeRoster {
    /// No volumes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the volume on `device` as shared.
    pub fn set_shared(&self, device: i32, shared: bool) {
        let mut set = self.shared.write();
        if shared {
            set.insert(device);
        } else {
            set.remove(&device);
        }
    }

    /// Set the device icon of `device`; the bitmap width picks the size.
    pub fn set_icon(&self, device: i32, bitmap: Bitmap) {
        self.icons.write().insert((device, bitmap.width()), bitmap);
    }
}

impl VolumeRoster for MemoryVolumeRoster {
    fn is_shared(&self, device: i32) -> bool {
        self.shared.read().contains(&device)
    }

    fn icon(&self, device: i32, size: IconSize, target: &mut Bitmap) -> Result<(), IconError> {
        let icons = self.icons.read();
        let bitmap = icons
            .get(&(device, size.pixels()))
            .ok_or_else(|| IconError::NotFound(format!("device {device}")))?;
        target.copy_from(bitmap)
    }
}

/// Well-known directory list held in memory.
#[derive(Debug, Default)]
pub struct MemoryWellKnownEntries {
    entries: RwLock<Vec<WellKnownEntry>>,
}

impl MemoryWellKnownEntries {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a well-known directory.
    pub fn add(&self, entry: WellKnownEntry) {
        self.entries.write().push(entry);
    }
}

impl WellKnownEntries for MemoryWellKnownEntries {
    fn match_entry(&self, node: NodeRef) -> Option<WellKnownEntry> {
        self.entries
            .read()
            .iter()
            .find(|entry| entry.node == node)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icon::bitmap::ColorSpace;
    use crate::icon::provider::WellKnownDirectory;

    #[test]
    fn mime_icons_by_size() {
        let database = MemoryMimeDatabase::new();
        let icon = Bitmap::solid(IconSize::LARGE, [1, 2, 3, 255]).unwrap();
        database.set_icon("Text/Plain", icon.clone());

        let mut target = Bitmap::square(IconSize::LARGE, ColorSpace::Rgba32).unwrap();
        database.icon("text/plain", IconSize::LARGE, &mut target).unwrap();
        assert_eq!(target, icon);

        let mut mini = Bitmap::square(IconSize::MINI, ColorSpace::Rgba32).unwrap();
        assert!(database.icon("text/plain", IconSize::MINI, &mut mini).is_err());
        assert_eq!(database.icon_queries(), 2);
    }

    #[test]
    fn app_icons_for_types() {
        let database = MemoryMimeDatabase::new();
        let icon = Bitmap::solid(IconSize::MINI, [4; 4]).unwrap();
        database.set_icon_for_type("application/x-editor", "text/plain", icon.clone());
        database.set_preferred_app("text/plain", "application/x-editor");

        let mut target = Bitmap::square(IconSize::MINI, ColorSpace::Rgba32).unwrap();
        database
            .icon_for_type("application/x-editor", "text/plain", IconSize::MINI, &mut target)
            .unwrap();
        assert_eq!(target, icon);
        assert_eq!(
            database.preferred_app("text/plain").as_deref(),
            Some("application/x-editor")
        );
    }

    #[test]
    fn well_known_lookup() {
        let entries = MemoryWellKnownEntries::new();
        let home = NodeRef::new(1, 42);
        entries.add(WellKnownEntry {
            node: home,
            which: WellKnownDirectory::Home,
            name: "home".to_string(),
        });

        assert_eq!(entries.match_entry(home).unwrap().name, "home");
        assert!(entries.match_entry(NodeRef::new(1, 43)).is_none());
    }

    #[test]
    fn shared_volumes() {
        let roster = MemoryVolumeRoster::new();
        roster.set_shared(3, true);
        assert!(roster.is_shared(3));
        roster.set_shared(3, false);
        assert!(!roster.is_shared(3));
    }
}
