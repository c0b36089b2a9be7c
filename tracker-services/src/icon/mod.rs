// SPDX-License-Identifier: LGPL-3.0-only
//! Tracker icon cache
//!
//! Icons are looked up through a fixed chain of sources (node, preferred
//! application, MIME type, supertype, generic file icon, bundled fallback) and
//! kept in two caches: one keyed by node, one shared by every file of a type.
//! Shared entries may alias each other so a type reached through several keys
//! holds its bitmaps once.

mod bitmap;
mod cache;
mod draw;
mod entry;
mod error;
mod lazy;
mod memory;
mod mode;
mod model;
mod node;
mod provider;
mod resources;
mod retire;
mod shared;
mod transform;

pub use bitmap::{Bitmap, ColorSpace, IconSize, Point, TRANSPARENT_8_BIT};
pub use cache::{CacheKind, CacheLocks, EntryRef, IconCache, IconProviders, Resolved};
pub use draw::{AlphaFunction, AlphaSource, DrawTarget, DrawingMode, RecordedDraw, RecordingTarget};
pub use entry::{EntryState, IconBitmaps, IconCacheEntry};
pub use error::IconError;
pub use lazy::LazyBitmapAllocator;
pub use memory::{MemoryMimeDatabase, MemoryVolumeRoster, MemoryWellKnownEntries};
pub use mode::{IconDrawMode, IconSource};
pub use model::{IconModel, ModelKind, StaticModel};
pub use node::{NodeCacheEntry, NodeIconCache, NodeRef};
pub use provider::{
    MimeDatabase, ResourceIcon, TrackerResources, VolumeRoster, WellKnownDirectory,
    WellKnownEntries, WellKnownEntry, FILE_MIME_TYPE, ROOT_MIME_TYPE, VOLUME_MIME_TYPE,
    WELL_KNOWN_TYPE_PREFIX,
};
pub use resources::{BuiltinResources, DirectoryResources};
pub use retire::{RetiredBitmaps, DEFAULT_RETIRE_BATCH, DEFAULT_RETIRE_THRESHOLD};
pub use shared::{SharedCacheEntry, SharedIconCache};
pub use transform::{
    tint_color, HighlightTransform, IconTransform, Palette, DEFAULT_HIGHLIGHT_TINT,
    DEFAULT_SELECTED_BRIGHTNESS,
};
