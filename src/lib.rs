#![warn(missing_docs)]

//! File icon caching for a desktop file manager.
//!
//! Icons are resolved through a chain of sources and kept in a per-node cache
//! and a per-type shared cache. See [services::icon::IconCache].

pub use nalgebra as math;

pub use tracker_core as core;
pub use tracker_services as services;

/// A "prelude" for users of the tracker icon cache.
///
/// ```rust
/// use tracker::prelude::*;
/// ```
pub mod prelude {
    pub use crate::services::icon::{
        Bitmap, BuiltinResources, DirectoryResources, DrawTarget, IconCache, IconDrawMode,
        IconError, IconModel, IconProviders, IconSize, IconSource, MemoryMimeDatabase,
        MemoryVolumeRoster, MemoryWellKnownEntries, Point, StaticModel,
    };
    pub use crate::services::settings::{IconCacheSettings, SettingsRegistry};
    pub use crate::core::{IndexStableArena, OpenHashIndex, SlotIndex};
}
