// SPDX-License-Identifier: LGPL-3.0-only
//! The icon cache: lookup chain, drawing and invalidation.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracker_core::SlotIndex;

use crate::icon::bitmap::{Bitmap, IconSize, Point};
use crate::icon::draw::DrawTarget;
use crate::icon::entry::IconCacheEntry;
use crate::icon::error::{invariant_violation, IconError};
use crate::icon::lazy::LazyBitmapAllocator;
use crate::icon::mode::{IconDrawMode, IconSource};
use crate::icon::model::IconModel;
use crate::icon::node::{NodeIconCache, NodeRef};
use crate::icon::provider::{
    MimeDatabase, ResourceIcon, TrackerResources, VolumeRoster, WellKnownEntries,
    FILE_MIME_TYPE, ROOT_MIME_TYPE, VOLUME_MIME_TYPE, WELL_KNOWN_TYPE_PREFIX,
};
use crate::icon::resources::BuiltinResources;
use crate::icon::shared::SharedIconCache;
use crate::icon::transform::IconTransform;
use crate::settings::IconCacheSettings;

const NORMAL: IconDrawMode = IconDrawMode::NORMAL_ICON;

/// Which cache an [EntryRef] points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// The per-node cache.
    Node,
    /// The per-type cache.
    Shared,
}

/// Handle to an entry in one of the two caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryRef {
    /// Cache holding the entry.
    pub cache: CacheKind,
    /// Slot of the entry.
    pub index: SlotIndex,
}

impl EntryRef {
    /// Entry in the node cache.
    pub fn node(index: SlotIndex) -> Self {
        Self {
            cache: CacheKind::Node,
            index,
        }
    }

    /// Entry in the shared cache.
    pub fn shared(index: SlotIndex) -> Self {
        Self {
            cache: CacheKind::Shared,
            index,
        }
    }
}

/// Guards over both caches.
///
/// Locks are taken on demand. The node cache must always be locked before the
/// shared cache; asking for it while only the shared cache is held is an
/// error.
pub struct CacheLocks<'a> {
    node_cache: &'a Mutex<NodeIconCache>,
    shared_cache: &'a Mutex<SharedIconCache>,
    node: Option<MutexGuard<'a, NodeIconCache>>,
    shared: Option<MutexGuard<'a, SharedIconCache>>,
}

impl<'a> CacheLocks<'a> {
    fn new(cache: &'a IconCache) -> Self {
        Self {
            node_cache: &cache.node_cache,
            shared_cache: &cache.shared_cache,
            node: None,
            shared: None,
        }
    }

    /// The node cache, locking it if needed.
    pub fn node(&mut self) -> Result<&mut NodeIconCache, IconError> {
        if self.node.is_none() && self.shared.is_some() {
            return Err(invariant_violation(
                "node cache locked while holding the shared cache",
            ));
        }
        let cache = self.node_cache;
        let guard = self.node.get_or_insert_with(|| cache.lock());
        Ok(&mut **guard)
    }

    /// The shared cache, locking it if needed.
    pub fn shared(&mut self) -> &mut SharedIconCache {
        let cache = self.shared_cache;
        let guard = self.shared.get_or_insert_with(|| cache.lock());
        &mut **guard
    }

    /// Whether the node cache is held.
    pub fn is_node_locked(&self) -> bool {
        self.node.is_some()
    }

    /// Whether the shared cache is held.
    pub fn is_shared_locked(&self) -> bool {
        self.shared.is_some()
    }

    /// Release both caches.
    pub fn release_all(&mut self) {
        self.shared = None;
        self.node = None;
    }

    fn keep_only(&mut self, kind: CacheKind) {
        match kind {
            CacheKind::Node => self.shared = None,
            CacheKind::Shared => self.node = None,
        }
    }

    /// Entry behind `entry`, if its cache is held.
    pub fn entry(&self, entry: EntryRef) -> Option<&IconCacheEntry> {
        match entry.cache {
            CacheKind::Node => self.node.as_ref()?.entry(entry.index).ok(),
            CacheKind::Shared => self.shared.as_ref()?.entry(entry.index).ok(),
        }
    }

    fn entry_mut(&mut self, entry: EntryRef) -> Result<&mut IconCacheEntry, IconError> {
        match entry.cache {
            CacheKind::Node => self.node()?.entry_mut(entry.index),
            CacheKind::Shared => self.shared().entry_mut(entry.index),
        }
    }

    /// Whether `entry` is present, held and has a bitmap for `mode` at `size`.
    pub fn have_icon_bitmap(
        &self,
        entry: Option<EntryRef>,
        mode: IconDrawMode,
        size: IconSize,
    ) -> bool {
        let Some(entry) = entry else {
            return false;
        };
        match entry.cache {
            CacheKind::Node => self
                .node
                .as_ref()
                .is_some_and(|node| node.have_icon_bitmap(entry.index, mode, size)),
            CacheKind::Shared => self
                .shared
                .as_ref()
                .is_some_and(|shared| shared.have_icon_bitmap(entry.index, mode, size)),
        }
    }

    /// Follow a node cache alias into the shared cache.
    fn resolve_node_alias(&mut self, index: SlotIndex) -> Result<EntryRef, IconError> {
        let target = self.node()?.entry(index)?.alias_target();
        match target {
            Some(target) => {
                let shared = self.shared();
                Ok(EntryRef::shared(shared.resolve_if_alias(target)))
            }
            None => Ok(EntryRef::node(index)),
        }
    }
}

/// Outcome of a lookup: the entry and the lock on the cache holding it.
///
/// The lock is released when this is dropped.
pub struct Resolved<'a> {
    locks: CacheLocks<'a>,
    entry: EntryRef,
}

impl Resolved<'_> {
    /// Handle of the entry.
    pub fn entry_ref(&self) -> EntryRef {
        self.entry
    }

    /// The entry itself.
    pub fn entry(&self) -> Option<&IconCacheEntry> {
        self.locks.entry(self.entry)
    }

    /// Held locks.
    pub fn locks(&self) -> &CacheLocks<'_> {
        &self.locks
    }

    /// Whether the entry has a bitmap for `mode` at `size`.
    pub fn have_icon_bitmap(&self, mode: IconDrawMode, size: IconSize) -> bool {
        self.locks.have_icon_bitmap(Some(self.entry), mode, size)
    }

    /// Bitmap for `mode` at `size`.
    pub fn bitmap(&self, mode: IconDrawMode, size: IconSize) -> Option<&Bitmap> {
        self.entry()?.icon_for_mode(mode, size)
    }

    /// Draw the entry. Node cache entries are always drawn synchronously.
    pub fn draw(
        &self,
        view: &mut dyn DrawTarget,
        location: Point,
        mode: IconDrawMode,
        size: IconSize,
        asynchronous: bool,
    ) {
        match self.entry.cache {
            CacheKind::Node => {
                if let Some(node) = self.locks.node.as_deref() {
                    node.draw(self.entry.index, view, location, mode, size);
                }
            }
            CacheKind::Shared => {
                if let Some(shared) = self.locks.shared.as_deref() {
                    shared.draw(self.entry.index, view, location, mode, size, asynchronous);
                }
            }
        }
    }

    /// Hand the entry's bitmap to `blit`.
    pub fn sync_draw(
        &self,
        view: &mut dyn DrawTarget,
        location: Point,
        mode: IconDrawMode,
        size: IconSize,
        blit: &mut dyn FnMut(&mut dyn DrawTarget, Point, &Bitmap),
    ) {
        match self.entry.cache {
            CacheKind::Node => {
                if let Some(node) = self.locks.node.as_deref() {
                    node.sync_draw(self.entry.index, view, location, mode, size, blit);
                }
            }
            CacheKind::Shared => {
                if let Some(shared) = self.locks.shared.as_deref() {
                    shared.sync_draw(self.entry.index, view, location, mode, size, blit);
                }
            }
        }
    }
}

/// Sources the cache reads icons from.
#[derive(Clone)]
pub struct IconProviders {
    /// MIME type database.
    pub mime: Arc<dyn MimeDatabase>,
    /// Mounted volumes.
    pub volumes: Arc<dyn VolumeRoster>,
    /// Well-known directories.
    pub well_known: Arc<dyn WellKnownEntries>,
    /// Bundled icons.
    pub resources: Arc<dyn TrackerResources>,
    /// Selected icon transform; built from the settings when `None`.
    pub transform: Option<Arc<dyn IconTransform>>,
}

impl IconProviders {
    /// Bundle the providers, using the default transform.
    pub fn new(
        mime: Arc<dyn MimeDatabase>,
        volumes: Arc<dyn VolumeRoster>,
        well_known: Arc<dyn WellKnownEntries>,
        resources: Arc<dyn TrackerResources>,
    ) -> Self {
        Self {
            mime,
            volumes,
            well_known,
            resources,
            transform: None,
        }
    }

    /// Use a specific transform for selected icons.
    pub fn with_transform(mut self, transform: Arc<dyn IconTransform>) -> Self {
        self.transform = Some(transform);
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct IconRequest {
    mode: IconDrawMode,
    size: IconSize,
}

/// Two-level icon cache.
///
/// Icons stored on individual nodes live in a [NodeIconCache]; icons shared by
/// every file of a type live in a [SharedIconCache]. A lookup walks a fixed
/// chain of sources, remembers on the model which one worked, and guarantees
/// that a drawable bitmap comes out even when every source fails.
///
/// Both caches sit behind their own lock and are always locked node first.
pub struct IconCache {
    node_cache: Mutex<NodeIconCache>,
    shared_cache: Mutex<SharedIconCache>,
    mime: Arc<dyn MimeDatabase>,
    volumes: Arc<dyn VolumeRoster>,
    well_known: Arc<dyn WellKnownEntries>,
    resources: Arc<dyn TrackerResources>,
    transform: Arc<dyn IconTransform>,
}

impl IconCache {
    /// Create an empty cache.
    pub fn new(settings: &IconCacheSettings, providers: IconProviders) -> Result<Self, IconError> {
        log::info!(
            "Creating icon cache (shared table {}, node table {})",
            settings.shared_table_size,
            settings.node_table_size
        );
        let transform = match providers.transform {
            Some(transform) => transform,
            None => Arc::new(settings.highlight_transform()),
        };

        Ok(Self {
            node_cache: Mutex::new(NodeIconCache::new(settings)?),
            shared_cache: Mutex::new(SharedIconCache::new(settings)?),
            mime: providers.mime,
            volumes: providers.volumes,
            well_known: providers.well_known,
            resources: providers.resources,
            transform,
        })
    }

    /// Lock the node cache.
    ///
    /// Do not lock the node cache while holding the shared cache.
    pub fn node_cache(&self) -> MutexGuard<'_, NodeIconCache> {
        self.node_cache.lock()
    }

    /// Lock the shared cache.
    pub fn shared_cache(&self) -> MutexGuard<'_, SharedIconCache> {
        self.shared_cache.lock()
    }

    /// Lock guards that enforce the node-before-shared order.
    pub fn lock_caches(&self) -> CacheLocks<'_> {
        CacheLocks::new(self)
    }

    /// Transform used to build selected icons.
    pub fn transform(&self) -> &dyn IconTransform {
        &*self.transform
    }

    /// Find or build the icon for `model`.
    ///
    /// The returned value holds the lock of the cache the entry lives in.
    /// `permanent` keeps a node entry alive across [IconCache::deleting].
    pub fn resolve<'a>(
        &'a self,
        model: &mut dyn IconModel,
        mode: IconDrawMode,
        size: IconSize,
        permanent: bool,
    ) -> Result<Resolved<'a>, IconError> {
        if !mode.is_materialized() {
            log::warn!("Icon draw mode {:?} is not supported", mode);
            return Err(IconError::UnsupportedMode(mode));
        }

        let request = IconRequest { mode, size };
        let mut locks = CacheLocks::new(self);
        let mut lazy = LazyBitmapAllocator::new(size);
        let mut source = model.icon_from();

        let mut entry = if source.is_unknown() {
            self.lookup_unknown(&mut locks, &*model, &mut source, request, &mut lazy, permanent)?
        } else {
            self.lookup_known(&mut locks, &*model, &mut source, request, &mut lazy, permanent)?
        };
        model.set_icon_from(source);

        if !locks.have_icon_bitmap(entry, mode, size) {
            log::warn!(
                "Icon cache complete miss for {}, falling back on the generic icon",
                model.name()
            );
            locks.release_all();
            entry = self.generic_icon(&mut locks, &*model, &mut source, request, &mut lazy)?;
            if !locks.have_icon_bitmap(entry, mode, size) {
                locks.release_all();
                entry = Some(self.fallback_icon(&mut locks, &*model, request, &mut lazy)?);
            }
            model.set_icon_from(IconSource::Unknown);
        }

        let Some(entry) = entry else {
            return Err(invariant_violation("icon lookup produced no entry"));
        };
        locks.keep_only(entry.cache);
        Ok(Resolved { locks, entry })
    }

    /// Draw the icon of `model`.
    ///
    /// Shared icons may be drawn asynchronously; node icons never are.
    pub fn draw(
        &self,
        model: &mut dyn IconModel,
        view: &mut dyn DrawTarget,
        location: Point,
        mode: IconDrawMode,
        size: IconSize,
        asynchronous: bool,
    ) -> Result<(), IconError> {
        let resolved = self.resolve(model, mode, size, false)?;
        resolved.draw(view, location, mode, size, asynchronous);
        Ok(())
    }

    /// Look up the icon of `model` and hand its bitmap to `blit`.
    pub fn sync_draw(
        &self,
        model: &mut dyn IconModel,
        view: &mut dyn DrawTarget,
        location: Point,
        mode: IconDrawMode,
        size: IconSize,
        blit: &mut dyn FnMut(&mut dyn DrawTarget, Point, &Bitmap),
    ) -> Result<(), IconError> {
        let resolved = self.resolve(model, mode, size, false)?;
        resolved.sync_draw(view, location, mode, size, blit);
        Ok(())
    }

    /// Warm the cache for `model` without drawing.
    pub fn preload(
        &self,
        model: &mut dyn IconModel,
        mode: IconDrawMode,
        size: IconSize,
        permanent: bool,
    ) -> Result<(), IconError> {
        self.resolve(model, mode, size, permanent).map(drop)
    }

    /// Warm the shared cache for a MIME type.
    ///
    /// Fails if the type has no preferred application, or if neither it nor
    /// the type defines an icon.
    pub fn preload_type(
        &self,
        mime_type: &str,
        mode: IconDrawMode,
        size: IconSize,
    ) -> Result<(), IconError> {
        if !mode.is_materialized() {
            return Err(IconError::UnsupportedMode(mode));
        }
        let request = IconRequest { mode, size };
        let mut lazy = LazyBitmapAllocator::new(size);
        let mut shared = self.shared_cache.lock();

        let preferred_app = self
            .mime
            .preferred_app(mime_type)
            .ok_or_else(|| IconError::NotFound(format!("preferred app for {mime_type}")))?;

        if self
            .icon_for_preferred_app(&mut shared, mime_type, &preferred_app, request, &mut lazy, None)?
            .is_some()
        {
            return Ok(());
        }
        self.icon_from_meta_mime(&mut shared, mime_type, request, &mut lazy, None)?
            .map(drop)
            .ok_or_else(|| IconError::NotFound(format!("icon for {mime_type}")))
    }

    /// The node behind `model` is gone; drop its node icon unless it is permanent.
    pub fn deleting(&self, model: &dyn IconModel) {
        let mut node = self.node_cache.lock();
        if model.icon_from() == IconSource::Node {
            node.deleting(model.node_ref());
        }
    }

    /// Evict the node icon of `model`, permanent or not.
    pub fn removing(&self, model: &dyn IconModel) {
        let mut node = self.node_cache.lock();
        if model.icon_from() == IconSource::Node {
            node.removing(model.node_ref());
        }
    }

    /// A view is going away.
    pub fn deleting_view(&self, view: &dyn DrawTarget) {
        self.node_cache.lock().deleting_view(view);
    }

    /// The node icon of `model` changed.
    pub fn icon_changed(&self, model: &mut dyn IconModel) {
        let mut node = self.node_cache.lock();
        if matches!(model.icon_from(), IconSource::Node | IconSource::Volume) {
            node.icon_changed(model.node_ref());
        }
        model.reset_icon_from();
    }

    /// The icon of a MIME type, or of an application for it, changed.
    ///
    /// The matching shared entry and every alias to it are removed from both
    /// caches.
    pub fn icon_changed_type(&self, mime_type: &str, app_signature: &str) -> Result<(), IconError> {
        let mut locks = CacheLocks::new(self);
        locks.node()?;

        let shared = locks.shared();
        let Some(found) = shared.find_item(mime_type, app_signature) else {
            return Ok(());
        };
        let target = shared.resolve_if_alias(found);

        let node_aliases = locks.node()?.remove_aliases_to(target)?;
        let shared = locks.shared();
        let shared_aliases = shared.remove_aliases_to(target)?;
        shared.icon_changed(target)?;
        log::debug!(
            "Icon of ({}, {}) changed; dropped {} node and {} shared aliases",
            mime_type,
            app_signature,
            node_aliases,
            shared_aliases
        );
        Ok(())
    }

    /// Whether `point`, relative to the icon origin, hits the icon of `model`.
    pub fn icon_hit_test(
        &self,
        point: Point,
        model: &mut dyn IconModel,
        mode: IconDrawMode,
        size: IconSize,
    ) -> Result<bool, IconError> {
        let resolved = self.resolve(model, mode, size, false)?;
        Ok(resolved
            .entry()
            .is_some_and(|entry| entry.icon_hit_test(point, mode, size)))
    }

    fn lookup_unknown(
        &self,
        locks: &mut CacheLocks<'_>,
        model: &dyn IconModel,
        source: &mut IconSource,
        request: IconRequest,
        lazy: &mut LazyBitmapAllocator,
        permanent: bool,
    ) -> Result<Option<EntryRef>, IconError> {
        if model.is_volume() {
            let entry = self.node_icon(locks, model, source, request, lazy, permanent)?;
            if locks.have_icon_bitmap(entry, request.mode, request.size) {
                return Ok(entry);
            }
            locks.release_all();
            return self.volume_icon(locks, model, source, request, lazy);
        }

        if model.is_root() {
            return self.root_icon(locks, source, request, lazy);
        }

        if *source == IconSource::Unknown {
            let entry = self.node_icon(locks, model, source, request, lazy, permanent)?;
            if locks.have_icon_bitmap(entry, request.mode, request.size) {
                return Ok(entry);
            }
        }
        self.file_type_icon(locks, model, source, request, lazy)
    }

    fn lookup_known(
        &self,
        locks: &mut CacheLocks<'_>,
        model: &dyn IconModel,
        source: &mut IconSource,
        request: IconRequest,
        lazy: &mut LazyBitmapAllocator,
        permanent: bool,
    ) -> Result<Option<EntryRef>, IconError> {
        if *source == IconSource::Node {
            return self.node_icon(locks, model, source, request, lazy, permanent);
        }

        if *source == IconSource::TrackerSupplied {
            if model.is_root() {
                return self.root_icon(locks, source, request, lazy);
            }
            if let Some(entry) = self.well_known_icon(locks, model, source, request, lazy)? {
                return Ok(Some(entry));
            }
        }

        if matches!(
            *source,
            IconSource::TrackerSupplied | IconSource::TrackerDefault | IconSource::Volume
        ) && model.is_volume()
        {
            let entry = self.node_icon(locks, model, source, request, lazy, permanent)?;
            if locks.have_icon_bitmap(entry, request.mode, request.size) {
                return Ok(entry);
            }
            locks.release_all();
            return self.volume_icon(locks, model, source, request, lazy);
        }

        self.file_type_icon(locks, model, source, request, lazy)
    }

    fn file_type_icon(
        &self,
        locks: &mut CacheLocks<'_>,
        model: &dyn IconModel,
        source: &mut IconSource,
        request: IconRequest,
        lazy: &mut LazyBitmapAllocator,
    ) -> Result<Option<EntryRef>, IconError> {
        let shared = locks.shared();
        if let Some(index) = self.icon_from_file_types(shared, model, source, request, lazy)? {
            return Ok(Some(EntryRef::shared(index)));
        }
        self.generic_icon(locks, model, source, request, lazy)
    }

    fn node_icon(
        &self,
        locks: &mut CacheLocks<'_>,
        model: &dyn IconModel,
        source: &mut IconSource,
        request: IconRequest,
        lazy: &mut LazyBitmapAllocator,
        permanent: bool,
    ) -> Result<Option<EntryRef>, IconError> {
        let IconRequest { mode, size } = request;
        let node_ref = model.node_ref();

        let mut entry = None;
        let found = locks.node()?.find_item(node_ref);
        if let Some(found) = found {
            let resolved = locks.resolve_node_alias(found)?;
            match resolved.cache {
                CacheKind::Shared if locks.have_icon_bitmap(Some(resolved), NORMAL, size) => {
                    locks
                        .entry_mut(resolved)?
                        .ensure_mode(mode, size, &*self.transform, lazy)?;
                    return Ok(Some(resolved));
                }
                CacheKind::Shared => {}
                CacheKind::Node => entry = Some(found),
            }
        }

        let node = locks.node()?;
        if !entry.is_some_and(|index| node.have_icon_bitmap(index, NORMAL, size)) {
            log::debug!("Reading node icon for {}", model.name());
            match lazy.get().and_then(|target| model.node_icon(size, target)) {
                Ok(()) => {
                    let bitmap = lazy.adopt()?;
                    let index = match entry {
                        Some(index) => index,
                        None => node.add_item(node_ref, permanent)?,
                    };
                    if permanent {
                        if let Some(element) = node.element_mut(index) {
                            element.make_permanent();
                        }
                    }
                    node.entry_mut(index)?.set_icon(bitmap, NORMAL, size)?;
                    *source = IconSource::Node;
                    entry = Some(index);
                }
                Err(error) => log::trace!("No node icon for {}: {}", model.name(), error),
            }
        }

        match entry {
            Some(index) => {
                node.entry_mut(index)?
                    .ensure_mode(mode, size, &*self.transform, lazy)?;
                Ok(Some(EntryRef::node(index)))
            }
            None => {
                locks.release_all();
                Ok(None)
            }
        }
    }

    fn volume_icon(
        &self,
        locks: &mut CacheLocks<'_>,
        model: &dyn IconModel,
        source: &mut IconSource,
        request: IconRequest,
        lazy: &mut LazyBitmapAllocator,
    ) -> Result<Option<EntryRef>, IconError> {
        let IconRequest { mode, size } = request;
        let node_ref = model.node_ref();

        let found = locks.node()?.find_item(node_ref);
        let mut entry = None;
        if *source != IconSource::Unknown {
            if let Some(found) = found {
                let resolved = locks.resolve_node_alias(found)?;
                if locks.have_icon_bitmap(Some(resolved), mode, size) {
                    return Ok(Some(resolved));
                }
                entry = Some(resolved);
            }
        }

        if !locks.have_icon_bitmap(entry, NORMAL, size) {
            let device = node_ref.device;
            if self.volumes.is_shared(device) {
                log::debug!("Using the share icon for volume {}", model.name());
                let target = lazy.get()?;
                if let Err(error) = self.resources.icon_resource(ResourceIcon::Share, size, target) {
                    log::debug!("Share icon resource unavailable: {}", error);
                    target.copy_from(&BuiltinResources::render(ResourceIcon::Share, size)?)?;
                }
                let bitmap = lazy.adopt()?;
                let index = Self::node_owner(locks, entry, node_ref)?;
                locks.node()?.entry_mut(index)?.set_icon(bitmap, NORMAL, size)?;
                entry = Some(EntryRef::node(index));
            } else if lazy
                .get()
                .and_then(|target| self.volumes.icon(device, size, target))
                .is_ok()
            {
                log::debug!("Read device icon for volume {}", model.name());
                let bitmap = lazy.adopt()?;
                let index = Self::node_owner(locks, entry, node_ref)?;
                locks.node()?.entry_mut(index)?.set_icon(bitmap, NORMAL, size)?;
                *source = IconSource::Volume;
                entry = Some(EntryRef::node(index));
            } else {
                let from = entry
                    .filter(|entry| entry.cache == CacheKind::Shared)
                    .map(|entry| entry.index);
                let shared = locks.shared();
                entry = self
                    .icon_from_meta_mime(shared, VOLUME_MIME_TYPE, request, lazy, from)?
                    .map(EntryRef::shared);
            }
        }

        match entry {
            Some(entry) => {
                locks
                    .entry_mut(entry)?
                    .ensure_mode(mode, size, &*self.transform, lazy)?;
                Ok(Some(entry))
            }
            None => {
                locks.release_all();
                Ok(None)
            }
        }
    }

    fn node_owner(
        locks: &mut CacheLocks<'_>,
        entry: Option<EntryRef>,
        node_ref: NodeRef,
    ) -> Result<SlotIndex, IconError> {
        match entry {
            Some(EntryRef {
                cache: CacheKind::Node,
                index,
            }) => Ok(index),
            _ => locks.node()?.add_item(node_ref, false),
        }
    }

    fn root_icon(
        &self,
        locks: &mut CacheLocks<'_>,
        source: &mut IconSource,
        request: IconRequest,
        lazy: &mut LazyBitmapAllocator,
    ) -> Result<Option<EntryRef>, IconError> {
        *source = IconSource::TrackerSupplied;
        let found = self.icon_from_meta_mime(locks.shared(), ROOT_MIME_TYPE, request, lazy, None)?;
        if found.is_none() {
            locks.release_all();
        }
        Ok(found.map(EntryRef::shared))
    }

    fn well_known_icon(
        &self,
        locks: &mut CacheLocks<'_>,
        model: &dyn IconModel,
        source: &mut IconSource,
        request: IconRequest,
        lazy: &mut LazyBitmapAllocator,
    ) -> Result<Option<EntryRef>, IconError> {
        let IconRequest { mode, size } = request;
        let Some(well_known) = self.well_known.match_entry(model.node_ref()) else {
            return Ok(None);
        };
        let Some(resource) = well_known.which.resource_icon() else {
            return Ok(None);
        };

        *source = IconSource::TrackerSupplied;
        let file_type = format!("{WELL_KNOWN_TYPE_PREFIX}{}", well_known.name);
        let shared = locks.shared();

        let mut entry = shared
            .find_item(&file_type, "")
            .map(|found| shared.resolve_if_alias(found));
        if let Some(index) = entry {
            if shared.have_icon_bitmap(index, mode, size) {
                return Ok(Some(EntryRef::shared(index)));
            }
        }

        if !entry.is_some_and(|index| shared.have_icon_bitmap(index, NORMAL, size)) {
            log::debug!("Loading {:?} icon for {}", resource, well_known.name);
            let target = lazy.get()?;
            if let Err(error) = self.resources.icon_resource(resource, size, target) {
                log::debug!("Resource {:?} unavailable: {}", resource, error);
                target.copy_from(&BuiltinResources::render(resource, size)?)?;
            }
            let bitmap = lazy.adopt()?;
            let index = match entry {
                Some(index) => index,
                None => shared.add_item(&file_type, "")?,
            };
            shared.entry_mut(index)?.set_icon(bitmap, NORMAL, size)?;
            entry = Some(index);
        }

        let Some(index) = entry else {
            return Ok(None);
        };
        shared
            .entry_mut(index)?
            .ensure_mode(mode, size, &*self.transform, lazy)?;
        Ok(Some(EntryRef::shared(index)))
    }

    fn icon_from_file_types(
        &self,
        shared: &mut SharedIconCache,
        model: &dyn IconModel,
        source: &mut IconSource,
        request: IconRequest,
        lazy: &mut LazyBitmapAllocator,
    ) -> Result<Option<SlotIndex>, IconError> {
        let file_type = model.mime_type();
        let node_app = model.preferred_app_signature();

        if matches!(
            *source,
            IconSource::Unknown | IconSource::UnknownNotFromNode | IconSource::PreferredAppForNode
        ) {
            if let Some(index) =
                self.icon_for_preferred_app(shared, file_type, node_app, request, lazy, None)?
            {
                *source = IconSource::PreferredAppForNode;
                return Ok(Some(index));
            }
            if *source == IconSource::PreferredAppForNode {
                *source = IconSource::Unknown;
            }
        }

        let mut entry = self.icon_from_meta_mime(shared, file_type, request, lazy, None)?;
        if entry.is_none() {
            if let Some(supertype) = self.mime.supertype(file_type) {
                entry = self.icon_from_meta_mime(shared, &supertype, request, lazy, None)?;
            }
        }

        let Some(index) = entry else {
            return Ok(None);
        };
        if node_app.is_empty() {
            *source = IconSource::MetaMime;
        } else {
            // Next time the node's own app key leads straight to this icon.
            let alias = shared.add_item(file_type, node_app)?;
            shared.set_alias_for(alias, index)?;
            *source = IconSource::PreferredAppForNode;
        }
        Ok(Some(index))
    }

    fn icon_from_meta_mime(
        &self,
        shared: &mut SharedIconCache,
        file_type: &str,
        request: IconRequest,
        lazy: &mut LazyBitmapAllocator,
        entry: Option<SlotIndex>,
    ) -> Result<Option<SlotIndex>, IconError> {
        let IconRequest { mode, size } = request;

        let mut entry = entry.or_else(|| shared.find_item(file_type, ""));
        if let Some(found) = entry {
            let resolved = shared.resolve_if_alias(found);
            if shared.have_icon_bitmap(resolved, mode, size) {
                return Ok(Some(resolved));
            }
            entry = Some(resolved);
        }

        if !entry.is_some_and(|index| shared.have_icon_bitmap(index, NORMAL, size)) {
            log::debug!("Reading MIME icon for {}", file_type);
            let read = lazy
                .get()
                .and_then(|target| self.mime.icon(file_type, size, target));
            if let Err(error) = read {
                log::trace!("No MIME icon for {}: {}", file_type, error);
                let Some(preferred_app) = self.mime.preferred_app(file_type) else {
                    return Ok(None);
                };
                let Some(alias_to) =
                    self.icon_for_preferred_app(shared, file_type, &preferred_app, request, lazy, entry)?
                else {
                    return Ok(None);
                };
                if entry.is_none() {
                    let alias = shared.add_item(file_type, "")?;
                    shared.set_alias_for(alias, alias_to)?;
                }
                return Ok(Some(alias_to));
            }

            let bitmap = lazy.adopt()?;
            let index = match entry {
                Some(index) => index,
                None => shared.add_item(file_type, "")?,
            };
            shared.entry_mut(index)?.set_icon(bitmap, NORMAL, size)?;
            entry = Some(index);
        }

        let Some(index) = entry else {
            return Ok(None);
        };
        shared
            .entry_mut(index)?
            .ensure_mode(mode, size, &*self.transform, lazy)?;
        Ok(Some(index))
    }

    fn icon_for_preferred_app(
        &self,
        shared: &mut SharedIconCache,
        file_type: &str,
        preferred_app: &str,
        request: IconRequest,
        lazy: &mut LazyBitmapAllocator,
        entry: Option<SlotIndex>,
    ) -> Result<Option<SlotIndex>, IconError> {
        let IconRequest { mode, size } = request;
        if preferred_app.is_empty() {
            return Ok(None);
        }

        let mut entry = entry;
        if entry.is_none() {
            if let Some(found) = shared.find_item(file_type, preferred_app) {
                let resolved = shared.resolve_if_alias(found);
                if shared.have_icon_bitmap(resolved, mode, size) {
                    return Ok(Some(resolved));
                }
                entry = Some(resolved);
            }
        }

        if !entry.is_some_and(|index| shared.have_icon_bitmap(index, NORMAL, size)) {
            log::debug!("Reading icon {} declares for {}", preferred_app, file_type);
            let read = lazy.get().and_then(|target| {
                self.mime
                    .icon_for_type(preferred_app, &file_type.to_ascii_lowercase(), size, target)
            });
            if let Err(error) = read {
                log::trace!("{} has no icon for {}: {}", preferred_app, file_type, error);
                return Ok(None);
            }

            let bitmap = lazy.adopt()?;
            let index = match entry {
                Some(index) => index,
                None => shared.add_item(file_type, preferred_app)?,
            };
            shared.entry_mut(index)?.set_icon(bitmap, NORMAL, size)?;
            entry = Some(index);
        }

        let Some(index) = entry else {
            return Ok(None);
        };
        shared
            .entry_mut(index)?
            .ensure_mode(mode, size, &*self.transform, lazy)?;
        Ok(Some(index))
    }

    fn generic_icon(
        &self,
        locks: &mut CacheLocks<'_>,
        model: &dyn IconModel,
        source: &mut IconSource,
        request: IconRequest,
        lazy: &mut LazyBitmapAllocator,
    ) -> Result<Option<EntryRef>, IconError> {
        let found = self.icon_from_meta_mime(locks.shared(), FILE_MIME_TYPE, request, lazy, None)?;
        let Some(index) = found else {
            locks.release_all();
            return Ok(None);
        };

        let shared = locks.shared();
        let file_type = model.mime_type();
        let app_signature = model.preferred_app_signature();
        let cached = shared
            .find_item(file_type, app_signature)
            .map(|found| shared.resolve_if_alias(found));
        if cached != Some(index) {
            let alias = shared.add_item(file_type, app_signature)?;
            shared.set_alias_for(alias, index)?;
        }
        *source = IconSource::MetaMime;
        Ok(Some(EntryRef::shared(index)))
    }

    fn fallback_icon(
        &self,
        locks: &mut CacheLocks<'_>,
        model: &dyn IconModel,
        request: IconRequest,
        lazy: &mut LazyBitmapAllocator,
    ) -> Result<EntryRef, IconError> {
        let IconRequest { mode, size } = request;
        let shared = locks.shared();
        let index = shared.add_item(model.mime_type(), model.preferred_app_signature())?;

        let target = lazy.get()?;
        if let Err(error) = self.resources.icon_resource(ResourceIcon::File, size, target) {
            log::warn!("Generic file icon resource unavailable: {}", error);
            target.copy_from(&BuiltinResources::render(ResourceIcon::File, size)?)?;
        }

        let entry = shared.entry_mut(index)?;
        entry.set_icon(lazy.adopt()?, NORMAL, size)?;
        if !entry.ensure_mode(mode, size, &*self.transform, lazy)? {
            // The transform refused; draw the plain icon for this mode.
            if let Some(normal) = entry.icon_for_mode(NORMAL, size).cloned() {
                entry.set_icon(normal, mode, size)?;
            }
        }
        Ok(EntryRef::shared(index))
    }
}
