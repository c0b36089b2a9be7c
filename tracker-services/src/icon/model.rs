// SPDX-License-Identifier: LGPL-3.0-only
//! The file model the icon cache draws icons for.

use std::cell::Cell;
use std::collections::HashMap;

use crate::icon::bitmap::{Bitmap, IconSize};
use crate::icon::error::IconError;
use crate::icon::mode::IconSource;
use crate::icon::node::NodeRef;
use crate::icon::provider::FILE_MIME_TYPE;

/// A file as seen by the icon cache.
///
/// The model remembers where its icon was last found so the next lookup can
/// take a shortcut.
pub trait IconModel {
    /// Display name, used in log messages.
    fn name(&self) -> &str;

    /// MIME type of the file.
    fn mime_type(&self) -> &str;

    /// Signature of the application the file itself prefers; empty if none.
    fn preferred_app_signature(&self) -> &str;

    /// Device and inode of the file.
    fn node_ref(&self) -> NodeRef;

    /// Whether the file is the root of a mounted volume.
    fn is_volume(&self) -> bool;

    /// Whether the file is the desktop root.
    fn is_root(&self) -> bool;

    /// Whether the file is a directory.
    fn is_directory(&self) -> bool;

    /// Whether the file is an application.
    fn is_executable(&self) -> bool;

    /// Where the icon was last found.
    fn icon_from(&self) -> IconSource;

    /// Remember where the icon was found.
    fn set_icon_from(&mut self, source: IconSource);

    /// Forget where the icon was found.
    fn reset_icon_from(&mut self) {
        self.set_icon_from(IconSource::Unknown);
    }

    /// Fill `target` with the icon stored on the node.
    ///
    /// Executables answer with their application icon.
    fn node_icon(&self, size: IconSize, target: &mut Bitmap) -> Result<(), IconError>;
}

/// Kind of node a [StaticModel] stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelKind {
    /// Regular file.
    #[default]
    File,
    /// Directory.
    Directory,
    /// Application.
    Executable,
    /// Root of a mounted volume.
    Volume,
    /// Desktop root.
    Root,
}

/// [IconModel] backed by plain fields.
#[derive(Debug)]
pub struct StaticModel {
    name: String,
    mime_type: String,
    preferred_app: String,
    node: NodeRef,
    kind: ModelKind,
    icon_from: IconSource,
    node_icons: HashMap<u32, Bitmap>,
    app_icons: HashMap<u32, Bitmap>,
    node_reads: Cell<usize>,
}

impl StaticModel {
    /// Regular file of `mime_type`.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, node: NodeRef) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            preferred_app: String::new(),
            node,
            kind: ModelKind::File,
            icon_from: IconSource::Unknown,
            node_icons: HashMap::new(),
            app_icons: HashMap::new(),
            node_reads: Cell::new(0),
        }
    }

    /// Root of the volume on `device`.
    pub fn volume(name: impl Into<String>, device: i32) -> Self {
        Self::new(name, crate::icon::provider::VOLUME_MIME_TYPE, NodeRef::new(device, 1))
            .with_kind(ModelKind::Volume)
    }

    /// The desktop root.
    pub fn root() -> Self {
        Self::new("/", crate::icon::provider::ROOT_MIME_TYPE, NodeRef::new(0, 1))
            .with_kind(ModelKind::Root)
    }

    /// Set the node kind.
    pub fn with_kind(mut self, kind: ModelKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the node's own preferred application.
    pub fn with_preferred_app(mut self, signature: impl Into<String>) -> Self {
        self.preferred_app = signature.into();
        self
    }

    /// Store an icon on the node; its width picks the size.
    pub fn with_node_icon(mut self, bitmap: Bitmap) -> Self {
        self.node_icons.insert(bitmap.width(), bitmap);
        self
    }

    /// Store the application icon of an executable; its width picks the size.
    pub fn with_app_icon(mut self, bitmap: Bitmap) -> Self {
        self.app_icons.insert(bitmap.width(), bitmap);
        self
    }

    /// How often the node icon was read.
    pub fn node_reads(&self) -> usize {
        self.node_reads.get()
    }
}

impl Default for StaticModel {
    fn default() -> Self {
        Self::new("", FILE_MIME_TYPE, NodeRef::default())
    }
}

impl IconModel for StaticModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn preferred_app_signature(&self) -> &str {
        &self.preferred_app
    }

    fn node_ref(&self) -> NodeRef {
        self.node
    }

    fn is_volume(&self) -> bool {
        self.kind == ModelKind::Volume
    }

    fn is_root(&self) -> bool {
        self.kind == ModelKind::Root
    }

    fn is_directory(&self) -> bool {
        matches!(
            self.kind,
            ModelKind::Directory | ModelKind::Volume | ModelKind::Root
        )
    }

    fn is_executable(&self) -> bool {
        self.kind == ModelKind::Executable
    }

    fn icon_from(&self) -> IconSource {
        self.icon_from
    }

    fn set_icon_from(&mut self, source: IconSource) {
        self.icon_from = source;
    }

    fn node_icon(&self, size: IconSize, target: &mut Bitmap) -> Result<(), IconError> {
        self.node_reads.set(self.node_reads.get() + 1);
        let icons = if self.is_executable() {
            &self.app_icons
        } else {
            &self.node_icons
        };
        match icons.get(&size.pixels()) {
            Some(bitmap) => target.copy_from(bitmap),
            None => Err(IconError::NotFound(format!("{} @ {}", self.name, size.pixels()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executables_read_app_icons() {
        let app_icon = Bitmap::solid(IconSize::MINI, [1, 2, 3, 4]).unwrap();
        let model = StaticModel::new("App", "application/x-vnd.Be-elfexecutable", NodeRef::new(1, 2))
            .with_kind(ModelKind::Executable)
            .with_app_icon(app_icon.clone());

        let mut target = Bitmap::square(IconSize::MINI, crate::icon::bitmap::ColorSpace::Rgba32).unwrap();
        model.node_icon(IconSize::MINI, &mut target).unwrap();
        assert_eq!(target, app_icon);
        assert_eq!(model.node_reads(), 1);
    }

    #[test]
    fn missing_node_icon_is_reported() {
        let model = StaticModel::new("notes", "text/plain", NodeRef::new(1, 3));
        let mut target = Bitmap::square(IconSize::MINI, crate::icon::bitmap::ColorSpace::Rgba32).unwrap();
        assert!(matches!(
            model.node_icon(IconSize::MINI, &mut target),
            Err(IconError::NotFound(_))
        ));
    }
}
