// SPDX-License-Identifier: LGPL-3.0-only
//! Draw modes and icon sources.

use bitflags::bitflags;

bitflags! {
    /// Rendering variant requested for an icon.
    ///
    /// Only [IconDrawMode::NORMAL_ICON] and [IconDrawMode::SELECTED_ICON] are
    /// materialized as bitmaps. The remaining flags are reserved: the cache
    /// reports them as unsupported instead of drawing something else.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct IconDrawMode: u32 {
        /// Tinted selection highlight.
        const SELECTED = 0x01;
        /// The owning window is not focused.
        const NOT_FOCUSED = 0x02;
        /// Open folder or trash.
        const OPEN = 0x04;
        /// Full trash.
        const NOT_EMPTY = 0x08;
        /// Inactive navigation menu entry.
        const DISABLED = 0x10;
        /// Active home directory or boot volume.
        const ACTIVE = 0x20;
        /// Symbolic link.
        const LINK = 0x40;
        /// Tracker specific variant.
        const TRACKER_SPECIALIZED = 0x80;
    }
}

impl IconDrawMode {
    /// Plain icon.
    pub const NORMAL_ICON: Self = Self::empty();
    /// Selected icon.
    pub const SELECTED_ICON: Self = Self::SELECTED;
    /// Selected icon in an unfocused window.
    pub const SELECTED_IN_BACKGROUND: Self = Self::SELECTED.union(Self::NOT_FOCUSED);
    /// Open container.
    pub const OPEN_ICON: Self = Self::OPEN;
    /// Selected open container.
    pub const OPEN_SELECTED: Self = Self::SELECTED.union(Self::OPEN);
    /// Selected open container in an unfocused window.
    pub const OPEN_SELECTED_IN_BACKGROUND: Self =
        Self::SELECTED.union(Self::OPEN).union(Self::NOT_FOCUSED);
    /// Full container.
    pub const FULL_ICON: Self = Self::NOT_EMPTY;
    /// Selected full container.
    pub const FULL_SELECTED: Self = Self::NOT_EMPTY.union(Self::SELECTED);
    /// Open full container.
    pub const OPEN_FULL: Self = Self::NOT_EMPTY.union(Self::OPEN);
    /// Disabled icon.
    pub const DIMMED_ICON: Self = Self::DISABLED;
    /// Active icon.
    pub const ACTIVE_ICON: Self = Self::ACTIVE;
    /// Link icon.
    pub const LINK_ICON: Self = Self::LINK;

    /// Whether the cache stores bitmaps for this mode.
    pub fn is_materialized(self) -> bool {
        self == Self::NORMAL_ICON || self == Self::SELECTED_ICON
    }

    /// Whether this mode can be synthesized from another one.
    pub fn can_construct(self) -> bool {
        self == Self::SELECTED_ICON
    }

    /// Mode to synthesize this one from.
    pub fn alternate_for_constructing(self) -> Option<Self> {
        self.contains(Self::SELECTED).then_some(Self::NORMAL_ICON)
    }
}

/// Where a model's icon was last found.
///
/// Kept on the model as a hint so the next lookup can skip straight to the
/// source that worked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IconSource {
    /// Not resolved yet.
    #[default]
    Unknown,
    /// Not resolved yet, but known not to come from the node itself.
    UnknownNotFromNode,
    /// Generic icon supplied by Tracker.
    TrackerDefault,
    /// Special icon supplied by Tracker (root, well-known directories).
    TrackerSupplied,
    /// Icon of the MIME type.
    MetaMime,
    /// Icon the type's preferred application declares for it.
    PreferredAppForType,
    /// Icon the node's own preferred application declares for its type.
    PreferredAppForNode,
    /// Icon of the volume device.
    Volume,
    /// Icon stored on the node.
    Node,
}

impl IconSource {
    /// Whether a full lookup is needed.
    pub fn is_unknown(self) -> bool {
        matches!(self, Self::Unknown | Self::UnknownNotFromNode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_normal_and_selected_are_materialized() {
        assert!(IconDrawMode::NORMAL_ICON.is_materialized());
        assert!(IconDrawMode::SELECTED_ICON.is_materialized());
        assert!(!IconDrawMode::OPEN_SELECTED.is_materialized());
        assert!(!IconDrawMode::LINK_ICON.is_materialized());
    }

    #[test]
    fn selected_variants_construct_from_normal() {
        assert_eq!(
            IconDrawMode::OPEN_SELECTED.alternate_for_constructing(),
            Some(IconDrawMode::NORMAL_ICON)
        );
        assert_eq!(IconDrawMode::OPEN_ICON.alternate_for_constructing(), None);
        assert!(IconDrawMode::SELECTED_ICON.can_construct());
        assert!(!IconDrawMode::FULL_SELECTED.can_construct());
    }
}
