// SPDX-License-Identifier: LGPL-3.0-only
//! Collaborators the icon cache reads icons from.
//!
//! The cache never touches a filesystem or MIME database directly. Each source
//! sits behind one of these traits; a provider fills the bitmap it is handed
//! or returns an error when it has nothing to offer.

use crate::icon::bitmap::{Bitmap, IconSize};
use crate::icon::error::IconError;
use crate::icon::node::NodeRef;

/// Type of files with no better type.
pub const FILE_MIME_TYPE: &str = "application/octet-stream";

/// Type of mounted volumes.
pub const VOLUME_MIME_TYPE: &str = "application/x-vnd.Be-volume";

/// Type of the desktop root.
pub const ROOT_MIME_TYPE: &str = "application/x-vnd.Be-root";

/// Prefix of the shared cache type under which well-known directory icons are stored.
pub const WELL_KNOWN_TYPE_PREFIX: &str = "tracker/active_";

/// MIME type database.
pub trait MimeDatabase: Send + Sync {
    /// Fill `target` with the icon `mime_type` defines.
    fn icon(&self, mime_type: &str, size: IconSize, target: &mut Bitmap) -> Result<(), IconError>;

    /// Fill `target` with the icon the application `app_signature` declares
    /// for documents of `file_type`.
    fn icon_for_type(
        &self,
        app_signature: &str,
        file_type: &str,
        size: IconSize,
        target: &mut Bitmap,
    ) -> Result<(), IconError>;

    /// Signature of the application preferred for `mime_type`.
    fn preferred_app(&self, mime_type: &str) -> Option<String>;

    /// Supertype of `mime_type`, or `None` if it already is one.
    fn supertype(&self, mime_type: &str) -> Option<String> {
        let parsed: mime::Mime = mime_type.parse().ok()?;
        Some(parsed.type_().as_str().to_string())
    }
}

/// Mounted volumes.
pub trait VolumeRoster: Send + Sync {
    /// Whether the volume on `device` is shared over the network.
    fn is_shared(&self, device: i32) -> bool;

    /// Fill `target` with the device icon of the volume on `device`.
    fn icon(&self, device: i32, size: IconSize, target: &mut Bitmap) -> Result<(), IconError>;
}

/// Directories with a dedicated icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownDirectory {
    /// The boot volume.
    BootDisk,
    /// The system directory.
    System,
    /// The system directory as mounted on older layouts.
    Beos,
    /// The user's home.
    Home,
    /// System fonts.
    SystemFonts,
    /// Non-packaged system fonts.
    SystemNonpackagedFonts,
    /// User fonts.
    UserFonts,
    /// Non-packaged user fonts.
    UserNonpackagedFonts,
    /// System applications.
    SystemApps,
    /// Applications.
    Apps,
    /// Deskbar application links.
    UserDeskbarApps,
    /// System preferences.
    SystemPreferences,
    /// Preferences.
    Preferences,
    /// Deskbar preference links.
    UserDeskbarPreferences,
    /// Mail.
    UserMail,
    /// Saved queries.
    UserQueries,
    /// System development files.
    SystemDevelop,
    /// Non-packaged development files.
    SystemNonpackagedDevelop,
    /// Deskbar development links.
    UserDeskbarDevelop,
    /// User configuration.
    UserConfig,
    /// People files.
    UserPeople,
    /// Downloads.
    UserDownloads,
}

impl WellKnownDirectory {
    /// Resource icon drawn for this directory, if it has one.
    pub fn resource_icon(self) -> Option<ResourceIcon> {
        match self {
            Self::BootDisk => Some(ResourceIcon::BootVolume),
            Self::Beos => Some(ResourceIcon::BeosFolder),
            Self::Home => Some(ResourceIcon::HomeDir),
            Self::SystemFonts
            | Self::SystemNonpackagedFonts
            | Self::UserFonts
            | Self::UserNonpackagedFonts => Some(ResourceIcon::FontDir),
            Self::SystemApps | Self::Apps | Self::UserDeskbarApps => Some(ResourceIcon::AppsDir),
            Self::SystemPreferences | Self::Preferences | Self::UserDeskbarPreferences => {
                Some(ResourceIcon::PrefsDir)
            }
            Self::UserMail => Some(ResourceIcon::MailDir),
            Self::UserQueries => Some(ResourceIcon::QueryDir),
            Self::SystemDevelop | Self::SystemNonpackagedDevelop | Self::UserDeskbarDevelop => {
                Some(ResourceIcon::DevelopDir)
            }
            Self::UserConfig => Some(ResourceIcon::ConfigDir),
            Self::UserPeople => Some(ResourceIcon::PersonDir),
            Self::UserDownloads => Some(ResourceIcon::DownloadDir),
            Self::System => None,
        }
    }
}

/// A node recognized as a well-known directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WellKnownEntry {
    /// The directory node.
    pub node: NodeRef,
    /// Which directory it is.
    pub which: WellKnownDirectory,
    /// Short name used to key its icon.
    pub name: String,
}

/// Lookup of well-known directories.
pub trait WellKnownEntries: Send + Sync {
    /// The well-known entry for `node`, if any.
    fn match_entry(&self, node: NodeRef) -> Option<WellKnownEntry>;
}

/// Icons bundled with the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceIcon {
    /// Generic file; the last resort of every lookup.
    File,
    /// Shared network volume.
    Share,
    /// Boot volume.
    BootVolume,
    /// System folder.
    BeosFolder,
    /// Home folder.
    HomeDir,
    /// Fonts folder.
    FontDir,
    /// Applications folder.
    AppsDir,
    /// Preferences folder.
    PrefsDir,
    /// Mail folder.
    MailDir,
    /// Queries folder.
    QueryDir,
    /// Development folder.
    DevelopDir,
    /// Configuration folder.
    ConfigDir,
    /// People folder.
    PersonDir,
    /// Downloads folder.
    DownloadDir,
}

impl ResourceIcon {
    /// Every resource icon.
    pub const ALL: [ResourceIcon; 14] = [
        Self::File,
        Self::Share,
        Self::BootVolume,
        Self::BeosFolder,
        Self::HomeDir,
        Self::FontDir,
        Self::AppsDir,
        Self::PrefsDir,
        Self::MailDir,
        Self::QueryDir,
        Self::DevelopDir,
        Self::ConfigDir,
        Self::PersonDir,
        Self::DownloadDir,
    ];

    /// File name stem of the icon.
    pub fn name(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Share => "share",
            Self::BootVolume => "boot-volume",
            Self::BeosFolder => "system-folder",
            Self::HomeDir => "home",
            Self::FontDir => "fonts",
            Self::AppsDir => "apps",
            Self::PrefsDir => "preferences",
            Self::MailDir => "mail",
            Self::QueryDir => "queries",
            Self::DevelopDir => "develop",
            Self::ConfigDir => "config",
            Self::PersonDir => "people",
            Self::DownloadDir => "downloads",
        }
    }
}

/// Application-bundled icon resources.
pub trait TrackerResources: Send + Sync {
    /// Fill `target` with the resource icon `id`.
    fn icon_resource(
        &self,
        id: ResourceIcon,
        size: IconSize,
        target: &mut Bitmap,
    ) -> Result<(), IconError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nothing;

    impl MimeDatabase for Nothing {
        fn icon(&self, mime_type: &str, _: IconSize, _: &mut Bitmap) -> Result<(), IconError> {
            Err(IconError::NotFound(mime_type.to_string()))
        }

        fn icon_for_type(
            &self,
            app_signature: &str,
            _: &str,
            _: IconSize,
            _: &mut Bitmap,
        ) -> Result<(), IconError> {
            Err(IconError::NotFound(app_signature.to_string()))
        }

        fn preferred_app(&self, _: &str) -> Option<String> {
            None
        }
    }

    #[test]
    fn supertype_of_full_and_bare_types() {
        assert_eq!(Nothing.supertype("text/plain"), Some("text".to_string()));
        assert_eq!(
            Nothing.supertype(VOLUME_MIME_TYPE),
            Some("application".to_string())
        );
        assert_eq!(Nothing.supertype("text"), None);
    }

    #[test]
    fn system_directory_has_no_icon() {
        assert_eq!(WellKnownDirectory::System.resource_icon(), None);
        assert_eq!(
            WellKnownDirectory::UserFonts.resource_icon(),
            Some(ResourceIcon::FontDir)
        );
    }
}
