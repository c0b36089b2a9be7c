// SPDX-License-Identifier: LGPL-3.0-only
pub mod icon;
pub mod settings;

// Re-export commonly used types from icon and settings
pub use icon::{IconCache, IconDrawMode, IconError, IconModel, IconProviders, IconSize, IconSource};
pub use settings::{IconCacheSettings, SettingsRegistry};
