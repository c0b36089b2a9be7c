// SPDX-License-Identifier: LGPL-3.0-only
use anyhow::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use xdg::BaseDirectories;

use crate::icon::{
    HighlightTransform, Palette, DEFAULT_HIGHLIGHT_TINT, DEFAULT_RETIRE_BATCH,
    DEFAULT_RETIRE_THRESHOLD, DEFAULT_SELECTED_BRIGHTNESS,
};

/// File the icon cache settings are read from.
pub const SETTINGS_FILE: &str = "icon_cache.toml";

/// Tuning knobs of the icon cache.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IconCacheSettings {
    /// Minimum bucket count of the shared cache.
    pub shared_table_size: usize,
    /// Minimum bucket count of the node cache.
    pub node_table_size: usize,
    /// Slots added whenever a cache's storage grows.
    pub arena_chunk: usize,
    /// Retired bitmap count that triggers a release.
    pub retire_threshold: usize,
    /// Oldest retired bitmaps released at once.
    pub retire_batch: usize,
    /// Tint used to build the 8-bit highlight table.
    pub highlight_tint: f32,
    /// Brightness of selected 32-bit icons, out of 256.
    pub selected_brightness: u16,
}

impl Default for IconCacheSettings {
    fn default() -> Self {
        Self {
            shared_table_size: 256,
            node_table_size: 100,
            arena_chunk: tracker_core::IndexStableArena::<()>::DEFAULT_CHUNK,
            retire_threshold: DEFAULT_RETIRE_THRESHOLD,
            retire_batch: DEFAULT_RETIRE_BATCH,
            highlight_tint: DEFAULT_HIGHLIGHT_TINT,
            selected_brightness: DEFAULT_SELECTED_BRIGHTNESS,
        }
    }
}

impl IconCacheSettings {
    /// Parse a complete settings file; missing keys keep their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Transform for selected icons configured by these settings.
    pub fn highlight_transform(&self) -> HighlightTransform {
        HighlightTransform::new(
            &Palette::system(),
            self.highlight_tint,
            self.selected_brightness,
        )
    }
}

/// One settings file; every key is optional so files can be layered.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsFile {
    pub shared_table_size: Option<usize>,
    pub node_table_size: Option<usize>,
    pub arena_chunk: Option<usize>,
    pub retire_threshold: Option<usize>,
    pub retire_batch: Option<usize>,
    pub highlight_tint: Option<f32>,
    pub selected_brightness: Option<u16>,
    /// Any other keys are captured here
    #[serde(flatten)]
    pub other: HashMap<String, toml::Value>,
}

/// Registry layering settings files over the defaults.
pub struct SettingsRegistry {
    settings: IconCacheSettings,
    other: HashMap<String, toml::Value>,
}

impl SettingsRegistry {
    /// Create a registry and load settings from the standard locations.
    pub fn new() -> Result<Self> {
        let mut registry = Self::with_defaults();
        registry.load()?;
        Ok(registry)
    }

    /// Registry holding only the defaults.
    pub fn with_defaults() -> Self {
        Self {
            settings: IconCacheSettings::default(),
            other: HashMap::new(),
        }
    }

    /// Load settings from standard locations in precedence order.
    ///
    /// Order (later overrides earlier):
    /// 1. System Data: /usr/share/tracker/icon_cache.toml (and XDG_DATA_DIRS)
    /// 2. System Config: /etc/xdg/tracker/icon_cache.toml (and XDG_CONFIG_DIRS)
    /// 3. User Config: ~/.config/tracker/icon_cache.toml (XDG_CONFIG_HOME)
    pub fn load(&mut self) -> Result<()> {
        let xdg_dirs = BaseDirectories::with_prefix("tracker")?;

        // 1. Load from system data directories
        for path in xdg_dirs.find_data_files(SETTINGS_FILE).rev() {
            self.load_file(&path);
        }

        // 2. Load from system config directories
        for path in xdg_dirs.find_config_files(SETTINGS_FILE).rev() {
            self.load_file(&path);
        }

        // 3. Load from user config directory
        if let Some(user_config_path) = xdg_dirs.find_config_file(SETTINGS_FILE) {
            self.load_file(&user_config_path);
        } else {
            let user_config_path = xdg_dirs.get_config_home().join(SETTINGS_FILE);
            if user_config_path.exists() {
                self.load_file(&user_config_path);
            }
        }

        Ok(())
    }

    fn load_file(&mut self, path: &Path) {
        log::info!("Loading icon cache settings from: {:?}", path);
        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<SettingsFile>(&content) {
                Ok(loaded) => self.merge(loaded),
                Err(e) => {
                    log::error!("Failed to parse settings file {:?}: {}", path, e);
                },
            },
            Err(e) => {
                log::warn!("Failed to read settings file {:?}: {}", path, e);
            },
        }
    }

    /// Merge a loaded file into the current settings.
    pub fn merge(&mut self, other: SettingsFile) {
        let settings = &mut self.settings;
        if let Some(size) = other.shared_table_size {
            settings.shared_table_size = size;
        }
        if let Some(size) = other.node_table_size {
            settings.node_table_size = size;
        }
        if let Some(chunk) = other.arena_chunk {
            settings.arena_chunk = chunk.max(1);
        }
        if let Some(threshold) = other.retire_threshold {
            settings.retire_threshold = threshold;
        }
        if let Some(batch) = other.retire_batch {
            settings.retire_batch = batch.max(1);
        }
        if let Some(tint) = other.highlight_tint {
            settings.highlight_tint = tint;
        }
        if let Some(brightness) = other.selected_brightness {
            settings.selected_brightness = brightness;
        }

        // Other
        self.other.extend(other.other);
    }

    /// Current settings.
    pub fn get(&self) -> &IconCacheSettings {
        &self.settings
    }

    /// Keys the registry does not know about.
    pub fn other(&self) -> &HashMap<String, toml::Value> {
        &self.other
    }

    /// Load settings from custom paths, in order.
    pub fn load_from_paths(&mut self, paths: &[PathBuf]) -> Vec<Result<()>> {
        paths
            .iter()
            .map(|path| {
                let content = fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("Failed to read settings file {:?}: {}", path, e))?;
                let loaded: SettingsFile = toml::from_str(&content)
                    .map_err(|e| anyhow::anyhow!("Failed to parse settings file {:?}: {}", path, e))?;
                self.merge(loaded);
                Ok(())
            })
            .collect()
    }

    /// Reset to defaults and re-run the full load.
    pub fn reload(&mut self) -> Result<()> {
        *self = Self::with_defaults();
        self.load()
    }
}

impl Default for SettingsRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = IconCacheSettings::default();
        assert_eq!(settings.shared_table_size, 256);
        assert_eq!(settings.node_table_size, 100);
        assert_eq!(settings.retire_threshold, 10 * 1024);
        assert_eq!(settings.retire_batch, 512);
        assert_eq!(settings.selected_brightness, 168);
    }

    #[test]
    fn test_from_toml_keeps_missing_defaults() {
        let settings = IconCacheSettings::from_toml("retire_batch = 64\n").unwrap();
        assert_eq!(settings.retire_batch, 64);
        assert_eq!(settings.retire_threshold, DEFAULT_RETIRE_THRESHOLD);
        assert!(IconCacheSettings::from_toml("retire_batch = \"many\"").is_err());
    }

    #[test]
    fn test_merge_later_files_override() {
        let mut registry = SettingsRegistry::with_defaults();
        registry.merge(toml::from_str("node_table_size = 50\nretire_batch = 8").unwrap());
        registry.merge(toml::from_str("node_table_size = 70\ncolor = \"blue\"").unwrap());

        assert_eq!(registry.get().node_table_size, 70);
        assert_eq!(registry.get().retire_batch, 8);
        assert_eq!(registry.get().shared_table_size, 256);
        assert!(registry.other().contains_key("color"));
    }

    #[test]
    fn test_load_from_paths_reports_each_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join(SETTINGS_FILE);
        fs::write(&good, "shared_table_size = 1000\nhighlight_tint = 1.5\n").unwrap();
        let bad = dir.path().join("broken.toml");
        fs::write(&bad, "shared_table_size = [").unwrap();
        let missing = dir.path().join("missing.toml");

        let mut registry = SettingsRegistry::with_defaults();
        let results = registry.load_from_paths(&[good, bad, missing]);

        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_err());
        assert_eq!(registry.get().shared_table_size, 1000);
        assert_eq!(registry.get().highlight_tint, 1.5);
    }
}
