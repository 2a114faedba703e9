//! Export settings
//!
//! Stored as a JSON file. Every field has a default so a partial file (or no
//! file at all) is fine.

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Deepest outline level a conversation heading may start at
pub const MAX_BASE_LEVEL: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Sender label for the backup owner's own messages
    #[serde(default = "default_self_name")]
    pub self_name: String,
    /// chrono format string for message headings (rendered in UTC)
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
    /// Outline level of conversation headings; messages sit one level below
    #[serde(default = "default_base_level")]
    pub base_level: usize,
    /// Text before the backlink to a quoted message
    #[serde(default = "default_reply_prefix")]
    pub reply_prefix: String,
    /// Title of the per-message replies subsection
    #[serde(default = "default_replies_heading")]
    pub replies_heading: String,
}

fn default_self_name() -> String {
    "Me".to_string()
}

fn default_timestamp_format() -> String {
    "%Y-%m-%d %H:%M".to_string()
}

fn default_base_level() -> usize {
    1
}

fn default_reply_prefix() -> String {
    "In reply to:".to_string()
}

fn default_replies_heading() -> String {
    "Replies".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            self_name: default_self_name(),
            timestamp_format: default_timestamp_format(),
            base_level: default_base_level(),
            reply_prefix: default_reply_prefix(),
            replies_heading: default_replies_heading(),
        }
    }
}

impl Settings {
    /// Load settings from a specific file. Missing or malformed files are errors.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings.normalized())
    }

    /// Resolve settings for a run.
    ///
    /// An explicit path must load. Otherwise the default location is tried and
    /// anything wrong with it falls back to built-in defaults with a warning.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            log::info!("[Settings] Loading {:?}", path);
            return Self::load(path);
        }

        let path = match default_path() {
            Some(p) if p.exists() => p,
            _ => return Ok(Settings::default()),
        };

        match Self::load(&path) {
            Ok(settings) => {
                log::info!("[Settings] Loaded {:?}", path);
                Ok(settings)
            }
            Err(e) => {
                log::warn!("[Settings] Ignoring {:?}: {}", path, e);
                Ok(Settings::default())
            }
        }
    }

    /// Save settings to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, content)?;
        Ok(())
    }

    /// Write the built-in defaults to `path` (or the default location).
    /// An existing file is only replaced with `force`.
    pub fn init(path: Option<&Path>, force: bool) -> Result<PathBuf> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_path().ok_or(Error::NoConfigDir)?,
        };
        if path.exists() && !force {
            return Err(Error::ConfigExists(path));
        }
        Settings::default().save(&path)?;
        log::info!("[Settings] Wrote defaults to {:?}", path);
        Ok(path)
    }

    /// Clamp `base_level` and replace an unusable `timestamp_format` with the default
    pub fn normalized(mut self) -> Self {
        self.base_level = self.base_level.clamp(1, MAX_BASE_LEVEL);
        if !is_valid_timestamp_format(&self.timestamp_format) {
            log::warn!("[Settings] Invalid timestamp_format {:?}, using default", self.timestamp_format);
            self.timestamp_format = default_timestamp_format();
        }
        self
    }
}

/// A chrono format string that would fail at render time is rejected up front
fn is_valid_timestamp_format(format: &str) -> bool {
    StrftimeItems::new(format).all(|item| !matches!(item, Item::Error))
}

/// `<config dir>/signal2org/settings.json`, if the platform has a config dir
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("signal2org").join("settings.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "self_name": "Ekats" }"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.self_name, "Ekats");
        assert_eq!(settings.timestamp_format, "%Y-%m-%d %H:%M");
        assert_eq!(settings.base_level, 1);
        assert_eq!(settings.replies_heading, "Replies");
    }

    #[test]
    fn test_base_level_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "base_level": 0 }"#).unwrap();

        assert_eq!(Settings::load(&path).unwrap().base_level, 1);

        fs::write(&path, r#"{ "base_level": 1000 }"#).unwrap();
        assert_eq!(Settings::load(&path).unwrap().base_level, MAX_BASE_LEVEL);
    }

    #[test]
    fn test_invalid_timestamp_format_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "timestamp_format": "%Y-%Q" }"#).unwrap();

        assert_eq!(Settings::load(&path).unwrap().timestamp_format, "%Y-%m-%d %H:%M");
        assert!(is_valid_timestamp_format("%d.%m.%Y %H:%M:%S"));
    }

    #[test]
    fn test_save_then_resolve_explicit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings { base_level: 2, reply_prefix: "Re:".to_string(), ..Settings::default() };
        settings.save(&path).unwrap();

        assert_eq!(Settings::resolve(Some(&path)).unwrap(), settings);
    }

    #[test]
    fn test_init_writes_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signal2org").join("settings.json");

        assert_eq!(Settings::init(Some(&path), false).unwrap(), path);
        assert_eq!(Settings::load(&path).unwrap(), Settings::default());

        fs::write(&path, r#"{ "self_name": "Ekats" }"#).unwrap();
        assert!(matches!(Settings::init(Some(&path), false), Err(Error::ConfigExists(_))));
        assert_eq!(Settings::load(&path).unwrap().self_name, "Ekats");

        Settings::init(Some(&path), true).unwrap();
        assert_eq!(Settings::load(&path).unwrap().self_name, "Me");
    }

    #[test]
    fn test_explicit_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(Settings::resolve(Some(&path)).is_err());
        assert!(Settings::resolve(Some(&dir.path().join("missing.json"))).is_err());
    }
}
