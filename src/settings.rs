//! Startup settings, loaded once from `~/.badi-treasury/settings.json` and
//! passed by reference to whatever needs them.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Process-wide configuration. Every field has a default so a missing or
/// partial file still yields a usable value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Override for the directory holding the database file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Free-text locality ("Chicago", "Apia") fed to timezone resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,

    /// Display name of the organization whose books these are.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

impl Settings {
    /// Load settings from disk. A missing file yields defaults; a malformed
    /// file is logged and also yields defaults, so a bad edit never locks
    /// the treasurer out of the books.
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            log::warn!("Home directory not found; using default settings");
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("Failed to parse {}: {e}. Using defaults.", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {e}. Using defaults.", path.display());
                Self::default()
            }
        }
    }

    /// Persist settings, creating the directory if needed.
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::path().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "home directory not found")
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }

    fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".badi-treasury").join("settings.json"))
    }
}
