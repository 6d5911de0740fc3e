//! Engine settings, persisted as JSON
//!
//! Missing fields fall back to defaults, so settings files written by older
//! versions keep loading.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::entities::fetch::MAX_BODY_BYTES;

/// Settings file name inside the config directory
pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub worker_threads: usize, // 0 = auto (75% of cores)
    pub max_body_bytes: usize, // Network response limit
    pub user_agent: String,    // Sent with every network request
    pub asset_root: PathBuf,   // Directory backing Asset sources
    pub default_headers: Vec<(String, String)>, // Sent before per-source headers
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            max_body_bytes: MAX_BODY_BYTES,
            user_agent: concat!("gifscrub/", env!("CARGO_PKG_VERSION")).to_string(),
            asset_root: PathBuf::from("assets"),
            default_headers: Vec::new(),
        }
    }
}

/// Settings load/save errors
#[derive(Debug)]
pub enum SettingsError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, serde_json::Error),
    Serialize(serde_json::Error),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io(path, e) => write!(f, "Settings I/O error ({}): {}", path.display(), e),
            SettingsError::Parse(path, e) => write!(f, "Invalid settings ({}): {}", path.display(), e),
            SettingsError::Serialize(e) => write!(f, "Failed to serialize settings: {}", e),
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::Io(_, e) => Some(e),
            SettingsError::Parse(_, e) => Some(e),
            SettingsError::Serialize(e) => Some(e),
        }
    }
}

impl Settings {
    /// Platform config location (`<config dir>/gifscrub/settings.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::config_dir().map(|dir| dir.join("gifscrub").join(SETTINGS_FILE))
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|e| SettingsError::Io(path.to_path_buf(), e))?;
        let settings: Settings =
            serde_json::from_str(&text).map_err(|e| SettingsError::Parse(path.to_path_buf(), e))?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load from `path`, or defaults if the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No settings at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let text = serde_json::to_string_pretty(self).map_err(SettingsError::Serialize)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SettingsError::Io(parent.to_path_buf(), e))?;
        }
        std::fs::write(path, text).map_err(|e| SettingsError::Io(path.to_path_buf(), e))
    }

    /// Worker threads to spawn: override, or `num_cpus * 3 / 4` (at least 1)
    pub fn worker_count(&self) -> usize {
        if self.worker_threads > 0 {
            self.worker_threads
        } else {
            (num_cpus::get() * 3 / 4).max(1)
        }
    }

    /// Headers for every network request: User-Agent, then the defaults
    pub fn request_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(self.default_headers.len() + 1);
        if !self.user_agent.is_empty() {
            headers.push(("User-Agent".to_string(), self.user_agent.clone()));
        }
        headers.extend(self.default_headers.iter().cloned());
        headers
    }
}
