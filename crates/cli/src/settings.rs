use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use frameview_core::shared::constants::DEFAULT_FALLBACK_FPS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory of the last successful export.
    pub export_dir: Option<PathBuf>,
    pub fallback_fps: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            export_dir: None,
            fallback_fps: DEFAULT_FALLBACK_FPS,
        }
    }
}

impl Settings {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("FrameView").join("settings.json"))
    }

    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            self.save_to(&path);
        }
    }

    /// Missing or unreadable files give the defaults.
    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    log::warn!("Could not save settings to {}: {e}", path.display());
                }
            }
            Err(e) => log::warn!("Could not serialise settings: {e}"),
        }
    }

    /// Fallback rate for playback, ignoring nonsense values from hand edits.
    pub fn fallback_fps(&self) -> f64 {
        if self.fallback_fps.is_finite() && self.fallback_fps > 0.0 {
            self.fallback_fps
        } else {
            DEFAULT_FALLBACK_FPS
        }
    }
}
