use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use fractaldive_render::{theme_by_name, ColorScale, ColorSettings};

/// Settings persisted between runs in `preferences.json`.
///
/// Every field has a serde default so partial or older files still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_max_iterations")]
    pub default_max_iterations: u32,
    /// Band workers; 0 means one per available core.
    #[serde(default)]
    pub worker_count: usize,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default)]
    pub scale: ColorScale,
    #[serde(default)]
    pub palette_offset: usize,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Frames per zoom sequence.
    #[serde(default = "default_zoom_frames")]
    pub zoom_frames: u32,
    #[serde(default = "default_true")]
    pub restore_last_view: bool,
    /// View hash saved at the end of the last run.
    #[serde(default)]
    pub last_view: Option<String>,
}

fn default_max_iterations() -> u32 {
    256
}
fn default_theme() -> String {
    "classic".to_string()
}
fn default_width() -> u32 {
    1280
}
fn default_height() -> u32 {
    720
}
fn default_zoom_frames() -> u32 {
    60
}
fn default_true() -> bool {
    true
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            default_max_iterations: default_max_iterations(),
            worker_count: 0,
            theme: default_theme(),
            scale: ColorScale::default(),
            palette_offset: 0,
            width: default_width(),
            height: default_height(),
            zoom_frames: default_zoom_frames(),
            restore_last_view: true,
            last_view: None,
        }
    }
}

impl Preferences {
    /// Load preferences from the OS config directory, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    /// Load from an explicit file. Missing or unreadable files yield defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            debug!("No preferences file at {}", path.display());
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str::<Preferences>(&json) {
                Ok(prefs) => {
                    info!("Loaded preferences from {}", path.display());
                    prefs
                }
                Err(e) => {
                    error!("Failed to parse preferences: {e}");
                    Self::default()
                }
            },
            Err(e) => {
                error!("Failed to read preferences file: {e}");
                Self::default()
            }
        }
    }

    /// Persist preferences to disk.
    pub fn save(&self) {
        self.save_to(&config_path());
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory: {e}");
                return;
            }
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, &json) {
                    error!("Failed to write preferences: {e}");
                } else {
                    debug!("Saved preferences");
                }
            }
            Err(e) => error!("Failed to serialize preferences: {e}"),
        }
    }

    /// Worker count with 0 resolved to the available parallelism.
    pub fn resolved_worker_count(&self) -> usize {
        match self.worker_count {
            0 => std::thread::available_parallelism().map_or(1, |n| n.get()),
            n => n,
        }
    }

    pub fn color_settings(&self) -> ColorSettings {
        ColorSettings {
            theme: theme_by_name(&self.theme),
            scale: self.scale,
            offset: self.palette_offset,
        }
    }
}

fn config_path() -> PathBuf {
    crate::app_dir::config_directory().join("preferences.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        dir.join("preferences.json")
    }

    #[test]
    fn partial_file_fills_defaults() {
        let prefs: Preferences = serde_json::from_str(r#"{"theme":"fire","worker_count":3}"#).unwrap();
        assert_eq!(prefs.theme, "fire");
        assert_eq!(prefs.worker_count, 3);
        assert_eq!(prefs.default_max_iterations, 256);
        assert_eq!(prefs.scale, ColorScale::Log);
        assert!(prefs.restore_last_view);
        assert_eq!(prefs.last_view, None);
    }

    #[test]
    fn save_then_load() {
        let path = temp_file("fractaldive_prefs_roundtrip");
        let prefs = Preferences {
            scale: ColorScale::Linear,
            last_view: Some("#x=0.25&y=0.0&z=4.0&set=mandelbrot".into()),
            ..Preferences::default()
        };
        prefs.save_to(&path);
        assert_eq!(Preferences::load_from(&path), prefs);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn garbage_file_yields_defaults() {
        let path = temp_file("fractaldive_prefs_garbage");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Preferences::load_from(&path), Preferences::default());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = temp_file("fractaldive_prefs_missing");
        assert_eq!(Preferences::load_from(&path), Preferences::default());
    }

    #[test]
    fn zero_workers_resolves_to_at_least_one() {
        assert!(Preferences::default().resolved_worker_count() >= 1);
        let prefs = Preferences {
            worker_count: 5,
            ..Preferences::default()
        };
        assert_eq!(prefs.resolved_worker_count(), 5);
    }

    #[test]
    fn unknown_theme_falls_back_to_classic() {
        let prefs = Preferences {
            theme: "mauve".into(),
            ..Preferences::default()
        };
        assert_eq!(prefs.color_settings().theme.name, "classic");
    }
}
