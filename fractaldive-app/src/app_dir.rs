//! Where the app keeps its files.

use std::path::PathBuf;

/// Directory containing the running executable. Falls back to current directory if unavailable.
pub fn exe_directory() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// OS config directory for fractaldive, or the executable's directory when
/// the platform has none.
pub fn config_directory() -> PathBuf {
    directories::ProjectDirs::from("", "", "fractaldive")
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(exe_directory)
}
