//! Platform directory conventions.
//!
//! Single source of truth for where msync keeps its state on each OS.
//!
//! | Platform | Data | Config |
//! |----------|------|--------|
//! | macOS | `~/Library/Application Support` | `~/Library/Preferences` |
//! | Linux | `$XDG_DATA_HOME` or `~/.local/share` | `$XDG_CONFIG_HOME` or `~/.config` |
//! | Windows | `%APPDATA%` | `%APPDATA%` |
//!
//! msync appends its own `msync/` directory to both.

use std::path::{Path, PathBuf};

/// Directory msync creates under the platform data and config dirs
pub const APP_DIR: &str = "msync";

/// Database file name inside the data directory
pub const DATABASE_FILE: &str = "synchronisation_data.db";

/// Shared storage pool inside the data directory
pub const STORAGE_DIR: &str = "storage";

/// Local ffmpeg builds inside the data directory
pub const FFMPEG_BUILDS_DIR: &str = "ffmpeg_builds";

/// Config file name, both in `.msync/` and the platform config dir
pub const CONFIG_FILE: &str = "config.yaml";

/// Project-local config directory searched upward from the cwd
pub const PROJECT_CONFIG_DIR: &str = ".msync";

/// Operating systems with distinct directory conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
    Windows,
    /// Anything else follows the XDG layout
    Other,
}

impl Platform {
    /// The platform this binary was built for
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(windows) {
            Self::Windows
        } else {
            Self::Other
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::MacOs => "macos",
            Self::Linux => "linux",
            Self::Windows => "windows",
            Self::Other => "other",
        }
    }

    /// Base directory for application data
    pub fn data_dir(&self, home: &Path, var: &dyn Fn(&str) -> Option<String>) -> PathBuf {
        match self {
            Self::MacOs => home.join("Library").join("Application Support"),
            Self::Windows => app_data(home, var),
            Self::Linux | Self::Other => {
                env_dir(var, "XDG_DATA_HOME").unwrap_or_else(|| home.join(".local").join("share"))
            }
        }
    }

    /// Base directory for configuration files
    pub fn config_dir(&self, home: &Path, var: &dyn Fn(&str) -> Option<String>) -> PathBuf {
        match self {
            Self::MacOs => home.join("Library").join("Preferences"),
            Self::Windows => app_data(home, var),
            Self::Linux | Self::Other => {
                env_dir(var, "XDG_CONFIG_HOME").unwrap_or_else(|| home.join(".config"))
            }
        }
    }
}

fn app_data(home: &Path, var: &dyn Fn(&str) -> Option<String>) -> PathBuf {
    env_dir(var, "APPDATA").unwrap_or_else(|| home.join("AppData").join("Roaming"))
}

/// Absolute directory from an environment variable; relative values are ignored
fn env_dir(var: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<PathBuf> {
    var(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .filter(|path| path.is_absolute())
}
