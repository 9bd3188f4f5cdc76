//! Configuration for msync paths and external tools.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line flags (--db, --storage, --music)
//! 2. Environment variables (MSYNC_DB, MSYNC_STORAGE, MSYNC_MUSIC, MSYNC_HOME)
//! 3. Config file (--config, else .msync/config.yaml, else the platform config dir)
//! 4. Platform defaults (see [`paths`])
//!
//! Config file discovery:
//! - Searches current directory and parents for .msync/config.yaml
//! - Falls back to <platform config>/msync/config.yaml
//! - Paths in config file are relative to the config file's directory

pub mod paths;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use paths::{
    Platform, APP_DIR, CONFIG_FILE, DATABASE_FILE, FFMPEG_BUILDS_DIR, PROJECT_CONFIG_DIR,
    STORAGE_DIR,
};

const DEFAULT_YT_DLP: &str = "yt-dlp";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub downloader: DownloaderConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// SQLite database file
    pub database: Option<String>,
    /// Shared storage pool
    pub storage: Option<String>,
    /// Root of the playlist directories
    pub music: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloaderConfig {
    /// yt-dlp executable name or path
    pub yt_dlp: Option<String>,
    /// Directory holding ffmpeg and ffprobe; skips discovery when set
    pub ffmpeg_location: Option<String>,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub storage: Option<PathBuf>,
    pub music: Option<PathBuf>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub platform: Platform,
    /// msync's own data directory
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub storage_dir: PathBuf,
    pub music_dir: PathBuf,
    /// Where a local ffmpeg build would live
    pub builds_dir: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub yt_dlp: String,
    pub ffmpeg_location: Option<PathBuf>,
}

/// Process environment as seen by the resolver
struct Environment<'a> {
    platform: Platform,
    home: PathBuf,
    audio_dir: Option<PathBuf>,
    cwd: Option<PathBuf>,
    var: &'a dyn Fn(&str) -> Option<String>,
}

impl Environment<'_> {
    fn path_var(&self, key: &str) -> Option<PathBuf> {
        (self.var)(key)
            .filter(|value| !value.is_empty())
            .map(|value| expand_home(&self.home, &value))
    }
}

/// Load configuration from all sources
pub fn load_config(overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let home = dirs::home_dir().context("Failed to determine home directory")?;
    let var = |key: &str| std::env::var(key).ok();

    let env = Environment {
        platform: Platform::current(),
        home,
        audio_dir: dirs::audio_dir(),
        cwd: std::env::current_dir().ok(),
        var: &var,
    };
    resolve(overrides, &env)
}

fn resolve(overrides: &ConfigOverrides, env: &Environment<'_>) -> Result<ResolvedConfig> {
    let platform_config = env.platform.config_dir(&env.home, env.var).join(APP_DIR);

    let config_file = match &overrides.config_file {
        Some(path) => Some(path.clone()),
        None => env
            .cwd
            .as_deref()
            .and_then(find_config_file)
            .or_else(|| Some(platform_config.join(CONFIG_FILE)).filter(|p| p.is_file())),
    };

    let file = match &config_file {
        Some(path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));
    let from_file = |value: &Option<String>| value.as_deref().map(|v| resolve_path(&env.home, base_dir, v));

    let data_dir = env
        .path_var("MSYNC_HOME")
        .unwrap_or_else(|| env.platform.data_dir(&env.home, env.var).join(APP_DIR));

    let database_path = overrides
        .database
        .clone()
        .or_else(|| env.path_var("MSYNC_DB"))
        .or_else(|| from_file(&file.paths.database))
        .unwrap_or_else(|| data_dir.join(DATABASE_FILE));

    let storage_dir = overrides
        .storage
        .clone()
        .or_else(|| env.path_var("MSYNC_STORAGE"))
        .or_else(|| from_file(&file.paths.storage))
        .unwrap_or_else(|| data_dir.join(STORAGE_DIR));

    let music_dir = overrides
        .music
        .clone()
        .or_else(|| env.path_var("MSYNC_MUSIC"))
        .or_else(|| from_file(&file.paths.music))
        .or_else(|| env.audio_dir.clone())
        .unwrap_or_else(|| env.home.join("Music"));

    let ffmpeg_location = from_file(&file.downloader.ffmpeg_location);
    let yt_dlp = file
        .downloader
        .yt_dlp
        .unwrap_or_else(|| DEFAULT_YT_DLP.to_string());

    Ok(ResolvedConfig {
        platform: env.platform,
        builds_dir: data_dir.join(FFMPEG_BUILDS_DIR),
        data_dir,
        database_path,
        storage_dir,
        music_dir,
        config_file,
        yt_dlp,
        ffmpeg_location,
    })
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(PROJECT_CONFIG_DIR).join(CONFIG_FILE))
        .find(|path| path.is_file())
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    // An empty file is a valid, empty config
    if content.trim().is_empty() {
        return Ok(ConfigFile::default());
    }

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a config path that may be relative to `base` or start with `~/`
fn resolve_path(home: &Path, base: &Path, path_str: &str) -> PathBuf {
    let path = expand_home(home, path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(&path).canonicalize().unwrap_or_else(|_| base.join(path))
    }
}

fn expand_home(home: &Path, value: &str) -> PathBuf {
    match value.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None if value == "~" => home.to_path_buf(),
        None => PathBuf::from(value),
    }
}
