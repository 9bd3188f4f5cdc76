//! Two-tier directory layout of the music library.
//!
//! ```text
//! <storage_root>/                 # shared pool, one file per distinct song
//! └── Artist - Title.m4a
//! <music_root>/
//! └── <playlist title>/           # one directory per playlist
//!     └── Artist - Title.m4a -> <storage_root>/Artist - Title.m4a
//! ```
//!
//! Playlist directories only ever hold symlinks into the storage pool.
//!
//! Pool files are named after the normalized "Artist - Title", not after the
//! generated song id. Two upstream songs that normalize to the same name share
//! one pool file, and the second link attempt reports
//! [`LinkOutcome::AlreadyPresent`].

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::debug;

/// Errors raised while maintaining the layout
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Song path has no file name: {0}")]
    NoFileName(PathBuf),

    #[error("Failed to link {link} -> {target}: {source}")]
    Link {
        link: PathBuf,
        target: PathBuf,
        source: io::Error,
    },
}

/// What happened when a song was linked into a playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// A new symlink was created
    Created,
    /// Something already occupies the link name; it was left untouched
    AlreadyPresent,
}

/// Manages the shared storage pool and the per-playlist symlink trees
#[derive(Debug, Clone)]
pub struct LibraryLayout {
    storage_root: PathBuf,
    music_root: PathBuf,
}

impl LibraryLayout {
    pub fn new(storage_root: impl Into<PathBuf>, music_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            music_root: music_root.into(),
        }
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn music_root(&self) -> &Path {
        &self.music_root
    }

    /// Create the shared storage pool if needed and return its path
    pub async fn ensure_storage_directory(&self) -> Result<PathBuf, LayoutError> {
        create_dir_all(&self.storage_root).await?;
        Ok(self.storage_root.clone())
    }

    /// Create the directory for a playlist under the music root.
    ///
    /// The directory is named after the display title with path separators
    /// replaced, so it always sits directly under the music root.
    pub async fn ensure_playlist_directory(&self, display_name: &str) -> Result<PathBuf, LayoutError> {
        let dir = self.music_root.join(directory_name(display_name));
        create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Recreate a previously recorded playlist directory if it went missing
    pub async fn restore_playlist_directory(&self, playlist_directory: &Path) -> Result<(), LayoutError> {
        create_dir_all(playlist_directory).await
    }

    /// Link a stored song into a playlist directory.
    ///
    /// The link takes the song file's name. An existing entry with that name
    /// is never replaced, whether or not it points at `song_file_path`.
    pub async fn link_song_into_playlist(
        &self,
        song_file_path: &Path,
        playlist_directory: &Path,
    ) -> Result<LinkOutcome, LayoutError> {
        let file_name = song_file_path
            .file_name()
            .ok_or_else(|| LayoutError::NoFileName(song_file_path.to_path_buf()))?;
        let link = playlist_directory.join(file_name);

        // symlink_metadata so dangling links still count as present
        if fs::symlink_metadata(&link).await.is_ok() {
            return Ok(LinkOutcome::AlreadyPresent);
        }

        symlink_file(song_file_path, &link)
            .await
            .map_err(|source| LayoutError::Link {
                link: link.clone(),
                target: song_file_path.to_path_buf(),
                source,
            })?;

        debug!(link = %link.display(), target = %song_file_path.display(), "Linked song");
        Ok(LinkOutcome::Created)
    }
}

async fn create_dir_all(path: &Path) -> Result<(), LayoutError> {
    fs::create_dir_all(path)
        .await
        .map_err(|source| LayoutError::CreateDir {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(unix)]
async fn symlink_file(target: &Path, link: &Path) -> io::Result<()> {
    fs::symlink(target, link).await
}

#[cfg(windows)]
async fn symlink_file(target: &Path, link: &Path) -> io::Result<()> {
    fs::symlink_file(target, link).await
}

/// Directory name for a playlist title
pub fn directory_name(display_name: &str) -> String {
    let name: String = display_name
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '-' } else { c })
        .collect();

    match name.as_str() {
        "" | "." | ".." => "Untitled Playlist".to_string(),
        _ => name,
    }
}
