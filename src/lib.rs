//! msync - Mirror remote playlists into a local music library
//!
//! Songs are downloaded once into a shared storage pool and every playlist
//! becomes a directory of symlinks into that pool, so a song shared by
//! several playlists is stored a single time.
//!
//! # Architecture
//!
//! - A SQLite store records playlists, songs and which playlists each song
//!   belongs to
//! - The sync engine diffs an upstream playlist against the store and only
//!   downloads what is missing
//! - Every retrieved song is committed immediately, so an interrupted sync
//!   resumes where it stopped
//!
//! # Modules
//!
//! - `adapters`: Fetcher and Downloader interfaces and their yt-dlp implementations
//! - `core`: Store, sync engine, cancellation
//! - `domain`: Records, descriptors, progress events, reports
//! - `library`: Storage pool and playlist directory layout
//! - `config`: Path and tool resolution
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Synchronize a playlist
//! msync sync PLxxxxxxxxxxxxxxxx
//!
//! # Synchronize every playlist listed in a file
//! msync sync --file playlists.txt
//!
//! # Re-sync everything tracked and enabled
//! msync sync --all
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod library;

// Re-export main types at crate root for convenience
pub use crate::adapters::{Downloader, Fetcher, YtDlpDownloader, YtDlpFetcher};
pub use crate::config::{load_config, ConfigOverrides, ResolvedConfig};
pub use crate::core::{CancelHandle, CancelToken, PlaylistStore, StoreError, SyncEngine, SyncError};
pub use crate::domain::{LocalId, SyncEvent, SyncPhase, SyncReport};
pub use crate::library::LibraryLayout;
