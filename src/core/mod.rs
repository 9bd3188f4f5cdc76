//! Core synchronization logic.
//!
//! This module contains:
//! - PlaylistStore: SQLite record of playlists, songs and memberships
//! - SyncEngine: Fetch, diff, download and link for one playlist
//! - Cancellation tokens and batch id-file parsing

pub mod batch;
pub mod cancel;
pub mod engine;
pub mod store;

// Re-export commonly used types
pub use batch::parse_playlist_file;
pub use cancel::{CancelHandle, CancelToken};
pub use engine::{SyncEngine, SyncError};
pub use store::{IdSource, PlaylistStore, StoreError};
