//! Domain types for msync.
//!
//! This module contains the core data structures:
//! - Ids: Local identifiers shared by playlists and songs
//! - Playlist / Song: Persisted records and upstream descriptors
//! - Events: Progress notifications from the sync engine
//! - Report: Outcome of a synchronization

pub mod events;
pub mod ids;
pub mod playlist;
pub mod report;
pub mod song;

// Re-export commonly used types
pub use events::{EventReceiver, EventSender, SyncEvent, SyncPhase};
pub use ids::LocalId;
pub use playlist::{PlaylistMetadata, PlaylistRecord, RawMember};
pub use report::SyncReport;
pub use song::{RetrievedSong, SongDescriptor, SongRecord};
