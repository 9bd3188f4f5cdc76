//! Playlist records and upstream playlist metadata.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::LocalId;

/// A locally tracked playlist.
///
/// Created the first time an upstream playlist is synchronized and never
/// deleted afterwards. `last_synced_at` moves forward on every sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistRecord {
    /// Generated identifier (shared id space with songs)
    pub local_id: LocalId,

    /// Remote playlist identifier
    pub upstream_id: String,

    /// Whether `sync --all` picks this playlist up
    pub enabled: bool,

    /// Directory holding this playlist's symlinks
    pub storage_path: PathBuf,

    /// Upstream title at the time the playlist was first synchronized
    pub display_name: String,

    /// When the playlist was last synchronized
    pub last_synced_at: DateTime<Utc>,
}

/// An unnormalized playlist entry as reported upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMember {
    pub id: String,
    pub title: String,
    /// Uploader or channel name, used as the fallback artist
    #[serde(default)]
    pub channel: Option<String>,
}

impl RawMember {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            channel: None,
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }
}

/// Canonical metadata for an upstream playlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistMetadata {
    pub id: String,
    pub title: String,
    pub member_count: usize,
    pub raw_members: Vec<RawMember>,
}
