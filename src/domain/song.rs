//! Song records and the descriptors exchanged with the fetcher and downloader.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ids::LocalId;

/// A song retrieved into the shared storage pool.
///
/// Exactly one record exists per distinct upstream song id, whichever
/// playlists reference it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongRecord {
    /// Generated identifier (shared id space with playlists)
    pub local_id: LocalId,

    /// Remote song identifier, the cross-playlist dedup key
    pub upstream_id: String,

    /// Absolute path of the media file inside the storage pool
    pub file_path: PathBuf,

    /// Local ids of the playlists this song belongs to
    pub member_playlists: BTreeSet<LocalId>,
}

impl SongRecord {
    pub fn is_member_of(&self, playlist_id: &LocalId) -> bool {
        self.member_playlists.contains(playlist_id)
    }
}

/// A normalized playlist member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongDescriptor {
    pub upstream_id: String,
    pub title: String,
    pub artist: String,
}

impl SongDescriptor {
    pub fn new(
        upstream_id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
    ) -> Self {
        Self {
            upstream_id: upstream_id.into(),
            title: title.into(),
            artist: artist.into(),
        }
    }

    /// Short link used when reporting this song to the user
    pub fn link(&self) -> String {
        format!("https://youtu.be/{}", self.upstream_id)
    }
}

/// A song the downloader finished retrieving
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievedSong {
    pub upstream_id: String,
    pub title: String,
    pub artist: String,
    pub file_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_link() {
        let song = SongDescriptor::new("dQw4w9WgXcQ", "Never Gonna Give You Up", "Rick Astley");
        assert_eq!(song.link(), "https://youtu.be/dQw4w9WgXcQ");
    }

    #[test]
    fn test_membership_lookup() {
        let playlist = LocalId::random();
        let song = SongRecord {
            local_id: LocalId::random(),
            upstream_id: "abc".to_string(),
            file_path: PathBuf::from("/storage/a.m4a"),
            member_playlists: [playlist].into_iter().collect(),
        };

        assert!(song.is_member_of(&playlist));
        assert!(!song.is_member_of(&LocalId::random()));
    }
}
