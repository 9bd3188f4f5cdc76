//! Outcome of a single playlist synchronization.

use serde::{Deserialize, Serialize};

use super::ids::LocalId;
use super::song::SongDescriptor;

/// Summary returned by a completed synchronization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Local id of the synchronized playlist
    pub playlist_id: LocalId,

    /// Upstream title
    pub title: String,

    /// Distinct available members after normalization
    pub member_count: usize,

    /// Whether the playlist record was created by this sync
    pub playlist_created: bool,

    /// Members that already had a song record
    pub already_downloaded: usize,

    /// Members retrieved during this sync
    pub retrieved: usize,

    /// Pending members the downloader did not deliver
    pub skipped: Vec<SongDescriptor>,

    /// Symlinks created during this sync
    pub links_created: usize,

    /// Symlinks that could not be created
    pub link_failures: usize,
}

impl SyncReport {
    pub fn new(playlist_id: LocalId, title: impl Into<String>, member_count: usize) -> Self {
        Self {
            playlist_id,
            title: title.into(),
            member_count,
            playlist_created: false,
            already_downloaded: 0,
            retrieved: 0,
            skipped: Vec::new(),
            links_created: 0,
            link_failures: 0,
        }
    }

    /// True when every member is present locally and linked
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.link_failures == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_report_is_complete() {
        let report = SyncReport::new(LocalId::random(), "Mix", 0);
        assert!(report.is_complete());
        assert!(!report.playlist_created);
    }

    #[test]
    fn test_skipped_song_marks_incomplete() {
        let mut report = SyncReport::new(LocalId::random(), "Mix", 2);
        report
            .skipped
            .push(SongDescriptor::new("abc", "Title", "Artist"));
        assert!(!report.is_complete());
    }
}
