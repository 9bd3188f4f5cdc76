//! Playlist synchronization engine.
//!
//! One call to [`SyncEngine::synchronize`] mirrors one upstream playlist:
//!
//! ```text
//! Resolving -> Diffing -> Downloading -> Linking -> Done
//!     \___________\____________\___________\______-> Aborted
//! ```
//!
//! Every retrieved song is committed to the store as soon as the downloader
//! reports it, so an aborted sync keeps whatever it already finished. Links
//! are derived from store state and are recreated on the next run.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{Downloader, Fetcher};
use crate::domain::{
    EventSender, PlaylistMetadata, PlaylistRecord, RetrievedSong, SongDescriptor, SyncEvent,
    SyncPhase, SyncReport,
};
use crate::library::{LayoutError, LibraryLayout, LinkOutcome};

use super::cancel::CancelToken;
use super::store::{PlaylistStore, StoreError};

/// Errors that end a single playlist sync
#[derive(Debug, Error)]
pub enum SyncError {
    /// The playlist could not be resolved upstream; nothing was written
    #[error("Failed to fetch playlist '{0}'")]
    Fetch(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("Downloader failed: {0:#}")]
    Download(anyhow::Error),

    #[error("Synchronization cancelled")]
    Cancelled,
}

/// Drives fetch, diff, download and link for one playlist at a time
pub struct SyncEngine<F, D> {
    fetcher: F,
    downloader: D,
    layout: LibraryLayout,
    toolchain_hint: Option<PathBuf>,
    events: Option<EventSender>,
}

impl<F: Fetcher, D: Downloader> SyncEngine<F, D> {
    pub fn new(fetcher: F, downloader: D, layout: LibraryLayout) -> Self {
        Self {
            fetcher,
            downloader,
            layout,
            toolchain_hint: None,
            events: None,
        }
    }

    /// Directory holding ffmpeg/ffprobe, passed through to the downloader
    pub fn with_toolchain_hint(mut self, hint: Option<PathBuf>) -> Self {
        self.toolchain_hint = hint;
        self
    }

    /// Report progress on `events`
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn downloader(&self) -> &D {
        &self.downloader
    }

    /// Mirror one upstream playlist into the store and the library.
    ///
    /// `store` is borrowed exclusively for the whole sync.
    #[instrument(skip(self, store, cancel))]
    pub async fn synchronize(
        &self,
        store: &mut PlaylistStore,
        upstream_id: &str,
        cancel: &CancelToken,
    ) -> Result<SyncReport, SyncError> {
        let result = self.run_phases(store, upstream_id, cancel).await;

        match &result {
            Ok(report) => {
                self.phase(SyncPhase::Done);
                self.emit(SyncEvent::Finished);
                info!(
                    playlist = %report.title,
                    retrieved = report.retrieved,
                    skipped = report.skipped.len(),
                    links_created = report.links_created,
                    "Playlist synchronized"
                );
            }
            Err(e) => {
                self.phase(SyncPhase::Aborted);
                debug!(error = %e, "Synchronization aborted");
            }
        }

        result
    }

    async fn run_phases(
        &self,
        store: &mut PlaylistStore,
        upstream_id: &str,
        cancel: &CancelToken,
    ) -> Result<SyncReport, SyncError> {
        // Resolving
        self.phase(SyncPhase::Resolving);
        let metadata = self.resolve(upstream_id, cancel).await?;
        let members = dedup(self.fetcher.normalize_members(&metadata.raw_members));
        self.emit(SyncEvent::Resolved {
            title: metadata.title.clone(),
            member_count: members.len(),
        });
        check(cancel)?;

        // Diffing
        self.phase(SyncPhase::Diffing);
        let (playlist, created) = self.find_or_create_playlist(store, upstream_id, &metadata).await?;

        let mut report = SyncReport::new(playlist.local_id, &metadata.title, members.len());
        report.playlist_created = created;

        let mut pending = Vec::new();
        for song in &members {
            match store.find_song_by_upstream_id(&song.upstream_id)? {
                Some(record) => {
                    report.already_downloaded += 1;
                    if !record.is_member_of(&playlist.local_id) {
                        store.add_song_to_playlist(&record.local_id, &playlist.local_id)?;
                    }
                }
                None => pending.push(song.clone()),
            }
        }
        self.emit(SyncEvent::Diffed {
            already_downloaded: report.already_downloaded,
            pending: pending.len(),
        });
        check(cancel)?;

        // Downloading
        if !pending.is_empty() {
            self.phase(SyncPhase::Downloading);
            let retrieved = self.download(store, &playlist, &pending, cancel).await?;

            report.retrieved = retrieved.len();
            report.skipped = pending
                .into_iter()
                .filter(|song| !retrieved.contains(&song.upstream_id))
                .collect();
        }
        for song in &report.skipped {
            warn!(link = %song.link(), "Song not retrieved, it stays pending");
        }

        // Committed songs stay; the next sync links them
        check(cancel)?;

        // Linking
        self.phase(SyncPhase::Linking);
        let (created, failed) = self.link(store, &playlist.storage_path, &members).await?;
        report.links_created = created;
        report.link_failures = failed;
        self.emit(SyncEvent::Linked { created });

        store.touch_playlist(&playlist.local_id)?;
        Ok(report)
    }

    async fn resolve(
        &self,
        upstream_id: &str,
        cancel: &CancelToken,
    ) -> Result<PlaylistMetadata, SyncError> {
        let ids = [upstream_id.to_string()];

        let playlists = tokio::select! {
            playlists = self.fetcher.fetch_playlist_metadata(&ids) => playlists,
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
        };

        let metadata = playlists
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::Fetch(upstream_id.to_string()))?;

        debug!(
            fetcher = self.fetcher.name(),
            title = %metadata.title,
            raw_members = metadata.raw_members.len(),
            "Resolved playlist"
        );
        Ok(metadata)
    }

    async fn find_or_create_playlist(
        &self,
        store: &mut PlaylistStore,
        upstream_id: &str,
        metadata: &PlaylistMetadata,
    ) -> Result<(PlaylistRecord, bool), SyncError> {
        if let Some(playlist) = store.find_playlist_by_upstream_id(upstream_id)? {
            self.layout
                .restore_playlist_directory(&playlist.storage_path)
                .await?;
            return Ok((playlist, false));
        }

        let directory = self.layout.ensure_playlist_directory(&metadata.title).await?;
        let local_id = store.create_playlist(true, upstream_id, &directory, &metadata.title)?;
        info!(%local_id, title = %metadata.title, "Tracking new playlist");

        let playlist = store
            .find_playlist_by_upstream_id(upstream_id)?
            .ok_or(StoreError::PlaylistNotFound(local_id))?;
        Ok((playlist, true))
    }

    /// Hand the pending batch to the downloader, committing each success.
    ///
    /// Returns the upstream ids that were retrieved.
    async fn download(
        &self,
        store: &mut PlaylistStore,
        playlist: &PlaylistRecord,
        pending: &[SongDescriptor],
        cancel: &CancelToken,
    ) -> Result<HashSet<String>, SyncError> {
        let storage = self.layout.ensure_storage_directory().await?;
        let playlist_id = playlist.local_id;
        let events = self.events.clone();
        let mut retrieved = HashSet::new();

        let outcome = {
            let mut on_success = |song: RetrievedSong| -> anyhow::Result<()> {
                match store.find_song_by_upstream_id(&song.upstream_id)? {
                    Some(existing) => store.add_song_to_playlist(&existing.local_id, &playlist_id)?,
                    None => {
                        store.create_song(
                            &song.file_path,
                            &song.upstream_id,
                            &BTreeSet::from([playlist_id]),
                        )?;
                    }
                }

                if let Some(events) = &events {
                    let _ = events.send(SyncEvent::SongRetrieved {
                        upstream_id: song.upstream_id.clone(),
                        title: song.title.clone(),
                        artist: song.artist.clone(),
                    });
                }
                retrieved.insert(song.upstream_id);
                Ok(())
            };

            let run = self.downloader.run(
                pending,
                &storage,
                self.toolchain_hint.as_deref(),
                &mut on_success,
            );

            tokio::select! {
                result = run => Some(result),
                _ = cancel.cancelled() => None,
            }
        };

        match outcome {
            Some(Ok(())) => Ok(retrieved),
            Some(Err(e)) => Err(match e.downcast::<StoreError>() {
                Ok(store_error) => SyncError::Store(store_error),
                Err(e) => SyncError::Download(e),
            }),
            None => {
                warn!(
                    committed = retrieved.len(),
                    remaining = pending.len().saturating_sub(retrieved.len()),
                    "Download interrupted"
                );
                Err(SyncError::Cancelled)
            }
        }
    }

    /// Ensure a link for every member with a stored song.
    ///
    /// Returns (links created, link failures).
    async fn link(
        &self,
        store: &PlaylistStore,
        playlist_directory: &Path,
        members: &[SongDescriptor],
    ) -> Result<(usize, usize), SyncError> {
        let mut created = 0;
        let mut failed = 0;

        for song in members {
            let Some(record) = store.find_song_by_upstream_id(&song.upstream_id)? else {
                continue;
            };

            match self
                .layout
                .link_song_into_playlist(&record.file_path, playlist_directory)
                .await
            {
                Ok(LinkOutcome::Created) => created += 1,
                Ok(LinkOutcome::AlreadyPresent) => {}
                Err(e) => {
                    warn!(error = %e, "Failed to link song into playlist");
                    failed += 1;
                }
            }
        }

        Ok((created, failed))
    }

    fn phase(&self, phase: SyncPhase) {
        self.emit(SyncEvent::Phase { phase });
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(events) = &self.events {
            // Receiver may be gone; progress is best effort
            let _ = events.send(event);
        }
    }
}

fn check(cancel: &CancelToken) -> Result<(), SyncError> {
    if cancel.is_cancelled() {
        Err(SyncError::Cancelled)
    } else {
        Ok(())
    }
}

/// Collapse repeated upstream ids, first occurrence wins
fn dedup(songs: Vec<SongDescriptor>) -> Vec<SongDescriptor> {
    let mut seen = HashSet::new();
    songs
        .into_iter()
        .filter(|song| seen.insert(song.upstream_id.clone()))
        .collect()
}
