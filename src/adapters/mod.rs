//! Adapter interfaces for external systems.
//!
//! The sync engine talks to the outside world only through two traits:
//! a [`Fetcher`] that resolves playlist metadata and a [`Downloader`] that
//! retrieves songs. The shipped implementations shell out to `yt-dlp`.

pub mod normalize;
pub mod toolchain;
pub mod ytdlp;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{PlaylistMetadata, RawMember, RetrievedSong, SongDescriptor};

pub use normalize::{normalize_members, split_artist_title};
pub use toolchain::{Toolchain, ToolchainLocation};
pub use ytdlp::{YtDlpDownloader, YtDlpFetcher};

/// Callback invoked once per successfully retrieved song
pub type OnRetrieved<'a> = dyn FnMut(RetrievedSong) -> Result<()> + Send + 'a;

/// Resolves upstream playlists into canonical metadata
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Human-readable fetcher name
    fn name(&self) -> &str;

    /// Fetch metadata for each playlist id.
    ///
    /// Failures are per id: a playlist that cannot be resolved is logged and
    /// left out of the result.
    async fn fetch_playlist_metadata(&self, upstream_ids: &[String]) -> Vec<PlaylistMetadata>;

    /// Turn raw entries into deduplicated, available songs
    fn normalize_members(&self, raw_members: &[RawMember]) -> Vec<SongDescriptor> {
        normalize_members(raw_members)
    }
}

/// Retrieves, transcodes and tags songs into a destination directory
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Human-readable downloader name
    fn name(&self) -> &str;

    /// Retrieve `songs` one at a time, in order.
    ///
    /// `on_success` runs synchronously after each retrieved song. A song that
    /// fails is logged and skipped; the batch carries on. An error returned by
    /// `on_success` stops the batch and is returned.
    async fn run(
        &self,
        songs: &[SongDescriptor],
        destination_dir: &Path,
        toolchain_hint: Option<&Path>,
        on_success: &mut OnRetrieved<'_>,
    ) -> Result<()>;
}
