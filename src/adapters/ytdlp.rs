//! `yt-dlp` backed fetcher and downloader.
//!
//! Both adapters spawn the `yt-dlp` binary as a subprocess. Metadata comes
//! from `--flat-playlist --dump-single-json`; songs are extracted to m4a
//! with ffmpeg and then re-tagged with the normalized artist and title.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lofty::config::WriteOptions;
use lofty::prelude::*;
use lofty::tag::Tag;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{Downloader, Fetcher, OnRetrieved};
use crate::domain::{PlaylistMetadata, RawMember, RetrievedSong, SongDescriptor};

const DEFAULT_BINARY: &str = "yt-dlp";
const PLAYLIST_URL: &str = "https://www.youtube.com/playlist?list=";
const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Extension of every file the downloader produces
pub const MEDIA_EXTENSION: &str = "m4a";

/// Fetches playlist metadata with `yt-dlp`
pub struct YtDlpFetcher {
    binary_path: String,
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl YtDlpFetcher {
    pub fn new() -> Self {
        Self::with_binary_path(DEFAULT_BINARY)
    }

    pub fn with_binary_path(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    async fn fetch_one(&self, upstream_id: &str) -> Result<PlaylistMetadata> {
        let url = format!("{PLAYLIST_URL}{upstream_id}");
        let output = Command::new(&self.binary_path)
            .args(["--flat-playlist", "--dump-single-json", "--no-warnings"])
            .arg(&url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run {} for playlist '{}'", self.binary_path, upstream_id))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "{} failed for playlist '{}' with exit code {}: {}",
                self.binary_path,
                upstream_id,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        let playlist: FlatPlaylist = serde_json::from_slice(&output.stdout)
            .with_context(|| format!("Failed to parse metadata for playlist '{}'", upstream_id))?;

        Ok(playlist.into_metadata())
    }
}

#[async_trait]
impl Fetcher for YtDlpFetcher {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn fetch_playlist_metadata(&self, upstream_ids: &[String]) -> Vec<PlaylistMetadata> {
        let mut playlists = Vec::with_capacity(upstream_ids.len());

        for upstream_id in upstream_ids {
            match self.fetch_one(upstream_id).await {
                Ok(playlist) => {
                    debug!(
                        upstream_id = %upstream_id,
                        members = playlist.raw_members.len(),
                        "Fetched playlist metadata"
                    );
                    playlists.push(playlist);
                }
                Err(e) => {
                    warn!(upstream_id = %upstream_id, error = %e, "Failed to fetch playlist");
                }
            }
        }

        playlists
    }
}

/// `--dump-single-json` output for a flat playlist
#[derive(Debug, Deserialize)]
struct FlatPlaylist {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    playlist_count: Option<usize>,
    #[serde(default)]
    entries: Vec<Option<FlatEntry>>,
}

#[derive(Debug, Deserialize)]
struct FlatEntry {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
}

impl FlatPlaylist {
    fn into_metadata(self) -> PlaylistMetadata {
        let raw_members: Vec<RawMember> = self
            .entries
            .into_iter()
            .flatten()
            .map(|entry| RawMember {
                id: entry.id,
                title: entry.title.unwrap_or_default(),
                channel: entry.channel.or(entry.uploader),
            })
            .collect();

        PlaylistMetadata {
            title: self.title.unwrap_or_else(|| self.id.clone()),
            member_count: self.playlist_count.unwrap_or(raw_members.len()),
            id: self.id,
            raw_members,
        }
    }
}

/// Retrieves songs with `yt-dlp` and tags them with `lofty`
pub struct YtDlpDownloader {
    binary_path: String,
}

impl Default for YtDlpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl YtDlpDownloader {
    pub fn new() -> Self {
        Self::with_binary_path(DEFAULT_BINARY)
    }

    pub fn with_binary_path(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Retrieve one song, returning the path of the produced file
    async fn retrieve(
        &self,
        song: &SongDescriptor,
        destination_dir: &Path,
        temp_dir: &Path,
        toolchain_hint: Option<&Path>,
    ) -> Result<PathBuf> {
        let stem = media_file_stem(song);

        let mut command = Command::new(&self.binary_path);
        command
            .args([
                "--quiet",
                "--no-warnings",
                "--no-playlist",
                "--format",
                "m4a/bestaudio/best",
                "--extract-audio",
                "--audio-format",
                MEDIA_EXTENSION,
                "--embed-metadata",
                "--embed-thumbnail",
            ])
            .arg("--output")
            .arg(format!("{}.%(ext)s", stem.replace('%', "%%")))
            .arg("--paths")
            .arg(format!("home:{}", destination_dir.display()))
            .arg("--paths")
            .arg(format!("temp:{}", temp_dir.display()));

        if let Some(dir) = toolchain_hint {
            command.arg("--ffmpeg-location").arg(dir);
        }

        let output = command
            .arg(format!("{WATCH_URL}{}", song.upstream_id))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to spawn {}", self.binary_path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "{} exited with code {}: {}",
                self.binary_path,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        let file_path = destination_dir.join(format!("{stem}.{MEDIA_EXTENSION}"));
        if !file_path.is_file() {
            anyhow::bail!("Expected output file missing: {}", file_path.display());
        }

        let (path, title, artist) = (file_path.clone(), song.title.clone(), song.artist.clone());
        let tagged = tokio::task::spawn_blocking(move || write_tags(&path, &title, &artist))
            .await
            .context("Tagging task panicked")?;
        if let Err(e) = tagged {
            warn!(file = %file_path.display(), error = %e, "Failed to refine tags, keeping embedded metadata");
        }

        Ok(file_path)
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn run(
        &self,
        songs: &[SongDescriptor],
        destination_dir: &Path,
        toolchain_hint: Option<&Path>,
        on_success: &mut OnRetrieved<'_>,
    ) -> Result<()> {
        let temp_dir = tempfile::tempdir().context("Failed to create temp dir")?;
        let total = songs.len();

        for (index, song) in songs.iter().enumerate() {
            info!(
                "Downloading ({}/{}) {} - {}",
                index + 1,
                total,
                song.artist,
                song.title
            );

            match self
                .retrieve(song, destination_dir, temp_dir.path(), toolchain_hint)
                .await
            {
                Ok(file_path) => on_success(RetrievedSong {
                    upstream_id: song.upstream_id.clone(),
                    title: song.title.clone(),
                    artist: song.artist.clone(),
                    file_path,
                })?,
                Err(e) => {
                    warn!(
                        link = %song.link(),
                        error = %e,
                        "Error occurred while downloading, skipping"
                    );
                }
            }
        }

        Ok(())
    }
}

/// File stem the downloader writes a song under: "Artist - Title"
pub fn media_file_stem(song: &SongDescriptor) -> String {
    format!("{} - {}", song.artist, song.title)
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '-',
            c => c,
        })
        .collect()
}

/// Overwrite title and artist on a media file
fn write_tags(path: &Path, title: &str, artist: &str) -> Result<()> {
    let mut tagged_file = lofty::read_from_path(path).context("Failed to read media file")?;

    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }

    let tag = tagged_file
        .tag_mut(tag_type)
        .context("Media file has no writable tag")?;
    tag.set_title(title.to_string());
    tag.set_artist(artist.to_string());

    tag.save_to_path(path, WriteOptions::default())
        .context("Failed to save tags to disk")?;

    Ok(())
}
