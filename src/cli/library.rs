//! Library CLI subcommands for inspecting tracked playlists and songs.
//!
//! Provides commands to:
//! - `playlists list|enable|disable`: Show and toggle selective sync
//! - `songs list`: Show stored songs, optionally for one playlist

use std::collections::HashMap;

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::config::ResolvedConfig;
use crate::core::PlaylistStore;

/// Playlist-related subcommands
#[derive(Subcommand, Debug)]
pub enum PlaylistCommands {
    /// List tracked playlists
    List,

    /// Include a playlist in `sync --all`
    Enable {
        /// Upstream playlist ID
        playlist_id: String,
    },

    /// Exclude a playlist from `sync --all`
    Disable {
        /// Upstream playlist ID
        playlist_id: String,
    },
}

/// Song-related subcommands
#[derive(Subcommand, Debug)]
pub enum SongCommands {
    /// List stored songs
    List {
        /// Only songs in this upstream playlist
        #[arg(short, long)]
        playlist: Option<String>,
    },
}

fn open_store(config: &ResolvedConfig) -> Result<PlaylistStore> {
    PlaylistStore::open(&config.database_path).with_context(|| {
        format!(
            "Failed to open database: {}",
            config.database_path.display()
        )
    })
}

/// Execute playlist subcommands
pub async fn execute_playlists(config: &ResolvedConfig, command: PlaylistCommands) -> Result<()> {
    let store = open_store(config)?;

    match command {
        PlaylistCommands::List => {
            let playlists = store.list_playlists()?;
            if playlists.is_empty() {
                println!("No playlists tracked yet");
                return Ok(());
            }

            println!(
                "{:<36} {:<8} {:<20} {}",
                "PLAYLIST ID", "ENABLED", "LAST SYNCED", "NAME"
            );
            println!("{}", "-".repeat(90));

            for playlist in playlists {
                let songs = store.songs_in_playlist(&playlist.local_id)?.len();
                println!(
                    "{:<36} {:<8} {:<20} {} ({} songs)",
                    playlist.upstream_id,
                    if playlist.enabled { "yes" } else { "no" },
                    playlist.last_synced_at.format("%Y-%m-%d %H:%M"),
                    playlist.display_name,
                    songs
                );
            }
        }
        PlaylistCommands::Enable { playlist_id } => set_enabled(&store, &playlist_id, true)?,
        PlaylistCommands::Disable { playlist_id } => set_enabled(&store, &playlist_id, false)?,
    }

    Ok(())
}

fn set_enabled(store: &PlaylistStore, playlist_id: &str, enabled: bool) -> Result<()> {
    if !store.set_playlist_enabled(playlist_id, enabled)? {
        anyhow::bail!("Playlist '{}' is not tracked", playlist_id);
    }

    let state = if enabled { "enabled" } else { "disabled" };
    println!("✅ Playlist {} {}", playlist_id, state);
    Ok(())
}

/// Execute song subcommands
pub async fn execute_songs(config: &ResolvedConfig, command: SongCommands) -> Result<()> {
    let store = open_store(config)?;

    match command {
        SongCommands::List { playlist } => {
            let songs = match playlist {
                Some(upstream_id) => {
                    let record = store
                        .find_playlist_by_upstream_id(&upstream_id)?
                        .with_context(|| format!("Playlist '{}' is not tracked", upstream_id))?;
                    store.songs_in_playlist(&record.local_id)?
                }
                None => store.list_songs()?,
            };

            if songs.is_empty() {
                println!("No songs found");
                return Ok(());
            }

            let names: HashMap<_, _> = store
                .list_playlists()?
                .into_iter()
                .map(|p| (p.local_id, p.display_name))
                .collect();

            for song in songs {
                let file_name = song
                    .file_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let playlists: Vec<&str> = song
                    .member_playlists
                    .iter()
                    .filter_map(|id| names.get(id).map(String::as_str))
                    .collect();

                println!("🎵 {}", file_name);
                println!("   ID: {}  Playlists: {}", song.upstream_id, playlists.join(", "));
            }
        }
    }

    Ok(())
}
