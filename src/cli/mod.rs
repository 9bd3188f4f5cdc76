//! Command-line interface for msync.
//!
//! Provides commands for synchronizing playlists, inspecting the tracked
//! library, checking the ffmpeg toolchain and showing configuration.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use crate::adapters::{Downloader, Fetcher, Toolchain, ToolchainLocation, YtDlpDownloader, YtDlpFetcher};
use crate::config::{load_config, ConfigOverrides, ResolvedConfig};
use crate::core::{parse_playlist_file, CancelHandle, CancelToken, PlaylistStore, SyncEngine, SyncError};
use crate::domain::events::{self, EventReceiver};
use crate::domain::{SyncEvent, SyncPhase, SyncReport};
use crate::library::LibraryLayout;

pub mod library;

/// Exit status after Ctrl-C
const EXIT_INTERRUPTED: i32 = 130;

const SPINNER_INTERVAL: Duration = Duration::from_millis(250);

/// msync - Mirror remote playlists into a local music library
#[derive(Parser, Debug)]
#[command(name = "msync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (skips discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database path
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Shared storage directory for downloaded songs
    #[arg(long, global = true)]
    pub storage: Option<PathBuf>,

    /// Music directory holding one folder per playlist
    #[arg(long, global = true)]
    pub music: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synchronize playlists into the library
    Sync {
        /// Upstream playlist IDs
        playlist_ids: Vec<String>,

        /// Read playlist IDs from a file, one per line (# starts a comment)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Synchronize every enabled tracked playlist
        #[arg(short, long)]
        all: bool,
    },

    /// Manage tracked playlists
    Playlists {
        #[command(subcommand)]
        command: library::PlaylistCommands,
    },

    /// Inspect stored songs
    Songs {
        #[command(subcommand)]
        command: library::SongCommands,
    },

    /// Show where ffmpeg is found
    Ffmpeg,

    /// Show resolved configuration
    Config,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_file: self.config.clone(),
            database: self.db.clone(),
            storage: self.storage.clone(),
            music: self.music.clone(),
        }
    }

    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = load_config(&self.overrides())?;

        match self.command {
            Commands::Sync {
                playlist_ids,
                file,
                all,
            } => run_sync(&config, playlist_ids, file, all).await,
            Commands::Playlists { command } => library::execute_playlists(&config, command).await,
            Commands::Songs { command } => library::execute_songs(&config, command).await,
            Commands::Ffmpeg => show_ffmpeg(&config).await,
            Commands::Config => show_config(&config).await,
        }
    }
}

/// Synchronize every requested playlist in order
async fn run_sync(
    config: &ResolvedConfig,
    playlist_ids: Vec<String>,
    file: Option<PathBuf>,
    all: bool,
) -> Result<()> {
    let mut store = PlaylistStore::open(&config.database_path).with_context(|| {
        format!("Failed to open database: {}", config.database_path.display())
    })?;

    let mut upstream_ids = playlist_ids;
    if let Some(path) = file {
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read playlist file: {}", path.display()))?;
        upstream_ids.extend(parse_playlist_file(&content));
    }
    if all {
        upstream_ids.extend(
            store
                .list_playlists()?
                .into_iter()
                .filter(|p| p.enabled)
                .map(|p| p.upstream_id),
        );
    }
    let upstream_ids = unique(upstream_ids);

    if upstream_ids.is_empty() {
        anyhow::bail!("No playlists to synchronize. Pass playlist IDs, --file <FILE> or --all");
    }

    let toolchain_hint = match &config.ffmpeg_location {
        Some(dir) => Some(dir.clone()),
        None => match locate_toolchain(&config.builds_dir).await? {
            ToolchainLocation::Missing => {
                warn!("ffmpeg not found, audio extraction will fail. Run `msync ffmpeg` for details");
                None
            }
            location => location.directory().map(Path::to_path_buf),
        },
    };

    let (events_tx, mut events_rx) = events::channel();
    let engine = SyncEngine::new(
        YtDlpFetcher::with_binary_path(&config.yt_dlp),
        YtDlpDownloader::with_binary_path(&config.yt_dlp),
        LibraryLayout::new(&config.storage_dir, &config.music_dir),
    )
    .with_toolchain_hint(toolchain_hint)
    .with_events(events_tx);

    // Set up Ctrl+C handler
    let (cancel_handle, cancel) = CancelHandle::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_handle.cancel();
        }
    });

    for upstream_id in &upstream_ids {
        let result = drive(&engine, &mut store, upstream_id, &cancel, &mut events_rx).await;

        match result {
            Ok(report) => {
                print_report(&report);
                // Ctrl-C after the last cancellation point still stops the batch
                if cancel.is_cancelled() {
                    exit_interrupted();
                }
            }
            Err(SyncError::Cancelled) => exit_interrupted(),
            Err(e @ SyncError::Fetch(_)) => {
                eprintln!("❌ {}, skipping", e);
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to synchronize playlist '{}'", upstream_id));
            }
        }
    }

    Ok(())
}

fn exit_interrupted() -> ! {
    println!();
    println!("Exiting... (user interrupt)");
    std::process::exit(EXIT_INTERRUPTED);
}

/// Await one sync while rendering its progress events
async fn drive<F: Fetcher, D: Downloader>(
    engine: &SyncEngine<F, D>,
    store: &mut PlaylistStore,
    upstream_id: &str,
    cancel: &CancelToken,
    events: &mut EventReceiver,
) -> Result<SyncReport, SyncError> {
    let sync = engine.synchronize(store, upstream_id, cancel);
    tokio::pin!(sync);

    let mut ticker = tokio::time::interval(SPINNER_INTERVAL);
    let mut progress = Progress::default();

    loop {
        tokio::select! {
            result = &mut sync => {
                while let Ok(event) = events.try_recv() {
                    progress.render(event);
                }
                progress.stop_spinner();
                return result;
            }
            Some(event) = events.recv() => progress.render(event),
            _ = ticker.tick() => progress.tick(),
        }
    }
}

/// Terminal rendering of sync events
#[derive(Default)]
struct Progress {
    /// Phase whose label the spinner is animating
    spinner: Option<SyncPhase>,
    frame: usize,
}

impl Progress {
    fn render(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Phase {
                phase: SyncPhase::Resolving,
            } => self.spinner = Some(SyncPhase::Resolving),
            SyncEvent::Phase { phase } if phase.is_terminal() => self.stop_spinner(),
            SyncEvent::Phase { phase } => {
                self.stop_spinner();
                if phase == SyncPhase::Downloading {
                    println!("   {}...", phase.label());
                }
            }
            SyncEvent::Resolved {
                title,
                member_count,
            } => {
                self.stop_spinner();
                println!("📋 {} ({} songs)", title, member_count);
            }
            SyncEvent::Diffed {
                already_downloaded,
                pending,
            } => {
                println!(
                    "   {} already downloaded, {} to download",
                    already_downloaded, pending
                );
            }
            SyncEvent::SongRetrieved { title, artist, .. } => {
                println!("   ⬇️  {} - {}", artist, title);
            }
            SyncEvent::Linked { created } if created > 0 => {
                println!("   🔗 {} new link(s)", created);
            }
            SyncEvent::Linked { .. } | SyncEvent::Finished => {}
        }
    }

    fn tick(&mut self) {
        let Some(phase) = self.spinner else {
            return;
        };
        let dots = ".".repeat(self.frame % 3 + 1);
        print!("\r{}{:<3}", phase.label(), dots);
        let _ = io::stdout().flush();
        self.frame += 1;
    }

    fn stop_spinner(&mut self) {
        if let Some(phase) = self.spinner.take() {
            print!("\r{}\r", " ".repeat(phase.label().len() + 3));
            let _ = io::stdout().flush();
            self.frame = 0;
        }
    }
}

fn print_report(report: &SyncReport) {
    for song in &report.skipped {
        println!(
            "   ⚠️  Skipped {} - {} ({})",
            song.artist,
            song.title,
            song.link()
        );
    }
    if report.link_failures > 0 {
        println!("   ⚠️  {} song(s) could not be linked", report.link_failures);
    }

    println!(
        "✅ Synchronized '{}': {} songs, {} new",
        report.title, report.member_count, report.retrieved
    );
}

/// Order-preserving dedup of playlist ids
fn unique(ids: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

async fn locate_toolchain(builds_dir: &Path) -> Result<ToolchainLocation> {
    let toolchain = Toolchain::new(builds_dir);
    tokio::task::spawn_blocking(move || toolchain.locate())
        .await
        .context("Toolchain discovery panicked")
}

/// Report the ffmpeg toolchain msync will use
async fn show_ffmpeg(config: &ResolvedConfig) -> Result<()> {
    if let Some(dir) = &config.ffmpeg_location {
        println!("FFmpeg location set in config: {}", dir.display());
        return Ok(());
    }

    match locate_toolchain(&config.builds_dir).await? {
        ToolchainLocation::Missing => {
            println!("FFmpeg is not installed.");
            println!(
                "Install ffmpeg and ffprobe on your PATH, or place a build in {}",
                config.builds_dir.display()
            );
        }
        location => {
            println!("FFmpeg is installed with parameter '{}'", location.label());
            if let Some(dir) = location.directory() {
                println!("  {}", dir.display());
            }
        }
    }

    Ok(())
}

/// Show resolved configuration
async fn show_config(config: &ResolvedConfig) -> Result<()> {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("  msync Configuration");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!(
        "Config file: {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!("Platform:    {}", config.platform.label());
    println!();
    println!("Paths:");
    println!("  Data:          {}", config.data_dir.display());
    println!("  Database:      {}", config.database_path.display());
    println!("  Storage:       {}", config.storage_dir.display());
    println!("  Music:         {}", config.music_dir.display());
    println!("  FFmpeg builds: {}", config.builds_dir.display());
    println!();
    println!("Downloader:");
    println!("  yt-dlp:          {}", config.yt_dlp);
    println!(
        "  ffmpeg location: {}",
        config
            .ffmpeg_location
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(auto-detect)".to_string())
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_sync_ids() {
        let cli = Cli::parse_from(["msync", "sync", "PL1", "PL2", "--db", "/tmp/x.db"]);
        match cli.command {
            Commands::Sync {
                playlist_ids,
                file,
                all,
            } => {
                assert_eq!(playlist_ids, vec!["PL1", "PL2"]);
                assert!(file.is_none());
                assert!(!all);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.db")));
    }

    #[test]
    fn test_cli_parses_playlist_toggle() {
        let cli = Cli::parse_from(["msync", "playlists", "disable", "PL1"]);
        assert!(matches!(
            cli.command,
            Commands::Playlists {
                command: library::PlaylistCommands::Disable { .. }
            }
        ));
    }

    #[test]
    fn test_unique_preserves_order() {
        let ids = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(unique(ids), vec!["b", "a"]);
    }

    #[test]
    fn test_progress_spinner_only_while_fetching() {
        let mut progress = Progress::default();
        progress.tick();
        assert_eq!(progress.frame, 0);

        progress.render(SyncEvent::Phase {
            phase: SyncPhase::Resolving,
        });
        progress.tick();
        assert_eq!(progress.frame, 1);

        progress.render(SyncEvent::Resolved {
            title: "Mix".to_string(),
            member_count: 2,
        });
        assert!(progress.spinner.is_none());
    }

    #[test]
    fn test_progress_terminal_phase_stops_spinner() {
        let mut progress = Progress::default();
        progress.render(SyncEvent::Phase {
            phase: SyncPhase::Resolving,
        });
        progress.tick();

        progress.render(SyncEvent::Phase {
            phase: SyncPhase::Aborted,
        });
        assert!(progress.spinner.is_none());
        assert_eq!(progress.frame, 0);
    }
}
