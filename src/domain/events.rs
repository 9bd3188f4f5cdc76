//! Progress events emitted while a playlist is synchronized.
//!
//! The engine never renders anything itself. Callers that want feedback hand
//! it an [`EventSender`] and draw whatever they like from the stream.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Phases of a single synchronization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// Fetching upstream playlist metadata
    Resolving,

    /// Comparing upstream members against known songs
    Diffing,

    /// Retrieving the pending songs
    Downloading,

    /// Materializing the playlist's symlinks
    Linking,

    /// Synchronization finished
    Done,

    /// Synchronization stopped early (fetch failure or cancellation)
    Aborted,
}

impl SyncPhase {
    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Resolving => "Fetching playlist",
            Self::Diffing => "Comparing with library",
            Self::Downloading => "Downloading",
            Self::Linking => "Linking",
            Self::Done => "Done",
            Self::Aborted => "Aborted",
        }
    }

    /// Whether no further phase follows
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

/// A progress notification from the sync engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum SyncEvent {
    /// The engine entered a new phase
    Phase { phase: SyncPhase },

    /// Upstream metadata was resolved
    Resolved { title: String, member_count: usize },

    /// Members were partitioned into known and pending songs
    Diffed {
        already_downloaded: usize,
        pending: usize,
    },

    /// A pending song was retrieved and recorded
    SongRetrieved {
        upstream_id: String,
        title: String,
        artist: String,
    },

    /// Linking finished
    Linked { created: usize },

    /// The synchronization completed
    Finished,
}

/// Channel half the engine publishes progress on
pub type EventSender = mpsc::UnboundedSender<SyncEvent>;

/// Channel half callers receive progress from
pub type EventReceiver = mpsc::UnboundedReceiver<SyncEvent>;

/// Create a progress channel
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
