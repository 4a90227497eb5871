//! Core types for lite-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::FailureKind;

/// Unique identifier for a download task
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a fresh random task id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl PartialEq<str> for TaskId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TaskId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a task produces
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadType {
    /// Best audio stream only
    AudioOnly,
    /// Best video stream only, no audio track
    VideoOnly,
    /// Best audio and best video, muxed into one container
    Muxed,
    /// The video's thumbnail image
    Thumbnail,
    /// One subtitle track
    Subtitle,
}

impl DownloadType {
    /// Whether the task needs the muxing step
    pub fn requires_mux(&self) -> bool {
        matches!(self, DownloadType::Muxed)
    }
}

impl std::fmt::Display for DownloadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DownloadType::AudioOnly => "audio_only",
            DownloadType::VideoOnly => "video_only",
            DownloadType::Muxed => "muxed",
            DownloadType::Thumbnail => "thumbnail",
            DownloadType::Subtitle => "subtitle",
        };
        f.write_str(s)
    }
}

/// Task status
///
/// ```text
/// Pending -> Downloading -> (Muxing) -> Completed
///    \            \            \
///     +------------+------------+--> Failed | Cancelled
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    /// Accepted and waiting for a worker (or resolving streams)
    Pending,
    /// Stream transfers in flight
    Downloading,
    /// Combining audio and video
    Muxing,
    /// Output written to its final location
    Completed,
    /// Ended with a categorized error
    Failed,
    /// Ended by user request
    Cancelled,
}

impl DownloadStatus {
    /// Completed, Failed and Cancelled never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadStatus::Completed | DownloadStatus::Failed | DownloadStatus::Cancelled
        )
    }

    /// Whether `next` is a legal successor of this status
    pub fn can_transition_to(&self, next: DownloadStatus) -> bool {
        use DownloadStatus::*;
        match (self, next) {
            (Pending, Downloading) => true,
            (Downloading, Muxing) => true,
            (Downloading | Muxing, Completed) => true,
            (Pending | Downloading | Muxing, Failed | Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DownloadStatus::Pending => "pending",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Muxing => "muxing",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Failed => "failed",
            DownloadStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Kind of elementary stream a transfer carries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Audio-only rendition
    Audio,
    /// Video-only rendition
    Video,
    /// Subtitle document
    Subtitle,
    /// Thumbnail image
    Thumbnail,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StreamKind::Audio => "audio",
            StreamKind::Video => "video",
            StreamKind::Subtitle => "subtitle",
            StreamKind::Thumbnail => "thumbnail",
        };
        f.write_str(s)
    }
}

/// Options for submitting a task
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DownloadOptions {
    /// Output file name without extension (None = sanitized video title)
    #[serde(default)]
    pub file_name: Option<String>,

    /// Override the configured download directory
    #[serde(default)]
    pub destination: Option<PathBuf>,

    /// Upper bound for the selected video height in pixels
    #[serde(default)]
    pub max_video_height: Option<u32>,

    /// Preferred subtitle language code (None = first available track)
    #[serde(default)]
    pub subtitle_language: Option<String>,
}

/// Event emitted after every persisted task transition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task accepted and persisted as pending
    Queued {
        /// Task ID
        task_id: TaskId,
        /// Source video id
        vid: String,
        /// Requested output kind
        download_type: DownloadType,
    },

    /// Streams resolved, output location decided
    Resolved {
        /// Task ID
        task_id: TaskId,
        /// Output file name
        file_name: String,
    },

    /// Aggregate progress advanced
    Downloading {
        /// Task ID
        task_id: TaskId,
        /// Progress percentage (0 to 100)
        percent: u8,
        /// Bytes received across all streams
        downloaded_bytes: u64,
        /// Expected bytes across all streams (0 if unknown)
        total_bytes: u64,
    },

    /// Muxing started
    Muxing {
        /// Task ID
        task_id: TaskId,
    },

    /// Task completed
    Complete {
        /// Task ID
        task_id: TaskId,
        /// Final output path
        path: PathBuf,
    },

    /// Task failed
    Failed {
        /// Task ID
        task_id: TaskId,
        /// Failure category
        kind: FailureKind,
        /// Error message (as recorded in history)
        error: String,
    },

    /// Task cancelled by the user
    Cancelled {
        /// Task ID
        task_id: TaskId,
    },

    /// Record deleted from history
    Removed {
        /// Task ID
        task_id: TaskId,
    },

    /// History emptied
    HistoryCleared,

    /// Graceful shutdown completed
    Shutdown,
}

impl Event {
    /// The task this event belongs to, if any
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            Event::Queued { task_id, .. }
            | Event::Resolved { task_id, .. }
            | Event::Downloading { task_id, .. }
            | Event::Muxing { task_id }
            | Event::Complete { task_id, .. }
            | Event::Failed { task_id, .. }
            | Event::Cancelled { task_id }
            | Event::Removed { task_id } => Some(task_id),
            Event::HistoryCleared | Event::Shutdown => None,
        }
    }
}
