//! Error types for lite-dl
//!
//! This module provides the error handling for the library:
//! - [`Error`], the crate-wide error returned by public operations
//! - [`DownloadError`], the failure taxonomy a task pipeline records on its history entry
//!   (connection, muxing, storage)
//! - [`DatabaseError`] for the SQLite-backed key-value store

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for lite-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed low-level cause carried by a [`DownloadError`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for lite-dl
///
/// This is the error type returned by the public API. Failures that happen *inside* a
/// running task are not surfaced here; they end up as a [`DownloadError`] recorded on the
/// task's history entry.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download_dir")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Categorized task failure
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Task not found in history
    #[error("task not found: {0}")]
    NotFound(String),

    /// Operation not allowed in the task's current state
    #[error("cannot {operation} task {task_id} in state {current_state}")]
    InvalidState {
        /// The task the operation targeted
        task_id: String,
        /// The operation that was attempted (e.g., "cancel", "retry")
        operation: String,
        /// The state that prevents the operation
        current_state: String,
    },

    /// Rejected submission (empty video id, unusable options)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Shutdown in progress - not accepting new tasks
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,

    /// The stream extractor could not resolve a video
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// External tool execution failed (ffmpeg)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, not implemented, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Failure category of a task, persisted next to the error message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Network or extraction failure (resolve or transfer stage)
    Connection,
    /// Combining audio and video into one container failed
    Muxing,
    /// Local filesystem failure (create, write, move, delete)
    Storage,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::Connection => "connection",
            FailureKind::Muxing => "muxing",
            FailureKind::Storage => "storage",
        };
        f.write_str(s)
    }
}

/// Categorized failure of a download task
///
/// Every pipeline stage converts its low-level errors into one of these variants at the
/// stage boundary. The `Display` output is what ends up in the history record's
/// `error_message`.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network or extraction failure
    #[error("connection error: {message}: {source}")]
    Connection {
        /// Human-readable description of what was being attempted
        message: String,
        /// Originating low-level cause
        #[source]
        source: BoxError,
    },

    /// Muxing failure
    #[error("muxing error: {message}: {source}")]
    Muxing {
        /// Human-readable description of what was being attempted
        message: String,
        /// Originating low-level cause
        #[source]
        source: BoxError,
    },

    /// Local storage failure
    #[error("storage error: {message}: {source}")]
    Storage {
        /// Human-readable description of what was being attempted
        message: String,
        /// Originating low-level cause
        #[source]
        source: BoxError,
    },
}

impl DownloadError {
    /// Build a connection-category failure
    pub fn connection(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Connection {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Build a muxing-category failure
    pub fn muxing(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Muxing {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Build a storage-category failure
    pub fn storage(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Storage {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Storage failure for an I/O error on a specific path
    pub fn storage_at(action: &str, path: &std::path::Path, source: std::io::Error) -> Self {
        Self::storage(format!("failed to {} {}", action, path.display()), source)
    }

    /// The failure category
    pub fn kind(&self) -> FailureKind {
        match self {
            DownloadError::Connection { .. } => FailureKind::Connection,
            DownloadError::Muxing { .. } => FailureKind::Muxing,
            DownloadError::Storage { .. } => FailureKind::Storage,
        }
    }

    /// The human-readable message without the category prefix or cause
    pub fn message(&self) -> &str {
        match self {
            DownloadError::Connection { message, .. }
            | DownloadError::Muxing { message, .. }
            | DownloadError::Storage { message, .. } => message,
        }
    }
}

/// Path helper used when a move hits an existing file with `FileCollisionAction::Skip`
#[derive(Debug, Error)]
#[error("file already exists at {}", path.display())]
pub struct FileCollision {
    /// The occupied destination
    pub path: PathBuf,
}
