//! # lite-dl
//!
//! Download-task engine for media clients.
//!
//! A task names a video id and what to keep of it (muxed audio+video, audio only,
//! video only, a thumbnail or a subtitle track). lite-dl resolves the streams through a
//! caller-supplied [`StreamExtractor`], fetches them concurrently, muxes them with ffmpeg
//! when required, moves the result into the download directory and keeps a durable
//! history of every task.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - No CLI or UI, the host application owns the surface
//! - **Event-driven** - Consumers subscribe to [`Event`]s instead of polling
//! - **History is the source of truth** - Every state change is persisted before it is announced
//! - **Pluggable collaborators** - Extraction, transfer, muxing and storage sit behind traits
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use lite_dl::{Config, DownloadType, LiteDownloader, StreamDetails, StreamExtractor};
//!
//! struct MyExtractor;
//!
//! #[async_trait::async_trait]
//! impl StreamExtractor for MyExtractor {
//!     async fn extract(&self, vid: &str) -> lite_dl::Result<StreamDetails> {
//!         Err(lite_dl::Error::Extraction(format!("no resolver for {vid}")))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = LiteDownloader::new(Config::default(), Arc::new(MyExtractor)).await?;
//!
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let task_id = downloader.submit("dQw4w9WgXcQ", DownloadType::AudioOnly).await?;
//!     println!("queued {task_id}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Durable key-value persistence
pub mod db;
/// Task orchestration (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Stream-extraction collaborator
pub mod extractor;
/// Task history records and repository
pub mod history;
/// Audio/video muxing
pub mod muxing;
/// Single-stream retrieval
pub mod stream;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, DownloadConfig, FileCollisionAction, HttpConfig, PersistenceConfig, ToolsConfig};
pub use db::{Database, KeyValueStore, MemoryStore};
pub use downloader::{Components, LiteDownloader};
pub use error::{DatabaseError, DownloadError, Error, FailureKind, FileCollision, Result};
pub use extractor::{StreamDescriptor, StreamDetails, StreamExtractor, SubtitleTrack};
pub use history::{DownloadRecord, HistoryRepository};
pub use muxing::{FfmpegMuxer, Muxer, UnavailableMuxer};
pub use stream::{HttpStreamDownloader, StreamDownloader, StreamOutcome, StreamProgress, StreamRequest};
pub use types::{DownloadOptions, DownloadStatus, DownloadType, Event, StreamKind, TaskId};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal, then shuts the downloader down: queued tasks are
/// cancelled, running tasks are stopped and the session is marked clean.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use lite_dl::{LiteDownloader, Config, StreamExtractor, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     # let extractor: Arc<dyn StreamExtractor> = unimplemented!();
///     let downloader = LiteDownloader::new(Config::default(), extractor).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(downloader).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: LiteDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
