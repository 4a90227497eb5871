//! Task orchestration split into focused submodules.
//!
//! The `LiteDownloader` struct and its methods are organized by concern:
//! - [`queue`] - FIFO queue of accepted tasks
//! - [`queue_processor`] - Pulls tasks off the queue under the concurrency limit
//! - [`control`] - Submit, cancel, remove, retry and history queries
//! - [`lifecycle`] - Startup checks and graceful shutdown
//! - [`download_task`] - One task's pipeline (resolve, transfer, mux, move)
//! - [`background_tasks`] - Throttled progress reporting

mod background_tasks;
mod control;
mod download_task;
mod lifecycle;
mod queue;
mod queue_processor;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio::sync::{Mutex, Notify, Semaphore, broadcast};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::db::{Database, KeyValueStore};
use crate::error::{Error, Result};
use crate::extractor::StreamExtractor;
use crate::history::HistoryRepository;
use crate::muxing::{self, Muxer};
use crate::stream::{HttpStreamDownloader, StreamDownloader};
use crate::types::{DownloadOptions, Event, TaskId};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// The collaborators a downloader drives
///
/// [`LiteDownloader::new`] builds the production set (SQLite store, HTTP stream
/// downloader, ffmpeg muxer). Pass your own to [`LiteDownloader::with_components`] to swap
/// any of them.
#[derive(Clone)]
pub struct Components {
    /// Durable map holding the history collection
    pub store: Arc<dyn KeyValueStore>,
    /// Resolves video ids into streams
    pub extractor: Arc<dyn StreamExtractor>,
    /// Moves one stream's bytes to disk
    pub stream_downloader: Arc<dyn StreamDownloader>,
    /// Combines audio and video tracks
    pub muxer: Arc<dyn Muxer>,
}

/// Internal struct representing a task waiting in the queue
#[derive(Debug, Clone)]
pub(crate) struct QueuedTask {
    pub(crate) task_id: TaskId,
    pub(crate) options: DownloadOptions,
}

/// Queue and task ownership state
#[derive(Clone)]
pub(crate) struct QueueState {
    /// Accepted tasks in submission order
    pub(crate) queue: Arc<Mutex<VecDeque<QueuedTask>>>,
    /// Wakes the queue processor when a task is pushed
    pub(crate) queue_notify: Arc<Notify>,
    /// Limits concurrently running pipelines (max_concurrent_downloads)
    pub(crate) concurrent_limit: Arc<Semaphore>,
    /// Cancellation tokens of every task owned by this instance, queued or running
    pub(crate) active_tasks: Arc<Mutex<HashMap<TaskId, CancellationToken>>>,
    /// Cleared during shutdown
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Stops the queue processor
    pub(crate) shutdown_token: CancellationToken,
}

impl QueueState {
    fn new(max_concurrent: usize) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            queue_notify: Arc::new(Notify::new()),
            concurrent_limit: Arc::new(Semaphore::new(max_concurrent)),
            active_tasks: Arc::new(Mutex::new(HashMap::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
            shutdown_token: CancellationToken::new(),
        }
    }
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct LiteDownloader {
    /// Configuration
    pub(crate) config: Arc<Config>,
    /// Task history, the source of truth for every task's state
    pub(crate) history: Arc<HistoryRepository>,
    /// Injected collaborators
    pub(crate) components: Components,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Queue and task ownership state
    pub(crate) queue_state: QueueState,
}

impl LiteDownloader {
    /// Create a downloader with the production collaborators
    ///
    /// - Opens/creates the SQLite database and runs migrations
    /// - Builds the HTTP stream downloader from `config.http`
    /// - Picks a muxer from `config.tools` (explicit path, PATH lookup, or unavailable)
    ///
    /// The stream extractor is always supplied by the caller.
    pub async fn new(config: Config, extractor: Arc<dyn StreamExtractor>) -> Result<Self> {
        config.validate()?;

        let db = Database::new(&config.persistence.database_path).await?;
        let stream_downloader = HttpStreamDownloader::new(&config.http)?;
        let muxer = muxing::muxer_from_config(&config.tools);

        tracing::info!(
            muxer = muxer.name(),
            available = muxer.is_available(),
            "Muxer initialized"
        );

        Self::with_components(
            config,
            Components {
                store: Arc::new(db),
                extractor,
                stream_downloader: Arc::new(stream_downloader),
                muxer,
            },
        )
        .await
    }

    /// Create a downloader around caller-provided collaborators
    ///
    /// Creates the download and temp directories, checks how the previous session
    /// ended, and starts the queue processor.
    pub async fn with_components(config: Config, components: Components) -> Result<Self> {
        config.validate()?;

        create_dir(config.download_dir(), "download").await?;
        create_dir(config.temp_dir(), "temp").await?;

        let history = Arc::new(HistoryRepository::new(
            components.store.clone(),
            config.persistence.history_key.clone(),
        ));
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let queue_state = QueueState::new(config.download.max_concurrent_downloads);

        let downloader = Self {
            config: Arc::new(config),
            history,
            components,
            event_tx,
            queue_state,
        };

        downloader.check_previous_shutdown().await?;
        downloader.start_queue_processor();

        Ok(downloader)
    }

    /// Subscribe to task events
    ///
    /// Every subscriber receives every event emitted after it subscribed. A subscriber
    /// that falls more than 1000 events behind gets `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use lite_dl::LiteDownloader;
    /// # async fn example(downloader: LiteDownloader) {
    /// let mut events = downloader.subscribe();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         tracing::info!(?event, "download event");
    ///     }
    /// });
    /// # }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Emit an event to all subscribers
    ///
    /// With no subscribers the event is dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

async fn create_dir(path: &std::path::Path, what: &str) -> Result<()> {
    tokio::fs::create_dir_all(path).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!(
                "Failed to create {} directory '{}': {}",
                what,
                path.display(),
                e
            ),
        ))
    })
}
