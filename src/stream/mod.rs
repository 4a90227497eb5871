//! Retrieval of one elementary stream to local storage
//!
//! A [`StreamDownloader`] moves the bytes of a single resolved stream (audio, video,
//! subtitle or thumbnail) into a file. It reports byte-level progress through a shared
//! [`StreamProgress`], stops cooperatively when its cancellation token fires, and never
//! retries. Retry policy belongs to the orchestrator.

mod http;

pub use http::HttpStreamDownloader;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

use crate::error::DownloadError;
use crate::types::StreamKind;

/// What to fetch
#[derive(Clone, Debug, PartialEq)]
pub struct StreamRequest {
    /// Direct stream URL
    pub url: String,
    /// What the stream carries
    pub kind: StreamKind,
    /// Size advertised by the extractor, if any
    pub expected_size: Option<u64>,
}

/// Result of a transfer that did not fail
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Every byte is on disk at `path`
    Completed {
        /// Where the bytes were written
        path: PathBuf,
        /// Number of bytes written
        bytes: u64,
    },
    /// Cancellation was observed; the partial file has been removed
    Cancelled,
}

/// Live byte counters of one transfer, shared between the downloader and the progress reporter
#[derive(Debug, Default)]
pub struct StreamProgress {
    downloaded: AtomicU64,
    total: AtomicU64,
}

impl StreamProgress {
    /// Counters starting at zero, with the total known up front if the extractor had it
    pub fn new(expected_size: Option<u64>) -> Self {
        Self {
            downloaded: AtomicU64::new(0),
            total: AtomicU64::new(expected_size.unwrap_or(0)),
        }
    }

    /// Count `bytes` more as received
    pub fn add(&self, bytes: u64) {
        self.downloaded.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record the total size once the server reports it
    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    /// Bytes received so far
    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed)
    }

    /// Expected size in bytes (0 = unknown)
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Received share as a percentage, clamped to 0..=100 (0 while the total is unknown)
    pub fn percent(&self) -> u8 {
        percent_of(self.downloaded(), self.total())
    }
}

/// `floor(100 * done / total)` clamped to 100, or 0 when `total` is 0
pub(crate) fn percent_of(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (u128::from(done) * 100 / u128::from(total)).min(100);
    pct as u8
}

/// Retrieves one stream into a local file
#[async_trait]
pub trait StreamDownloader: Send + Sync {
    /// Fetch `request` into `destination`
    ///
    /// Returns [`StreamOutcome::Cancelled`] (not an error) when `cancel` fires, after removing
    /// the partial file. Transport failures are connection-category, local write failures
    /// are storage-category.
    async fn download(
        &self,
        request: &StreamRequest,
        destination: &Path,
        progress: &StreamProgress,
        cancel: &CancellationToken,
    ) -> std::result::Result<StreamOutcome, DownloadError>;
}
