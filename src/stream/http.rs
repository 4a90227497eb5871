//! HTTP implementation of [`StreamDownloader`].

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, RANGE};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use super::{StreamDownloader, StreamOutcome, StreamProgress, StreamRequest};
use crate::config::HttpConfig;
use crate::error::{DownloadError, Error, Result};
use crate::utils::remove_path_quietly;

/// What a HEAD probe learned about the resource
#[derive(Debug, Default)]
struct Probe {
    total: Option<u64>,
    accepts_ranges: bool,
}

/// Streams a URL into a file with `reqwest`
///
/// When the server advertises `Accept-Ranges: bytes` and a content length, the body is
/// split into contiguous ranges fetched in parallel and written at their offsets.
/// Otherwise a single GET is streamed chunk by chunk.
pub struct HttpStreamDownloader {
    client: reqwest::Client,
    read_timeout: Duration,
    connections: usize,
    min_chunk_size: u64,
}

impl HttpStreamDownloader {
    /// Build a downloader from transport settings
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            read_timeout: config.read_timeout,
            connections: config.connections_per_stream.max(1),
            min_chunk_size: config.min_chunk_size.max(1),
        })
    }

    /// Override the smallest range worth its own connection
    pub fn with_min_chunk_size(mut self, min_chunk_size: u64) -> Self {
        self.min_chunk_size = min_chunk_size.max(1);
        self
    }

    /// Number of ranges to split `total` bytes into
    fn chunk_count(&self, total: u64) -> usize {
        let by_size = (total / self.min_chunk_size).max(1);
        by_size.min(self.connections as u64) as usize
    }

    async fn probe(&self, url: &str) -> Probe {
        let response = match self.send(self.client.head(url), url, "HEAD probe").await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::debug!(url, status = %r.status(), "HEAD probe rejected, using single request");
                return Probe::default();
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "HEAD probe failed, using single request");
                return Probe::default();
            }
        };

        let headers = response.headers();
        let total = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|&n| n > 0);
        let accepts_ranges = headers
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("bytes"));

        Probe {
            total,
            accepts_ranges,
        }
    }

    /// Send a request, bounding the wait for response headers by the read timeout
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
        what: &str,
    ) -> std::result::Result<reqwest::Response, DownloadError> {
        match tokio::time::timeout(self.read_timeout, request.send()).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(DownloadError::connection(
                format!("{} to {} failed", what, url),
                e,
            )),
            Err(elapsed) => Err(DownloadError::connection(
                format!("{} to {} timed out", what, url),
                elapsed,
            )),
        }
    }

    async fn transfer(
        &self,
        url: &str,
        destination: &Path,
        progress: &StreamProgress,
    ) -> std::result::Result<u64, DownloadError> {
        let probe = if self.connections > 1 {
            self.probe(url).await
        } else {
            Probe::default()
        };

        match probe.total {
            Some(total) if probe.accepts_ranges && self.chunk_count(total) > 1 => {
                progress.set_total(total);
                self.fetch_ranges(url, destination, total, progress).await
            }
            _ => self.fetch_single(url, destination, progress).await,
        }
    }

    async fn fetch_single(
        &self,
        url: &str,
        destination: &Path,
        progress: &StreamProgress,
    ) -> std::result::Result<u64, DownloadError> {
        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(|e| DownloadError::storage_at("create", destination, e))?;

        let mut response = self.send(self.client.get(url), url, "request").await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::connection(
                format!("request to {} failed", url),
                format!("server returned {}", status),
            ));
        }

        let expected = response.content_length();
        if let Some(len) = expected {
            progress.set_total(len);
        }

        let mut written = 0u64;
        loop {
            let chunk = match tokio::time::timeout(self.read_timeout, response.chunk()).await {
                Ok(Ok(Some(chunk))) => chunk,
                Ok(Ok(None)) => break,
                Ok(Err(e)) => return Err(read_failed(url, e)),
                Err(elapsed) => return Err(read_timed_out(url, elapsed)),
            };
            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::storage_at("write", destination, e))?;
            written += chunk.len() as u64;
            progress.add(chunk.len() as u64);
        }
        file.flush()
            .await
            .map_err(|e| DownloadError::storage_at("flush", destination, e))?;

        if let Some(len) = expected
            && written != len
        {
            return Err(DownloadError::connection(
                format!("stream from {} ended early", url),
                format!("received {} of {} bytes", written, len),
            ));
        }

        Ok(written)
    }

    async fn fetch_ranges(
        &self,
        url: &str,
        destination: &Path,
        total: u64,
        progress: &StreamProgress,
    ) -> std::result::Result<u64, DownloadError> {
        let file = tokio::fs::File::create(destination)
            .await
            .map_err(|e| DownloadError::storage_at("create", destination, e))?;
        file.set_len(total)
            .await
            .map_err(|e| DownloadError::storage_at("allocate", destination, e))?;
        drop(file);

        let chunks = self.chunk_count(total) as u64;
        let part = total / chunks;
        tracing::debug!(url, total, chunks, "splitting stream into byte ranges");

        let ranges = (0..chunks).map(|i| {
            let start = i * part;
            let end = if i == chunks - 1 {
                total - 1
            } else {
                start + part - 1
            };
            self.fetch_range(url, destination, start, end, progress)
        });

        // First failing range drops (and so aborts) its siblings
        let written = futures::future::try_join_all(ranges).await?;
        Ok(written.into_iter().sum())
    }

    async fn fetch_range(
        &self,
        url: &str,
        destination: &Path,
        start: u64,
        end: u64,
        progress: &StreamProgress,
    ) -> std::result::Result<u64, DownloadError> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(destination)
            .await
            .map_err(|e| DownloadError::storage_at("open", destination, e))?;
        file.seek(std::io::SeekFrom::Start(start))
            .await
            .map_err(|e| DownloadError::storage_at("seek in", destination, e))?;

        let request = self
            .client
            .get(url)
            .header(RANGE, format!("bytes={}-{}", start, end));
        let mut response = self.send(request, url, "range request").await?;

        if response.status() != StatusCode::PARTIAL_CONTENT {
            return Err(DownloadError::connection(
                format!("range request to {} failed", url),
                format!(
                    "expected 206 for bytes {}-{}, server returned {}",
                    start,
                    end,
                    response.status()
                ),
            ));
        }

        let expected = end - start + 1;
        let mut written = 0u64;
        loop {
            let chunk = match tokio::time::timeout(self.read_timeout, response.chunk()).await {
                Ok(Ok(Some(chunk))) => chunk,
                Ok(Ok(None)) => break,
                Ok(Err(e)) => return Err(read_failed(url, e)),
                Err(elapsed) => return Err(read_timed_out(url, elapsed)),
            };
            // Never write past the end of our range, even if the server over-delivers
            let room = (expected - written) as usize;
            let slice = &chunk[..chunk.len().min(room)];
            file.write_all(slice)
                .await
                .map_err(|e| DownloadError::storage_at("write", destination, e))?;
            written += slice.len() as u64;
            progress.add(slice.len() as u64);
            if written == expected {
                break;
            }
        }
        file.flush()
            .await
            .map_err(|e| DownloadError::storage_at("flush", destination, e))?;

        if written != expected {
            return Err(DownloadError::connection(
                format!("range {}-{} from {} ended early", start, end, url),
                format!("received {} of {} bytes", written, expected),
            ));
        }
        Ok(written)
    }
}

fn read_failed(url: &str, e: reqwest::Error) -> DownloadError {
    DownloadError::connection(format!("reading {} failed", url), e)
}

// The read timeout applies per chunk, so a stalled body fails instead of hanging
fn read_timed_out(url: &str, elapsed: tokio::time::error::Elapsed) -> DownloadError {
    DownloadError::connection(format!("reading {} timed out", url), elapsed)
}

#[async_trait]
impl StreamDownloader for HttpStreamDownloader {
    async fn download(
        &self,
        request: &StreamRequest,
        destination: &Path,
        progress: &StreamProgress,
        cancel: &CancellationToken,
    ) -> std::result::Result<StreamOutcome, DownloadError> {
        if cancel.is_cancelled() {
            return Ok(StreamOutcome::Cancelled);
        }

        url::Url::parse(&request.url).map_err(|e| {
            DownloadError::connection(format!("invalid {} stream url", request.kind), e)
        })?;

        tracing::debug!(kind = %request.kind, url = %request.url, ?destination, "starting stream transfer");

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            res = self.transfer(&request.url, destination, progress) => Some(res),
        };

        match result {
            None => {
                remove_path_quietly(destination).await;
                tracing::debug!(kind = %request.kind, "stream transfer cancelled");
                Ok(StreamOutcome::Cancelled)
            }
            Some(Err(e)) => {
                remove_path_quietly(destination).await;
                Err(e)
            }
            Some(Ok(bytes)) => {
                tracing::debug!(kind = %request.kind, bytes, "stream transfer complete");
                Ok(StreamOutcome::Completed {
                    path: destination.to_path_buf(),
                    bytes,
                })
            }
        }
    }
}
