//! Shared test helpers: fake collaborators and downloader construction.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::db::MemoryStore;
use crate::downloader::{Components, LiteDownloader};
use crate::error::{DownloadError, Error};
use crate::extractor::{StreamDescriptor, StreamDetails, StreamExtractor, SubtitleTrack};
use crate::history::DownloadRecord;
use crate::muxing::Muxer;
use crate::stream::{StreamDownloader, StreamOutcome, StreamProgress, StreamRequest};
use crate::types::{StreamKind, TaskId};

/// Video id the default fake extractor knows
pub(crate) const SAMPLE_VID: &str = "abc123";

pub(crate) fn audio_url(vid: &str) -> String {
    format!("https://cdn.test/{vid}/audio.m4a")
}

pub(crate) fn video_url(vid: &str) -> String {
    format!("https://cdn.test/{vid}/video.mp4")
}

/// Streams for `vid`: one m4a audio (4 bytes), one 1080p mp4 video (8 bytes), a jpg
/// thumbnail and an English subtitle track
pub(crate) fn sample_details(vid: &str) -> StreamDetails {
    StreamDetails {
        vid: vid.to_string(),
        title: "Sample Video".to_string(),
        audio_streams: vec![StreamDescriptor {
            url: audio_url(vid),
            kind: StreamKind::Audio,
            format: "m4a".to_string(),
            codec: Some("aac".to_string()),
            bitrate: 128_000,
            size: Some(4),
            height: None,
        }],
        video_streams: vec![StreamDescriptor {
            url: video_url(vid),
            kind: StreamKind::Video,
            format: "mp4".to_string(),
            codec: Some("avc1".to_string()),
            bitrate: 2_500_000,
            size: Some(8),
            height: Some(1080),
        }],
        thumbnail: Some(StreamDescriptor {
            url: format!("https://cdn.test/{vid}/thumb.jpg"),
            kind: StreamKind::Thumbnail,
            format: "jpg".to_string(),
            codec: None,
            bitrate: 0,
            size: Some(3),
            height: Some(720),
        }),
        subtitles: vec![SubtitleTrack {
            url: format!("https://cdn.test/{vid}/en.vtt"),
            language: "en".to_string(),
            format: "vtt".to_string(),
        }],
    }
}

/// Extractor answering from a fixed table; unknown ids fail
#[derive(Default)]
pub(crate) struct FakeExtractor {
    videos: HashMap<String, StreamDetails>,
    delay: Option<Duration>,
    pub(crate) calls: AtomicUsize,
}

impl FakeExtractor {
    pub(crate) fn new() -> Self {
        Self::default().with_video(sample_details(SAMPLE_VID))
    }

    pub(crate) fn with_video(mut self, details: StreamDetails) -> Self {
        self.videos.insert(details.vid.clone(), details);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl StreamExtractor for FakeExtractor {
    async fn extract(&self, vid: &str) -> crate::Result<StreamDetails> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.videos
            .get(vid)
            .cloned()
            .ok_or_else(|| Error::Extraction(format!("video {vid} is unavailable")))
    }
}

/// How the fake stream downloader treats one URL
#[derive(Clone, Debug)]
pub(crate) enum StreamBehavior {
    /// Write `body` after `delay`
    Complete { body: Vec<u8>, delay: Duration },
    /// Fail with a connection error after `delay`
    FailConnection { delay: Duration },
    /// Fail with a storage error after `delay`
    FailStorage { delay: Duration },
    /// Never finish on its own; only cancellation ends it
    Hang,
}

impl StreamBehavior {
    pub(crate) fn body(body: &[u8]) -> Self {
        StreamBehavior::Complete {
            body: body.to_vec(),
            delay: Duration::ZERO,
        }
    }
}

/// Stream downloader driven by per-URL behaviors
///
/// URLs without a behavior complete immediately with the bytes of `"<kind>-data"`.
#[derive(Default)]
pub(crate) struct FakeStreamDownloader {
    behaviors: HashMap<String, StreamBehavior>,
    pub(crate) started: std::sync::Mutex<Vec<String>>,
    pub(crate) cancelled: std::sync::Mutex<Vec<String>>,
}

impl FakeStreamDownloader {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(mut self, url: impl Into<String>, behavior: StreamBehavior) -> Self {
        self.behaviors.insert(url.into(), behavior);
        self
    }

    pub(crate) fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub(crate) fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    fn note_cancelled(&self, url: &str) -> StreamOutcome {
        self.cancelled.lock().unwrap().push(url.to_string());
        StreamOutcome::Cancelled
    }
}

#[async_trait]
impl StreamDownloader for FakeStreamDownloader {
    async fn download(
        &self,
        request: &StreamRequest,
        destination: &Path,
        progress: &StreamProgress,
        cancel: &CancellationToken,
    ) -> std::result::Result<StreamOutcome, DownloadError> {
        self.started.lock().unwrap().push(request.url.clone());
        let behavior = self
            .behaviors
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| StreamBehavior::body(format!("{}-data", request.kind).as_bytes()));

        let delay = match &behavior {
            StreamBehavior::Complete { delay, .. }
            | StreamBehavior::FailConnection { delay }
            | StreamBehavior::FailStorage { delay } => *delay,
            StreamBehavior::Hang => {
                cancel.cancelled().await;
                return Ok(self.note_cancelled(&request.url));
            }
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(self.note_cancelled(&request.url)),
            _ = tokio::time::sleep(delay) => {}
        }

        match behavior {
            StreamBehavior::Complete { body, .. } => {
                tokio::fs::write(destination, &body)
                    .await
                    .map_err(|e| DownloadError::storage_at("write", destination, e))?;
                progress.set_total(body.len() as u64);
                progress.add(body.len() as u64);
                Ok(StreamOutcome::Completed {
                    path: destination.to_path_buf(),
                    bytes: body.len() as u64,
                })
            }
            StreamBehavior::FailConnection { .. } => Err(DownloadError::connection(
                format!("request to {} failed", request.url),
                "server returned 503 Service Unavailable",
            )),
            StreamBehavior::FailStorage { .. } => Err(DownloadError::storage(
                format!("failed to write {}", destination.display()),
                std::io::Error::other("No space left on device"),
            )),
            StreamBehavior::Hang => unreachable!("handled above"),
        }
    }
}

/// Muxer that concatenates video then audio into the output
#[derive(Default)]
pub(crate) struct FakeMuxer {
    fail: bool,
    delay: Option<Duration>,
    pub(crate) calls: AtomicUsize,
}

impl FakeMuxer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Muxer for FakeMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> crate::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(Error::ExternalTool(
                "ffmpeg exited with exit status: 1: Invalid data found".to_string(),
            ));
        }
        let mut combined = tokio::fs::read(video).await?;
        combined.extend(tokio::fs::read(audio).await?);
        tokio::fs::write(output, combined).await?;
        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// A downloader wired to fakes, plus handles to inspect them
pub(crate) struct TestEnv {
    pub(crate) downloader: LiteDownloader,
    pub(crate) extractor: Arc<FakeExtractor>,
    pub(crate) streams: Arc<FakeStreamDownloader>,
    pub(crate) muxer: Arc<FakeMuxer>,
    pub(crate) store: Arc<MemoryStore>,
    /// Must outlive the downloader
    pub(crate) temp_dir: tempfile::TempDir,
}

impl TestEnv {
    pub(crate) fn download_dir(&self) -> PathBuf {
        self.downloader.config.download.download_dir.clone()
    }

    pub(crate) fn temp_root(&self) -> PathBuf {
        self.downloader.config.download.temp_dir.clone()
    }
}

/// Config rooted in `root` with fast progress sampling
pub(crate) fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.download.download_dir = root.join("downloads");
    config.download.temp_dir = root.join("temp");
    config.download.max_concurrent_downloads = 3;
    config.download.progress_interval_ms = 10;
    config.persistence.database_path = root.join("test.db");
    config
}

/// Downloader with the default fakes
pub(crate) async fn create_test_downloader() -> TestEnv {
    create_test_downloader_with(
        FakeExtractor::new(),
        FakeStreamDownloader::new(),
        FakeMuxer::new(),
        |_| {},
    )
    .await
}

/// Downloader with the given fakes and config tweaks
pub(crate) async fn create_test_downloader_with(
    extractor: FakeExtractor,
    streams: FakeStreamDownloader,
    muxer: FakeMuxer,
    configure: impl FnOnce(&mut Config),
) -> TestEnv {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    configure(&mut config);

    let store = Arc::new(MemoryStore::new());
    let extractor = Arc::new(extractor);
    let streams = Arc::new(streams);
    let muxer = Arc::new(muxer);

    let downloader = LiteDownloader::with_components(
        config,
        Components {
            store: store.clone(),
            extractor: extractor.clone(),
            stream_downloader: streams.clone(),
            muxer: muxer.clone(),
        },
    )
    .await
    .unwrap();

    TestEnv {
        downloader,
        extractor,
        streams,
        muxer,
        store,
        temp_dir,
    }
}

/// Poll until the task reaches a terminal status
pub(crate) async fn wait_for_terminal(downloader: &LiteDownloader, task_id: &TaskId) -> DownloadRecord {
    wait_for_record(downloader, task_id, |r| r.is_terminal()).await
}

/// Poll until the task's record satisfies `condition`
pub(crate) async fn wait_for_record(
    downloader: &LiteDownloader,
    task_id: &TaskId,
    condition: impl Fn(&DownloadRecord) -> bool,
) -> DownloadRecord {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(record) = downloader.get_task(task_id).await.unwrap()
            && condition(&record)
        {
            return record;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for task {task_id}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll until no pipeline owns the task
pub(crate) async fn wait_until_released(downloader: &LiteDownloader, task_id: &TaskId) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while downloader
        .queue_state
        .active_tasks
        .lock()
        .await
        .contains_key(task_id)
    {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for task {task_id} to be released"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Whether a directory is missing or empty
pub(crate) fn is_empty_dir(path: &Path) -> bool {
    match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}
