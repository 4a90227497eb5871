//! Stream fixtures served by a local mock server and a matching extractor

use async_trait::async_trait;
use lite_dl::{Error, StreamDescriptor, StreamDetails, StreamExtractor, StreamKind};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Audio payload served for every fixture video
pub const AUDIO_BODY: &[u8] = b"fixture-audio-bytes";
/// Video payload served for every fixture video
pub const VIDEO_BODY: &[u8] = b"fixture-video-bytes-longer";

/// Extractor answering from a fixed table, the way a real resolver would for known ids
#[derive(Default)]
pub struct StaticExtractor {
    videos: HashMap<String, StreamDetails>,
}

impl StaticExtractor {
    /// Empty table: every lookup fails
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `details` under its own vid
    pub fn with(mut self, details: StreamDetails) -> Self {
        self.videos.insert(details.vid.clone(), details);
        self
    }
}

#[async_trait]
impl StreamExtractor for StaticExtractor {
    async fn extract(&self, vid: &str) -> lite_dl::Result<StreamDetails> {
        self.videos
            .get(vid)
            .cloned()
            .ok_or_else(|| Error::Extraction(format!("video {} is unavailable", vid)))
    }
}

fn descriptor(server: &MockServer, route: &str, kind: StreamKind, format: &str, size: usize) -> StreamDescriptor {
    StreamDescriptor {
        url: format!("{}{}", server.uri(), route),
        kind,
        format: format.to_string(),
        codec: None,
        bitrate: 128_000,
        size: Some(size as u64),
        height: (kind == StreamKind::Video).then_some(720),
    }
}

/// Mount audio and video routes for `vid` and describe them
pub async fn serve_video(server: &MockServer, vid: &str, title: &str) -> StreamDetails {
    serve_video_with_delay(server, vid, title, Duration::ZERO).await
}

/// Like [`serve_video`], with every response held back by `delay`
pub async fn serve_video_with_delay(
    server: &MockServer,
    vid: &str,
    title: &str,
    delay: Duration,
) -> StreamDetails {
    let audio_route = format!("/{}/audio.m4a", vid);
    let video_route = format!("/{}/video.mp4", vid);

    Mock::given(method("GET"))
        .and(path(audio_route.clone()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(AUDIO_BODY)
                .set_delay(delay),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(video_route.clone()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(VIDEO_BODY)
                .set_delay(delay),
        )
        .mount(server)
        .await;

    StreamDetails {
        vid: vid.to_string(),
        title: title.to_string(),
        audio_streams: vec![descriptor(server, &audio_route, StreamKind::Audio, "m4a", AUDIO_BODY.len())],
        video_streams: vec![descriptor(server, &video_route, StreamKind::Video, "mp4", VIDEO_BODY.len())],
        thumbnail: None,
        subtitles: Vec::new(),
    }
}

/// Config rooted in `root` using a single HTTP connection per stream
pub fn test_config(root: &Path) -> lite_dl::Config {
    let mut config = lite_dl::Config::default();
    config.download.download_dir = root.join("downloads");
    config.download.temp_dir = root.join("temp");
    config.download.progress_interval_ms = 10;
    config.http.connections_per_stream = 1;
    config.http.read_timeout = Duration::from_secs(5);
    config.tools.ffmpeg_path = None;
    config.tools.search_path = false;
    config.persistence.database_path = root.join("lite-dl.db");
    config
}

/// Downloader over the real SQLite store and HTTP transfer, without ffmpeg
pub async fn create_downloader(
    config: lite_dl::Config,
    extractor: StaticExtractor,
) -> lite_dl::LiteDownloader {
    let store = lite_dl::Database::new(&config.persistence.database_path)
        .await
        .expect("database should open");
    let streams =
        lite_dl::HttpStreamDownloader::new(&config.http).expect("http client should build");

    lite_dl::LiteDownloader::with_components(
        config,
        lite_dl::Components {
            store: Arc::new(store),
            extractor: Arc::new(extractor),
            stream_downloader: Arc::new(streams),
            muxer: Arc::new(lite_dl::UnavailableMuxer),
        },
    )
    .await
    .expect("downloader should start")
}
