//! End-to-end tests through the public API
//!
//! Streams are served by a local `wiremock` server and transferred by the real
//! [`HttpStreamDownloader`](lite_dl::HttpStreamDownloader) into a temporary directory.
//! History lives in a real SQLite database. No ffmpeg is configured, so muxed tasks
//! exercise the unavailable-muxer path.

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{
    AUDIO_BODY, StaticExtractor, VIDEO_BODY, collect_events_until_terminal, create_downloader,
    serve_video, serve_video_with_delay, test_config, wait_for_downloading, wait_for_terminal,
};
use lite_dl::{DownloadStatus, DownloadType, Event, FailureKind};
use std::time::Duration;
use wiremock::MockServer;

const VID: &str = "e2e-clip";
const TITLE: &str = "Fixture Clip";

#[tokio::test]
async fn audio_only_task_lands_in_download_dir() {
    let server = MockServer::start().await;
    let details = serve_video(&server, VID, TITLE).await;
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let download_dir = config.download.download_dir.clone();
    let downloader = create_downloader(config, StaticExtractor::new().with(details)).await;
    let mut events = downloader.subscribe();

    let task_id = downloader.submit(VID, DownloadType::AudioOnly).await.unwrap();
    let record = wait_for_terminal(&downloader, &task_id).await;

    assert_eq!(record.status, DownloadStatus::Completed);
    assert_eq!(record.progress, 100);
    let output = download_dir.join("Fixture Clip.m4a");
    assert_eq!(record.output_path.as_deref(), Some(output.as_path()));
    assert_eq!(std::fs::read(&output).unwrap(), AUDIO_BODY);

    let seen = collect_events_until_terminal(&mut events, &task_id).await;
    assert!(matches!(seen.first(), Some(Event::Queued { .. })));
    assert!(matches!(seen.get(1), Some(Event::Resolved { file_name, .. }) if file_name == "Fixture Clip.m4a"));
    assert!(matches!(seen.last(), Some(Event::Complete { path, .. }) if *path == output));

    downloader.shutdown().await.unwrap();
}

#[tokio::test]
async fn video_only_task_keeps_video_container() {
    let server = MockServer::start().await;
    let details = serve_video(&server, VID, TITLE).await;
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let download_dir = config.download.download_dir.clone();
    let downloader = create_downloader(config, StaticExtractor::new().with(details)).await;

    let task_id = downloader.submit(VID, DownloadType::VideoOnly).await.unwrap();
    let record = wait_for_terminal(&downloader, &task_id).await;

    assert_eq!(record.status, DownloadStatus::Completed);
    assert_eq!(
        std::fs::read(download_dir.join("Fixture Clip.mp4")).unwrap(),
        VIDEO_BODY
    );
}

#[tokio::test]
async fn muxed_task_fails_without_ffmpeg_and_leaves_no_files() {
    let server = MockServer::start().await;
    let details = serve_video(&server, VID, TITLE).await;
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let download_dir = config.download.download_dir.clone();
    let temp_root = config.download.temp_dir.clone();
    let downloader = create_downloader(config, StaticExtractor::new().with(details)).await;
    let mut events = downloader.subscribe();

    let task_id = downloader.submit(VID, DownloadType::Muxed).await.unwrap();
    let record = wait_for_terminal(&downloader, &task_id).await;

    assert_eq!(record.status, DownloadStatus::Failed);
    assert_eq!(record.error_kind, Some(FailureKind::Muxing));
    assert!(record.error_message.as_deref().unwrap().contains("ffmpeg"));

    let seen = collect_events_until_terminal(&mut events, &task_id).await;
    assert!(seen.iter().any(|e| matches!(e, Event::Muxing { .. })));
    assert!(matches!(
        seen.last(),
        Some(Event::Failed { kind: FailureKind::Muxing, .. })
    ));

    assert_eq!(std::fs::read_dir(&download_dir).unwrap().count(), 0);
    assert_eq!(std::fs::read_dir(&temp_root).unwrap().count(), 0);
}

#[tokio::test]
async fn unknown_video_fails_as_connection_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let downloader = create_downloader(test_config(temp_dir.path()), StaticExtractor::new()).await;

    let task_id = downloader.submit("missing", DownloadType::AudioOnly).await.unwrap();
    let record = wait_for_terminal(&downloader, &task_id).await;

    assert_eq!(record.status, DownloadStatus::Failed);
    assert_eq!(record.error_kind, Some(FailureKind::Connection));
}

#[tokio::test]
async fn missing_stream_on_server_fails_as_connection_error() {
    let server = MockServer::start().await;
    let mut details = serve_video(&server, VID, TITLE).await;
    details.audio_streams[0].url = format!("{}/gone.m4a", server.uri());
    let temp_dir = tempfile::tempdir().unwrap();
    let downloader =
        create_downloader(test_config(temp_dir.path()), StaticExtractor::new().with(details)).await;

    let task_id = downloader.submit(VID, DownloadType::AudioOnly).await.unwrap();
    let record = wait_for_terminal(&downloader, &task_id).await;

    assert_eq!(record.status, DownloadStatus::Failed);
    assert_eq!(record.error_kind, Some(FailureKind::Connection));
    assert!(record.error_message.as_deref().unwrap().contains("404"));
}

#[tokio::test]
async fn cancel_stops_a_running_transfer() {
    let server = MockServer::start().await;
    let details = serve_video_with_delay(&server, VID, TITLE, Duration::from_secs(3)).await;
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let download_dir = config.download.download_dir.clone();
    let downloader = create_downloader(config, StaticExtractor::new().with(details)).await;

    let task_id = downloader.submit(VID, DownloadType::AudioOnly).await.unwrap();
    wait_for_downloading(&downloader, &task_id).await;
    downloader.cancel(&task_id).await.unwrap();

    let record = wait_for_terminal(&downloader, &task_id).await;
    assert_eq!(record.status, DownloadStatus::Cancelled);
    assert_eq!(std::fs::read_dir(&download_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn history_survives_restart() {
    let server = MockServer::start().await;
    let details = serve_video(&server, VID, TITLE).await;
    let temp_dir = tempfile::tempdir().unwrap();

    let first = create_downloader(
        test_config(temp_dir.path()),
        StaticExtractor::new().with(details.clone()),
    )
    .await;
    let task_id = first.submit(VID, DownloadType::AudioOnly).await.unwrap();
    wait_for_terminal(&first, &task_id).await;
    first.shutdown().await.unwrap();
    drop(first);

    let second =
        create_downloader(test_config(temp_dir.path()), StaticExtractor::new().with(details)).await;
    let history = second.history().await.unwrap();

    assert_eq!(history.len(), 1);
    assert_eq!(history[0].task_id, task_id);
    assert_eq!(history[0].status, DownloadStatus::Completed);
    assert!(second.interrupted_tasks().await.unwrap().is_empty());
}

#[tokio::test]
async fn unfinished_task_is_reported_after_unclean_restart() {
    let server = MockServer::start().await;
    let details = serve_video_with_delay(&server, VID, TITLE, Duration::from_secs(30)).await;
    let temp_dir = tempfile::tempdir().unwrap();

    // First session never shuts down
    let first = create_downloader(
        test_config(temp_dir.path()),
        StaticExtractor::new().with(details.clone()),
    )
    .await;
    let task_id = first.submit(VID, DownloadType::AudioOnly).await.unwrap();
    wait_for_downloading(&first, &task_id).await;

    let second =
        create_downloader(test_config(temp_dir.path()), StaticExtractor::new().with(details)).await;
    let interrupted = second.interrupted_tasks().await.unwrap();
    assert_eq!(interrupted.len(), 1);
    assert_eq!(interrupted[0].task_id, task_id);
    assert!(second.active_tasks().await.unwrap().is_empty());

    second.cancel(&task_id).await.unwrap();
    let record = second.get_task(&task_id).await.unwrap().unwrap();
    assert_eq!(record.status, DownloadStatus::Cancelled);
    assert!(second.interrupted_tasks().await.unwrap().is_empty());

    first.shutdown().await.unwrap();
}
