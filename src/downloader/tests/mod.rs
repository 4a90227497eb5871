use super::test_helpers::*;
use crate::error::Error;
use crate::types::{DownloadStatus, DownloadType, Event, TaskId};
use std::time::Duration;


/// Fake streams for `vid` that only finish when cancelled
fn hanging_streams(vid: &str) -> FakeStreamDownloader {
    FakeStreamDownloader::new()
        .with(audio_url(vid), StreamBehavior::Hang)
        .with(video_url(vid), StreamBehavior::Hang)
}

/// Next event for `task_id`, skipping progress and other tasks' events
async fn next_event_for(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    task_id: &TaskId,
) -> Event {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        if event.task_id() == Some(task_id) && !matches!(event, Event::Downloading { .. }) {
            return event;
        }
    }
}
