//! Waiting helpers for integration tests

use lite_dl::{DownloadRecord, DownloadStatus, Event, LiteDownloader, TaskId};
use std::time::Duration;
use tokio::sync::broadcast;

/// Poll history until the task satisfies `done`, panicking after `timeout`
pub async fn wait_for_record(
    downloader: &LiteDownloader,
    task_id: &TaskId,
    timeout: Duration,
    done: impl Fn(&DownloadRecord) -> bool,
) -> DownloadRecord {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(record) = downloader.get_task(task_id).await.expect("history read")
            && done(&record)
        {
            return record;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "task {} did not reach the expected state in {:?}",
            task_id,
            timeout
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Wait until the task is Completed, Failed or Cancelled
pub async fn wait_for_terminal(downloader: &LiteDownloader, task_id: &TaskId) -> DownloadRecord {
    wait_for_record(downloader, task_id, Duration::from_secs(10), |r| {
        r.is_terminal()
    })
    .await
}

/// Wait until the task is transferring
pub async fn wait_for_downloading(downloader: &LiteDownloader, task_id: &TaskId) -> DownloadRecord {
    wait_for_record(downloader, task_id, Duration::from_secs(10), |r| {
        r.status == DownloadStatus::Downloading
    })
    .await
}

/// Collect events for `task_id` until a terminal event arrives (progress events included)
pub async fn collect_events_until_terminal(
    events: &mut broadcast::Receiver<Event>,
    task_id: &TaskId,
) -> Vec<Event> {
    let mut seen = Vec::new();
    let result = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match events.recv().await {
                Ok(event) if event.task_id() == Some(task_id) => {
                    let terminal = matches!(
                        event,
                        Event::Complete { .. } | Event::Failed { .. } | Event::Cancelled { .. }
                    );
                    seen.push(event);
                    if terminal {
                        return;
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    })
    .await;
    assert!(result.is_ok(), "no terminal event for {}", task_id);
    seen
}
