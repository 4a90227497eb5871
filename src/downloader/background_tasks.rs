//! Background task for throttled progress reporting.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::history::HistoryRepository;
use crate::stream::{StreamProgress, percent_of};
use crate::types::{Event, TaskId};

/// Highest percentage reported before the task actually completes
const MAX_IN_FLIGHT_PERCENT: u8 = 99;

/// Aggregate progress of a task's streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AggregateProgress {
    pub percent: u8,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
}

/// Byte-weighted progress over all streams
///
/// Streams whose size is still unknown add to `downloaded_bytes` but not to the
/// percentage until their size is learned. The percentage stays below 100 until the
/// task completes.
pub(crate) fn aggregate_progress(streams: &[Arc<StreamProgress>]) -> AggregateProgress {
    let mut downloaded_bytes = 0u64;
    let mut sized_done = 0u64;
    let mut total_bytes = 0u64;

    for stream in streams {
        let done = stream.downloaded();
        let total = stream.total();
        downloaded_bytes = downloaded_bytes.saturating_add(done);
        if total > 0 {
            sized_done = sized_done.saturating_add(done.min(total));
            total_bytes = total_bytes.saturating_add(total);
        }
    }

    AggregateProgress {
        percent: percent_of(sized_done, total_bytes).min(MAX_IN_FLIGHT_PERCENT),
        downloaded_bytes,
        total_bytes,
    }
}

/// Parameters for spawning a progress reporter background task
pub(crate) struct ProgressReporterParams {
    /// Task ID
    pub task_id: TaskId,
    /// Live counters of every stream of the task
    pub streams: Vec<Arc<StreamProgress>>,
    /// Sampling interval
    pub interval: Duration,
    /// Minimum percentage advance before persisting
    pub step: u8,
    /// Where progress is persisted
    pub history: Arc<HistoryRepository>,
    /// Event broadcast sender
    pub event_tx: broadcast::Sender<Event>,
    /// Stops the reporter
    pub cancel_token: CancellationToken,
}

/// Spawn a background task that periodically persists aggregate progress.
///
/// A sample is persisted (and a `Downloading` event emitted) only when the percentage
/// has advanced by at least `step` since the last persisted value.
pub(crate) fn spawn_progress_reporter(
    params: ProgressReporterParams,
) -> tokio::task::JoinHandle<()> {
    let ProgressReporterParams {
        task_id,
        streams,
        interval,
        step,
        history,
        event_tx,
        cancel_token,
    } = params;
    let step = step.max(1);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_persisted = 0u8;

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = interval.tick() => {
                    let sample = aggregate_progress(&streams);
                    if sample.percent < last_persisted.saturating_add(step) {
                        continue;
                    }

                    let result = history
                        .update(&task_id, |record| {
                            record.record_progress(
                                sample.percent,
                                sample.downloaded_bytes,
                                sample.total_bytes,
                            )
                        })
                        .await;

                    match result {
                        Ok(Some(true)) => {
                            last_persisted = sample.percent;
                            event_tx
                                .send(Event::Downloading {
                                    task_id: task_id.clone(),
                                    percent: sample.percent,
                                    downloaded_bytes: sample.downloaded_bytes,
                                    total_bytes: sample.total_bytes,
                                })
                                .ok();
                        }
                        Ok(Some(false)) => last_persisted = sample.percent,
                        Ok(None) => {
                            tracing::debug!(task_id = %task_id, "Record gone, stopping progress reporter");
                            break;
                        }
                        Err(e) => {
                            tracing::error!(task_id = %task_id, error = %e, "Failed to update progress");
                        }
                    }
                }
            }
        }
    })
}
