//! Queue processor: pulls tasks off the queue and spawns their pipelines.

use super::LiteDownloader;
use super::download_task::{DownloadTaskContext, run_download_task};

impl LiteDownloader {
    /// Start the queue processor task
    ///
    /// Spawns a background task that repeatedly:
    /// 1. Acquires a permit from the concurrency limiter (respects max_concurrent_downloads)
    /// 2. Waits for the oldest queued task
    /// 3. Spawns that task's pipeline, which holds the permit until it finishes
    ///
    /// A single processor pops tasks, so pipelines start in submission order. The loop
    /// ends when shutdown cancels `shutdown_token`.
    pub(crate) fn start_queue_processor(&self) -> tokio::task::JoinHandle<()> {
        let downloader = self.clone();
        let shutdown = self.queue_state.shutdown_token.clone();
        let concurrent_limit = self.queue_state.concurrent_limit.clone();
        let notify = self.queue_state.queue_notify.clone();

        tokio::spawn(async move {
            loop {
                let permit = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    permit = concurrent_limit.clone().acquire_owned() => match permit {
                        Ok(p) => p,
                        // Semaphore closed
                        Err(_) => break,
                    },
                };

                let next = loop {
                    if let Some(task) = downloader.dequeue().await {
                        break Some(task);
                    }
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break None,
                        _ = notify.notified() => {}
                    }
                };
                let Some(task) = next else { break };

                // Registered at submit; missing means it was cancelled or removed meanwhile
                let cancel_token = {
                    let active = downloader.queue_state.active_tasks.lock().await;
                    active.get(&task.task_id).cloned()
                };
                let Some(cancel_token) = cancel_token else {
                    tracing::debug!(task_id = %task.task_id, "Dequeued task no longer owned, skipping");
                    continue;
                };

                let ctx = DownloadTaskContext {
                    task_id: task.task_id,
                    options: task.options,
                    cancel_token,
                    downloader: downloader.clone(),
                };

                tokio::spawn(async move {
                    let _permit = permit;
                    run_download_task(ctx).await;
                });
            }
            tracing::debug!("Queue processor stopped");
        })
    }
}
