//! Startup and shutdown coordination.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::Result;
use crate::types::Event;

use super::LiteDownloader;

/// Store key recording whether the previous session shut down cleanly
pub(crate) const CLEAN_SHUTDOWN_KEY: &str = "clean_shutdown";

/// How long shutdown waits for running pipelines to record their terminal status
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl LiteDownloader {
    /// Detect an unclean previous shutdown and mark this session as running
    ///
    /// Tasks a crashed session left in a non-terminal status are reported, not resumed.
    pub(crate) async fn check_previous_shutdown(&self) -> Result<()> {
        let previous = self.components.store.get(CLEAN_SHUTDOWN_KEY).await?;
        let interrupted = self.history.find_unfinished().await?;

        if previous.as_deref() == Some("false") || !interrupted.is_empty() {
            let ids: Vec<String> = interrupted.iter().map(|r| r.task_id.to_string()).collect();
            tracing::warn!(
                interrupted = interrupted.len(),
                task_ids = ?ids,
                "Previous session did not shut down cleanly; interrupted tasks are not resumed"
            );
        }

        self.components
            .store
            .put(CLEAN_SHUTDOWN_KEY, "false")
            .await
    }

    /// Gracefully shut down the downloader
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new tasks
    /// 2. Cancels queued tasks (marked cancelled directly)
    /// 3. Signals every running pipeline and stops the queue processor
    /// 4. Waits up to 30 seconds for pipelines to record their terminal status
    /// 5. Marks the shutdown as clean and emits [`Event::Shutdown`]
    ///
    /// # Errors
    ///
    /// Returns an error if the clean-shutdown marker cannot be written. Earlier steps log
    /// their failures and carry on.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new tasks
        self.queue_state.accepting_new.store(false, Ordering::SeqCst);

        // 2. Queued tasks never reach a pipeline
        for task_id in self.drain_queue().await {
            self.queue_state.active_tasks.lock().await.remove(&task_id);
            if let Err(e) = self.mark_cancelled(&task_id).await {
                tracing::error!(task_id = %task_id, error = %e, "Failed to cancel queued task during shutdown");
            }
        }

        // 3. Signal running pipelines
        self.cancel_all_active().await;
        self.queue_state.shutdown_token.cancel();

        // 4. Wait for them to finish
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_active_tasks()).await {
            Ok(()) => tracing::info!("All running tasks stopped"),
            Err(_) => tracing::warn!(
                "Timeout waiting for running tasks to stop, proceeding with shutdown"
            ),
        }

        // 5. Mark clean shutdown
        self.components.store.put(CLEAN_SHUTDOWN_KEY, "true").await?;

        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Signal cancellation to every live task
    pub(crate) async fn cancel_all_active(&self) {
        let active = self.queue_state.active_tasks.lock().await;
        tracing::debug!(active_count = active.len(), "Cancelling all running tasks");
        for token in active.values() {
            token.cancel();
        }
    }

    /// Wait until no pipeline owns a task
    async fn wait_for_active_tasks(&self) {
        loop {
            let active_count = self.queue_state.active_tasks.lock().await.len();
            if active_count == 0 {
                return;
            }
            tracing::debug!(active_count, "Waiting for running tasks to stop");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}
