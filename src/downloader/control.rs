//! Task control: submit, cancel, remove, retry, and history queries.

use std::sync::atomic::Ordering;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::history::DownloadRecord;
use crate::types::{DownloadOptions, DownloadType, Event, TaskId};

use super::{LiteDownloader, QueuedTask};

impl LiteDownloader {
    /// Submit a task with default options
    ///
    /// See [`submit_with_options`](Self::submit_with_options).
    pub async fn submit(&self, vid: &str, download_type: DownloadType) -> Result<TaskId> {
        self.submit_with_options(vid, download_type, DownloadOptions::default())
            .await
    }

    /// Submit a task
    ///
    /// Creates a pending record, persists it, and queues the task. Returns the new task id
    /// immediately; progress and completion are observed through [`subscribe`](Self::subscribe)
    /// or [`get_task`](Self::get_task).
    ///
    /// # Errors
    ///
    /// - [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown) has started
    /// - [`Error::InvalidRequest`] for an empty video id
    /// - store errors if the record cannot be persisted
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use lite_dl::{LiteDownloader, DownloadType, Result};
    /// # async fn example(downloader: LiteDownloader) -> Result<()> {
    /// let task_id = downloader.submit("abc123", DownloadType::Muxed).await?;
    /// println!("queued {}", task_id);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn submit_with_options(
        &self,
        vid: &str,
        download_type: DownloadType,
        options: DownloadOptions,
    ) -> Result<TaskId> {
        if !self.queue_state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        let vid = vid.trim();
        if vid.is_empty() {
            return Err(Error::InvalidRequest("video id must not be empty".to_string()));
        }

        let task_id = TaskId::generate();
        let record = DownloadRecord::new(task_id.clone(), vid, download_type);

        // Owned before it becomes visible, so it is never reported as interrupted
        {
            let mut active = self.queue_state.active_tasks.lock().await;
            active.insert(task_id.clone(), CancellationToken::new());
        }
        if let Err(e) = self.history.upsert(record).await {
            self.queue_state.active_tasks.lock().await.remove(&task_id);
            return Err(e);
        }

        // Announced before the pipeline can emit anything for this task
        tracing::info!(task_id = %task_id, vid, %download_type, "Task queued");
        self.emit_event(Event::Queued {
            task_id: task_id.clone(),
            vid: vid.to_string(),
            download_type,
        });
        self.enqueue(QueuedTask {
            task_id: task_id.clone(),
            options,
        })
        .await;

        Ok(task_id)
    }

    /// Cancel a task that has not finished yet
    ///
    /// A queued task is removed from the queue and marked cancelled right away. A running
    /// task is signalled and records its cancellation once its pipeline observes it; an
    /// in-flight mux is allowed to finish first. A non-terminal record left behind by a
    /// previous session is marked cancelled directly.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if no record has this id
    /// - [`Error::InvalidState`] if the task already reached a terminal status
    pub async fn cancel(&self, task_id: &TaskId) -> Result<()> {
        let token = {
            let active = self.queue_state.active_tasks.lock().await;
            active.get(task_id).cloned()
        };

        if let Some(token) = token {
            token.cancel();
            if self.remove_from_queue(task_id).await {
                // Never started, so no pipeline will record the cancellation
                self.queue_state.active_tasks.lock().await.remove(task_id);
                self.mark_cancelled(task_id).await?;
            } else {
                tracing::info!(task_id = %task_id, "Cancellation requested for running task");
            }
            return Ok(());
        }

        let record = self
            .history
            .find_by_task_id(task_id)
            .await?
            .ok_or_else(|| Error::NotFound(task_id.to_string()))?;
        if record.is_terminal() {
            return Err(Error::InvalidState {
                task_id: task_id.to_string(),
                operation: "cancel".to_string(),
                current_state: record.status.to_string(),
            });
        }

        // Left behind by a previous session
        self.mark_cancelled(task_id).await
    }

    /// Delete a task's record, cancelling the task first if it is still live
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no record has this id.
    pub async fn remove(&self, task_id: &TaskId) -> Result<()> {
        let token = self.queue_state.active_tasks.lock().await.remove(task_id);
        if let Some(token) = token {
            token.cancel();
            self.remove_from_queue(task_id).await;
        }

        if !self.history.remove(task_id).await? {
            return Err(Error::NotFound(task_id.to_string()));
        }

        tracing::info!(task_id = %task_id, "Task removed from history");
        self.emit_event(Event::Removed {
            task_id: task_id.clone(),
        });
        Ok(())
    }

    /// Cancel every live task and empty the history
    pub async fn clear_history(&self) -> Result<()> {
        self.drain_queue().await;
        let tokens: Vec<_> = {
            let mut active = self.queue_state.active_tasks.lock().await;
            active.drain().collect()
        };
        for (task_id, token) in &tokens {
            tracing::debug!(task_id = %task_id, "Cancelling task before clearing history");
            token.cancel();
        }

        self.history.clear().await?;

        tracing::info!(cancelled = tokens.len(), "History cleared");
        self.emit_event(Event::HistoryCleared);
        Ok(())
    }

    /// All records, newest first
    pub async fn history(&self) -> Result<Vec<DownloadRecord>> {
        self.history.get_all_sorted().await
    }

    /// Snapshot of one task's record
    pub async fn get_task(&self, task_id: &TaskId) -> Result<Option<DownloadRecord>> {
        self.history.find_by_task_id(task_id).await
    }

    /// Records of tasks this instance is queuing or running, newest first
    pub async fn active_tasks(&self) -> Result<Vec<DownloadRecord>> {
        let live: std::collections::HashSet<TaskId> = {
            let active = self.queue_state.active_tasks.lock().await;
            active.keys().cloned().collect()
        };
        let mut records = self.history.get_all_sorted().await?;
        records.retain(|r| live.contains(&r.task_id));
        Ok(records)
    }

    /// Non-terminal records no live pipeline owns (left behind by a crash), newest first
    ///
    /// These are never resumed automatically. Use [`retry`](Self::retry) to start them
    /// again or [`cancel`](Self::cancel) to close them.
    pub async fn interrupted_tasks(&self) -> Result<Vec<DownloadRecord>> {
        let live: std::collections::HashSet<TaskId> = {
            let active = self.queue_state.active_tasks.lock().await;
            active.keys().cloned().collect()
        };
        let mut records = self.history.find_unfinished().await?;
        records.retain(|r| !live.contains(&r.task_id));
        Ok(records)
    }

    /// Submit a finished or interrupted task's video again, as a new task
    ///
    /// An interrupted record is marked cancelled so it no longer shows as unfinished.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if no record has this id
    /// - [`Error::InvalidState`] if the task is still queued or running
    pub async fn retry(&self, task_id: &TaskId) -> Result<TaskId> {
        let record = self
            .history
            .find_by_task_id(task_id)
            .await?
            .ok_or_else(|| Error::NotFound(task_id.to_string()))?;

        let owned = self
            .queue_state
            .active_tasks
            .lock()
            .await
            .contains_key(task_id);
        if owned {
            return Err(Error::InvalidState {
                task_id: task_id.to_string(),
                operation: "retry".to_string(),
                current_state: record.status.to_string(),
            });
        }

        if !record.is_terminal() {
            self.mark_cancelled(task_id).await?;
        }

        let new_id = self
            .submit(&record.vid, record.download_type)
            .await?;
        tracing::info!(task_id = %task_id, new_task_id = %new_id, "Task retried");
        Ok(new_id)
    }

    /// Persist a cancellation no pipeline will record, and announce it
    pub(crate) async fn mark_cancelled(&self, task_id: &TaskId) -> Result<()> {
        match self.history.update(task_id, |r| r.cancel()).await? {
            Some(result) => result?,
            None => return Err(Error::NotFound(task_id.to_string())),
        }
        tracing::info!(task_id = %task_id, "Task cancelled");
        self.emit_event(Event::Cancelled {
            task_id: task_id.clone(),
        });
        Ok(())
    }
}
