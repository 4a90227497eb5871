//! Download task context: shared state and record persistence helpers.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::DownloadError;
use crate::history::DownloadRecord;
use crate::types::{DownloadOptions, Event, TaskId};

use super::super::LiteDownloader;

/// Why a pipeline stopped before producing its output
#[derive(Debug)]
pub(super) enum Halt {
    /// Cancellation was observed
    Cancelled,
    /// A stage failed with a categorized error
    Failed(DownloadError),
    /// The record can no longer be written (removed, or the store failed)
    Abandoned(String),
}

impl From<DownloadError> for Halt {
    fn from(e: DownloadError) -> Self {
        Halt::Failed(e)
    }
}

/// Shared context for a single task, reducing parameter passing between phases.
pub(crate) struct DownloadTaskContext {
    pub(crate) task_id: TaskId,
    pub(crate) options: DownloadOptions,
    pub(crate) cancel_token: CancellationToken,
    pub(crate) downloader: LiteDownloader,
}

impl DownloadTaskContext {
    pub(super) fn config(&self) -> &Config {
        &self.downloader.config
    }

    /// Scratch directory holding this task's intermediate files
    pub(super) fn temp_dir(&self) -> PathBuf {
        self.config()
            .temp_dir()
            .join(format!("task_{}", self.task_id))
    }

    pub(super) fn check_cancelled(&self) -> Result<(), Halt> {
        if self.cancel_token.is_cancelled() {
            Err(Halt::Cancelled)
        } else {
            Ok(())
        }
    }

    pub(super) fn emit(&self, event: Event) {
        self.downloader.emit_event(event);
    }

    /// Current snapshot of this task's record
    pub(super) async fn load_record(&self) -> Result<DownloadRecord, Halt> {
        match self.downloader.history.find_by_task_id(&self.task_id).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(Halt::Abandoned("record no longer in history".to_string())),
            Err(e) => Err(Halt::Abandoned(format!("failed to load record: {}", e))),
        }
    }

    /// Apply a mutation to the stored record and persist it before the pipeline moves on
    pub(super) async fn persist<F>(&self, what: &str, f: F) -> Result<(), Halt>
    where
        F: FnOnce(&mut DownloadRecord) -> crate::Result<()> + Send,
    {
        match self.downloader.history.update(&self.task_id, f).await {
            Ok(Some(Ok(()))) => Ok(()),
            Ok(Some(Err(e))) => Err(Halt::Abandoned(format!("cannot {}: {}", what, e))),
            Ok(None) => Err(Halt::Abandoned("record no longer in history".to_string())),
            Err(e) => {
                tracing::error!(task_id = %self.task_id, error = %e, "Failed to persist {}", what);
                Err(Halt::Abandoned(format!("failed to persist {}: {}", what, e)))
            }
        }
    }

    /// Remove this task from the ownership map.
    pub(super) async fn remove_from_active(&self) {
        let mut active = self.downloader.queue_state.active_tasks.lock().await;
        active.remove(&self.task_id);
    }
}
