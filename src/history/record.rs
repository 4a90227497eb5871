//! The persisted snapshot of one task.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DownloadError, Error, FailureKind, Result};
use crate::types::{DownloadStatus, DownloadType, TaskId};
use crate::utils::now_millis;

/// One history entry per task
///
/// Only the orchestrator mutates a record while its task is active, and only through the
/// methods below. Every mutator refuses to touch a record that has reached a terminal
/// status, and every successful mutation refreshes `updated_at`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadRecord {
    /// Unique task identifier (primary key in the repository)
    pub task_id: TaskId,
    /// Source video identifier
    pub vid: String,
    /// Requested output kind
    pub download_type: DownloadType,
    /// Current status
    pub status: DownloadStatus,
    /// Aggregate progress percentage (0 to 100)
    #[serde(default)]
    pub progress: u8,
    /// Output file name, set once streams are resolved
    #[serde(default)]
    pub file_name: Option<String>,
    /// Output location, set once decided and rewritten with the final path on completion
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    /// Bytes received across all streams
    #[serde(default)]
    pub downloaded_bytes: u64,
    /// Expected bytes across all streams (0 while unknown)
    #[serde(default)]
    pub total_bytes: u64,
    /// Creation time, unix milliseconds
    pub created_at: i64,
    /// Last mutation time, unix milliseconds (never earlier than `created_at`)
    pub updated_at: i64,
    /// Failure summary, present iff `status` is `Failed`
    #[serde(default)]
    pub error_message: Option<String>,
    /// Failure category, present iff `status` is `Failed`
    #[serde(default)]
    pub error_kind: Option<FailureKind>,
}

impl DownloadRecord {
    /// A fresh pending record with progress 0
    pub fn new(task_id: TaskId, vid: impl Into<String>, download_type: DownloadType) -> Self {
        let now = now_millis();
        Self {
            task_id,
            vid: vid.into(),
            download_type,
            status: DownloadStatus::Pending,
            progress: 0,
            file_name: None,
            output_path: None,
            downloaded_bytes: 0,
            total_bytes: 0,
            created_at: now,
            updated_at: now,
            error_message: None,
            error_kind: None,
        }
    }

    /// Whether the task has finished (completed, failed or cancelled)
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `next`, refusing transitions the state machine does not allow
    pub fn transition(&mut self, next: DownloadStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(self.invalid_state(&format!("move to {}", next)));
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// Record byte counters and the derived percentage
    ///
    /// Progress never moves backwards. Returns `true` if the stored percentage advanced.
    pub fn record_progress(&mut self, percent: u8, downloaded_bytes: u64, total_bytes: u64) -> bool {
        if self.is_terminal() {
            return false;
        }
        let percent = percent.min(100);
        let advanced = percent > self.progress;
        if advanced {
            self.progress = percent;
        }
        self.downloaded_bytes = self.downloaded_bytes.max(downloaded_bytes);
        if total_bytes > 0 {
            self.total_bytes = total_bytes;
        }
        self.touch();
        advanced
    }

    /// Set the output name and location
    pub fn set_output(&mut self, file_name: impl Into<String>, output_path: PathBuf) -> Result<()> {
        if self.is_terminal() {
            return Err(self.invalid_state("set output of"));
        }
        self.file_name = Some(file_name.into());
        self.output_path = Some(output_path);
        self.touch();
        Ok(())
    }

    /// Finish successfully at `output_path` with progress 100
    pub fn complete(&mut self, output_path: &Path) -> Result<()> {
        self.transition(DownloadStatus::Completed)?;
        self.progress = 100;
        if self.total_bytes > 0 {
            self.downloaded_bytes = self.total_bytes;
        }
        if let Some(name) = output_path.file_name() {
            self.file_name = Some(name.to_string_lossy().into_owned());
        }
        self.output_path = Some(output_path.to_path_buf());
        Ok(())
    }

    /// Finish with a categorized failure
    pub fn fail(&mut self, error: &DownloadError) -> Result<()> {
        self.transition(DownloadStatus::Failed)?;
        self.error_message = Some(error.to_string());
        self.error_kind = Some(error.kind());
        Ok(())
    }

    /// Finish because the user asked to
    pub fn cancel(&mut self) -> Result<()> {
        self.transition(DownloadStatus::Cancelled)
    }

    fn touch(&mut self) {
        self.updated_at = now_millis().max(self.updated_at).max(self.created_at);
    }

    fn invalid_state(&self, operation: &str) -> Error {
        Error::InvalidState {
            task_id: self.task_id.to_string(),
            operation: operation.to_string(),
            current_state: self.status.to_string(),
        }
    }
}
