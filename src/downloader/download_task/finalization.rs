//! Task finalization: terminal status, events and cleanup.

use std::path::{Path, PathBuf};

use crate::types::Event;
use crate::utils::remove_path_quietly;

use super::context::{DownloadTaskContext, Halt};

/// Record the task's terminal status and remove its intermediate files.
///
/// Intermediate files are removed on every path, before the terminal status is written.
pub(super) async fn finalize_task(
    ctx: &DownloadTaskContext,
    temp_dir: &Path,
    result: Result<PathBuf, Halt>,
) {
    remove_path_quietly(temp_dir).await;

    let id = &ctx.task_id;
    match result {
        Ok(path) => {
            match ctx.persist("complete", |r| r.complete(&path)).await {
                Ok(()) => {
                    tracing::info!(task_id = %id, path = ?path, "Task completed");
                    ctx.emit(Event::Complete {
                        task_id: id.clone(),
                        path,
                    });
                }
                Err(halt) => report_abandoned(ctx, &halt),
            }
        }
        Err(Halt::Cancelled) => match ctx.persist("cancel", |r| r.cancel()).await {
            Ok(()) => {
                tracing::info!(task_id = %id, "Task cancelled");
                ctx.emit(Event::Cancelled {
                    task_id: id.clone(),
                });
            }
            Err(halt) => report_abandoned(ctx, &halt),
        },
        Err(Halt::Failed(error)) => {
            tracing::error!(
                task_id = %id,
                kind = %error.kind(),
                error = %error,
                "Task failed"
            );
            let kind = error.kind();
            let message = error.to_string();
            match ctx.persist("fail", |r| r.fail(&error)).await {
                Ok(()) => ctx.emit(Event::Failed {
                    task_id: id.clone(),
                    kind,
                    error: message,
                }),
                Err(halt) => report_abandoned(ctx, &halt),
            }
        }
        Err(halt @ Halt::Abandoned(_)) => report_abandoned(ctx, &halt),
    }
}

fn report_abandoned(ctx: &DownloadTaskContext, halt: &Halt) {
    if let Halt::Abandoned(reason) = halt {
        tracing::warn!(task_id = %ctx.task_id, reason = %reason, "Task abandoned without a terminal status");
    }
}
