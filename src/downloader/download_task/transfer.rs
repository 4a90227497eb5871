//! Concurrent stream retrieval with sibling cancellation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::stream::{StreamOutcome, StreamProgress};
use crate::types::StreamKind;

use super::context::{DownloadTaskContext, Halt};
use super::resolution::PlannedStream;

/// A stream that finished on disk
#[derive(Debug, Clone)]
pub(super) struct FetchedStream {
    pub(super) kind: StreamKind,
    pub(super) path: PathBuf,
}

/// Retrieve every planned stream into `temp_dir`, concurrently
///
/// The streams share a child of the task's cancellation token. The first stream to fail
/// cancels that child, so its siblings stop and delete their partial files. The error
/// reported is the one that failed first, not a sibling's cancellation.
pub(super) async fn download_streams(
    ctx: &DownloadTaskContext,
    streams: &[PlannedStream],
    progress: &[Arc<StreamProgress>],
    temp_dir: &Path,
) -> Result<Vec<FetchedStream>, Halt> {
    let downloader = ctx.downloader.components.stream_downloader.clone();
    let siblings = ctx.cancel_token.child_token();

    let transfers = streams.iter().zip(progress).map(|(stream, progress)| {
        let downloader = &downloader;
        let siblings = &siblings;
        let destination = temp_dir.join(&stream.temp_name);
        async move {
            let result = downloader
                .download(&stream.request, &destination, progress, siblings)
                .await;
            let mut first_failure = false;
            if let Err(ref e) = result {
                first_failure = !siblings.is_cancelled();
                tracing::warn!(
                    task_id = %ctx.task_id,
                    kind = %stream.request.kind,
                    error = %e,
                    "Stream failed, cancelling sibling streams"
                );
                siblings.cancel();
            }
            (stream.request.kind, result, first_failure)
        }
    });

    let results = futures::future::join_all(transfers).await;

    if ctx.cancel_token.is_cancelled() {
        return Err(Halt::Cancelled);
    }

    let mut fetched = Vec::with_capacity(results.len());
    let mut first_error = None;
    let mut cancelled = false;
    for (kind, result, first_failure) in results {
        match result {
            Ok(StreamOutcome::Completed { path, bytes }) => {
                tracing::debug!(task_id = %ctx.task_id, %kind, bytes, "Stream retrieved");
                fetched.push(FetchedStream { kind, path });
            }
            Ok(StreamOutcome::Cancelled) => cancelled = true,
            Err(e) => {
                if first_failure || first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    if let Some(e) = first_error {
        return Err(Halt::Failed(e));
    }
    if cancelled {
        return Err(Halt::Cancelled);
    }
    Ok(fetched)
}
