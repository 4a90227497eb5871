//! Task orchestration: top-level lifecycle for a single task.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::DownloadError;
use crate::extractor::StreamDetails;
use crate::stream::StreamProgress;
use crate::types::{DownloadStatus, DownloadType, Event, StreamKind};
use crate::utils::{get_unique_path, move_file};

use super::super::background_tasks::{ProgressReporterParams, spawn_progress_reporter};
use super::context::{DownloadTaskContext, Halt};
use super::finalization::finalize_task;
use super::resolution::{TaskPlan, plan_task};
use super::transfer::{FetchedStream, download_streams};

/// Core task pipeline: orchestrates the full lifecycle of a single task.
///
/// Phases:
/// 1. Bail out if cancelled while queued
/// 2. Resolve streams and decide the output location
/// 3. Transition to Downloading and retrieve all streams concurrently
/// 4. Mux (muxed tasks only)
/// 5. Move the artifact to its final location
/// 6. Record the terminal status and clean up intermediate files
pub(crate) async fn run_download_task(ctx: DownloadTaskContext) {
    tracing::info!(task_id = %ctx.task_id, "Task pipeline started");

    let temp_dir = ctx.temp_dir();
    let result = execute(&ctx, &temp_dir).await;
    finalize_task(&ctx, &temp_dir, result).await;

    ctx.remove_from_active().await;
}

async fn execute(ctx: &DownloadTaskContext, temp_dir: &Path) -> Result<PathBuf, Halt> {
    // Phase 1: Cancelled between submit and start
    ctx.check_cancelled()?;
    let record = ctx.load_record().await?;

    // Phase 2: Resolve
    let details = resolve_streams(ctx, &record.vid).await?;
    let plan = plan_task(
        &details,
        &record.vid,
        record.download_type,
        &ctx.options,
        ctx.config().download_dir(),
    )?;

    ctx.persist("record output location", |r| {
        r.set_output(plan.file_name.clone(), plan.output_path.clone())?;
        r.record_progress(0, 0, plan.total_bytes);
        Ok(())
    })
    .await?;
    ctx.emit(Event::Resolved {
        task_id: ctx.task_id.clone(),
        file_name: plan.file_name.clone(),
    });
    tracing::info!(
        task_id = %ctx.task_id,
        vid = %record.vid,
        file_name = %plan.file_name,
        streams = plan.streams.len(),
        "Streams resolved"
    );

    tokio::fs::create_dir_all(temp_dir)
        .await
        .map_err(|e| DownloadError::storage_at("create", temp_dir, e))?;

    // Phase 3: Download
    ctx.check_cancelled()?;
    ctx.persist("start downloading", |r| {
        r.transition(DownloadStatus::Downloading)
    })
    .await?;
    let fetched = transfer_with_progress(ctx, &plan, temp_dir).await?;

    // Phase 4: Mux
    let artifact = if record.download_type.requires_mux() {
        mux_streams(ctx, &record.vid, &fetched, &plan, temp_dir).await?
    } else {
        single_artifact(record.download_type, fetched)?
    };

    // Phase 5: Move into place
    move_to_output(ctx, &artifact, &plan.output_path).await
}

/// Ask the extractor for the video's streams, giving up as soon as the task is cancelled
async fn resolve_streams(ctx: &DownloadTaskContext, vid: &str) -> Result<StreamDetails, Halt> {
    let extractor = ctx.downloader.components.extractor.clone();
    tokio::select! {
        biased;
        _ = ctx.cancel_token.cancelled() => Err(Halt::Cancelled),
        res = extractor.extract(vid) => res.map_err(|e| {
            Halt::Failed(DownloadError::connection(
                format!("failed to resolve streams for {}", vid),
                e,
            ))
        }),
    }
}

async fn transfer_with_progress(
    ctx: &DownloadTaskContext,
    plan: &TaskPlan,
    temp_dir: &Path,
) -> Result<Vec<FetchedStream>, Halt> {
    let progress: Vec<Arc<StreamProgress>> = plan
        .streams
        .iter()
        .map(|s| Arc::new(StreamProgress::new(s.request.expected_size)))
        .collect();

    let reporter_stop = tokio_util::sync::CancellationToken::new();
    let reporter = spawn_progress_reporter(ProgressReporterParams {
        task_id: ctx.task_id.clone(),
        streams: progress.clone(),
        interval: Duration::from_millis(ctx.config().download.progress_interval_ms),
        step: ctx.config().download.progress_step,
        history: ctx.downloader.history.clone(),
        event_tx: ctx.downloader.event_tx.clone(),
        cancel_token: reporter_stop.clone(),
    });

    let result = download_streams(ctx, &plan.streams, &progress, temp_dir).await;

    // The reporter must not write after the terminal status
    reporter_stop.cancel();
    if let Err(e) = reporter.await {
        tracing::warn!(task_id = %ctx.task_id, error = %e, "Progress reporter task failed");
    }

    result
}

async fn mux_streams(
    ctx: &DownloadTaskContext,
    vid: &str,
    fetched: &[FetchedStream],
    plan: &TaskPlan,
    temp_dir: &Path,
) -> Result<PathBuf, Halt> {
    let find = |kind: StreamKind| {
        fetched
            .iter()
            .find(|s| s.kind == kind)
            .map(|s| s.path.clone())
            .ok_or_else(|| Halt::Abandoned(format!("{} stream missing after transfer", kind)))
    };
    let video = find(StreamKind::Video)?;
    let audio = find(StreamKind::Audio)?;

    // No mux starts once cancellation has been requested
    ctx.check_cancelled()?;
    ctx.persist("start muxing", |r| r.transition(DownloadStatus::Muxing))
        .await?;
    ctx.emit(Event::Muxing {
        task_id: ctx.task_id.clone(),
    });

    let muxer = ctx.downloader.components.muxer.clone();
    tracing::info!(task_id = %ctx.task_id, muxer = muxer.name(), "Muxing audio and video");

    let output = temp_dir.join(format!("muxed.{}", plan.extension));
    muxer
        .mux(&video, &audio, &output)
        .await
        .map_err(|e| DownloadError::muxing(format!("failed to mux {}", vid), e))?;

    ctx.check_cancelled()?;
    Ok(output)
}

fn single_artifact(
    download_type: DownloadType,
    fetched: Vec<FetchedStream>,
) -> Result<PathBuf, Halt> {
    fetched
        .into_iter()
        .next()
        .map(|s| s.path)
        .ok_or_else(|| Halt::Abandoned(format!("{} task produced no file", download_type)))
}

async fn move_to_output(
    ctx: &DownloadTaskContext,
    artifact: &Path,
    output_path: &Path,
) -> Result<PathBuf, Halt> {
    if let Some(dir) = output_path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| DownloadError::storage_at("create", dir, e))?;
    }

    let target = get_unique_path(output_path, ctx.config().download.file_collision)?;
    move_file(artifact, &target)
        .await
        .map_err(|e| DownloadError::storage_at("move output to", &target, e))?;

    tracing::debug!(task_id = %ctx.task_id, path = ?target, "Output moved into place");
    Ok(target)
}
