//! Single-task execution unit.
//!
//! Each worker waits for a pool slot, runs one fetch, and posts exactly one
//! terminal event (`Finished`, `Failed`, or `Cancelled`) to the progress
//! queue. That exactly-once guarantee is what makes the coordinator's
//! `completed_count` converge to `total_count` without double counting or
//! stuck batches.

use crate::error::FetchError;
use crate::fetch::{MediaFetcher, ProgressSink};
use crate::types::{DownloadTask, ProgressEvent};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

/// Everything one worker needs to run its task
pub(crate) struct WorkerContext {
    pub(crate) task: DownloadTask,
    pub(crate) fetcher: Arc<dyn MediaFetcher>,
    pub(crate) semaphore: Arc<Semaphore>,
    pub(crate) cancel: CancellationToken,
    pub(crate) events: mpsc::UnboundedSender<ProgressEvent>,
}

/// Spawn the worker task for one download
pub(crate) fn spawn_worker(ctx: WorkerContext) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run_worker(ctx))
}

async fn run_worker(ctx: WorkerContext) {
    let task_id = ctx.task.task_id;

    // Queued-but-not-started tasks abort here without ever taking a slot
    let permit = tokio::select! {
        _ = ctx.cancel.cancelled() => {
            ctx.events.send(ProgressEvent::Cancelled { task_id }).ok();
            return;
        }
        permit = ctx.semaphore.clone().acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => {
                // Semaphore closed during teardown
                ctx.events.send(ProgressEvent::Cancelled { task_id }).ok();
                return;
            }
        },
    };
    let _permit = permit;

    if ctx.cancel.is_cancelled() {
        ctx.events.send(ProgressEvent::Cancelled { task_id }).ok();
        return;
    }

    // Idempotent re-run: an existing destination file counts as already
    // downloaded and is never re-fetched or overwritten
    match tokio::fs::try_exists(&ctx.task.destination).await {
        Ok(true) => {
            tracing::info!(
                task_id = %task_id,
                path = %ctx.task.destination.display(),
                "destination already exists, skipping fetch"
            );
            ctx.events.send(ProgressEvent::Finished { task_id }).ok();
            return;
        }
        Ok(false) => {}
        Err(e) => {
            tracing::warn!(
                task_id = %task_id,
                path = %ctx.task.destination.display(),
                error = %e,
                "could not check destination, fetching anyway"
            );
        }
    }

    tracing::debug!(task_id = %task_id, url = %ctx.task.source_url, "starting fetch");
    let sink = ProgressSink::new(task_id, ctx.events.clone());

    let terminal = match ctx
        .fetcher
        .fetch(&ctx.task.source_url, &ctx.task.destination, &sink, &ctx.cancel)
        .await
    {
        Ok(()) => ProgressEvent::Finished { task_id },
        Err(FetchError::Cancelled) => ProgressEvent::Cancelled { task_id },
        Err(e) => {
            tracing::warn!(
                task_id = %task_id,
                title = %ctx.task.title,
                error = %e,
                "download failed"
            );
            ProgressEvent::Failed {
                task_id,
                error: e.to_string(),
            }
        }
    };

    ctx.events.send(terminal).ok();
}
