//! Batch startup — task submission and drain-loop spawning.

use super::{DownloadCoordinator, drain, worker};
use crate::error::{BatchError, Error, Result};
use crate::types::{AggregateProgress, BatchEvent, BatchState, BatchSummary, DownloadTask};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

/// Handle to one running batch, returned by `start_batch`
///
/// Dropping the handle does not affect the batch; it keeps running and the
/// coordinator's `watch`/`broadcast` channels still report on it.
#[derive(Debug)]
pub struct BatchHandle {
    pub(crate) cancel: CancellationToken,
    pub(crate) finished: tokio::task::JoinHandle<BatchSummary>,
}

impl BatchHandle {
    /// The batch's root cancellation token
    ///
    /// Firing it is equivalent to `cancel_batch` at the worker level, but
    /// bypasses the coordinator's state checks; prefer
    /// [`DownloadCoordinator::cancel_batch`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the batch to reach its terminal state
    pub async fn wait(self) -> Result<BatchSummary> {
        self.finished
            .await
            .map_err(|e| Error::Other(format!("batch drain task failed: {e}")))
    }
}

impl DownloadCoordinator {
    /// Start a download batch with the configured concurrency limit
    ///
    /// Preconditions: `tasks` is non-empty and no batch is currently
    /// running. Resets aggregate progress, transitions to `Running`,
    /// submits every task to the bounded worker pool, and returns
    /// immediately; the actual work proceeds on background tasks.
    pub async fn start_batch(&self, tasks: Vec<DownloadTask>) -> Result<BatchHandle> {
        let limit = self.config.download.max_concurrent_downloads;
        self.start_batch_with_limit(tasks, limit).await
    }

    /// Start a download batch with an explicit concurrency limit
    pub async fn start_batch_with_limit(
        &self,
        tasks: Vec<DownloadTask>,
        max_concurrency: usize,
    ) -> Result<BatchHandle> {
        if tasks.is_empty() {
            return Err(BatchError::EmptyBatch.into());
        }

        {
            let mut state = self.control.state.lock().await;
            match *state {
                BatchState::Idle | BatchState::Finished => {}
                current => {
                    return Err(BatchError::InvalidState {
                        operation: "start_batch".to_string(),
                        current_state: format!("{current:?}"),
                    }
                    .into());
                }
            }
            *state = BatchState::Running;
        }

        if let Err(e) = ensure_destination_dirs(&tasks).await {
            // Roll back so the caller can fix the problem and retry
            *self.control.state.lock().await = BatchState::Idle;
            return Err(e);
        }

        let total = tasks.len();
        let task_ids = tasks.iter().map(|t| t.task_id).collect();

        let root = CancellationToken::new();
        *self.control.cancel_root.lock().await = root.clone();

        let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
        let (progress_event_tx, progress_event_rx) = mpsc::unbounded_channel();

        tracing::info!(total, max_concurrency, "starting download batch");

        for task in tasks {
            worker::spawn_worker(worker::WorkerContext {
                task,
                fetcher: Arc::clone(&self.fetcher),
                semaphore: Arc::clone(&semaphore),
                cancel: root.child_token(),
                events: progress_event_tx.clone(),
            });
        }
        // Workers hold the remaining senders; the channel closing early is
        // how the drain loop detects a worker that died without reporting
        drop(progress_event_tx);

        let finished = drain::spawn_drain_loop(drain::DrainContext {
            events: progress_event_rx,
            aggregate: AggregateProgress::new_batch(total),
            task_ids,
            state: Arc::clone(&self.control.state),
            progress_tx: Arc::clone(&self.progress_tx),
            batch_events: self.event_tx.clone(),
            interval: self.config.download.progress_interval,
        });

        self.emit_event(BatchEvent::Started { total });

        Ok(BatchHandle {
            cancel: root,
            finished,
        })
    }
}

/// Create every destination directory referenced by the batch
async fn ensure_destination_dirs(tasks: &[DownloadTask]) -> Result<()> {
    let mut dirs: Vec<&Path> = tasks
        .iter()
        .filter_map(|t| t.destination.parent())
        .filter(|dir| !dir.as_os_str().is_empty())
        .collect();
    dirs.sort();
    dirs.dedup();

    for dir in dirs {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "failed to create download directory '{}': {}",
                    dir.display(),
                    e
                ),
            ))
        })?;
    }
    Ok(())
}
