//! Core download coordinator split into focused submodules.
//!
//! The `DownloadCoordinator` struct and its methods are organized by domain:
//! - [`batch`] - Batch startup: task submission and drain-loop spawning
//! - [`worker`] - Single-task execution unit
//! - [`drain`] - Progress event draining and aggregation
//! - [`control`] - Batch cancellation and state queries
//!
//! Concurrency discipline: workers only ever write to the progress event
//! channel; the drain loop is the sole writer of [`AggregateProgress`],
//! publishing snapshots over a `watch` channel for readers.

mod batch;
mod control;
mod drain;
mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use batch::BatchHandle;

use crate::config::Config;
use crate::fetch::MediaFetcher;
use crate::types::{AggregateProgress, BatchEvent, BatchState};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, watch};
use tokio_util::sync::CancellationToken;

/// Batch state shared between coordinator operations and the drain loop
#[derive(Clone)]
pub(crate) struct BatchControl {
    /// Current batch state; transitions only through coordinator operations
    pub(crate) state: Arc<Mutex<BatchState>>,
    /// Root cancellation token of the current batch (replaced per batch)
    pub(crate) cancel_root: Arc<Mutex<CancellationToken>>,
}

/// The download coordinator (cloneable - all fields are Arc-wrapped)
///
/// Owns the batch state machine, the bounded worker pool, and the progress
/// aggregation pipeline. One coordinator instance manages one batch at a
/// time; construct it once per session and reuse it across batches.
#[derive(Clone)]
pub struct DownloadCoordinator {
    /// Fetch implementation used for every task
    pub(crate) fetcher: Arc<dyn MediaFetcher>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Batch lifecycle broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<BatchEvent>,
    /// Aggregate progress publisher; the drain loop is the only writer
    pub(crate) progress_tx: Arc<watch::Sender<AggregateProgress>>,
    /// Shared batch state
    pub(crate) control: BatchControl,
}

impl DownloadCoordinator {
    /// Create a new coordinator
    pub fn new(config: Config, fetcher: Arc<dyn MediaFetcher>) -> Self {
        let (event_tx, _rx) = broadcast::channel(256);
        let (progress_tx, _rx) = watch::channel(AggregateProgress::default());

        Self {
            fetcher,
            config: Arc::new(config),
            event_tx,
            progress_tx: Arc::new(progress_tx),
            control: BatchControl {
                state: Arc::new(Mutex::new(BatchState::Idle)),
                cancel_root: Arc::new(Mutex::new(CancellationToken::new())),
            },
        }
    }

    /// Subscribe to batch lifecycle events
    ///
    /// Multiple subscribers are supported; each receives all events
    /// independently.
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.event_tx.subscribe()
    }

    /// A receiver of aggregate progress snapshots
    ///
    /// The UI reads this at its own cadence: `borrow()` for the latest
    /// snapshot, or `changed().await` to follow updates. A fresh snapshot
    /// is published once per drain tick.
    pub fn progress(&self) -> watch::Receiver<AggregateProgress> {
        self.progress_tx.subscribe()
    }

    /// The current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Emit a lifecycle event to all subscribers
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// batches proceed whether or not anyone is listening.
    pub(crate) fn emit_event(&self, event: BatchEvent) {
        self.event_tx.send(event).ok();
    }
}
