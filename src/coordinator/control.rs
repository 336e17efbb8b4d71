//! Batch cancellation and state queries.

use super::DownloadCoordinator;
use crate::error::{BatchError, Result};
use crate::types::BatchState;

impl DownloadCoordinator {
    /// Request cancellation of the running batch
    ///
    /// Valid only while a batch is `Running`. Transitions the batch to
    /// `Cancelling` and fires the batch's root cancellation token:
    /// - queued-but-unstarted tasks abort before taking a pool slot
    /// - in-flight fetches observe the token at their next progress
    ///   checkpoint and abort
    ///
    /// Cancellation is cooperative, not preemptive: each worker still
    /// posts its terminal event, and the drain loop (which discards
    /// non-terminal events from this point on) completes the transition to
    /// `Finished` with a cancelled outcome once all tasks have settled.
    pub async fn cancel_batch(&self) -> Result<()> {
        {
            let mut state = self.control.state.lock().await;
            match *state {
                BatchState::Running => {}
                current => {
                    return Err(BatchError::InvalidState {
                        operation: "cancel_batch".to_string(),
                        current_state: format!("{current:?}"),
                    }
                    .into());
                }
            }
            *state = BatchState::Cancelling;
        }

        self.control.cancel_root.lock().await.cancel();
        tracing::info!("batch cancellation requested");
        Ok(())
    }

    /// The current batch state
    pub async fn batch_state(&self) -> BatchState {
        *self.control.state.lock().await
    }
}
