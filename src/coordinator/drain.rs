//! Progress event draining and aggregation.
//!
//! The drain loop is the single consumer of the progress event queue and
//! the single writer of [`AggregateProgress`]. On a fixed tick it pops all
//! currently-queued events without blocking, applies them, and publishes a
//! fresh snapshot. No lock protects the aggregate itself - the single-writer
//! discipline makes one unnecessary.

use crate::types::{
    AggregateProgress, BatchEvent, BatchState, BatchSummary, ProgressEvent, TaskId, TaskOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{Mutex, broadcast, mpsc, watch};

/// Everything the drain loop needs for one batch
pub(crate) struct DrainContext {
    pub(crate) events: mpsc::UnboundedReceiver<ProgressEvent>,
    pub(crate) aggregate: AggregateProgress,
    /// Full task-id set of the batch; used to settle unreported tasks if
    /// the event channel dies before every terminal event arrived
    pub(crate) task_ids: Vec<TaskId>,
    pub(crate) state: Arc<Mutex<BatchState>>,
    pub(crate) progress_tx: Arc<watch::Sender<AggregateProgress>>,
    pub(crate) batch_events: broadcast::Sender<BatchEvent>,
    pub(crate) interval: Duration,
}

/// Spawn the drain loop for one batch; resolves to the batch summary
pub(crate) fn spawn_drain_loop(ctx: DrainContext) -> tokio::task::JoinHandle<BatchSummary> {
    tokio::spawn(run_drain_loop(ctx))
}

async fn run_drain_loop(mut ctx: DrainContext) -> BatchSummary {
    let mut interval = tokio::time::interval(ctx.interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let cancelling = matches!(*ctx.state.lock().await, BatchState::Cancelling);
        ctx.aggregate.state = if cancelling {
            BatchState::Cancelling
        } else {
            BatchState::Running
        };

        let mut disconnected = false;
        loop {
            match ctx.events.try_recv() {
                Ok(event) => apply_event(&mut ctx.aggregate, event, cancelling),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        if disconnected && ctx.aggregate.completed_count < ctx.aggregate.total_count {
            settle_unreported_tasks(&mut ctx.aggregate, &ctx.task_ids);
        }

        if ctx.aggregate.completed_count >= ctx.aggregate.total_count {
            *ctx.state.lock().await = BatchState::Finished;
            ctx.aggregate.state = BatchState::Finished;

            let summary = ctx.aggregate.summary();
            // send_replace stores the snapshot even when no UI is subscribed yet
            ctx.progress_tx.send_replace(ctx.aggregate.clone());
            ctx.batch_events
                .send(BatchEvent::Finished {
                    summary: summary.clone(),
                })
                .ok();

            tracing::info!(
                total = summary.total,
                succeeded = summary.succeeded,
                failed = summary.failed,
                cancelled = summary.cancelled,
                "batch finished"
            );
            return summary;
        }

        ctx.progress_tx.send_replace(ctx.aggregate.clone());
    }
}

/// Apply one progress event to the aggregate
///
/// Invariants enforced here:
/// - per-task percent stays in [0, 100] and never decreases
/// - `bytes_done` never decreases, even if events arrive reordered
/// - at most one terminal event takes effect per task; a duplicate is a
///   detected bug and is logged, not counted
/// - while cancelling, non-terminal events are discarded
pub(crate) fn apply_event(aggregate: &mut AggregateProgress, event: ProgressEvent, cancelling: bool) {
    match event {
        ProgressEvent::Downloading {
            task_id,
            bytes_done,
            bytes_total,
            speed_bps,
        } => {
            if cancelling {
                return;
            }
            let entry = aggregate.per_task.entry(task_id).or_default();
            if entry.is_terminal() {
                return;
            }
            if let Some(total) = bytes_total.filter(|t| *t > 0) {
                let percent = (bytes_done as f32 / total as f32) * 100.0;
                entry.percent = entry.percent.max(percent.clamp(0.0, 100.0));
            }
            // Unknown total: carry the last known percent forward
            entry.bytes_done = entry.bytes_done.max(bytes_done);
            if let Some(speed) = speed_bps {
                entry.speed_bps = speed;
            }
        }
        ProgressEvent::Finished { task_id } => {
            apply_terminal(aggregate, task_id, TaskOutcome::Succeeded, None);
        }
        ProgressEvent::Failed { task_id, error } => {
            apply_terminal(aggregate, task_id, TaskOutcome::Failed, Some(error));
        }
        ProgressEvent::Cancelled { task_id } => {
            apply_terminal(aggregate, task_id, TaskOutcome::Cancelled, None);
        }
    }
}

fn apply_terminal(
    aggregate: &mut AggregateProgress,
    task_id: TaskId,
    outcome: TaskOutcome,
    error: Option<String>,
) {
    let entry = aggregate.per_task.entry(task_id).or_default();
    if entry.is_terminal() {
        tracing::warn!(
            task_id = %task_id,
            ?outcome,
            "duplicate terminal event ignored"
        );
        return;
    }

    entry.percent = 100.0;
    entry.speed_bps = 0;
    entry.outcome = Some(outcome);
    if outcome == TaskOutcome::Failed {
        aggregate.has_errors = true;
        entry.error = error;
    }

    aggregate.completed_count += 1;
}

/// Mark every task that never delivered a terminal event as failed
///
/// Only reachable when the event channel closed early, i.e. a worker died
/// without reporting. Keeps `completed_count` convergent so the batch can
/// never hang.
fn settle_unreported_tasks(aggregate: &mut AggregateProgress, task_ids: &[TaskId]) {
    for &task_id in task_ids {
        let settled = aggregate
            .per_task
            .get(&task_id)
            .map(|t| t.is_terminal())
            .unwrap_or(false);
        if !settled {
            tracing::error!(
                task_id = %task_id,
                "worker stopped without reporting a result, marking failed"
            );
            apply_terminal(
                aggregate,
                task_id,
                TaskOutcome::Failed,
                Some("worker stopped without reporting a result".to_string()),
            );
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn downloading(id: u64, done: u64, total: Option<u64>) -> ProgressEvent {
        ProgressEvent::Downloading {
            task_id: TaskId::new(id),
            bytes_done: done,
            bytes_total: total,
            speed_bps: Some(1000),
        }
    }

    #[test]
    fn downloading_updates_percent_from_known_total() {
        let mut aggregate = AggregateProgress::new_batch(1);
        apply_event(&mut aggregate, downloading(0, 250, Some(1000)), false);

        let task = &aggregate.per_task[&TaskId::new(0)];
        assert!((task.percent - 25.0).abs() < 0.01, "got {}", task.percent);
        assert_eq!(task.bytes_done, 250);
    }

    #[test]
    fn percent_never_decreases_even_with_reordered_events() {
        let mut aggregate = AggregateProgress::new_batch(1);
        apply_event(&mut aggregate, downloading(0, 800, Some(1000)), false);
        apply_event(&mut aggregate, downloading(0, 300, Some(1000)), false);

        let task = &aggregate.per_task[&TaskId::new(0)];
        assert!(
            (task.percent - 80.0).abs() < 0.01,
            "percent must hold at 80, got {}",
            task.percent
        );
        assert_eq!(task.bytes_done, 800, "bytes_done must not decrease");
    }

    #[test]
    fn unknown_total_carries_percent_forward() {
        let mut aggregate = AggregateProgress::new_batch(1);
        apply_event(&mut aggregate, downloading(0, 500, Some(1000)), false);
        apply_event(&mut aggregate, downloading(0, 900, None), false);

        let task = &aggregate.per_task[&TaskId::new(0)];
        assert!(
            (task.percent - 50.0).abs() < 0.01,
            "percent should carry forward when total is unknown, got {}",
            task.percent
        );
        assert_eq!(task.bytes_done, 900, "bytes still advance");
    }

    #[test]
    fn percent_is_clamped_when_bytes_overrun_total() {
        let mut aggregate = AggregateProgress::new_batch(1);
        // Some servers understate Content-Length
        apply_event(&mut aggregate, downloading(0, 1500, Some(1000)), false);

        let task = &aggregate.per_task[&TaskId::new(0)];
        assert!(task.percent <= 100.0, "got {}", task.percent);
    }

    #[test]
    fn terminal_events_complete_tasks_exactly_once() {
        let mut aggregate = AggregateProgress::new_batch(2);
        let finished = ProgressEvent::Finished {
            task_id: TaskId::new(0),
        };

        apply_event(&mut aggregate, finished.clone(), false);
        assert_eq!(aggregate.completed_count, 1);

        // A second terminal event for the same task is a detected bug and
        // must not double count
        apply_event(&mut aggregate, finished, false);
        assert_eq!(aggregate.completed_count, 1);

        apply_event(
            &mut aggregate,
            ProgressEvent::Cancelled {
                task_id: TaskId::new(0),
            },
            false,
        );
        assert_eq!(
            aggregate.completed_count, 1,
            "a different terminal kind must not double count either"
        );
        assert_eq!(
            aggregate.per_task[&TaskId::new(0)].outcome,
            Some(TaskOutcome::Succeeded),
            "the first terminal outcome wins"
        );
    }

    #[test]
    fn failed_sets_has_errors_and_records_message() {
        let mut aggregate = AggregateProgress::new_batch(1);
        apply_event(
            &mut aggregate,
            ProgressEvent::Failed {
                task_id: TaskId::new(0),
                error: "HTTP 502".into(),
            },
            false,
        );

        assert!(aggregate.has_errors);
        let task = &aggregate.per_task[&TaskId::new(0)];
        assert_eq!(task.percent, 100.0, "failed tasks count as done for progress");
        assert_eq!(task.error.as_deref(), Some("HTTP 502"));
        assert_eq!(aggregate.completed_count, 1);
    }

    #[test]
    fn progress_after_terminal_is_ignored() {
        let mut aggregate = AggregateProgress::new_batch(1);
        apply_event(
            &mut aggregate,
            ProgressEvent::Finished {
                task_id: TaskId::new(0),
            },
            false,
        );
        apply_event(&mut aggregate, downloading(0, 10, Some(1000)), false);

        let task = &aggregate.per_task[&TaskId::new(0)];
        assert_eq!(task.percent, 100.0, "late progress must not regress a terminal task");
    }

    #[test]
    fn cancelling_discards_progress_but_applies_terminals() {
        let mut aggregate = AggregateProgress::new_batch(2);
        apply_event(&mut aggregate, downloading(0, 500, Some(1000)), true);
        assert!(
            aggregate.per_task.is_empty(),
            "non-terminal events are discarded while cancelling"
        );

        apply_event(
            &mut aggregate,
            ProgressEvent::Cancelled {
                task_id: TaskId::new(0),
            },
            true,
        );
        assert_eq!(aggregate.completed_count, 1);
    }

    #[test]
    fn cancellation_alone_does_not_set_has_errors() {
        let mut aggregate = AggregateProgress::new_batch(1);
        apply_event(
            &mut aggregate,
            ProgressEvent::Cancelled {
                task_id: TaskId::new(0),
            },
            true,
        );
        assert!(!aggregate.has_errors);
    }

    #[test]
    fn overall_percent_is_monotonic_across_event_sequences() {
        let mut aggregate = AggregateProgress::new_batch(3);
        let mut last_overall = 0.0f32;

        let events = [
            downloading(0, 100, Some(1000)),
            downloading(1, 500, Some(1000)),
            downloading(0, 50, Some(1000)), // reordered, must not regress
            ProgressEvent::Finished {
                task_id: TaskId::new(1),
            },
            downloading(2, 999, Some(1000)),
            ProgressEvent::Failed {
                task_id: TaskId::new(2),
                error: "x".into(),
            },
            ProgressEvent::Finished {
                task_id: TaskId::new(0),
            },
        ];

        for event in events {
            apply_event(&mut aggregate, event, false);
            let overall = aggregate.overall_percent();
            assert!(
                overall >= last_overall,
                "overall percent regressed from {last_overall} to {overall}"
            );
            assert!((0.0..=100.0).contains(&overall));
            last_overall = overall;
        }

        assert_eq!(aggregate.completed_count, 3);
        assert!((aggregate.overall_percent() - 100.0).abs() < 0.01);
    }

    #[test]
    fn settle_unreported_tasks_fails_silent_workers_only() {
        let mut aggregate = AggregateProgress::new_batch(3);
        let ids = vec![TaskId::new(0), TaskId::new(1), TaskId::new(2)];

        apply_event(
            &mut aggregate,
            ProgressEvent::Finished {
                task_id: TaskId::new(0),
            },
            false,
        );
        apply_event(&mut aggregate, downloading(1, 10, Some(100)), false);

        settle_unreported_tasks(&mut aggregate, &ids);

        assert_eq!(aggregate.completed_count, 3, "batch must converge");
        assert_eq!(
            aggregate.per_task[&TaskId::new(0)].outcome,
            Some(TaskOutcome::Succeeded),
            "already-terminal tasks are untouched"
        );
        assert_eq!(
            aggregate.per_task[&TaskId::new(1)].outcome,
            Some(TaskOutcome::Failed)
        );
        assert_eq!(
            aggregate.per_task[&TaskId::new(2)].outcome,
            Some(TaskOutcome::Failed)
        );
        assert!(aggregate.has_errors);
    }
}
