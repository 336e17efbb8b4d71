//! Core types for stream-harvester

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Unique identifier for a download task within a batch
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<TaskId> for u64 {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// One listed episode, as produced by an episode lister
///
/// Immutable once listed. The selection model copies descriptors out of the
/// listing; the coordinator never sees them directly, only the
/// [`DownloadTask`]s built from them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpisodeDescriptor {
    /// Stable identifier from the source (feed GUID, or enclosure URL as fallback)
    pub id: String,

    /// Episode title
    pub title: String,

    /// URL of the media enclosure to download
    pub source_url: String,

    /// Episode duration, if the source declared one
    pub duration: Option<Duration>,

    /// Publish timestamp, if the source declared one
    pub published_at: Option<DateTime<Utc>>,
}

/// One unit of download work within a batch
///
/// Created by the selection model when a batch is built, one per selected
/// episode. Lives for the duration of a single batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadTask {
    /// Task identifier, unique within the batch
    pub task_id: TaskId,

    /// Episode title (used for logging and failure reporting)
    pub title: String,

    /// URL of the media to download
    pub source_url: String,

    /// Final destination path for the downloaded file
    pub destination: PathBuf,
}

/// Event posted by a worker to the coordinator's progress queue
///
/// Each task posts any number of `Downloading` events followed by exactly
/// one terminal event (`Finished`, `Failed`, or `Cancelled`). Events from a
/// single task arrive in posting order; events from different tasks may
/// interleave arbitrarily.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Byte-level progress update
    Downloading {
        /// Task this event belongs to
        task_id: TaskId,
        /// Bytes written so far (monotonically non-decreasing per task)
        bytes_done: u64,
        /// Total size in bytes, when the server declared one
        bytes_total: Option<u64>,
        /// Current speed in bytes per second, when measurable
        speed_bps: Option<u64>,
    },

    /// Terminal: the download completed successfully (or was skipped as
    /// already present on disk)
    Finished {
        /// Task this event belongs to
        task_id: TaskId,
    },

    /// Terminal: the download failed
    Failed {
        /// Task this event belongs to
        task_id: TaskId,
        /// Error message
        error: String,
    },

    /// Terminal: the download was cancelled
    Cancelled {
        /// Task this event belongs to
        task_id: TaskId,
    },
}

impl ProgressEvent {
    /// The task this event belongs to
    pub fn task_id(&self) -> TaskId {
        match self {
            ProgressEvent::Downloading { task_id, .. }
            | ProgressEvent::Finished { task_id }
            | ProgressEvent::Failed { task_id, .. }
            | ProgressEvent::Cancelled { task_id } => *task_id,
        }
    }

    /// Whether this event finally resolves its task
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressEvent::Downloading { .. })
    }
}

/// How a single task ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOutcome {
    /// Downloaded successfully (or skipped as already present)
    Succeeded,
    /// Fetch failed
    Failed,
    /// Cancelled before completing
    Cancelled,
}

/// Per-task progress row inside [`AggregateProgress`]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskProgress {
    /// Progress percentage (0.0 to 100.0, never decreases)
    pub percent: f32,

    /// Bytes downloaded so far
    pub bytes_done: u64,

    /// Current download speed in bytes per second
    pub speed_bps: u64,

    /// Set once the task's terminal event has been applied
    pub outcome: Option<TaskOutcome>,

    /// Error message, for failed tasks
    pub error: Option<String>,
}

impl TaskProgress {
    /// Whether a terminal event has been applied for this task
    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }
}

/// State machine for one download batch
///
/// `Idle → Running → {Finished, Cancelling → Finished}`. `Idle` is the
/// initial state; `Finished` is terminal until a new batch resets the
/// coordinator back through `Running`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchState {
    /// No batch has been started (or the last one was consumed)
    #[default]
    Idle,
    /// A batch is in flight
    Running,
    /// Cancellation was requested; waiting for workers to wind down
    Cancelling,
    /// The batch finished (successfully, partially, or cancelled)
    Finished,
}

/// Aggregated progress across all tasks of one batch
///
/// Mutated only by the coordinator's drain loop (single-writer); everyone
/// else sees snapshots through the coordinator's `watch` channel.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateProgress {
    /// Per-task progress, keyed by task id; tasks that have not yet posted
    /// any event are absent and implicitly contribute 0 percent
    pub per_task: HashMap<TaskId, TaskProgress>,

    /// Number of tasks that have reached a terminal event (only increases)
    pub completed_count: usize,

    /// Total number of tasks in the batch (fixed for the batch lifetime)
    pub total_count: usize,

    /// Whether any task has failed so far
    pub has_errors: bool,

    /// Current batch state
    pub state: BatchState,
}

impl AggregateProgress {
    /// Create the zeroed aggregate for a new batch of `total_count` tasks
    pub fn new_batch(total_count: usize) -> Self {
        Self {
            per_task: HashMap::new(),
            completed_count: 0,
            total_count,
            has_errors: false,
            state: BatchState::Running,
        }
    }

    /// Overall progress as the arithmetic mean of per-task percentages
    ///
    /// Tasks that have not started yet contribute 0. Averaging percentages
    /// rather than bytes gives a stable, monotonically non-decreasing
    /// indicator without knowing every file's total size upfront.
    pub fn overall_percent(&self) -> f32 {
        if self.total_count == 0 {
            return 0.0;
        }
        let sum: f32 = self.per_task.values().map(|t| t.percent).sum();
        (sum / self.total_count as f32).clamp(0.0, 100.0)
    }

    /// Number of tasks that ended in failure
    pub fn failed_count(&self) -> usize {
        self.per_task
            .values()
            .filter(|t| t.outcome == Some(TaskOutcome::Failed))
            .count()
    }

    /// Number of tasks that were cancelled
    pub fn cancelled_count(&self) -> usize {
        self.per_task
            .values()
            .filter(|t| t.outcome == Some(TaskOutcome::Cancelled))
            .count()
    }

    /// Total current speed across all in-flight tasks, bytes per second
    pub fn total_speed_bps(&self) -> u64 {
        self.per_task
            .values()
            .filter(|t| !t.is_terminal())
            .map(|t| t.speed_bps)
            .sum()
    }

    /// Human-readable one-line status for a UI status bar
    pub fn status_line(&self) -> String {
        match self.state {
            BatchState::Idle => "idle".to_string(),
            BatchState::Running => format!(
                "downloading {} of {} ({:.0}%)",
                self.completed_count,
                self.total_count,
                self.overall_percent()
            ),
            BatchState::Cancelling => "cancelling...".to_string(),
            BatchState::Finished => {
                if self.cancelled_count() > 0 {
                    format!("cancelled ({} of {} completed)", self.completed_count - self.cancelled_count(), self.total_count)
                } else if self.has_errors {
                    format!("finished with {} failed of {}", self.failed_count(), self.total_count)
                } else {
                    format!("finished ({} downloaded)", self.total_count)
                }
            }
        }
    }

    /// Build the end-of-batch summary from the final aggregate state
    pub fn summary(&self) -> BatchSummary {
        let failed = self.failed_count();
        let cancelled = self.cancelled_count();
        let succeeded = self
            .per_task
            .values()
            .filter(|t| t.outcome == Some(TaskOutcome::Succeeded))
            .count();

        let outcome = if cancelled > 0 {
            BatchOutcome::Cancelled
        } else if failed > 0 {
            BatchOutcome::PartiallyFailed { failed }
        } else {
            BatchOutcome::Completed
        };

        BatchSummary {
            total: self.total_count,
            succeeded,
            failed,
            cancelled,
            outcome,
        }
    }
}

/// How a batch as a whole ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Every task succeeded
    Completed,
    /// Some tasks failed; the rest completed
    PartiallyFailed {
        /// Number of failed tasks
        failed: usize,
    },
    /// The batch was cancelled before all tasks completed
    Cancelled,
}

/// Final accounting for one batch, delivered when it reaches `Finished`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Total number of tasks in the batch
    pub total: usize,
    /// Tasks that downloaded successfully (including skipped-as-present)
    pub succeeded: usize,
    /// Tasks that failed
    pub failed: usize,
    /// Tasks that were cancelled
    pub cancelled: usize,
    /// Overall batch outcome
    pub outcome: BatchOutcome,
}

/// Batch lifecycle event broadcast to subscribers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    /// A batch was started
    Started {
        /// Number of tasks in the batch
        total: usize,
    },
    /// A batch reached its terminal state
    Finished {
        /// Final accounting for the batch
        summary: BatchSummary,
    },
}
