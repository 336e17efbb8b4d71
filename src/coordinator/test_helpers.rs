//! Shared fixtures for coordinator tests.

use crate::config::Config;
use crate::coordinator::DownloadCoordinator;
use crate::error::FetchError;
use crate::fetch::{MediaFetcher, ProgressSink};
use crate::types::{DownloadTask, TaskId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What a scripted fetch should do for one URL
#[derive(Clone, Debug)]
pub(crate) enum FetchScript {
    /// Report `chunks` progress events of `chunk_bytes` each, pausing
    /// `delay` between them, then write the destination file and succeed
    Succeed {
        chunk_bytes: u64,
        chunks: u32,
        delay: Duration,
    },
    /// Fail immediately with an HTTP 502
    Fail,
    /// Run until the cancellation token fires, then report cancelled
    BlockUntilCancelled,
}

/// In-memory fetcher driven by per-URL scripts; tracks call counts and
/// peak concurrency so tests can assert on pool behavior
pub(crate) struct ScriptedFetcher {
    default: FetchScript,
    scripts: std::sync::Mutex<HashMap<String, FetchScript>>,
    calls: std::sync::Mutex<Vec<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedFetcher {
    pub(crate) fn new(default: FetchScript) -> Self {
        Self {
            default,
            scripts: std::sync::Mutex::new(HashMap::new()),
            calls: std::sync::Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_script(self, url: impl Into<String>, script: FetchScript) -> Self {
        self.scripts.lock().unwrap().insert(url.into(), script);
        self
    }

    pub(crate) fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn peak_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<(), FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let current = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(current, Ordering::SeqCst);

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| self.default.clone());

        let result = run_script(script, destination, progress, cancel).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

async fn run_script(
    script: FetchScript,
    destination: &Path,
    progress: &ProgressSink,
    cancel: &CancellationToken,
) -> Result<(), FetchError> {
    match script {
        FetchScript::Succeed {
            chunk_bytes,
            chunks,
            delay,
        } => {
            let total = chunk_bytes * chunks as u64;
            let mut done = 0;
            for _ in 0..chunks {
                if cancel.is_cancelled() {
                    return Err(FetchError::Cancelled);
                }
                done += chunk_bytes;
                progress.report(done, Some(total));
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            tokio::fs::write(destination, b"scripted media")
                .await
                .map_err(|e| FetchError::Io {
                    path: destination.to_path_buf(),
                    source: e,
                })?;
            Ok(())
        }
        FetchScript::Fail => Err(FetchError::HttpStatus {
            status: 502,
            url: "scripted".to_string(),
        }),
        FetchScript::BlockUntilCancelled => {
            cancel.cancelled().await;
            Err(FetchError::Cancelled)
        }
    }
}

/// `n` tasks with predictable urls (`https://example.com/ep{i}.mp3`) and
/// destinations inside `dir`
pub(crate) fn make_tasks(dir: &Path, n: usize) -> Vec<DownloadTask> {
    (0..n)
        .map(|i| DownloadTask {
            task_id: TaskId::new(i as u64),
            title: format!("Episode {i}"),
            source_url: format!("https://example.com/ep{i}.mp3"),
            destination: dir.join(format!("ep{i}.mp3")),
        })
        .collect()
}

/// A coordinator with a fast drain tick, suitable for tests
pub(crate) fn test_coordinator(fetcher: Arc<dyn MediaFetcher>) -> DownloadCoordinator {
    let mut config = Config::default();
    config.download.progress_interval = Duration::from_millis(10);
    DownloadCoordinator::new(config, fetcher)
}
