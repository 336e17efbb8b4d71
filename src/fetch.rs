//! Fetch operation contract and HTTP implementation
//!
//! A [`MediaFetcher`] downloads one URL to one destination path, reporting
//! byte-level progress through a [`ProgressSink`] and honoring a
//! cancellation token at every progress checkpoint. [`HttpFetcher`] is the
//! plain-HTTP implementation; anything smarter (DRM, segmented streams)
//! plugs in behind the same trait.

use crate::config::{NetworkConfig, RetryConfig};
use crate::cookies::{CookieProvider, NoCookies};
use crate::error::{Error, FetchError, Result};
use crate::retry::fetch_with_retry;
use crate::types::{ProgressEvent, TaskId};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Progress reporting handle given to a fetcher for one task
///
/// Each call posts a `Downloading` event onto the coordinator's progress
/// queue. `bytes_done` must be monotonically non-decreasing across calls
/// for the same task; speed is derived from wall-clock time since the
/// fetch began.
pub struct ProgressSink {
    task_id: TaskId,
    tx: mpsc::UnboundedSender<ProgressEvent>,
    started: Instant,
}

impl ProgressSink {
    pub(crate) fn new(task_id: TaskId, tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self {
            task_id,
            tx,
            started: Instant::now(),
        }
    }

    /// The task this sink reports for
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Report bytes downloaded so far, with the total when known
    pub fn report(&self, bytes_done: u64, bytes_total: Option<u64>) {
        let elapsed = self.started.elapsed().as_secs_f64();
        let speed_bps = if elapsed > 0.0 {
            Some((bytes_done as f64 / elapsed) as u64)
        } else {
            None
        };

        // send() only fails when the coordinator dropped the receiver
        // (batch torn down) - the event is irrelevant then
        self.tx
            .send(ProgressEvent::Downloading {
                task_id: self.task_id,
                bytes_done,
                bytes_total,
                speed_bps,
            })
            .ok();
    }
}

/// Downloads one URL to one destination path
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetch `url` into `destination`
    ///
    /// Implementations must report monotonically non-decreasing
    /// `bytes_done` through `progress` and must check `cancel` at every
    /// progress checkpoint, returning [`FetchError::Cancelled`] promptly
    /// once it fires. On success the destination file exists with the
    /// complete content; on any error no file may be left at the
    /// destination path.
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), FetchError>;
}

/// Plain HTTP fetcher with streaming writes, retries, and cookie support
pub struct HttpFetcher {
    http: reqwest::Client,
    cookies: Arc<dyn CookieProvider>,
    retry: RetryConfig,
}

impl HttpFetcher {
    /// Create a fetcher from network configuration
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Other(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            cookies: Arc::new(NoCookies),
            retry: config.retry.clone(),
        })
    }

    /// Use a cookie provider for authenticated sources
    pub fn with_cookie_provider(mut self, provider: Arc<dyn CookieProvider>) -> Self {
        self.cookies = provider;
        self
    }

    /// Send the GET request and validate the status, with retries.
    ///
    /// Only this phase is retried: once the body is streaming, a restart
    /// would reset `bytes_done` and break per-task monotonicity.
    async fn send_request(&self, url: &str) -> std::result::Result<reqwest::Response, FetchError> {
        fetch_with_retry(&self.retry, || async {
            let mut request = self.http.get(url);

            if let Ok(parsed) = Url::parse(url) {
                if let Some(header) = self.cookies.cookie_header(&parsed) {
                    request = request.header(reqwest::header::COOKIE, header);
                }
            }

            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::HttpStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }
            Ok(response)
        })
        .await
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let response = self.send_request(url).await?;
        let bytes_total = response.content_length();
        let part_path = part_path_for(destination);

        match stream_to_part(response, &part_path, bytes_total, progress, cancel).await {
            Ok(()) => {
                tokio::fs::rename(&part_path, destination)
                    .await
                    .map_err(|e| FetchError::Io {
                        path: destination.to_path_buf(),
                        source: e,
                    })?;
                tracing::info!(
                    task_id = %progress.task_id(),
                    path = %destination.display(),
                    "download complete"
                );
                Ok(())
            }
            Err(e) => {
                // Best-effort cleanup; never mask the original error
                if let Err(cleanup) = tokio::fs::remove_file(&part_path).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(
                            path = %part_path.display(),
                            error = %cleanup,
                            "failed to remove partial file"
                        );
                    }
                }
                Err(e)
            }
        }
    }
}

/// In-progress downloads live next to their destination with a `.part` suffix
fn part_path_for(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

async fn stream_to_part(
    response: reqwest::Response,
    part_path: &Path,
    bytes_total: Option<u64>,
    progress: &ProgressSink,
    cancel: &CancellationToken,
) -> std::result::Result<(), FetchError> {
    let mut file = tokio::fs::File::create(part_path)
        .await
        .map_err(|e| FetchError::Io {
            path: part_path.to_path_buf(),
            source: e,
        })?;

    let mut stream = response.bytes_stream();
    let mut bytes_done: u64 = 0;
    progress.report(0, bytes_total);

    while let Some(chunk) = stream.next().await {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(|e| FetchError::Io {
            path: part_path.to_path_buf(),
            source: e,
        })?;

        bytes_done += chunk.len() as u64;
        progress.report(bytes_done, bytes_total);
    }

    file.sync_all().await.map_err(|e| FetchError::Io {
        path: part_path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}
