//! # stream-harvester
//!
//! Library core for a media download application: list podcast episodes,
//! select a subset, and download them concurrently with live, aggregated
//! progress.
//!
//! ## Design Philosophy
//!
//! stream-harvester is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Single-writer** - All progress state is mutated by one drain loop;
//!   workers only ever write to an event channel
//! - **Failure-tolerant** - One failed download never aborts a batch
//! - **Cooperative** - Cancellation is observed at progress checkpoints,
//!   never forced
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use stream_harvester::{
//!     Config, DownloadCoordinator, HttpFetcher, ProviderRegistry, SelectionModel,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!
//!     // List episodes from a source URL
//!     let registry = ProviderRegistry::with_default_providers()?;
//!     let episodes = registry
//!         .list("https://podcasts.apple.com/us/podcast/some-show/id123456789")
//!         .await?;
//!
//!     // Select what to download
//!     let mut selection = SelectionModel::new();
//!     selection.set_episodes(episodes);
//!     selection.select_all();
//!     let tasks = selection.build_tasks(&config.download.download_dir);
//!
//!     // Run the batch and watch progress
//!     let fetcher = Arc::new(HttpFetcher::new(&config.network)?);
//!     let coordinator = DownloadCoordinator::new(config, fetcher);
//!     let mut progress = coordinator.progress();
//!
//!     let handle = coordinator.start_batch(tasks).await?;
//!     tokio::spawn(async move {
//!         while progress.changed().await.is_ok() {
//!             println!("{}", progress.borrow().status_line());
//!         }
//!     });
//!
//!     let summary = handle.wait().await?;
//!     println!("done: {:?}", summary.outcome);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Cookie provider seam for authenticated fetches
pub mod cookies;
/// Core download coordinator (decomposed into focused submodules)
pub mod coordinator;
/// Error types
pub mod error;
/// Fetch operation contract and HTTP implementation
pub mod fetch;
/// Episode listing providers
pub mod listing;
/// Retry logic with exponential backoff
pub mod retry;
/// Episode selection tracking
pub mod selection;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, DownloadConfig, NetworkConfig, RetryConfig};
pub use cookies::{CookieProvider, NoCookies, StaticCookies};
pub use coordinator::{BatchHandle, DownloadCoordinator};
pub use error::{BatchError, Error, FetchError, ListingError, Result};
pub use fetch::{HttpFetcher, MediaFetcher, ProgressSink};
pub use listing::{ApplePodcastLister, EpisodeLister, FeedLister, ProviderRegistry};
pub use selection::SelectionModel;
pub use types::{
    AggregateProgress, BatchEvent, BatchOutcome, BatchState, BatchSummary, DownloadTask,
    EpisodeDescriptor, ProgressEvent, TaskId, TaskOutcome, TaskProgress,
};
