//! Error types for stream-harvester
//!
//! The taxonomy separates three failure domains:
//! - [`ListingError`]: listing a source failed; surfaced to the caller
//!   before any batch starts
//! - [`FetchError`]: one task's download failed; isolated per-task and
//!   aggregated into the batch summary, never aborts the batch
//! - [`BatchError`]: a coordinator operation was invalid (empty batch,
//!   wrong state)

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for stream-harvester operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for stream-harvester
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download_dir")
        key: Option<String>,
    },

    /// Episode listing failed
    #[error("listing error: {0}")]
    Listing(#[from] ListingError),

    /// A fetch operation failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// A batch operation was invalid
    #[error("batch error: {0}")]
    Batch(#[from] BatchError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors raised while listing episodes from a source URL
///
/// Listing errors abort the listing operation entirely and are reported
/// immediately; no batch is started.
#[derive(Debug, Error)]
pub enum ListingError {
    /// No registered provider recognizes the source URL
    #[error("no provider supports source URL: {0}")]
    UnsupportedSource(String),

    /// Network failure while fetching listing data
    #[error("network error while listing: {0}")]
    Network(#[from] reqwest::Error),

    /// The listing endpoint returned a non-success HTTP status
    #[error("listing request returned HTTP {status} for {url}")]
    HttpStatus {
        /// HTTP status code returned by the server
        status: u16,
        /// The URL that was requested
        url: String,
    },

    /// Expected structured data was absent or malformed
    #[error("failed to parse listing data: {0}")]
    Parse(String),
}

/// Errors raised by a single task's fetch operation
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network failure during the download
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server returned a non-success HTTP status
    #[error("server returned HTTP {status} for {url}")]
    HttpStatus {
        /// HTTP status code returned by the server
        status: u16,
        /// The URL that was requested
        url: String,
    },

    /// Failed to write the downloaded bytes to disk
    #[error("I/O error writing {path}: {source}")]
    Io {
        /// The path being written when the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The download was cancelled before completing
    ///
    /// Not a failure: workers map this to a `Cancelled` terminal event
    /// rather than a `Failed` one.
    #[error("download cancelled")]
    Cancelled,
}

/// Errors raised by coordinator batch operations
#[derive(Debug, Error)]
pub enum BatchError {
    /// `start_batch` was called with no tasks
    #[error("cannot start a batch with no tasks")]
    EmptyBatch,

    /// The operation is not valid in the current batch state
    #[error("cannot {operation} in state {current_state}")]
    InvalidState {
        /// The operation that was attempted (e.g., "start_batch", "cancel_batch")
        operation: String,
        /// The batch state that prevents the operation
        current_state: String,
    },
}
