//! Episode listing providers
//!
//! A source URL (an Apple Podcasts page, a direct feed URL) is resolved to
//! an ordered sequence of [`EpisodeDescriptor`]s by whichever registered
//! provider recognizes it. Listing failures abort the whole operation and
//! are surfaced before any download batch starts.

mod apple;
mod feed;

pub use apple::ApplePodcastLister;
pub use feed::FeedLister;

use crate::error::{Error, ListingError, Result};
use crate::types::EpisodeDescriptor;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A provider that can turn a source URL into a list of episodes
#[async_trait]
pub trait EpisodeLister: Send + Sync {
    /// Whether this provider recognizes the source URL
    fn supports(&self, source_url: &str) -> bool;

    /// List the episodes available at the source URL, in feed order
    async fn list(&self, source_url: &str)
    -> std::result::Result<Vec<EpisodeDescriptor>, ListingError>;
}

/// Ordered collection of listing providers
///
/// Providers are consulted in registration order; the first whose
/// [`supports`](EpisodeLister::supports) returns true handles the URL.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn EpisodeLister>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in providers (Apple Podcasts pages,
    /// direct RSS/Atom feed URLs) sharing one HTTP client
    pub fn with_default_providers() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("stream-harvester feed reader")
            .build()
            .map_err(|e| Error::Other(format!("failed to create HTTP client: {e}")))?;
        Self::with_client(http)
    }

    /// Create a registry with the built-in providers using the given client
    pub fn with_client(http: reqwest::Client) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(ApplePodcastLister::new(http.clone())?));
        registry.register(Arc::new(FeedLister::new(http)));
        Ok(registry)
    }

    /// Append a provider; earlier registrations take precedence
    pub fn register(&mut self, provider: Arc<dyn EpisodeLister>) {
        self.providers.push(provider);
    }

    /// List episodes for a source URL through the first matching provider
    ///
    /// Returns [`ListingError::UnsupportedSource`] if no registered
    /// provider recognizes the URL.
    pub async fn list(
        &self,
        source_url: &str,
    ) -> std::result::Result<Vec<EpisodeDescriptor>, ListingError> {
        let provider = self
            .providers
            .iter()
            .find(|p| p.supports(source_url))
            .ok_or_else(|| ListingError::UnsupportedSource(source_url.to_string()))?;

        tracing::info!(source_url, "listing episodes");
        let episodes = provider.list(source_url).await?;
        tracing::info!(source_url, count = episodes.len(), "listing complete");
        Ok(episodes)
    }
}
