//! Apple Podcasts listing provider
//!
//! An Apple Podcasts page URL does not expose the feed directly; the show
//! id embedded in the URL is resolved through the iTunes lookup API, whose
//! response carries the canonical RSS feed URL. The feed itself is then
//! handled by [`FeedLister`].

use super::EpisodeLister;
use super::feed::FeedLister;
use crate::error::{Error, ListingError, Result};
use crate::types::EpisodeDescriptor;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

const DEFAULT_LOOKUP_BASE: &str = "https://itunes.apple.com";

/// Lists episodes from Apple Podcasts page URLs via the iTunes lookup API
#[derive(Clone)]
pub struct ApplePodcastLister {
    http: reqwest::Client,
    feed: FeedLister,
    show_id: Regex,
    lookup_base: String,
}

/// iTunes lookup API response, reduced to the fields this provider reads
#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    results: Vec<LookupResult>,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    #[serde(rename = "feedUrl")]
    feed_url: Option<String>,
}

impl ApplePodcastLister {
    /// Create an Apple Podcasts lister using the given HTTP client
    pub fn new(http: reqwest::Client) -> Result<Self> {
        let show_id = Regex::new(r"/id(\d+)")
            .map_err(|e| Error::Other(format!("failed to compile show id pattern: {e}")))?;
        Ok(Self {
            feed: FeedLister::new(http.clone()),
            http,
            show_id,
            lookup_base: DEFAULT_LOOKUP_BASE.to_string(),
        })
    }

    /// Override the lookup API base URL (tests, proxies)
    pub fn with_lookup_base(mut self, base: impl Into<String>) -> Self {
        self.lookup_base = base.into();
        self
    }

    fn extract_show_id(&self, source_url: &str) -> Option<String> {
        self.show_id
            .captures(source_url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

#[async_trait]
impl EpisodeLister for ApplePodcastLister {
    fn supports(&self, source_url: &str) -> bool {
        source_url.contains("podcasts.apple.com")
    }

    async fn list(
        &self,
        source_url: &str,
    ) -> std::result::Result<Vec<EpisodeDescriptor>, ListingError> {
        let show_id = self.extract_show_id(source_url).ok_or_else(|| {
            ListingError::Parse(format!("could not extract show id from {source_url}"))
        })?;

        let lookup_url = format!("{}/lookup?id={}&entity=podcast", self.lookup_base, show_id);
        let response = self.http.get(&lookup_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ListingError::HttpStatus {
                status: status.as_u16(),
                url: lookup_url,
            });
        }

        let lookup: LookupResponse = response
            .json()
            .await
            .map_err(|e| ListingError::Parse(format!("invalid lookup response: {e}")))?;

        let feed_url = lookup
            .results
            .into_iter()
            .find_map(|result| result.feed_url)
            .ok_or_else(|| {
                ListingError::Parse(format!("no feed URL in lookup response for show {show_id}"))
            })?;

        tracing::debug!(show_id = %show_id, feed_url = %feed_url, "resolved feed via lookup");
        self.feed.list(&feed_url).await
    }
}
