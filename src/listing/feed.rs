//! RSS/Atom feed parsing into episode descriptors
//!
//! Podcast feeds are RSS 2.0 in practice, but some sources publish Atom;
//! parsing tries RSS first and falls back to Atom. Items without an
//! enclosure URL carry nothing to download and are skipped.

use super::EpisodeLister;
use crate::error::ListingError;
use crate::types::EpisodeDescriptor;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Lists episodes from a direct RSS or Atom feed URL
#[derive(Clone)]
pub struct FeedLister {
    http: reqwest::Client,
}

impl FeedLister {
    /// Create a feed lister using the given HTTP client
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn fetch_feed(&self, url: &str) -> Result<String, ListingError> {
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ListingError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl EpisodeLister for FeedLister {
    fn supports(&self, source_url: &str) -> bool {
        source_url.starts_with("http://") || source_url.starts_with("https://")
    }

    async fn list(&self, source_url: &str) -> Result<Vec<EpisodeDescriptor>, ListingError> {
        let content = self.fetch_feed(source_url).await?;
        parse_feed(&content)
    }
}

/// Parse feed content, trying RSS first and falling back to Atom
pub(crate) fn parse_feed(content: &str) -> Result<Vec<EpisodeDescriptor>, ListingError> {
    match parse_as_rss(content) {
        Ok(episodes) => {
            tracing::debug!(count = episodes.len(), "parsed feed as RSS");
            Ok(episodes)
        }
        Err(rss_err) => {
            tracing::debug!(error = %rss_err, "not RSS, trying Atom");
            match parse_as_atom(content) {
                Ok(episodes) => {
                    tracing::debug!(count = episodes.len(), "parsed feed as Atom");
                    Ok(episodes)
                }
                Err(atom_err) => Err(ListingError::Parse(format!(
                    "feed is neither RSS nor Atom. RSS error: {rss_err}. Atom error: {atom_err}"
                ))),
            }
        }
    }
}

fn parse_as_rss(content: &str) -> Result<Vec<EpisodeDescriptor>, String> {
    let channel = content
        .parse::<rss::Channel>()
        .map_err(|e| format!("RSS parse error: {e}"))?;

    Ok(channel
        .items()
        .iter()
        .filter_map(episode_from_rss_item)
        .collect())
}

fn episode_from_rss_item(item: &rss::Item) -> Option<EpisodeDescriptor> {
    // No enclosure means nothing to download
    let source_url = item.enclosure().map(|enc| enc.url().to_string())?;

    // Prefer guid, fall back to the enclosure URL
    let id = item
        .guid()
        .map(|g| g.value().to_string())
        .unwrap_or_else(|| source_url.clone());

    let duration = item
        .itunes_ext()
        .and_then(|ext| ext.duration())
        .and_then(parse_duration_field);

    let published_at = item.pub_date().and_then(parse_publish_date);

    Some(EpisodeDescriptor {
        id,
        title: item.title().unwrap_or("Untitled episode").to_string(),
        source_url,
        duration,
        published_at,
    })
}

fn parse_as_atom(content: &str) -> Result<Vec<EpisodeDescriptor>, String> {
    let feed = atom_syndication::Feed::read_from(content.as_bytes())
        .map_err(|e| format!("Atom parse error: {e}"))?;

    Ok(feed
        .entries()
        .iter()
        .filter_map(episode_from_atom_entry)
        .collect())
}

fn episode_from_atom_entry(entry: &atom_syndication::Entry) -> Option<EpisodeDescriptor> {
    let enclosure = entry.links().iter().find(|link| {
        link.rel() == "enclosure"
            || link
                .mime_type()
                .map(|mime| mime.starts_with("audio/") || mime.starts_with("video/"))
                .unwrap_or(false)
    })?;

    let published_at = entry
        .published()
        .or(Some(entry.updated()))
        .map(|dt| dt.with_timezone(&Utc));

    Some(EpisodeDescriptor {
        id: entry.id().to_string(),
        title: entry.title().as_str().to_string(),
        source_url: enclosure.href().to_string(),
        duration: None,
        published_at,
    })
}

/// Parse an `itunes:duration` value
///
/// Feeds are inconsistent here: plain seconds (`"1863"`, `"1863.5"`),
/// `MM:SS`, and `HH:MM:SS` all occur in the wild.
pub(crate) fn parse_duration_field(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.contains(':') {
        let parts: Option<Vec<u64>> = raw.split(':').map(|p| p.parse().ok()).collect();
        let seconds = match parts?.as_slice() {
            [minutes, seconds] => minutes * 60 + seconds,
            [hours, minutes, seconds] => hours * 3600 + minutes * 60 + seconds,
            _ => return None,
        };
        Some(Duration::from_secs(seconds))
    } else {
        raw.parse::<f64>()
            .ok()
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64)
    }
}

/// Parse a feed publish date, RFC 2822 first (RSS), RFC 3339 as fallback
pub(crate) fn parse_publish_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
