//! Episode selection tracking
//!
//! Tracks a boolean "selected" flag per listed episode and turns the
//! current selection into the task list for one download batch. Purely
//! single-threaded, driven by the UI between batches.

use crate::types::{DownloadTask, EpisodeDescriptor, TaskId};
use crate::utils::sanitize_filename;
use std::path::Path;

#[derive(Clone, Debug)]
struct Entry {
    episode: EpisodeDescriptor,
    selected: bool,
}

/// Selection state over the most recent listing
#[derive(Clone, Debug, Default)]
pub struct SelectionModel {
    entries: Vec<Entry>,
}

impl SelectionModel {
    /// Create an empty selection model
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the listing; all selection flags reset to unselected
    pub fn set_episodes(&mut self, episodes: Vec<EpisodeDescriptor>) {
        self.entries = episodes
            .into_iter()
            .map(|episode| Entry {
                episode,
                selected: false,
            })
            .collect();
    }

    /// Number of listed episodes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the listing is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The episode at `index`, if in range
    pub fn episode(&self, index: usize) -> Option<&EpisodeDescriptor> {
        self.entries.get(index).map(|e| &e.episode)
    }

    /// Whether the episode at `index` is selected
    pub fn is_selected(&self, index: usize) -> bool {
        self.entries.get(index).map(|e| e.selected).unwrap_or(false)
    }

    /// Select every listed episode
    pub fn select_all(&mut self) {
        for entry in &mut self.entries {
            entry.selected = true;
        }
    }

    /// Deselect every listed episode
    pub fn deselect_all(&mut self) {
        for entry in &mut self.entries {
            entry.selected = false;
        }
    }

    /// Flip the selection flag at `index`; returns the new state, or None
    /// if the index is out of range
    pub fn toggle(&mut self, index: usize) -> Option<bool> {
        let entry = self.entries.get_mut(index)?;
        entry.selected = !entry.selected;
        Some(entry.selected)
    }

    /// Set the selection flag at `index` explicitly
    pub fn set_selected(&mut self, index: usize, selected: bool) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.selected = selected;
        }
    }

    /// Number of currently selected episodes
    pub fn selected_count(&self) -> usize {
        self.entries.iter().filter(|e| e.selected).count()
    }

    /// The selected episodes, in listing order
    pub fn selected_items(&self) -> Vec<EpisodeDescriptor> {
        self.entries
            .iter()
            .filter(|e| e.selected)
            .map(|e| e.episode.clone())
            .collect()
    }

    /// Build the download task list for the current selection
    ///
    /// Task ids are assigned sequentially in listing order; destination
    /// filenames come from the sanitized episode title with the extension
    /// taken from the media URL (falling back to `mp3`).
    pub fn build_tasks(&self, download_dir: &Path) -> Vec<DownloadTask> {
        self.entries
            .iter()
            .filter(|e| e.selected)
            .enumerate()
            .map(|(i, entry)| {
                let task_id = TaskId::new(i as u64);
                let extension = media_extension(&entry.episode.source_url);
                let stem = sanitize_filename(&entry.episode.title);
                let filename = if stem.is_empty() {
                    format!("episode-{task_id}.{extension}")
                } else {
                    format!("{stem}.{extension}")
                };
                DownloadTask {
                    task_id,
                    title: entry.episode.title.clone(),
                    source_url: entry.episode.source_url.clone(),
                    destination: download_dir.join(filename),
                }
            })
            .collect()
    }
}

/// File extension derived from a media URL's path, defaulting to mp3
fn media_extension(source_url: &str) -> String {
    url::Url::parse(source_url)
        .ok()
        .and_then(|u| {
            Path::new(u.path())
                .extension()
                .map(|e| e.to_string_lossy().to_string())
        })
        .filter(|ext| !ext.is_empty() && ext.len() <= 4 && ext.chars().all(char::is_alphanumeric))
        .unwrap_or_else(|| "mp3".to_string())
}
