//! `PublishingList` / `LostList` (spec.md §4.13): process-wide sets of
//! publish URLs, shared the same shape `original_source/video_stream.cpp`
//! uses for both — one set for "currently publishing locally", the other
//! for "lost, awaiting retry".

use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct UrlSet {
    urls: Mutex<HashSet<String>>,
}

impl UrlSet {
    pub fn new() -> Self {
        UrlSet::default()
    }

    pub fn add(&self, url: impl Into<String>) {
        let url = url.into();
        log::info!("adding url: {url}");
        self.urls.lock().expect("url set mutex poisoned").insert(url);
    }

    pub fn remove(&self, url: &str) {
        let removed = self.urls.lock().expect("url set mutex poisoned").remove(url);
        if !removed {
            log::debug!("url [{url}] not found, nothing removed");
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.lock().expect("url set mutex poisoned").contains(url)
    }

    pub fn is_empty(&self) -> bool {
        self.urls.lock().expect("url set mutex poisoned").is_empty()
    }

    /// Pops an arbitrary member, used by the retry loop to fetch one lost
    /// URL at a time (spec.md §4.13's retry loop).
    pub fn pop_any(&self) -> Option<String> {
        let mut urls = self.urls.lock().expect("url set mutex poisoned");
        let url = urls.iter().next().cloned()?;
        urls.remove(&url);
        Some(url)
    }
}

pub type PublishingList = UrlSet;
pub type LostList = UrlSet;
