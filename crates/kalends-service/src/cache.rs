//! Per-URL cache of materialized event lists with their fetch validators.

use std::collections::HashMap;

use kalends_core::types::Event;

/// Cached pipeline output for one canonical URL.
///
/// Replaced wholesale on refetch, never merged incrementally.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Deduplicated, sorted occurrence list from the last processing run.
    pub events: Vec<Event>,
    /// `Last-Modified` validator observed at fetch time.
    pub last_modified: Option<String>,
    /// `ETag` validator observed at fetch time.
    pub etag: Option<String>,
    /// Local instant the payload was fetched.
    pub fetched_at: i64,
    /// Payload size in bytes.
    pub content_length: u64,
    /// Short content fingerprint of the payload.
    pub fingerprint: String,
}

impl CacheEntry {
    /// Seconds since this entry was fetched.
    #[must_use]
    pub fn age(&self, now: i64) -> i64 {
        now - self.fetched_at
    }
}

/// Map of canonical URL to cache entry; at most one entry per URL.
#[derive(Debug, Default)]
pub struct FeedCache {
    entries: HashMap<String, CacheEntry>,
}

impl FeedCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, url: &str) -> Option<&CacheEntry> {
        self.entries.get(url)
    }

    /// Replaces the entry for `url` wholesale.
    pub fn replace(&mut self, url: String, entry: CacheEntry) {
        self.entries.insert(url, entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Canonical URLs currently cached.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
