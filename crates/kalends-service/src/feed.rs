//! Feed pipeline and the public query surface.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::Utc;

use kalends_core::config::{LimitOverrides, Limits};
use kalends_core::types::Event;
use kalends_rfc::ical::core::{EventRecord, OverrideKey};
use kalends_rfc::ical::parse::parse_events;
use kalends_rfc::tz::TzDb;

use crate::cache::{CacheEntry, FeedCache};
use crate::error::ServiceResult;
use crate::fetch::{FeedMetadata, Fetcher, canonicalize_url};
use crate::recurrence::{Window, expand_record};

/// With no validators and no length to compare, cached content older than
/// this is considered stale.
const STALE_FALLBACK_SECONDS: i64 = 900;

const SECONDS_PER_DAY: i64 = 86_400;

/// Owns the three shared stores of the pipeline: the timezone table (with
/// its normalization memo), the per-URL cache, and the tunable limits.
///
/// Single-owner state: callers hold the feed mutably, so no locking is
/// needed. Wrap it in a mutex if several threads must share one instance.
pub struct CalendarFeed {
    tz: TzDb,
    cache: FeedCache,
    limits: Limits,
    fetcher: Fetcher,
}

impl CalendarFeed {
    #[must_use]
    pub fn new(tz: TzDb, limits: Limits) -> Self {
        Self {
            tz,
            cache: FeedCache::new(),
            limits,
            fetcher: Fetcher::new(),
        }
    }

    /// Returns occurrences overlapping the query window, sorted by start
    /// instant, value-deduplicated, and truncated to `max_events`.
    ///
    /// The window starts at `window_start` (defaulting to now) and spans
    /// `window_days`. A cache entry younger than the validity duration is
    /// served without touching the network; otherwise the feed is
    /// conditionally refetched, and on failure the last good entry is
    /// served instead. Only a feed that has never been fetched successfully
    /// yields an empty result on failure.
    #[tracing::instrument(skip(self))]
    pub async fn get_events(
        &mut self,
        url: &str,
        max_events: usize,
        window_start: Option<i64>,
        window_days: u32,
    ) -> Vec<Event> {
        let url = canonicalize_url(url);
        let now = Utc::now().timestamp();
        let start = window_start.unwrap_or(now);
        let window = Window {
            start,
            end: start + i64::from(window_days) * SECONDS_PER_DAY,
        };

        if let Some(entry) = self.cache.get(&url)
            && entry.age(now) < self.limits.cache_validity_seconds
        {
            tracing::debug!(url, age = entry.age(now), "Serving from cache");
            return select(&entry.events, window, max_events);
        }

        match self.refresh(&url, window, now).await {
            Ok(events) => select(&events, window, max_events),
            Err(err) => {
                tracing::warn!(url, error = %err, "Fetch failed, falling back to cache");
                self.cache
                    .get(&url)
                    .map_or_else(Vec::new, |entry| select(&entry.events, window, max_events))
            }
        }
    }

    /// Drops every cached feed.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.tz.clear_memo();
    }

    /// Applies limit overrides to subsequent queries.
    pub fn set_limits(&mut self, overrides: &LimitOverrides) {
        self.limits.apply(overrides);
        tracing::debug!(limits = ?self.limits, "Limits updated");
    }

    #[must_use]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Canonical URLs currently cached.
    #[must_use]
    pub fn cache_info(&self) -> Vec<String> {
        self.cache.urls()
    }

    /// Refetches and reprocesses the feed unless a HEAD check proves the
    /// cached entry is still current.
    async fn refresh(&mut self, url: &str, window: Window, now: i64) -> ServiceResult<Vec<Event>> {
        let timeout = Duration::from_secs(self.limits.http_timeout_seconds);

        if let Some(entry) = self.cache.get(url) {
            let fresh = match self.fetcher.head(url, timeout).await {
                Ok(meta) => is_fresh(&meta, entry, now),
                Err(err) => {
                    tracing::debug!(url, error = %err, "HEAD check failed, refetching");
                    false
                }
            };
            if fresh {
                tracing::debug!(url, "Validators match, reusing cached events");
                return Ok(entry.events.clone());
            }
        }

        let Some(feed) = self.fetcher.fetch(url, timeout).await? else {
            // 304: nothing newer than what we already hold.
            return Ok(self
                .cache
                .get(url)
                .map_or_else(Vec::new, |entry| entry.events.clone()));
        };

        let records = parse_events(&feed.body, &mut self.tz, &self.limits);
        let events = self.assemble(records, window);
        tracing::info!(
            url,
            events = events.len(),
            bytes = feed.content_length,
            fingerprint = feed.fingerprint,
            "Feed reprocessed"
        );

        self.cache.replace(
            url.to_string(),
            CacheEntry {
                events: events.clone(),
                last_modified: feed.last_modified,
                etag: feed.etag,
                fetched_at: now,
                content_length: feed.content_length,
                fingerprint: feed.fingerprint,
            },
        );

        Ok(events)
    }

    /// Expands every series, substitutes overrides in place of their
    /// matching occurrences, and sorts by start instant.
    fn assemble(&self, records: Vec<EventRecord>, window: Window) -> Vec<Event> {
        let mut overrides: HashMap<OverrideKey, EventRecord> = HashMap::new();
        let mut regular = Vec::new();
        for record in records {
            if let Some(key) = record.override_key() {
                overrides.insert(key, record);
            } else {
                regular.push(record);
            }
        }

        let mut events = Vec::new();
        for record in &regular {
            let mut occurrences = Vec::new();
            expand_record(record, window, &self.tz, &self.limits, &mut occurrences);

            for occurrence in occurrences {
                let key = (occurrence.dtstart, occurrence.tzid.clone());
                if let Some(replacement) = overrides.get(&key) {
                    events.push(materialize_override(replacement));
                } else {
                    events.push(occurrence);
                }
            }
        }

        events.sort_by_key(|event| event.dtstart);
        events
    }
}

fn materialize_override(record: &EventRecord) -> Event {
    Event {
        dtstart: record.dtstart,
        dtend: record.dtend,
        summary: record.summary.clone(),
        description: record.description.clone(),
        tzid: record.tzid.clone(),
    }
}

/// Validator comparison: differing same-kind validators mean stale, a
/// matching validator of either kind means fresh, then content length,
/// then a fixed wall-clock window.
fn is_fresh(meta: &FeedMetadata, entry: &CacheEntry, now: i64) -> bool {
    if let (Some(remote), Some(cached)) = (&meta.last_modified, &entry.last_modified)
        && remote != cached
    {
        return false;
    }
    if let (Some(remote), Some(cached)) = (&meta.etag, &entry.etag)
        && remote != cached
    {
        return false;
    }

    let compared_last_modified = meta.last_modified.is_some() && entry.last_modified.is_some();
    let compared_etag = meta.etag.is_some() && entry.etag.is_some();
    if compared_last_modified || compared_etag {
        return true;
    }

    if let Some(remote_length) = meta.content_length {
        return remote_length == entry.content_length;
    }

    entry.age(now) <= STALE_FALLBACK_SECONDS
}

/// Window-filters, sorts, value-deduplicates, and truncates a result set.
fn select(events: &[Event], window: Window, max_events: usize) -> Vec<Event> {
    let mut matching: Vec<&Event> = events
        .iter()
        .filter(|event| window.overlaps(event.dtstart, event.dtend))
        .collect();
    matching.sort_by_key(|event| event.dtstart);

    let mut seen: HashSet<u64> = HashSet::new();
    let mut picked: Vec<Event> = Vec::new();
    for event in matching {
        if seen.insert(event.fingerprint()) {
            picked.push(event.clone());
        }
    }
    picked.truncate(max_events);
    picked
}
