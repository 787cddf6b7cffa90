//! Timezone database: table loading, offset resolution, and identifier
//! normalization.

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use super::record::{DstRule, TimezoneRecord};

/// Longest zone identifier accepted from the binary table; a longer length
/// byte marks a corrupt tail.
const MAX_NAME_LEN: usize = 100;

/// Entries between wall-clock checks while loading.
const TIMEOUT_CHECK_INTERVAL: usize = 50;

/// In-memory timezone table plus the identifier-normalization memo.
///
/// Owned state: build one and inject it wherever conversions are needed.
/// Conversions take `&self`; only [`TzDb::normalize`] mutates (the memo).
#[derive(Debug, Default)]
pub struct TzDb {
    table: HashMap<String, TimezoneRecord>,
    memo: HashMap<String, String>,
}

impl TzDb {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table directly from records, bypassing the binary format.
    #[must_use]
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (String, TimezoneRecord)>,
    {
        Self {
            table: records.into_iter().collect(),
            memo: HashMap::new(),
        }
    }

    /// Loads the binary table at `path`.
    ///
    /// Never fails: an unreadable file yields an empty table, a corrupt tail
    /// truncates the scan, and exceeding `timeout` yields whatever prefix
    /// parsed so far.
    #[must_use]
    pub fn load_from_path(path: &Path, timeout: Duration) -> Self {
        let mut db = Self::new();
        match std::fs::read(path) {
            Ok(bytes) => db.load_bytes(&bytes, timeout),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Timezone table unreadable");
            }
        }
        db
    }

    fn load_bytes(&mut self, bytes: &[u8], timeout: Duration) {
        let started = Instant::now();
        let mut pos = 0;
        let mut count = 0usize;

        while pos < bytes.len() {
            if count % TIMEOUT_CHECK_INTERVAL == 0 && started.elapsed() > timeout {
                tracing::warn!(loaded = self.table.len(), "Timezone load timeout, using partial table");
                break;
            }

            let name_len = usize::from(bytes[pos]);
            if name_len == 0 || name_len > MAX_NAME_LEN {
                // Corrupt tail, keep what parsed so far.
                break;
            }
            let Some(chunk) = bytes.get(pos + 1..pos + 1 + name_len + TimezoneRecord::ENCODED_LEN)
            else {
                break;
            };
            pos += 1 + name_len + TimezoneRecord::ENCODED_LEN;
            count += 1;

            let (name_bytes, data) = chunk.split_at(name_len);
            let Ok(name) = std::str::from_utf8(name_bytes) else {
                continue;
            };
            let Some(record) = TimezoneRecord::decode(data) else {
                continue;
            };
            self.table.insert(name.to_string(), record);
        }

        tracing::info!(zones = self.table.len(), "Timezone table loaded");
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    #[must_use]
    pub fn get(&self, zone: &str) -> Option<&TimezoneRecord> {
        self.table.get(zone)
    }

    /// UTC offset of `zone` at `instant`, in seconds.
    ///
    /// Unknown zones and internal calendar failures yield 0. Zones without
    /// DST rules always yield the standard offset; otherwise the current
    /// year's transition instants are derived from the stored civil anchors
    /// and the half-open window between them selects the DST offset, with
    /// the window allowed to wrap the calendar year boundary.
    #[must_use]
    pub fn utc_offset(&self, zone: &str, instant: i64) -> i32 {
        let Some(record) = self.table.get(zone) else {
            return 0;
        };
        let (Some(start_rule), Some(end_rule)) = (record.dst_start, record.dst_end) else {
            return record.std_offset;
        };

        let std_offset = i64::from(record.std_offset);
        let Some(year) = DateTime::from_timestamp(instant + std_offset, 0).map(|dt| dt.year())
        else {
            return 0;
        };
        let Some(dst_start) = transition_instant(year, start_rule, std_offset) else {
            return 0;
        };
        let Some(dst_end) = transition_instant(year, end_rule, std_offset) else {
            return 0;
        };

        let in_dst = if dst_start < dst_end {
            (dst_start..dst_end).contains(&instant)
        } else {
            // DST window wraps the year boundary (southern hemisphere).
            instant >= dst_start || instant < dst_end
        };

        if in_dst {
            record.dst_offset
        } else {
            record.std_offset
        }
    }

    /// Converts a local civil time in `zone` to a UTC instant.
    ///
    /// The offset is resolved at the naive epoch value of the local stamp,
    /// so conversions within an hour of a DST transition may land on the
    /// old side of the boundary.
    #[must_use]
    pub fn to_utc(&self, civil: NaiveDateTime, zone: &str) -> i64 {
        let local_ts = civil.and_utc().timestamp();
        local_ts - i64::from(self.utc_offset(zone, local_ts))
    }

    /// Converts a UTC instant to local civil time in `zone`.
    ///
    /// Weekday and day-of-year are available through the returned value's
    /// `Datelike` methods.
    #[must_use]
    pub fn to_local(&self, instant: i64, zone: &str) -> NaiveDateTime {
        let shifted = instant + i64::from(self.utc_offset(zone, instant));
        DateTime::from_timestamp(shifted, 0)
            .or_else(|| DateTime::from_timestamp(instant, 0))
            .unwrap_or_default()
            .naive_utc()
    }

    /// Normalizes a raw zone identifier against the loaded table.
    ///
    /// Strips surrounding whitespace and slashes plus stray quote and
    /// backslash characters, then tries exact, case-insensitive, and
    /// `.../City` suffix matches. Unmatched input is returned cleaned but
    /// otherwise unchanged. Results are memoized under the original raw
    /// string.
    #[must_use]
    pub fn normalize(&mut self, raw: &str) -> String {
        if raw.is_empty() {
            return "UTC".to_string();
        }
        if let Some(hit) = self.memo.get(raw) {
            return hit.clone();
        }

        let mut cleaned = raw.trim().trim_matches('/').to_string();
        if cleaned.contains(['\\', '"']) {
            cleaned.retain(|c| c != '\\' && c != '"');
        }

        let resolved = if self.table.contains_key(cleaned.as_str()) {
            cleaned
        } else {
            let lower = cleaned.to_lowercase();
            let suffix = format!("/{lower}");
            self.table
                .keys()
                .find(|key| {
                    let key_lower = key.to_lowercase();
                    key_lower == lower || key_lower.ends_with(&suffix)
                })
                .cloned()
                .unwrap_or(cleaned)
        };

        self.memo.insert(raw.to_string(), resolved.clone());
        resolved
    }

    /// Drops all memoized normalizations.
    pub fn clear_memo(&mut self) {
        self.memo.clear();
    }
}

/// UTC instant of a transition anchor applied to `year`, given the zone's
/// standard offset.
fn transition_instant(year: i32, rule: DstRule, std_offset: i64) -> Option<i64> {
    let local = NaiveDate::from_ymd_opt(year, u32::from(rule.month), u32::from(rule.day))?
        .and_hms_opt(u32::from(rule.hour), 0, 0)?;
    Some(local.and_utc().timestamp() - std_offset)
}
