//! Materialized event type shared across the pipeline.

use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};

use chrono::DateTime;

/// A single materialized calendar occurrence.
///
/// Both instants are absolute UTC seconds. The timezone identifier is the
/// zone the occurrence was computed under, retained for display only; it is
/// never used for further conversion. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Event {
    /// Start instant (UTC seconds).
    pub dtstart: i64,
    /// End instant (UTC seconds).
    pub dtend: i64,
    /// Event title.
    pub summary: String,
    /// Event description, unescaped and length-capped.
    pub description: String,
    /// Zone identifier the occurrence was computed under.
    pub tzid: String,
}

impl Event {
    #[must_use]
    pub fn duration_seconds(&self) -> i64 {
        self.dtend - self.dtstart
    }

    /// Value fingerprint over all five fields, used for duplicate removal.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} .. {}  {} ({})",
            format_instant(self.dtstart),
            format_instant(self.dtend),
            self.summary,
            self.tzid
        )
    }
}

fn format_instant(instant: i64) -> String {
    DateTime::from_timestamp(instant, 0).map_or_else(
        || instant.to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M").to_string(),
    )
}
