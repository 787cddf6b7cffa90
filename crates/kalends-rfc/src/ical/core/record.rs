//! Raw per-event records accumulated by the scanner.

use super::RecurrenceRule;

/// Key identifying the occurrence a RECURRENCE-ID record replaces:
/// the overridden start instant plus the zone it was declared under.
pub type OverrideKey = (i64, String);

/// One VEVENT's worth of raw data, finalized at `END:VEVENT`.
///
/// Either queued for occurrence expansion or, when `recurrence_id` is set,
/// folded into the override index instead.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Start instant (UTC seconds).
    pub dtstart: i64,
    /// End instant (UTC seconds).
    pub dtend: i64,
    /// Zone the record's civil times were declared in.
    pub tzid: String,
    pub summary: String,
    pub description: String,
    /// Parsed recurrence rule, if the record carried one.
    pub rrule: Option<RecurrenceRule>,
    /// Instants excluded from the series.
    pub exdates: Vec<i64>,
    /// Instants added beside the series.
    pub rdates: Vec<i64>,
    /// Set when this record overrides one occurrence of another series.
    pub recurrence_id: Option<i64>,
}

impl EventRecord {
    #[must_use]
    pub fn duration(&self) -> i64 {
        self.dtend - self.dtstart
    }

    #[must_use]
    pub const fn is_override(&self) -> bool {
        self.recurrence_id.is_some()
    }

    /// Whether the record carries a rule that actually fires.
    #[must_use]
    pub fn is_recurring(&self) -> bool {
        self.rrule.as_ref().is_some_and(RecurrenceRule::is_recurring)
    }

    #[must_use]
    pub fn override_key(&self) -> Option<OverrideKey> {
        self.recurrence_id.map(|instant| (instant, self.tzid.clone()))
    }
}

/// Mutable accumulator for the record currently being scanned.
///
/// Created at `BEGIN:VEVENT`, finalized at `END:VEVENT`.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub dtstart: Option<i64>,
    pub dtend: Option<i64>,
    pub tzid: String,
    pub summary: String,
    pub description: String,
    pub rrule: Option<RecurrenceRule>,
    pub exdates: Vec<i64>,
    pub rdates: Vec<i64>,
    pub recurrence_id: Option<i64>,
}

impl RecordDraft {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dtstart: None,
            dtend: None,
            tzid: "UTC".to_string(),
            summary: String::new(),
            description: String::new(),
            rrule: None,
            exdates: Vec::new(),
            rdates: Vec::new(),
            recurrence_id: None,
        }
    }

    /// Finalizes the draft.
    ///
    /// A draft without a start time is discarded; a missing end defaults to
    /// one hour after the start.
    #[must_use]
    pub fn finish(self) -> Option<EventRecord> {
        let dtstart = self.dtstart?;
        let dtend = self.dtend.unwrap_or(dtstart + 3600);

        Some(EventRecord {
            dtstart,
            dtend,
            tzid: self.tzid,
            summary: self.summary,
            description: self.description,
            rrule: self.rrule,
            exdates: self.exdates,
            rdates: self.rdates,
            recurrence_id: self.recurrence_id,
        })
    }
}

impl Default for RecordDraft {
    fn default() -> Self {
        Self::new()
    }
}
