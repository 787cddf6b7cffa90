//! Core models for the iCalendar subset.
//!
//! These types carry exactly what the occurrence pipeline needs: absolute
//! UTC instants, the rule subset, and the override marker. Raw properties
//! the pipeline does not consume are dropped during scanning.

mod record;
mod rrule;

pub use record::{EventRecord, OverrideKey, RecordDraft};
pub use rrule::{Frequency, RecurrenceRule};
