//! RFC 5545 subset parsing and timezone resolution for calendar feeds.
//!
//! This crate covers the two leaf stages of the pipeline: turning feed text
//! into raw per-event records, and resolving zone identifiers to UTC offsets
//! from a compact binary table.

pub mod ical;
pub mod tz;
