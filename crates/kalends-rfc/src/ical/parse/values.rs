//! Value parsers: instants, date lists, recurrence rules, escaped text.

use chrono::{NaiveDateTime, NaiveTime};

use super::lexer::ContentLine;
use crate::ical::core::{Frequency, RecurrenceRule};
use crate::tz::TzDb;

/// Truncation marker appended to over-length descriptions.
const ELLIPSIS: char = '…';

/// Parses a DTSTART/DTEND/RECURRENCE-ID value to an absolute UTC instant.
///
/// Returns the instant plus the normalized zone it was interpreted under,
/// or `None` when the digit fields are malformed or truncated. A trailing
/// `Z` or explicit numeric offset marks the digits as absolute UTC,
/// bypassing the zone table.
#[must_use]
pub fn parse_instant(
    cl: &ContentLine,
    default_tzid: &str,
    tz: &mut TzDb,
) -> Option<(i64, String)> {
    let tzid = match cl.tzid() {
        Some(raw) => tz.normalize(raw),
        None => default_tzid.to_string(),
    };
    let instant = parse_instant_value(cl.raw_value.trim(), &tzid, tz)?;
    Some((instant, tzid))
}

/// Parses one datetime value under an already-normalized zone.
#[must_use]
pub fn parse_instant_value(raw: &str, tzid: &str, tz: &TzDb) -> Option<i64> {
    // Z and numeric offsets both mean "take the digits as UTC"; the offset
    // value itself is not applied.
    let (digits, absolute) = match raw.find(['Z', '+', '-']) {
        Some(pos) => (&raw[..pos], true),
        None => (raw, false),
    };

    let civil = parse_civil(digits)?;
    if absolute || tzid == "UTC" {
        Some(civil.and_utc().timestamp())
    } else {
        Some(tz.to_utc(civil, tzid))
    }
}

/// Parses the basic-format digits of a DATE or DATE-TIME value.
///
/// Date-only values resolve to civil midnight. Missing trailing time
/// fields default to zero; malformed digits yield `None`.
fn parse_civil(digits: &str) -> Option<NaiveDateTime> {
    let year = digits.get(0..4)?.parse().ok()?;
    let month = digits.get(4..6)?.parse().ok()?;
    let day = digits.get(6..8)?.parse().ok()?;
    let date = chrono::NaiveDate::from_ymd_opt(year, month, day)?;

    if digits.contains('T') && digits.len() > 9 {
        date.and_hms_opt(
            time_field(digits, 9)?,
            time_field(digits, 11)?,
            time_field(digits, 13)?,
        )
    } else {
        Some(date.and_time(NaiveTime::MIN))
    }
}

fn time_field(digits: &str, at: usize) -> Option<u32> {
    match digits.get(at..at + 2) {
        Some(field) => field.parse().ok(),
        None => Some(0),
    }
}

/// Parses an EXDATE/RDATE list into `out`.
///
/// A TZID on the list line wins; otherwise the record's zone applies.
/// Entries that fail to parse are dropped.
pub fn parse_instant_list(cl: &ContentLine, record_tzid: &str, tz: &mut TzDb, out: &mut Vec<i64>) {
    let tzid = match cl.tzid() {
        Some(raw) => tz.normalize(raw),
        None => record_tzid.to_string(),
    };

    for part in cl.raw_value.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some(instant) = parse_instant_value(part, &tzid, tz) {
            out.push(instant);
        }
    }
}

/// Parses an RRULE value into the supported subset.
///
/// Unknown keys are ignored, unknown weekday codes and non-numeric BY*
/// entries are dropped, and an unsupported FREQ leaves the rule without a
/// frequency, which makes it non-recurring.
#[must_use]
pub fn parse_rrule(raw: &str, record_tzid: &str, tz: &TzDb) -> RecurrenceRule {
    let mut rule = RecurrenceRule::new();

    for part in raw.split(';') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        match key.to_ascii_uppercase().as_str() {
            "FREQ" => rule.freq = Frequency::parse(value),
            "INTERVAL" => rule.interval = value.parse().unwrap_or(1).max(1),
            "COUNT" => rule.count = value.parse().ok(),
            "UNTIL" => rule.until = parse_instant_value(value.trim(), record_tzid, tz),
            "BYDAY" => {
                rule.by_day = value
                    .split(',')
                    .filter_map(|code| weekday_index(code.trim()))
                    .collect();
            }
            "BYMONTH" => {
                rule.by_month = value
                    .split(',')
                    .filter_map(|v| v.trim().parse().ok())
                    .collect();
            }
            "BYMONTHDAY" => {
                rule.by_monthday = value
                    .split(',')
                    .filter_map(|v| v.trim().parse().ok())
                    .collect();
            }
            _ => {}
        }
    }

    rule
}

/// Maps a two-letter weekday code to a Monday-based index.
fn weekday_index(code: &str) -> Option<u8> {
    match code.to_ascii_uppercase().as_str() {
        "MO" => Some(0),
        "TU" => Some(1),
        "WE" => Some(2),
        "TH" => Some(3),
        "FR" => Some(4),
        "SA" => Some(5),
        "SU" => Some(6),
        _ => None,
    }
}

/// Resolves the text escapes feed producers emit (RFC 5545 §3.3.11).
#[must_use]
pub fn unescape_text(raw: &str) -> String {
    raw.replace("\\n", "\n").replace("\\,", ",").replace("\\;", ";")
}

/// Unescapes, length-caps, and trims a DESCRIPTION value.
#[must_use]
pub fn clean_description(raw: &str, max_len: usize) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let mut text = unescape_text(raw);
    if text.chars().count() > max_len {
        text = text.chars().take(max_len.saturating_sub(1)).collect();
        text.push(ELLIPSIS);
    }
    text.trim().to_string()
}
