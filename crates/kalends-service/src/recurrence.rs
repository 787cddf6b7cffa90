//! Recurrence expansion: calendar-correct candidate stepping with
//! constraint filtering, exclusion sets, and hard caps.

use std::collections::HashSet;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};

use kalends_core::config::Limits;
use kalends_core::types::Event;
use kalends_rfc::ical::core::{EventRecord, Frequency, RecurrenceRule};
use kalends_rfc::tz::TzDb;

/// Inclusive window of interest, absolute UTC seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: i64,
    pub end: i64,
}

impl Window {
    /// Whether `[start, end]` overlaps this window.
    #[must_use]
    pub const fn overlaps(self, start: i64, end: i64) -> bool {
        end >= self.start && start <= self.end
    }
}

/// Expands one raw record into concrete occurrences within the window.
///
/// Override records are never expanded here; they are substituted during
/// final assembly. RDATE instants are emitted independently of the rule, up
/// to the configured cap.
pub fn expand_record(
    record: &EventRecord,
    window: Window,
    tz: &TzDb,
    limits: &Limits,
    out: &mut Vec<Event>,
) {
    if record.is_override() {
        return;
    }

    let duration = record.duration();

    if !record.is_recurring() && record.rdates.is_empty() {
        if window.overlaps(record.dtstart, record.dtend) {
            out.push(materialize(record, record.dtstart, duration));
        }
        return;
    }

    if let Some(rule) = record.rrule.as_ref().filter(|rule| rule.is_recurring()) {
        let exdates: HashSet<i64> = record.exdates.iter().copied().collect();
        let mut search_start = window.start;
        let mut found = 0;

        while found < limits.max_occurrences_per_event {
            let Some(next) =
                next_occurrence(record, rule, &exdates, search_start, window.end, tz, limits)
            else {
                break;
            };
            if next > window.end {
                break;
            }
            out.push(materialize(record, next, duration));
            found += 1;
            search_start = next + 1;
        }
    }

    for instant in record.rdates.iter().copied().take(limits.max_rdate_count) {
        if window.overlaps(instant, instant + duration) {
            out.push(materialize(record, instant, duration));
        }
    }
}

fn materialize(record: &EventRecord, start: i64, duration: i64) -> Event {
    Event {
        dtstart: start,
        dtend: start + duration,
        summary: record.summary.clone(),
        description: record.description.clone(),
        tzid: record.tzid.clone(),
    }
}

/// Finds the first occurrence on or after `search_start` that passes the
/// UNTIL/COUNT bounds, the BY* constraint sets, and the exclusion set.
///
/// Returns `None` once the series is exhausted or the iteration budget runs
/// out. Candidates skipped by the initial estimate still count toward the
/// COUNT limit.
fn next_occurrence(
    record: &EventRecord,
    rule: &RecurrenceRule,
    exdates: &HashSet<i64>,
    search_start: i64,
    window_end: i64,
    tz: &TzDb,
    limits: &Limits,
) -> Option<i64> {
    let freq = rule.freq?;
    let until = rule.until.map_or(window_end, |u| u.min(window_end));
    if record.dtstart > until {
        return None;
    }

    let mut candidate = record.dtstart;
    let skip = skip_estimate(record.dtstart, search_start, freq, rule.interval);
    for _ in 0..skip {
        candidate = advance(candidate, freq, rule.interval, &record.tzid, tz);
    }

    let mut count = skip;
    for _ in 0..limits.max_recurrence_iterations {
        if candidate > until {
            return None;
        }
        if let Some(limit) = rule.count
            && count >= u64::from(limit)
        {
            return None;
        }

        if candidate >= search_start
            && !exdates.contains(&candidate)
            && matches_constraints(candidate, &record.tzid, rule, tz)
        {
            return Some(candidate);
        }

        candidate = advance(candidate, freq, rule.interval, &record.tzid, tz);
        count += 1;
    }

    None
}

/// Intervals to skip so the candidate lands near `search_start` instead of
/// iterating from the series origin. Backs off two intervals to stay on the
/// safe side of the rough interval lengths.
fn skip_estimate(base: i64, search_start: i64, freq: Frequency, interval: u32) -> u64 {
    if base >= search_start {
        return 0;
    }
    let interval_seconds = freq.approx_seconds() * i64::from(interval);
    if interval_seconds <= 0 {
        return 0;
    }
    let steps = (search_start - base) / interval_seconds;
    u64::try_from(steps - 2).unwrap_or(0)
}

/// Advances one interval in the record's local civil time, falling back to
/// fixed-length arithmetic when the calendar math fails.
fn advance(instant: i64, freq: Frequency, interval: u32, tzid: &str, tz: &TzDb) -> i64 {
    advance_civil(instant, freq, interval, tzid, tz)
        .unwrap_or_else(|| instant + freq.approx_seconds() * i64::from(interval))
}

fn advance_civil(
    instant: i64,
    freq: Frequency,
    interval: u32,
    tzid: &str,
    tz: &TzDb,
) -> Option<i64> {
    let local = tz.to_local(instant, tzid);
    let stepped = match freq {
        Frequency::Daily => local.checked_add_days(Days::new(u64::from(interval)))?,
        Frequency::Weekly => local.checked_add_days(Days::new(7 * u64::from(interval)))?,
        Frequency::Monthly => shift_months(local, i64::from(interval))?,
        Frequency::Yearly => shift_years(local, i32::try_from(interval).ok()?)?,
    };
    Some(tz.to_utc(stepped, tzid))
}

/// Month add with year carry; the day of month clamps to the target
/// month's length (Feb 29 becomes 28 outside leap years).
fn shift_months(local: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let zero_based = i64::from(local.month0()) + months;
    let year = local
        .year()
        .checked_add(i32::try_from(zero_based.div_euclid(12)).ok()?)?;
    let month = u32::try_from(zero_based.rem_euclid(12)).ok()? + 1;
    let day = local.day().min(days_in_month(year, month)?);
    Some(NaiveDate::from_ymd_opt(year, month, day)?.and_time(local.time()))
}

fn shift_years(local: NaiveDateTime, years: i32) -> Option<NaiveDateTime> {
    let year = local.year().checked_add(years)?;
    let day = local.day().min(days_in_month(year, local.month())?);
    Some(NaiveDate::from_ymd_opt(year, local.month(), day)?.and_time(local.time()))
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    u32::try_from(next.signed_duration_since(first).num_days()).ok()
}

/// Tests a candidate against the BY* constraint sets, evaluated in the
/// record's zone. An empty set constrains nothing.
fn matches_constraints(instant: i64, tzid: &str, rule: &RecurrenceRule, tz: &TzDb) -> bool {
    if rule.by_day.is_empty() && rule.by_month.is_empty() && rule.by_monthday.is_empty() {
        return true;
    }

    let local = tz.to_local(instant, tzid);
    let day = u8::try_from(local.day()).unwrap_or(0);
    let month = u8::try_from(local.month()).unwrap_or(0);
    let weekday = u8::try_from(local.weekday().num_days_from_monday()).unwrap_or(7);

    if !rule.by_monthday.is_empty() && !rule.by_monthday.contains(&day) {
        return false;
    }
    if !rule.by_month.is_empty() && !rule.by_month.contains(&month) {
        return false;
    }
    if !rule.by_day.is_empty() && !rule.by_day.contains(&weekday) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use kalends_rfc::tz::{DstRule, TimezoneRecord};

    fn test_db() -> TzDb {
        TzDb::from_records([
            ("UTC".to_string(), TimezoneRecord::fixed(0)),
            (
                "America/New_York".to_string(),
                TimezoneRecord {
                    std_offset: -18_000,
                    dst_offset: -14_400,
                    dst_start: Some(DstRule {
                        month: 3,
                        day: 10,
                        hour: 2,
                    }),
                    dst_end: Some(DstRule {
                        month: 11,
                        day: 3,
                        hour: 2,
                    }),
                },
            ),
        ])
    }

    fn utc_ts(year: i32, month: u32, day: u32, hour: u32) -> i64 {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp()
    }

    fn record(dtstart: i64, rrule: Option<RecurrenceRule>) -> EventRecord {
        EventRecord {
            dtstart,
            dtend: dtstart + 3600,
            tzid: "UTC".to_string(),
            summary: "Test".to_string(),
            description: String::new(),
            rrule,
            exdates: Vec::new(),
            rdates: Vec::new(),
            recurrence_id: None,
        }
    }

    fn daily_rule(count: Option<u32>) -> RecurrenceRule {
        RecurrenceRule {
            freq: Some(Frequency::Daily),
            count,
            ..RecurrenceRule::new()
        }
    }

    fn expand(record: &EventRecord, window: Window) -> Vec<Event> {
        let mut out = Vec::new();
        expand_record(record, window, &test_db(), &Limits::default(), &mut out);
        out
    }

    #[test]
    fn single_event_outside_window_yields_nothing() {
        let window = Window {
            start: utc_ts(2024, 4, 1, 0),
            end: utc_ts(2024, 5, 1, 0),
        };
        let before = record(utc_ts(2024, 3, 1, 12), None);
        let after = record(utc_ts(2024, 5, 2, 12), None);

        assert!(expand(&before, window).is_empty());
        assert!(expand(&after, window).is_empty());
    }

    #[test]
    fn single_event_overlapping_window_yields_exactly_one() {
        let window = Window {
            start: utc_ts(2024, 4, 1, 0),
            end: utc_ts(2024, 5, 1, 0),
        };
        let inside = record(utc_ts(2024, 4, 10, 12), None);
        assert_eq!(expand(&inside, window).len(), 1);

        // Started before the window but still running at its start.
        let mut straddling = record(utc_ts(2024, 3, 31, 23), None);
        straddling.dtend = utc_ts(2024, 4, 1, 1);
        assert_eq!(expand(&straddling, window).len(), 1);
    }

    #[test]
    fn daily_count_five_yields_five_day_spaced_occurrences() {
        let window = Window {
            start: utc_ts(2024, 4, 1, 0),
            end: utc_ts(2024, 5, 1, 0),
        };
        let series = record(utc_ts(2024, 4, 1, 12), Some(daily_rule(Some(5))));

        let events = expand(&series, window);
        assert_eq!(events.len(), 5);
        for pair in events.windows(2) {
            assert_eq!(pair[1].dtstart - pair[0].dtstart, 86_400);
        }
    }

    #[test]
    fn interval_spaces_occurrences() {
        let window = Window {
            start: utc_ts(2024, 4, 1, 0),
            end: utc_ts(2024, 4, 29, 0),
        };
        let rule = RecurrenceRule {
            freq: Some(Frequency::Weekly),
            interval: 2,
            ..RecurrenceRule::new()
        };
        let series = record(utc_ts(2024, 4, 1, 12), Some(rule));

        let events = expand(&series, window);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].dtstart - events[0].dtstart, 14 * 86_400);
    }

    #[test]
    fn until_bounds_the_series() {
        let window = Window {
            start: utc_ts(2024, 4, 1, 0),
            end: utc_ts(2024, 5, 1, 0),
        };
        let rule = RecurrenceRule {
            freq: Some(Frequency::Daily),
            until: Some(utc_ts(2024, 4, 3, 12)),
            ..RecurrenceRule::new()
        };
        let series = record(utc_ts(2024, 4, 1, 12), Some(rule));

        // April 1, 2, 3; the until instant itself is inclusive.
        assert_eq!(expand(&series, window).len(), 3);
    }

    #[test]
    fn exdate_removes_exactly_one_occurrence() {
        let window = Window {
            start: utc_ts(2024, 4, 1, 0),
            end: utc_ts(2024, 5, 1, 0),
        };
        let mut series = record(utc_ts(2024, 4, 1, 12), Some(daily_rule(Some(5))));
        series.exdates.push(utc_ts(2024, 4, 3, 12));

        let events = expand(&series, window);
        assert_eq!(events.len(), 4);
        assert!(events.iter().all(|e| e.dtstart != utc_ts(2024, 4, 3, 12)));
    }

    #[test]
    fn byday_filters_to_selected_weekdays() {
        let window = Window {
            start: utc_ts(2024, 4, 1, 0),
            end: utc_ts(2024, 4, 8, 0),
        };
        // 2024-04-01 is a Monday; keep Monday and Friday only.
        let rule = RecurrenceRule {
            freq: Some(Frequency::Daily),
            by_day: vec![0, 4],
            ..RecurrenceRule::new()
        };
        let series = record(utc_ts(2024, 4, 1, 12), Some(rule));

        let events = expand(&series, window);
        let starts: Vec<i64> = events.iter().map(|e| e.dtstart).collect();
        assert_eq!(
            starts,
            vec![utc_ts(2024, 4, 1, 12), utc_ts(2024, 4, 5, 12)]
        );
    }

    #[test]
    fn monthly_clamps_to_target_month_length() {
        let window = Window {
            start: utc_ts(2024, 1, 1, 0),
            end: utc_ts(2024, 5, 1, 0),
        };
        let rule = RecurrenceRule {
            freq: Some(Frequency::Monthly),
            count: Some(4),
            ..RecurrenceRule::new()
        };
        let series = record(utc_ts(2024, 1, 31, 12), Some(rule));

        let events = expand(&series, window);
        let starts: Vec<i64> = events.iter().map(|e| e.dtstart).collect();
        // Jan 31, Feb 29 (leap), Mar 29, Apr 29.
        assert_eq!(
            starts,
            vec![
                utc_ts(2024, 1, 31, 12),
                utc_ts(2024, 2, 29, 12),
                utc_ts(2024, 3, 29, 12),
                utc_ts(2024, 4, 29, 12),
            ]
        );
    }

    #[test]
    fn yearly_clamps_leap_day_outside_leap_years() {
        let window = Window {
            start: utc_ts(2024, 1, 1, 0),
            end: utc_ts(2026, 12, 31, 0),
        };
        let rule = RecurrenceRule {
            freq: Some(Frequency::Yearly),
            count: Some(3),
            ..RecurrenceRule::new()
        };
        let series = record(utc_ts(2024, 2, 29, 12), Some(rule));

        let events = expand(&series, window);
        let starts: Vec<i64> = events.iter().map(|e| e.dtstart).collect();
        assert_eq!(
            starts,
            vec![
                utc_ts(2024, 2, 29, 12),
                utc_ts(2025, 2, 28, 12),
                utc_ts(2026, 2, 28, 12),
            ]
        );
    }

    #[test]
    fn weekly_series_keeps_local_time_across_dst_shift() {
        let db = test_db();
        let window = Window {
            start: utc_ts(2024, 3, 1, 0),
            end: utc_ts(2024, 3, 31, 0),
        };
        // 09:00 America/New_York on March 8 (EST), repeating weekly across
        // the March 10 transition.
        let rule = RecurrenceRule {
            freq: Some(Frequency::Weekly),
            count: Some(2),
            ..RecurrenceRule::new()
        };
        let series = EventRecord {
            dtstart: utc_ts(2024, 3, 8, 14),
            dtend: utc_ts(2024, 3, 8, 15),
            tzid: "America/New_York".to_string(),
            summary: String::new(),
            description: String::new(),
            rrule: Some(rule),
            exdates: Vec::new(),
            rdates: Vec::new(),
            recurrence_id: None,
        };

        let mut events = Vec::new();
        expand_record(&series, window, &db, &Limits::default(), &mut events);

        // Second occurrence lands at 13:00 UTC, still 09:00 local.
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].dtstart, utc_ts(2024, 3, 8, 14));
        assert_eq!(events[1].dtstart, utc_ts(2024, 3, 15, 13));
    }

    #[test]
    fn rdates_emit_independently_of_the_rule() {
        let window = Window {
            start: utc_ts(2024, 4, 1, 0),
            end: utc_ts(2024, 5, 1, 0),
        };
        let mut single = record(utc_ts(2024, 4, 2, 12), None);
        single.rdates.push(utc_ts(2024, 4, 20, 12));
        single.rdates.push(utc_ts(2024, 6, 20, 12)); // outside the window

        let events = expand(&single, window);
        // RDATEs only: a record with additions skips the plain single-event
        // path, matching the processing of series with extra dates.
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].dtstart, utc_ts(2024, 4, 20, 12));
    }

    #[test]
    fn rdate_cap_bounds_processing() {
        let window = Window {
            start: utc_ts(2024, 4, 1, 0),
            end: utc_ts(2024, 5, 1, 0),
        };
        let limits = Limits {
            max_rdate_count: 3,
            ..Limits::default()
        };
        let mut single = record(utc_ts(2024, 4, 2, 12), None);
        for day in 10..20 {
            single.rdates.push(utc_ts(2024, 4, day, 12));
        }

        let mut events = Vec::new();
        expand_record(&single, window, &test_db(), &limits, &mut events);
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn occurrence_cap_bounds_generation() {
        let window = Window {
            start: utc_ts(2024, 1, 1, 0),
            end: utc_ts(2026, 1, 1, 0),
        };
        let limits = Limits {
            max_occurrences_per_event: 7,
            ..Limits::default()
        };
        let series = record(utc_ts(2024, 1, 1, 12), Some(daily_rule(None)));

        let mut events = Vec::new();
        expand_record(&series, window, &test_db(), &limits, &mut events);
        assert_eq!(events.len(), 7);
    }

    #[test]
    fn iteration_budget_terminates_sparse_rules() {
        let window = Window {
            start: utc_ts(2024, 1, 1, 0),
            end: utc_ts(2024, 12, 31, 0),
        };
        let limits = Limits {
            max_recurrence_iterations: 10,
            ..Limits::default()
        };
        // A daily rule restricted to a month the budget never reaches.
        let rule = RecurrenceRule {
            freq: Some(Frequency::Daily),
            by_month: vec![12],
            ..RecurrenceRule::new()
        };
        let series = record(utc_ts(2024, 1, 1, 12), Some(rule));

        let mut events = Vec::new();
        expand_record(&series, window, &test_db(), &limits, &mut events);
        assert!(events.is_empty());
    }

    #[test]
    fn skip_estimate_backs_off_two_intervals() {
        let base = utc_ts(2020, 1, 1, 0);
        let target = base + 100 * 86_400;
        assert_eq!(skip_estimate(base, target, Frequency::Daily, 1), 98);
        assert_eq!(skip_estimate(base, base, Frequency::Daily, 1), 0);
        assert_eq!(skip_estimate(base, base + 86_400, Frequency::Daily, 1), 0);
    }

    #[test]
    fn far_future_window_finds_occurrences_within_budget() {
        // Ten years of daily occurrences would blow a 200-step budget
        // without the skip estimate.
        let window = Window {
            start: utc_ts(2034, 1, 1, 0),
            end: utc_ts(2034, 1, 10, 0),
        };
        let series = record(utc_ts(2024, 1, 1, 12), Some(daily_rule(None)));

        let events = expand(&series, window);
        assert!(!events.is_empty());
        assert_eq!(events[0].dtstart, utc_ts(2034, 1, 1, 12));
    }

    #[test]
    fn count_includes_skipped_candidates() {
        // COUNT=5 series queried from far past its end yields nothing even
        // though the skip estimate jumps over the live occurrences.
        let window = Window {
            start: utc_ts(2024, 6, 1, 0),
            end: utc_ts(2024, 7, 1, 0),
        };
        let series = record(utc_ts(2024, 4, 1, 12), Some(daily_rule(Some(5))));

        assert!(expand(&series, window).is_empty());
    }
}
