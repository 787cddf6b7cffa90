//! VEVENT scanner: an explicit state machine over unfolded content lines.

use kalends_core::config::Limits;

use super::lexer::ContentLine;
use super::values::{clean_description, parse_instant, parse_instant_list, parse_rrule};
use crate::ical::core::{EventRecord, RecordDraft};
use crate::tz::TzDb;

/// Property names the scanner dispatches on. Everything else inside a
/// record is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PropertyName {
    Begin,
    End,
    DtStart,
    DtEnd,
    Summary,
    Description,
    RRule,
    ExDate,
    RDate,
    RecurrenceId,
    Other,
}

impl PropertyName {
    fn classify(name: &str) -> Self {
        match name {
            "BEGIN" => Self::Begin,
            "END" => Self::End,
            "DTSTART" => Self::DtStart,
            "DTEND" => Self::DtEnd,
            "SUMMARY" => Self::Summary,
            "DESCRIPTION" => Self::Description,
            "RRULE" => Self::RRule,
            "EXDATE" => Self::ExDate,
            "RDATE" => Self::RDate,
            "RECURRENCE-ID" => Self::RecurrenceId,
            _ => Self::Other,
        }
    }
}

/// Scanner over one feed's logical lines.
///
/// Holds the draft of the record currently being accumulated, if any, plus
/// every record finalized so far. Lines outside `BEGIN:VEVENT`/`END:VEVENT`
/// are ignored.
#[derive(Debug, Default)]
pub struct Scanner {
    current: Option<RecordDraft>,
    records: Vec<EventRecord>,
}

impl Scanner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one unfolded content line.
    pub fn feed(&mut self, cl: &ContentLine, tz: &mut TzDb, limits: &Limits) {
        match PropertyName::classify(&cl.name) {
            PropertyName::Begin => {
                if cl.raw_value.eq_ignore_ascii_case("VEVENT") {
                    self.current = Some(RecordDraft::new());
                }
            }
            PropertyName::End => {
                if cl.raw_value.eq_ignore_ascii_case("VEVENT")
                    && let Some(draft) = self.current.take()
                    && let Some(record) = draft.finish()
                {
                    self.records.push(record);
                }
            }
            name => {
                if let Some(draft) = self.current.as_mut() {
                    apply_property(draft, name, cl, tz, limits);
                }
            }
        }
    }

    /// Returns every finalized record, dropping any unterminated draft.
    #[must_use]
    pub fn finish(self) -> Vec<EventRecord> {
        self.records
    }
}

fn apply_property(
    draft: &mut RecordDraft,
    name: PropertyName,
    cl: &ContentLine,
    tz: &mut TzDb,
    limits: &Limits,
) {
    match name {
        PropertyName::DtStart => {
            if let Some((instant, tzid)) = parse_instant(cl, &draft.tzid, tz) {
                draft.dtstart = Some(instant);
                // Only an explicit TZID changes the record's zone.
                if cl.tzid().is_some() {
                    draft.tzid = tzid;
                }
            }
        }
        PropertyName::DtEnd => {
            if let Some((instant, _)) = parse_instant(cl, &draft.tzid, tz) {
                draft.dtend = Some(instant);
            }
        }
        PropertyName::Summary => draft.summary = cl.raw_value.trim().to_string(),
        PropertyName::Description => {
            draft.description = clean_description(&cl.raw_value, limits.max_description_length);
        }
        PropertyName::RRule => {
            draft.rrule = Some(parse_rrule(&cl.raw_value, &draft.tzid, tz));
        }
        PropertyName::ExDate => parse_instant_list(cl, &draft.tzid, tz, &mut draft.exdates),
        PropertyName::RDate => parse_instant_list(cl, &draft.tzid, tz, &mut draft.rdates),
        PropertyName::RecurrenceId => {
            if let Some((instant, _)) = parse_instant(cl, &draft.tzid, tz) {
                draft.recurrence_id = Some(instant);
            }
        }
        PropertyName::Begin | PropertyName::End | PropertyName::Other => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ical::core::Frequency;
    use crate::ical::parse::lexer::parse_content_line;
    use crate::tz::{DstRule, TimezoneRecord, TzDb};

    fn test_db() -> TzDb {
        TzDb::from_records([(
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
        )])
    }

    fn scan(lines: &[&str]) -> Vec<EventRecord> {
        let mut tz = test_db();
        let limits = Limits::default();
        let mut scanner = Scanner::new();
        for (i, line) in lines.iter().enumerate() {
            let cl = parse_content_line(line, i + 1).unwrap();
            scanner.feed(&cl, &mut tz, &limits);
        }
        scanner.finish()
    }

    #[test]
    fn scan_extracts_one_record() {
        let records = scan(&[
            "BEGIN:VCALENDAR",
            "BEGIN:VEVENT",
            "UID:a@example.com",
            "DTSTART:20240315T130000Z",
            "DTEND:20240315T140000Z",
            "SUMMARY:Planning",
            "DESCRIPTION:First\\nSecond",
            "END:VEVENT",
            "END:VCALENDAR",
        ]);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.dtstart, 1_710_507_600);
        assert_eq!(record.duration(), 3600);
        assert_eq!(record.summary, "Planning");
        assert_eq!(record.description, "First\nSecond");
        assert_eq!(record.tzid, "UTC");
    }

    #[test]
    fn tzid_on_dtstart_sets_the_record_zone() {
        let records = scan(&[
            "BEGIN:VEVENT",
            "DTSTART;TZID=America/New_York:20240315T090000",
            "END:VEVENT",
        ]);

        assert_eq!(records[0].tzid, "America/New_York");
        assert_eq!(records[0].dtstart, 1_710_507_600);
    }

    #[test]
    fn record_without_start_is_discarded() {
        let records = scan(&[
            "BEGIN:VEVENT",
            "SUMMARY:No start",
            "END:VEVENT",
            "BEGIN:VEVENT",
            "DTSTART:20240315T130000Z",
            "END:VEVENT",
        ]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].summary, "");
    }

    #[test]
    fn missing_end_defaults_to_one_hour() {
        let records = scan(&["BEGIN:VEVENT", "DTSTART:20240315T130000Z", "END:VEVENT"]);
        assert_eq!(records[0].dtend, records[0].dtstart + 3600);
    }

    #[test]
    fn malformed_datetime_leaves_record_intact() {
        let records = scan(&[
            "BEGIN:VEVENT",
            "DTSTART:20240315T130000Z",
            "DTEND:garbage",
            "SUMMARY:Survives",
            "END:VEVENT",
        ]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].summary, "Survives");
        assert_eq!(records[0].dtend, records[0].dtstart + 3600);
    }

    #[test]
    fn rrule_exdate_and_rdate_accumulate() {
        let records = scan(&[
            "BEGIN:VEVENT",
            "DTSTART:20240401T120000Z",
            "RRULE:FREQ=DAILY;COUNT=5",
            "EXDATE:20240403T120000Z",
            "RDATE:20240420T120000Z,20240421T120000Z",
            "END:VEVENT",
        ]);

        let record = &records[0];
        assert_eq!(record.rrule.as_ref().unwrap().freq, Some(Frequency::Daily));
        assert_eq!(record.exdates.len(), 1);
        assert_eq!(record.rdates.len(), 2);
    }

    #[test]
    fn recurrence_id_marks_an_override() {
        let records = scan(&[
            "BEGIN:VEVENT",
            "DTSTART:20240422T150000Z",
            "RECURRENCE-ID:20240422T120000Z",
            "SUMMARY:Moved",
            "END:VEVENT",
        ]);

        let record = &records[0];
        assert!(record.is_override());
        assert_eq!(record.override_key().unwrap().0, 1_713_787_200);
    }

    #[test]
    fn properties_outside_records_are_ignored() {
        let records = scan(&[
            "DTSTART:20240315T130000Z",
            "SUMMARY:Stray",
            "BEGIN:VEVENT",
            "DTSTART:20240316T130000Z",
            "END:VEVENT",
        ]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].summary, "");
    }

    #[test]
    fn unterminated_record_is_dropped() {
        let records = scan(&["BEGIN:VEVENT", "DTSTART:20240315T130000Z"]);
        assert!(records.is_empty());
    }

    #[test]
    fn long_description_is_capped() {
        let mut tz = test_db();
        let limits = Limits {
            max_description_length: 10,
            ..Limits::default()
        };
        let mut scanner = Scanner::new();
        for line in [
            "BEGIN:VEVENT",
            "DTSTART:20240315T130000Z",
            "DESCRIPTION:abcdefghijklmnopqrstuvwxyz",
            "END:VEVENT",
        ] {
            let cl = parse_content_line(line, 1).unwrap();
            scanner.feed(&cl, &mut tz, &limits);
        }

        let records = scanner.finish();
        assert_eq!(records[0].description, "abcdefghi…");
    }
}
