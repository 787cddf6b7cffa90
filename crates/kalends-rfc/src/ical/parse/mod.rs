//! Single-pass parsing of iCalendar feeds into raw event records.

mod error;
mod lexer;
mod scanner;
mod values;

pub use error::{ParseError, ParseErrorKind, ParseResult};
pub use lexer::{ContentLine, Parameter, parse_content_line, split_lines};
pub use scanner::Scanner;
pub use values::{clean_description, parse_instant, parse_rrule, unescape_text};

use kalends_core::config::Limits;

use crate::ical::core::EventRecord;
use crate::tz::TzDb;

/// Parses a feed body into raw event records.
///
/// Malformed lines are skipped and malformed properties leave their record
/// intact; this never fails, it just yields fewer records.
#[must_use]
pub fn parse_events(input: &str, tz: &mut TzDb, limits: &Limits) -> Vec<EventRecord> {
    let mut scanner = Scanner::new();
    let mut skipped = 0usize;

    for (line_num, line) in split_lines(input) {
        match parse_content_line(&line, line_num) {
            Ok(cl) => scanner.feed(&cl, tz, limits),
            Err(err) => {
                skipped += 1;
                tracing::trace!(%err, "Skipping malformed line");
            }
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, "Skipped malformed content lines");
    }
    scanner.finish()
}
