//! Recurrence rule model (RFC 5545 §3.3.10 subset).

/// Recurrence frequency.
///
/// Only the four calendar-level frequencies are supported; finer-grained
/// frequencies fail to parse, which leaves the rule non-recurring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// Parses a FREQ value (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DAILY" => Some(Self::Daily),
            "WEEKLY" => Some(Self::Weekly),
            "MONTHLY" => Some(Self::Monthly),
            "YEARLY" => Some(Self::Yearly),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }

    /// Rough interval length in seconds, used only to estimate how many
    /// intervals to skip when a search window starts far from the origin.
    #[must_use]
    pub const fn approx_seconds(self) -> i64 {
        match self {
            Self::Daily => 86_400,
            Self::Weekly => 604_800,
            Self::Monthly => 2_592_000,
            Self::Yearly => 31_536_000,
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed, normalized recurrence rule.
///
/// An absent frequency means the rule never fires; the record is treated as
/// non-recurring. Empty constraint sets mean "no restriction from that
/// axis".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub freq: Option<Frequency>,
    /// Interval multiplier, at least 1.
    pub interval: u32,
    /// Absolute occurrence count limit.
    pub count: Option<u32>,
    /// Inclusive end instant (UTC seconds).
    pub until: Option<i64>,
    /// Allowed weekdays, 0 = Monday through 6 = Sunday.
    pub by_day: Vec<u8>,
    /// Allowed months, 1-12.
    pub by_month: Vec<u8>,
    /// Allowed days of month, 1-31.
    pub by_monthday: Vec<u8>,
}

impl RecurrenceRule {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            freq: None,
            interval: 1,
            count: None,
            until: None,
            by_day: Vec::new(),
            by_month: Vec::new(),
            by_monthday: Vec::new(),
        }
    }

    #[must_use]
    pub const fn is_recurring(&self) -> bool {
        self.freq.is_some()
    }
}

impl Default for RecurrenceRule {
    fn default() -> Self {
        Self::new()
    }
}
