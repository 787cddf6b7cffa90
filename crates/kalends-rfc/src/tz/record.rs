//! Timezone table entries and their binary decoding.

/// Civil-calendar anchor for a DST transition.
///
/// The anchor is applied to whichever year the queried instant falls in; it
/// is not a fixed historical date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DstRule {
    /// Month, 1-12.
    pub month: u8,
    /// Day of month, 1-31.
    pub day: u8,
    /// Hour of day, 0-23, in local standard time.
    pub hour: u8,
}

/// One timezone table entry.
///
/// A zone without DST carries no rules; its standard offset always applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimezoneRecord {
    /// Standard UTC offset in seconds, positive east of UTC.
    pub std_offset: i32,
    /// UTC offset in seconds while DST is in effect.
    pub dst_offset: i32,
    pub dst_start: Option<DstRule>,
    pub dst_end: Option<DstRule>,
}

impl TimezoneRecord {
    /// Encoded size of the fixed part following the zone name: two
    /// little-endian `i32` offsets plus two (month, day, hour) triplets.
    pub const ENCODED_LEN: usize = 14;

    /// Creates a fixed-offset record with no seasonal shift.
    #[must_use]
    pub const fn fixed(std_offset: i32) -> Self {
        Self {
            std_offset,
            dst_offset: std_offset,
            dst_start: None,
            dst_end: None,
        }
    }

    /// Decodes the fixed-size tail of one table record.
    ///
    /// A zero month byte in either triplet means the zone has no DST.
    /// Returns `None` when fewer than [`Self::ENCODED_LEN`] bytes are given.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::ENCODED_LEN {
            return None;
        }

        let std_offset = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let dst_offset = i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);

        let dst_start = decode_rule(bytes[8], bytes[9], bytes[10]);
        let dst_end = decode_rule(bytes[11], bytes[12], bytes[13]);

        Some(Self {
            std_offset,
            dst_offset,
            dst_start,
            dst_end,
        })
    }

    /// Returns whether this zone observes DST at all.
    #[must_use]
    pub const fn has_dst(&self) -> bool {
        self.dst_start.is_some() && self.dst_end.is_some()
    }
}

fn decode_rule(month: u8, day: u8, hour: u8) -> Option<DstRule> {
    if month == 0 {
        return None;
    }
    Some(DstRule { month, day, hour })
}
