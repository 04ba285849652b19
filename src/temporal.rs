//! Date/time recognition by parsing against two out-of-band default stamps.
//!
//! A layout only sets the components it actually mentions. Every other
//! component is filled from a [`DefaultStamp`]. Parsing the same text against
//! two stamps that differ in every component therefore reveals which parts the
//! text specified: those parts agree, defaulted parts do not. A value is a
//! complete date when both readings share the same date portion, and a
//! complete time when both readings share the same time portion.

use chrono::{
    NaiveDate, NaiveDateTime,
    format::{Parsed, StrftimeItems, parse},
};

/// Components used to complete a partially specified date/time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultStamp {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

/// Implausible stamps; they differ from each other in every component.
pub const FIRST_STAMP: DefaultStamp = DefaultStamp {
    year: 9000,
    month: 1,
    day: 1,
    hour: 1,
    minute: 1,
    second: 1,
};

pub const SECOND_STAMP: DefaultStamp = DefaultStamp {
    year: 9001,
    month: 2,
    day: 2,
    hour: 2,
    minute: 2,
    second: 2,
};

// First matching layout wins, so US month-first forms precede day-first ones.
const LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y/%m/%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %I:%M:%S %p",
    "%d/%m/%Y %H:%M:%S%.f",
    "%d.%m.%Y %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%d-%b-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%H:%M:%S%.f",
    "%I:%M:%S %p",
    "%H:%M",
    "%I:%M %p",
    "%Y-%m",
    "%b %Y",
    "%B %Y",
    "%m/%d",
];

fn parse_components(text: &str) -> Option<Parsed> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    LAYOUTS.iter().find_map(|layout| {
        let mut parsed = Parsed::new();
        parse(&mut parsed, trimmed, StrftimeItems::new(layout))
            .ok()
            .map(|_| parsed)
    })
}

fn complete(parsed: &Parsed, stamp: &DefaultStamp) -> Option<NaiveDateTime> {
    let year = parsed.year.unwrap_or(stamp.year);
    let month = parsed.month.unwrap_or(stamp.month);
    let day = parsed.day.unwrap_or(stamp.day);
    let hour = match (parsed.hour_div_12, parsed.hour_mod_12) {
        (Some(div), Some(rem)) => div * 12 + rem,
        (None, Some(rem)) => rem,
        _ => stamp.hour,
    };
    let minute = parsed.minute.unwrap_or(stamp.minute);
    let second = parsed.second.unwrap_or(stamp.second);
    let nanosecond = parsed.nanosecond.unwrap_or(0);
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_nano_opt(hour, minute, second, nanosecond)
}

/// Parses `text` with any supported layout, filling unspecified components
/// from `stamp`. Returns `None` when no layout matches or the completed value
/// is not a valid calendar date/time.
pub fn parse_with_default(text: &str, stamp: &DefaultStamp) -> Option<NaiveDateTime> {
    let parsed = parse_components(text)?;
    complete(&parsed, stamp)
}

/// The pair of readings of one value, one per default stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalReading {
    first: NaiveDateTime,
    second: NaiveDateTime,
}

impl TemporalReading {
    pub fn read(text: &str) -> Option<Self> {
        Self::read_with(text, &FIRST_STAMP, &SECOND_STAMP)
    }

    pub fn read_with(text: &str, first: &DefaultStamp, second: &DefaultStamp) -> Option<Self> {
        let parsed = parse_components(text)?;
        Some(Self {
            first: complete(&parsed, first)?,
            second: complete(&parsed, second)?,
        })
    }

    pub fn date_specified(&self) -> bool {
        self.first.date() == self.second.date()
    }

    pub fn time_specified(&self) -> bool {
        self.first.time() == self.second.time()
    }

    /// The reading completed with the first stamp.
    pub fn value(&self) -> NaiveDateTime {
        self.first
    }
}
