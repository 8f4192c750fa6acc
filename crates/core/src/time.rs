// Microsecond time values and half-open target/source ranges.
//
// Human time strings are decimal seconds with an `s` suffix ("1.5s");
// bare integers (numeric or string) are already microseconds.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DraftError;

/// One second in microseconds.
pub const SEC: u64 = 1_000_000;

const MICROS_DIGITS: usize = 6;

/// A time as it appears in a request: `"1.5s"`, `"1500000"`, or `1500000`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeValue {
    Micros(u64),
    Text(String),
}

impl TimeValue {
    pub fn micros(&self) -> Result<u64, DraftError> {
        match self {
            Self::Micros(us) => Ok(*us),
            Self::Text(text) => parse(text),
        }
    }
}

impl From<u64> for TimeValue {
    fn from(us: u64) -> Self {
        Self::Micros(us)
    }
}

impl From<&str> for TimeValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Parse a time string into microseconds.
///
/// `"<decimal>s"` is seconds, truncated to whole microseconds. A bare
/// unsigned integer is taken as microseconds. Anything else (signs,
/// exponents, other units, empty input) is `InvalidTimeFormat`.
pub fn parse(input: &str) -> Result<u64, DraftError> {
    let invalid = || DraftError::InvalidTimeFormat(input.to_string());
    let trimmed = input.trim();

    let Some(seconds) = trimmed.strip_suffix('s').or_else(|| trimmed.strip_suffix('S')) else {
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        return trimmed.parse::<u64>().map_err(|_| invalid());
    };

    let (whole, fraction) = match seconds.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (seconds, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let whole_us = if whole.is_empty() {
        0
    } else {
        whole.parse::<u64>().map_err(|_| invalid())?.checked_mul(SEC).ok_or_else(invalid)?
    };

    // Digits past microsecond precision are dropped, not rounded.
    let mut fraction_us = 0u64;
    for (i, digit) in fraction.bytes().take(MICROS_DIGITS).enumerate() {
        fraction_us += u64::from(digit - b'0') * 10u64.pow((MICROS_DIGITS - 1 - i) as u32);
    }

    whole_us.checked_add(fraction_us).ok_or_else(invalid)
}

/// Format microseconds as the shortest exact seconds string (`"1.5s"`).
pub fn format(us: u64) -> String {
    let whole = us / SEC;
    let fraction = us % SEC;
    if fraction == 0 {
        return format!("{whole}s");
    }
    let digits = format!("{fraction:06}");
    format!("{whole}.{}s", digits.trim_end_matches('0'))
}

/// A half-open interval `[start, start + duration)` in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: u64,
    pub duration: u64,
}

impl TimeRange {
    pub fn new(start: u64, duration: u64) -> Self {
        Self { start, duration }
    }

    /// Build a range from two request values (`"1s"`, `1000000`, ...).
    pub fn from_values(start: &TimeValue, duration: &TimeValue) -> Result<Self, DraftError> {
        Ok(Self::new(start.micros()?, duration.micros()?))
    }

    /// Build a range from two time strings.
    pub fn parse(start: &str, duration: &str) -> Result<Self, DraftError> {
        Ok(Self::new(parse(start)?, parse(duration)?))
    }

    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.duration)
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        !(self.end() <= other.start || other.end() <= self.start)
    }

    /// Same duration, moved to a new start.
    pub fn at(&self, start: u64) -> Self {
        Self::new(start, self.duration)
    }
}

impl Ord for TimeRange {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.start, self.end()).cmp(&(other.start, other.end()))
    }
}

impl PartialOrd for TimeRange {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", format(self.start), format(self.end()))
    }
}
