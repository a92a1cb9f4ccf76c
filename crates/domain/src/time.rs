//! Time-of-day values and parsing of rendered time text.
//!
//! The schedule domain is a single 24-hour cycle. [`TimeOfDay`] counts
//! seconds since midnight and, unlike [`NaiveTime`], can represent
//! [`TimeOfDay::END_OF_DAY`] (24:00:00), the exclusive upper bound of the day.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ResolutionError;

/// Local wall-clock instant, always supplied by the caller.
pub type Timestamp = NaiveDateTime;

const SECONDS_PER_DAY: u32 = 86_400;

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A point within one logical day, with second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u32);

impl TimeOfDay {
    /// 00:00:00, the inclusive lower bound of the day.
    pub const START_OF_DAY: Self = Self(0);
    /// 24:00:00, the exclusive upper bound of the day.
    pub const END_OF_DAY: Self = Self(SECONDS_PER_DAY);

    /// Build from clock fields. `24:00:00` is accepted as [`Self::END_OF_DAY`].
    #[must_use]
    pub fn from_hms(hour: u32, minute: u32, second: u32) -> Option<Self> {
        if (hour, minute, second) == (24, 0, 0) {
            return Some(Self::END_OF_DAY);
        }
        (hour < 24 && minute < 60 && second < 60)
            .then_some(Self(hour * 3600 + minute * 60 + second))
    }

    #[must_use]
    pub fn from_seconds(seconds: u32) -> Option<Self> {
        (seconds <= SECONDS_PER_DAY).then_some(Self(seconds))
    }

    #[must_use]
    pub const fn as_seconds(self) -> u32 {
        self.0
    }

    /// Sub-second precision is dropped.
    #[must_use]
    pub fn from_naive_time(time: NaiveTime) -> Self {
        Self(time.num_seconds_from_midnight())
    }

    /// The time-of-day component of a timestamp.
    #[must_use]
    pub fn of(timestamp: Timestamp) -> Self {
        Self::from_naive_time(timestamp.time())
    }

    #[must_use]
    pub const fn is_end_of_day(self) -> bool {
        self.0 == SECONDS_PER_DAY
    }

    /// Combine with a calendar day. [`Self::END_OF_DAY`] lands on the next day's midnight.
    #[must_use]
    pub fn on(self, day: NaiveDate) -> Timestamp {
        day.and_time(NaiveTime::MIN) + TimeDelta::seconds(i64::from(self.0))
    }

    /// Shift by `offset` in full datetime space anchored on `day`, then drop the date.
    ///
    /// An offset may push the result past midnight in either direction.
    #[must_use]
    pub fn shifted(self, day: NaiveDate, offset: TimeDelta) -> Self {
        Self::of(self.on(day) + offset)
    }

    /// Human-facing rendering: `HH:MM:SS`, or `midnight` for the end of the day.
    #[must_use]
    pub fn friendly(self) -> String {
        if self.is_end_of_day() {
            "midnight".to_string()
        } else {
            self.to_string()
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hour = self.0 / 3600;
        let minute = self.0 % 3600 / 60;
        let second = self.0 % 60;
        write!(f, "{hour:02}:{minute:02}:{second:02}")
    }
}

impl FromStr for TimeOfDay {
    type Err = ResolutionError;

    /// Parse `H:MM`, `HH:MM:SS` or `HH:MM:SS.fff`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ResolutionError::InvalidTime(s.to_string());
        let mut fields = s.trim().split(':');

        let hour = fields.next().and_then(parse_field).ok_or_else(invalid)?;
        let minute = fields.next().and_then(parse_field).ok_or_else(invalid)?;
        let second = match fields.next() {
            None => 0,
            Some(field) => {
                let whole = match field.split_once('.') {
                    Some((whole, fraction))
                        if !fraction.is_empty() && fraction.bytes().all(|b| b.is_ascii_digit()) =>
                    {
                        whole
                    }
                    Some(_) => return Err(invalid()),
                    None => field,
                };
                parse_field(whole).ok_or_else(invalid)?
            }
        };
        if fields.next().is_some() {
            return Err(invalid());
        }

        Self::from_hms(hour, minute, second).ok_or_else(invalid)
    }
}

fn parse_field(text: &str) -> Option<u32> {
    if text.is_empty() || text.len() > 2 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Interpret rendered template text as a time of day.
///
/// Tried in order: an RFC 3339 datetime (converted to `utc_offset`), a naive
/// ISO datetime, a plain time of day, and a Unix timestamp in seconds. The
/// date component is always discarded.
///
/// # Errors
///
/// Returns [`ResolutionError::InvalidTime`] when none of the formats match.
pub fn parse_moment(text: &str, utc_offset: FixedOffset) -> Result<TimeOfDay, ResolutionError> {
    let text = text.trim();

    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Ok(TimeOfDay::from_naive_time(
            datetime.with_timezone(&utc_offset).time(),
        ));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(TimeOfDay::of(datetime));
        }
    }
    if let Ok(time) = text.parse::<TimeOfDay>() {
        return Ok(time);
    }
    if let Some(datetime) = text.parse::<f64>().ok().and_then(from_unix_seconds) {
        return Ok(TimeOfDay::from_naive_time(
            datetime.with_timezone(&utc_offset).time(),
        ));
    }

    Err(ResolutionError::InvalidTime(text.to_string()))
}

#[allow(clippy::cast_possible_truncation)]
fn from_unix_seconds(seconds: f64) -> Option<DateTime<chrono::Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    DateTime::from_timestamp(seconds.trunc() as i64, 0)
}
