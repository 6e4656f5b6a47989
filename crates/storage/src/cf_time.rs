//! Decoding of CF-convention time coordinates (`"<unit> since <epoch>"`).

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CfTimeError {
    #[error("missing time units")]
    MissingUnits,

    #[error("unsupported time units: {0}")]
    UnsupportedUnits(String),

    #[error("unsupported calendar: {0}")]
    UnsupportedCalendar(String),

    #[error("invalid epoch: {0}")]
    InvalidEpoch(String),

    #[error("time value out of range: {0}")]
    OutOfRange(String),
}

const NS_PER_MS: i64 = 1_000_000;

/// Parsed `units` attribute of a time variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeUnits {
    /// Length of one unit in nanoseconds.
    pub step_ns: i64,
    pub epoch: DateTime<Utc>,
}

impl TimeUnits {
    /// Parse a CF `units` string such as `"hours since 2024-01-01 00:00:00"`.
    pub fn parse(units: &str) -> Result<Self, CfTimeError> {
        let (unit, epoch) = units
            .split_once(" since ")
            .ok_or_else(|| CfTimeError::UnsupportedUnits(units.to_string()))?;

        let step_ns = match unit.trim().to_lowercase().as_str() {
            "days" | "day" | "d" => 86_400_000_000_000,
            "hours" | "hour" | "hr" | "h" => 3_600_000_000_000,
            "minutes" | "minute" | "min" => 60_000_000_000,
            "seconds" | "second" | "sec" | "s" => 1_000_000_000,
            "milliseconds" | "millisecond" | "ms" => NS_PER_MS,
            "microseconds" | "microsecond" | "us" => 1_000,
            "nanoseconds" | "nanosecond" | "ns" => 1,
            other => return Err(CfTimeError::UnsupportedUnits(other.to_string())),
        };

        Ok(Self {
            step_ns,
            epoch: parse_epoch(epoch.trim())?,
        })
    }

    /// Convert an integer coordinate value to a timestamp without going
    /// through floating point.
    pub fn decode_i64(&self, value: i64) -> Result<DateTime<Utc>, CfTimeError> {
        self.offset(value)
            .and_then(|offset| self.epoch.checked_add_signed(offset))
            .ok_or_else(|| CfTimeError::OutOfRange(value.to_string()))
    }

    /// Convert a floating point coordinate value to a timestamp, rounding the
    /// fractional unit to the nearest nanosecond.
    pub fn decode(&self, value: f64) -> Result<DateTime<Utc>, CfTimeError> {
        let out_of_range = || CfTimeError::OutOfRange(value.to_string());
        if !value.is_finite() || value.abs() >= i64::MAX as f64 {
            return Err(out_of_range());
        }

        let whole = value.trunc();
        let fraction_ns = ((value - whole) * self.step_ns as f64).round() as i64;
        self.offset(whole as i64)
            .and_then(|offset| offset.checked_add(&Duration::nanoseconds(fraction_ns)))
            .and_then(|offset| self.epoch.checked_add_signed(offset))
            .ok_or_else(out_of_range)
    }

    /// `count` units as a duration; `None` on overflow.
    fn offset(&self, count: i64) -> Option<Duration> {
        // whole-millisecond units keep the wider millisecond range
        if self.step_ns % NS_PER_MS == 0 {
            Duration::try_milliseconds(count.checked_mul(self.step_ns / NS_PER_MS)?)
        } else {
            Some(Duration::nanoseconds(count.checked_mul(self.step_ns)?))
        }
    }
}

/// Calendars whose dates map 1:1 onto the proleptic Gregorian calendar.
pub fn check_calendar(calendar: Option<&str>) -> Result<(), CfTimeError> {
    match calendar.map(str::to_lowercase).as_deref() {
        None | Some("standard") | Some("gregorian") | Some("proleptic_gregorian") => Ok(()),
        Some(other) => Err(CfTimeError::UnsupportedCalendar(other.to_string())),
    }
}

fn parse_epoch(s: &str) -> Result<DateTime<Utc>, CfTimeError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = s
        .trim_end_matches(" UTC")
        .trim_end_matches('Z')
        .trim_end_matches("+00:00")
        .trim();

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(naive, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| Utc.from_utc_datetime(&ndt))
        .ok_or_else(|| CfTimeError::InvalidEpoch(s.to_string()))
}
