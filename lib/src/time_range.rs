/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use chrono::{
    DateTime, Datelike, DurationRound, Months, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    dsl::{Query, RangeBounds},
    interval::FixedInterval,
};

pub const DEFAULT_START_TIME: &str = "now-1y";
pub const DEFAULT_END_TIME: &str = "now";

const NAIVE_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    // As shown by the date picker.
    "%b %d, %Y @ %H:%M:%S%.f",
];

/// Start and end of the selected time range, as entered by the user:
/// absolute timestamps or date math such as `now-15m`.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start_time: String,
    pub end_time: String,
}

impl TimeRange {
    pub fn new<S: Into<String>, E: Into<String>>(start_time: S, end_time: E) -> Self {
        Self {
            start_time: start_time.into(),
            end_time: end_time.into(),
        }
    }

    /// Range clause on `field`. The expressions are passed on as-is; the
    /// search engine resolves date math itself.
    pub fn clause(&self, field: &str) -> Query {
        Query::range(
            field,
            RangeBounds {
                gte: Some(Value::String(self.start_time.clone())),
                lte: Some(Value::String(self.end_time.clone())),
                ..RangeBounds::default()
            },
        )
    }

    pub fn resolve(
        &self,
        now: DateTime<Utc>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), TimeParseError> {
        Ok((
            resolve_time(&self.start_time, now)?,
            resolve_time(&self.end_time, now)?,
        ))
    }

    pub fn min_fixed_interval(&self) -> FixedInterval {
        min_fixed_interval(&self.start_time, &self.end_time)
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::new(DEFAULT_START_TIME, DEFAULT_END_TIME)
    }
}

/// Smallest histogram bucket interval for the time range, relative to the
/// current time.
pub fn min_fixed_interval(start_time: &str, end_time: &str) -> FixedInterval {
    min_fixed_interval_at(start_time, end_time, Utc::now())
}

pub fn min_fixed_interval_at(
    start_time: &str,
    end_time: &str,
    now: DateTime<Utc>,
) -> FixedInterval {
    if start_time.is_empty() || end_time.is_empty() {
        return FixedInterval::default();
    }
    match (resolve_time(start_time, now), resolve_time(end_time, now)) {
        (Ok(start), Ok(end)) => FixedInterval::for_seconds(end.timestamp() - start.timestamp()),
        (Err(e), _) | (_, Err(e)) => {
            log::warn!("cannot resolve time range '{start_time}' - '{end_time}': {e}");
            FixedInterval::default()
        }
    }
}

/// Resolve an absolute timestamp or a date math expression (`now-1y`,
/// `now/d`, `2020-10-15||+1M/M`). Timestamps without an offset are UTC.
pub fn resolve_time(expr: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, TimeParseError> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(TimeParseError::Empty);
    }

    let (anchor, math) = if let Some(math) = expr.strip_prefix("now") {
        (now, math)
    } else if let Some((date, math)) = expr.split_once("||") {
        (parse_absolute(date)?, math)
    } else {
        (parse_absolute(expr)?, "")
    };

    apply_math(anchor, math)
}

fn parse_absolute(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    if let Some(t) = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
    {
        return Ok(t.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
        .ok_or_else(|| TimeParseError::InvalidDate(s.to_string()))
}

fn apply_math(mut t: DateTime<Utc>, math: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let mut rest = math;
    while let Some(op) = rest.chars().next() {
        rest = &rest[op.len_utf8()..];
        match op {
            '/' => {
                let (unit, tail) = TimeUnit::split(rest)?;
                t = unit.round_down(t)?;
                rest = tail;
            }
            '+' | '-' => {
                let digits = rest
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(rest.len());
                let n = match digits {
                    0 => 1,
                    _ => rest[..digits]
                        .parse::<i64>()
                        .map_err(|_| TimeParseError::OutOfRange)?,
                };
                let (unit, tail) = TimeUnit::split(&rest[digits..])?;
                t = unit.add(t, if op == '-' { -n } else { n })?;
                rest = tail;
            }
            _ => return Err(TimeParseError::InvalidMath(math.to_string())),
        }
    }
    Ok(t)
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
enum TimeUnit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl TimeUnit {
    fn split(s: &str) -> Result<(Self, &str), TimeParseError> {
        if let Some(rest) = s.strip_prefix("ms") {
            return Ok((Self::Millisecond, rest));
        }
        let c = s.chars().next().ok_or(TimeParseError::MissingUnit)?;
        let unit = match c {
            'y' => Self::Year,
            'M' => Self::Month,
            'w' => Self::Week,
            'd' => Self::Day,
            'h' | 'H' => Self::Hour,
            'm' => Self::Minute,
            's' => Self::Second,
            _ => return Err(TimeParseError::InvalidUnit(s.to_string())),
        };
        Ok((unit, &s[c.len_utf8()..]))
    }

    fn add(self, t: DateTime<Utc>, n: i64) -> Result<DateTime<Utc>, TimeParseError> {
        let delta = match self {
            Self::Year => {
                let months = n.checked_mul(12).ok_or(TimeParseError::OutOfRange)?;
                return add_months(t, months);
            }
            Self::Month => return add_months(t, n),
            Self::Week => TimeDelta::try_weeks(n),
            Self::Day => TimeDelta::try_days(n),
            Self::Hour => TimeDelta::try_hours(n),
            Self::Minute => TimeDelta::try_minutes(n),
            Self::Second => TimeDelta::try_seconds(n),
            Self::Millisecond => TimeDelta::try_milliseconds(n),
        };
        delta
            .and_then(|delta| t.checked_add_signed(delta))
            .ok_or(TimeParseError::OutOfRange)
    }

    fn round_down(self, t: DateTime<Utc>) -> Result<DateTime<Utc>, TimeParseError> {
        match self {
            Self::Year => Utc
                .with_ymd_and_hms(t.year(), 1, 1, 0, 0, 0)
                .single()
                .ok_or(TimeParseError::OutOfRange),
            Self::Month => Utc
                .with_ymd_and_hms(t.year(), t.month(), 1, 0, 0, 0)
                .single()
                .ok_or(TimeParseError::OutOfRange),
            // Weeks start on Sunday.
            Self::Week => {
                let day = t
                    .duration_trunc(TimeDelta::days(1))
                    .map_err(|_| TimeParseError::OutOfRange)?;
                day.checked_sub_signed(TimeDelta::days(
                    t.weekday().num_days_from_sunday() as i64,
                ))
                .ok_or(TimeParseError::OutOfRange)
            }
            Self::Day => truncate(t, TimeDelta::days(1)),
            Self::Hour => truncate(t, TimeDelta::hours(1)),
            Self::Minute => truncate(t, TimeDelta::minutes(1)),
            Self::Second => truncate(t, TimeDelta::seconds(1)),
            Self::Millisecond => truncate(t, TimeDelta::milliseconds(1)),
        }
    }
}

fn truncate(t: DateTime<Utc>, unit: TimeDelta) -> Result<DateTime<Utc>, TimeParseError> {
    t.duration_trunc(unit).map_err(|_| TimeParseError::OutOfRange)
}

fn add_months(t: DateTime<Utc>, n: i64) -> Result<DateTime<Utc>, TimeParseError> {
    let months = u32::try_from(n.unsigned_abs())
        .map(Months::new)
        .map_err(|_| TimeParseError::OutOfRange)?;
    if n < 0 {
        t.checked_sub_months(months)
    } else {
        t.checked_add_months(months)
    }
    .ok_or(TimeParseError::OutOfRange)
}

#[derive(thiserror::Error, PartialEq, Eq, Debug)]
pub enum TimeParseError {
    #[error("empty time expression")]
    Empty,
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("invalid date math: {0}")]
    InvalidMath(String),
    #[error("missing time unit")]
    MissingUnit,
    #[error("invalid time unit: {0}")]
    InvalidUnit(String),
    #[error("time out of range")]
    OutOfRange,
}
