/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::{fmt::Display, str::FromStr};

use chrono::TimeDelta;
use serde_with::{DeserializeFromStr, SerializeDisplay};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// Upper bounds (inclusive, in seconds) of the time range spans for which
/// each bucket interval is used. Anything longer gets a yearly bucket.
const LADDER: [(i64, FixedInterval); 7] = [
    (1, FixedInterval::I1ms),
    (MINUTE, FixedInterval::I1s),
    (HOUR, FixedInterval::I1m),
    (DAY, FixedInterval::I1h),
    (7 * DAY, FixedInterval::I1d),
    (31 * DAY, FixedInterval::I7d),
    (366 * DAY, FixedInterval::I30d),
];

/// Bucket interval for a date histogram over the selected time range.
#[derive(
    SerializeDisplay,
    DeserializeFromStr,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Default,
    Clone,
    Copy,
    Debug,
)]
pub enum FixedInterval {
    I1ms,
    I1s,
    I1m,
    I1h,
    I1d,
    I7d,
    I30d,
    I365d,
    /// Used when the time range is unknown.
    #[default]
    Minute,
}

impl FixedInterval {
    /// Smallest interval suitable for a range of `seconds`. Negative spans
    /// get the finest interval.
    pub fn for_seconds(seconds: i64) -> Self {
        LADDER
            .iter()
            .find(|(max, _)| seconds <= *max)
            .map_or(Self::I365d, |(_, interval)| *interval)
    }

    pub fn to_time_delta(self) -> TimeDelta {
        match self {
            Self::I1ms => TimeDelta::milliseconds(1),
            Self::I1s => TimeDelta::seconds(1),
            Self::I1m | Self::Minute => TimeDelta::minutes(1),
            Self::I1h => TimeDelta::hours(1),
            Self::I1d => TimeDelta::days(1),
            Self::I7d => TimeDelta::days(7),
            Self::I30d => TimeDelta::days(30),
            Self::I365d => TimeDelta::days(365),
        }
    }
}

impl Display for FixedInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::I1ms => write!(f, "1ms"),
            Self::I1s => write!(f, "1s"),
            Self::I1m => write!(f, "1m"),
            Self::I1h => write!(f, "1h"),
            Self::I1d => write!(f, "1d"),
            Self::I7d => write!(f, "7d"),
            Self::I30d => write!(f, "30d"),
            Self::I365d => write!(f, "365d"),
            Self::Minute => write!(f, "minute"),
        }
    }
}

impl FromStr for FixedInterval {
    type Err = InvalidInterval;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1ms" => Ok(Self::I1ms),
            "1s" => Ok(Self::I1s),
            "1m" => Ok(Self::I1m),
            "1h" => Ok(Self::I1h),
            "1d" => Ok(Self::I1d),
            "7d" => Ok(Self::I7d),
            "30d" => Ok(Self::I30d),
            "365d" => Ok(Self::I365d),
            "minute" => Ok(Self::Minute),
            _ => Err(InvalidInterval),
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("expected '1ms', '1s', '1m', '1h', '1d', '7d', '30d', '365d' or 'minute'")]
pub struct InvalidInterval;
