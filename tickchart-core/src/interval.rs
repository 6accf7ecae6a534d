//! Timeframe interval resolution and bucket alignment.
//!
//! An [`Interval`] is parsed from a timeframe token such as `"15m"` or `"1h"`
//! and knows how to align raw tick timestamps to candle bucket boundaries.

use crate::error::ChartError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A candle timeframe, stored as a duration in seconds.
///
/// Unparseable tokens surface [`ChartError::InvalidInterval`] rather than
/// silently defaulting - callers decide how to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Interval {
    secs: i64,
    magnitude: u32,
    unit: IntervalUnit,
}

/// Supported timeframe units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum IntervalUnit {
    Minute,
    Hour,
    Day,
    Week,
}

impl IntervalUnit {
    /// Duration of one unit in seconds.
    pub const fn secs(&self) -> i64 {
        match self {
            IntervalUnit::Minute => 60,
            IntervalUnit::Hour => 60 * 60,
            IntervalUnit::Day => 60 * 60 * 24,
            IntervalUnit::Week => 60 * 60 * 24 * 7,
        }
    }

    /// Unit suffix as it appears in a timeframe token.
    pub fn suffix(&self) -> char {
        match self {
            IntervalUnit::Minute => 'm',
            IntervalUnit::Hour => 'h',
            IntervalUnit::Day => 'd',
            IntervalUnit::Week => 'w',
        }
    }

    fn from_suffix(c: char) -> Option<Self> {
        match c {
            'm' => Some(IntervalUnit::Minute),
            'h' => Some(IntervalUnit::Hour),
            'd' => Some(IntervalUnit::Day),
            'w' => Some(IntervalUnit::Week),
            _ => None,
        }
    }
}

impl Interval {
    /// Construct an interval from a magnitude and unit.
    ///
    /// Zero magnitudes are rejected: a zero-duration bucket cannot align.
    pub fn new(magnitude: u32, unit: IntervalUnit) -> Result<Self, ChartError> {
        if magnitude == 0 {
            return Err(ChartError::InvalidInterval(format!(
                "0{}",
                unit.suffix()
            )));
        }
        Ok(Self::from_parts(magnitude, unit))
    }

    const fn from_parts(magnitude: u32, unit: IntervalUnit) -> Self {
        Self {
            secs: magnitude as i64 * unit.secs(),
            magnitude,
            unit,
        }
    }

    /// One minute.
    pub const fn m1() -> Self {
        Self::from_parts(1, IntervalUnit::Minute)
    }

    /// Five minutes.
    pub const fn m5() -> Self {
        Self::from_parts(5, IntervalUnit::Minute)
    }

    /// Fifteen minutes.
    pub const fn m15() -> Self {
        Self::from_parts(15, IntervalUnit::Minute)
    }

    /// One hour.
    pub const fn h1() -> Self {
        Self::from_parts(1, IntervalUnit::Hour)
    }

    /// Four hours.
    pub const fn h4() -> Self {
        Self::from_parts(4, IntervalUnit::Hour)
    }

    /// One day.
    pub const fn d1() -> Self {
        Self::from_parts(1, IntervalUnit::Day)
    }

    /// One week.
    pub const fn w1() -> Self {
        Self::from_parts(1, IntervalUnit::Week)
    }

    /// The common selectable timeframes, in ascending order.
    pub fn all() -> [Interval; 7] {
        [
            Self::m1(),
            Self::m5(),
            Self::m15(),
            Self::h1(),
            Self::h4(),
            Self::d1(),
            Self::w1(),
        ]
    }

    /// Duration of one candle bucket in seconds.
    pub fn secs(&self) -> i64 {
        self.secs
    }

    /// Floor-align a unix timestamp (seconds) to the start of its bucket.
    pub fn bucket_start(&self, unix_secs: i64) -> i64 {
        unix_secs.div_euclid(self.secs) * self.secs
    }
}

impl FromStr for Interval {
    type Err = ChartError;

    /// Parse a timeframe token: a leading integer magnitude followed by a
    /// single unit character in `{m, h, d, w}`.
    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let invalid = || ChartError::InvalidInterval(token.to_string());

        let mut chars = token.chars();
        let suffix = chars.next_back().ok_or_else(invalid)?;
        let unit = IntervalUnit::from_suffix(suffix).ok_or_else(invalid)?;

        let magnitude = chars
            .as_str()
            .parse::<u32>()
            .map_err(|_| invalid())?;

        Interval::new(magnitude, unit).map_err(|_| invalid())
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.magnitude, self.unit.suffix())
    }
}
