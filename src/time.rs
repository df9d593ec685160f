//! Configured durations measured on the trading clock

use chrono::Duration;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeIntervalError {
    #[error("time interval must be positive, got {0} ms")]
    NotPositive(i64),

    #[error("time interval {0} is out of range")]
    OutOfRange(String),

    #[error("invalid time interval '{0}': expected a number followed by ms, s, m, h or d")]
    Invalid(String),
}

/// A strictly positive duration such as the maximum time an order may stay open.
///
/// Parsed from and printed as compact strings: `500ms`, `90s`, `10m`, `1h`, `2d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeInterval(Duration);

const UNITS: &[(&str, i64)] = &[
    ("d", 86_400_000),
    ("h", 3_600_000),
    ("m", 60_000),
    ("s", 1_000),
    ("ms", 1),
];

impl TimeInterval {
    pub fn from_duration(duration: Duration) -> Result<Self, TimeIntervalError> {
        let ms = duration.num_milliseconds();
        if ms <= 0 {
            return Err(TimeIntervalError::NotPositive(ms));
        }
        Ok(TimeInterval(duration))
    }

    pub fn millis(ms: i64) -> Result<Self, TimeIntervalError> {
        Self::from_duration(Duration::milliseconds(ms))
    }

    pub fn seconds(s: i64) -> Result<Self, TimeIntervalError> {
        Self::scaled(s, 1_000)
    }

    pub fn minutes(m: i64) -> Result<Self, TimeIntervalError> {
        Self::scaled(m, 60_000)
    }

    pub fn hours(h: i64) -> Result<Self, TimeIntervalError> {
        Self::scaled(h, 3_600_000)
    }

    pub fn days(d: i64) -> Result<Self, TimeIntervalError> {
        Self::scaled(d, 86_400_000)
    }

    fn scaled(amount: i64, unit_ms: i64) -> Result<Self, TimeIntervalError> {
        let ms = amount
            .checked_mul(unit_ms)
            .ok_or_else(|| TimeIntervalError::OutOfRange(format!("{amount} x {unit_ms}ms")))?;
        Self::millis(ms)
    }

    pub fn duration(&self) -> Duration {
        self.0
    }

    pub fn as_millis(&self) -> i64 {
        self.0.num_milliseconds()
    }

    /// Half of this interval, truncated to whole milliseconds.
    ///
    /// Returned as a bare `Duration`: half of a 1ms interval is zero, which is not a
    /// valid `TimeInterval` but is still a valid threshold.
    pub fn half(&self) -> Duration {
        Duration::milliseconds(self.as_millis() / 2)
    }
}

impl Default for TimeInterval {
    fn default() -> Self {
        TimeInterval(Duration::minutes(10))
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.as_millis();
        for (suffix, unit_ms) in UNITS {
            if ms % unit_ms == 0 {
                return write!(f, "{}{}", ms / unit_ms, suffix);
            }
        }
        write!(f, "{ms}ms")
    }
}

impl FromStr for TimeInterval {
    type Err = TimeIntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| TimeIntervalError::Invalid(s.to_string()))?;
        let (amount, suffix) = s.split_at(split);
        let amount: i64 = amount
            .parse()
            .map_err(|_| TimeIntervalError::Invalid(s.to_string()))?;
        let unit_ms = UNITS
            .iter()
            .find(|(name, _)| *name == suffix)
            .map(|(_, unit_ms)| *unit_ms)
            .ok_or_else(|| TimeIntervalError::Invalid(s.to_string()))?;
        Self::scaled(amount, unit_ms)
    }
}

impl Serialize for TimeInterval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeInterval {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_ten_minutes() {
        assert_eq!(TimeInterval::default(), TimeInterval::minutes(10).unwrap());
        assert_eq!(TimeInterval::default().as_millis(), 600_000);
    }

    #[test]
    fn test_rejects_non_positive() {
        assert_eq!(
            TimeInterval::minutes(0),
            Err(TimeIntervalError::NotPositive(0))
        );
        assert!(TimeInterval::seconds(-5).is_err());
    }

    #[test]
    fn test_parse_units() {
        assert_eq!("500ms".parse::<TimeInterval>().unwrap().as_millis(), 500);
        assert_eq!("90s".parse::<TimeInterval>().unwrap().as_millis(), 90_000);
        assert_eq!("10m".parse::<TimeInterval>().unwrap().as_millis(), 600_000);
        assert_eq!("1h".parse::<TimeInterval>().unwrap().as_millis(), 3_600_000);
        assert_eq!("2d".parse::<TimeInterval>().unwrap().as_millis(), 172_800_000);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<TimeInterval>().is_err());
        assert!("10".parse::<TimeInterval>().is_err());
        assert!("m".parse::<TimeInterval>().is_err());
        assert!("10w".parse::<TimeInterval>().is_err());
        assert!("0m".parse::<TimeInterval>().is_err());
    }

    #[test]
    fn test_display_uses_largest_whole_unit() {
        assert_eq!(TimeInterval::minutes(10).unwrap().to_string(), "10m");
        assert_eq!(TimeInterval::seconds(90).unwrap().to_string(), "90s");
        assert_eq!(TimeInterval::hours(24).unwrap().to_string(), "1d");
        assert_eq!(TimeInterval::millis(1500).unwrap().to_string(), "1500ms");
    }

    #[test]
    fn test_half() {
        assert_eq!(TimeInterval::minutes(10).unwrap().half(), Duration::minutes(5));
        assert_eq!(TimeInterval::millis(1).unwrap().half(), Duration::zero());
    }

    #[test]
    fn test_serde_round_trip_through_string() {
        let json = serde_json::to_string(&TimeInterval::minutes(10).unwrap()).unwrap();
        assert_eq!(json, "\"10m\"");
        let back: TimeInterval = serde_json::from_str("\"15s\"").unwrap();
        assert_eq!(back, TimeInterval::seconds(15).unwrap());
    }
}
