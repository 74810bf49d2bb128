use crate::error::{Error, Result};
use chrono::{DateTime, TimeDelta, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;

const MINUTE: f64 = 60.0;
const HOUR: f64 = MINUTE * 60.0;
const DAY: f64 = HOUR * 24.0;
const WEEK: f64 = DAY * 7.0;
const YEAR: f64 = DAY * 365.25;

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^([+-])? ?(\d+|\d*\.\d+) ?(seconds?|secs?|s|minutes?|mins?|m|hours?|hrs?|h|days?|d|weeks?|w|years?|yrs?|y)(?: (ago|from now))?$",
    )
    .expect("duration pattern is valid")
});

/// Token expiration input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// Absolute instant.
    At(DateTime<Utc>),
    /// Absolute Unix timestamp in seconds.
    Timestamp(i64),
    /// Offset from the time of issue; negative offsets lie in the past.
    In(TimeDelta),
}

impl Default for Expiration {
    fn default() -> Self {
        Self::In(TimeDelta::hours(1))
    }
}

impl Expiration {
    /// Returns the absolute Unix timestamp relative to `now`.
    pub fn resolve(&self, now: i64) -> i64 {
        match self {
            Expiration::At(instant) => instant.timestamp(),
            Expiration::Timestamp(timestamp) => *timestamp,
            Expiration::In(delta) => now.saturating_add(delta.num_seconds()),
        }
    }
}

impl From<DateTime<Utc>> for Expiration {
    fn from(value: DateTime<Utc>) -> Self {
        Self::At(value)
    }
}

impl From<TimeDelta> for Expiration {
    fn from(value: TimeDelta) -> Self {
        Self::In(value)
    }
}

impl From<i64> for Expiration {
    fn from(value: i64) -> Self {
        Self::Timestamp(value)
    }
}

impl FromStr for Expiration {
    type Err = Error;

    /// Parses durations such as `2 hours`, `30m`, `1.5 days from now` or `-10s`.
    fn from_str(value: &str) -> Result<Self> {
        let secs = parse_seconds(value)?;
        TimeDelta::try_seconds(secs)
            .map(Self::In)
            .ok_or_else(|| Error::InvalidExpiration(format!("time period out of range: `{value}`")))
    }
}

impl TryFrom<&str> for Expiration {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        value.parse()
    }
}

fn parse_seconds(value: &str) -> Result<i64> {
    let invalid = || Error::InvalidExpiration(format!("invalid time period format: `{value}`"));
    let captures = DURATION_RE.captures(value.trim()).ok_or_else(invalid)?;

    let negative_sign = captures.get(1).is_some_and(|m| m.as_str() == "-");
    let suffix = captures.get(4).map(|m| m.as_str().to_ascii_lowercase());
    if negative_sign && suffix.is_some() {
        return Err(Error::InvalidExpiration(format!(
            "ambiguous time period sign: `{value}`"
        )));
    }

    let amount: f64 = captures[2].parse().map_err(|_| invalid())?;
    let unit = match captures[3].to_ascii_lowercase().as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        "m" | "min" | "mins" | "minute" | "minutes" => MINUTE,
        "h" | "hr" | "hrs" | "hour" | "hours" => HOUR,
        "d" | "day" | "days" => DAY,
        "w" | "week" | "weeks" => WEEK,
        _ => YEAR,
    };

    let seconds = (amount * unit).round();
    if !seconds.is_finite() || seconds > i64::MAX as f64 {
        return Err(invalid());
    }
    let seconds = seconds as i64;
    if negative_sign || suffix.as_deref() == Some("ago") {
        Ok(-seconds)
    } else {
        Ok(seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(value: &str) -> i64 {
        match value.parse::<Expiration>().unwrap() {
            Expiration::In(delta) => delta.num_seconds(),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_should_accept_unit_aliases() {
        assert_eq!(secs("1 second"), 1);
        assert_eq!(secs("30s"), 30);
        assert_eq!(secs("2 mins"), 120);
        assert_eq!(secs("2h"), 7_200);
        assert_eq!(secs("1 day"), 86_400);
        assert_eq!(secs("1w"), 604_800);
        assert_eq!(secs("1 year"), 31_557_600);
    }

    #[test]
    fn parse_should_be_case_insensitive() {
        assert_eq!(secs("2 HOURS"), 7_200);
        assert_eq!(secs("10 Minutes From Now"), 600);
    }

    #[test]
    fn parse_should_round_fractional_amounts() {
        assert_eq!(secs("1.5 hours"), 5_400);
        assert_eq!(secs(".5s"), 1);
    }

    #[test]
    fn parse_should_negate_past_periods() {
        assert_eq!(secs("-10 seconds"), -10);
        assert_eq!(secs("10 seconds ago"), -10);
        assert_eq!(secs("+10 seconds"), 10);
    }

    #[test]
    fn parse_should_reject_ambiguous_sign() {
        assert!(matches!(
            "-1h ago".parse::<Expiration>(),
            Err(Error::InvalidExpiration(_))
        ));
        assert!("-1h from now".parse::<Expiration>().is_err());
    }

    #[test]
    fn parse_should_reject_unknown_units() {
        assert!("3 fortnights".parse::<Expiration>().is_err());
        assert!("soon".parse::<Expiration>().is_err());
    }

    #[test]
    fn resolve_should_handle_each_variant() {
        let now = 1_700_000_000;
        let instant = DateTime::from_timestamp(1_800_000_000, 0).unwrap();

        assert_eq!(Expiration::At(instant).resolve(now), 1_800_000_000);
        assert_eq!(Expiration::Timestamp(42).resolve(now), 42);
        assert_eq!(Expiration::default().resolve(now), now + 3_600);
    }
}
