//! Interval/duration value codec.
//!
//! DuckDB stores an INTERVAL as three independent components (months, days,
//! microseconds). The host framework works with a structured duration
//! (years, months, weeks, days, hours, minutes, seconds). This module converts
//! between the two, and parses/renders the engine's textual interval form and
//! ISO 8601 durations.

use std::fmt;
use std::ops::{Add, Neg};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SECONDS_PER_MINUTE: i64 = 60;
pub const SECONDS_PER_HOUR: i64 = 3_600;
pub const SECONDS_PER_DAY: i64 = 86_400;
pub const SECONDS_PER_WEEK: i64 = 604_800;
/// 1/12 of a gregorian year
pub const SECONDS_PER_MONTH: i64 = 2_629_746;
/// 365.2425 days
pub const SECONDS_PER_YEAR: i64 = 31_556_952;

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_MINUTE: i64 = 60 * MICROS_PER_SECOND;
const MICROS_PER_HOUR: i64 = 60 * MICROS_PER_MINUTE;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntervalError {
    #[error("Invalid interval '{0}'")]
    Parse(String),

    #[error("Interval component out of range: {0}")]
    Overflow(&'static str),
}

/// Engine-native interval representation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub months: i32,
    pub days: i32,
    pub micros: i64,
}

/// Structured duration, one field per calendar/clock unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Duration {
    pub years: i64,
    pub months: i64,
    pub weeks: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: f64,
}

impl Interval {
    pub fn new(months: i32, days: i32, micros: i64) -> Self {
        Self {
            months,
            days,
            micros,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.months == 0 && self.days == 0 && self.micros == 0
    }

    /// Split the triple into calendar and clock units.
    ///
    /// Months fold into years, days stay days (the engine never produces weeks),
    /// microseconds split into hours, minutes and fractional seconds.
    pub fn to_duration(&self) -> Duration {
        let months = i64::from(self.months);
        let hours = self.micros / MICROS_PER_HOUR;
        let minutes = (self.micros % MICROS_PER_HOUR) / MICROS_PER_MINUTE;
        let micros = self.micros % MICROS_PER_MINUTE;
        Duration {
            years: months / 12,
            months: months % 12,
            weeks: 0,
            days: i64::from(self.days),
            hours,
            minutes,
            seconds: micros as f64 / MICROS_PER_SECOND as f64,
        }
    }

    /// SQL literal, e.g. `INTERVAL '2 hours 30 minutes'`.
    pub fn to_sql(&self) -> String {
        let mut parts = Vec::new();
        if self.months != 0 {
            parts.push(format!("{} months", self.months));
        }
        if self.days != 0 {
            parts.push(format!("{} days", self.days));
        }
        if self.micros != 0 || parts.is_empty() {
            parts.push(format!("{} microseconds", self.micros));
        }
        format!("INTERVAL '{}'", parts.join(" "))
    }

    /// Parse the engine's textual interval form or an ISO 8601 duration.
    ///
    /// Accepts `1 year 2 months 3 days 04:05:06.5`, `2 hours 30 minutes`,
    /// `-01:00:00` and `P1DT2H`.
    pub fn parse(text: &str) -> Result<Self, IntervalError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(IntervalError::Parse(text.to_string()));
        }
        if trimmed.starts_with('P') || trimmed.starts_with("-P") {
            return Duration::parse_iso8601(trimmed)?.to_interval();
        }

        let overflow = |what| IntervalError::Overflow(what);
        let mut months: i64 = 0;
        let mut days: i64 = 0;
        let mut micros: i64 = 0;
        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        let mut i = 0;
        while i < tokens.len() {
            let token = tokens[i];
            if token.contains(':') {
                let clock = parse_clock(token).map_err(|e| e.or_parse(text))?;
                micros = micros.checked_add(clock).ok_or(overflow("microseconds"))?;
                i += 1;
                continue;
            }
            let amount = token;
            let unit = tokens
                .get(i + 1)
                .ok_or_else(|| IntervalError::Parse(text.to_string()))?
                .to_ascii_lowercase();
            let unit = unit.trim_end_matches(',');
            let whole = || whole_amount(amount, text);
            match unit {
                "year" | "years" | "y" => {
                    let n = whole()?.checked_mul(12).ok_or(overflow("months"))?;
                    months = months.checked_add(n).ok_or(overflow("months"))?;
                }
                "month" | "months" | "mon" | "mons" => {
                    months = months.checked_add(whole()?).ok_or(overflow("months"))?;
                }
                "week" | "weeks" | "w" => {
                    let n = whole()?.checked_mul(7).ok_or(overflow("days"))?;
                    days = days.checked_add(n).ok_or(overflow("days"))?;
                }
                "day" | "days" | "d" => {
                    days = days.checked_add(whole()?).ok_or(overflow("days"))?;
                }
                other => {
                    let per_unit = match other {
                        "hour" | "hours" | "h" => MICROS_PER_HOUR,
                        "minute" | "minutes" | "min" | "mins" | "m" => MICROS_PER_MINUTE,
                        "second" | "seconds" | "sec" | "secs" | "s" => MICROS_PER_SECOND,
                        "millisecond" | "milliseconds" | "ms" => 1_000,
                        "microsecond" | "microseconds" | "us" => 1,
                        _ => return Err(IntervalError::Parse(text.to_string())),
                    };
                    let n = scaled_micros(amount, per_unit, text)?;
                    micros = micros.checked_add(n).ok_or(overflow("microseconds"))?;
                }
            }
            i += 2;
        }

        Ok(Self {
            months: i32::try_from(months).map_err(|_| overflow("months"))?,
            days: i32::try_from(days).map_err(|_| overflow("days"))?,
            micros,
        })
    }
}

impl IntervalError {
    /// Attach the full input to a parse error raised on one of its tokens.
    fn or_parse(self, text: &str) -> Self {
        match self {
            IntervalError::Parse(_) => IntervalError::Parse(text.to_string()),
            overflow => overflow,
        }
    }
}

/// Calendar units only take whole numbers; DuckDB has no fractional months or days.
fn whole_amount(amount: &str, text: &str) -> Result<i64, IntervalError> {
    match amount.parse::<i64>() {
        Ok(n) => Ok(n),
        Err(_) if amount.parse::<f64>().is_ok_and(f64::is_finite) => {
            if amount.contains(['.', 'e', 'E']) {
                Err(IntervalError::Parse(text.to_string()))
            } else {
                Err(IntervalError::Overflow("interval amount"))
            }
        }
        Err(_) => Err(IntervalError::Parse(text.to_string())),
    }
}

/// `amount` clock units in microseconds. Fractions round to the microsecond.
fn scaled_micros(amount: &str, per_unit: i64, text: &str) -> Result<i64, IntervalError> {
    if let Ok(n) = amount.parse::<i64>() {
        return n.checked_mul(per_unit).ok_or(IntervalError::Overflow("microseconds"));
    }
    let value: f64 = amount
        .parse()
        .map_err(|_| IntervalError::Parse(text.to_string()))?;
    let scaled = (value * per_unit as f64).round();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    if !scaled.is_finite() || scaled >= i64::MAX as f64 || scaled < i64::MIN as f64 {
        return Err(IntervalError::Overflow("microseconds"));
    }
    Ok(scaled as i64)
}

/// Parse `[-]HH:MM[:SS[.ffffff]]` into microseconds.
fn parse_clock(token: &str) -> Result<i64, IntervalError> {
    let invalid = || IntervalError::Parse(token.to_string());
    let overflow = || IntervalError::Overflow("microseconds");
    let (negative, body) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token.strip_prefix('+').unwrap_or(token)),
    };
    let mut fields = body.split(':');
    let hours: i64 = fields.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    let minutes: i64 = fields.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
    let seconds = match fields.next() {
        Some(s) => scaled_micros(s, MICROS_PER_SECOND, token)?,
        None => 0,
    };
    if fields.next().is_some() {
        return Err(invalid());
    }
    let total = hours
        .checked_mul(MICROS_PER_HOUR)
        .and_then(|h| minutes.checked_mul(MICROS_PER_MINUTE).and_then(|m| h.checked_add(m)))
        .and_then(|hm| hm.checked_add(seconds))
        .ok_or_else(overflow)?;
    Ok(if negative { -total } else { total })
}

impl fmt::Display for Interval {
    /// Same layout the engine prints: `1 year 2 months 3 days 04:05:06.5`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        let years = self.months / 12;
        let months = self.months % 12;
        if years != 0 {
            parts.push(format!("{} year{}", years, if years.abs() == 1 { "" } else { "s" }));
        }
        if months != 0 {
            parts.push(format!("{} month{}", months, if months.abs() == 1 { "" } else { "s" }));
        }
        if self.days != 0 {
            parts.push(format!("{} day{}", self.days, if self.days.abs() == 1 { "" } else { "s" }));
        }
        if self.micros != 0 || parts.is_empty() {
            let sign = if self.micros < 0 { "-" } else { "" };
            let abs = self.micros.unsigned_abs();
            let hours = abs / MICROS_PER_HOUR as u64;
            let minutes = (abs % MICROS_PER_HOUR as u64) / MICROS_PER_MINUTE as u64;
            let seconds = (abs % MICROS_PER_MINUTE as u64) / MICROS_PER_SECOND as u64;
            let fraction = abs % MICROS_PER_SECOND as u64;
            let mut clock = format!("{sign}{hours:02}:{minutes:02}:{seconds:02}");
            if fraction != 0 {
                let digits = format!("{fraction:06}");
                clock.push('.');
                clock.push_str(digits.trim_end_matches('0'));
            }
            parts.push(clock);
        }
        write!(f, "{}", parts.join(" "))
    }
}

impl FromStr for Interval {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Interval> for Duration {
    fn from(interval: Interval) -> Self {
        interval.to_duration()
    }
}

impl TryFrom<Duration> for Interval {
    type Error = IntervalError;

    fn try_from(duration: Duration) -> Result<Self, Self::Error> {
        duration.to_interval()
    }
}

static ISO8601: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(-)?P(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$",
    )
    .expect("valid ISO 8601 duration regex")
});

impl Duration {
    pub fn years(n: i64) -> Self {
        Self { years: n, ..Self::default() }
    }

    pub fn months(n: i64) -> Self {
        Self { months: n, ..Self::default() }
    }

    pub fn weeks(n: i64) -> Self {
        Self { weeks: n, ..Self::default() }
    }

    pub fn days(n: i64) -> Self {
        Self { days: n, ..Self::default() }
    }

    pub fn hours(n: i64) -> Self {
        Self { hours: n, ..Self::default() }
    }

    pub fn minutes(n: i64) -> Self {
        Self { minutes: n, ..Self::default() }
    }

    pub fn seconds(n: f64) -> Self {
        Self { seconds: n, ..Self::default() }
    }

    /// Total length in seconds, using gregorian-average months and years.
    pub fn total_seconds(&self) -> f64 {
        (self.years * SECONDS_PER_YEAR
            + self.months * SECONDS_PER_MONTH
            + self.weeks * SECONDS_PER_WEEK
            + self.days * SECONDS_PER_DAY
            + self.hours * SECONDS_PER_HOUR
            + self.minutes * SECONDS_PER_MINUTE) as f64
            + self.seconds
    }

    /// Encode as the engine triple. Calendar units stay calendar units.
    pub fn to_interval(&self) -> Result<Interval, IntervalError> {
        let months = self
            .years
            .checked_mul(12)
            .and_then(|m| m.checked_add(self.months))
            .ok_or(IntervalError::Overflow("months"))?;
        let days = self
            .weeks
            .checked_mul(7)
            .and_then(|d| d.checked_add(self.days))
            .ok_or(IntervalError::Overflow("days"))?;
        let clock_micros = self
            .hours
            .checked_mul(MICROS_PER_HOUR)
            .and_then(|m| m.checked_add(self.minutes.checked_mul(MICROS_PER_MINUTE)?))
            .ok_or(IntervalError::Overflow("microseconds"))?;
        let micros = clock_micros
            .checked_add((self.seconds * MICROS_PER_SECOND as f64).round() as i64)
            .ok_or(IntervalError::Overflow("microseconds"))?;

        Ok(Interval {
            months: i32::try_from(months).map_err(|_| IntervalError::Overflow("months"))?,
            days: i32::try_from(days).map_err(|_| IntervalError::Overflow("days"))?,
            micros,
        })
    }

    /// ISO 8601 form, e.g. `P1Y2M3DT4H5M6.5S`. A zero duration is `PT0S`.
    pub fn to_iso8601(&self) -> String {
        let negative = self.total_seconds() < 0.0;
        let abs = |n: i64| n.unsigned_abs();
        let mut out = String::from(if negative { "-P" } else { "P" });
        if self.years != 0 {
            out.push_str(&format!("{}Y", abs(self.years)));
        }
        if self.months != 0 {
            out.push_str(&format!("{}M", abs(self.months)));
        }
        if self.weeks != 0 {
            out.push_str(&format!("{}W", abs(self.weeks)));
        }
        if self.days != 0 {
            out.push_str(&format!("{}D", abs(self.days)));
        }
        let mut time = String::new();
        if self.hours != 0 {
            time.push_str(&format!("{}H", abs(self.hours)));
        }
        if self.minutes != 0 {
            time.push_str(&format!("{}M", abs(self.minutes)));
        }
        if self.seconds != 0.0 {
            time.push_str(&format!("{}S", self.seconds.abs()));
        }
        if !time.is_empty() {
            out.push('T');
            out.push_str(&time);
        }
        if out.ends_with('P') {
            out.push_str("T0S");
        }
        out
    }

    pub fn parse_iso8601(text: &str) -> Result<Self, IntervalError> {
        let caps = ISO8601
            .captures(text.trim())
            .ok_or_else(|| IntervalError::Parse(text.to_string()))?;
        let int = |idx: usize| -> i64 {
            caps.get(idx)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0)
        };
        let seconds: f64 = caps
            .get(8)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0.0);
        let duration = Self {
            years: int(2),
            months: int(3),
            weeks: int(4),
            days: int(5),
            hours: int(6),
            minutes: int(7),
            seconds,
        };
        Ok(if caps.get(1).is_some() { -duration } else { duration })
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration {
            years: self.years + rhs.years,
            months: self.months + rhs.months,
            weeks: self.weeks + rhs.weeks,
            days: self.days + rhs.days,
            hours: self.hours + rhs.hours,
            minutes: self.minutes + rhs.minutes,
            seconds: self.seconds + rhs.seconds,
        }
    }
}

impl Neg for Duration {
    type Output = Duration;

    fn neg(self) -> Duration {
        Duration {
            years: -self.years,
            months: -self.months,
            weeks: -self.weeks,
            days: -self.days,
            hours: -self.hours,
            minutes: -self.minutes,
            seconds: -self.seconds,
        }
    }
}
