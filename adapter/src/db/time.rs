//! Timestamp conversion strategies.
//!
//! DuckDB hands timestamps to the driver as an integer count since the epoch in
//! one of four units, and times of day as microseconds since midnight. Those
//! counts are wall-clock values without a zone. The strategy chosen at adapter
//! construction decides which zone that wall clock belongs to.

use std::fmt::Debug;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// Raw temporal value as the engine reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeParts {
    Seconds(i64),
    Millis(i64),
    Micros(i64),
    Nanos(i64),
    /// Microseconds since midnight
    TimeOfDay(i64),
}

/// Converted temporal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Time {
    Timestamp(DateTime<FixedOffset>),
    TimeOfDay(NaiveTime),
}

/// Capability used by the driver to turn engine counts into times.
pub trait TimeConverter: Send + Sync + Debug {
    /// Returns `None` when the count is outside chrono's representable range.
    fn to_time(&self, parts: TimeParts) -> Option<Time>;
}

/// Wall-clock reading of the parts, before any zone is applied.
fn naive_parts(parts: TimeParts) -> Option<Result<NaiveDateTime, NaiveTime>> {
    let naive = match parts {
        TimeParts::Seconds(s) => DateTime::<Utc>::from_timestamp(s, 0)?.naive_utc(),
        TimeParts::Millis(ms) => DateTime::<Utc>::from_timestamp_millis(ms)?.naive_utc(),
        TimeParts::Micros(us) => DateTime::<Utc>::from_timestamp_micros(us)?.naive_utc(),
        TimeParts::Nanos(ns) => DateTime::<Utc>::from_timestamp_nanos(ns).naive_utc(),
        TimeParts::TimeOfDay(us) => {
            // TIME allows 24:00:00, chrono stops one tick short
            let us = us.min(MICROS_PER_DAY - 1);
            let secs = u32::try_from(us.div_euclid(1_000_000)).ok()?;
            let nanos = u32::try_from(us.rem_euclid(1_000_000) * 1_000).ok()?;
            return NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos).map(Err);
        }
    };
    Some(Ok(naive))
}

/// Treats engine wall clocks as UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct UtcTimeConverter;

impl TimeConverter for UtcTimeConverter {
    fn to_time(&self, parts: TimeParts) -> Option<Time> {
        match naive_parts(parts)? {
            Ok(naive) => Some(Time::Timestamp(Utc.from_utc_datetime(&naive).fixed_offset())),
            Err(time) => Some(Time::TimeOfDay(time)),
        }
    }
}

/// Treats engine wall clocks as the process-local zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTimeConverter;

impl TimeConverter for LocalTimeConverter {
    fn to_time(&self, parts: TimeParts) -> Option<Time> {
        match naive_parts(parts)? {
            // DST gaps have no local reading; take the earliest valid one around it
            Ok(naive) => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| Time::Timestamp(dt.fixed_offset())),
            Err(time) => Some(Time::TimeOfDay(time)),
        }
    }
}

/// Zone policy selected in the adapter options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeZonePolicy {
    #[default]
    Utc,
    Local,
}

impl TimeZonePolicy {
    pub fn converter(&self) -> Arc<dyn TimeConverter> {
        match self {
            TimeZonePolicy::Utc => Arc::new(UtcTimeConverter),
            TimeZonePolicy::Local => Arc::new(LocalTimeConverter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use rstest::rstest;

    fn utc_timestamp(parts: TimeParts) -> DateTime<FixedOffset> {
        match UtcTimeConverter.to_time(parts) {
            Some(Time::Timestamp(ts)) => ts,
            other => panic!("Expected timestamp, got {:?}", other),
        }
    }

    #[rstest]
    #[case(TimeParts::Seconds(1_700_000_000))]
    #[case(TimeParts::Millis(1_700_000_000_000))]
    #[case(TimeParts::Micros(1_700_000_000_000_000))]
    #[case(TimeParts::Nanos(1_700_000_000_000_000_000))]
    fn test_every_epoch_unit_lands_on_the_same_instant(#[case] parts: TimeParts) {
        let ts = utc_timestamp(parts);
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.offset().local_minus_utc(), 0);
        assert_eq!((ts.year(), ts.month(), ts.day()), (2023, 11, 14));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (22, 13, 20));
    }

    #[rstest]
    fn test_sub_second_precision_is_kept() {
        let ts = utc_timestamp(TimeParts::Micros(1_500_000));
        assert_eq!(ts.timestamp_subsec_micros(), 500_000);
        let ts = utc_timestamp(TimeParts::Nanos(1_000_000_123));
        assert_eq!(ts.timestamp_subsec_nanos(), 123);
    }

    #[rstest]
    fn test_pre_epoch_values() {
        let ts = utc_timestamp(TimeParts::Millis(-1));
        assert_eq!(ts.year(), 1969);
        assert_eq!(ts.timestamp_subsec_millis(), 999);
    }

    #[rstest]
    fn test_time_of_day_only() {
        let micros = (13 * 3600 + 45 * 60 + 30) * 1_000_000 + 250_000;
        let time = UtcTimeConverter.to_time(TimeParts::TimeOfDay(micros));
        assert_eq!(
            time,
            Some(Time::TimeOfDay(NaiveTime::from_hms_micro_opt(13, 45, 30, 250_000).unwrap()))
        );
    }

    #[rstest]
    fn test_end_of_day_clamps_to_last_microsecond() {
        assert_eq!(
            UtcTimeConverter.to_time(TimeParts::TimeOfDay(MICROS_PER_DAY)),
            Some(Time::TimeOfDay(NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap()))
        );
    }

    #[rstest]
    fn test_time_of_day_out_of_range() {
        assert_eq!(UtcTimeConverter.to_time(TimeParts::TimeOfDay(-1)), None);
    }

    #[rstest]
    fn test_local_converter_keeps_wall_clock() {
        let Some(Time::Timestamp(ts)) = LocalTimeConverter.to_time(TimeParts::Seconds(1_700_000_000))
        else {
            panic!("Expected timestamp");
        };
        assert_eq!(ts.naive_local(), utc_timestamp(TimeParts::Seconds(1_700_000_000)).naive_utc());
    }

    #[rstest]
    fn test_policy_selects_converter() {
        let converter = TimeZonePolicy::Utc.converter();
        assert!(matches!(converter.to_time(TimeParts::Seconds(0)), Some(Time::Timestamp(_))));
    }
}
