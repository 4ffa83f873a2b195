//! Model run and forecast hour selection

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hours between model cycles
pub const CYCLE_HOURS: u32 = 6;
/// Forecast hours are published in 3-hour steps
pub const FORECAST_STEP_HOURS: u32 = 3;

/// A model cycle, e.g. 2026-10-19 12Z
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRun {
    pub date: NaiveDate,
    pub hour: u32,
}

impl ModelRun {
    /// Latest cycle at or before `time`
    #[must_use]
    pub fn latest_for(time: DateTime<Utc>) -> Self {
        Self {
            date: time.date_naive(),
            hour: time.hour() / CYCLE_HOURS * CYCLE_HOURS,
        }
    }

    #[must_use]
    pub fn run_time(&self) -> DateTime<Utc> {
        let time = NaiveTime::from_hms_opt(self.hour, 0, 0).unwrap_or(NaiveTime::MIN);
        self.date.and_time(time).and_utc()
    }

    /// The cycle before this one
    #[must_use]
    pub fn previous(&self) -> Self {
        Self::latest_for(self.run_time() - Duration::hours(i64::from(CYCLE_HOURS)))
    }

    /// Whole cycles from this run forward to `later`, zero if `later` is not after it
    #[must_use]
    pub fn cycles_until(&self, later: &ModelRun) -> u32 {
        let hours = (later.run_time() - self.run_time()).num_hours().max(0);
        u32::try_from(hours / i64::from(CYCLE_HOURS)).unwrap_or(u32::MAX)
    }

    /// Identifier in `YYYYMMDD/HHz` form
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}/{:02}z", self.date.format("%Y%m%d"), self.hour)
    }
}

impl fmt::Display for ModelRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// Departure and block time used to place waypoints in time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightTiming {
    pub departure: DateTime<Utc>,
    pub duration_minutes: u32,
}

impl FlightTiming {
    /// Time the aircraft is expected over a point `progress` (0..=1) along the route
    #[must_use]
    pub fn time_at(&self, progress: f64) -> DateTime<Utc> {
        let elapsed_minutes = f64::from(self.duration_minutes) * progress.clamp(0.0, 1.0);
        self.departure + Duration::seconds((elapsed_minutes * 60.0).round() as i64)
    }
}

/// Forecast hour of `run` valid closest to `valid_time`, in 3-hour steps,
/// clamped to `[0, max_hour]`
#[must_use]
pub fn forecast_hour(run: &ModelRun, valid_time: DateTime<Utc>, max_hour: u32) -> u32 {
    let hours = (valid_time - run.run_time()).num_seconds() as f64 / 3600.0;
    let step = f64::from(FORECAST_STEP_HOURS);
    let stepped = (hours / step).round() * step;
    stepped.clamp(0.0, f64::from(max_hour)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, h, m, 0).unwrap()
    }

    #[rstest]
    #[case(0, 0, 0)]
    #[case(5, 59, 0)]
    #[case(6, 0, 6)]
    #[case(11, 30, 6)]
    #[case(17, 0, 12)]
    #[case(23, 59, 18)]
    fn test_latest_cycle(#[case] h: u32, #[case] m: u32, #[case] expected: u32) {
        let run = ModelRun::latest_for(at(h, m));
        assert_eq!(run.hour, expected);
        assert_eq!(run.date, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
    }

    #[test]
    fn test_previous_crosses_midnight() {
        let run = ModelRun::latest_for(at(3, 0));
        let prev = run.previous();
        assert_eq!(prev.hour, 18);
        assert_eq!(prev.date, NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        assert_eq!(prev.id(), "20261018/18z");
    }

    #[test]
    fn test_cycles_until() {
        let run = ModelRun::latest_for(at(13, 0));
        assert_eq!(run.cycles_until(&run), 0);
        assert_eq!(run.previous().cycles_until(&run), 1);
        assert_eq!(run.previous().previous().previous().cycles_until(&run), 3);
        assert_eq!(run.cycles_until(&run.previous()), 0);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 0)]
    #[case(2, 3)]
    #[case(4, 3)]
    #[case(5, 6)]
    #[case(40, 36)]
    fn test_forecast_hour_rounding(#[case] hours_after_run: i64, #[case] expected: u32) {
        let run = ModelRun::latest_for(at(12, 0));
        let valid = run.run_time() + Duration::hours(hours_after_run);
        assert_eq!(forecast_hour(&run, valid, 36), expected);
    }

    #[test]
    fn test_forecast_hour_before_run_clamps_to_zero() {
        let run = ModelRun::latest_for(at(12, 0));
        assert_eq!(forecast_hour(&run, at(6, 0), 36), 0);
    }

    #[test]
    fn test_time_at_progress() {
        let timing = FlightTiming {
            departure: at(12, 0),
            duration_minutes: 420,
        };
        assert_eq!(timing.time_at(0.0), at(12, 0));
        assert_eq!(timing.time_at(0.5), at(15, 30));
        assert_eq!(timing.time_at(1.0), at(19, 0));
    }
}
