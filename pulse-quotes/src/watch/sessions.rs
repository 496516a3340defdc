//! A-share trading calendar.

use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike, Weekday};
use pulse_common::{Error, Result, SessionsConfig};
use std::time::Duration;

/// Wait used while the market is open or closed between known bounds.
const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(300);

/// Shortest wait ever returned by `next_check_interval`.
const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(60);

const SECS_PER_DAY: i64 = 86_400;

/// Morning and afternoon session bounds, both inclusive at minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingSessions {
    morning_open: NaiveTime,
    morning_close: NaiveTime,
    afternoon_open: NaiveTime,
    afternoon_close: NaiveTime,
}

impl Default for TradingSessions {
    fn default() -> Self {
        // 09:30-11:30, 13:00-15:00
        Self {
            morning_open: hm(9, 30),
            morning_close: hm(11, 30),
            afternoon_open: hm(13, 0),
            afternoon_close: hm(15, 0),
        }
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// Parse time string to NaiveTime
fn parse_time(field: &str, value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|e| Error::Config(format!("sessions.{}: '{}' is not HH:MM ({})", field, value, e)))
}

impl TradingSessions {
    pub fn from_config(config: &SessionsConfig) -> Result<Self> {
        let sessions = Self {
            morning_open: parse_time("morning_open", &config.morning_open)?,
            morning_close: parse_time("morning_close", &config.morning_close)?,
            afternoon_open: parse_time("afternoon_open", &config.afternoon_open)?,
            afternoon_close: parse_time("afternoon_close", &config.afternoon_close)?,
        };

        if !(sessions.morning_open < sessions.morning_close
            && sessions.morning_close < sessions.afternoon_open
            && sessions.afternoon_open < sessions.afternoon_close)
        {
            return Err(Error::Config(
                "sessions must be strictly increasing".to_string(),
            ));
        }

        Ok(sessions)
    }

    /// Whether `now` falls on a weekday inside either session.
    ///
    /// Seconds are ignored, so 11:30:59 still counts as the morning session.
    pub fn is_trading_time(&self, now: NaiveDateTime) -> bool {
        if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }

        let t = hm(now.hour(), now.minute());
        (t >= self.morning_open && t <= self.morning_close)
            || (t >= self.afternoon_open && t <= self.afternoon_close)
    }

    /// How long to wait before checking the market again.
    pub fn next_check_interval(&self, now: NaiveDateTime) -> Duration {
        let t = now.time();

        let wait = if t < self.morning_open {
            secs_between(t, self.morning_open)
        } else if t >= self.afternoon_close {
            SECS_PER_DAY - seconds_of_day(t) + seconds_of_day(self.morning_open)
        } else if t > self.morning_close && t < self.afternoon_open {
            secs_between(t, self.afternoon_open)
        } else {
            DEFAULT_CHECK_INTERVAL.as_secs() as i64
        };

        Duration::from_secs(wait.max(0) as u64).max(MIN_CHECK_INTERVAL)
    }
}

fn seconds_of_day(t: NaiveTime) -> i64 {
    i64::from(t.num_seconds_from_midnight())
}

fn secs_between(from: NaiveTime, to: NaiveTime) -> i64 {
    (to - from).num_seconds()
}
