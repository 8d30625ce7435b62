//! When a vendor's next pass is due.
//!
//! Vendors publish monthly, so the default schedule is a monthly slot: a
//! day of the month and a time of day in local time. If this month's slot
//! has already passed the next pass runs at next month's slot. Days beyond
//! the end of a short month are clamped to its last day.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use thiserror::Error;

/// Default day of the month for monthly schedules.
pub const DEFAULT_SCHEDULE_DAY: u32 = 1;

/// Default time of day for monthly schedules, 06:00.
pub fn default_schedule_time() -> NaiveTime {
    NaiveTime::from_hms_opt(6, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Invalid schedule parameters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("schedule day {0} out of range 1..=31")]
    InvalidDay(u32),

    #[error("invalid schedule time '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("schedule interval must be greater than zero")]
    ZeroInterval,
}

/// A vendor pass schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Once a month at `day` (clamped to the month length) and `time`.
    Monthly { day: u32, time: NaiveTime },
    /// At a fixed interval after the previous pass.
    Every(Duration),
}

impl Default for Schedule {
    /// The first of the month at 06:00.
    fn default() -> Self {
        Schedule::Monthly {
            day: DEFAULT_SCHEDULE_DAY,
            time: default_schedule_time(),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Monthly { day, time } => {
                write!(f, "monthly on day {} at {}", day, time.format("%H:%M"))
            }
            Schedule::Every(interval) => write!(f, "every {}s", interval.as_secs()),
        }
    }
}

impl Schedule {
    pub fn monthly(day: u32, time: NaiveTime) -> Result<Self, ScheduleError> {
        if !(1..=31).contains(&day) {
            return Err(ScheduleError::InvalidDay(day));
        }
        Ok(Schedule::Monthly { day, time })
    }

    pub fn every(interval: Duration) -> Result<Self, ScheduleError> {
        if interval.is_zero() {
            return Err(ScheduleError::ZeroInterval);
        }
        Ok(Schedule::Every(interval))
    }

    /// Parse an `HH:MM` time of day.
    pub fn parse_time(raw: &str) -> Result<NaiveTime, ScheduleError> {
        NaiveTime::parse_from_str(raw.trim(), "%H:%M")
            .map_err(|_| ScheduleError::InvalidTime(raw.to_string()))
    }

    /// The first slot strictly after `now`, in wall-clock time.
    pub fn next_after_naive(&self, now: NaiveDateTime) -> NaiveDateTime {
        match *self {
            Schedule::Every(interval) => chrono::Duration::from_std(interval)
                .ok()
                .and_then(|step| now.checked_add_signed(step))
                .unwrap_or(NaiveDateTime::MAX),
            Schedule::Monthly { day, time } => {
                let this_month = monthly_slot(now.year(), now.month(), day, time);
                if this_month > now {
                    return this_month;
                }
                let (year, month) = if now.month() == 12 {
                    (now.year() + 1, 1)
                } else {
                    (now.year(), now.month() + 1)
                };
                monthly_slot(year, month, day, time)
            }
        }
    }

    /// The first slot strictly after `now` in local time.
    ///
    /// A slot that falls into a daylight-saving gap moves one hour later.
    pub fn next_after(&self, now: DateTime<Local>) -> DateTime<Local> {
        let next = self.next_after_naive(now.naive_local());
        Local
            .from_local_datetime(&next)
            .earliest()
            .or_else(|| {
                Local
                    .from_local_datetime(&(next + chrono::Duration::hours(1)))
                    .earliest()
            })
            .unwrap_or(now)
    }

    /// How long to wait from `now` until the next slot.
    pub fn delay_after(&self, now: DateTime<Local>) -> Duration {
        (self.next_after(now) - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

fn monthly_slot(year: i32, month: u32, day: u32, time: NaiveTime) -> NaiveDateTime {
    let last = days_in_month(year, month);
    NaiveDate::from_ymd_opt(year, month, day.min(last))
        .unwrap_or(NaiveDate::MIN)
        .and_time(time)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    (28..=31)
        .rev()
        .find(|day| NaiveDate::from_ymd_opt(year, month, *day).is_some())
        .unwrap_or(28)
}
