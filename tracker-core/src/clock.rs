//! Time sources
//!
//! The wall clock is injected wherever "now" matters so the core can be
//! driven by a frozen clock in tests. `Calendar` turns instants into the
//! calendar days all completion logic works with.

use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveTime, Offset, TimeDelta, Utc};

use crate::database::Weekday;

/// Provides the current instant to the rest of the application.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the operating system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Maps instants to calendar days in a fixed time zone offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
}

impl Calendar {
    /// Calendar in the system's current local offset.
    pub fn local() -> Self {
        Self {
            offset: Local::now().offset().fix(),
        }
    }

    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Calendar at `minutes` east of UTC. `None` if the offset is out of range.
    pub fn with_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(|offset| Self { offset })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar day an instant falls on.
    pub fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// First instant of `day` in this calendar.
    pub fn start_of_day(&self, day: NaiveDate) -> DateTime<Utc> {
        day.and_time(NaiveTime::MIN).and_utc()
            - TimeDelta::seconds(i64::from(self.offset.local_minus_utc()))
    }

    pub fn today(&self, clock: &dyn Clock) -> NaiveDate {
        self.day_of(clock.now())
    }

    pub fn weekday(day: NaiveDate) -> Weekday {
        day.weekday().into()
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Self::local()
    }
}
