//! The "TIME" layer - simulated timestamps and the playback clock.
//!
//! Trace data is stamped `YY_MM_DD-HH:MM[:SS]` with a zero-based epoch
//! (year 0 is 2000). Seconds are discarded. Playback runs on a virtual
//! clock that jumps a fixed number of minutes per tick, carrying through
//! the engine calendar:
//!
//! - April, June, September, November have 30 days
//! - February has 29 days when `year % 4 == 0`, else 28 (no century rule)
//! - every other month has 31 days
//!
//! The leap rule deliberately ignores the century correction. Historical
//! trace data was produced against it, so it must not be "fixed".

use crate::error::TimeStampError;
use serde::{Deserialize, Serialize};

/// Minutes in one simulated day.
pub const MINUTES_PER_DAY: u32 = 1440;

/// Characters that separate timestamp fields.
const SEPARATORS: [char; 3] = ['_', '-', ':'];

/// A point in simulated time, minute resolution.
///
/// Field order matters: the derived `Ord` compares year, month, day, hour,
/// minute in that order, which is exactly the engine's total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeStamp {
    /// Years since 2000
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

impl TimeStamp {
    /// Creates a timestamp from its fields.
    pub fn new(year: u32, month: u32, day: u32, hour: u32, minute: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
        }
    }

    /// Parses `YY_MM_DD-HH[:MM[:SS]]`.
    ///
    /// Any of `_`, `-`, `:` separates fields. The minute field is optional
    /// (defaults to 0) and a trailing seconds field is accepted and dropped.
    pub fn parse(s: &str) -> Result<Self, TimeStampError> {
        let fields: Vec<&str> = s.trim().split(&SEPARATORS[..]).collect();

        if !(4..=6).contains(&fields.len()) {
            return Err(TimeStampError::FieldCount {
                input: s.to_string(),
                found: fields.len(),
            });
        }

        let mut values = [0u32; 6];
        for (slot, field) in values.iter_mut().zip(&fields) {
            *slot = field.parse().map_err(|_| TimeStampError::InvalidField {
                input: s.to_string(),
                field: field.to_string(),
            })?;
        }

        Ok(Self::new(values[0], values[1], values[2], values[3], values[4]))
    }

    /// Returns this timestamp moved forward by `minutes`.
    ///
    /// Carries propagate minute -> hour -> day -> month -> year under the
    /// engine calendar. Advancing by `a` then `b` always equals advancing
    /// by `a + b`.
    ///
    /// Precondition: `self` is a valid date (month in 1..=12, day within
    /// the month). This is not checked.
    pub fn advanced_by(self, minutes: u32) -> Self {
        let mut next = self;

        let total_minutes = u64::from(self.minute) + u64::from(minutes);
        next.minute = (total_minutes % 60) as u32;

        let total_hours = u64::from(self.hour) + total_minutes / 60;
        next.hour = (total_hours % 24) as u32;

        for _ in 0..total_hours / 24 {
            next = next.next_day();
        }

        next
    }

    /// Returns the same time of day on the following calendar day.
    fn next_day(self) -> Self {
        let mut next = self;
        next.day += 1;
        if next.day > days_in_month(next.year, next.month) {
            next.day = 1;
            next.month += 1;
            if next.month > 12 {
                next.month = 1;
                next.year += 1;
            }
        }
        next
    }
}

impl std::str::FromStr for TimeStamp {
    type Err = TimeStampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}_{:02}_{:02}-{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }
}

/// Leap test of the engine calendar: every fourth year, no exceptions.
pub fn is_leap_year(year: u32) -> bool {
    year % 4 == 0
}

/// Number of days in `month` under the engine calendar.
pub fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Derives the clock increment from playback pacing.
///
/// One simulated day (1440 minutes) should pass in `seconds_per_day`
/// seconds of animation at `frame_rate` ticks per second. The result is
/// floored to at least one minute per tick.
///
/// Returns `None` if either argument is zero.
pub fn minutes_per_tick(frame_rate: u32, seconds_per_day: u32) -> Option<u32> {
    let ticks_per_day = frame_rate.checked_mul(seconds_per_day)?;
    if ticks_per_day == 0 {
        return None;
    }
    Some((MINUTES_PER_DAY / ticks_per_day).max(1))
}

/// The simulated playback clock.
///
/// Owned by whoever drives playback and passed explicitly to the
/// scheduler on every tick; nothing else mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    /// Current simulated time
    now: TimeStamp,

    /// Minutes added per tick (always >= 1)
    minutes_per_tick: u32,

    /// Ticks taken so far
    ticks: u64,
}

impl Clock {
    /// Creates a clock starting at `start`.
    pub fn new(start: TimeStamp, minutes_per_tick: u32) -> Self {
        Self {
            now: start,
            minutes_per_tick: minutes_per_tick.max(1),
            ticks: 0,
        }
    }

    /// Creates a clock paced so one simulated day lasts `seconds_per_day`
    /// seconds at `frame_rate` ticks per second.
    pub fn paced(start: TimeStamp, frame_rate: u32, seconds_per_day: u32) -> Option<Self> {
        minutes_per_tick(frame_rate, seconds_per_day).map(|m| Self::new(start, m))
    }

    /// Advances by one tick.
    pub fn advance(&mut self) {
        self.now = self.now.advanced_by(self.minutes_per_tick);
        self.ticks += 1;
    }

    /// Current simulated time.
    pub fn now(&self) -> TimeStamp {
        self.now
    }

    /// Minutes added per tick.
    pub fn minutes_per_tick(&self) -> u32 {
        self.minutes_per_tick
    }

    /// Number of ticks taken.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
