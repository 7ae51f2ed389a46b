//! Current-week window and local calendar helpers
//!
//! The week runs Monday 00:00:00 local (inclusive) through Sunday
//! 23:59:59.999 local (inclusive), stored as the half-open interval
//! `[start, end)` where `end` is the following Monday's local midnight.

use chrono::{
  DateTime, Datelike, Duration, FixedOffset, Local, LocalResult, NaiveDate, NaiveTime, Offset,
  TimeZone, Utc,
};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// ---------------------------------------------------------------------------
/// Clock
/// ---------------------------------------------------------------------------

/// Source of "now" plus the local timezone used to turn instants into dates.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;

  /// Local calendar date of an instant
  fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate;

  /// First instant of a local calendar date
  fn local_midnight(&self, date: NaiveDate) -> DateTime<Utc>;
}

/// Wall clock in the system's local timezone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }

  fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&Local).date_naive()
  }

  fn local_midnight(&self, date: NaiveDate) -> DateTime<Utc> {
    midnight_in(&Local, date)
  }
}

/// Settable clock with a fixed UTC offset
#[derive(Debug)]
pub struct FixedClock {
  now: RwLock<DateTime<Utc>>,
  offset: FixedOffset,
}

impl FixedClock {
  pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
    Self {
      now: RwLock::new(now),
      offset,
    }
  }

  pub fn utc(now: DateTime<Utc>) -> Self {
    Self::new(now, Utc.fix())
  }

  pub fn set(&self, now: DateTime<Utc>) {
    *self.now.write().unwrap_or_else(|e| e.into_inner()) = now;
  }

  pub fn advance(&self, by: Duration) {
    let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
    *now += by;
  }

  pub fn offset(&self) -> FixedOffset {
    self.offset
  }
}

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.read().unwrap_or_else(|e| e.into_inner())
  }

  fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&self.offset).date_naive()
  }

  fn local_midnight(&self, date: NaiveDate) -> DateTime<Utc> {
    midnight_in(&self.offset, date)
  }
}

/// Resolve local midnight of `date` in `tz`.
///
/// Ambiguous midnights (clocks fall back) take the earliest instant. Midnights
/// skipped by a DST gap resolve to the first local time that exists after it.
pub fn midnight_in<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
  let midnight = date.and_time(NaiveTime::MIN);
  let mut local = midnight;

  // Gaps are at most a couple of hours in practice
  for _ in 0..(24 * 4) {
    match tz.from_local_datetime(&local) {
      LocalResult::Single(dt) => return dt.with_timezone(&Utc),
      LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
      LocalResult::None => local += Duration::minutes(15),
    }
  }

  midnight.and_utc()
}

/// ---------------------------------------------------------------------------
/// Week Window
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekWindow {
  /// Local Monday of this week
  pub monday: NaiveDate,
  /// Monday 00:00:00 local, inclusive
  pub start: DateTime<Utc>,
  /// Next Monday 00:00:00 local, exclusive
  pub end: DateTime<Utc>,
}

impl WeekWindow {
  /// The Monday-through-Sunday week containing `instant`
  pub fn containing(clock: &dyn Clock, instant: DateTime<Utc>) -> Self {
    let date = clock.local_date(instant);
    let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
    Self::starting(clock, monday)
  }

  /// The week containing the clock's current instant
  pub fn current(clock: &dyn Clock) -> Self {
    Self::containing(clock, clock.now())
  }

  fn starting(clock: &dyn Clock, monday: NaiveDate) -> Self {
    Self {
      monday,
      start: clock.local_midnight(monday),
      end: clock.local_midnight(monday + Duration::days(7)),
    }
  }

  /// Local Sunday of this week
  pub fn sunday(&self) -> NaiveDate {
    self.monday + Duration::days(6)
  }

  /// Sunday 23:59:59.999 local, the last instant counted in this week
  pub fn last_instant(&self) -> DateTime<Utc> {
    self.end - Duration::milliseconds(1)
  }

  pub fn contains(&self, instant: DateTime<Utc>) -> bool {
    instant >= self.start && instant < self.end
  }

  pub fn contains_date(&self, date: NaiveDate) -> bool {
    date >= self.monday && date <= self.sunday()
  }

  pub fn next(&self, clock: &dyn Clock) -> Self {
    Self::starting(clock, self.monday + Duration::days(7))
  }
}
