//! Time source. All "today" and slot-window decisions go through a `Clock`
//! so day rollover and window edges are reproducible in tests.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};

pub trait Clock: Send + Sync {
  /// Wall-clock time in the service's business time zone.
  fn now(&self) -> NaiveDateTime;

  fn today(&self) -> NaiveDate {
    self.now().date()
  }
}

/// System clock shifted to a fixed UTC offset.
pub struct SystemClock {
  offset: FixedOffset,
}

impl SystemClock {
  /// Out-of-range offsets fall back to UTC.
  pub fn with_offset_minutes(minutes: i32) -> Self {
    let offset = minutes
      .checked_mul(60)
      .and_then(FixedOffset::east_opt)
      .unwrap_or_else(|| Utc.fix());
    Self { offset }
  }
}

impl Clock for SystemClock {
  fn now(&self) -> NaiveDateTime {
    Utc::now().with_timezone(&self.offset).naive_local()
  }
}

/// Settable clock for tests.
#[cfg(test)]
pub struct FixedClock {
  now: std::sync::Mutex<NaiveDateTime>,
}

#[cfg(test)]
impl FixedClock {
  pub fn new(now: NaiveDateTime) -> Self {
    Self { now: std::sync::Mutex::new(now) }
  }

  pub fn set(&self, now: NaiveDateTime) {
    *self.now.lock().expect("clock lock") = now;
  }
}

#[cfg(test)]
impl Clock for FixedClock {
  fn now(&self) -> NaiveDateTime {
    *self.now.lock().expect("clock lock")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn offset_shifts_the_date() {
    let utc = SystemClock::with_offset_minutes(0).now();
    let kst = SystemClock::with_offset_minutes(9 * 60).now();
    let diff = (kst - utc).num_minutes();
    assert!((539..=541).contains(&diff), "diff = {diff}");
  }

  #[test]
  fn fixed_clock_moves_when_set() {
    let t0 = NaiveDate::from_ymd_opt(2026, 10, 5).and_then(|d| d.and_hms_opt(23, 59, 0)).expect("t0");
    let t1 = NaiveDate::from_ymd_opt(2026, 10, 6).and_then(|d| d.and_hms_opt(0, 1, 0)).expect("t1");
    let clock = FixedClock::new(t0);
    assert_eq!(clock.today(), t0.date());
    clock.set(t1);
    assert_eq!(clock.today(), t1.date());
  }
}
