//! The injected clock described in §5: the store consults this, never `chrono::Utc::now()`
//! directly, so tests can hold "now" fixed (§10.4).

use chrono::{NaiveDateTime, Utc};

/// Supplies the current instant used to stamp `DTSTAMP` and `LAST-MODIFIED` on every mutation.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// The production clock: the real wall-clock time, in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}

/// A deterministic clock for tests: always returns the instant it was built with.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn fixed_clock_always_returns_same_instant() {
        let instant = NaiveDate::from_ymd_opt(2022, 8, 29).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let clock = FixedClock(instant);

        assert_eq!(clock.now(), instant);
        assert_eq!(clock.now(), instant);
    }
}
