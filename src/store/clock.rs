//! Clock used for deterministic schedules

use chrono::{DateTime, Local, TimeZone, Utc};
use mockable::Clock;
use std::sync::Mutex;

/// Clock that always reports the same instant until moved
///
/// Used by tests and replays that need reproducible departure checks.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Fixed clock at midnight UTC of the given day, `None` if the date is invalid
    pub fn at_date(year: i32, month: u32, day: u32) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
            .single()
            .map(Self::new)
    }

    /// Move the clock to `now`
    pub fn set(&self, now: DateTime<Utc>) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = now;
    }

    fn current(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.current().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fixed_clock_only_moves_when_set() {
        let clock = FixedClock::at_date(2030, 1, 1).unwrap();
        let start = clock.utc();
        assert_eq!(clock.utc(), start);

        clock.set(start + Duration::hours(2));
        assert_eq!(clock.utc() - start, Duration::hours(2));
    }

    #[test]
    fn test_invalid_date() {
        assert!(FixedClock::at_date(2030, 2, 30).is_none());
    }
}
