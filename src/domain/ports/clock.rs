//! Clock port.
//!
//! Expiry and escalation are time-driven; routing all reads of "now"
//! through a trait lets tests drive deadlines deterministically.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// The instant `duration` from now.
    fn after(&self, duration: Duration) -> DateTime<Utc> {
        self.now() + duration
    }
}

/// Wall-clock implementation used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now = *now + duration;
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().expect("clock lock poisoned") = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now(), start + Duration::seconds(90));
    }

    #[test]
    fn test_after() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.after(Duration::minutes(5)), start + Duration::minutes(5));
    }
}
