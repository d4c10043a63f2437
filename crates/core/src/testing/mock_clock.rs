//! Manually advanced clock for testing.

use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::Duration;

use crate::status::Clock;

/// Clock that only moves when told to.
///
/// # Example
///
/// ```rust,ignore
/// let clock = Arc::new(MockClock::new());
/// let status = ProcessingStatus::new().with_clock(clock.clone());
///
/// clock.advance(Duration::from_secs(300));
/// assert!(status.workers_idle());
/// ```
#[derive(Debug)]
pub struct MockClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClock {
    /// Create a clock frozen at the current time.
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Create a clock frozen at `now`.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        if let Ok(delta) = chrono::Duration::from_std(duration) {
            let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
            *now += delta;
        }
    }

    /// Set the clock to `now`, which may be in the past.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_frozen_until_advanced() {
        let clock = MockClock::new();
        let start = clock.now();
        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_millis(1500));
        assert_eq!(clock.now() - start, chrono::Duration::milliseconds(1500));
    }

    #[test]
    fn test_set() {
        let clock = MockClock::new();
        let earlier = clock.now() - chrono::Duration::hours(1);
        clock.set(earlier);
        assert_eq!(clock.now(), earlier);
    }
}
