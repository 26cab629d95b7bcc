//! # Bindery Testing
//!
//! Deterministic test helpers for the bindery workspace.
//!
//! Everything time-sensitive in bindery (grant expiry, visibility
//! timeouts, retention sweeps) is decided against an injected
//! [`Clock`](bindery_core::environment::Clock), so tests pin time with
//! [`FixedClock`] or drive it forward with [`ManualClock`] instead of
//! sleeping.
//!
//! ## Example
//!
//! ```
//! use bindery_testing::ManualClock;
//! use bindery_core::environment::Clock;
//! use std::time::Duration;
//!
//! let clock = ManualClock::default();
//! let before = clock.now();
//! clock.advance(Duration::from_secs(301));
//! assert_eq!((clock.now() - before).num_seconds(), 301);
//! ```

/// Mock implementations of environment traits.
pub mod mocks {
    use bindery_core::environment::Clock;
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use std::sync::Mutex;
    use std::sync::PoisonError;
    use std::time::Duration;

    /// Fixed clock for deterministic tests.
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use bindery_testing::mocks::FixedClock;
    /// use bindery_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a fixed clock pinned to the given time.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// A clock tests can advance explicitly.
    ///
    /// Starts at the [`test_clock`] epoch unless constructed with a time.
    /// Useful for expiry scenarios: issue a grant, advance past its TTL,
    /// assert the redemption fails, with no real sleeping involved.
    #[derive(Debug)]
    pub struct ManualClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Create a manual clock starting at the given time.
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward.
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            let delta = ChronoDuration::from_std(by)
                .unwrap_or_else(|_| ChronoDuration::MAX);
            *time = time
                .checked_add_signed(delta)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
        }

        /// Pin the clock to an absolute time.
        pub fn set(&self, to: DateTime<Utc>) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time = to;
        }
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new(test_epoch())
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// The epoch used by default test clocks (2025-01-01 00:00:00 UTC).
    #[must_use]
    pub fn test_epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Create a default fixed clock for tests, pinned to [`test_epoch`].
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_epoch())
    }
}

// Re-export commonly used items
pub use mocks::{test_clock, test_epoch, FixedClock, ManualClock};

#[cfg(test)]
mod tests {
    use super::*;
    use bindery_core::environment::Clock;
    use std::time::Duration;

    #[test]
    fn fixed_clock_never_moves() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::default();
        let start = clock.now();
        clock.advance(Duration::from_secs(30));
        assert_eq!((clock.now() - start).num_seconds(), 30);
    }

    #[test]
    fn manual_clock_can_be_pinned() {
        let clock = ManualClock::default();
        clock.advance(Duration::from_secs(10));
        clock.set(test_epoch());
        assert_eq!(clock.now(), test_epoch());
    }
}
