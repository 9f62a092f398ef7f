// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Absolute time for expiration decisions.
//!
//! Fragment expiration is stored as absolute timestamps so that every node sharing a
//! distributed store agrees on freshness. The [`Clock`] hands out those timestamps. In
//! production it reads the system time; with the `test-util` feature a [`ClockControl`]
//! lets tests move time forward explicitly.

use std::time::SystemTime;

#[cfg(any(feature = "test-util", test))]
use std::{sync::Arc, time::Duration};

#[cfg(any(feature = "test-util", test))]
use parking_lot::Mutex;

/// Provides the current absolute time.
///
/// Cloning a clock is cheap, and every clone observes the same time source.
///
/// # Examples
///
/// ```
/// use fragcache_tier::Clock;
///
/// let clock = Clock::new_system();
/// let first = clock.system_time();
/// let second = clock.system_time();
/// assert!(second >= first);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Clock {
    #[cfg(any(feature = "test-util", test))]
    control: Option<Arc<Mutex<SystemTime>>>,
}

impl Clock {
    /// Creates a clock that reads the system time.
    #[must_use]
    pub fn new_system() -> Self {
        Self::default()
    }

    /// Creates a clock that stays at the current time until advanced through a [`ClockControl`].
    ///
    /// Without access to the control, the time never changes.
    #[cfg(any(feature = "test-util", test))]
    #[must_use]
    pub fn new_frozen() -> Self {
        ClockControl::new().to_clock()
    }

    /// Returns the current absolute time.
    #[must_use]
    pub fn system_time(&self) -> SystemTime {
        #[cfg(any(feature = "test-util", test))]
        if let Some(control) = &self.control {
            return *control.lock();
        }

        SystemTime::now()
    }
}

/// Controls the passage of time for the clocks created from it.
///
/// # Examples
///
/// ```
/// use fragcache_tier::ClockControl;
/// use std::time::Duration;
///
/// let control = ClockControl::new();
/// let clock = control.to_clock();
/// let start = clock.system_time();
///
/// control.advance(Duration::from_secs(60));
/// assert_eq!(clock.system_time(), start + Duration::from_secs(60));
/// ```
#[cfg(any(feature = "test-util", test))]
#[derive(Clone, Debug)]
pub struct ClockControl {
    now: Arc<Mutex<SystemTime>>,
}

#[cfg(any(feature = "test-util", test))]
impl Default for ClockControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(feature = "test-util", test))]
impl ClockControl {
    /// Creates a control starting at the current system time.
    #[must_use]
    pub fn new() -> Self {
        Self::new_at(SystemTime::now())
    }

    /// Creates a control starting at the given time.
    #[must_use]
    pub fn new_at(start: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Returns a clock whose time is driven by this control.
    #[must_use]
    pub fn to_clock(&self) -> Clock {
        Clock {
            control: Some(Arc::clone(&self.now)),
        }
    }

    /// Moves time forward.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock();
        *now += duration;
    }

    /// Moves time forward by a number of milliseconds.
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_controlled_time() {
        let control = ClockControl::new_at(SystemTime::UNIX_EPOCH);
        let clock = control.to_clock();
        let clone = clock.clone();

        control.advance_millis(1_500);

        assert_eq!(clock.system_time(), SystemTime::UNIX_EPOCH + Duration::from_millis(1_500));
        assert_eq!(clone.system_time(), clock.system_time());
    }

    #[test]
    fn frozen_clock_does_not_move() {
        let clock = Clock::new_frozen();
        let first = clock.system_time();
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(clock.system_time(), first);
    }
}
