//! # Virtual Time
//!
//! The PHY models never read the wall clock. Every operation takes "now" from
//! a [`Clock`], which in a full simulation is backed by the external event
//! scheduler. [`ManualClock`] is a self-contained implementation for tests,
//! the scenario runner and simple single-threaded drivers.
//!
//! Durations are plain `std::time::Duration` values, so every subtraction
//! between timestamps is saturating and can never go negative.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::ops::{Add, AddAssign};
use std::time::Duration;

/// A point on the simulation timeline, in nanoseconds since the start of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimTime(u64);

impl SimTime {
    /// Start of the simulation.
    pub const ZERO: SimTime = SimTime(0);

    pub const fn from_nanos(nanos: u64) -> Self {
        SimTime(nanos)
    }

    pub const fn from_micros(micros: u64) -> Self {
        SimTime(micros.saturating_mul(1_000))
    }

    pub const fn from_millis(millis: u64) -> Self {
        SimTime(millis.saturating_mul(1_000_000))
    }

    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Time elapsed since `earlier`, or zero if `earlier` is in the future.
    pub fn saturating_duration_since(self, earlier: SimTime) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }

    /// Absolute distance between two timestamps.
    pub fn abs_diff(self, other: SimTime) -> Duration {
        Duration::from_nanos(self.0.abs_diff(other.0))
    }

    /// Offset from the start of the simulation.
    pub fn since_start(self) -> Duration {
        Duration::from_nanos(self.0)
    }
}

fn duration_to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> SimTime {
        SimTime(self.0.saturating_add(duration_to_nanos(rhs)))
    }
}

impl AddAssign<Duration> for SimTime {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl From<Duration> for SimTime {
    fn from(offset: Duration) -> Self {
        SimTime::ZERO + offset
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{:.6}ms", self.0 as f64 / 1_000_000.0)
    }
}

/// Source of the current virtual time.
pub trait Clock {
    fn now(&self) -> SimTime;
}

/// A clock that only moves when told to.
///
/// Time never goes backwards: `advance_to` with an earlier timestamp is ignored
/// and reported through the `log` facade, mirroring the guarantee that a
/// scheduler never fires an event in the past.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<SimTime>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock that starts at `start`
    pub fn starting_at(start: SimTime) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    /// Move the clock forward to `time`.
    pub fn advance_to(&self, time: SimTime) {
        let current = self.now.get();
        if time < current {
            log::warn!("ignoring clock rewind from {current} to {time}");
            return;
        }
        self.now.set(time);
    }

    /// Move the clock forward by `delta`.
    pub fn advance_by(&self, delta: Duration) {
        self.now.set(self.now.get() + delta);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SimTime {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_time_arithmetic() {
        let t = SimTime::from_millis(2) + Duration::from_micros(500);
        assert_eq!(t.as_nanos(), 2_500_000);
        assert_eq!(t.saturating_duration_since(SimTime::from_millis(1)), Duration::from_micros(1_500));
        assert_eq!(SimTime::from_millis(1).saturating_duration_since(t), Duration::ZERO);
        assert_eq!(SimTime::from_millis(1).abs_diff(t), Duration::from_micros(1_500));
    }

    #[test]
    fn test_manual_clock_never_rewinds() {
        let clock = ManualClock::new();
        clock.advance_to(SimTime::from_millis(5));
        clock.advance_to(SimTime::from_millis(3));
        assert_eq!(clock.now(), SimTime::from_millis(5));
        clock.advance_by(Duration::from_millis(1));
        assert_eq!(clock.now(), SimTime::from_millis(6));
    }

    #[test]
    fn test_display() {
        assert_eq!(SimTime::from_micros(1_500).to_string(), "+1.500000ms");
    }
}
