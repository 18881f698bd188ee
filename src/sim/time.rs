//! Logical simulation time.
//!
//! Time is measured in hours since the start of the run. Hours of the day
//! are derived as `t mod 24`, so t=0 is midnight of day 0.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

/// Hours per simulated day.
pub const HOURS_PER_DAY: f64 = 24.0;

/// Hours per simulated year (used to scale annual probabilities).
pub const HOURS_PER_YEAR: f64 = 8760.0;

/// A point on the logical clock, in hours.
///
/// Totally ordered via `f64::total_cmp` so it can key a heap.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SimTime(pub f64);

impl SimTime {
    /// The start of the simulation.
    pub const ZERO: SimTime = SimTime(0.0);

    /// Creates a time from hours.
    #[inline]
    pub fn hours(h: f64) -> Self {
        Self(h)
    }

    /// Raw value in hours.
    #[inline]
    pub fn as_hours(self) -> f64 {
        self.0
    }

    /// Hour of day in [0, 24).
    #[inline]
    pub fn hour_of_day(self) -> f64 {
        self.0.rem_euclid(HOURS_PER_DAY)
    }

    /// Zero-based day index.
    #[inline]
    pub fn day(self) -> u64 {
        (self.0 / HOURS_PER_DAY).floor().max(0.0) as u64
    }

    /// Later of two times.
    #[inline]
    pub fn max(self, other: Self) -> Self {
        if self >= other {
            self
        } else {
            other
        }
    }

    /// Elapsed hours since `earlier`, never negative.
    #[inline]
    pub fn since(self, earlier: SimTime) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }
}

impl PartialEq for SimTime {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for SimTime {}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for SimTime {
    fn from(hours: f64) -> Self {
        SimTime(hours)
    }
}

impl Add<f64> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: f64) -> SimTime {
        SimTime(self.0 + rhs)
    }
}

impl Sub for SimTime {
    type Output = f64;

    fn sub(self, rhs: SimTime) -> f64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={:.2}h", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_total() {
        let mut v = vec![SimTime(3.0), SimTime(-0.0), SimTime(1.5), SimTime(0.0)];
        v.sort();
        assert_eq!(v[0], SimTime(-0.0));
        assert_eq!(v[3], SimTime(3.0));
    }

    #[test]
    fn test_hour_of_day_and_day() {
        let t = SimTime::hours(50.5);
        assert!((t.hour_of_day() - 2.5).abs() < 1e-9);
        assert_eq!(t.day(), 2);
        assert_eq!(SimTime::ZERO.day(), 0);
    }

    #[test]
    fn test_arithmetic() {
        let t = SimTime::hours(4.0) + 2.5;
        assert_eq!(t, SimTime(6.5));
        assert!((t - SimTime(1.0) - 5.5).abs() < 1e-9);
        assert!((SimTime(1.0).since(SimTime(3.0))).abs() < 1e-9);
    }
}
