//! Recurring daily time windows.
//!
//! A [`DailyWindow`] is an interval of the clock face, `[start, end)` in
//! hours of day. Windows that wrap past midnight (e.g. 22:00–06:00) are
//! supported; `start == end` means the whole day.
//!
//! # Time Model
//! Simulation time is hours since t=0, and t=0 is midnight.

use serde::{Deserialize, Serialize};

use crate::sim::{SimTime, HOURS_PER_DAY};

/// A half-open interval of the day, `[start_hour, end_hour)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyWindow {
    /// Opening hour (inclusive), in [0, 24).
    pub start_hour: f64,
    /// Closing hour (exclusive), in [0, 24).
    pub end_hour: f64,
}

impl DailyWindow {
    /// Creates a window.
    pub fn new(start_hour: f64, end_hour: f64) -> Self {
        Self {
            start_hour: start_hour.rem_euclid(HOURS_PER_DAY),
            end_hour: end_hour.rem_euclid(HOURS_PER_DAY),
        }
    }

    /// A window covering the whole day.
    pub fn always() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Whether the window crosses midnight.
    #[inline]
    pub fn wraps(&self) -> bool {
        self.start_hour > self.end_hour
    }

    /// Open hours per day.
    pub fn duration_hours(&self) -> f64 {
        if self.start_hour == self.end_hour {
            HOURS_PER_DAY
        } else {
            (self.end_hour - self.start_hour).rem_euclid(HOURS_PER_DAY)
        }
    }

    /// Whether an hour of day falls inside the window.
    pub fn contains_hour(&self, hour: f64) -> bool {
        let h = hour.rem_euclid(HOURS_PER_DAY);
        if self.start_hour == self.end_hour {
            true
        } else if self.wraps() {
            h >= self.start_hour || h < self.end_hour
        } else {
            h >= self.start_hour && h < self.end_hour
        }
    }

    /// Whether `t` falls inside the window.
    #[inline]
    pub fn contains(&self, t: SimTime) -> bool {
        self.contains_hour(t.hour_of_day())
    }

    /// Hours from `t` until the window next opens (0 if open now).
    pub fn hours_until_open(&self, t: SimTime) -> f64 {
        if self.contains(t) {
            return 0.0;
        }
        (self.start_hour - t.hour_of_day()).rem_euclid(HOURS_PER_DAY)
    }
}

impl Default for DailyWindow {
    /// The overnight maintenance window, 22:00–06:00.
    fn default() -> Self {
        Self::new(22.0, 6.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overnight_window() {
        let w = DailyWindow::default();
        assert!(w.wraps());
        assert!(w.contains(SimTime(23.0)));
        assert!(w.contains(SimTime(24.0 + 3.0)));
        assert!(w.contains(SimTime(22.0)));
        assert!(!w.contains(SimTime(6.0)));
        assert!(!w.contains(SimTime(12.0)));
        assert!((w.duration_hours() - 8.0).abs() < 1e-10);
    }

    #[test]
    fn test_day_window() {
        let w = DailyWindow::new(8.0, 17.0);
        assert!(!w.wraps());
        assert!(w.contains(SimTime(8.0)));
        assert!(!w.contains(SimTime(17.0)));
        assert!((w.duration_hours() - 9.0).abs() < 1e-10);
    }

    #[test]
    fn test_hours_until_open() {
        let w = DailyWindow::default();
        assert!((w.hours_until_open(SimTime(12.0)) - 10.0).abs() < 1e-10);
        assert_eq!(w.hours_until_open(SimTime(23.5)), 0.0);
        assert!((w.hours_until_open(SimTime(30.0)) - 16.0).abs() < 1e-10);
    }

    #[test]
    fn test_always_window() {
        let all = DailyWindow::always();
        assert!(all.contains(SimTime(13.37)));
        assert!((all.duration_hours() - 24.0).abs() < 1e-10);
    }
}
