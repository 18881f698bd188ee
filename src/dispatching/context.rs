//! Dispatch context for rule evaluation.

use crate::sim::SimTime;

/// Runtime state passed to dispatching rules.
///
/// Holds the current logical time, the anti-starvation aging rate and
/// the season flag.
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    /// Current simulation time.
    pub now: SimTime,
    /// Score reduction per hour of waiting (0 disables aging).
    pub aging_rate: f64,
    /// Whether the port runs in peak-season mode.
    pub peak_season: bool,
}

impl DispatchContext {
    /// Creates a context at the given time.
    pub fn at(now: SimTime) -> Self {
        Self {
            now,
            ..Default::default()
        }
    }

    /// Sets the aging rate (score units per hour waited).
    pub fn with_aging_rate(mut self, rate: f64) -> Self {
        self.aging_rate = rate;
        self
    }

    /// Enables peak-season mode.
    pub fn with_peak_season(mut self, peak: bool) -> Self {
        self.peak_season = peak;
        self
    }

    /// Hours an item queued at `since` has been waiting.
    pub fn waited(&self, since: SimTime) -> f64 {
        self.now.since(since)
    }
}
