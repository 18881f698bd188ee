//! Quay service-time model.
//!
//! # Formula
//!
//! ```text
//! effective_cranes = Σ_{i<n} decay^i
//! service_hours    = containers / (moves_per_crane_hour × effective_cranes)
//!                    × congestion + docking_overhead
//! ```
//!
//! Congestion is `peak_congestion_factor` in peak season and 1 otherwise.
//! Extra cranes on one ship interfere with each other, hence the decay.

use crate::config::OptimizerConfig;

/// Service-time parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceModel {
    pub moves_per_crane_hour: f64,
    pub crane_efficiency_decay: f64,
    pub peak_congestion_factor: f64,
    pub docking_overhead_hours: f64,
}

impl ServiceModel {
    pub fn from_config(config: &OptimizerConfig) -> Self {
        Self {
            moves_per_crane_hour: config.moves_per_crane_hour,
            crane_efficiency_decay: config.crane_efficiency_decay,
            peak_congestion_factor: config.peak_congestion_factor,
            docking_overhead_hours: config.docking_overhead_hours,
        }
    }

    /// Crane-equivalents delivered by `cranes` cranes on one ship.
    pub fn effective_cranes(&self, cranes: u32) -> f64 {
        (0..cranes)
            .map(|i| self.crane_efficiency_decay.powi(i as i32))
            .sum()
    }

    /// Hours of pure cargo handling (no docking overhead).
    pub fn handling_hours(&self, containers: u32, cranes: u32, peak_season: bool) -> f64 {
        let effective = self.effective_cranes(cranes.max(1));
        let rate = self.moves_per_crane_hour * effective;
        if rate <= 0.0 {
            return 0.0;
        }
        let congestion = if peak_season { self.peak_congestion_factor } else { 1.0 };
        containers as f64 / rate * congestion
    }

    /// Total berth occupation for a call.
    pub fn service_hours(&self, containers: u32, cranes: u32, peak_season: bool) -> f64 {
        self.handling_hours(containers, cranes, peak_season) + self.docking_overhead_hours
    }
}

impl Default for ServiceModel {
    fn default() -> Self {
        Self::from_config(&OptimizerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_cranes_decay() {
        let m = ServiceModel::default();
        assert!((m.effective_cranes(1) - 1.0).abs() < 1e-12);
        assert!((m.effective_cranes(3) - (1.0 + 0.9 + 0.81)).abs() < 1e-12);
        assert_eq!(m.effective_cranes(0), 0.0);
    }

    #[test]
    fn test_service_hours() {
        let m = ServiceModel::default();
        // 1000 containers, 2 cranes: 1000 / (25 × 1.9) + 1
        let expected = 1000.0 / (25.0 * 1.9) + 1.0;
        assert!((m.service_hours(1000, 2, false) - expected).abs() < 1e-9);
        let peak = 1000.0 / (25.0 * 1.9) * 1.3 + 1.0;
        assert!((m.service_hours(1000, 2, true) - peak).abs() < 1e-9);
    }
}
