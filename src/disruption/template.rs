//! Disruption templates and recovery strategies.
//!
//! A template is the static description of a kind of disruption: how
//! often it happens, how bad it is, which areas it hits and which other
//! disruptions it may set off. Events are instantiated from templates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{PortError, PortResult};

/// Broad cause of a disruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DisruptionCategory {
    Weather,
    Labor,
    Cyber,
    Equipment,
    Regulatory,
    Health,
    Infrastructure,
}

impl fmt::Display for DisruptionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Static description of a disruption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisruptionTemplate {
    /// Library key, e.g. `TYPHOON_SEVERE`.
    pub id: String,
    pub name: String,
    pub category: DisruptionCategory,
    /// 1 (minor) ..= 5 (catastrophic).
    pub severity: u8,
    /// Expected occurrences per year.
    pub annual_probability: f64,
    /// Hours the disruption stays active.
    pub duration_hours: f64,
    /// Nominal hours needed to recover after it ends.
    pub recovery_hours: f64,
    /// Affected area (node id or node kind) → impact weight.
    pub affected_areas: BTreeMap<String, f64>,
    /// Region filter; `None` hits every region.
    pub region: Option<String>,
    /// Templates this one may set off while active.
    pub cascading_ids: Vec<String>,
}

impl DisruptionTemplate {
    /// Creates a template with no affected areas.
    pub fn new(
        id: impl Into<String>,
        category: DisruptionCategory,
        severity: u8,
        duration_hours: f64,
        recovery_hours: f64,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.replace('_', " ").to_lowercase(),
            id,
            category,
            severity: severity.clamp(1, 5),
            annual_probability: 0.0,
            duration_hours,
            recovery_hours,
            affected_areas: BTreeMap::new(),
            region: None,
            cascading_ids: Vec::new(),
        }
    }

    /// Sets the annual probability.
    pub fn with_probability(mut self, annual: f64) -> Self {
        self.annual_probability = annual;
        self
    }

    /// Adds an affected area.
    pub fn with_area(mut self, area: impl Into<String>, weight: f64) -> Self {
        self.affected_areas.insert(area.into(), weight);
        self
    }

    /// Restricts the template to one region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Declares a cascade target.
    pub fn with_cascade(mut self, id: impl Into<String>) -> Self {
        self.cascading_ids.push(id.into());
        self
    }

    /// Per-hour trigger probability.
    #[inline]
    pub fn hourly_probability(&self) -> f64 {
        (self.annual_probability / crate::sim::HOURS_PER_YEAR).clamp(0.0, 1.0)
    }

    /// Checks ranges.
    pub fn validate(&self) -> PortResult<()> {
        let field = |name: &str| format!("disruption[{}].{name}", self.id);
        if !(1..=5).contains(&self.severity) {
            return Err(PortError::config(field("severity"), "must be within 1..=5"));
        }
        if !(0.0..=8760.0).contains(&self.annual_probability) {
            return Err(PortError::config(field("annual_probability"), "must be within [0, 8760]"));
        }
        if self.duration_hours < 0.0 || self.recovery_hours < 0.0 {
            return Err(PortError::config(field("duration_hours"), "durations must be non-negative"));
        }
        if self.affected_areas.values().any(|w| !(0.0..=5.0).contains(w)) {
            return Err(PortError::config(field("affected_areas"), "weights must be within [0, 5]"));
        }
        Ok(())
    }
}

/// A response plan that shortens recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryStrategy {
    pub id: String,
    pub name: String,
    /// Categories it applies to.
    pub categories: Vec<DisruptionCategory>,
    pub min_severity: u8,
    pub max_severity: u8,
    /// Fraction of nominal recovery time saved, in [0, 1).
    pub effectiveness: f64,
    pub cost: f64,
}

impl RecoveryStrategy {
    /// Whether the strategy applies to a category and severity.
    pub fn applies_to(&self, category: DisruptionCategory, severity: u8) -> bool {
        self.categories.contains(&category)
            && (self.min_severity..=self.max_severity).contains(&severity)
    }
}

/// Picks the most effective applicable strategy (ties by id).
pub fn best_strategy<'a>(
    strategies: &'a [RecoveryStrategy],
    category: DisruptionCategory,
    severity: u8,
) -> Option<&'a RecoveryStrategy> {
    strategies
        .iter()
        .filter(|s| s.applies_to(category, severity))
        .max_by(|a, b| {
            a.effectiveness
                .total_cmp(&b.effectiveness)
                .then_with(|| b.id.cmp(&a.id))
        })
}

/// The built-in template library.
pub fn builtin_templates() -> Vec<DisruptionTemplate> {
    use DisruptionCategory::*;
    vec![
        DisruptionTemplate::new("TYPHOON_SEVERE", Weather, 5, 48.0, 72.0)
            .with_probability(0.3)
            .with_area("port_operations", 1.0)
            .with_area("yard_operations", 0.8)
            .with_area("land_transport", 0.5)
            .with_cascade("RAIL_DERAILMENT")
            .with_cascade("CRANE_COLLAPSE"),
        DisruptionTemplate::new("STORM_MODERATE", Weather, 2, 12.0, 12.0)
            .with_probability(4.0)
            .with_area("port_operations", 1.0)
            .with_area("yard_operations", 0.5),
        DisruptionTemplate::new("LABOR_STRIKE", Labor, 4, 72.0, 24.0)
            .with_probability(0.5)
            .with_area("port_operations", 1.0)
            .with_area("yard_operations", 1.0)
            .with_area("land_transport", 0.3)
            .with_cascade("CUSTOMS_SYSTEM_OUTAGE"),
        DisruptionTemplate::new("CYBER_ATTACK", Cyber, 4, 24.0, 48.0)
            .with_probability(0.2)
            .with_area("customs", 1.0)
            .with_area("yard_operations", 0.6)
            .with_area("port_operations", 0.4)
            .with_cascade("CUSTOMS_SYSTEM_OUTAGE"),
        DisruptionTemplate::new("CRANE_COLLAPSE", Equipment, 3, 8.0, 96.0)
            .with_probability(0.1)
            .with_area("port_operations", 0.7),
        DisruptionTemplate::new("CUSTOMS_SYSTEM_OUTAGE", Regulatory, 2, 6.0, 6.0)
            .with_probability(2.0)
            .with_area("customs", 1.0)
            .with_area("land_transport", 0.5),
        DisruptionTemplate::new("PANDEMIC_WAVE", Health, 3, 336.0, 168.0)
            .with_probability(0.05)
            .with_area("port_operations", 0.5)
            .with_area("yard_operations", 0.5)
            .with_area("land_transport", 0.5)
            .with_cascade("LABOR_STRIKE"),
        DisruptionTemplate::new("RAIL_DERAILMENT", Infrastructure, 3, 24.0, 48.0)
            .with_probability(0.4)
            .with_area("rail", 1.0)
            .with_area("land_transport", 0.4),
    ]
}

/// The built-in recovery strategies.
pub fn builtin_strategies() -> Vec<RecoveryStrategy> {
    use DisruptionCategory::*;
    let strategy = |id: &str, categories: Vec<DisruptionCategory>, min: u8, max: u8, eff: f64, cost: f64| {
        RecoveryStrategy {
            id: id.to_string(),
            name: id.replace('_', " ").to_lowercase(),
            categories,
            min_severity: min,
            max_severity: max,
            effectiveness: eff,
            cost,
        }
    };
    vec![
        strategy("EMERGENCY_RESPONSE_TEAM", vec![Weather, Infrastructure, Equipment], 3, 5, 0.3, 250_000.0),
        strategy("WEATHER_CONTINGENCY", vec![Weather], 1, 3, 0.2, 40_000.0),
        strategy("LABOR_NEGOTIATION", vec![Labor], 1, 5, 0.25, 100_000.0),
        strategy("IT_INCIDENT_RESPONSE", vec![Cyber, Regulatory], 1, 5, 0.4, 150_000.0),
        strategy("EQUIPMENT_REDEPLOYMENT", vec![Equipment], 1, 4, 0.35, 80_000.0),
        strategy("HEALTH_PROTOCOLS", vec![Health], 1, 5, 0.15, 60_000.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_library_is_valid_and_closed() {
        let templates = builtin_templates();
        assert_eq!(templates.len(), 8);
        for t in &templates {
            t.validate().unwrap();
            for cascade in &t.cascading_ids {
                assert!(templates.iter().any(|o| &o.id == cascade), "{cascade}");
            }
        }
    }

    #[test]
    fn test_hourly_probability() {
        let t = DisruptionTemplate::new("X", DisruptionCategory::Weather, 1, 1.0, 1.0).with_probability(8.76);
        assert!((t.hourly_probability() - 0.001).abs() < 1e-12);
    }

    #[test]
    fn test_best_strategy_max_effectiveness() {
        let strategies = builtin_strategies();
        let best = best_strategy(&strategies, DisruptionCategory::Weather, 5).unwrap();
        assert_eq!(best.id, "EMERGENCY_RESPONSE_TEAM");
        let best = best_strategy(&strategies, DisruptionCategory::Weather, 2).unwrap();
        assert_eq!(best.id, "WEATHER_CONTINGENCY");
        let best = best_strategy(&strategies, DisruptionCategory::Equipment, 3).unwrap();
        assert_eq!(best.id, "EQUIPMENT_REDEPLOYMENT");
        assert!(best_strategy(&[], DisruptionCategory::Labor, 1).is_none());
    }

    #[test]
    fn test_validate_ranges() {
        let mut t = DisruptionTemplate::new("BAD", DisruptionCategory::Cyber, 3, 1.0, 1.0);
        t.severity = 9;
        assert!(t.validate().is_err());
        let t = DisruptionTemplate::new("BAD", DisruptionCategory::Cyber, 3, -1.0, 1.0);
        assert!(t.validate().is_err());
    }
}
