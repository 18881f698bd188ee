//! Configuration integrity checks.
//!
//! Checks a [`PortConfig`] before any simulation state is built. Detects:
//! - Duplicate IDs (berths, crews, parts, locations, nodes, templates)
//! - Unknown enumerated types (berth, equipment, truck, location, node kinds)
//! - Non-positive capacities and counts
//! - Dangling references (truck home locations)
//! - Probabilities and rates out of range
//!
//! Every problem is reported, each naming the offending field.

use std::collections::HashSet;

use crate::config::PortConfig;
use crate::disruption::NodeKind;
use crate::models::{EquipmentType, ShipType};
use crate::trucks::{LocationKind, TruckType};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Dotted path of the offending field, e.g. `berths[B1].crane_count`.
    pub field: String,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities share the same ID.
    DuplicateId,
    /// A type or kind string is not recognised.
    UnknownType,
    /// A capacity, count or duration is not positive.
    NonPositive,
    /// An ID refers to an entity that does not exist.
    InvalidReference,
    /// A probability or rate lies outside its range.
    OutOfRange,
    /// A required collection is empty.
    Empty,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.into(),
            message: message.into(),
        }
    }
}

struct Collector {
    errors: Vec<ValidationError>,
}

impl Collector {
    fn push(&mut self, kind: ValidationErrorKind, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError::new(kind, field, message));
    }

    fn unique<'a>(&mut self, section: &str, ids: impl Iterator<Item = &'a str>) {
        let mut seen = HashSet::new();
        for id in ids {
            if !seen.insert(id) {
                self.push(
                    ValidationErrorKind::DuplicateId,
                    format!("{section}[{id}].id"),
                    format!("duplicate {section} ID: {id}"),
                );
            }
        }
    }

    fn positive(&mut self, field: impl Into<String>, value: f64) {
        if !(value > 0.0) {
            self.push(ValidationErrorKind::NonPositive, field, format!("must be positive, got {value}"));
        }
    }

    fn probability(&mut self, field: impl Into<String>, value: f64) {
        if !(0.0..=1.0).contains(&value) {
            self.push(ValidationErrorKind::OutOfRange, field, format!("must lie in [0, 1], got {value}"));
        }
    }

    fn known(&mut self, field: impl Into<String>, value: &str, ok: bool) {
        if !ok {
            self.push(ValidationErrorKind::UnknownType, field, format!("unknown type '{value}'"));
        }
    }
}

/// Validates a port configuration.
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with every detected issue in
/// section order.
pub fn validate_config(config: &PortConfig) -> ValidationResult {
    let mut c = Collector { errors: Vec::new() };

    let sim = &config.simulation;
    c.positive("simulation.mean_interarrival_hours", sim.mean_interarrival_hours);
    c.positive("simulation.ship_poll_interval_hours", sim.ship_poll_interval_hours);
    c.positive("simulation.allocation_interval_hours", sim.allocation_interval_hours);
    c.probability("simulation.container_ship_share", sim.container_ship_share);
    c.probability("simulation.bulk_ship_share", sim.bulk_ship_share);
    if sim.container_ship_share + sim.bulk_ship_share > 1.0 + 1e-9 {
        c.push(
            ValidationErrorKind::OutOfRange,
            "simulation.bulk_ship_share",
            "container and bulk shares exceed 1",
        );
    }
    if sim.min_ship_teu == 0 || sim.min_ship_teu > sim.max_ship_teu {
        c.push(
            ValidationErrorKind::OutOfRange,
            "simulation.min_ship_teu",
            "must be positive and not above max_ship_teu",
        );
    }
    if sim.min_moves_per_teu < 0.0 || sim.min_moves_per_teu > sim.max_moves_per_teu {
        c.push(
            ValidationErrorKind::OutOfRange,
            "simulation.min_moves_per_teu",
            "must be non-negative and not above max_moves_per_teu",
        );
    }

    if config.berths.is_empty() {
        c.push(ValidationErrorKind::Empty, "berths", "at least one berth is required");
    }
    c.unique("berths", config.berths.iter().map(|b| b.id.as_str()));
    for b in &config.berths {
        c.known(
            format!("berths[{}].berth_type", b.id),
            &b.berth_type,
            ShipType::parse(&b.berth_type).is_some(),
        );
        c.positive(format!("berths[{}].capacity", b.id), b.capacity as f64);
        c.positive(format!("berths[{}].crane_count", b.id), b.crane_count as f64);
    }

    for (i, g) in config.equipment.iter().enumerate() {
        c.known(
            format!("equipment[{i}].equipment_type"),
            &g.equipment_type,
            EquipmentType::parse(&g.equipment_type).is_some(),
        );
        c.positive(format!("equipment[{i}].count"), g.count as f64);
        if g.age_years < 0.0 {
            c.push(ValidationErrorKind::OutOfRange, format!("equipment[{i}].age_years"), "must not be negative");
        }
    }

    c.unique("locations", config.locations.iter().map(|l| l.id.as_str()));
    for l in &config.locations {
        c.known(format!("locations[{}].kind", l.id), &l.kind, LocationKind::parse(&l.kind).is_some());
        if !(-90.0..=90.0).contains(&l.latitude) || !(-180.0..=180.0).contains(&l.longitude) {
            c.push(
                ValidationErrorKind::OutOfRange,
                format!("locations[{}].latitude", l.id),
                "coordinates out of range",
            );
        }
    }
    let locations: HashSet<&str> = config.locations.iter().map(|l| l.id.as_str()).collect();
    for (i, g) in config.trucks.iter().enumerate() {
        c.known(format!("trucks[{i}].truck_type"), &g.truck_type, TruckType::parse(&g.truck_type).is_some());
        c.positive(format!("trucks[{i}].count"), g.count as f64);
        c.positive(format!("trucks[{i}].average_speed_kmh"), g.average_speed_kmh);
        if !locations.contains(g.home_location.as_str()) {
            c.push(
                ValidationErrorKind::InvalidReference,
                format!("trucks[{i}].home_location"),
                format!("unknown location '{}'", g.home_location),
            );
        }
    }

    c.unique("crews", config.crews.iter().map(|cr| cr.id.as_str()));
    for cr in &config.crews {
        c.positive(format!("crews[{}].size", cr.id), cr.size as f64);
        if cr.hourly_rate < 0.0 {
            c.push(ValidationErrorKind::OutOfRange, format!("crews[{}].hourly_rate", cr.id), "must not be negative");
        }
    }
    c.unique("spare_parts", config.spare_parts.iter().map(|p| p.id.as_str()));
    for p in &config.spare_parts {
        c.positive(format!("spare_parts[{}].lead_time_hours", p.id), p.lead_time_hours);
    }

    let y = &config.yard;
    for (name, v) in [("blocks", y.blocks), ("rows", y.rows), ("bays", y.bays), ("tiers", y.tiers)] {
        c.positive(format!("yard.{name}"), v as f64);
    }
    c.positive("yard.dwell_hours", y.dwell_hours);

    let o = &config.optimizer;
    c.positive("optimizer.population_size", o.population_size as f64);
    c.positive("optimizer.tournament_size", o.tournament_size as f64);
    c.positive("optimizer.moves_per_crane_hour", o.moves_per_crane_hour);
    c.probability("optimizer.elitism_rate", o.elitism_rate);
    c.probability("optimizer.crossover_rate", o.crossover_rate);
    c.probability("optimizer.mutation_rate", o.mutation_rate);
    if !(o.crane_efficiency_decay > 0.0 && o.crane_efficiency_decay <= 1.0) {
        c.push(ValidationErrorKind::OutOfRange, "optimizer.crane_efficiency_decay", "must lie in (0, 1]");
    }

    let m = &config.maintenance;
    for (name, v) in [("window_start_hour", m.window_start_hour), ("window_end_hour", m.window_end_hour)] {
        if !(0.0..=24.0).contains(&v) {
            c.push(ValidationErrorKind::OutOfRange, format!("maintenance.{name}"), "must lie in [0, 24]");
        }
    }
    c.positive("maintenance.max_concurrent_tasks", m.max_concurrent_tasks as f64);
    c.positive("maintenance.monitoring_interval_hours", m.monitoring_interval_hours);
    c.positive("maintenance.dispatch_interval_hours", m.dispatch_interval_hours);
    c.positive("maintenance.preventive_interval_hours", m.preventive_interval_hours);
    c.probability("maintenance.wear.base_failure_probability", m.wear.base_failure_probability);

    let d = &config.dispatch;
    c.positive("dispatch.dispatch_interval_hours", d.dispatch_interval_hours);
    c.positive("dispatch.traffic_update_interval_hours", d.traffic_update_interval_hours);
    c.probability("dispatch.min_fuel_level", d.min_fuel_level);
    c.probability("dispatch.refuel_threshold", d.refuel_threshold);

    let dis = &config.disruption;
    c.probability("disruption.complication_probability", dis.complication_probability);
    c.probability("disruption.cascade_base_probability", dis.cascade_base_probability);
    c.unique("disruption.templates", dis.templates.iter().map(|t| t.id.as_str()));
    for t in &dis.templates {
        if let Err(e) = t.validate() {
            c.push(ValidationErrorKind::OutOfRange, format!("disruption.templates[{}]", t.id), e.to_string());
        }
    }
    c.unique("disruption.nodes", dis.nodes.iter().map(|n| n.id.as_str()));
    for n in &dis.nodes {
        c.known(format!("disruption.nodes[{}].kind", n.id), &n.kind, NodeKind::parse(&n.kind).is_some());
        c.positive(format!("disruption.nodes[{}].baseline_capacity", n.id), n.baseline_capacity);
    }

    if c.errors.is_empty() {
        Ok(())
    } else {
        Err(c.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BerthConfig, CrewConfig, TruckGroupConfig};

    #[test]
    fn test_valid_default() {
        assert!(validate_config(&PortConfig::default()).is_ok());
    }

    #[test]
    fn test_duplicate_berth_id() {
        let mut config = PortConfig::default();
        config.berths.push(BerthConfig::new("B1", "bulk", 10_000, 1));
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::DuplicateId && e.field == "berths[B1].id"));
    }

    #[test]
    fn test_unknown_types() {
        let mut config = PortConfig::default();
        config.berths[1].berth_type = "tanker".into();
        config.equipment[0].equipment_type = "forklift".into();
        config.trucks[0].truck_type = "flatbed".into();
        let errors = validate_config(&config).unwrap_err();
        let unknown: Vec<&str> = errors
            .iter()
            .filter(|e| e.kind == ValidationErrorKind::UnknownType)
            .map(|e| e.field.as_str())
            .collect();
        assert_eq!(
            unknown,
            vec!["berths[B2].berth_type", "equipment[0].equipment_type", "trucks[0].truck_type"]
        );
    }

    #[test]
    fn test_invalid_home_location() {
        let mut config = PortConfig::default();
        config.trucks.push(TruckGroupConfig::new("standard", 1, "NOWHERE"));
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::InvalidReference));
    }

    #[test]
    fn test_probability_range() {
        let mut config = PortConfig::default();
        config.disruption.complication_probability = 1.5;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "disruption.complication_probability");
    }

    #[test]
    fn test_multiple_errors() {
        let mut config = PortConfig::default();
        config.berths.clear();
        config.crews.push(CrewConfig::new("CREW-A", 0, &[], 10.0));
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.len() >= 3);
        assert!(errors.iter().any(|e| e.kind == ValidationErrorKind::Empty));
    }
}
