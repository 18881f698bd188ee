//! Cargo-handling equipment and its wear model.
//!
//! # Degradation
//! Each operating hour lowers the condition score by
//! `base_rate × (1 + age/20 + hours/10 000) × overdue_factor`, where the
//! overdue factor is 1.5 once preventive maintenance is past due.
//!
//! # Failure
//! `p = base_prob × (1 + 10 × deficit + 5 × age_factor)` per hour, with
//! `deficit = (100 − condition)/100`. A uniform draw below `p` forces
//! BREAKDOWN.
//!
//! The condition score only ever rises through
//! [`Equipment::complete_maintenance`].

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{PortError, PortResult};
use crate::sim::SimTime;

/// Equipment class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EquipmentType {
    QuayCrane,
    Rtg,
    ReachStacker,
    Tractor,
    StraddleCarrier,
}

impl EquipmentType {
    /// Maintenance criticality (lower = more critical).
    pub fn criticality(self) -> f64 {
        match self {
            Self::QuayCrane => 0.0,
            Self::Rtg | Self::StraddleCarrier => 1.0,
            Self::ReachStacker => 2.0,
            Self::Tractor => 3.0,
        }
    }

    /// Short prefix used in generated ids.
    pub fn code(self) -> &'static str {
        match self {
            Self::QuayCrane => "QC",
            Self::Rtg => "RTG",
            Self::ReachStacker => "RS",
            Self::Tractor => "TR",
            Self::StraddleCarrier => "SC",
        }
    }

    /// Parses a type name such as `"quay_crane"` or `"RTG"`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "quay_crane" | "qc" => Some(Self::QuayCrane),
            "rtg" => Some(Self::Rtg),
            "reach_stacker" | "rs" => Some(Self::ReachStacker),
            "tractor" | "tr" => Some(Self::Tractor),
            "straddle_carrier" | "sc" => Some(Self::StraddleCarrier),
            _ => None,
        }
    }
}

impl fmt::Display for EquipmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Operational status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EquipmentStatus {
    Operational,
    Maintenance,
    Breakdown,
    Standby,
    OutOfService,
}

impl EquipmentStatus {
    /// Whether `self → to` is allowed.
    pub fn can_transition_to(self, to: EquipmentStatus) -> bool {
        use EquipmentStatus::*;
        match (self, to) {
            (OutOfService, _) => false,
            (_, OutOfService) => true,
            (Operational, Standby | Maintenance | Breakdown) => true,
            (Standby, Operational | Maintenance) => true,
            (Breakdown, Maintenance) => true,
            (Maintenance, Operational) => true,
            _ => false,
        }
    }
}

/// Wear parameters shared by a fleet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WearModel {
    /// Condition points lost per operating hour before modifiers.
    pub base_degradation_rate: f64,
    /// Hourly failure probability of new, perfect equipment.
    pub base_failure_probability: f64,
}

impl Default for WearModel {
    fn default() -> Self {
        Self {
            base_degradation_rate: 0.05,
            base_failure_probability: 0.0002,
        }
    }
}

/// How maintenance changes the condition score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConditionRestore {
    /// Adds points (capped at 100).
    Increase(f64),
    /// Sets an absolute score.
    SetTo(f64),
}

/// A piece of cargo-handling equipment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Equipment {
    pub id: String,
    pub equipment_type: EquipmentType,
    pub status: EquipmentStatus,
    /// Health score in [0, 100].
    pub condition_score: f64,
    pub operating_hours: f64,
    pub age_years: f64,
    pub failure_count: u32,
    pub last_maintenance_at: Option<SimTime>,
    pub next_maintenance_due: SimTime,
    pub total_downtime_hours: f64,
    pub total_maintenance_cost: f64,
}

impl Equipment {
    /// Creates new equipment in perfect condition.
    pub fn new(id: impl Into<String>, equipment_type: EquipmentType) -> Self {
        Self {
            id: id.into(),
            equipment_type,
            status: EquipmentStatus::Operational,
            condition_score: 100.0,
            operating_hours: 0.0,
            age_years: 0.0,
            failure_count: 0,
            last_maintenance_at: None,
            next_maintenance_due: SimTime(720.0),
            total_downtime_hours: 0.0,
            total_maintenance_cost: 0.0,
        }
    }

    /// Sets age in years.
    pub fn with_age(mut self, years: f64) -> Self {
        self.age_years = years.max(0.0);
        self
    }

    /// Sets the initial condition.
    pub fn with_condition(mut self, score: f64) -> Self {
        self.condition_score = score.clamp(0.0, 100.0);
        self
    }

    /// Sets accumulated operating hours.
    pub fn with_operating_hours(mut self, hours: f64) -> Self {
        self.operating_hours = hours.max(0.0);
        self
    }

    /// Sets when preventive maintenance is next due.
    pub fn with_next_maintenance_due(mut self, at: SimTime) -> Self {
        self.next_maintenance_due = at;
        self
    }

    /// `age_years / 20`.
    #[inline]
    pub fn age_factor(&self) -> f64 {
        self.age_years / 20.0
    }

    /// `(100 − condition) / 100`.
    #[inline]
    pub fn condition_deficit(&self) -> f64 {
        (100.0 - self.condition_score) / 100.0
    }

    /// Whether preventive maintenance is past due.
    #[inline]
    pub fn is_overdue(&self, now: SimTime) -> bool {
        self.next_maintenance_due < now
    }

    /// Whether the equipment can work right now.
    #[inline]
    pub fn is_available(&self) -> bool {
        self.status == EquipmentStatus::Operational
    }

    /// Validated status change.
    pub fn transition(&mut self, to: EquipmentStatus) -> PortResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(PortError::transition(
                format!("equipment {}", self.id),
                self.status,
                to,
            ));
        }
        self.status = to;
        Ok(())
    }

    /// Condition loss per hour at `now`.
    pub fn degradation_rate(&self, wear: &WearModel, now: SimTime) -> f64 {
        let usage_factor = self.operating_hours / 10_000.0;
        let overdue_factor = if self.is_overdue(now) { 1.5 } else { 1.0 };
        wear.base_degradation_rate * (1.0 + self.age_factor() + usage_factor) * overdue_factor
    }

    /// Applies `hours` of operation. Only operational equipment wears.
    pub fn degrade(&mut self, hours: f64, wear: &WearModel, now: SimTime) -> f64 {
        if self.status != EquipmentStatus::Operational || hours <= 0.0 {
            return self.condition_score;
        }
        let rate = self.degradation_rate(wear, now);
        self.operating_hours += hours;
        self.condition_score = (self.condition_score - rate * hours).clamp(0.0, 100.0);
        self.condition_score
    }

    /// Hourly failure probability.
    pub fn failure_probability(&self, wear: &WearModel) -> f64 {
        let p = wear.base_failure_probability
            * (1.0 + 10.0 * self.condition_deficit() + 5.0 * self.age_factor());
        p.clamp(0.0, 1.0)
    }

    /// Draws a breakdown. Returns `true` if the equipment just failed.
    pub fn roll_failure<R: Rng>(&mut self, wear: &WearModel, rng: &mut R) -> PortResult<bool> {
        if self.status != EquipmentStatus::Operational {
            return Ok(false);
        }
        let p = self.failure_probability(wear);
        if rng.random::<f64>() < p {
            self.transition(EquipmentStatus::Breakdown)?;
            self.failure_count += 1;
            return Ok(true);
        }
        Ok(false)
    }

    /// Takes the equipment out of service for maintenance.
    pub fn begin_maintenance(&mut self) -> PortResult<()> {
        self.transition(EquipmentStatus::Maintenance)
    }

    /// Finishes maintenance: restores condition, books downtime and cost,
    /// and returns the equipment to service.
    pub fn complete_maintenance(
        &mut self,
        restore: ConditionRestore,
        now: SimTime,
        downtime_hours: f64,
        cost: f64,
        next_due: Option<SimTime>,
    ) -> PortResult<()> {
        self.transition(EquipmentStatus::Operational)?;
        self.condition_score = match restore {
            ConditionRestore::Increase(points) => self.condition_score + points,
            ConditionRestore::SetTo(score) => score,
        }
        .clamp(0.0, 100.0);
        self.last_maintenance_at = Some(now);
        self.total_downtime_hours += downtime_hours.max(0.0);
        self.total_maintenance_cost += cost.max(0.0);
        if let Some(due) = next_due {
            self.next_maintenance_due = due;
        }
        Ok(())
    }
}

/// All equipment of the terminal, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct EquipmentFleet {
    items: BTreeMap<String, Equipment>,
}

impl EquipmentFleet {
    /// Creates an empty fleet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a unit; ids must be unique.
    pub fn add(&mut self, equipment: Equipment) -> PortResult<()> {
        if self.items.contains_key(&equipment.id) {
            return Err(PortError::config(
                format!("equipment[{}].id", equipment.id),
                "duplicate equipment id",
            ));
        }
        self.items.insert(equipment.id.clone(), equipment);
        Ok(())
    }

    /// Adds `count` units named `{code}-{nn}` after the existing ones of that type.
    pub fn add_group(
        &mut self,
        equipment_type: EquipmentType,
        count: u32,
        age_years: f64,
        preventive_interval: f64,
    ) -> PortResult<()> {
        let existing = self.count_of(equipment_type);
        for i in 0..count as usize {
            let id = format!("{}-{:02}", equipment_type.code(), existing + i + 1);
            self.add(
                Equipment::new(id, equipment_type)
                    .with_age(age_years)
                    .with_next_maintenance_due(SimTime(preventive_interval)),
            )?;
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Equipment> {
        self.items.get(id)
    }

    /// Mutable unit, or [`PortError::UnknownEntity`].
    pub fn get_mut(&mut self, id: &str) -> PortResult<&mut Equipment> {
        self.items
            .get_mut(id)
            .ok_or_else(|| PortError::unknown("equipment", id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Equipment> {
        self.items.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Equipment> {
        self.items.values_mut()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Units of one type.
    pub fn count_of(&self, equipment_type: EquipmentType) -> usize {
        self.items
            .values()
            .filter(|e| e.equipment_type == equipment_type)
            .count()
    }

    /// Share of units currently operational or on standby.
    pub fn availability(&self) -> f64 {
        if self.items.is_empty() {
            return 1.0;
        }
        let up = self
            .items
            .values()
            .filter(|e| matches!(e.status, EquipmentStatus::Operational | EquipmentStatus::Standby))
            .count();
        up as f64 / self.items.len() as f64
    }

    /// Operational units of one type.
    pub fn operational_count(&self, equipment_type: EquipmentType) -> usize {
        self.items
            .values()
            .filter(|e| e.equipment_type == equipment_type && e.is_available())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_degradation_formula() {
        let wear = WearModel {
            base_degradation_rate: 0.1,
            base_failure_probability: 0.001,
        };
        let mut eq = Equipment::new("QC-01", EquipmentType::QuayCrane)
            .with_age(10.0)
            .with_operating_hours(5_000.0)
            .with_next_maintenance_due(SimTime(100.0));

        // 0.1 × (1 + 0.5 + 0.5) = 0.2 per hour
        eq.degrade(10.0, &wear, SimTime(50.0));
        assert!((eq.condition_score - 98.0).abs() < 1e-9);

        // overdue: 0.1 × (1 + 0.5 + 0.501) × 1.5
        let rate = eq.degradation_rate(&wear, SimTime(200.0));
        assert!((rate - 0.1 * 2.001 * 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_condition_clamped_and_only_operational_wears() {
        let wear = WearModel::default();
        let mut eq = Equipment::new("TR-01", EquipmentType::Tractor).with_condition(0.5);
        eq.degrade(1000.0, &wear, SimTime::ZERO);
        assert_eq!(eq.condition_score, 0.0);

        let mut standby = Equipment::new("TR-02", EquipmentType::Tractor);
        standby.transition(EquipmentStatus::Standby).unwrap();
        standby.degrade(10.0, &wear, SimTime::ZERO);
        assert_eq!(standby.condition_score, 100.0);
        assert_eq!(standby.operating_hours, 0.0);
    }

    #[test]
    fn test_failure_probability_formula() {
        let wear = WearModel {
            base_degradation_rate: 0.05,
            base_failure_probability: 0.01,
        };
        let eq = Equipment::new("RTG-01", EquipmentType::Rtg)
            .with_condition(60.0)
            .with_age(4.0);
        // 0.01 × (1 + 10×0.4 + 5×0.2) = 0.06
        assert!((eq.failure_probability(&wear) - 0.06).abs() < 1e-12);
    }

    #[test]
    fn test_certain_failure_breaks_down() {
        let wear = WearModel {
            base_degradation_rate: 0.05,
            base_failure_probability: 1.0,
        };
        let mut eq = Equipment::new("RS-01", EquipmentType::ReachStacker);
        let mut rng = SmallRng::seed_from_u64(42);
        assert!(eq.roll_failure(&wear, &mut rng).unwrap());
        assert_eq!(eq.status, EquipmentStatus::Breakdown);
        assert_eq!(eq.failure_count, 1);
        // Broken equipment cannot fail again.
        assert!(!eq.roll_failure(&wear, &mut rng).unwrap());
    }

    #[test]
    fn test_status_transitions() {
        let mut eq = Equipment::new("QC-01", EquipmentType::QuayCrane);
        assert!(eq.transition(EquipmentStatus::Operational).is_err());
        eq.transition(EquipmentStatus::Breakdown).unwrap();
        assert!(eq.transition(EquipmentStatus::Operational).is_err());
        eq.begin_maintenance().unwrap();
        eq.transition(EquipmentStatus::OutOfService).unwrap();
        assert!(eq.transition(EquipmentStatus::Maintenance).is_err());
        assert_eq!(eq.status, EquipmentStatus::OutOfService);
    }

    #[test]
    fn test_complete_maintenance_restores() {
        let mut eq = Equipment::new("QC-01", EquipmentType::QuayCrane).with_condition(90.0);
        eq.begin_maintenance().unwrap();
        eq.complete_maintenance(ConditionRestore::Increase(20.0), SimTime(30.0), 4.0, 500.0, Some(SimTime(750.0)))
            .unwrap();
        assert_eq!(eq.condition_score, 100.0);
        assert_eq!(eq.status, EquipmentStatus::Operational);
        assert_eq!(eq.next_maintenance_due, SimTime(750.0));
        assert!((eq.total_downtime_hours - 4.0).abs() < 1e-12);

        eq.begin_maintenance().unwrap();
        eq.complete_maintenance(ConditionRestore::SetTo(95.0), SimTime(40.0), 1.0, 0.0, None)
            .unwrap();
        assert_eq!(eq.condition_score, 95.0);
        assert_eq!(eq.next_maintenance_due, SimTime(750.0));
    }

    #[test]
    fn test_fleet_groups_and_availability() {
        let mut fleet = EquipmentFleet::new();
        fleet.add_group(EquipmentType::QuayCrane, 3, 5.0, 720.0).unwrap();
        fleet.add_group(EquipmentType::QuayCrane, 1, 1.0, 720.0).unwrap();
        assert!(fleet.get("QC-04").is_some());
        assert_eq!(fleet.count_of(EquipmentType::QuayCrane), 4);

        fleet.get_mut("QC-01").unwrap().transition(EquipmentStatus::Breakdown).unwrap();
        assert!((fleet.availability() - 0.75).abs() < 1e-12);
        assert_eq!(fleet.operational_count(EquipmentType::QuayCrane), 3);
        assert!(fleet.get_mut("nope").is_err());
    }

    #[test]
    fn test_type_parse() {
        assert_eq!(EquipmentType::parse("Quay Crane"), Some(EquipmentType::QuayCrane));
        assert_eq!(EquipmentType::parse("straddle-carrier"), Some(EquipmentType::StraddleCarrier));
        assert_eq!(EquipmentType::parse("forklift"), None);
    }
}
