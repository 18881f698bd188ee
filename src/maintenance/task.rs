//! Maintenance task model.
//!
//! # Defaults per type
//!
//! | Type | Hours | Crew | Parts | Restore |
//! |------|-------|------|-------|---------|
//! | Preventive | 4 | 2 | filter_set | +20 |
//! | Corrective | 6 | 3 | hydraulic_kit | +30 |
//! | Predictive | 3 | 2 | sensor_pack | +25 |
//! | Emergency | 8 | 3 | hydraulic_kit, electrical_kit | +40 |
//! | Inspection | 1 | 1 | none | +5 |
//! | Overhaul | 24 | 4 | overhaul_kit | set to 95 |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::dispatching::Dispatchable;
use crate::models::{ConditionRestore, Equipment, EquipmentType};
use crate::sim::SimTime;

/// Kind of maintenance work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MaintenanceType {
    Preventive,
    Corrective,
    Predictive,
    Emergency,
    Inspection,
    Overhaul,
}

impl MaintenanceType {
    /// Estimated hours of work.
    pub fn default_duration(self) -> f64 {
        match self {
            Self::Preventive => 4.0,
            Self::Corrective => 6.0,
            Self::Predictive => 3.0,
            Self::Emergency => 8.0,
            Self::Inspection => 1.0,
            Self::Overhaul => 24.0,
        }
    }

    /// Minimum crew size.
    pub fn crew_size(self) -> u32 {
        match self {
            Self::Inspection => 1,
            Self::Preventive | Self::Predictive => 2,
            Self::Corrective | Self::Emergency => 3,
            Self::Overhaul => 4,
        }
    }

    /// Parts consumed (part id, quantity).
    pub fn default_parts(self) -> &'static [(&'static str, u32)] {
        match self {
            Self::Preventive => &[("filter_set", 1)],
            Self::Corrective => &[("hydraulic_kit", 1)],
            Self::Predictive => &[("sensor_pack", 1)],
            Self::Emergency => &[("hydraulic_kit", 1), ("electrical_kit", 1)],
            Self::Inspection => &[],
            Self::Overhaul => &[("overhaul_kit", 1)],
        }
    }

    /// Condition change on completion.
    pub fn restore(self) -> ConditionRestore {
        match self {
            Self::Preventive => ConditionRestore::Increase(20.0),
            Self::Corrective => ConditionRestore::Increase(30.0),
            Self::Predictive => ConditionRestore::Increase(25.0),
            Self::Emergency => ConditionRestore::Increase(40.0),
            Self::Inspection => ConditionRestore::Increase(5.0),
            Self::Overhaul => ConditionRestore::SetTo(95.0),
        }
    }

    /// Whether completion restarts the preventive interval.
    pub fn resets_preventive_clock(self) -> bool {
        matches!(self, Self::Preventive | Self::Overhaul)
    }

    /// Lower-case name used in statistics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preventive => "preventive",
            Self::Corrective => "corrective",
            Self::Predictive => "predictive",
            Self::Emergency => "emergency",
            Self::Inspection => "inspection",
            Self::Overhaul => "overhaul",
        }
    }
}

impl fmt::Display for MaintenanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task urgency. Critical = 1 … Routine = 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MaintenancePriority {
    Critical = 1,
    High = 2,
    Medium = 3,
    Low = 4,
    Routine = 5,
}

impl MaintenancePriority {
    #[inline]
    pub fn value(self) -> f64 {
        self as u8 as f64
    }
}

/// Skills a crew needs to work on an equipment class.
pub fn required_skills(equipment_type: EquipmentType) -> &'static [&'static str] {
    match equipment_type {
        EquipmentType::QuayCrane => &["mechanical", "electrical"],
        EquipmentType::Rtg => &["mechanical", "hydraulic"],
        EquipmentType::ReachStacker => &["hydraulic"],
        EquipmentType::Tractor | EquipmentType::StraddleCarrier => &["mechanical"],
    }
}

/// A unit of maintenance work on one piece of equipment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceTask {
    pub id: String,
    pub equipment_id: String,
    pub equipment_type: EquipmentType,
    pub maintenance_type: MaintenanceType,
    pub priority: MaintenancePriority,
    pub estimated_duration: f64,
    pub actual_duration: Option<f64>,
    pub required_crew_size: u32,
    pub required_skills: Vec<String>,
    /// Part id → quantity.
    pub required_parts: BTreeMap<String, u32>,
    pub estimated_cost: f64,
    pub actual_cost: Option<f64>,
    pub created_at: SimTime,
    pub started_at: Option<SimTime>,
    pub completed_at: Option<SimTime>,
    pub crew_id: Option<String>,
    /// Equipment condition when the queue was last ranked.
    pub condition_score: f64,
    /// Whether preventive service was past due when last ranked.
    pub overdue: bool,
}

impl MaintenanceTask {
    /// Creates a task with the defaults of its type.
    pub fn new(
        id: impl Into<String>,
        equipment: &Equipment,
        maintenance_type: MaintenanceType,
        priority: MaintenancePriority,
        created_at: SimTime,
    ) -> Self {
        Self {
            id: id.into(),
            equipment_id: equipment.id.clone(),
            equipment_type: equipment.equipment_type,
            maintenance_type,
            priority,
            estimated_duration: maintenance_type.default_duration(),
            actual_duration: None,
            required_crew_size: maintenance_type.crew_size(),
            required_skills: required_skills(equipment.equipment_type)
                .iter()
                .map(|s| s.to_string())
                .collect(),
            required_parts: maintenance_type
                .default_parts()
                .iter()
                .map(|(p, q)| (p.to_string(), *q))
                .collect(),
            estimated_cost: 0.0,
            actual_cost: None,
            created_at,
            started_at: None,
            completed_at: None,
            crew_id: None,
            condition_score: equipment.condition_score,
            overdue: equipment.is_overdue(created_at),
        }
    }

    pub fn with_duration(mut self, hours: f64) -> Self {
        self.estimated_duration = hours.max(0.0);
        self
    }

    pub fn with_crew_size(mut self, size: u32) -> Self {
        self.required_crew_size = size;
        self
    }

    pub fn with_skills(mut self, skills: &[&str]) -> Self {
        self.required_skills = skills.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_parts(mut self, parts: &[(&str, u32)]) -> Self {
        self.required_parts = parts.iter().map(|(p, q)| (p.to_string(), *q)).collect();
        self
    }

    pub fn with_estimated_cost(mut self, cost: f64) -> Self {
        self.estimated_cost = cost;
        self
    }

    /// `100 − condition` at the last refresh.
    #[inline]
    pub fn condition_deficit(&self) -> f64 {
        100.0 - self.condition_score
    }

    /// Hours between creation and start, if started.
    pub fn wait_hours(&self) -> Option<f64> {
        self.started_at.map(|s| s.since(self.created_at))
    }

    pub fn is_emergency(&self) -> bool {
        self.maintenance_type == MaintenanceType::Emergency
    }

    /// Updates the ranking snapshot from the live equipment record.
    pub fn refresh(&mut self, equipment: &Equipment, now: SimTime) {
        self.condition_score = equipment.condition_score;
        self.overdue = equipment.is_overdue(now);
    }
}

impl Dispatchable for MaintenanceTask {
    fn dispatch_id(&self) -> &str {
        &self.id
    }

    fn queued_at(&self) -> SimTime {
        self.created_at
    }
}
