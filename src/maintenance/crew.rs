//! Maintenance crews.
//!
//! A crew is a human resource with a headcount, a skill set and an hourly
//! rate per worker. A task needs one free crew that is large enough and
//! holds every required skill.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::MaintenanceTask;
use crate::config::CrewConfig;
use crate::error::{PortError, PortResult};

/// A maintenance crew.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceCrew {
    pub id: String,
    pub size: u32,
    pub skills: Vec<String>,
    /// Cost per worker-hour.
    pub hourly_rate: f64,
    /// Task currently worked on.
    pub current_task: Option<String>,
    pub hours_worked: f64,
    pub tasks_completed: u32,
}

impl MaintenanceCrew {
    pub fn new(id: impl Into<String>, size: u32, hourly_rate: f64) -> Self {
        Self {
            id: id.into(),
            size,
            skills: Vec::new(),
            hourly_rate,
            current_task: None,
            hours_worked: 0.0,
            tasks_completed: 0,
        }
    }

    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skills.push(skill.into());
        self
    }

    pub fn from_config(config: &CrewConfig) -> Self {
        Self {
            skills: config.skills.clone(),
            ..Self::new(config.id.clone(), config.size, config.hourly_rate)
        }
    }

    pub fn has_skill(&self, skill: &str) -> bool {
        self.skills.iter().any(|s| s == skill)
    }

    pub fn is_free(&self) -> bool {
        self.current_task.is_none()
    }

    /// Whether the crew is qualified for the task (ignores availability).
    pub fn qualifies_for(&self, task: &MaintenanceTask) -> bool {
        self.size >= task.required_crew_size
            && task.required_skills.iter().all(|s| self.has_skill(s))
    }

    /// Labour cost of `hours` of work.
    pub fn labour_cost(&self, hours: f64) -> f64 {
        self.size as f64 * self.hourly_rate * hours
    }
}

/// All crews, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct CrewRoster {
    crews: BTreeMap<String, MaintenanceCrew>,
}

impl CrewRoster {
    pub fn new(crews: impl IntoIterator<Item = MaintenanceCrew>) -> Self {
        Self {
            crews: crews.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }

    pub fn from_config(configs: &[CrewConfig]) -> Self {
        Self::new(configs.iter().map(MaintenanceCrew::from_config))
    }

    pub fn get(&self, id: &str) -> Option<&MaintenanceCrew> {
        self.crews.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaintenanceCrew> {
        self.crews.values()
    }

    /// The smallest free crew qualified for the task (ties by id).
    pub fn find_available(&self, task: &MaintenanceTask) -> Option<&str> {
        self.crews
            .values()
            .filter(|c| c.is_free() && c.qualifies_for(task))
            .min_by_key(|c| c.size)
            .map(|c| c.id.as_str())
    }

    /// Whether some crew could ever take the task.
    pub fn any_qualified(&self, task: &MaintenanceTask) -> bool {
        self.crews.values().any(|c| c.qualifies_for(task))
    }

    /// Marks a crew busy with a task.
    pub fn assign(&mut self, crew_id: &str, task_id: &str) -> PortResult<()> {
        let crew = self
            .crews
            .get_mut(crew_id)
            .ok_or_else(|| PortError::unknown("crew", crew_id))?;
        if let Some(current) = &crew.current_task {
            return Err(PortError::transition(
                format!("crew {crew_id}"),
                format!("busy({current})"),
                format!("busy({task_id})"),
            ));
        }
        crew.current_task = Some(task_id.to_string());
        Ok(())
    }

    /// Frees a crew and books the hours. Returns the labour cost.
    pub fn release(&mut self, crew_id: &str, hours: f64) -> PortResult<f64> {
        let crew = self
            .crews
            .get_mut(crew_id)
            .ok_or_else(|| PortError::unknown("crew", crew_id))?;
        crew.current_task = None;
        crew.hours_worked += hours;
        crew.tasks_completed += 1;
        Ok(crew.labour_cost(hours))
    }

    pub fn busy_count(&self) -> usize {
        self.crews.values().filter(|c| !c.is_free()).count()
    }

    pub fn reset(&mut self) {
        for crew in self.crews.values_mut() {
            crew.current_task = None;
            crew.hours_worked = 0.0;
            crew.tasks_completed = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maintenance::{MaintenancePriority, MaintenanceType};
    use crate::models::{Equipment, EquipmentType};
    use crate::sim::SimTime;

    fn task(equipment_type: EquipmentType, kind: MaintenanceType) -> MaintenanceTask {
        let eq = Equipment::new("X-01", equipment_type);
        MaintenanceTask::new("MT-1", &eq, kind, MaintenancePriority::Medium, SimTime::ZERO)
    }

    fn roster() -> CrewRoster {
        CrewRoster::from_config(&[
            CrewConfig::new("CREW-A", 3, &["mechanical", "electrical"], 85.0),
            CrewConfig::new("CREW-B", 2, &["mechanical", "hydraulic"], 75.0),
            CrewConfig::new("CREW-C", 4, &["mechanical", "electrical", "hydraulic"], 95.0),
        ])
    }

    #[test]
    fn test_smallest_qualified_crew() {
        let roster = roster();
        // Preventive RTG: 2 workers, mechanical + hydraulic.
        let t = task(EquipmentType::Rtg, MaintenanceType::Preventive);
        assert_eq!(roster.find_available(&t), Some("CREW-B"));
        // Corrective RTG needs 3: only CREW-C has hydraulic and size ≥ 3.
        let t = task(EquipmentType::Rtg, MaintenanceType::Corrective);
        assert_eq!(roster.find_available(&t), Some("CREW-C"));
    }

    #[test]
    fn test_busy_crew_is_skipped() {
        let mut roster = roster();
        let t = task(EquipmentType::QuayCrane, MaintenanceType::Corrective);
        assert_eq!(roster.find_available(&t), Some("CREW-A"));
        roster.assign("CREW-A", "MT-1").unwrap();
        assert!(roster.assign("CREW-A", "MT-2").is_err());
        assert_eq!(roster.find_available(&t), Some("CREW-C"));
        roster.assign("CREW-C", "MT-3").unwrap();
        assert_eq!(roster.find_available(&t), None);
        assert_eq!(roster.busy_count(), 2);

        let cost = roster.release("CREW-A", 2.0).unwrap();
        assert!((cost - 3.0 * 85.0 * 2.0).abs() < 1e-9);
        assert!(roster.get("CREW-A").unwrap().is_free());
    }

    #[test]
    fn test_overhaul_needs_four() {
        let roster = roster();
        let t = task(EquipmentType::Tractor, MaintenanceType::Overhaul);
        assert_eq!(roster.find_available(&t), Some("CREW-C"));
        let t = t.with_crew_size(5);
        assert!(!roster.any_qualified(&t));
    }
}
