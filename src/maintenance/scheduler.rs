//! Maintenance backlog, dispatch and completion.
//!
//! # Dispatch
//! 1. Emergencies, oldest first, at any hour and above the concurrency cap.
//! 2. Regular tasks in score order, only inside the maintenance window and
//!    while fewer than `max_concurrent_tasks` are running.
//!
//! A task starts when its equipment can enter MAINTENANCE, a qualified
//! crew is free and every part is in stock. Otherwise it stays queued as is.
//!
//! # Duration
//! `actual = estimated × clamp(N(1, 0.15), 0.5, 2.0)`

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info};

use super::crew::CrewRoster;
use super::parts::PartsInventory;
use super::rules::maintenance_engine;
use super::{MaintenancePriority, MaintenanceTask, MaintenanceType};
use crate::config::{CrewConfig, MaintenanceConfig, SparePartConfig};
use crate::dispatching::{DispatchContext, DispatchQueue, RuleEngine};
use crate::error::{PortError, PortResult};
use crate::models::{DailyWindow, Equipment, EquipmentFleet, EquipmentStatus};
use crate::sim::SimTime;

/// Condition below which operating equipment gets corrective work.
const CORRECTIVE_THRESHOLD: f64 = 30.0;
/// Condition below which equipment gets predictive work.
const PREDICTIVE_THRESHOLD: f64 = 50.0;
const DURATION_SIGMA: f64 = 0.15;

/// A task that has just started.
#[derive(Debug, Clone, PartialEq)]
pub struct StartedTask {
    pub task_id: String,
    pub equipment_id: String,
    pub crew_id: String,
    pub duration: f64,
    pub completes_at: SimTime,
}

/// Cumulative maintenance statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaintenanceStats {
    pub tasks_created: u64,
    pub completed: u64,
    pub completed_by_type: BTreeMap<String, u64>,
    pub total_cost: f64,
    pub total_downtime_hours: f64,
    /// Sum of creation-to-start waits of completed tasks.
    pub total_wait_hours: f64,
}

impl MaintenanceStats {
    pub fn average_wait_hours(&self) -> f64 {
        if self.completed == 0 {
            0.0
        } else {
            self.total_wait_hours / self.completed as f64
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveTask {
    task: MaintenanceTask,
    parts_cost: f64,
}

/// The terminal's maintenance planner.
#[derive(Debug, Clone)]
pub struct MaintenanceScheduler {
    window: DailyWindow,
    max_concurrent: usize,
    aging_rate: f64,
    preventive_interval: f64,
    engine: RuleEngine<MaintenanceTask>,
    regular: DispatchQueue<MaintenanceTask>,
    emergency: VecDeque<MaintenanceTask>,
    active: BTreeMap<String, ActiveTask>,
    completed: Vec<MaintenanceTask>,
    crews: CrewRoster,
    parts: PartsInventory,
    next_id: u64,
    stats: MaintenanceStats,
}

impl MaintenanceScheduler {
    pub fn new(config: &MaintenanceConfig, crews: &[CrewConfig], parts: &[SparePartConfig]) -> Self {
        Self {
            window: DailyWindow::new(config.window_start_hour, config.window_end_hour),
            max_concurrent: config.max_concurrent_tasks,
            aging_rate: config.aging_rate,
            preventive_interval: config.preventive_interval_hours,
            engine: maintenance_engine(),
            regular: DispatchQueue::new(),
            emergency: VecDeque::new(),
            active: BTreeMap::new(),
            completed: Vec::new(),
            crews: CrewRoster::from_config(crews),
            parts: PartsInventory::from_config(parts),
            next_id: 1,
            stats: MaintenanceStats::default(),
        }
    }

    /// Creates a task with the next free id (not yet queued).
    pub fn create_task(
        &mut self,
        equipment: &Equipment,
        maintenance_type: MaintenanceType,
        priority: MaintenancePriority,
        now: SimTime,
    ) -> MaintenanceTask {
        let id = format!("MT-{:05}", self.next_id);
        self.next_id += 1;
        MaintenanceTask::new(id, equipment, maintenance_type, priority, now)
    }

    /// Queues a task. Emergencies go to their own FIFO.
    pub fn submit(&mut self, task: MaintenanceTask) -> String {
        let id = task.id.clone();
        debug!(
            task = %id,
            equipment = %task.equipment_id,
            kind = %task.maintenance_type,
            priority = ?task.priority,
            "maintenance task queued"
        );
        self.stats.tasks_created += 1;
        if task.is_emergency() {
            self.emergency.push_back(task);
        } else {
            self.regular.push(task);
        }
        id
    }

    /// Whether the equipment has a queued or running task.
    pub fn has_open_task(&self, equipment_id: &str) -> bool {
        self.regular.any(|t| t.equipment_id == equipment_id)
            || self.emergency.iter().any(|t| t.equipment_id == equipment_id)
            || self.active.values().any(|a| a.task.equipment_id == equipment_id)
    }

    /// Condition-based monitoring pass. Returns the ids of new tasks.
    ///
    /// | Condition | Task |
    /// |-----------|------|
    /// | < 30 and operational | CORRECTIVE / High |
    /// | < 50 | PREDICTIVE / Medium |
    /// | preventive due | PREVENTIVE / Low |
    pub fn monitor(&mut self, fleet: &EquipmentFleet, now: SimTime) -> Vec<String> {
        let mut created = Vec::new();
        for equipment in fleet.iter() {
            if self.has_open_task(&equipment.id) {
                continue;
            }
            let serviceable = matches!(
                equipment.status,
                EquipmentStatus::Operational | EquipmentStatus::Standby
            );
            if !serviceable {
                continue;
            }
            let plan = if equipment.condition_score < CORRECTIVE_THRESHOLD
                && equipment.status == EquipmentStatus::Operational
            {
                Some((MaintenanceType::Corrective, MaintenancePriority::High))
            } else if equipment.condition_score < PREDICTIVE_THRESHOLD {
                Some((MaintenanceType::Predictive, MaintenancePriority::Medium))
            } else if equipment.next_maintenance_due <= now {
                Some((MaintenanceType::Preventive, MaintenancePriority::Low))
            } else {
                None
            };
            if let Some((kind, priority)) = plan {
                let task = self.create_task(equipment, kind, priority, now);
                created.push(self.submit(task));
            }
        }
        created
    }

    /// Raises an emergency for broken equipment, superseding queued
    /// regular work on it. `None` if an emergency is already open.
    pub fn report_breakdown(&mut self, equipment: &Equipment, now: SimTime) -> Option<String> {
        let id = equipment.id.as_str();
        if self.emergency.iter().any(|t| t.equipment_id == id)
            || self.active.values().any(|a| a.task.equipment_id == id)
        {
            return None;
        }
        self.regular.retain(|t| t.equipment_id != id);
        let task = self.create_task(
            equipment,
            MaintenanceType::Emergency,
            MaintenancePriority::Critical,
            now,
        );
        Some(self.submit(task))
    }

    /// Free crew that could start the task right now, if everything else
    /// it needs is available too.
    fn ready_crew(&self, task: &MaintenanceTask, fleet: &EquipmentFleet) -> Option<String> {
        let equipment_ready = fleet
            .get(&task.equipment_id)
            .is_some_and(|e| e.status.can_transition_to(EquipmentStatus::Maintenance));
        if !equipment_ready || !self.parts.has_all(&task.required_parts) {
            return None;
        }
        self.crews.find_available(task).map(str::to_string)
    }

    fn start<R: Rng>(
        &mut self,
        mut task: MaintenanceTask,
        crew_id: String,
        fleet: &mut EquipmentFleet,
        rng: &mut R,
        now: SimTime,
    ) -> PortResult<StartedTask> {
        fleet.get_mut(&task.equipment_id)?.begin_maintenance()?;
        let parts_cost = self.parts.consume(&task.required_parts, now)?;
        self.crews.assign(&crew_id, &task.id)?;

        let factor = Normal::new(1.0, DURATION_SIGMA)
            .map(|n| n.sample(rng))
            .unwrap_or(1.0)
            .clamp(0.5, 2.0);
        let duration = task.estimated_duration * factor;
        task.actual_duration = Some(duration);
        task.started_at = Some(now);
        task.crew_id = Some(crew_id.clone());

        debug!(
            task = %task.id,
            equipment = %task.equipment_id,
            crew = %crew_id,
            duration,
            "maintenance started"
        );
        let started = StartedTask {
            task_id: task.id.clone(),
            equipment_id: task.equipment_id.clone(),
            crew_id,
            duration,
            completes_at: now + duration,
        };
        self.active.insert(task.id.clone(), ActiveTask { task, parts_cost });
        Ok(started)
    }

    /// Starts every task that can start now.
    pub fn dispatch<R: Rng>(
        &mut self,
        fleet: &mut EquipmentFleet,
        rng: &mut R,
        now: SimTime,
    ) -> PortResult<Vec<StartedTask>> {
        let mut started = Vec::new();

        let mut deferred = VecDeque::new();
        while let Some(task) = self.emergency.pop_front() {
            match self.ready_crew(&task, fleet) {
                Some(crew) => started.push(self.start(task, crew, fleet, rng, now)?),
                None => deferred.push_back(task),
            }
        }
        self.emergency = deferred;

        if !self.window.contains(now) {
            return Ok(started);
        }

        for task in self.regular.iter_mut() {
            if let Some(equipment) = fleet.get(&task.equipment_id) {
                task.refresh(equipment, now);
            }
        }
        let ctx = DispatchContext::at(now).with_aging_rate(self.aging_rate);
        for seq in self.regular.ranked(&self.engine, &ctx) {
            if self.active.len() >= self.max_concurrent {
                break;
            }
            let Some(crew) = self.regular.get(seq).and_then(|t| self.ready_crew(t, fleet)) else {
                continue;
            };
            if let Some(task) = self.regular.remove(seq) {
                started.push(self.start(task, crew, fleet, rng, now)?);
            }
        }
        Ok(started)
    }

    /// Finishes a running task: restores the equipment, books cost and
    /// downtime and frees the crew.
    pub fn complete(
        &mut self,
        task_id: &str,
        fleet: &mut EquipmentFleet,
        now: SimTime,
    ) -> PortResult<MaintenanceTask> {
        let ActiveTask { mut task, parts_cost } = self
            .active
            .remove(task_id)
            .ok_or_else(|| PortError::unknown("maintenance task", task_id))?;

        let duration = task.actual_duration.unwrap_or(task.estimated_duration);
        let labour = match &task.crew_id {
            Some(crew) => self.crews.release(crew, duration)?,
            None => 0.0,
        };
        let cost = labour + parts_cost;
        // Broken equipment has been down since the breakdown was reported.
        let down_since = if task.is_emergency() {
            task.created_at
        } else {
            task.started_at.unwrap_or(now)
        };
        let downtime = now.since(down_since).max(0.0);
        let next_due = task
            .maintenance_type
            .resets_preventive_clock()
            .then(|| now + self.preventive_interval);

        fleet.get_mut(&task.equipment_id)?.complete_maintenance(
            task.maintenance_type.restore(),
            now,
            downtime,
            cost,
            next_due,
        )?;

        task.completed_at = Some(now);
        task.actual_cost = Some(cost);

        self.stats.completed += 1;
        *self
            .stats
            .completed_by_type
            .entry(task.maintenance_type.as_str().to_string())
            .or_insert(0) += 1;
        self.stats.total_cost += cost;
        self.stats.total_downtime_hours += downtime;
        self.stats.total_wait_hours += task.wait_hours().unwrap_or(0.0);

        info!(
            task = %task.id,
            equipment = %task.equipment_id,
            kind = %task.maintenance_type,
            cost,
            downtime,
            "maintenance completed"
        );
        self.completed.push(task.clone());
        Ok(task)
    }

    /// Books spare-part deliveries due by `now`.
    pub fn receive_parts(&mut self, now: SimTime) -> Vec<String> {
        self.parts.receive_due(now)
    }

    pub fn window(&self) -> &DailyWindow {
        &self.window
    }

    pub fn queued_count(&self) -> usize {
        self.regular.len() + self.emergency.len()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Queued tasks: emergencies first, then regular in insertion order.
    pub fn queued(&self) -> impl Iterator<Item = &MaintenanceTask> {
        self.emergency.iter().chain(self.regular.iter())
    }

    pub fn active(&self) -> impl Iterator<Item = &MaintenanceTask> {
        self.active.values().map(|a| &a.task)
    }

    pub fn completed(&self) -> &[MaintenanceTask] {
        &self.completed
    }

    pub fn crews(&self) -> &CrewRoster {
        &self.crews
    }

    pub fn parts(&self) -> &PartsInventory {
        &self.parts
    }

    pub fn stats(&self) -> &MaintenanceStats {
        &self.stats
    }

    /// Clears every queue, frees crews and restores the initial stock.
    pub fn reset(&mut self) {
        self.regular = DispatchQueue::new();
        self.emergency.clear();
        self.active.clear();
        self.completed.clear();
        self.crews.reset();
        self.parts.reset();
        self.next_id = 1;
        self.stats = MaintenanceStats::default();
    }
}
