//! Equipment wear and the maintenance cycle.

use tracing::{debug, warn};

use super::state::{sync_pools, PortState};
use crate::error::PortResult;
use crate::maintenance::StartedTask;
use crate::sim::{Process, ProcessContext, Suspend, Wakeup};

/// Hourly wear and breakdown draws for every operational unit.
pub struct EquipmentWear;

impl Process<PortState> for EquipmentWear {
    fn name(&self) -> String {
        "equipment wear".into()
    }

    fn resume(&mut self, wake: Wakeup, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        let now = ctx.now();
        // Nothing has run yet at start.
        if matches!(wake, Wakeup::Start) {
            return Ok(Suspend::Wait(1.0));
        }
        let (state, rng) = ctx.split();
        let wear = state.config.maintenance.wear;
        let mut broken = Vec::new();
        for equipment in state.fleet.iter_mut() {
            equipment.degrade(1.0, &wear, now);
            if equipment.roll_failure(&wear, rng)? {
                broken.push(equipment.id.clone());
            }
        }
        for id in &broken {
            if let Some(equipment) = state.fleet.get(id) {
                warn!(equipment = %id, condition = equipment.condition_score, "breakdown");
                state.maintenance.report_breakdown(equipment, now);
            }
        }
        if !broken.is_empty() {
            sync_pools(ctx)?;
        }
        Ok(Suspend::Wait(1.0))
    }
}

/// Condition-based monitoring pass.
pub struct MaintenanceMonitor;

impl Process<PortState> for MaintenanceMonitor {
    fn name(&self) -> String {
        "maintenance monitor".into()
    }

    fn resume(&mut self, _wake: Wakeup, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        let now = ctx.now();
        let state = ctx.world_mut();
        let created = state.maintenance.monitor(&state.fleet, now);
        if !created.is_empty() {
            debug!(tasks = created.len(), "monitoring raised tasks");
        }
        Ok(Suspend::Wait(state.config.maintenance.monitoring_interval_hours))
    }
}

/// Receives parts and starts whatever maintenance can start.
pub struct MaintenanceDispatch;

impl Process<PortState> for MaintenanceDispatch {
    fn name(&self) -> String {
        "maintenance dispatch".into()
    }

    fn resume(&mut self, _wake: Wakeup, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        let now = ctx.now();
        let (state, rng) = ctx.split();
        let received = state.maintenance.receive_parts(now);
        if !received.is_empty() {
            debug!(parts = ?received, "spare parts received");
        }
        let started = state.maintenance.dispatch(&mut state.fleet, rng, now)?;
        let interval = state.config.maintenance.dispatch_interval_hours;
        if !started.is_empty() {
            sync_pools(ctx)?;
        }
        for task in started {
            let duration = task.duration;
            ctx.spawn_after(duration, Box::new(MaintenanceCompletion { task }));
        }
        Ok(Suspend::Wait(interval))
    }
}

/// Closes one running maintenance task when its duration has elapsed.
pub struct MaintenanceCompletion {
    task: StartedTask,
}

impl Process<PortState> for MaintenanceCompletion {
    fn name(&self) -> String {
        format!("maintenance {} on {}", self.task.task_id, self.task.equipment_id)
    }

    fn resume(&mut self, _wake: Wakeup, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        let now = ctx.now();
        let state = ctx.world_mut();
        state.maintenance.complete(&self.task.task_id, &mut state.fleet, now)?;
        sync_pools(ctx)?;
        Ok(Suspend::Done)
    }
}
