//! The port simulation: world state, processes and control surface.
//!
//! [`PortSimulation`] owns a [`Scheduler`] over [`PortState`] and starts
//! the long-running processes:
//!
//! | Process | Period | Effect |
//! |---------|--------|--------|
//! | arrivals | Exp(mean inter-arrival) | new ships |
//! | berth allocation | `allocation_interval_hours` | optimizer plan, berth reservations |
//! | equipment wear | 1h | degradation, breakdowns → emergency tasks |
//! | maintenance monitor | `monitoring_interval_hours` | condition-based tasks |
//! | maintenance dispatch | `dispatch_interval_hours` | parts receipt, task starts |
//! | truck dispatch | `dispatch_interval_hours` | job/truck matching, trips |
//! | traffic | `traffic_update_interval_hours` | time-of-day congestion |
//! | background demand | Exp(rate) | truck jobs not tied to ships |
//! | yard clearance | 1h | containers past the dwell limit leave |
//! | disruption monitor | 1h | sampling, cascades |
//!
//! Ships, truck trips, maintenance completions and disruption lifecycles
//! are spawned on demand. Node capacity and in-service equipment drive the
//! effective capacity of the `quay_cranes`, `rtg_units` and `truck_slots`
//! pools.

mod disruptions;
mod equipment;
mod ships;
mod state;
mod transport;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::PortConfig;
use crate::disruption::{DisruptionOverrides, ImpactPolicy};
use crate::error::{PortError, PortResult};
use crate::maintenance::MaintenanceTask;
use crate::models::Ship;
use crate::optimizer::AllocationResult;
use crate::sim::{ProcessId, Scheduler, SimTime};
use crate::trucks::TruckJob;

pub use disruptions::{DisruptionLifecycle, DisruptionMonitor};
pub use equipment::{EquipmentWear, MaintenanceCompletion, MaintenanceDispatch, MaintenanceMonitor};
pub use ships::{AllocationRound, ArrivalGenerator, ShipProcess};
pub use state::{sync_pools, PortPools, PortState, QUAY_CRANES, RTG_UNITS, TRUCK_SLOTS};
pub use transport::{BackgroundDemand, TrafficUpdate, TruckDispatchRound, TruckTrip, YardClearance};

/// Berth utilization, per berth and averaged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BerthUtilization {
    pub per_berth: BTreeMap<String, f64>,
    pub average: f64,
}

/// Snapshot of the running simulation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationStatus {
    /// Simulated hours since start.
    pub time: f64,
    pub ships_arrived: usize,
    pub ships_processed: usize,
    pub ships_waiting: usize,
    /// Mean hours between arrival and berth assignment of departed ships.
    pub avg_waiting_time: f64,
    pub berth_utilization: BerthUtilization,
    /// Share of equipment operational or on standby.
    pub equipment_availability: f64,
    pub maintenance_completed: u64,
    pub truck_jobs_completed: u64,
    pub truck_on_time_rate: f64,
    pub yard_utilization: f64,
    pub active_disruptions: usize,
    pub events_processed: u64,
}

/// A configured port simulation.
///
/// # Example
///
/// ```
/// use u_portsim::config::PortConfig;
/// use u_portsim::models::{Ship, ShipType};
/// use u_portsim::sim::SimTime;
/// use u_portsim::simulation::PortSimulation;
///
/// let mut sim = PortSimulation::new(PortConfig::scripted()).unwrap();
/// let ship = Ship::new("MSC-1", ShipType::Container, 8000)
///     .with_containers(120, 80)
///     .with_arrival(SimTime(2.0));
/// sim.schedule_ship(ship).unwrap();
/// sim.run(48.0);
/// assert_eq!(sim.get_status().ships_processed, 1);
/// ```
pub struct PortSimulation {
    config: PortConfig,
    scheduler: Scheduler<PortState>,
    state: PortState,
    impact_policy: Option<Arc<dyn ImpactPolicy>>,
}

impl PortSimulation {
    /// Validates the configuration and starts the port at t=0.
    pub fn new(config: PortConfig) -> PortResult<Self> {
        config.validate()?;
        let mut scheduler = Scheduler::new(config.simulation.seed);
        if config.simulation.trace {
            scheduler = scheduler.with_trace();
        }
        let pools = PortPools::register(scheduler.pools_mut(), &config)?;
        let state = PortState::new(&config, pools)?;
        let mut sim = Self {
            config,
            scheduler,
            state,
            impact_policy: None,
        };
        sim.start_processes();
        info!(
            seed = sim.config.simulation.seed,
            berths = sim.config.berths.len(),
            equipment = sim.state.fleet.len(),
            "port simulation ready"
        );
        Ok(sim)
    }

    /// Uses `policy` to decide disruption impacts, also after [`reset`](Self::reset).
    pub fn with_impact_policy(mut self, policy: Arc<dyn ImpactPolicy>) -> Self {
        self.state.disruptions.set_policy(Arc::clone(&policy));
        self.impact_policy = Some(policy);
        self
    }

    fn start_processes(&mut self) {
        let s = &mut self.scheduler;
        if self.config.simulation.generate_arrivals {
            s.schedule_after(0.0, Box::new(ArrivalGenerator::new()));
        }
        s.schedule_after(0.0, Box::new(AllocationRound));
        s.schedule_after(0.0, Box::new(EquipmentWear));
        s.schedule_after(0.0, Box::new(MaintenanceMonitor));
        s.schedule_after(0.0, Box::new(MaintenanceDispatch));
        s.schedule_after(0.0, Box::new(TruckDispatchRound));
        s.schedule_after(0.0, Box::new(TrafficUpdate));
        s.schedule_after(0.0, Box::new(BackgroundDemand::new()));
        s.schedule_after(1.0, Box::new(YardClearance));
        s.schedule_after(1.0, Box::new(DisruptionMonitor));
    }

    /// Runs `duration` hours from the current time. Returns the number of
    /// events processed.
    pub fn run(&mut self, duration: f64) -> usize {
        let until = self.now() + duration.max(0.0);
        self.scheduler.advance_until(until, &mut self.state)
    }

    /// Runs until the configured `duration_hours` (from t=0).
    pub fn run_to_horizon(&mut self) -> usize {
        let horizon = SimTime(self.config.simulation.duration_hours);
        if horizon <= self.now() {
            return 0;
        }
        self.scheduler.advance_until(horizon, &mut self.state)
    }

    /// Advances by `delta` hours and reports the new status.
    pub fn step(&mut self, delta: f64) -> SimulationStatus {
        self.run(delta);
        self.get_status()
    }

    /// Back to t=0 with the configured seed and a fresh port.
    pub fn reset(&mut self) -> PortResult<()> {
        self.scheduler.reset(self.config.simulation.seed);
        self.state = PortState::new(&self.config, self.state.pools)?;
        if let Some(policy) = &self.impact_policy {
            self.state.disruptions.set_policy(Arc::clone(policy));
        }
        self.start_processes();
        info!("port simulation reset");
        Ok(())
    }

    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    pub fn state(&self) -> &PortState {
        &self.state
    }

    /// Direct world access for scripted scenarios.
    pub fn state_mut(&mut self) -> &mut PortState {
        &mut self.state
    }

    pub fn scheduler(&self) -> &Scheduler<PortState> {
        &self.scheduler
    }

    pub fn get_status(&self) -> SimulationStatus {
        let now = self.now();
        let s = &self.state;
        SimulationStatus {
            time: now.as_hours(),
            ships_arrived: s.ships.arrived_count(),
            ships_processed: s.ships.departed().len(),
            ships_waiting: s.ships.waiting_count(),
            avg_waiting_time: s.ships.average_waiting_time(),
            berth_utilization: BerthUtilization {
                per_berth: s.berths.utilization(now).into_iter().collect(),
                average: s.berths.average_utilization(now),
            },
            equipment_availability: s.fleet.availability(),
            maintenance_completed: s.maintenance.stats().completed,
            truck_jobs_completed: s.trucks.stats().completed,
            truck_on_time_rate: s.trucks.stats().on_time_rate(),
            yard_utilization: s.yard.utilization(),
            active_disruptions: s.disruptions.live_count(),
            events_processed: self.scheduler.events_processed(),
        }
    }

    /// Optimizer plan for the ships waiting right now. Nothing is committed.
    pub fn optimize_berths(&self) -> AllocationResult {
        let request = self.state.allocation_request(self.now());
        self.state.optimizer.optimize(&request)
    }

    /// Starts a disruption from the template library.
    ///
    /// `false` for an unknown template or one that is already live.
    pub fn trigger_disruption(&mut self, template_id: &str, overrides: Option<DisruptionOverrides>) -> bool {
        let result = self.scheduler.with_context(&mut self.state, |ctx| {
            disruptions::trigger(ctx, template_id, overrides.as_ref(), None)
        });
        match result {
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(e) => {
                warn!(template = template_id, error = %e, "disruption not triggered");
                false
            }
        }
    }

    /// Queues a maintenance task for an existing unit.
    pub fn submit_maintenance(&mut self, task: MaintenanceTask) -> PortResult<String> {
        if self.state.fleet.get(&task.equipment_id).is_none() {
            return Err(PortError::unknown("equipment", task.equipment_id));
        }
        Ok(self.state.maintenance.submit(task))
    }

    /// Queues a truck job.
    pub fn submit_truck_job(&mut self, job: TruckJob) -> PortResult<String> {
        self.state.trucks.submit(job)
    }

    /// Schedules a ship to arrive at its `arrival_time` (or now, if earlier).
    pub fn schedule_ship(&mut self, ship: Ship) -> PortResult<ProcessId> {
        ship.validate()?;
        if self.state.ships.is_known(&ship.id) {
            return Err(PortError::config(format!("ship[{}].id", ship.id), "duplicate ship id"));
        }
        let at = ship.arrival_time.max(self.now());
        Ok(self.scheduler.schedule_at(at, Box::new(ShipProcess::new(ship))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruption::{DisruptionEvent, SupplyChainNode};
    use crate::maintenance::{MaintenancePriority, MaintenanceType};
    use crate::models::{EquipmentStatus, ShipState, ShipType};
    use crate::trucks::RouteType;

    fn scripted() -> PortConfig {
        let mut config = PortConfig::scripted();
        config.maintenance.wear.base_degradation_rate = 0.0;
        config
    }

    fn crane_pool(sim: &PortSimulation) -> (u32, u32) {
        let pool = sim.scheduler().pools().get(sim.state().pools.quay_cranes).unwrap();
        (pool.effective_capacity(), pool.capacity())
    }

    #[test]
    fn test_same_seed_same_trace() {
        let mut config = PortConfig::default().with_seed(5);
        config.simulation.trace = true;
        config.simulation.mean_interarrival_hours = 3.0;

        let mut a = PortSimulation::new(config.clone()).unwrap();
        let mut b = PortSimulation::new(config).unwrap();
        a.run(96.0);
        b.run(96.0);
        assert!(!a.scheduler().trace().is_empty());
        assert_eq!(a.scheduler().trace(), b.scheduler().trace());
        assert_eq!(a.get_status(), b.get_status());
    }

    #[test]
    fn test_reset_replays_run() {
        let mut config = PortConfig::default().with_seed(9);
        config.simulation.trace = true;
        let mut sim = PortSimulation::new(config).unwrap();
        sim.run(36.0);
        let first = sim.get_status();
        let trace = sim.scheduler().trace().to_vec();

        sim.reset().unwrap();
        assert_eq!(sim.get_status().events_processed, 0);
        sim.run(36.0);
        assert_eq!(sim.get_status(), first);
        assert_eq!(sim.scheduler().trace(), trace.as_slice());
    }

    #[test]
    fn test_scripted_ship_full_call() {
        let mut sim = PortSimulation::new(scripted()).unwrap();
        let ship = Ship::new("S1", ShipType::Container, 12_000)
            .with_containers(400, 200)
            .with_arrival(SimTime(1.0));
        sim.schedule_ship(ship).unwrap();
        sim.run(72.0);

        let status = sim.get_status();
        assert_eq!(status.ships_arrived, 1);
        assert_eq!(status.ships_processed, 1);
        assert_eq!(status.ships_waiting, 0);
        let departed = &sim.state().ships.departed()[0];
        assert!(departed.berth_id.is_some());
        assert!(departed.departure_time.unwrap() > departed.arrival_time);
        assert!(status.berth_utilization.average > 0.0);
        assert_eq!(sim.state().berths.occupied_count(), 0);
        // Every discharged box went through the yard.
        assert!(sim.state().yard.stats().stored >= 400);
        assert!(status.truck_jobs_completed > 0);
        let (effective, nominal) = crane_pool(&sim);
        assert_eq!(effective, nominal);
    }

    #[test]
    fn test_duplicate_ship_rejected() {
        let mut sim = PortSimulation::new(scripted()).unwrap();
        let ship = Ship::new("S1", ShipType::Bulk, 9000).with_containers(10, 0);
        sim.schedule_ship(ship.clone()).unwrap();
        sim.run(1.0);
        assert!(sim.schedule_ship(ship).is_err());
    }

    #[test]
    fn test_failed_call_frees_berth_for_next_ship() {
        let mut sim = PortSimulation::new(scripted()).unwrap();
        let ship = Ship::new("S1", ShipType::Container, 12_000).with_containers(100, 50);
        sim.schedule_ship(ship).unwrap();
        sim.run(0.5);
        assert_eq!(sim.state().ships.get("S1").unwrap().state, ShipState::Docking);
        assert_eq!(sim.state().berths.occupied_count(), 1);

        // Docking ends at t=1 with an illegal Processing → Processing step.
        let now = sim.now();
        sim.state_mut().ships.transition("S1", ShipState::Processing, now).unwrap();
        sim.run(2.0);
        assert_eq!(sim.scheduler().failures().len(), 1);
        assert_eq!(sim.state().berths.occupied_count(), 0);
        assert!(sim.state().ships.get("S1").is_none());
        assert_eq!(sim.state().ships.abandoned().len(), 1);
        assert_eq!(crane_pool(&sim).0, crane_pool(&sim).1);

        let again = Ship::new("S1", ShipType::Container, 12_000).with_containers(10, 0);
        assert!(sim.schedule_ship(again).is_err());
        let next = Ship::new("S2", ShipType::Container, 12_000).with_containers(100, 50);
        sim.schedule_ship(next).unwrap();
        sim.run(48.0);
        assert_eq!(sim.state().ships.departed().len(), 1);
        assert_eq!(sim.state().ships.departed()[0].id, "S2");
        assert_eq!(sim.scheduler().failures().len(), 1);
    }

    #[test]
    fn test_low_condition_gets_corrective_task() {
        let mut sim = PortSimulation::new(scripted()).unwrap();
        sim.state_mut().fleet.get_mut("QC-03").unwrap().condition_score = 25.0;
        sim.run(4.0);

        let m = &sim.state().maintenance;
        let task = m
            .queued()
            .chain(m.active())
            .chain(m.completed().iter())
            .find(|t| t.equipment_id == "QC-03")
            .expect("task for QC-03");
        assert_eq!(task.maintenance_type, MaintenanceType::Corrective);
        assert_eq!(task.priority, MaintenancePriority::High);
    }

    #[test]
    fn test_breakdown_shrinks_crane_pool_until_repaired() {
        let mut sim = PortSimulation::new(scripted()).unwrap();
        let now = sim.now();
        let state = sim.state_mut();
        state
            .fleet
            .get_mut("QC-01")
            .unwrap()
            .transition(EquipmentStatus::Breakdown)
            .unwrap();
        let equipment = state.fleet.get("QC-01").unwrap().clone();
        assert!(state.maintenance.report_breakdown(&equipment, now).is_some());

        // The emergency starts at the first dispatch round, t=0.
        sim.run(0.5);
        let (effective, nominal) = crane_pool(&sim);
        assert_eq!(effective, nominal - 1);
        sim.run(48.0);
        assert_eq!(sim.state().fleet.get("QC-01").unwrap().status, EquipmentStatus::Operational);
        assert_eq!(crane_pool(&sim).0, nominal);
        assert!(sim.get_status().maintenance_completed >= 1);
    }

    #[test]
    fn test_typhoon_cuts_cranes_then_restores_baseline() {
        let mut sim = PortSimulation::new(scripted()).unwrap();
        assert!(sim.trigger_disruption("TYPHOON_SEVERE", None));
        assert!(!sim.trigger_disruption("TYPHOON_SEVERE", None));

        sim.run(24.0);
        let (effective, nominal) = crane_pool(&sim);
        assert!(effective as f64 <= 0.2 * nominal as f64);
        assert_eq!(sim.get_status().active_disruptions, 1);

        // Recovery starts at 48h; read the resolution time it implies.
        sim.run(25.0);
        let resolves_at = sim
            .state()
            .disruptions
            .live_events()
            .next()
            .and_then(|e| e.resolution_time())
            .unwrap();
        assert!(crane_pool(&sim).0 < nominal);

        sim.run(resolves_at.as_hours() - sim.now().as_hours());
        assert_eq!(sim.get_status().active_disruptions, 0);
        assert_eq!(sim.state().disruptions.node("port_operations").unwrap().capacity_ratio(), 1.0);
        assert_eq!(crane_pool(&sim), (nominal, nominal));
    }

    #[test]
    fn test_unknown_disruption_is_false() {
        let mut sim = PortSimulation::new(scripted()).unwrap();
        assert!(!sim.trigger_disruption("METEOR", None));
        let overrides = DisruptionOverrides::default().with_severity(1).with_duration(2.0);
        assert!(sim.trigger_disruption("STORM_MODERATE", Some(overrides)));
        assert_eq!(sim.get_status().active_disruptions, 1);
    }

    #[test]
    fn test_cascade_to_unknown_template_keeps_monitor_running() {
        let mut config = scripted();
        config.simulation.trace = true;
        config.disruption.cascade_base_probability = 1.0;
        config
            .disruption
            .templates
            .iter_mut()
            .find(|t| t.id == "STORM_MODERATE")
            .unwrap()
            .cascading_ids
            .push("METEOR".into());
        let mut sim = PortSimulation::new(config).unwrap();
        assert!(sim.trigger_disruption("STORM_MODERATE", None));

        sim.run(5.0);
        assert!(sim.scheduler().failures().is_empty());
        assert_eq!(sim.get_status().active_disruptions, 1);
        let monitor_runs = sim
            .scheduler()
            .trace()
            .iter()
            .filter(|e| e.name == "disruption monitor")
            .count();
        assert!(monitor_runs >= 4, "{monitor_runs}");
    }

    #[derive(Debug)]
    struct NoImpact;

    impl ImpactPolicy for NoImpact {
        fn weight(&self, _event: &DisruptionEvent, _node: &SupplyChainNode) -> Option<f64> {
            None
        }

        fn reduction(&self, _severity: u8, _weight: f64) -> f64 {
            0.0
        }
    }

    #[test]
    fn test_impact_policy_survives_reset() {
        let mut sim = PortSimulation::new(scripted())
            .unwrap()
            .with_impact_policy(Arc::new(NoImpact));
        assert!(sim.trigger_disruption("TYPHOON_SEVERE", None));
        sim.run(2.0);
        let (effective, nominal) = crane_pool(&sim);
        assert_eq!(effective, nominal);

        sim.reset().unwrap();
        assert!(sim.trigger_disruption("TYPHOON_SEVERE", None));
        sim.run(2.0);
        assert_eq!(crane_pool(&sim), (nominal, nominal));
        assert_eq!(sim.get_status().active_disruptions, 1);
    }

    #[test]
    fn test_manual_submissions() {
        let mut sim = PortSimulation::new(scripted()).unwrap();
        let equipment = sim.state().fleet.get("RTG-01").unwrap().clone();
        let task = MaintenanceTask::new("MANUAL-1", &equipment, MaintenanceType::Inspection, MaintenancePriority::Low, SimTime::ZERO);
        assert_eq!(sim.submit_maintenance(task).unwrap(), "MANUAL-1");

        let ghost = crate::models::Equipment::new("GHOST", crate::models::EquipmentType::Tractor);
        let task = MaintenanceTask::new("MANUAL-2", &ghost, MaintenanceType::Inspection, MaintenancePriority::Low, SimTime::ZERO);
        assert!(matches!(sim.submit_maintenance(task), Err(PortError::UnknownEntity { .. })));

        let job = TruckJob::new("J-1", RouteType::Internal, "PORT_GATE", "RAIL_HUB", SimTime::ZERO);
        sim.submit_truck_job(job).unwrap();
        let bad = TruckJob::new("J-2", RouteType::Internal, "PORT_GATE", "MOON", SimTime::ZERO);
        assert!(sim.submit_truck_job(bad).is_err());

        sim.run(12.0);
        assert_eq!(sim.get_status().truck_jobs_completed, 1);
    }

    #[test]
    fn test_optimize_berths_does_not_commit() {
        let mut config = scripted();
        // Keep ships waiting: no allocation round before the check.
        config.simulation.allocation_interval_hours = 100.0;
        let mut sim = PortSimulation::new(config).unwrap();
        for (i, size) in [30_000u32, 30_000].iter().enumerate() {
            let ship = Ship::new(format!("BULK{i}"), ShipType::Bulk, *size).with_containers(500, 0);
            sim.schedule_ship(ship).unwrap();
        }
        sim.run(0.1);
        // One bulk berth: the first ship took it, the second waits.
        assert_eq!(sim.get_status().ships_waiting, 1);
        let plan = sim.optimize_berths();
        assert_eq!(plan.assignments.len(), 1);
        assert!(plan.assignments.values().all(|a| a.start > sim.now()));
        assert_eq!(sim.get_status().ships_waiting, 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = PortConfig::default();
        config.berths[0].capacity = 0;
        match PortSimulation::new(config) {
            Err(e) => assert!(e.is_fatal()),
            Ok(_) => panic!("expected configuration error"),
        }
    }
}
