//! The simulated port: every manager the processes act on.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::config::PortConfig;
use crate::disruption::DisruptionModeler;
use crate::error::{PortError, PortResult};
use crate::maintenance::MaintenanceScheduler;
use crate::models::{Berth, BerthManager, EquipmentFleet, EquipmentType, ShipTracker, ShipType};
use crate::optimizer::{AllocationRequest, AllocationResult, BerthAllocationOptimizer, BerthSlot, ServiceModel};
use crate::sim::{PoolId, ProcessContext, QueueDiscipline, ResourcePools, SimTime};
use crate::trucks::TruckDispatcher;
use crate::yard::{YardBlock, YardManager};

/// Pool carrying the quay cranes.
pub const QUAY_CRANES: &str = "quay_cranes";
/// Pool carrying the yard gantries.
pub const RTG_UNITS: &str = "rtg_units";
/// Pool carrying road slots for trucks.
pub const TRUCK_SLOTS: &str = "truck_slots";

/// Ids of the shared resource pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPools {
    pub quay_cranes: PoolId,
    pub rtg_units: PoolId,
    pub truck_slots: PoolId,
}

impl PortPools {
    /// Registers the three pools, sized from the configuration.
    pub fn register(pools: &mut ResourcePools, config: &PortConfig) -> PortResult<Self> {
        let cranes = config
            .equipment
            .iter()
            .filter(|g| EquipmentType::parse(&g.equipment_type) == Some(EquipmentType::QuayCrane))
            .map(|g| g.count)
            .sum::<u32>();
        let cranes = if cranes > 0 { cranes } else { config.total_cranes() };
        let rtgs = config
            .equipment
            .iter()
            .filter(|g| EquipmentType::parse(&g.equipment_type) == Some(EquipmentType::Rtg))
            .map(|g| g.count)
            .sum::<u32>();
        let trucks = config.trucks.iter().map(|g| g.count).sum::<u32>();

        Ok(Self {
            quay_cranes: pools.add_pool(QUAY_CRANES, cranes.max(1), QueueDiscipline::Priority)?,
            rtg_units: pools.add_pool(RTG_UNITS, rtgs.max(1), QueueDiscipline::Fifo)?,
            truck_slots: pools.add_pool(TRUCK_SLOTS, trucks.max(1), QueueDiscipline::Fifo)?,
        })
    }

    fn bindings(&self) -> [(PoolId, &'static str, Option<EquipmentType>); 3] {
        [
            (self.quay_cranes, QUAY_CRANES, Some(EquipmentType::QuayCrane)),
            (self.rtg_units, RTG_UNITS, Some(EquipmentType::Rtg)),
            (self.truck_slots, TRUCK_SLOTS, None),
        ]
    }
}

/// World state shared by all processes of one simulation.
#[derive(Debug)]
pub struct PortState {
    pub config: PortConfig,
    pub pools: PortPools,
    pub ships: ShipTracker,
    pub berths: BerthManager,
    pub fleet: EquipmentFleet,
    pub yard: YardManager,
    pub maintenance: MaintenanceScheduler,
    pub trucks: TruckDispatcher,
    pub disruptions: DisruptionModeler,
    pub optimizer: BerthAllocationOptimizer,
    pub service: ServiceModel,
    /// Expected release time of occupied or reserved berths.
    pub berth_free_at: BTreeMap<String, SimTime>,
    /// Containers discharged but refused by a full yard.
    pub containers_rejected: u64,
    pub allocation_rounds: u64,
    next_ship: u64,
    next_container: u64,
}

impl PortState {
    /// Builds every manager from a validated configuration.
    pub fn new(config: &PortConfig, pools: PortPools) -> PortResult<Self> {
        let mut berths = Vec::with_capacity(config.berths.len());
        for b in &config.berths {
            let berth_type = ShipType::parse(&b.berth_type).ok_or_else(|| {
                PortError::config(
                    format!("berths[{}].berth_type", b.id),
                    format!("unknown berth type '{}'", b.berth_type),
                )
            })?;
            berths.push(Berth::new(&b.id, berth_type, b.capacity, b.crane_count).with_name(&b.name));
        }

        let mut fleet = EquipmentFleet::new();
        for (i, group) in config.equipment.iter().enumerate() {
            let equipment_type = EquipmentType::parse(&group.equipment_type).ok_or_else(|| {
                PortError::config(
                    format!("equipment[{i}].equipment_type"),
                    format!("unknown equipment type '{}'", group.equipment_type),
                )
            })?;
            fleet.add_group(
                equipment_type,
                group.count,
                group.age_years,
                config.maintenance.preventive_interval_hours,
            )?;
        }

        let yard = &config.yard;
        let blocks = (0..yard.blocks)
            .map(|i| YardBlock::new(format!("Y{:02}", i + 1), yard.rows, yard.bays, yard.tiers))
            .collect::<PortResult<Vec<_>>>()?;

        Ok(Self {
            config: config.clone(),
            pools,
            ships: ShipTracker::new(),
            berths: BerthManager::new(berths)?,
            fleet,
            yard: YardManager::new(blocks)?,
            maintenance: MaintenanceScheduler::new(&config.maintenance, &config.crews, &config.spare_parts),
            trucks: TruckDispatcher::new(&config.dispatch, &config.trucks, &config.locations)?,
            disruptions: DisruptionModeler::new(&config.disruption)?,
            optimizer: BerthAllocationOptimizer::new(config.optimizer.clone()).with_seed(config.simulation.seed),
            service: ServiceModel::from_config(&config.optimizer),
            berth_free_at: BTreeMap::new(),
            containers_rejected: 0,
            allocation_rounds: 0,
            next_ship: 1,
            next_container: 1,
        })
    }

    /// Next generated ship id.
    pub fn next_ship_id(&mut self) -> String {
        let id = format!("SHIP-{:04}", self.next_ship);
        self.next_ship += 1;
        id
    }

    /// Next generated container id.
    pub fn next_container_id(&mut self) -> String {
        let id = format!("CTR-{:06}", self.next_container);
        self.next_container += 1;
        id
    }

    pub fn peak_season(&self) -> bool {
        self.config.simulation.peak_season
    }

    /// Hours of quay handling for `containers` moves with `cranes` cranes.
    pub fn handling_hours(&self, containers: u32, cranes: u32) -> f64 {
        self.service.handling_hours(containers, cranes, self.peak_season())
    }

    /// Grantable capacity each pool should have right now.
    ///
    /// `floor(nominal × ratio)` from the bound supply-chain nodes, further
    /// capped by the units of the backing equipment that are in service.
    pub fn pool_targets(&self, pools: &ResourcePools) -> Vec<(PoolId, u32)> {
        let ratios = self.disruptions.pool_ratios();
        let mut targets = Vec::with_capacity(3);
        for (id, name, equipment) in self.pools.bindings() {
            let Some(pool) = pools.get(id) else {
                continue;
            };
            let ratio = ratios.get(name).copied().unwrap_or(1.0).clamp(0.0, 1.0);
            let mut target = (pool.capacity() as f64 * ratio).floor() as u32;
            if let Some(equipment_type) = equipment {
                if self.fleet.count_of(equipment_type) > 0 {
                    target = target.min(self.fleet.operational_count(equipment_type) as u32);
                }
            }
            targets.push((id, target));
        }
        targets
    }

    /// Snapshot of waiting, unassigned ships and of every berth.
    pub fn allocation_request(&self, now: SimTime) -> AllocationRequest {
        let ships = self
            .ships
            .waiting()
            .into_iter()
            .filter(|s| s.berth_id.is_none())
            .cloned()
            .collect();
        let berths = self
            .berths
            .iter()
            .map(|b| {
                let from = if b.is_occupied() {
                    self.berth_free_at.get(&b.id).copied().unwrap_or(now).max(now)
                } else {
                    now
                };
                BerthSlot::from_berth(b, from)
            })
            .collect();
        AllocationRequest::new(ships, berths, now).with_peak_season(self.peak_season())
    }

    /// Plans the waiting ships and reserves the berths whose call starts now.
    ///
    /// Returns the plan and the number of ships given a berth.
    pub fn allocate_berths(&mut self, now: SimTime) -> PortResult<(AllocationResult, usize)> {
        let request = self.allocation_request(now);
        let plan = self.optimizer.optimize(&request);
        self.allocation_rounds += 1;

        for ship_id in &plan.unallocated {
            if let Some(ship) = self.ships.get(ship_id) {
                if !self.berths.has_suitable_berth(ship) {
                    warn!(ship = %ship_id, size = ship.size_teu, kind = %ship.ship_type, "no berth can take ship");
                }
            }
        }

        let mut committed = 0;
        for (ship_id, assignment) in plan.due_by(now) {
            let Some(ship) = self.ships.get(ship_id) else {
                continue;
            };
            if ship.berth_id.is_some() {
                continue;
            }
            let free = self
                .berths
                .get(&assignment.berth_id)
                .is_some_and(|b| !b.is_occupied());
            if !free {
                continue;
            }
            let ship = ship.clone();
            self.berths.allocate(&assignment.berth_id, &ship, now)?;
            self.ships.assign_berth(ship_id, &assignment.berth_id)?;
            let cranes = self
                .berths
                .get(&assignment.berth_id)
                .map_or(1, |b| b.crane_count);
            let sim = &self.config.simulation;
            let busy = sim.ship_poll_interval_hours
                + sim.docking_hours
                + self.handling_hours(ship.total_containers(), cranes)
                + sim.departing_hours;
            self.berth_free_at.insert(assignment.berth_id.clone(), now + busy);
            debug!(ship = %ship_id, berth = %assignment.berth_id, strategy = ?plan.strategy, "berth reserved");
            committed += 1;
        }
        Ok((plan, committed))
    }
}

/// Pushes [`PortState::pool_targets`] into the pools, waking waiters when
/// capacity comes back.
pub fn sync_pools(ctx: &mut ProcessContext<'_, PortState>) -> PortResult<()> {
    let targets = ctx.world().pool_targets(ctx.pools());
    for (pool, target) in targets {
        let current = ctx.pools().get(pool).map(|p| p.effective_capacity());
        if current != Some(target) {
            ctx.set_pool_capacity(pool, target)?;
            debug!(pool = pool.0, capacity = target, "pool capacity changed");
        }
    }
    Ok(())
}
