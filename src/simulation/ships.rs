//! Vessel processes: arrivals, berth allocation rounds, and the call of
//! one ship from arrival to departure.

use rand::Rng;
use rand_distr::{Distribution, Exp};
use tracing::{debug, info, warn};

use super::state::PortState;
use super::transport;
use crate::error::{PortError, PortResult};
use crate::models::{Ship, ShipState, ShipType};
use crate::sim::{Process, ProcessContext, ResourceHandle, Suspend, Wakeup};
use crate::trucks::RouteType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Arrive,
    Waiting,
    Docking,
    Cranes,
    Handling,
    Departing,
}

/// One ship's call.
///
/// ```text
/// Arrive ─► Waiting (poll) ─► Docking ─► Cranes (acquire) ─► Handling ─► Departing ─► Done
/// ```
pub struct ShipProcess {
    ship: Option<Ship>,
    ship_id: String,
    phase: Phase,
    berth_id: Option<String>,
    cranes: Option<ResourceHandle>,
    registered: bool,
}

impl ShipProcess {
    pub fn new(ship: Ship) -> Self {
        Self {
            ship_id: ship.id.clone(),
            ship: Some(ship),
            phase: Phase::Arrive,
            berth_id: None,
            cranes: None,
            registered: false,
        }
    }

    fn arrive(&mut self, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        let now = ctx.now();
        let mut ship = self
            .ship
            .take()
            .ok_or_else(|| PortError::ProcessFailed {
                process: self.name(),
                reason: "ship already registered".into(),
            })?;
        ship.arrival_time = now;
        info!(ship = %ship.id, kind = %ship.ship_type, size = ship.size_teu, containers = ship.total_containers(), "ship arrived");

        let state = ctx.world_mut();
        state.ships.register(ship)?;
        self.registered = true;
        state.ships.transition(&self.ship_id, ShipState::Waiting, now)?;
        state.allocate_berths(now)?;
        self.phase = Phase::Waiting;
        self.poll(ctx)
    }

    /// Checks whether an allocation round gave this ship a berth.
    fn poll(&mut self, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        let now = ctx.now();
        let state = ctx.world_mut();
        let berth = state
            .ships
            .get(&self.ship_id)
            .ok_or_else(|| PortError::unknown("ship", self.ship_id.as_str()))?
            .berth_id
            .clone();
        let Some(berth) = berth else {
            return Ok(Suspend::Wait(state.config.simulation.ship_poll_interval_hours));
        };

        state.ships.transition(&self.ship_id, ShipState::Docking, now)?;
        debug!(ship = %self.ship_id, berth = %berth, "docking");
        self.berth_id = Some(berth);
        self.phase = Phase::Docking;
        Ok(Suspend::Wait(state.config.simulation.docking_hours))
    }

    fn request_cranes(&mut self, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        let now = ctx.now();
        let state = ctx.world_mut();
        state.ships.transition(&self.ship_id, ShipState::Processing, now)?;
        let berth_cranes = self
            .berth_id
            .as_deref()
            .and_then(|b| state.berths.get(b))
            .map_or(1, |b| b.crane_count);
        let priority = state.ships.get(&self.ship_id).map_or(5, |s| s.priority);
        let pool = state.pools.quay_cranes;
        let nominal = ctx.pools().get(pool).map_or(1, |p| p.capacity());
        self.phase = Phase::Cranes;
        Ok(Suspend::Acquire {
            pool,
            amount: berth_cranes.clamp(1, nominal),
            // Lower values are served first.
            priority: -(priority as i32),
        })
    }

    fn start_handling(&mut self, handle: ResourceHandle, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        let state = ctx.world();
        let containers = state
            .ships
            .get(&self.ship_id)
            .map_or(0, |s| s.total_containers());
        let hours = state.handling_hours(containers, handle.amount());
        debug!(ship = %self.ship_id, cranes = handle.amount(), hours, "handling");
        self.cranes = Some(handle);
        self.phase = Phase::Handling;
        Ok(Suspend::Wait(hours))
    }

    /// Discharges the import boxes into the yard and books the truck work
    /// for both directions.
    fn discharge(&mut self, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<()> {
        let now = ctx.now();
        let (state, rng) = ctx.split();
        let (unload, load) = state
            .ships
            .get(&self.ship_id)
            .map_or((0, 0), |s| (s.containers_to_unload, s.containers_to_load));

        let mut stored = Vec::with_capacity(unload as usize);
        for _ in 0..unload {
            let container = state.next_container_id();
            match state.yard.store(&container, now) {
                Ok(_) => stored.push(container),
                Err(PortError::YardFull(_)) => state.containers_rejected += 1,
                Err(e) => return Err(e),
            }
        }
        let rejected = unload as usize - stored.len();
        if rejected > 0 {
            warn!(ship = %self.ship_id, rejected, "yard full, containers sent direct");
        }

        let per_hundred = state.config.dispatch.jobs_per_hundred_containers / 100.0;
        let pickups = ((stored.len() as f64) * per_hundred).round() as usize;
        for container in stored.iter().take(pickups) {
            transport::submit_port_job(state, rng, RouteType::Pickup, Some(container.clone()), now)?;
        }
        let deliveries = ((load as f64) * per_hundred).round() as usize;
        for _ in 0..deliveries {
            transport::submit_port_job(state, rng, RouteType::Delivery, None, now)?;
        }
        debug!(ship = %self.ship_id, stored = stored.len(), pickups, deliveries, "discharged");
        Ok(())
    }

    fn leave(&mut self, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        let now = ctx.now();
        let state = ctx.world_mut();
        if let Some(berth) = &self.berth_id {
            state.berths.release(berth, now)?;
            state.berth_free_at.remove(berth);
        }
        state.ships.transition(&self.ship_id, ShipState::Departed, now)?;
        let waited = state
            .ships
            .departed()
            .last()
            .map_or(0.0, |s| s.waiting_time(now));
        info!(ship = %self.ship_id, berth = ?self.berth_id, waited, "ship departed");
        state.allocate_berths(now)?;
        Ok(Suspend::Done)
    }

    /// Cleans up after a failed step: the berth is freed for the next
    /// ship and the ship leaves the tracker. Cranes are returned by the
    /// scheduler.
    fn abandon(&mut self, ctx: &mut ProcessContext<'_, PortState>, cause: &PortError) {
        if !self.registered {
            return;
        }
        let now = ctx.now();
        let state = ctx.world_mut();
        let berth = state.ships.get(&self.ship_id).and_then(|s| s.berth_id.clone());
        if let Some(berth) = berth {
            let ours = state
                .berths
                .get(&berth)
                .is_some_and(|b| b.current_ship() == Some(self.ship_id.as_str()));
            if ours {
                if let Err(e) = state.berths.release(&berth, now) {
                    warn!(ship = %self.ship_id, berth = %berth, error = %e, "berth release failed");
                }
                state.berth_free_at.remove(&berth);
            }
        }
        state.ships.abandon(&self.ship_id, now);
        warn!(ship = %self.ship_id, error = %cause, "ship call abandoned");
        if let Err(e) = state.allocate_berths(now) {
            warn!(error = %e, "re-allocation after abandoned call failed");
        }
    }

    fn advance(&mut self, wake: Wakeup, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        if let Wakeup::Denied(e) = wake {
            return Err(e);
        }
        match (self.phase, wake) {
            (Phase::Arrive, _) => self.arrive(ctx),
            (Phase::Waiting, _) => self.poll(ctx),
            (Phase::Docking, _) => self.request_cranes(ctx),
            (Phase::Cranes, Wakeup::Granted(handle)) => self.start_handling(handle, ctx),
            (Phase::Handling, _) => {
                self.discharge(ctx)?;
                let now = ctx.now();
                ctx.world_mut()
                    .ships
                    .transition(&self.ship_id, ShipState::Departing, now)?;
                self.phase = Phase::Departing;
                match self.cranes.take() {
                    Some(handle) => ctx.release(handle)?,
                    None => warn!(ship = %self.ship_id, "handling finished without cranes"),
                }
                Ok(Suspend::Wait(ctx.world().config.simulation.departing_hours))
            }
            (Phase::Departing, _) => self.leave(ctx),
            (phase, wake) => Err(PortError::ProcessFailed {
                process: self.name(),
                reason: format!("unexpected {wake:?} in {phase:?}"),
            }),
        }
    }
}

impl Process<PortState> for ShipProcess {
    fn name(&self) -> String {
        format!("ship {}", self.ship_id)
    }

    fn resume(&mut self, wake: Wakeup, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        let result = self.advance(wake, ctx);
        if let Err(e) = &result {
            self.abandon(ctx, e);
        }
        result
    }
}

/// Generates ships with exponential inter-arrival times.
pub struct ArrivalGenerator {
    started: bool,
}

impl ArrivalGenerator {
    pub fn new() -> Self {
        Self { started: false }
    }

    fn random_ship<R: Rng>(state: &mut PortState, rng: &mut R) -> Ship {
        let params = &state.config.simulation;
        let draw: f64 = rng.random();
        let ship_type = if draw < params.container_ship_share {
            ShipType::Container
        } else if draw < params.container_ship_share + params.bulk_ship_share {
            ShipType::Bulk
        } else {
            ShipType::Mixed
        };
        let size = rng.random_range(params.min_ship_teu..=params.max_ship_teu.max(params.min_ship_teu));
        let (lo, hi) = (params.min_moves_per_teu, params.max_moves_per_teu.max(params.min_moves_per_teu));
        let unload = (size as f64 * rng.random_range(lo..=hi)).round() as u32;
        let load = (size as f64 * rng.random_range(lo..=hi)).round() as u32;
        let priority = rng.random_range(1..=10u8);
        let id = state.next_ship_id();
        Ship::new(&id, ship_type, size)
            .with_name(format!("Vessel {id}"))
            .with_containers(unload, load)
            .with_priority(priority)
    }
}

impl Default for ArrivalGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Process<PortState> for ArrivalGenerator {
    fn name(&self) -> String {
        "arrivals".into()
    }

    fn resume(&mut self, _wake: Wakeup, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        let now = ctx.now();
        if self.started {
            let (state, rng) = ctx.split();
            let ship = Self::random_ship(state, rng).with_arrival(now);
            ctx.spawn_after(0.0, Box::new(ShipProcess::new(ship)));
        }
        self.started = true;

        let (state, rng) = ctx.split();
        let mean = state.config.simulation.mean_interarrival_hours;
        let gap = Exp::new(1.0 / mean).map(|d| d.sample(rng)).unwrap_or(mean);
        Ok(Suspend::Wait(gap))
    }
}

/// Periodic berth allocation round.
pub struct AllocationRound;

impl Process<PortState> for AllocationRound {
    fn name(&self) -> String {
        "berth allocation".into()
    }

    fn resume(&mut self, _wake: Wakeup, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        let now = ctx.now();
        let state = ctx.world_mut();
        if state.ships.waiting_count() > 0 {
            let (plan, committed) = state.allocate_berths(now)?;
            if !plan.assignments.is_empty() {
                debug!(
                    planned = plan.assignments.len(),
                    committed,
                    unallocated = plan.unallocated.len(),
                    avg_wait = plan.metrics.avg_waiting_time,
                    "allocation round"
                );
            }
        }
        Ok(Suspend::Wait(state.config.simulation.allocation_interval_hours))
    }
}
