//! Land-side processes: truck dispatch rounds, individual trips, traffic,
//! background demand and yard dwell clearance.

use rand::Rng;
use rand_distr::{Distribution, Exp};
use tracing::{debug, trace, warn};

use super::state::PortState;
use crate::error::{PortError, PortResult};
use crate::sim::{ProcessContext, Process, ResourceHandle, SimTime, Suspend, Wakeup};
use crate::trucks::{Leg, LocationKind, RouteType, TruckType};

/// Id of the terminal yard: the first port-kind location in the configuration.
pub fn yard_location(state: &PortState) -> Option<&str> {
    state
        .config
        .locations
        .iter()
        .find(|l| LocationKind::parse(&l.kind) == Some(LocationKind::Port))
        .map(|l| l.id.as_str())
}

fn inland_locations(state: &PortState) -> Vec<String> {
    state
        .config
        .locations
        .iter()
        .filter(|l| LocationKind::parse(&l.kind) != Some(LocationKind::Port))
        .map(|l| l.id.clone())
        .collect()
}

fn random_truck_type<R: Rng>(state: &PortState, rng: &mut R) -> TruckType {
    let draw: f64 = rng.random();
    let wanted = if draw < 0.03 {
        TruckType::Hazmat
    } else if draw < 0.15 {
        TruckType::Reefer
    } else {
        TruckType::Standard
    };
    if state.trucks.trucks().any(|t| t.truck_type == wanted) {
        wanted
    } else {
        TruckType::Standard
    }
}

/// Queues a move between the terminal yard and a random inland site.
///
/// Pickups leave the yard, deliveries arrive at it.
pub fn submit_port_job<R: Rng>(
    state: &mut PortState,
    rng: &mut R,
    route: RouteType,
    container: Option<String>,
    now: SimTime,
) -> PortResult<()> {
    let Some(yard) = yard_location(state).map(str::to_string) else {
        trace!("no port location, truck job dropped");
        return Ok(());
    };
    let inland = inland_locations(state);
    if inland.is_empty() {
        return Ok(());
    }
    let site = inland[rng.random_range(0..inland.len())].clone();
    let (origin, destination) = match route {
        RouteType::Delivery => (site, yard),
        _ => (yard, site),
    };
    let truck_type = random_truck_type(state, rng);
    let priority = rng.random_range(1..=5u8);
    let mut job = state
        .trucks
        .create_job(route, origin, destination, now)
        .with_truck_type(truck_type)
        .with_priority(priority);
    if let Some(container) = container {
        job = job.with_container(container);
    }
    state.trucks.submit(job)?;
    Ok(())
}

/// Matches queued jobs with trucks every dispatch interval.
pub struct TruckDispatchRound;

impl Process<PortState> for TruckDispatchRound {
    fn name(&self) -> String {
        "truck dispatch".into()
    }

    fn resume(&mut self, _wake: Wakeup, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        let now = ctx.now();
        let assignments = ctx.world_mut().trucks.dispatch(now)?;
        for a in assignments {
            ctx.spawn_after(0.0, Box::new(TruckTrip::new(a.job_id, a.truck_id)));
        }
        Ok(Suspend::Wait(ctx.world().config.dispatch.dispatch_interval_hours))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TripPhase {
    Start,
    Slot,
    ToOrigin,
    Lift,
    Loaded,
    ToDestination,
    Unload,
    Refuel,
}

/// One truck job, from road slot to delivery.
///
/// Suspension points: road slot, travel to origin, pickup (with a yard
/// gantry when lifting from the terminal stack), travel to destination,
/// delivery, and an optional refuel stop.
pub struct TruckTrip {
    job_id: String,
    truck_id: String,
    phase: TripPhase,
    leg: Option<Leg>,
    slot: Option<ResourceHandle>,
    gantry: Option<ResourceHandle>,
}

impl TruckTrip {
    pub fn new(job_id: impl Into<String>, truck_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            truck_id: truck_id.into(),
            phase: TripPhase::Start,
            leg: None,
            slot: None,
            gantry: None,
        }
    }

    fn endpoints(&self, state: &PortState) -> PortResult<(String, String, Option<String>, RouteType)> {
        let job = state
            .trucks
            .job(&self.job_id)
            .ok_or_else(|| PortError::unknown("truck job", self.job_id.as_str()))?;
        Ok((
            job.origin.clone(),
            job.destination.clone(),
            job.container_id.clone(),
            job.route_type,
        ))
    }

    fn drive_to(&mut self, to: &str, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<f64> {
        let trucks = &ctx.world().trucks;
        let from = trucks.truck(&self.truck_id)?.location.clone();
        let leg = trucks.leg(&self.truck_id, &from, to)?;
        self.leg = Some(leg);
        Ok(leg.hours)
    }

    fn book_leg(&mut self, at: &str, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<()> {
        let leg = self.leg.take().unwrap_or(Leg { km: 0.0, hours: 0.0 });
        ctx.world_mut().trucks.arrive(&self.job_id, at, leg)
    }

    fn at_origin(&mut self, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        let (origin, _, container, _) = self.endpoints(ctx.world())?;
        self.book_leg(&origin, ctx)?;
        let state = ctx.world();
        let from_yard = yard_location(state) == Some(origin.as_str());
        let stacked = container.as_deref().is_some_and(|c| state.yard.contains(c));
        if from_yard && stacked {
            self.phase = TripPhase::Lift;
            return Ok(Suspend::acquire(state.pools.rtg_units, 1));
        }
        if from_yard && container.is_some() {
            debug!(job = %self.job_id, "container already left the yard");
        }
        self.phase = TripPhase::Loaded;
        Ok(Suspend::Wait(state.config.dispatch.pickup_hours))
    }

    fn lift(&mut self, gantry: ResourceHandle, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        let now = ctx.now();
        let (_, _, container, _) = self.endpoints(ctx.world())?;
        let state = ctx.world_mut();
        let mut hours = state.config.dispatch.pickup_hours;
        if let Some(container) = container {
            match state.yard.retrieve(&container, now) {
                Ok(report) => hours += report.relocations.len() as f64 * state.config.yard.relocation_hours,
                Err(PortError::ContainerNotFound(_)) => {
                    debug!(job = %self.job_id, container = %container, "container gone before lift")
                }
                Err(e) => return Err(e),
            }
        }
        self.gantry = Some(gantry);
        self.phase = TripPhase::Loaded;
        Ok(Suspend::Wait(hours))
    }

    fn depart_loaded(&mut self, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        if let Some(gantry) = self.gantry.take() {
            ctx.release(gantry)?;
        }
        let (_, destination, _, _) = self.endpoints(ctx.world())?;
        let hours = self.drive_to(&destination, ctx)?;
        self.phase = TripPhase::ToDestination;
        Ok(Suspend::Wait(hours))
    }

    fn finish(&mut self, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        let now = ctx.now();
        let (_, destination, _, route) = self.endpoints(ctx.world())?;
        let state = ctx.world_mut();
        if route == RouteType::Delivery && yard_location(state) == Some(destination.as_str()) {
            let container = state.next_container_id();
            if let Err(e) = state.yard.store(&container, now) {
                warn!(job = %self.job_id, error = %e, "delivered container not stacked");
            }
        }
        let outcome = state.trucks.complete(&self.job_id, now)?;
        let refuel_hours = state.config.dispatch.refuel_hours;
        if let Some(slot) = self.slot.take() {
            ctx.release(slot)?;
        }
        if outcome.refueling {
            self.phase = TripPhase::Refuel;
            return Ok(Suspend::Wait(refuel_hours));
        }
        Ok(Suspend::Done)
    }
}

impl Process<PortState> for TruckTrip {
    fn name(&self) -> String {
        format!("truck {} job {}", self.truck_id, self.job_id)
    }

    fn resume(&mut self, wake: Wakeup, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        if let Wakeup::Denied(e) = wake {
            return Err(e);
        }
        match (self.phase, wake) {
            (TripPhase::Start, _) => {
                self.phase = TripPhase::Slot;
                Ok(Suspend::acquire(ctx.world().pools.truck_slots, 1))
            }
            (TripPhase::Slot, Wakeup::Granted(slot)) => {
                self.slot = Some(slot);
                let (origin, _, _, _) = self.endpoints(ctx.world())?;
                let hours = self.drive_to(&origin, ctx)?;
                self.phase = TripPhase::ToOrigin;
                Ok(Suspend::Wait(hours))
            }
            (TripPhase::ToOrigin, _) => self.at_origin(ctx),
            (TripPhase::Lift, Wakeup::Granted(gantry)) => self.lift(gantry, ctx),
            (TripPhase::Loaded, _) => self.depart_loaded(ctx),
            (TripPhase::ToDestination, _) => {
                let (_, destination, _, _) = self.endpoints(ctx.world())?;
                self.book_leg(&destination, ctx)?;
                self.phase = TripPhase::Unload;
                Ok(Suspend::Wait(ctx.world().config.dispatch.delivery_hours))
            }
            (TripPhase::Unload, _) => self.finish(ctx),
            (TripPhase::Refuel, _) => {
                ctx.world_mut().trucks.finish_refuel(&self.truck_id)?;
                trace!(truck = %self.truck_id, "refueled");
                Ok(Suspend::Done)
            }
            (phase, wake) => Err(PortError::ProcessFailed {
                process: self.name(),
                reason: format!("unexpected {wake:?} in {phase:?}"),
            }),
        }
    }
}

/// Hourly time-of-day traffic update.
pub struct TrafficUpdate;

impl Process<PortState> for TrafficUpdate {
    fn name(&self) -> String {
        "traffic".into()
    }

    fn resume(&mut self, _wake: Wakeup, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        let now = ctx.now();
        let (state, rng) = ctx.split();
        let factor = state.trucks.update_traffic(now, rng);
        trace!(factor, "traffic updated");
        Ok(Suspend::Wait(state.config.dispatch.traffic_update_interval_hours))
    }
}

/// Truck demand not tied to a vessel call (exponential inter-arrivals).
pub struct BackgroundDemand {
    started: bool,
}

impl BackgroundDemand {
    pub fn new() -> Self {
        Self { started: false }
    }
}

impl Default for BackgroundDemand {
    fn default() -> Self {
        Self::new()
    }
}

impl Process<PortState> for BackgroundDemand {
    fn name(&self) -> String {
        "background demand".into()
    }

    fn resume(&mut self, _wake: Wakeup, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        let now = ctx.now();
        let (state, rng) = ctx.split();
        let rate = state.config.dispatch.background_jobs_per_hour;
        if rate <= 0.0 {
            return Ok(Suspend::Done);
        }
        if self.started {
            let route = match rng.random_range(0..4) {
                0 => RouteType::Pickup,
                1 => RouteType::Delivery,
                2 => RouteType::Internal,
                _ => RouteType::Repositioning,
            };
            match route {
                RouteType::Pickup | RouteType::Delivery => submit_port_job(state, rng, route, None, now)?,
                _ => {
                    let ids: Vec<String> = state.config.locations.iter().map(|l| l.id.clone()).collect();
                    if ids.len() >= 2 {
                        let from = rng.random_range(0..ids.len());
                        let to = (from + rng.random_range(1..ids.len())) % ids.len();
                        let job = state
                            .trucks
                            .create_job(route, ids[from].clone(), ids[to].clone(), now)
                            .with_priority(rng.random_range(2..=5u8));
                        state.trucks.submit(job)?;
                    }
                }
            }
        }
        self.started = true;
        let gap = Exp::new(rate).map(|d| d.sample(rng)).unwrap_or(1.0 / rate);
        Ok(Suspend::Wait(gap))
    }
}

/// Moves containers that outstayed the dwell limit off terminal by rail or barge.
pub struct YardClearance;

impl Process<PortState> for YardClearance {
    fn name(&self) -> String {
        "yard clearance".into()
    }

    fn resume(&mut self, _wake: Wakeup, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        let now = ctx.now();
        let state = ctx.world_mut();
        let cutoff = SimTime(now.as_hours() - state.config.yard.dwell_hours);
        let mut cleared = 0;
        for container in state.yard.stored_before(cutoff) {
            match state.yard.retrieve(&container, now) {
                Ok(_) => cleared += 1,
                Err(e) => warn!(container = %container, error = %e, "clearance skipped"),
            }
        }
        if cleared > 0 {
            debug!(cleared, utilization = state.yard.utilization(), "yard cleared");
        }
        Ok(Suspend::Wait(1.0))
    }
}
