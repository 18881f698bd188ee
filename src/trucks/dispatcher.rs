//! Truck job queue, assignment and trip bookkeeping.
//!
//! Jobs are ranked on every dispatch round; each job, in order, takes the
//! best-scoring available truck of its class. Jobs with no truck stay
//! queued. The trip itself is driven by the caller through
//! [`TruckDispatcher::leg`], [`TruckDispatcher::arrive`] and
//! [`TruckDispatcher::complete`].

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::rules::{truck_job_engine, truck_score};
use super::{LocationMap, RouteType, TrafficModel, Truck, TruckJob, TruckStatus, TruckType};
use crate::config::{DispatchConfig, LocationConfig, TruckGroupConfig};
use crate::dispatching::{DispatchContext, DispatchQueue, RuleEngine};
use crate::error::{PortError, PortResult};
use crate::sim::SimTime;

/// A job matched with a truck.
#[derive(Debug, Clone, PartialEq)]
pub struct TruckAssignment {
    pub job_id: String,
    pub truck_id: String,
}

/// One driven leg.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leg {
    pub km: f64,
    pub hours: f64,
}

/// Result of finishing a job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job: TruckJob,
    /// The truck went to refuel and is unavailable until [`TruckDispatcher::finish_refuel`].
    pub refueling: bool,
}

/// Cumulative dispatch statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchStats {
    pub submitted: u64,
    pub completed: u64,
    pub on_time: u64,
    pub total_wait_hours: f64,
    pub total_distance_km: f64,
    pub total_truck_hours: f64,
    pub refuels: u64,
}

impl DispatchStats {
    /// Share of completed jobs that met their deadline (1.0 when none).
    pub fn on_time_rate(&self) -> f64 {
        if self.completed == 0 {
            1.0
        } else {
            self.on_time as f64 / self.completed as f64
        }
    }

    pub fn average_wait_hours(&self) -> f64 {
        if self.completed == 0 {
            0.0
        } else {
            self.total_wait_hours / self.completed as f64
        }
    }
}

/// Land-side transport dispatcher.
#[derive(Debug, Clone)]
pub struct TruckDispatcher {
    config: DispatchConfig,
    locations: LocationMap,
    trucks: BTreeMap<String, Truck>,
    initial_trucks: BTreeMap<String, Truck>,
    engine: RuleEngine<TruckJob>,
    queue: DispatchQueue<TruckJob>,
    active: BTreeMap<String, TruckJob>,
    traffic: TrafficModel,
    next_id: u64,
    stats: DispatchStats,
}

impl TruckDispatcher {
    pub fn new(
        config: &DispatchConfig,
        groups: &[TruckGroupConfig],
        locations: &[LocationConfig],
    ) -> PortResult<Self> {
        let locations = LocationMap::from_config(locations)?;
        let mut trucks = BTreeMap::new();
        let mut per_type: BTreeMap<TruckType, usize> = BTreeMap::new();
        for (i, group) in groups.iter().enumerate() {
            let truck_type = TruckType::parse(&group.truck_type).ok_or_else(|| {
                PortError::config(
                    format!("trucks[{i}].truck_type"),
                    format!("unknown truck type '{}'", group.truck_type),
                )
            })?;
            if !locations.contains(&group.home_location) {
                return Err(PortError::config(
                    format!("trucks[{i}].home_location"),
                    format!("unknown location '{}'", group.home_location),
                ));
            }
            let seen = per_type.entry(truck_type).or_insert(0);
            for _ in 0..group.count {
                *seen += 1;
                let id = format!("{}-{:02}", truck_type.code(), seen);
                let truck = Truck::new(id.clone(), truck_type, group.home_location.clone())
                    .with_speed(group.average_speed_kmh);
                trucks.insert(id, truck);
            }
        }
        Ok(Self {
            config: config.clone(),
            locations,
            initial_trucks: trucks.clone(),
            trucks,
            engine: truck_job_engine(),
            queue: DispatchQueue::new(),
            active: BTreeMap::new(),
            traffic: TrafficModel::default(),
            next_id: 1,
            stats: DispatchStats::default(),
        })
    }

    /// Creates a job with the next free id and the default deadline.
    pub fn create_job(
        &mut self,
        route_type: RouteType,
        origin: impl Into<String>,
        destination: impl Into<String>,
        now: SimTime,
    ) -> TruckJob {
        let id = format!("TJ-{:05}", self.next_id);
        self.next_id += 1;
        TruckJob::new(id, route_type, origin, destination, now)
            .with_deadline(now + self.config.default_deadline_hours)
    }

    /// Queues a job after checking its endpoints.
    pub fn submit(&mut self, job: TruckJob) -> PortResult<String> {
        self.locations.get(&job.origin)?;
        self.locations.get(&job.destination)?;
        debug!(job = %job.id, route = ?job.route_type, origin = %job.origin, destination = %job.destination, "truck job queued");
        let id = job.id.clone();
        self.stats.submitted += 1;
        self.queue.push(job);
        Ok(id)
    }

    /// Matches queued jobs with available trucks.
    pub fn dispatch(&mut self, now: SimTime) -> PortResult<Vec<TruckAssignment>> {
        let ctx = DispatchContext::at(now).with_aging_rate(self.config.aging_rate);
        let mut assigned = Vec::new();
        for seq in self.queue.ranked(&self.engine, &ctx) {
            let Some(job) = self.queue.get(seq) else {
                continue;
            };
            let Some(truck_id) = self.best_truck(job)? else {
                continue;
            };
            let Some(mut job) = self.queue.remove(seq) else {
                continue;
            };
            let truck = self
                .trucks
                .get_mut(&truck_id)
                .ok_or_else(|| PortError::unknown("truck", truck_id.as_str()))?;
            truck.status = TruckStatus::Busy;
            truck.current_job = Some(job.id.clone());
            job.assigned_truck = Some(truck_id.clone());
            job.started_at = Some(now);
            debug!(job = %job.id, truck = %truck_id, "truck assigned");
            assigned.push(TruckAssignment {
                job_id: job.id.clone(),
                truck_id,
            });
            self.active.insert(job.id.clone(), job);
        }
        Ok(assigned)
    }

    fn best_truck(&self, job: &TruckJob) -> PortResult<Option<String>> {
        let origin = self.locations.get(&job.origin)?;
        let mut best: Option<(f64, &str)> = None;
        for truck in self.trucks.values() {
            if truck.truck_type != job.truck_type || !truck.is_available(self.config.min_fuel_level) {
                continue;
            }
            let at = self.locations.get(&truck.location)?;
            let score = truck_score(truck, at, origin, &self.config);
            match best {
                Some((s, _)) if s <= score => {}
                _ => best = Some((score, truck.id.as_str())),
            }
        }
        Ok(best.map(|(_, id)| id.to_string()))
    }

    /// Distance and duration from `from` to `to` for a truck, at the
    /// current traffic level.
    pub fn leg(&self, truck_id: &str, from: &str, to: &str) -> PortResult<Leg> {
        let truck = self.truck(truck_id)?;
        let km = self.locations.distance_km(from, to)?;
        let hours = if km <= 0.0 {
            0.0
        } else {
            km / truck.average_speed_kmh * self.traffic.factor() * self.locations.surcharge(from, to)?
        };
        Ok(Leg { km, hours })
    }

    /// Moves a truck to `location`, booking the leg.
    pub fn arrive(&mut self, job_id: &str, location: &str, leg: Leg) -> PortResult<()> {
        let job = self
            .active
            .get_mut(job_id)
            .ok_or_else(|| PortError::unknown("truck job", job_id))?;
        let truck_id = job
            .assigned_truck
            .clone()
            .ok_or_else(|| PortError::unknown("truck for job", job_id))?;
        job.distance_km += leg.km;
        let truck = self
            .trucks
            .get_mut(&truck_id)
            .ok_or_else(|| PortError::unknown("truck", truck_id.as_str()))?;
        truck.drive(leg.km, self.config.fuel_per_km);
        truck.location = location.to_string();
        self.stats.total_distance_km += leg.km;
        Ok(())
    }

    /// Closes a job at its destination. The truck becomes idle there, or
    /// starts refueling when the tank is low.
    pub fn complete(&mut self, job_id: &str, now: SimTime) -> PortResult<JobOutcome> {
        let mut job = self
            .active
            .remove(job_id)
            .ok_or_else(|| PortError::unknown("truck job", job_id))?;
        let met = now <= job.deadline;
        job.completed_at = Some(now);
        job.met_deadline = Some(met);

        let busy = job.started_at.map_or(0.0, |s| now.since(s));
        let mut refueling = false;
        if let Some(truck_id) = &job.assigned_truck {
            let truck = self
                .trucks
                .get_mut(truck_id)
                .ok_or_else(|| PortError::unknown("truck", truck_id.as_str()))?;
            truck.current_job = None;
            truck.jobs_completed += 1;
            truck.busy_hours += busy;
            truck.location = job.destination.clone();
            if truck.fuel_level < self.config.refuel_threshold {
                truck.status = TruckStatus::Refueling;
                refueling = true;
            } else {
                truck.status = TruckStatus::Idle;
            }
        }

        self.stats.completed += 1;
        if met {
            self.stats.on_time += 1;
        }
        self.stats.total_wait_hours += job.wait_hours().unwrap_or(0.0);
        self.stats.total_truck_hours += busy;
        if refueling {
            self.stats.refuels += 1;
        }
        info!(job = %job.id, truck = ?job.assigned_truck, on_time = met, km = job.distance_km, "truck job completed");
        Ok(JobOutcome { job, refueling })
    }

    /// Fills the tank and returns the truck to service.
    pub fn finish_refuel(&mut self, truck_id: &str) -> PortResult<()> {
        let truck = self
            .trucks
            .get_mut(truck_id)
            .ok_or_else(|| PortError::unknown("truck", truck_id))?;
        truck.refuel();
        truck.status = TruckStatus::Idle;
        Ok(())
    }

    pub fn update_traffic<R: Rng>(&mut self, now: SimTime, rng: &mut R) -> f64 {
        self.traffic.update(now, rng)
    }

    pub fn traffic_factor(&self) -> f64 {
        self.traffic.factor()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn locations(&self) -> &LocationMap {
        &self.locations
    }

    pub fn truck(&self, id: &str) -> PortResult<&Truck> {
        self.trucks.get(id).ok_or_else(|| PortError::unknown("truck", id))
    }

    pub fn trucks(&self) -> impl Iterator<Item = &Truck> {
        self.trucks.values()
    }

    pub fn job(&self, id: &str) -> Option<&TruckJob> {
        self.active.get(id)
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn idle_count(&self) -> usize {
        self.trucks
            .values()
            .filter(|t| t.status == TruckStatus::Idle)
            .count()
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Empties the queues and parks every truck back home, full.
    pub fn reset(&mut self) {
        self.trucks = self.initial_trucks.clone();
        self.queue = DispatchQueue::new();
        self.active.clear();
        self.traffic = TrafficModel::default();
        self.next_id = 1;
        self.stats = DispatchStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> TruckDispatcher {
        let groups = vec![
            TruckGroupConfig::new("standard", 2, "PORT_YARD"),
            TruckGroupConfig::new("reefer", 1, "DC_CITY"),
        ];
        let locations = vec![
            LocationConfig::new("PORT_YARD", "port", 51.95, 4.05),
            LocationConfig::new("DC_CITY", "warehouse", 51.90, 4.48),
            LocationConfig::new("BORDER_EAST", "border", 51.85, 6.10),
        ];
        TruckDispatcher::new(&DispatchConfig::default(), &groups, &locations).unwrap()
    }

    #[test]
    fn test_fleet_ids() {
        let d = dispatcher();
        let ids: Vec<&str> = d.trucks().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["RFR-01", "STD-01", "STD-02"]);
        assert_eq!(d.idle_count(), 3);
    }

    #[test]
    fn test_type_matching_and_requeue() {
        let mut d = dispatcher();
        let now = SimTime::ZERO;
        for _ in 0..3 {
            let job = d.create_job(RouteType::Pickup, "PORT_YARD", "DC_CITY", now);
            d.submit(job).unwrap();
        }
        let assigned = d.dispatch(now).unwrap();
        assert_eq!(assigned.len(), 2);
        assert!(assigned.iter().all(|a| a.truck_id.starts_with("STD")));
        assert_eq!(d.queued_count(), 1);

        // The reefer never takes a standard job.
        assert!(d.dispatch(now).unwrap().is_empty());
    }

    #[test]
    fn test_nearest_truck_wins() {
        let mut d = dispatcher();
        let job = d
            .create_job(RouteType::Delivery, "DC_CITY", "PORT_YARD", SimTime::ZERO)
            .with_truck_type(TruckType::Reefer);
        d.submit(job).unwrap();
        let assigned = d.dispatch(SimTime::ZERO).unwrap();
        assert_eq!(assigned[0].truck_id, "RFR-01");
    }

    #[test]
    fn test_trip_lifecycle() {
        let mut d = dispatcher();
        let job = d.create_job(RouteType::Pickup, "PORT_YARD", "BORDER_EAST", SimTime::ZERO);
        let job_id = d.submit(job).unwrap();
        let a = d.dispatch(SimTime::ZERO).unwrap().remove(0);

        let empty = d.leg(&a.truck_id, "PORT_YARD", "PORT_YARD").unwrap();
        assert_eq!(empty.hours, 0.0);
        let loaded = d.leg(&a.truck_id, "PORT_YARD", "BORDER_EAST").unwrap();
        let expected = loaded.km / 50.0 * 1.0 * 1.2 * 1.5;
        assert!((loaded.hours - expected).abs() < 1e-9);

        d.arrive(&job_id, "BORDER_EAST", loaded).unwrap();
        let outcome = d.complete(&job_id, SimTime(loaded.hours + 0.5)).unwrap();
        assert_eq!(outcome.job.met_deadline, Some(true));
        let truck = d.truck(&a.truck_id).unwrap();
        assert_eq!(truck.location, "BORDER_EAST");
        assert!((truck.odometer_km - loaded.km).abs() < 1e-9);
        assert!((d.stats().on_time_rate() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_low_fuel_triggers_refuel() {
        let mut d = dispatcher();
        let job = d.create_job(RouteType::Pickup, "PORT_YARD", "BORDER_EAST", SimTime::ZERO);
        let job_id = d.submit(job).unwrap();
        let a = d.dispatch(SimTime::ZERO).unwrap().remove(0);
        // 450 km at 0.002/km leaves 10% in the tank.
        d.arrive(&job_id, "BORDER_EAST", Leg { km: 450.0, hours: 9.0 }).unwrap();
        let outcome = d.complete(&job_id, SimTime(20.0)).unwrap();
        assert!(outcome.refueling);
        assert_eq!(outcome.job.met_deadline, Some(false));
        assert_eq!(d.truck(&a.truck_id).unwrap().status, TruckStatus::Refueling);
        d.finish_refuel(&a.truck_id).unwrap();
        assert_eq!(d.truck(&a.truck_id).unwrap().status, TruckStatus::Idle);
    }
}
