//! Priority heuristic for berth allocation.
//!
//! # Algorithm
//!
//! 1. Rank ships by the weighted sum of the rules below (best first),
//!    breaking ties by arrival time and then id.
//! 2. Give each ship, in order, the suitable berth with the earliest
//!    available start; the berth is then busy until the service ends.
//! 3. Ships with no suitable berth stay unallocated.
//!
//! | Rule | Score (lower = sooner) |
//! |------|------------------------|
//! | `SHIP_PRIORITY` | −priority |
//! | `WAIT_URGENCY` | −min(wait, 48) / 4 |
//! | `VESSEL_SIZE` | −size_teu / 5000 |
//! | `CARGO_VOLUME` | −containers / 500 |
//!
//! # Complexity
//! O(n log n + n × b) for n ships and b berths.
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 4: Priority Dispatching

use std::collections::BTreeMap;

use super::service::ServiceModel;
use super::{AllocationRequest, BerthAssignment};
use crate::dispatching::{
    rules, DispatchContext, DispatchingRule, EvaluationMode, RuleEngine, RuleScore, TieBreaker,
};
use crate::models::Ship;
use crate::sim::SimTime;

/// Wait beyond which urgency stops growing (hours).
const URGENCY_CAP_HOURS: f64 = 48.0;

/// Commercial priority (1..=10).
#[derive(Debug, Clone, Copy)]
pub struct ShipPriority;

impl DispatchingRule<Ship> for ShipPriority {
    fn name(&self) -> &'static str {
        "SHIP_PRIORITY"
    }

    fn evaluate(&self, ship: &Ship, _context: &DispatchContext) -> RuleScore {
        -(ship.priority as f64)
    }

    fn description(&self) -> &'static str {
        "Higher commercial priority first"
    }
}

/// Hours already waited, capped.
#[derive(Debug, Clone, Copy)]
pub struct WaitUrgency;

impl DispatchingRule<Ship> for WaitUrgency {
    fn name(&self) -> &'static str {
        "WAIT_URGENCY"
    }

    fn evaluate(&self, ship: &Ship, context: &DispatchContext) -> RuleScore {
        -(context.waited(ship.arrival_time).min(URGENCY_CAP_HOURS) / 4.0)
    }

    fn description(&self) -> &'static str {
        "Longer-waiting ships first"
    }
}

/// Vessel size.
#[derive(Debug, Clone, Copy)]
pub struct VesselSize;

impl DispatchingRule<Ship> for VesselSize {
    fn name(&self) -> &'static str {
        "VESSEL_SIZE"
    }

    fn evaluate(&self, ship: &Ship, _context: &DispatchContext) -> RuleScore {
        -(ship.size_teu as f64 / 5000.0)
    }
}

/// Containers to move.
#[derive(Debug, Clone, Copy)]
pub struct CargoVolume;

impl DispatchingRule<Ship> for CargoVolume {
    fn name(&self) -> &'static str {
        "CARGO_VOLUME"
    }

    fn evaluate(&self, ship: &Ship, _context: &DispatchContext) -> RuleScore {
        -(ship.total_containers() as f64 / 500.0)
    }
}

/// The ship ranking engine used by the heuristic.
pub fn ship_priority_engine(priority_weight: f64) -> RuleEngine<Ship> {
    RuleEngine::new()
        .with_mode(EvaluationMode::Weighted)
        .with_weighted_rule(ShipPriority, priority_weight)
        .with_weighted_rule(WaitUrgency, 1.0)
        .with_weighted_rule(VesselSize, 1.0)
        .with_weighted_rule(CargoVolume, 1.0)
        .with_tie_breaker(rules::Fifo)
        .with_final_tie_breaker(TieBreaker::ById)
}

/// Greedy earliest-start allocator.
#[derive(Debug, Clone)]
pub struct PriorityHeuristic {
    engine: RuleEngine<Ship>,
    service: ServiceModel,
}

impl PriorityHeuristic {
    pub fn new(priority_weight: f64, service: ServiceModel) -> Self {
        Self {
            engine: ship_priority_engine(priority_weight),
            service,
        }
    }

    /// Ships ranked best first (indices into `request.ships`).
    pub fn rank(&self, request: &AllocationRequest) -> Vec<usize> {
        let ctx = DispatchContext::at(request.current_time).with_peak_season(request.peak_season);
        self.engine.sort_indices(&request.ships, &ctx)
    }

    /// Allocates every ship it can.
    ///
    /// Returns the assignments and the ids of ships with no suitable berth.
    pub fn allocate(&self, request: &AllocationRequest) -> (BTreeMap<String, BerthAssignment>, Vec<String>) {
        let mut free_at: Vec<SimTime> = request
            .berths
            .iter()
            .map(|b| b.available_from.max(request.current_time))
            .collect();
        let mut assignments = BTreeMap::new();
        let mut unallocated = Vec::new();

        for idx in self.rank(request) {
            let ship = &request.ships[idx];
            let ready = ship.arrival_time.max(request.current_time);
            let best = request
                .berths
                .iter()
                .enumerate()
                .filter(|(_, b)| b.accepts(ship))
                .map(|(i, _)| (i, free_at[i].max(ready)))
                .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

            let Some((berth_idx, start)) = best else {
                unallocated.push(ship.id.clone());
                continue;
            };
            let berth = &request.berths[berth_idx];
            let hours = self
                .service
                .service_hours(ship.total_containers(), berth.crane_count, request.peak_season);
            let end = start + hours;
            free_at[berth_idx] = end;
            assignments.insert(
                ship.id.clone(),
                BerthAssignment {
                    berth_id: berth.id.clone(),
                    start,
                    end,
                    wait_hours: start.since(ship.arrival_time),
                },
            );
        }

        (assignments, unallocated)
    }
}
