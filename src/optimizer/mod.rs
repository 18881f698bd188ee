//! Berth allocation optimizer.
//!
//! Assigns waiting ships to berths with start/end times. Two strategies:
//!
//! | Strategy | When | Module |
//! |----------|------|--------|
//! | Priority heuristic | off-peak, fewer than `ga_ship_threshold` ships | [`heuristic`] |
//! | Genetic algorithm | peak season or many ships | [`genetic`] |
//!
//! Ships the GA cannot place are re-offered to the heuristic. A ship that
//! fits no berth at all is reported in [`AllocationResult::unallocated`];
//! a partial plan is a normal outcome, not an error.
//!
//! # Plan objective
//!
//! ```text
//! fitness = 0.4 × revenue − efficiency_weight × 1000 × avg_wait
//!           − 100 × (24 − utilization_hours) − penalty × infeasible
//! ```
//!
//! where `utilization_hours` is the mean busy time per berth, in hours per
//! 24 hours of the planning horizon.

pub mod genetic;
pub mod heuristic;
mod service;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::OptimizerConfig;
use crate::models::{berth_accepts, Berth, Ship, ShipType};
use crate::sim::SimTime;

pub use genetic::{BerthAllocationProblem, GaConfig, GaRunner};
pub use heuristic::PriorityHeuristic;
pub use service::ServiceModel;

/// A berth as seen by the optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BerthSlot {
    pub id: String,
    pub berth_type: ShipType,
    pub capacity_teu: u32,
    pub crane_count: u32,
    /// Earliest time a new ship may start.
    pub available_from: SimTime,
}

impl BerthSlot {
    pub fn new(id: impl Into<String>, berth_type: ShipType, capacity_teu: u32, crane_count: u32) -> Self {
        Self {
            id: id.into(),
            berth_type,
            capacity_teu,
            crane_count,
            available_from: SimTime::ZERO,
        }
    }

    pub fn with_available_from(mut self, at: SimTime) -> Self {
        self.available_from = at;
        self
    }

    /// Snapshot of a live berth.
    pub fn from_berth(berth: &Berth, available_from: SimTime) -> Self {
        Self::new(&berth.id, berth.berth_type, berth.capacity_teu, berth.crane_count)
            .with_available_from(available_from)
    }

    pub fn accepts(&self, ship: &Ship) -> bool {
        berth_accepts(self.berth_type, self.capacity_teu, ship.ship_type, ship.size_teu)
    }
}

/// Optimizer input.
#[derive(Debug, Clone)]
pub struct AllocationRequest {
    pub ships: Vec<Ship>,
    pub berths: Vec<BerthSlot>,
    pub current_time: SimTime,
    pub peak_season: bool,
}

impl AllocationRequest {
    pub fn new(ships: Vec<Ship>, berths: Vec<BerthSlot>, current_time: SimTime) -> Self {
        Self {
            ships,
            berths,
            current_time,
            peak_season: false,
        }
    }

    pub fn with_peak_season(mut self, peak: bool) -> Self {
        self.peak_season = peak;
        self
    }
}

/// One ship's planned berth call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BerthAssignment {
    pub berth_id: String,
    pub start: SimTime,
    pub end: SimTime,
    /// Hours from arrival to `start`.
    pub wait_hours: f64,
}

/// Which strategy produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationStrategy {
    PriorityHeuristic,
    Genetic,
    /// GA plan completed by the heuristic.
    GeneticWithFallback,
}

/// Plan quality figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyMetrics {
    /// Mean wait of allocated ships (hours).
    pub avg_waiting_time: f64,
    /// Mean busy hours per berth per 24h of horizon.
    pub avg_berth_utilization: f64,
    pub projected_revenue: f64,
    /// Plan objective (higher = better).
    pub fitness: f64,
    /// GA generations run (0 for the heuristic).
    pub generations: usize,
}

/// Optimizer output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationResult {
    /// Ship id → assignment.
    pub assignments: BTreeMap<String, BerthAssignment>,
    /// Ships that fit no berth.
    pub unallocated: Vec<String>,
    pub strategy: AllocationStrategy,
    pub metrics: EfficiencyMetrics,
}

impl AllocationResult {
    fn empty(strategy: AllocationStrategy) -> Self {
        Self {
            assignments: BTreeMap::new(),
            unallocated: Vec::new(),
            strategy,
            metrics: EfficiencyMetrics::default(),
        }
    }

    pub fn assignment(&self, ship_id: &str) -> Option<&BerthAssignment> {
        self.assignments.get(ship_id)
    }

    /// Whether every ship was placed.
    pub fn is_complete(&self) -> bool {
        self.unallocated.is_empty()
    }

    /// Assignments starting at or before `now`, ordered by start then ship id.
    pub fn due_by(&self, now: SimTime) -> Vec<(&str, &BerthAssignment)> {
        let mut due: Vec<(&str, &BerthAssignment)> = self
            .assignments
            .iter()
            .filter(|(_, a)| a.start <= now)
            .map(|(id, a)| (id.as_str(), a))
            .collect();
        due.sort_by(|a, b| a.1.start.cmp(&b.1.start).then_with(|| a.0.cmp(b.0)));
        due
    }
}

/// Scores a plan.
pub(crate) fn plan_metrics(
    request: &AllocationRequest,
    assignments: &BTreeMap<String, BerthAssignment>,
    infeasible: usize,
    config: &OptimizerConfig,
) -> EfficiencyMetrics {
    let allocated = assignments.len();
    let avg_waiting_time = if allocated == 0 {
        0.0
    } else {
        assignments.values().map(|a| a.wait_hours).sum::<f64>() / allocated as f64
    };

    let horizon = assignments
        .values()
        .map(|a| a.end.since(request.current_time))
        .fold(0.0f64, f64::max);
    let avg_berth_utilization = if horizon <= 0.0 || request.berths.is_empty() {
        0.0
    } else {
        let mut busy: BTreeMap<&str, f64> = request.berths.iter().map(|b| (b.id.as_str(), 0.0)).collect();
        for a in assignments.values() {
            if let Some(hours) = busy.get_mut(a.berth_id.as_str()) {
                *hours += a.end.since(a.start);
            }
        }
        busy.values().map(|h| h / horizon * 24.0).sum::<f64>() / request.berths.len() as f64
    };

    let containers: u32 = request
        .ships
        .iter()
        .filter(|s| assignments.contains_key(&s.id))
        .map(|s| s.total_containers())
        .sum();
    let projected_revenue = containers as f64 * config.revenue_per_container;

    let fitness = 0.4 * projected_revenue
        - config.efficiency_weight * 1000.0 * avg_waiting_time
        - 100.0 * (24.0 - avg_berth_utilization)
        - config.infeasibility_penalty * infeasible as f64;

    EfficiencyMetrics {
        avg_waiting_time,
        avg_berth_utilization,
        projected_revenue,
        fitness,
        generations: 0,
    }
}

/// Chooses a strategy and produces a plan.
///
/// # Example
///
/// ```
/// use u_portsim::config::OptimizerConfig;
/// use u_portsim::models::{Ship, ShipType};
/// use u_portsim::optimizer::{AllocationRequest, AllocationStrategy, BerthAllocationOptimizer, BerthSlot};
/// use u_portsim::sim::SimTime;
///
/// let request = AllocationRequest::new(
///     vec![Ship::new("S1", ShipType::Container, 9000).with_containers(300, 200)],
///     vec![BerthSlot::new("B1", ShipType::Container, 20_000, 3)],
///     SimTime::ZERO,
/// );
/// let result = BerthAllocationOptimizer::new(OptimizerConfig::default()).optimize(&request);
/// assert_eq!(result.strategy, AllocationStrategy::PriorityHeuristic);
/// assert_eq!(result.assignment("S1").unwrap().berth_id, "B1");
/// ```
#[derive(Debug, Clone)]
pub struct BerthAllocationOptimizer {
    config: OptimizerConfig,
    seed: u64,
}

impl BerthAllocationOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config, seed: 42 }
    }

    /// Seed for the GA's random stream.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Whether `request` goes to the GA.
    pub fn uses_genetic(&self, request: &AllocationRequest) -> bool {
        request.peak_season || request.ships.len() >= self.config.ga_ship_threshold
    }

    pub fn optimize(&self, request: &AllocationRequest) -> AllocationResult {
        if request.ships.is_empty() {
            return AllocationResult::empty(AllocationStrategy::PriorityHeuristic);
        }
        if self.uses_genetic(request) {
            debug!(ships = request.ships.len(), peak = request.peak_season, "genetic allocation");
            self.optimize_genetic(request)
        } else {
            debug!(ships = request.ships.len(), "heuristic allocation");
            self.optimize_heuristic(request)
        }
    }

    fn heuristic(&self) -> PriorityHeuristic {
        PriorityHeuristic::new(self.config.priority_weight, ServiceModel::from_config(&self.config))
    }

    fn ga_config(&self) -> GaConfig {
        GaConfig {
            population_size: self.config.population_size.max(2),
            max_generations: self.config.max_generations,
            elitism_rate: self.config.elitism_rate,
            tournament_size: self.config.tournament_size,
            crossover_rate: self.config.crossover_rate,
            convergence_threshold: self.config.convergence_threshold,
            stall_generations: self.config.stall_generations,
            seed: self.seed,
        }
    }

    /// Runs the heuristic regardless of the selection rule.
    pub fn optimize_heuristic(&self, request: &AllocationRequest) -> AllocationResult {
        let (assignments, unallocated) = self.heuristic().allocate(request);
        let metrics = plan_metrics(request, &assignments, 0, &self.config);
        AllocationResult {
            assignments,
            unallocated,
            strategy: AllocationStrategy::PriorityHeuristic,
            metrics,
        }
    }

    /// Runs the GA (plus heuristic fallback) regardless of the selection rule.
    pub fn optimize_genetic(&self, request: &AllocationRequest) -> AllocationResult {
        let problem = BerthAllocationProblem::new(request, &self.config);
        let Some(run) = GaRunner::run(&problem, &self.ga_config()) else {
            return self.optimize_heuristic(request);
        };
        let plan = problem.decode(&run.best);
        let mut assignments = plan.assignments;
        let mut unallocated = Vec::new();
        let mut strategy = AllocationStrategy::Genetic;

        if !plan.infeasible.is_empty() {
            warn!(ships = plan.infeasible.len(), "GA left ships unplaced, offering them to the heuristic");
            let berths = request
                .berths
                .iter()
                .map(|b| {
                    let busy_until = assignments
                        .values()
                        .filter(|a| a.berth_id == b.id)
                        .map(|a| a.end)
                        .max()
                        .unwrap_or(b.available_from);
                    b.clone().with_available_from(busy_until.max(b.available_from))
                })
                .collect();
            let leftovers = request
                .ships
                .iter()
                .filter(|s| plan.infeasible.contains(&s.id))
                .cloned()
                .collect();
            let sub = AllocationRequest {
                ships: leftovers,
                berths,
                current_time: request.current_time,
                peak_season: request.peak_season,
            };
            let (placed, still) = self.heuristic().allocate(&sub);
            if !placed.is_empty() {
                strategy = AllocationStrategy::GeneticWithFallback;
            }
            assignments.extend(placed);
            unallocated = still;
        }

        let mut metrics = plan_metrics(request, &assignments, unallocated.len(), &self.config);
        metrics.generations = run.generations;
        AllocationResult {
            assignments,
            unallocated,
            strategy,
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fleet(n: usize) -> Vec<Ship> {
        (0..n)
            .map(|i| {
                let ship_type = if i % 3 == 0 { ShipType::Bulk } else { ShipType::Container };
                Ship::new(format!("S{i:02}"), ship_type, 4000 + (i as u32 % 5) * 3000)
                    .with_containers(200 + 37 * i as u32 % 300, 150)
                    .with_priority((i % 10) as u8 + 1)
                    .with_arrival(SimTime(i as f64 * 0.5))
            })
            .collect()
    }

    fn berths() -> Vec<BerthSlot> {
        vec![
            BerthSlot::new("B1", ShipType::Container, 20_000, 4),
            BerthSlot::new("B2", ShipType::Container, 15_000, 3),
            BerthSlot::new("B3", ShipType::Bulk, 30_000, 2),
            BerthSlot::new("B4", ShipType::Mixed, 25_000, 3),
        ]
    }

    #[test]
    fn test_slot_and_berth_agree_on_suitability() {
        let ships = [
            Ship::new("C", ShipType::Container, 18_000),
            Ship::new("B", ShipType::Bulk, 18_000),
            Ship::new("X", ShipType::Mixed, 26_000),
        ];
        for berth_type in [ShipType::Container, ShipType::Bulk, ShipType::Mixed] {
            let berth = Berth::new("B1", berth_type, 20_000, 2);
            let slot = BerthSlot::from_berth(&berth, SimTime::ZERO);
            for ship in &ships {
                assert_eq!(slot.accepts(ship), berth.is_suitable_for(ship), "{berth_type:?} {}", ship.id);
            }
        }
        let mixed = Berth::new("M", ShipType::Mixed, 20_000, 2);
        assert!(mixed.is_suitable_for(&ships[1]));
        assert!(!mixed.is_suitable_for(&ships[2]));
    }

    #[test]
    fn test_strategy_selection() {
        let opt = BerthAllocationOptimizer::new(OptimizerConfig::default());
        let small = AllocationRequest::new(fleet(3), berths(), SimTime::ZERO);
        assert!(!opt.uses_genetic(&small));
        assert!(opt.uses_genetic(&small.clone().with_peak_season(true)));
        let big = AllocationRequest::new(fleet(8), berths(), SimTime::ZERO);
        assert!(opt.uses_genetic(&big));
    }

    #[test]
    fn test_genetic_places_every_ship_on_suitable_berth() {
        let mut config = OptimizerConfig::default();
        config.max_generations = 20;
        let opt = BerthAllocationOptimizer::new(config).with_seed(7);
        let request = AllocationRequest::new(fleet(10), berths(), SimTime::ZERO);
        let result = opt.optimize(&request);
        assert_eq!(result.strategy, AllocationStrategy::Genetic);
        assert!(result.is_complete());
        assert_eq!(result.assignments.len(), 10);
        for ship in &request.ships {
            let a = &result.assignments[&ship.id];
            let berth = request.berths.iter().find(|b| b.id == a.berth_id).unwrap();
            assert!(berth.accepts(ship));
            assert!(a.start >= ship.arrival_time);
        }
        assert!(result.metrics.generations > 0);
    }

    #[test]
    fn test_no_overlap_on_a_berth() {
        let opt = BerthAllocationOptimizer::new(OptimizerConfig::default());
        for peak in [false, true] {
            let request = AllocationRequest::new(fleet(12), berths(), SimTime::ZERO).with_peak_season(peak);
            let result = opt.optimize(&request);
            for b in &request.berths {
                let mut calls: Vec<&BerthAssignment> =
                    result.assignments.values().filter(|a| a.berth_id == b.id).collect();
                calls.sort_by(|x, y| x.start.cmp(&y.start));
                for w in calls.windows(2) {
                    assert!(w[0].end <= w[1].start);
                }
            }
        }
    }

    #[test]
    fn test_more_generations_never_worse() {
        let request = AllocationRequest::new(fleet(10), berths(), SimTime::ZERO);
        let mut previous = f64::NEG_INFINITY;
        for generations in [0, 5, 20, 60] {
            let mut config = OptimizerConfig::default();
            config.max_generations = generations;
            let result = BerthAllocationOptimizer::new(config).with_seed(3).optimize_genetic(&request);
            assert!(result.metrics.fitness >= previous - 1e-9, "{generations}");
            previous = result.metrics.fitness;
        }
    }

    #[test]
    fn test_unfit_ship_reported_not_error() {
        let huge = Ship::new("HUGE", ShipType::Container, 90_000).with_containers(100, 100);
        let request = AllocationRequest::new(vec![huge], berths(), SimTime::ZERO);
        let opt = BerthAllocationOptimizer::new(OptimizerConfig::default());
        let heuristic = opt.optimize(&request);
        assert_eq!(heuristic.unallocated, vec!["HUGE".to_string()]);
        let genetic = opt.optimize(&request.clone().with_peak_season(true));
        assert_eq!(genetic.unallocated, vec!["HUGE".to_string()]);
        assert!(genetic.assignments.is_empty());
    }

    #[test]
    fn test_metrics_formula() {
        let ship = Ship::new("S", ShipType::Container, 5000).with_containers(100, 0);
        let request = AllocationRequest::new(vec![ship], vec![BerthSlot::new("B1", ShipType::Container, 10_000, 1)], SimTime::ZERO);
        let mut assignments = BTreeMap::new();
        assignments.insert(
            "S".to_string(),
            BerthAssignment {
                berth_id: "B1".into(),
                start: SimTime(2.0),
                end: SimTime(8.0),
                wait_hours: 2.0,
            },
        );
        let config = OptimizerConfig::default();
        let m = plan_metrics(&request, &assignments, 0, &config);
        assert!((m.avg_waiting_time - 2.0).abs() < 1e-9);
        // busy 6h over an 8h horizon → 18h per 24h
        assert!((m.avg_berth_utilization - 18.0).abs() < 1e-9);
        assert!((m.projected_revenue - 15_000.0).abs() < 1e-9);
        let expected = 0.4 * 15_000.0 - 1000.0 * 2.0 - 100.0 * 6.0;
        assert!((m.fitness - expected).abs() < 1e-9);
    }
}
