//! Berth allocation as a GA problem.
//!
//! Bridges an [`AllocationRequest`] to the generic runner: decodes
//! chromosomes into timed berth assignments and scores them with the
//! shared plan metrics.
//!
//! # Reference
//! Imai, Nishimura & Papadimitriou (2001), "The dynamic berth allocation
//! problem for a container port"

use std::collections::BTreeMap;

use rand::Rng;

use super::chromosome::{redraw_mutation, single_point_crossover, BerthChromosome};
use super::runner::GaProblem;
use crate::config::OptimizerConfig;
use crate::optimizer::service::ServiceModel;
use crate::optimizer::{plan_metrics, AllocationRequest, BerthAssignment, EfficiencyMetrics};
use crate::sim::SimTime;

/// Compact ship descriptor for GA encoding.
#[derive(Debug, Clone)]
pub struct ShipInfo {
    pub id: String,
    pub arrival: SimTime,
    pub priority: u8,
    pub containers: u32,
    /// Indices of berths that accept the ship.
    pub suitable: Vec<usize>,
}

impl ShipInfo {
    /// Extracts ship info from a request.
    pub fn from_request(request: &AllocationRequest) -> Vec<Self> {
        request
            .ships
            .iter()
            .map(|ship| ShipInfo {
                id: ship.id.clone(),
                arrival: ship.arrival_time,
                priority: ship.priority,
                containers: ship.total_containers(),
                suitable: request
                    .berths
                    .iter()
                    .enumerate()
                    .filter(|(_, b)| b.accepts(ship))
                    .map(|(i, _)| i)
                    .collect(),
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn test(id: &str, suitable: Vec<usize>) -> Self {
        Self {
            id: id.to_string(),
            arrival: SimTime::ZERO,
            priority: 5,
            containers: 100,
            suitable,
        }
    }
}

/// A decoded chromosome.
#[derive(Debug, Clone)]
pub struct DecodedPlan {
    pub assignments: BTreeMap<String, BerthAssignment>,
    /// Ships whose gene points at an unsuitable berth.
    pub infeasible: Vec<String>,
    pub metrics: EfficiencyMetrics,
}

/// GA problem definition for berth allocation.
pub struct BerthAllocationProblem<'a> {
    request: &'a AllocationRequest,
    config: &'a OptimizerConfig,
    service: ServiceModel,
    ships: Vec<ShipInfo>,
}

impl<'a> BerthAllocationProblem<'a> {
    pub fn new(request: &'a AllocationRequest, config: &'a OptimizerConfig) -> Self {
        Self {
            request,
            config,
            service: ServiceModel::from_config(config),
            ships: ShipInfo::from_request(request),
        }
    }

    pub fn ships(&self) -> &[ShipInfo] {
        &self.ships
    }

    fn service_hours(&self, ship: usize, berth: usize) -> f64 {
        self.service.service_hours(
            self.ships[ship].containers,
            self.request.berths[berth].crane_count,
            self.request.peak_season,
        )
    }

    /// Decodes a chromosome into a timed plan.
    ///
    /// Ships on one berth are served in (arrival, −priority, id) order.
    pub fn decode(&self, chromosome: &BerthChromosome) -> DecodedPlan {
        let mut per_berth: Vec<Vec<usize>> = vec![Vec::new(); self.request.berths.len()];
        let mut infeasible = Vec::new();
        for (i, (&gene, ship)) in chromosome.genes.iter().zip(&self.ships).enumerate() {
            if ship.suitable.contains(&gene) {
                per_berth[gene].push(i);
            } else {
                infeasible.push(ship.id.clone());
            }
        }

        let mut assignments = BTreeMap::new();
        for (b, queue) in per_berth.iter_mut().enumerate() {
            queue.sort_by(|&x, &y| {
                let (sx, sy) = (&self.ships[x], &self.ships[y]);
                sx.arrival
                    .cmp(&sy.arrival)
                    .then_with(|| sy.priority.cmp(&sx.priority))
                    .then_with(|| sx.id.cmp(&sy.id))
            });
            let berth = &self.request.berths[b];
            let mut free = berth.available_from.max(self.request.current_time);
            for &i in queue.iter() {
                let ship = &self.ships[i];
                let start = free.max(ship.arrival);
                let end = start + self.service_hours(i, b);
                assignments.insert(
                    ship.id.clone(),
                    BerthAssignment {
                        berth_id: berth.id.clone(),
                        start,
                        end,
                        wait_hours: start.since(ship.arrival),
                    },
                );
                free = end;
            }
        }

        let metrics = plan_metrics(self.request, &assignments, infeasible.len(), self.config);
        DecodedPlan {
            assignments,
            infeasible,
            metrics,
        }
    }
}

impl GaProblem for BerthAllocationProblem<'_> {
    type Individual = BerthChromosome;

    fn create_individual<R: Rng>(&self, rng: &mut R) -> BerthChromosome {
        // 50% random, 50% load-balanced
        if rng.random_bool(0.5) {
            BerthChromosome::random(&self.ships, rng)
        } else {
            BerthChromosome::load_balanced(
                &self.ships,
                self.request.berths.len(),
                |s, b| self.service_hours(s, b),
                rng,
            )
        }
    }

    fn evaluate(&self, individual: &BerthChromosome) -> f64 {
        -self.decode(individual).metrics.fitness
    }

    fn crossover<R: Rng>(
        &self,
        parent1: &BerthChromosome,
        parent2: &BerthChromosome,
        rng: &mut R,
    ) -> Vec<BerthChromosome> {
        let (c1, c2) = single_point_crossover(parent1, parent2, rng);
        vec![c1, c2]
    }

    fn mutate<R: Rng>(&self, individual: &mut BerthChromosome, rng: &mut R) {
        redraw_mutation(individual, &self.ships, self.config.mutation_rate, rng);
    }
}
