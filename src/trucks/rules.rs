//! Job ordering and truck selection.
//!
//! | Rule | Score (lower = sooner) |
//! |------|------------------------|
//! | `JOB_PRIORITY` | priority (1..=5) |
//! | `DEADLINE_URGENCY` | −10 if overdue, else −10 / (1 + hours left) |
//! | `ROUTE_BIAS` | Delivery −1, Pickup −0.5, Internal 0, Repositioning +1 |
//! | `AGING` | −aging_rate × hours waited |
//!
//! A truck's score for a job is
//! `km to origin + (1 − fuel) × fuel_penalty_weight + service_due_penalty`.

use super::{Location, Truck, TruckJob};
use crate::config::DispatchConfig;
use crate::dispatching::{
    rules, DispatchContext, DispatchingRule, EvaluationMode, RuleEngine, RuleScore, TieBreaker,
};

/// Job priority level.
#[derive(Debug, Clone, Copy)]
pub struct JobPriority;

impl DispatchingRule<TruckJob> for JobPriority {
    fn name(&self) -> &'static str {
        "JOB_PRIORITY"
    }

    fn evaluate(&self, job: &TruckJob, _context: &DispatchContext) -> RuleScore {
        job.priority as f64
    }
}

/// Deadline pressure.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineUrgency;

impl DispatchingRule<TruckJob> for DeadlineUrgency {
    fn name(&self) -> &'static str {
        "DEADLINE_URGENCY"
    }

    fn evaluate(&self, job: &TruckJob, context: &DispatchContext) -> RuleScore {
        let left = job.hours_to_deadline(context.now);
        if left < 0.0 {
            -10.0
        } else {
            -10.0 / (1.0 + left)
        }
    }

    fn description(&self) -> &'static str {
        "Closer deadlines first"
    }
}

/// Route direction preference.
#[derive(Debug, Clone, Copy)]
pub struct RouteBias;

impl DispatchingRule<TruckJob> for RouteBias {
    fn name(&self) -> &'static str {
        "ROUTE_BIAS"
    }

    fn evaluate(&self, job: &TruckJob, _context: &DispatchContext) -> RuleScore {
        job.route_type.bias()
    }
}

/// Engine ranking queued truck jobs.
pub fn truck_job_engine() -> RuleEngine<TruckJob> {
    RuleEngine::new()
        .with_mode(EvaluationMode::Weighted)
        .with_rule(JobPriority)
        .with_rule(DeadlineUrgency)
        .with_rule(RouteBias)
        .with_rule(rules::Aging)
        .with_tie_breaker(rules::Fifo)
        .with_final_tie_breaker(TieBreaker::ById)
}

/// Cost of sending `truck`, parked at `at`, to a job starting at `origin`.
pub fn truck_score(truck: &Truck, at: &Location, origin: &Location, config: &DispatchConfig) -> f64 {
    let fuel_penalty = (1.0 - truck.fuel_level) * config.fuel_penalty_weight;
    let service_penalty = if truck.service_due(config.service_interval_km) {
        config.maintenance_due_penalty
    } else {
        0.0
    };
    at.distance_km(origin) + fuel_penalty + service_penalty
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimTime;
    use crate::trucks::{LocationKind, RouteType, TruckType};

    #[test]
    fn test_job_score() {
        let engine = truck_job_engine();
        let job = TruckJob::new("J1", RouteType::Delivery, "A", "B", SimTime::ZERO)
            .with_priority(2)
            .with_deadline(SimTime(4.0));
        // 2 − 10/(1+3) − 1 − 0.5
        let ctx = DispatchContext::at(SimTime(1.0)).with_aging_rate(0.5);
        assert!((engine.score(&job, &ctx) - (2.0 - 2.5 - 1.0 - 0.5)).abs() < 1e-9);
        // Overdue: 2 − 10 − 1 − 2.5
        let ctx = DispatchContext::at(SimTime(5.0)).with_aging_rate(0.5);
        assert!((engine.score(&job, &ctx) + 11.5).abs() < 1e-9);
    }

    #[test]
    fn test_urgent_job_first() {
        let engine = truck_job_engine();
        let jobs = vec![
            TruckJob::new("REPO", RouteType::Repositioning, "A", "B", SimTime::ZERO),
            TruckJob::new("LATE", RouteType::Internal, "A", "B", SimTime::ZERO)
                .with_deadline(SimTime(0.5)),
            TruckJob::new("DEL", RouteType::Delivery, "A", "B", SimTime::ZERO),
        ];
        let ctx = DispatchContext::at(SimTime(1.0));
        let order: Vec<&str> = engine
            .sort_indices(&jobs, &ctx)
            .into_iter()
            .map(|i| jobs[i].id.as_str())
            .collect();
        assert_eq!(order, vec!["LATE", "DEL", "REPO"]);
    }

    #[test]
    fn test_truck_score_terms() {
        let config = DispatchConfig::default();
        let here = Location::new("A", LocationKind::Depot, 0.0, 0.0);
        let fresh = Truck::new("T1", TruckType::Standard, "A");
        assert!(truck_score(&fresh, &here, &here, &config).abs() < 1e-9);

        let worn = Truck::new("T2", TruckType::Standard, "A")
            .with_fuel(0.5)
            .with_km_since_service(20_000.0);
        assert!((truck_score(&worn, &here, &here, &config) - (10.0 + 25.0)).abs() < 1e-9);
    }
}
