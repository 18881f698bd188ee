//! Maintenance backlog ordering.
//!
//! `score = base_priority + condition_deficit/10 + type_criticality
//!          − 10 × overdue − aging`
//!
//! Each term is one rule; the engine sums them with unit weights.

use crate::dispatching::{
    rules, DispatchContext, DispatchingRule, EvaluationMode, RuleEngine, RuleScore, TieBreaker,
};

use super::MaintenanceTask;

/// Score bonus for past-due preventive service.
const OVERDUE_BONUS: f64 = 10.0;

/// Task priority level (1..=5).
#[derive(Debug, Clone, Copy)]
pub struct BasePriority;

impl DispatchingRule<MaintenanceTask> for BasePriority {
    fn name(&self) -> &'static str {
        "BASE_PRIORITY"
    }

    fn evaluate(&self, task: &MaintenanceTask, _context: &DispatchContext) -> RuleScore {
        task.priority.value()
    }
}

/// `(100 − condition) / 10`.
#[derive(Debug, Clone, Copy)]
pub struct ConditionDeficit;

impl DispatchingRule<MaintenanceTask> for ConditionDeficit {
    fn name(&self) -> &'static str {
        "CONDITION_DEFICIT"
    }

    fn evaluate(&self, task: &MaintenanceTask, _context: &DispatchContext) -> RuleScore {
        task.condition_deficit() / 10.0
    }
}

/// Equipment class criticality.
#[derive(Debug, Clone, Copy)]
pub struct TypeCriticality;

impl DispatchingRule<MaintenanceTask> for TypeCriticality {
    fn name(&self) -> &'static str {
        "TYPE_CRITICALITY"
    }

    fn evaluate(&self, task: &MaintenanceTask, _context: &DispatchContext) -> RuleScore {
        task.equipment_type.criticality()
    }

    fn description(&self) -> &'static str {
        "Quay cranes first, tractors last"
    }
}

/// Past-due preventive service.
#[derive(Debug, Clone, Copy)]
pub struct Overdue;

impl DispatchingRule<MaintenanceTask> for Overdue {
    fn name(&self) -> &'static str {
        "OVERDUE"
    }

    fn evaluate(&self, task: &MaintenanceTask, _context: &DispatchContext) -> RuleScore {
        if task.overdue {
            -OVERDUE_BONUS
        } else {
            0.0
        }
    }
}

/// Engine ranking the regular maintenance backlog.
pub fn maintenance_engine() -> RuleEngine<MaintenanceTask> {
    RuleEngine::new()
        .with_mode(EvaluationMode::Weighted)
        .with_rule(BasePriority)
        .with_rule(ConditionDeficit)
        .with_rule(TypeCriticality)
        .with_rule(Overdue)
        .with_rule(rules::Aging)
        .with_tie_breaker(rules::Fifo)
        .with_final_tie_breaker(TieBreaker::ById)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maintenance::{MaintenancePriority, MaintenanceType};
    use crate::models::{Equipment, EquipmentType};
    use crate::sim::SimTime;

    fn task(id: &str, ty: EquipmentType, condition: f64, priority: MaintenancePriority) -> MaintenanceTask {
        let eq = Equipment::new("E", ty).with_condition(condition);
        MaintenanceTask::new(id, &eq, MaintenanceType::Preventive, priority, SimTime::ZERO)
    }

    #[test]
    fn test_score_terms() {
        let engine = maintenance_engine();
        let ctx = DispatchContext::at(SimTime(10.0)).with_aging_rate(0.05);
        let mut t = task("A", EquipmentType::ReachStacker, 70.0, MaintenancePriority::Low);
        // 4 + 3 + 2 − 0.5
        assert!((engine.score(&t, &ctx) - 8.5).abs() < 1e-9);
        t.overdue = true;
        assert!((engine.score(&t, &ctx) + 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_ordering() {
        let engine = maintenance_engine();
        let ctx = DispatchContext::at(SimTime::ZERO);
        let tasks = vec![
            task("TR", EquipmentType::Tractor, 90.0, MaintenancePriority::Medium),
            task("QC", EquipmentType::QuayCrane, 90.0, MaintenancePriority::Medium),
            task("HI", EquipmentType::Tractor, 90.0, MaintenancePriority::Critical),
        ];
        let order: Vec<&str> = engine
            .sort_indices(&tasks, &ctx)
            .into_iter()
            .map(|i| tasks[i].id.as_str())
            .collect();
        // HI: 1+1+3 = 5, QC: 3+1+0 = 4, TR: 3+1+3 = 7
        assert_eq!(order, vec!["QC", "HI", "TR"]);
    }
}
