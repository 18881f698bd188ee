//! Replaceable impact heuristics.
//!
//! Which nodes an event hits, and by how much, is a modelling choice
//! rather than a law. [`ImpactPolicy`] isolates it.

use std::fmt::Debug;

use super::event::DisruptionEvent;
use super::network::SupplyChainNode;

/// Decides how a disruption affects a node.
pub trait ImpactPolicy: Send + Sync + Debug {
    /// Impact weight on `node`, or `None` if the node is unaffected.
    fn weight(&self, event: &DisruptionEvent, node: &SupplyChainNode) -> Option<f64>;

    /// Capacity reduction in [0, 1) for a severity and weight.
    fn reduction(&self, severity: u8, weight: f64) -> f64;

    /// Reduction applied to `node`, if any.
    fn impact(&self, event: &DisruptionEvent, node: &SupplyChainNode) -> Option<f64> {
        self.weight(event, node)
            .map(|w| self.reduction(event.severity, w))
            .filter(|r| *r > 0.0)
    }
}

/// Region filter plus area match; `reduction = min(cap, per_severity × severity × weight)`.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicImpactPolicy {
    pub per_severity: f64,
    pub cap: f64,
}

impl Default for HeuristicImpactPolicy {
    fn default() -> Self {
        Self {
            per_severity: 0.2,
            cap: 0.8,
        }
    }
}

impl ImpactPolicy for HeuristicImpactPolicy {
    fn weight(&self, event: &DisruptionEvent, node: &SupplyChainNode) -> Option<f64> {
        if let Some(region) = &event.region {
            if region != &node.region {
                return None;
            }
        }
        event
            .affected_areas
            .get(&node.id)
            .or_else(|| event.affected_areas.get(node.kind.area()))
            .copied()
    }

    fn reduction(&self, severity: u8, weight: f64) -> f64 {
        (self.per_severity * severity as f64 * weight).clamp(0.0, self.cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruption::network::NodeKind;
    use crate::disruption::template::{DisruptionCategory, DisruptionTemplate};
    use crate::sim::SimTime;

    fn event(region: Option<&str>) -> DisruptionEvent {
        let mut t = DisruptionTemplate::new("T", DisruptionCategory::Weather, 3, 1.0, 1.0)
            .with_area("port_operations", 1.0)
            .with_area("rail", 0.5);
        t.region = region.map(str::to_string);
        DisruptionEvent::from_template("T#1", &t, None, SimTime::ZERO)
    }

    #[test]
    fn test_reduction_capped() {
        let p = HeuristicImpactPolicy::default();
        assert!((p.reduction(5, 1.0) - 0.8).abs() < 1e-12);
        assert!((p.reduction(2, 1.0) - 0.4).abs() < 1e-12);
        assert!((p.reduction(3, 0.5) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_matches_by_id_or_kind() {
        let p = HeuristicImpactPolicy::default();
        let ops = SupplyChainNode::new("port_operations", NodeKind::Port, "north", 100.0);
        let rail = SupplyChainNode::new("rail_hub", NodeKind::Rail, "north", 10.0);
        let customs = SupplyChainNode::new("customs", NodeKind::Customs, "north", 10.0);
        let e = event(None);
        assert!((p.impact(&e, &ops).unwrap() - 0.6).abs() < 1e-12);
        assert!((p.impact(&e, &rail).unwrap() - 0.3).abs() < 1e-12);
        assert!(p.impact(&e, &customs).is_none());
    }

    #[test]
    fn test_region_filter() {
        let p = HeuristicImpactPolicy::default();
        let ops = SupplyChainNode::new("port_operations", NodeKind::Port, "north", 100.0);
        assert!(p.impact(&event(Some("south")), &ops).is_none());
        assert!(p.impact(&event(Some("north")), &ops).is_some());
    }
}
