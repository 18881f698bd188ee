//! Disruption lifecycle and node capacity bookkeeping.
//!
//! The modeler owns templates, strategies, nodes and every live event. It
//! never advances time itself: the simulation drives it hour by hour and
//! calls [`DisruptionModeler::begin_recovery`] and
//! [`DisruptionModeler::resolve`] at the right instants.
//!
//! Node capacity is always recomputed from scratch as
//! `baseline × Π(1 − r)` over the live events hitting it, so a node returns
//! to exactly its baseline once nothing is hitting it any more.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info};

use super::event::{DisruptionEvent, DisruptionOverrides, DisruptionState};
use super::network::{NodeKind, SupplyChainNode};
use super::policy::{HeuristicImpactPolicy, ImpactPolicy};
use super::template::{best_strategy, DisruptionTemplate, RecoveryStrategy};
use crate::config::DisruptionConfig;
use crate::error::{PortError, PortResult};
use crate::sim::SimTime;

/// Complication extension range (fraction of remaining recovery).
const COMPLICATION_EXTENSION: std::ops::RangeInclusive<f64> = 0.1..=0.5;

/// Stochastic supply-chain disruption modeler.
#[derive(Debug)]
pub struct DisruptionModeler {
    templates: BTreeMap<String, DisruptionTemplate>,
    strategies: Vec<RecoveryStrategy>,
    nodes: Vec<SupplyChainNode>,
    policy: Arc<dyn ImpactPolicy>,
    live: BTreeMap<String, DisruptionEvent>,
    archive: Vec<DisruptionEvent>,
    next_instance: u64,
    sampling_enabled: bool,
    complication_probability: f64,
    cascade_base_probability: f64,
}

impl DisruptionModeler {
    /// Builds a modeler with the default impact policy.
    pub fn new(config: &DisruptionConfig) -> PortResult<Self> {
        let mut templates = BTreeMap::new();
        for template in &config.templates {
            template.validate()?;
            if templates.insert(template.id.clone(), template.clone()).is_some() {
                return Err(PortError::config(
                    format!("disruption.templates[{}]", template.id),
                    "duplicate id",
                ));
            }
        }

        let mut nodes = Vec::with_capacity(config.nodes.len());
        for node in &config.nodes {
            let kind = NodeKind::parse(&node.kind).ok_or_else(|| {
                PortError::config(
                    format!("disruption.nodes[{}].kind", node.id),
                    format!("unknown node kind '{}'", node.kind),
                )
            })?;
            let mut built = SupplyChainNode::new(&node.id, kind, &node.region, node.baseline_capacity);
            if let Some(pool) = &node.bound_pool {
                built = built.with_pool(pool);
            }
            built.validate()?;
            nodes.push(built);
        }

        Ok(Self {
            templates,
            strategies: config.strategies.clone(),
            nodes,
            policy: Arc::new(HeuristicImpactPolicy::default()),
            live: BTreeMap::new(),
            archive: Vec::new(),
            next_instance: 0,
            sampling_enabled: config.sampling_enabled,
            complication_probability: config.complication_probability.clamp(0.0, 1.0),
            cascade_base_probability: config.cascade_base_probability.clamp(0.0, 1.0),
        })
    }

    /// Replaces the impact policy.
    pub fn with_policy(mut self, policy: Arc<dyn ImpactPolicy>) -> Self {
        self.set_policy(policy);
        self
    }

    /// Replaces the impact policy. Live events keep the impacts they
    /// were triggered with.
    pub fn set_policy(&mut self, policy: Arc<dyn ImpactPolicy>) {
        self.policy = policy;
    }

    pub fn template(&self, id: &str) -> Option<&DisruptionTemplate> {
        self.templates.get(id)
    }

    pub fn templates(&self) -> impl Iterator<Item = &DisruptionTemplate> {
        self.templates.values()
    }

    pub fn nodes(&self) -> &[SupplyChainNode] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&SupplyChainNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn event(&self, instance: &str) -> Option<&DisruptionEvent> {
        self.live.get(instance)
    }

    /// Active and recovering events, by instance id.
    pub fn live_events(&self) -> impl Iterator<Item = &DisruptionEvent> {
        self.live.values()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Resolved events in resolution order.
    pub fn archived(&self) -> &[DisruptionEvent] {
        &self.archive
    }

    /// Whether an instance of `template_id` is Active or Recovering.
    pub fn is_template_live(&self, template_id: &str) -> bool {
        self.live.values().any(|e| e.template_id == template_id)
    }

    /// Starts a new event from a template.
    ///
    /// Returns `Ok(None)` when that template already has a live instance and
    /// `Err(UnknownDisruption)` when the template does not exist.
    pub fn trigger(
        &mut self,
        template_id: &str,
        overrides: Option<&DisruptionOverrides>,
        now: SimTime,
        triggered_by: Option<&str>,
    ) -> PortResult<Option<String>> {
        if !self.templates.contains_key(template_id) {
            return Err(PortError::UnknownDisruption {
                id: template_id.to_string(),
            });
        }
        if self.is_template_live(template_id) {
            debug!(template = template_id, "disruption already live");
            return Ok(None);
        }

        self.next_instance += 1;
        let instance = format!("{}#{}", template_id, self.next_instance);
        let template = &self.templates[template_id];
        let mut event = DisruptionEvent::from_template(&instance, template, overrides, now);
        event.triggered_by = triggered_by.map(str::to_string);
        event.transition(DisruptionState::Active)?;
        for node in &self.nodes {
            if let Some(reduction) = self.policy.impact(&event, node) {
                event.impacts.insert(node.id.clone(), reduction);
            }
        }

        info!(
            instance = %instance,
            severity = event.severity,
            until = %event.active_until(),
            cascade_of = ?event.triggered_by,
            "disruption triggered"
        );
        self.live.insert(instance.clone(), event);
        self.recompute_capacities();
        Ok(Some(instance))
    }

    /// Moves an active event into recovery; returns its resolution time.
    pub fn begin_recovery(&mut self, instance: &str, now: SimTime) -> PortResult<SimTime> {
        let event = self.live.get_mut(instance).ok_or_else(|| PortError::UnknownDisruption {
            id: instance.to_string(),
        })?;
        event.transition(DisruptionState::Recovering)?;
        let strategy = best_strategy(&self.strategies, event.category, event.severity);
        let effectiveness = strategy.map(|s| s.effectiveness.clamp(0.0, 1.0)).unwrap_or(0.0);
        event.strategy_id = strategy.map(|s| s.id.clone());
        event.effective_recovery_hours = event.recovery_hours * (1.0 - effectiveness);
        event.recovery_started_at = Some(now);
        let resolves_at = now + event.effective_recovery_hours;
        debug!(
            instance,
            strategy = ?event.strategy_id,
            recovery = event.effective_recovery_hours,
            "disruption recovering"
        );
        Ok(resolves_at)
    }

    /// Extends the remaining recovery of an event by `fraction`.
    ///
    /// Returns the new resolution time.
    pub fn extend_recovery(&mut self, instance: &str, fraction: f64, now: SimTime) -> PortResult<SimTime> {
        let event = self.live_mut(instance)?;
        let resolves_at = event
            .resolution_time()
            .ok_or_else(|| PortError::transition(format!("disruption {instance}"), event.state, "complication"))?;
        let remaining = resolves_at.since(now).max(0.0);
        event.effective_recovery_hours += remaining * fraction.max(0.0);
        event.complications += 1;
        let extended = event.resolution_time().unwrap_or(resolves_at);
        debug!(instance, fraction, until = %extended, "recovery complication");
        Ok(extended)
    }

    /// Resolves an event, lifts its reductions and archives it.
    pub fn resolve(&mut self, instance: &str, now: SimTime) -> PortResult<()> {
        let mut event = self.live.remove(instance).ok_or_else(|| PortError::UnknownDisruption {
            id: instance.to_string(),
        })?;
        if let Err(e) = event.transition(DisruptionState::Resolved) {
            self.live.insert(instance.to_string(), event);
            return Err(e);
        }
        event.resolved_at = Some(now);
        info!(instance, complications = event.complications, "disruption resolved");
        self.archive.push(event);
        self.recompute_capacities();
        Ok(())
    }

    /// Complication roll for a recovering event; `Some(fraction)` on a hit.
    pub fn roll_complication<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<f64> {
        if self.complication_probability <= 0.0 {
            return None;
        }
        rng.random_bool(self.complication_probability)
            .then(|| rng.random_range(COMPLICATION_EXTENSION))
    }

    /// One hour of sampling: template ids whose roll hit and that are not live.
    pub fn sample_new<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<String> {
        if !self.sampling_enabled {
            return Vec::new();
        }
        let mut hits = Vec::new();
        for template in self.templates.values() {
            let p = template.hourly_probability().clamp(0.0, 1.0);
            if p > 0.0 && rng.random_bool(p) && !self.is_template_live(&template.id) {
                hits.push(template.id.clone());
            }
        }
        hits
    }

    /// One hour of cascade rolls for every active event.
    ///
    /// Returns `(source instance, target template id)` pairs. Targets are not
    /// checked here; the caller triggers them and handles unknown ids.
    pub fn roll_cascades<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<(String, String)> {
        let mut hits = Vec::new();
        if self.cascade_base_probability <= 0.0 {
            return hits;
        }
        for event in self.live.values().filter(|e| e.state == DisruptionState::Active) {
            let p = (self.cascade_base_probability * event.severity as f64).clamp(0.0, 1.0);
            for target in &event.cascading_ids {
                if rng.random_bool(p) {
                    hits.push((event.id.clone(), target.clone()));
                }
            }
        }
        hits
    }

    /// Lowest capacity ratio of the nodes bound to each pool.
    pub fn pool_ratios(&self) -> BTreeMap<String, f64> {
        let mut ratios: BTreeMap<String, f64> = BTreeMap::new();
        for node in &self.nodes {
            if let Some(pool) = &node.bound_pool {
                let ratio = node.capacity_ratio();
                ratios
                    .entry(pool.clone())
                    .and_modify(|r| *r = r.min(ratio))
                    .or_insert(ratio);
            }
        }
        ratios
    }

    /// Drops every event and restores baselines.
    pub fn reset(&mut self) {
        self.live.clear();
        self.archive.clear();
        self.next_instance = 0;
        self.recompute_capacities();
    }

    fn live_mut(&mut self, instance: &str) -> PortResult<&mut DisruptionEvent> {
        self.live.get_mut(instance).ok_or_else(|| PortError::UnknownDisruption {
            id: instance.to_string(),
        })
    }

    fn recompute_capacities(&mut self) {
        for node in &mut self.nodes {
            let factor: f64 = self
                .live
                .values()
                .filter_map(|e| e.impacts.get(&node.id))
                .map(|r| 1.0 - r)
                .product();
            node.current_capacity = node.baseline_capacity * factor;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn modeler() -> DisruptionModeler {
        let mut config = DisruptionConfig::default();
        config.complication_probability = 0.0;
        DisruptionModeler::new(&config).unwrap()
    }

    fn ratio(m: &DisruptionModeler, node: &str) -> f64 {
        m.node(node).unwrap().capacity_ratio()
    }

    #[test]
    fn test_typhoon_reduces_then_restores_exact_baseline() {
        let mut m = modeler();
        let id = m.trigger("TYPHOON_SEVERE", None, SimTime(10.0), None).unwrap().unwrap();
        assert!(ratio(&m, "port_operations") <= 0.2 + 1e-9);
        assert!(ratio(&m, "yard_operations") <= 0.2 + 1e-9);
        assert!((ratio(&m, "land_transport") - 0.5).abs() < 1e-9);
        assert!((ratio(&m, "customs") - 1.0).abs() < 1e-12);

        let resolves = m.begin_recovery(&id, SimTime(58.0)).unwrap();
        assert!((resolves.as_hours() - (58.0 + 72.0 * 0.7)).abs() < 1e-9);
        assert_eq!(m.event(&id).unwrap().strategy_id.as_deref(), Some("EMERGENCY_RESPONSE_TEAM"));
        assert!(ratio(&m, "port_operations") < 1.0);

        m.resolve(&id, resolves).unwrap();
        for node in m.nodes() {
            assert_eq!(node.current_capacity, node.baseline_capacity);
        }
        assert_eq!(m.archived().len(), 1);
        assert_eq!(m.live_count(), 0);
    }

    #[test]
    fn test_overlapping_events_multiply() {
        let mut m = modeler();
        m.trigger("STORM_MODERATE", None, SimTime::ZERO, None).unwrap();
        let r1 = ratio(&m, "port_operations");
        assert!((r1 - 0.6).abs() < 1e-9);
        let strike = m.trigger("LABOR_STRIKE", None, SimTime::ZERO, None).unwrap().unwrap();
        assert!((ratio(&m, "port_operations") - 0.6 * 0.2).abs() < 1e-9);
        m.begin_recovery(&strike, SimTime(1.0)).unwrap();
        m.resolve(&strike, SimTime(2.0)).unwrap();
        assert!((ratio(&m, "port_operations") - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_and_unknown_triggers() {
        let mut m = modeler();
        assert!(m.trigger("CYBER_ATTACK", None, SimTime::ZERO, None).unwrap().is_some());
        assert!(m.trigger("CYBER_ATTACK", None, SimTime(1.0), None).unwrap().is_none());
        assert!(matches!(
            m.trigger("METEOR", None, SimTime::ZERO, None),
            Err(PortError::UnknownDisruption { .. })
        ));
    }

    #[test]
    fn test_complication_extends_remaining_recovery() {
        let mut m = modeler();
        let id = m.trigger("RAIL_DERAILMENT", None, SimTime::ZERO, None).unwrap().unwrap();
        let resolves = m.begin_recovery(&id, SimTime(24.0)).unwrap();
        assert!((resolves.as_hours() - (24.0 + 48.0 * 0.7)).abs() < 1e-9);
        let extended = m.extend_recovery(&id, 0.5, SimTime(40.0)).unwrap();
        let remaining = resolves.as_hours() - 40.0;
        assert!((extended.as_hours() - (resolves.as_hours() + remaining * 0.5)).abs() < 1e-9);
        assert_eq!(m.event(&id).unwrap().complications, 1);
    }

    #[test]
    fn test_rolls_disabled_by_zero_probability() {
        let mut config = DisruptionConfig::default();
        config.sampling_enabled = false;
        config.complication_probability = 0.0;
        config.cascade_base_probability = 0.0;
        let mut m = DisruptionModeler::new(&config).unwrap();
        m.trigger("TYPHOON_SEVERE", None, SimTime::ZERO, None).unwrap();
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..100 {
            assert!(m.sample_new(&mut rng).is_empty());
            assert!(m.roll_cascades(&mut rng).is_empty());
            assert!(m.roll_complication(&mut rng).is_none());
        }
    }

    #[test]
    fn test_certain_cascades_name_declared_targets() {
        let mut config = DisruptionConfig::default();
        config.cascade_base_probability = 1.0;
        let mut m = DisruptionModeler::new(&config).unwrap();
        m.trigger("TYPHOON_SEVERE", None, SimTime::ZERO, None).unwrap();
        let mut rng = SmallRng::seed_from_u64(3);
        let hits = m.roll_cascades(&mut rng);
        let targets: Vec<&str> = hits.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(targets, vec!["RAIL_DERAILMENT", "CRANE_COLLAPSE"]);
    }

    /// Hits only rail, at a fixed 50%.
    #[derive(Debug)]
    struct RailOnly;

    impl ImpactPolicy for RailOnly {
        fn weight(&self, _event: &DisruptionEvent, node: &SupplyChainNode) -> Option<f64> {
            (node.kind == NodeKind::Rail).then_some(1.0)
        }

        fn reduction(&self, _severity: u8, _weight: f64) -> f64 {
            0.5
        }
    }

    #[test]
    fn test_custom_policy_decides_impacts() {
        let mut m = modeler().with_policy(Arc::new(RailOnly));
        let id = m.trigger("TYPHOON_SEVERE", None, SimTime::ZERO, None).unwrap().unwrap();
        assert_eq!(ratio(&m, "port_operations"), 1.0);
        assert!((ratio(&m, "rail") - 0.5).abs() < 1e-12);
        assert_eq!(m.event(&id).unwrap().impacts.len(), 1);

        m.set_policy(Arc::new(HeuristicImpactPolicy::default()));
        m.trigger("STORM_MODERATE", None, SimTime::ZERO, None).unwrap();
        assert!(ratio(&m, "port_operations") < 1.0);
    }

    #[test]
    fn test_pool_ratio_and_reset() {
        let mut m = modeler();
        m.trigger("TYPHOON_SEVERE", None, SimTime::ZERO, None).unwrap();
        let ratios = m.pool_ratios();
        assert!(ratios["quay_cranes"] <= 0.2 + 1e-9);
        m.reset();
        assert!(m.pool_ratios().values().all(|r| *r == 1.0));
        assert!(m.archived().is_empty());
    }
}
