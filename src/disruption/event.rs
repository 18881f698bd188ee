//! Disruption instances and their lifecycle.
//!
//! ```text
//! PENDING → ACTIVE → RECOVERING → RESOLVED
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::template::{DisruptionCategory, DisruptionTemplate};
use crate::error::{PortError, PortResult};
use crate::sim::SimTime;

/// Lifecycle state of a disruption instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisruptionState {
    Pending,
    Active,
    Recovering,
    Resolved,
}

impl DisruptionState {
    /// Whether `self → to` is allowed.
    pub fn can_transition_to(self, to: DisruptionState) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Active)
                | (Self::Active, Self::Recovering)
                | (Self::Recovering, Self::Resolved)
        )
    }

    /// Active or recovering.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Active | Self::Recovering)
    }
}

/// Per-trigger adjustments of a template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisruptionOverrides {
    pub severity: Option<u8>,
    pub duration_hours: Option<f64>,
    pub recovery_hours: Option<f64>,
    pub affected_areas: Option<BTreeMap<String, f64>>,
    pub region: Option<String>,
}

impl DisruptionOverrides {
    /// Overrides the severity.
    pub fn with_severity(mut self, severity: u8) -> Self {
        self.severity = Some(severity.clamp(1, 5));
        self
    }

    /// Overrides the active duration.
    pub fn with_duration(mut self, hours: f64) -> Self {
        self.duration_hours = Some(hours.max(0.0));
        self
    }

    /// Overrides the nominal recovery time.
    pub fn with_recovery(mut self, hours: f64) -> Self {
        self.recovery_hours = Some(hours.max(0.0));
        self
    }
}

/// A live or archived disruption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisruptionEvent {
    /// Instance id, `{template}#{n}`.
    pub id: String,
    pub template_id: String,
    pub category: DisruptionCategory,
    pub severity: u8,
    pub affected_areas: BTreeMap<String, f64>,
    pub region: Option<String>,
    pub duration_hours: f64,
    /// Nominal recovery time.
    pub recovery_hours: f64,
    /// Recovery time after strategy and complications.
    pub effective_recovery_hours: f64,
    pub cascading_ids: Vec<String>,
    pub state: DisruptionState,
    pub start_time: SimTime,
    pub recovery_started_at: Option<SimTime>,
    pub resolved_at: Option<SimTime>,
    pub strategy_id: Option<String>,
    /// Node id → capacity reduction applied by this event.
    pub impacts: BTreeMap<String, f64>,
    pub complications: u32,
    /// Instance that cascaded into this one.
    pub triggered_by: Option<String>,
}

impl DisruptionEvent {
    /// Instantiates a template (state PENDING).
    pub fn from_template(
        id: impl Into<String>,
        template: &DisruptionTemplate,
        overrides: Option<&DisruptionOverrides>,
        now: SimTime,
    ) -> Self {
        let o = overrides.cloned().unwrap_or_default();
        let recovery = o.recovery_hours.unwrap_or(template.recovery_hours);
        Self {
            id: id.into(),
            template_id: template.id.clone(),
            category: template.category,
            severity: o.severity.unwrap_or(template.severity).clamp(1, 5),
            affected_areas: o
                .affected_areas
                .unwrap_or_else(|| template.affected_areas.clone()),
            region: o.region.or_else(|| template.region.clone()),
            duration_hours: o.duration_hours.unwrap_or(template.duration_hours),
            recovery_hours: recovery,
            effective_recovery_hours: recovery,
            cascading_ids: template.cascading_ids.clone(),
            state: DisruptionState::Pending,
            start_time: now,
            recovery_started_at: None,
            resolved_at: None,
            strategy_id: None,
            impacts: BTreeMap::new(),
            complications: 0,
            triggered_by: None,
        }
    }

    /// Validated state change.
    pub fn transition(&mut self, to: DisruptionState) -> PortResult<()> {
        if !self.state.can_transition_to(to) {
            return Err(PortError::transition(
                format!("disruption {}", self.id),
                self.state,
                to,
            ));
        }
        self.state = to;
        Ok(())
    }

    /// When the active phase ends.
    pub fn active_until(&self) -> SimTime {
        self.start_time + self.duration_hours
    }

    /// When the event resolves, once recovery has started.
    pub fn resolution_time(&self) -> Option<SimTime> {
        self.recovery_started_at
            .map(|t| t + self.effective_recovery_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> DisruptionTemplate {
        DisruptionTemplate::new("STORM", DisruptionCategory::Weather, 2, 10.0, 20.0)
            .with_area("port_operations", 1.0)
    }

    #[test]
    fn test_lifecycle_order() {
        let mut e = DisruptionEvent::from_template("STORM#1", &template(), None, SimTime(5.0));
        assert!(e.transition(DisruptionState::Recovering).is_err());
        e.transition(DisruptionState::Active).unwrap();
        e.transition(DisruptionState::Recovering).unwrap();
        assert!(e.transition(DisruptionState::Active).is_err());
        e.transition(DisruptionState::Resolved).unwrap();
        assert!(!e.state.is_live());
    }

    #[test]
    fn test_overrides_apply() {
        let o = DisruptionOverrides::default().with_severity(9).with_duration(3.0);
        let e = DisruptionEvent::from_template("STORM#2", &template(), Some(&o), SimTime(1.0));
        assert_eq!(e.severity, 5);
        assert_eq!(e.active_until(), SimTime(4.0));
        assert!((e.recovery_hours - 20.0).abs() < 1e-12);
        assert!(e.resolution_time().is_none());
    }
}
