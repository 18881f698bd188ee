//! Disruption sampling, cascades and per-event lifecycles.

use tracing::{debug, warn};

use super::state::{sync_pools, PortState};
use crate::disruption::DisruptionOverrides;
use crate::error::{PortError, PortResult};
use crate::sim::{Process, ProcessContext, SimTime, Suspend, Wakeup};

/// Starts a disruption and its lifecycle process, then applies the new
/// node capacities to the pools.
///
/// `Ok(None)` if the template already has a live instance.
pub fn trigger(
    ctx: &mut ProcessContext<'_, PortState>,
    template_id: &str,
    overrides: Option<&DisruptionOverrides>,
    triggered_by: Option<&str>,
) -> PortResult<Option<String>> {
    let now = ctx.now();
    let instance = ctx
        .world_mut()
        .disruptions
        .trigger(template_id, overrides, now, triggered_by)?;
    if let Some(instance) = &instance {
        ctx.spawn_after(0.0, Box::new(DisruptionLifecycle::new(instance.clone())));
        sync_pools(ctx)?;
    }
    Ok(instance)
}

/// Hourly sampling of new disruptions and cascade rolls.
pub struct DisruptionMonitor;

impl Process<PortState> for DisruptionMonitor {
    fn name(&self) -> String {
        "disruption monitor".into()
    }

    fn resume(&mut self, _wake: Wakeup, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        let (state, rng) = ctx.split();
        let sampled = state.disruptions.sample_new(rng);
        let cascades = state.disruptions.roll_cascades(rng);

        for template in sampled {
            trigger(ctx, &template, None, None)?;
        }
        for (source, target) in cascades {
            match trigger(ctx, &target, None, Some(&source)) {
                Ok(Some(instance)) => debug!(source = %source, instance = %instance, "cascade"),
                Ok(None) => {}
                Err(PortError::UnknownDisruption { id }) => {
                    warn!(source = %source, target = %id, "cascade to unknown disruption skipped")
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Suspend::Wait(1.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Start,
    Active,
    Recovering { resolves_at: SimTime },
}

/// Drives one event through ACTIVE → RECOVERING → RESOLVED.
///
/// While recovering it wakes hourly (and exactly at the resolution time)
/// to roll complications.
pub struct DisruptionLifecycle {
    instance: String,
    stage: Stage,
}

impl DisruptionLifecycle {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            stage: Stage::Start,
        }
    }

    fn next_wake(now: SimTime, resolves_at: SimTime) -> Suspend {
        let hourly = now + 1.0;
        Suspend::WaitUntil(if hourly < resolves_at { hourly } else { resolves_at })
    }
}

impl Process<PortState> for DisruptionLifecycle {
    fn name(&self) -> String {
        format!("disruption {}", self.instance)
    }

    fn resume(&mut self, _wake: Wakeup, ctx: &mut ProcessContext<'_, PortState>) -> PortResult<Suspend> {
        let now = ctx.now();
        match self.stage {
            Stage::Start => {
                let until = ctx
                    .world()
                    .disruptions
                    .event(&self.instance)
                    .map(|e| e.active_until())
                    .ok_or_else(|| PortError::UnknownDisruption {
                        id: self.instance.clone(),
                    })?;
                self.stage = Stage::Active;
                Ok(Suspend::WaitUntil(until))
            }
            Stage::Active => {
                let resolves_at = ctx.world_mut().disruptions.begin_recovery(&self.instance, now)?;
                self.stage = Stage::Recovering { resolves_at };
                Ok(Self::next_wake(now, resolves_at))
            }
            Stage::Recovering { resolves_at } if now >= resolves_at => {
                ctx.world_mut().disruptions.resolve(&self.instance, now)?;
                sync_pools(ctx)?;
                Ok(Suspend::Done)
            }
            Stage::Recovering { mut resolves_at } => {
                let (state, rng) = ctx.split();
                if let Some(fraction) = state.disruptions.roll_complication(rng) {
                    resolves_at = state.disruptions.extend_recovery(&self.instance, fraction, now)?;
                }
                self.stage = Stage::Recovering { resolves_at };
                Ok(Self::next_wake(now, resolves_at))
            }
        }
    }
}
