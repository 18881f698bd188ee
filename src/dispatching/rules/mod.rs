//! Built-in dispatching rules shared by every queue.
//!
//! Domain-specific rules (ship urgency, maintenance criticality, route
//! bias) live next to the queues that use them.
//!
//! # Score Convention
//! All rules return lower scores for higher priority items.

use super::{DispatchContext, Dispatchable, DispatchingRule, RuleScore};

/// First In, First Out.
///
/// Prioritizes items that started waiting earliest.
#[derive(Debug, Clone, Copy)]
pub struct Fifo;

impl<T: Dispatchable> DispatchingRule<T> for Fifo {
    fn name(&self) -> &'static str {
        "FIFO"
    }

    fn evaluate(&self, item: &T, _context: &DispatchContext) -> RuleScore {
        item.queued_at().as_hours()
    }

    fn description(&self) -> &'static str {
        "First In First Out"
    }
}

/// Linear aging.
///
/// Subtracts `context.aging_rate × hours waited`, so a starved item
/// eventually outranks any fixed-score competitor.
#[derive(Debug, Clone, Copy)]
pub struct Aging;

impl<T: Dispatchable> DispatchingRule<T> for Aging {
    fn name(&self) -> &'static str {
        "AGING"
    }

    fn evaluate(&self, item: &T, context: &DispatchContext) -> RuleScore {
        -context.aging_rate * context.waited(item.queued_at())
    }

    fn description(&self) -> &'static str {
        "Anti-starvation aging"
    }
}
