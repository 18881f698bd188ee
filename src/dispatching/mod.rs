//! Dispatching rules, rule engine and re-evaluated priority queues.
//!
//! Every queue in the port (waiting ships, maintenance backlog, truck jobs)
//! orders its items through the same machinery: a set of
//! [`DispatchingRule`]s combined by a [`RuleEngine`], and a
//! [`DispatchQueue`] that re-scores its items each time it is consulted.
//!
//! # Usage
//!
//! ```
//! use u_portsim::dispatching::{rules, DispatchContext, DispatchQueue, Dispatchable, RuleEngine};
//! use u_portsim::sim::SimTime;
//!
//! #[derive(Debug)]
//! struct Job { id: String, at: f64 }
//!
//! impl Dispatchable for Job {
//!     fn dispatch_id(&self) -> &str { &self.id }
//!     fn queued_at(&self) -> SimTime { SimTime(self.at) }
//! }
//!
//! let engine = RuleEngine::new().with_rule(rules::Fifo);
//! let mut queue = DispatchQueue::new();
//! queue.push(Job { id: "late".into(), at: 5.0 });
//! queue.push(Job { id: "early".into(), at: 1.0 });
//!
//! let ctx = DispatchContext::at(SimTime(6.0));
//! assert_eq!(queue.pop_best(&engine, &ctx).unwrap().id, "early");
//! ```
//!
//! # Score Convention
//! **Lower score = higher priority.** Rules that favour large quantities
//! (ship priority, size) return the negated quantity.
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 4
//! - Haupt (1989), "A Survey of Priority Rule-Based Scheduling"

mod context;
mod engine;
mod queue;
pub mod rules;

pub use context::DispatchContext;
pub use engine::{EvaluationMode, RuleEngine, TieBreaker};
pub use queue::DispatchQueue;

use crate::sim::SimTime;
use std::fmt::Debug;

/// Score returned by a dispatching rule.
///
/// Lower scores = higher priority (dispatched first).
pub type RuleScore = f64;

/// An item that can sit in a dispatch queue.
pub trait Dispatchable {
    /// Stable identifier, used by [`TieBreaker::ById`].
    fn dispatch_id(&self) -> &str;

    /// When the item started waiting. Drives FIFO order and aging.
    fn queued_at(&self) -> SimTime;
}

/// A dispatching rule that evaluates the priority of an item of type `T`.
///
/// # Score Convention
/// **Lower score = higher priority.**
pub trait DispatchingRule<T>: Send + Sync + Debug {
    /// Rule name (e.g., "FIFO", "AGING").
    fn name(&self) -> &'static str;

    /// Evaluates an item given the current dispatch context.
    fn evaluate(&self, item: &T, context: &DispatchContext) -> RuleScore;

    /// Rule description.
    fn description(&self) -> &'static str {
        self.name()
    }
}
