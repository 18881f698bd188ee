//! Discrete-event simulation kernel.
//!
//! A deterministic, single-threaded engine: a logical clock, a min-heap of
//! pending events, capacity-bounded resource pools, and cooperative
//! processes expressed as explicit state machines.
//!
//! # Determinism
//! Given the same seed and the same sequence of external calls, two runs
//! produce the same event trace. Ties at equal times resolve in insertion
//! order.
//!
//! # Reference
//! Banks et al. (2010), "Discrete-Event System Simulation", ch. 3

pub mod clock;
pub mod process;
pub mod resource;
pub mod scheduler;
pub mod time;

pub use clock::{ScheduledEvent, SimClock};
pub use process::{Process, ProcessContext, ProcessId, Suspend, Wakeup};
pub use resource::{
    Grant, PoolId, PoolStats, QueueDiscipline, ResourceHandle, ResourcePool, ResourcePools,
};
pub use scheduler::{ProcessFailure, Scheduler, SchedulerCore, TraceEntry};
pub use time::{SimTime, HOURS_PER_DAY, HOURS_PER_YEAR};
