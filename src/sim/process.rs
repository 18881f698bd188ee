//! Cooperative processes and their suspension points.
//!
//! A process is an explicit state machine. The scheduler calls
//! [`Process::resume`] with the reason it woke up; the process mutates the
//! world, then returns the next [`Suspend`] point. Exactly one process runs
//! at a time, so no locking is involved.
//!
//! ```
//! use u_portsim::sim::{Process, ProcessContext, Scheduler, Suspend, Wakeup};
//! use u_portsim::PortResult;
//!
//! struct Ticker { left: u32 }
//!
//! impl Process<Vec<f64>> for Ticker {
//!     fn name(&self) -> String { "ticker".into() }
//!
//!     fn resume(&mut self, _wake: Wakeup, ctx: &mut ProcessContext<'_, Vec<f64>>) -> PortResult<Suspend> {
//!         let now = ctx.now().as_hours();
//!         ctx.world_mut().push(now);
//!         if self.left == 0 {
//!             return Ok(Suspend::Done);
//!         }
//!         self.left -= 1;
//!         Ok(Suspend::Wait(1.0))
//!     }
//! }
//!
//! let mut world = Vec::new();
//! let mut scheduler = Scheduler::new(7);
//! scheduler.schedule_after(0.0, Box::new(Ticker { left: 2 }));
//! scheduler.advance_until(10.0, &mut world);
//! assert_eq!(world, vec![0.0, 1.0, 2.0]);
//! ```

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::resource::{PoolId, ResourceHandle, ResourcePools};
use super::scheduler::SchedulerCore;
use super::time::SimTime;
use crate::error::{PortError, PortResult};

/// Identifier of a process, unique within one scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessId(pub u64);

impl ProcessId {
    /// Pseudo-id used when the control surface (not a process) acts on the world.
    pub const EXTERNAL: ProcessId = ProcessId(u64::MAX);
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Why a process is being resumed.
#[derive(Debug)]
pub enum Wakeup {
    /// First resume after spawn.
    Start,
    /// A `Wait`/`WaitUntil` elapsed.
    Timeout,
    /// An `Acquire` was granted.
    Granted(ResourceHandle),
    /// An `Acquire` or `Release` failed.
    Denied(PortError),
    /// A `Release` completed.
    Continue,
}

/// Where a process yields control.
#[derive(Debug, Clone, PartialEq)]
pub enum Suspend {
    /// Resume after `duration` hours.
    Wait(f64),
    /// Resume at an absolute time (clamped to now).
    WaitUntil(SimTime),
    /// Resume once `amount` units of `pool` are granted.
    Acquire {
        pool: PoolId,
        amount: u32,
        priority: i32,
    },
    /// Release a handle and resume immediately.
    Release(ResourceHandle),
    /// Finished. Any handles still held are released.
    Done,
}

impl Suspend {
    /// FIFO acquire (priority 0).
    pub fn acquire(pool: PoolId, amount: u32) -> Self {
        Self::Acquire {
            pool,
            amount,
            priority: 0,
        }
    }
}

/// A resumable unit of work running against world type `W`.
pub trait Process<W> {
    /// Name used in traces and logs.
    fn name(&self) -> String;

    /// Runs until the next suspension point.
    ///
    /// Returning `Err` terminates the process; the scheduler logs the error
    /// and keeps the clock running.
    fn resume(&mut self, wake: Wakeup, ctx: &mut ProcessContext<'_, W>) -> PortResult<Suspend>;
}

/// A spawned process waiting to be registered with the scheduler.
pub(crate) type Spawned<W> = (ProcessId, Box<dyn Process<W>>);

/// Everything a process may touch while it runs.
pub struct ProcessContext<'a, W> {
    pub(crate) pid: ProcessId,
    pub(crate) core: &'a mut SchedulerCore,
    pub(crate) world: &'a mut W,
    pub(crate) spawned: &'a mut Vec<Spawned<W>>,
    pub(crate) cancelled: &'a mut Vec<ProcessId>,
}

impl<'a, W> ProcessContext<'a, W> {
    /// Current logical time.
    #[inline]
    pub fn now(&self) -> SimTime {
        self.core.clock.now()
    }

    /// Id of the running process ([`ProcessId::EXTERNAL`] for control calls).
    #[inline]
    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Shared world state.
    #[inline]
    pub fn world(&self) -> &W {
        &*self.world
    }

    /// Mutable world state.
    #[inline]
    pub fn world_mut(&mut self) -> &mut W {
        &mut *self.world
    }

    /// The simulation's random number generator.
    #[inline]
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.core.rng
    }

    /// World and RNG borrowed together.
    #[inline]
    pub fn split(&mut self) -> (&mut W, &mut StdRng) {
        (&mut *self.world, &mut self.core.rng)
    }

    /// Read access to the resource pools.
    #[inline]
    pub fn pools(&self) -> &ResourcePools {
        &self.core.pools
    }

    /// Starts a new process after `delay` hours.
    pub fn spawn_after(&mut self, delay: f64, process: Box<dyn Process<W>>) -> ProcessId {
        let at = self.now() + delay.max(0.0);
        self.spawn_at(at, process)
    }

    /// Starts a new process at an absolute time.
    pub fn spawn_at(&mut self, at: SimTime, process: Box<dyn Process<W>>) -> ProcessId {
        let pid = self.core.allocate_pid();
        self.core.clock.push(at, pid, Wakeup::Start);
        self.spawned.push((pid, process));
        pid
    }

    /// Cancels another process. Takes effect when the current resume returns.
    pub fn cancel(&mut self, pid: ProcessId) {
        if pid != self.pid {
            self.cancelled.push(pid);
        }
    }

    /// Grants `amount` units right away if they are free; never queues.
    pub fn try_acquire(&mut self, pool: PoolId, amount: u32) -> PortResult<Option<ResourceHandle>> {
        let now = self.now();
        let (available, capacity, name) = match self.core.pools.get(pool) {
            Some(p) => (p.available(), p.capacity(), p.name().to_string()),
            None => return Err(PortError::UnknownPool(format!("#{}", pool.0))),
        };
        if amount > capacity {
            return Err(PortError::ResourceUnsatisfiable {
                pool: name,
                requested: amount,
                capacity,
            });
        }
        if amount > available {
            return Ok(None);
        }
        self.core.pools.request(pool, self.pid, amount, 0, now)
    }

    /// Releases a handle without suspending; unblocked waiters are woken at `now`.
    pub fn release(&mut self, handle: ResourceHandle) -> PortResult<()> {
        let now = self.now();
        let grants = self.core.pools.release(handle, now)?;
        self.core.wake_grants(grants);
        Ok(())
    }

    /// Changes the grantable capacity of a pool.
    pub fn set_pool_capacity(&mut self, pool: PoolId, effective: u32) -> PortResult<()> {
        let now = self.now();
        let grants = self.core.pools.set_effective_capacity(pool, effective, now)?;
        self.core.wake_grants(grants);
        Ok(())
    }
}
