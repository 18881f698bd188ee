//! Single-threaded cooperative event loop.
//!
//! # Algorithm
//! 1. Pop the earliest `(time, seq)` event from the clock.
//! 2. Resume the owning process with the event's [`Wakeup`].
//! 3. Translate the returned [`Suspend`] into the next event (timeout,
//!    immediate grant, queued acquire, release) or retire the process.
//!
//! Errors returned by a process are caught here: they are logged, the
//! process is dropped, its resources are released, and the loop continues.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error, trace};

use super::clock::SimClock;
use super::process::{Process, ProcessContext, ProcessId, Spawned, Suspend, Wakeup};
use super::resource::{Grant, ResourcePools};
use super::time::SimTime;
use crate::error::PortError;

/// One resumed process, recorded when tracing is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// When the process ran.
    pub time: SimTime,
    /// Which process ran.
    pub pid: ProcessId,
    /// Its name at the time.
    pub name: String,
}

/// A process terminated by an error.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessFailure {
    pub pid: ProcessId,
    pub name: String,
    pub time: SimTime,
    pub error: PortError,
}

/// State shared between the loop and running processes.
#[derive(Debug)]
pub struct SchedulerCore {
    pub(crate) clock: SimClock,
    pub(crate) pools: ResourcePools,
    pub(crate) rng: StdRng,
    next_pid: u64,
    events_processed: u64,
    trace: Option<Vec<TraceEntry>>,
    failures: Vec<ProcessFailure>,
}

impl SchedulerCore {
    pub(crate) fn allocate_pid(&mut self) -> ProcessId {
        let pid = ProcessId(self.next_pid);
        self.next_pid += 1;
        pid
    }

    pub(crate) fn wake_grants(&mut self, grants: Vec<Grant>) {
        let now = self.clock.now();
        for grant in grants {
            self.clock.push(now, grant.pid, Wakeup::Granted(grant.handle));
        }
    }
}

/// Discrete-event scheduler over world type `W`.
pub struct Scheduler<W> {
    core: SchedulerCore,
    processes: BTreeMap<ProcessId, Box<dyn Process<W>>>,
}

impl<W> Scheduler<W> {
    /// Creates a scheduler at t=0 with a seeded RNG.
    pub fn new(seed: u64) -> Self {
        Self {
            core: SchedulerCore {
                clock: SimClock::new(),
                pools: ResourcePools::new(),
                rng: StdRng::seed_from_u64(seed),
                next_pid: 0,
                events_processed: 0,
                trace: None,
                failures: Vec::new(),
            },
            processes: BTreeMap::new(),
        }
    }

    /// Records every resume in a trace (see [`Scheduler::trace`]).
    pub fn with_trace(mut self) -> Self {
        self.core.trace = Some(Vec::new());
        self
    }

    /// Current logical time.
    pub fn now(&self) -> SimTime {
        self.core.clock.now()
    }

    /// Resource pools.
    pub fn pools(&self) -> &ResourcePools {
        &self.core.pools
    }

    /// Mutable pools, for registering pools during setup.
    pub fn pools_mut(&mut self) -> &mut ResourcePools {
        &mut self.core.pools
    }

    /// The simulation RNG.
    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.core.rng
    }

    /// Number of events resumed so far.
    pub fn events_processed(&self) -> u64 {
        self.core.events_processed
    }

    /// Number of live processes.
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    /// Whether `pid` is still alive.
    pub fn is_alive(&self, pid: ProcessId) -> bool {
        self.processes.contains_key(&pid)
    }

    /// Time of the next pending event.
    pub fn next_event_time(&self) -> Option<SimTime> {
        self.core.clock.peek_time()
    }

    /// Recorded trace (empty unless enabled with [`Scheduler::with_trace`]).
    pub fn trace(&self) -> &[TraceEntry] {
        self.core.trace.as_deref().unwrap_or(&[])
    }

    /// Processes terminated by errors.
    pub fn failures(&self) -> &[ProcessFailure] {
        &self.core.failures
    }

    /// Starts `process` after `delay` hours.
    pub fn schedule_after(&mut self, delay: f64, process: Box<dyn Process<W>>) -> ProcessId {
        let at = self.now() + delay.max(0.0);
        self.schedule_at(at, process)
    }

    /// Starts `process` at an absolute time.
    pub fn schedule_at(&mut self, at: SimTime, process: Box<dyn Process<W>>) -> ProcessId {
        let pid = self.core.allocate_pid();
        self.core.clock.push(at, pid, Wakeup::Start);
        self.processes.insert(pid, process);
        pid
    }

    /// Cancels a process: drops its pending events and queue entries and
    /// releases what it holds. Returns `false` if it already finished.
    pub fn cancel(&mut self, pid: ProcessId) -> bool {
        let Some(process) = self.processes.remove(&pid) else {
            return false;
        };
        self.retire(pid, &process.name());
        debug!(%pid, now = %self.now(), "process cancelled");
        true
    }

    /// Runs `f` with a context bound to the world, as if an external actor
    /// acted at the current time. Spawns and cancellations take effect after.
    pub fn with_context<R>(
        &mut self,
        world: &mut W,
        f: impl FnOnce(&mut ProcessContext<'_, W>) -> R,
    ) -> R {
        let mut spawned: Vec<Spawned<W>> = Vec::new();
        let mut cancelled = Vec::new();
        let result = {
            let mut ctx = ProcessContext {
                pid: ProcessId::EXTERNAL,
                core: &mut self.core,
                world,
                spawned: &mut spawned,
                cancelled: &mut cancelled,
            };
            f(&mut ctx)
        };
        self.absorb(spawned, cancelled);
        result
    }

    /// Processes every event with time ≤ `until`, then moves the clock to
    /// `until`. Returns the number of events processed.
    #[tracing::instrument(level = "debug", skip_all, fields(until = tracing::field::Empty))]
    pub fn advance_until(&mut self, until: impl Into<SimTime>, world: &mut W) -> usize {
        let until = until.into();
        tracing::Span::current().record("until", until.as_hours());
        let mut count = 0;
        while let Some(at) = self.core.clock.peek_time() {
            if at > until {
                break;
            }
            self.step(world);
            count += 1;
        }
        self.core.clock.advance_to(until);
        count
    }

    /// Processes the single earliest event. Returns its time, or `None` if
    /// nothing is pending.
    pub fn step(&mut self, world: &mut W) -> Option<SimTime> {
        let event = self.core.clock.pop()?;
        let now = event.at;
        let pid = event.pid;

        // Stale events for retired processes are dropped.
        let Some(mut process) = self.processes.remove(&pid) else {
            return Some(now);
        };

        self.core.events_processed += 1;
        if let Some(trace) = self.core.trace.as_mut() {
            trace.push(TraceEntry {
                time: now,
                pid,
                name: process.name(),
            });
        }
        trace!(%pid, %now, wake = ?event.wake, "resume");

        let mut spawned: Vec<Spawned<W>> = Vec::new();
        let mut cancelled = Vec::new();
        let result = {
            let mut ctx = ProcessContext {
                pid,
                core: &mut self.core,
                world,
                spawned: &mut spawned,
                cancelled: &mut cancelled,
            };
            process.resume(event.wake, &mut ctx)
        };

        let keep = match result {
            Ok(Suspend::Wait(duration)) => {
                self.core.clock.push(now + duration.max(0.0), pid, Wakeup::Timeout);
                true
            }
            Ok(Suspend::WaitUntil(at)) => {
                self.core.clock.push(at, pid, Wakeup::Timeout);
                true
            }
            Ok(Suspend::Acquire {
                pool,
                amount,
                priority,
            }) => {
                match self.core.pools.request(pool, pid, amount, priority, now) {
                    Ok(Some(handle)) => self.core.clock.push(now, pid, Wakeup::Granted(handle)),
                    Ok(None) => trace!(%pid, pool = pool.0, amount, "queued on pool"),
                    Err(e) => self.core.clock.push(now, pid, Wakeup::Denied(e)),
                }
                true
            }
            Ok(Suspend::Release(handle)) => {
                match self.core.pools.release(handle, now) {
                    Ok(grants) => {
                        self.core.wake_grants(grants);
                        self.core.clock.push(now, pid, Wakeup::Continue);
                    }
                    Err(e) => self.core.clock.push(now, pid, Wakeup::Denied(e)),
                }
                true
            }
            Ok(Suspend::Done) => {
                trace!(%pid, %now, "process finished");
                false
            }
            Err(e) => {
                let name = process.name();
                error!(%pid, process = %name, %now, error = %e, "process terminated");
                self.core.failures.push(ProcessFailure {
                    pid,
                    name,
                    time: now,
                    error: e,
                });
                false
            }
        };

        if keep {
            self.processes.insert(pid, process);
        } else {
            self.retire(pid, &process.name());
        }
        self.absorb(spawned, cancelled);
        Some(now)
    }

    /// Drops every process, event and grant, reseeds the RNG and rewinds to t=0.
    /// Pool definitions are kept.
    pub fn reset(&mut self, seed: u64) {
        self.processes.clear();
        self.core.clock.reset();
        self.core.pools.reset();
        self.core.rng = StdRng::seed_from_u64(seed);
        self.core.next_pid = 0;
        self.core.events_processed = 0;
        self.core.failures.clear();
        if let Some(trace) = self.core.trace.as_mut() {
            trace.clear();
        }
    }

    fn absorb(&mut self, spawned: Vec<Spawned<W>>, cancelled: Vec<ProcessId>) {
        for (pid, process) in spawned {
            self.processes.insert(pid, process);
        }
        for pid in cancelled {
            self.cancel(pid);
        }
    }

    /// Removes a process from the heap and every wait queue and releases its handles.
    fn retire(&mut self, pid: ProcessId, name: &str) {
        self.core.clock.remove_process(pid);
        self.core.pools.cancel_waiter(pid);
        let now = self.now();
        match self.core.pools.release_all(pid, now) {
            Ok(grants) => self.core.wake_grants(grants),
            Err(e) => error!(%pid, process = %name, error = %e, "failed to release holdings"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PortResult;
    use crate::sim::{PoolId, QueueDiscipline, ResourceHandle};

    type Log = Vec<(f64, String)>;

    /// Holds `amount` of a pool for `hold` hours.
    struct User {
        label: &'static str,
        pool: PoolId,
        amount: u32,
        hold: f64,
        handle: Option<ResourceHandle>,
    }

    impl Process<Log> for User {
        fn name(&self) -> String {
            self.label.to_string()
        }

        fn resume(&mut self, wake: Wakeup, ctx: &mut ProcessContext<'_, Log>) -> PortResult<Suspend> {
            let now = ctx.now().as_hours();
            match wake {
                Wakeup::Start => Ok(Suspend::acquire(self.pool, self.amount)),
                Wakeup::Granted(h) => {
                    ctx.world_mut().push((now, format!("{} got", self.label)));
                    self.handle = Some(h);
                    Ok(Suspend::Wait(self.hold))
                }
                Wakeup::Timeout => match self.handle.take() {
                    Some(h) => Ok(Suspend::Release(h)),
                    None => Ok(Suspend::Done),
                },
                Wakeup::Continue => {
                    ctx.world_mut().push((now, format!("{} done", self.label)));
                    Ok(Suspend::Done)
                }
                Wakeup::Denied(e) => Err(e),
            }
        }
    }

    struct Failing;

    impl Process<Log> for Failing {
        fn name(&self) -> String {
            "failing".into()
        }

        fn resume(&mut self, _wake: Wakeup, _ctx: &mut ProcessContext<'_, Log>) -> PortResult<Suspend> {
            Err(PortError::ProcessFailed {
                process: "failing".into(),
                reason: "boom".into(),
            })
        }
    }

    struct Sleeper(f64);

    impl Process<Log> for Sleeper {
        fn name(&self) -> String {
            "sleeper".into()
        }

        fn resume(&mut self, wake: Wakeup, ctx: &mut ProcessContext<'_, Log>) -> PortResult<Suspend> {
            match wake {
                Wakeup::Start => Ok(Suspend::Wait(self.0)),
                _ => {
                    let now = ctx.now().as_hours();
                    ctx.world_mut().push((now, "woke".into()));
                    Ok(Suspend::Done)
                }
            }
        }
    }

    fn user(label: &'static str, pool: PoolId, amount: u32, hold: f64) -> Box<User> {
        Box::new(User {
            label,
            pool,
            amount,
            hold,
            handle: None,
        })
    }

    fn scheduler_with_pool(capacity: u32) -> (Scheduler<Log>, PoolId) {
        let mut s = Scheduler::new(1).with_trace();
        let pool = s
            .pools_mut()
            .add_pool("berths", capacity, QueueDiscipline::Fifo)
            .unwrap();
        (s, pool)
    }

    #[test]
    fn test_acquire_blocks_until_release() {
        let (mut s, pool) = scheduler_with_pool(1);
        let mut log = Log::new();
        s.schedule_after(0.0, user("A", pool, 1, 3.0));
        s.schedule_after(1.0, user("B", pool, 1, 2.0));
        s.advance_until(100.0, &mut log);

        assert_eq!(
            log,
            vec![
                (0.0, "A got".to_string()),
                (3.0, "B got".to_string()),
                (3.0, "A done".to_string()),
                (5.0, "B done".to_string()),
            ]
        );
        assert_eq!(s.pools().get(pool).unwrap().in_use(), 0);
        assert_eq!(s.process_count(), 0);
    }

    #[test]
    fn test_equal_times_resolve_fifo() {
        let (mut s, _) = scheduler_with_pool(1);
        let mut log = Log::new();
        let ids: Vec<ProcessId> = (0..4).map(|_| s.schedule_after(2.0, Box::new(Sleeper(0.0)))).collect();
        s.advance_until(10.0, &mut log);

        let order: Vec<ProcessId> = s.trace().iter().map(|t| t.pid).collect();
        // Each sleeper runs twice: start, then wake; starts are FIFO, then wakes FIFO.
        assert_eq!(&order[..4], &ids[..]);
        assert_eq!(&order[4..], &ids[..]);
    }

    #[test]
    fn test_unsatisfiable_acquire_is_denied() {
        let (mut s, pool) = scheduler_with_pool(2);
        let mut log = Log::new();
        s.schedule_after(0.0, user("greedy", pool, 5, 1.0));
        s.advance_until(1.0, &mut log);

        assert_eq!(s.failures().len(), 1);
        assert!(matches!(
            s.failures()[0].error,
            PortError::ResourceUnsatisfiable { requested: 5, .. }
        ));
        assert!(log.is_empty());
    }

    #[test]
    fn test_failure_does_not_halt_clock() {
        let (mut s, _) = scheduler_with_pool(1);
        let mut log = Log::new();
        s.schedule_after(1.0, Box::new(Failing));
        s.schedule_after(2.0, Box::new(Sleeper(1.0)));
        s.advance_until(10.0, &mut log);

        assert_eq!(s.failures().len(), 1);
        assert_eq!(log, vec![(3.0, "woke".to_string())]);
        assert_eq!(s.now(), SimTime(10.0));
    }

    #[test]
    fn test_cancel_removes_waiter_and_is_idempotent() {
        let (mut s, pool) = scheduler_with_pool(1);
        let mut log = Log::new();
        s.schedule_after(0.0, user("A", pool, 1, 5.0));
        let b = s.schedule_after(0.0, user("B", pool, 1, 1.0));
        s.advance_until(1.0, &mut log);
        assert!(s.pools().is_waiting(b));

        assert!(s.cancel(b));
        assert!(!s.pools().is_waiting(b));
        assert!(!s.cancel(b));

        s.advance_until(20.0, &mut log);
        assert!(log.iter().all(|(_, m)| !m.starts_with('B')));
        assert_eq!(s.pools().get(pool).unwrap().in_use(), 0);
    }

    #[test]
    fn test_cancel_holder_releases_units() {
        let (mut s, pool) = scheduler_with_pool(1);
        let mut log = Log::new();
        let a = s.schedule_after(0.0, user("A", pool, 1, 50.0));
        s.schedule_after(0.0, user("B", pool, 1, 1.0));
        s.advance_until(2.0, &mut log);
        assert!(s.cancel(a));
        s.advance_until(10.0, &mut log);

        assert!(log.contains(&(2.0, "B got".to_string())));
        assert!(log.contains(&(3.0, "B done".to_string())));
    }

    #[test]
    fn test_step_and_reset() {
        let (mut s, _) = scheduler_with_pool(1);
        let mut log = Log::new();
        s.schedule_after(4.0, Box::new(Sleeper(1.0)));
        assert_eq!(s.step(&mut log), Some(SimTime(4.0)));
        assert_eq!(s.next_event_time(), Some(SimTime(5.0)));

        s.reset(1);
        assert_eq!(s.now(), SimTime::ZERO);
        assert_eq!(s.process_count(), 0);
        assert!(s.step(&mut log).is_none());
        assert!(s.trace().is_empty());
    }
}
