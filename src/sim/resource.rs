//! Capacity-bounded resource pools.
//!
//! A pool hands out integer units to processes. A request that fits is
//! granted immediately; otherwise the requester waits in the pool's queue
//! until a release (or a capacity restoration) makes room.
//!
//! # Capacities
//! - `capacity`: nominal size. Requests above it fail with
//!   [`PortError::ResourceUnsatisfiable`].
//! - `effective_capacity`: what may currently be granted. Disruptions lower
//!   it; existing holders keep their units (no preemption).
//!
//! # Queue discipline
//! - [`QueueDiscipline::Fifo`]: waiters are served oldest first; a waiter
//!   whose request does not fit is skipped in favour of the next eligible one.
//! - [`QueueDiscipline::Priority`]: waiters are served by `(priority, seq)`,
//!   lower priority value first.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::process::ProcessId;
use super::time::SimTime;
use crate::error::{PortError, PortResult};

/// Index of a pool inside [`ResourcePools`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolId(pub usize);

/// Proof of an outstanding grant. Must be released exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    id: u64,
    pool: PoolId,
    amount: u32,
}

impl ResourceHandle {
    /// Unique handle id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Pool the units were taken from.
    pub fn pool(&self) -> PoolId {
        self.pool
    }

    /// Number of units held.
    pub fn amount(&self) -> u32 {
        self.amount
    }
}

/// Order in which blocked requests are served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueDiscipline {
    /// Oldest eligible waiter first.
    #[default]
    Fifo,
    /// Lowest priority value first, FIFO among equals.
    Priority,
}

/// A request unblocked by a release or capacity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    /// Process that was waiting.
    pub pid: ProcessId,
    /// The units it now holds.
    pub handle: ResourceHandle,
}

#[derive(Debug, Clone)]
struct Waiter {
    pid: ProcessId,
    amount: u32,
    priority: i32,
    seq: u64,
    since: SimTime,
}

/// Accumulated pool statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolStats {
    /// Number of grants made.
    pub total_grants: u64,
    /// Grants that had to wait in the queue.
    pub queued_grants: u64,
    /// Sum of queue waiting time over all grants (hours).
    pub total_wait_hours: f64,
    /// Longest queue observed.
    pub max_queue_length: usize,
    /// Integral of units in use over time (unit-hours).
    pub busy_unit_hours: f64,
}

/// A single named pool.
#[derive(Debug, Clone)]
pub struct ResourcePool {
    name: String,
    capacity: u32,
    effective_capacity: u32,
    in_use: u32,
    outstanding: BTreeMap<u64, (ProcessId, u32)>,
    waiters: Vec<Waiter>,
    discipline: QueueDiscipline,
    stats: PoolStats,
    last_change: SimTime,
    created_at: SimTime,
}

impl ResourcePool {
    fn new(name: String, capacity: u32, discipline: QueueDiscipline, now: SimTime) -> Self {
        Self {
            name,
            capacity,
            effective_capacity: capacity,
            in_use: 0,
            outstanding: BTreeMap::new(),
            waiters: Vec::new(),
            discipline,
            stats: PoolStats::default(),
            last_change: now,
            created_at: now,
        }
    }

    /// Pool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Nominal capacity.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Capacity currently grantable.
    pub fn effective_capacity(&self) -> u32 {
        self.effective_capacity
    }

    /// Units currently held.
    pub fn in_use(&self) -> u32 {
        self.in_use
    }

    /// Units that could be granted right now.
    pub fn available(&self) -> u32 {
        self.effective_capacity.saturating_sub(self.in_use)
    }

    /// Number of blocked requests.
    pub fn queue_len(&self) -> usize {
        self.waiters.len()
    }

    /// Queue discipline.
    pub fn discipline(&self) -> QueueDiscipline {
        self.discipline
    }

    /// Accumulated statistics.
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Sum of the sizes of all outstanding handles.
    pub fn outstanding_units(&self) -> u32 {
        self.outstanding.values().map(|(_, n)| *n).sum()
    }

    /// Time-weighted utilization since creation, against nominal capacity.
    pub fn utilization(&self, now: SimTime) -> f64 {
        let elapsed = now.since(self.created_at);
        if elapsed <= 0.0 || self.capacity == 0 {
            return 0.0;
        }
        let busy = self.stats.busy_unit_hours + self.in_use as f64 * now.since(self.last_change);
        busy / (self.capacity as f64 * elapsed)
    }

    fn accumulate(&mut self, now: SimTime) {
        self.stats.busy_unit_hours += self.in_use as f64 * now.since(self.last_change);
        self.last_change = self.last_change.max(now);
    }

    fn check_invariant(&self) -> PortResult<()> {
        let outstanding = self.outstanding_units();
        if outstanding != self.in_use || outstanding > self.capacity {
            return Err(PortError::CapacityInvariant {
                pool: self.name.clone(),
                in_use: outstanding,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Serves eligible waiters in discipline order.
    fn grant_waiters(&mut self, pool: PoolId, next_handle: &mut u64, now: SimTime) -> Vec<Grant> {
        if self.waiters.is_empty() || self.available() == 0 {
            return Vec::new();
        }

        let mut order: Vec<usize> = (0..self.waiters.len()).collect();
        if self.discipline == QueueDiscipline::Priority {
            order.sort_by(|&a, &b| {
                let (wa, wb) = (&self.waiters[a], &self.waiters[b]);
                wa.priority.cmp(&wb.priority).then(wa.seq.cmp(&wb.seq))
            });
        } else {
            order.sort_by_key(|&i| self.waiters[i].seq);
        }

        let mut granted_idx = Vec::new();
        for idx in order {
            let amount = self.waiters[idx].amount;
            if amount <= self.available() {
                self.in_use += amount;
                granted_idx.push(idx);
            }
            if self.available() == 0 {
                break;
            }
        }

        granted_idx.sort_unstable();
        let mut grants = Vec::with_capacity(granted_idx.len());
        for idx in granted_idx.into_iter().rev() {
            let w = self.waiters.remove(idx);
            let handle = ResourceHandle {
                id: *next_handle,
                pool,
                amount: w.amount,
            };
            *next_handle += 1;
            self.outstanding.insert(handle.id, (w.pid, w.amount));
            self.stats.total_grants += 1;
            self.stats.queued_grants += 1;
            self.stats.total_wait_hours += now.since(w.since);
            grants.push((w.seq, Grant { pid: w.pid, handle }));
        }
        // Report grants in the order they were served in the queue.
        grants.sort_by_key(|(seq, _)| *seq);
        grants.into_iter().map(|(_, g)| g).collect()
    }
}

/// The set of pools of one simulation.
#[derive(Debug, Clone, Default)]
pub struct ResourcePools {
    pools: Vec<ResourcePool>,
    by_name: HashMap<String, PoolId>,
    next_handle: u64,
    next_seq: u64,
}

impl ResourcePools {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pool. Capacity must be positive and names unique.
    pub fn add_pool(
        &mut self,
        name: impl Into<String>,
        capacity: u32,
        discipline: QueueDiscipline,
    ) -> PortResult<PoolId> {
        let name = name.into();
        if capacity == 0 {
            return Err(PortError::config(
                format!("pool `{name}`.capacity"),
                "must be positive",
            ));
        }
        if self.by_name.contains_key(&name) {
            return Err(PortError::config(
                format!("pool `{name}`"),
                "duplicate pool name",
            ));
        }
        let id = PoolId(self.pools.len());
        self.pools
            .push(ResourcePool::new(name.clone(), capacity, discipline, SimTime::ZERO));
        self.by_name.insert(name, id);
        Ok(id)
    }

    /// Looks up a pool id by name.
    pub fn id(&self, name: &str) -> Option<PoolId> {
        self.by_name.get(name).copied()
    }

    /// Borrows a pool.
    pub fn get(&self, id: PoolId) -> Option<&ResourcePool> {
        self.pools.get(id.0)
    }

    /// Iterates all pools with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (PoolId, &ResourcePool)> {
        self.pools.iter().enumerate().map(|(i, p)| (PoolId(i), p))
    }

    fn pool_mut(&mut self, id: PoolId) -> PortResult<&mut ResourcePool> {
        self.pools
            .get_mut(id.0)
            .ok_or_else(|| PortError::UnknownPool(format!("#{}", id.0)))
    }

    /// Requests `amount` units for `pid`.
    ///
    /// Returns `Ok(Some(handle))` if granted now, `Ok(None)` if the request
    /// was queued, and `Err(ResourceUnsatisfiable)` if it can never fit.
    pub fn request(
        &mut self,
        id: PoolId,
        pid: ProcessId,
        amount: u32,
        priority: i32,
        now: SimTime,
    ) -> PortResult<Option<ResourceHandle>> {
        let handle_id = self.next_handle;
        let seq = self.next_seq;
        let pool = self.pool_mut(id)?;
        if amount > pool.capacity {
            return Err(PortError::ResourceUnsatisfiable {
                pool: pool.name.clone(),
                requested: amount,
                capacity: pool.capacity,
            });
        }

        if amount <= pool.available() {
            pool.accumulate(now);
            pool.in_use += amount;
            pool.outstanding.insert(handle_id, (pid, amount));
            pool.stats.total_grants += 1;
            self.next_handle += 1;
            return Ok(Some(ResourceHandle {
                id: handle_id,
                pool: id,
                amount,
            }));
        }

        pool.waiters.push(Waiter {
            pid,
            amount,
            priority,
            seq,
            since: now,
        });
        pool.stats.max_queue_length = pool.stats.max_queue_length.max(pool.waiters.len());
        self.next_seq += 1;
        Ok(None)
    }

    /// Releases a handle and returns the requests it unblocked.
    ///
    /// Releasing a handle twice is reported as [`PortError::InvalidRelease`].
    pub fn release(&mut self, handle: ResourceHandle, now: SimTime) -> PortResult<Vec<Grant>> {
        let mut next_handle = self.next_handle;
        let pool = self.pool_mut(handle.pool)?;
        let Some((_, amount)) = pool.outstanding.remove(&handle.id) else {
            return Err(PortError::InvalidRelease { handle: handle.id });
        };
        pool.accumulate(now);
        pool.in_use -= amount;
        pool.check_invariant()?;
        let grants = pool.grant_waiters(handle.pool, &mut next_handle, now);
        pool.check_invariant()?;
        self.next_handle = next_handle;
        Ok(grants)
    }

    /// Changes the grantable capacity (clamped to nominal) and serves
    /// waiters if room appeared.
    pub fn set_effective_capacity(
        &mut self,
        id: PoolId,
        effective: u32,
        now: SimTime,
    ) -> PortResult<Vec<Grant>> {
        let mut next_handle = self.next_handle;
        let pool = self.pool_mut(id)?;
        pool.accumulate(now);
        pool.effective_capacity = effective.min(pool.capacity);
        let grants = pool.grant_waiters(id, &mut next_handle, now);
        self.next_handle = next_handle;
        Ok(grants)
    }

    /// Removes `pid` from every wait queue. Returns the number of entries removed.
    pub fn cancel_waiter(&mut self, pid: ProcessId) -> usize {
        let mut removed = 0;
        for pool in &mut self.pools {
            let before = pool.waiters.len();
            pool.waiters.retain(|w| w.pid != pid);
            removed += before - pool.waiters.len();
        }
        removed
    }

    /// Handles currently held by `pid`.
    pub fn holdings(&self, pid: ProcessId) -> Vec<ResourceHandle> {
        self.iter()
            .flat_map(|(pool_id, pool)| {
                pool.outstanding
                    .iter()
                    .filter(move |(_, (holder, _))| *holder == pid)
                    .map(move |(&id, &(_, amount))| ResourceHandle {
                        id,
                        pool: pool_id,
                        amount,
                    })
            })
            .collect()
    }

    /// Releases everything `pid` holds. Returns the unblocked requests.
    pub fn release_all(&mut self, pid: ProcessId, now: SimTime) -> PortResult<Vec<Grant>> {
        let mut grants = Vec::new();
        for handle in self.holdings(pid) {
            grants.extend(self.release(handle, now)?);
        }
        Ok(grants)
    }

    /// Whether `pid` is queued on any pool.
    pub fn is_waiting(&self, pid: ProcessId) -> bool {
        self.pools
            .iter()
            .any(|p| p.waiters.iter().any(|w| w.pid == pid))
    }

    /// Drops all grants, queues, statistics and restores nominal capacity.
    pub fn reset(&mut self) {
        for pool in &mut self.pools {
            *pool = ResourcePool::new(
                pool.name.clone(),
                pool.capacity,
                pool.discipline,
                SimTime::ZERO,
            );
        }
        self.next_handle = 0;
        self.next_seq = 0;
    }
}
