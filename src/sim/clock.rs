//! Logical clock and pending-event heap.
//!
//! Events are ordered by `(time, insertion sequence)`. The sequence number
//! makes ordering total: two events at the same time resolve in the order
//! they were scheduled.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::process::{ProcessId, Wakeup};
use super::time::SimTime;

/// A pending wake-up for a process.
#[derive(Debug)]
pub struct ScheduledEvent {
    pub(crate) at: SimTime,
    pub(crate) seq: u64,
    pub(crate) pid: ProcessId,
    pub(crate) wake: Wakeup,
}

impl ScheduledEvent {
    /// Time at which the event fires.
    pub fn at(&self) -> SimTime {
        self.at
    }

    /// Owning process.
    pub fn pid(&self) -> ProcessId {
        self.pid
    }
}

// BinaryHeap is a max-heap; reverse so the earliest (at, seq) pops first.
impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at
            .cmp(&other.at)
            .then_with(|| self.seq.cmp(&other.seq))
            .reverse()
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

/// Monotonic logical clock owning the pending-event heap.
#[derive(Debug, Default)]
pub struct SimClock {
    now: SimTime,
    next_seq: u64,
    events: BinaryHeap<ScheduledEvent>,
}

impl SimClock {
    /// Creates a clock at t=0 with no pending events.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current logical time.
    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Schedules a wake-up. Times in the past are clamped to `now`.
    pub fn push(&mut self, at: SimTime, pid: ProcessId, wake: Wakeup) {
        let at = at.max(self.now);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(ScheduledEvent { at, seq, pid, wake });
    }

    /// Time of the earliest pending event.
    pub fn peek_time(&self) -> Option<SimTime> {
        self.events.peek().map(|e| e.at)
    }

    /// Pops the earliest event and advances `now` to its time.
    pub fn pop(&mut self) -> Option<ScheduledEvent> {
        let event = self.events.pop()?;
        self.now = self.now.max(event.at);
        Some(event)
    }

    /// Moves `now` forward to `t` (never backwards).
    pub fn advance_to(&mut self, t: SimTime) {
        self.now = self.now.max(t);
    }

    /// Removes every pending event owned by `pid`. Returns how many were removed.
    pub fn remove_process(&mut self, pid: ProcessId) -> usize {
        let before = self.events.len();
        self.events.retain(|e| e.pid != pid);
        before - self.events.len()
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events are pending.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drops all events and rewinds to t=0.
    pub fn reset(&mut self) {
        self.events.clear();
        self.now = SimTime::ZERO;
        self.next_seq = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_in_time_order() {
        let mut clock = SimClock::new();
        clock.push(SimTime(10.0), ProcessId(1), Wakeup::Timeout);
        clock.push(SimTime(5.0), ProcessId(2), Wakeup::Timeout);
        clock.push(SimTime(20.0), ProcessId(3), Wakeup::Timeout);

        let first = clock.pop().unwrap();
        assert_eq!(first.pid, ProcessId(2));
        assert_eq!(clock.now(), SimTime(5.0));
        assert_eq!(clock.pop().unwrap().pid, ProcessId(1));
        assert_eq!(clock.pop().unwrap().pid, ProcessId(3));
        assert!(clock.pop().is_none());
        assert_eq!(clock.now(), SimTime(20.0));
    }

    #[test]
    fn test_fifo_tie_breaking() {
        let mut clock = SimClock::new();
        for pid in [7, 3, 9, 1] {
            clock.push(SimTime(2.0), ProcessId(pid), Wakeup::Timeout);
        }
        let order: Vec<u64> = std::iter::from_fn(|| clock.pop().map(|e| e.pid.0)).collect();
        assert_eq!(order, vec![7, 3, 9, 1]);
    }

    #[test]
    fn test_past_events_clamped() {
        let mut clock = SimClock::new();
        clock.advance_to(SimTime(8.0));
        clock.push(SimTime(3.0), ProcessId(1), Wakeup::Start);
        assert_eq!(clock.peek_time(), Some(SimTime(8.0)));
    }

    #[test]
    fn test_remove_process() {
        let mut clock = SimClock::new();
        clock.push(SimTime(1.0), ProcessId(1), Wakeup::Timeout);
        clock.push(SimTime(2.0), ProcessId(2), Wakeup::Timeout);
        clock.push(SimTime(3.0), ProcessId(1), Wakeup::Timeout);

        assert_eq!(clock.remove_process(ProcessId(1)), 2);
        assert_eq!(clock.len(), 1);
        assert_eq!(clock.remove_process(ProcessId(42)), 0);
        assert_eq!(clock.pop().map(|e| e.pid()), Some(ProcessId(2)));
    }
}
