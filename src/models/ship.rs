//! Ship model and lifecycle tracking.
//!
//! # Lifecycle
//!
//! ```text
//! ARRIVING → WAITING → DOCKING → PROCESSING → DEPARTING → DEPARTED
//! ```
//!
//! The chain is strict: every other transition is rejected with
//! [`PortError::InvalidTransition`] and leaves the ship untouched.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::dispatching::Dispatchable;
use crate::error::{PortError, PortResult};
use crate::sim::SimTime;

/// Cargo class of a ship, also used to classify berths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShipType {
    /// Container vessel.
    Container,
    /// Bulk carrier.
    Bulk,
    /// Mixed cargo. A mixed berth accepts every ship type.
    Mixed,
}

impl ShipType {
    /// All ship types.
    pub const ALL: [ShipType; 3] = [ShipType::Container, ShipType::Bulk, ShipType::Mixed];

    /// Parses a lowercase type name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "container" => Some(Self::Container),
            "bulk" => Some(Self::Bulk),
            "mixed" => Some(Self::Mixed),
            _ => None,
        }
    }
}

impl fmt::Display for ShipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Container => "container",
            Self::Bulk => "bulk",
            Self::Mixed => "mixed",
        };
        f.write_str(s)
    }
}

/// Ship lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShipState {
    Arriving,
    Waiting,
    Docking,
    Processing,
    Departing,
    Departed,
}

impl ShipState {
    /// The only state reachable from `self`, if any.
    pub fn next(self) -> Option<ShipState> {
        match self {
            Self::Arriving => Some(Self::Waiting),
            Self::Waiting => Some(Self::Docking),
            Self::Docking => Some(Self::Processing),
            Self::Processing => Some(Self::Departing),
            Self::Departing => Some(Self::Departed),
            Self::Departed => None,
        }
    }

    /// Whether `self → to` is a legal transition.
    #[inline]
    pub fn can_transition_to(self, to: ShipState) -> bool {
        self.next() == Some(to)
    }

    /// Whether this is the terminal state.
    #[inline]
    pub fn is_terminal(self) -> bool {
        self == Self::Departed
    }
}

/// A vessel calling at the port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ship {
    /// Unique ship identifier.
    pub id: String,
    /// Vessel name.
    pub name: String,
    /// Cargo class.
    pub ship_type: ShipType,
    /// Vessel size (TEU).
    pub size_teu: u32,
    /// Containers to discharge.
    pub containers_to_unload: u32,
    /// Containers to load.
    pub containers_to_load: u32,
    /// Arrival time at the port.
    pub arrival_time: SimTime,
    /// Commercial priority (1..=10, higher = more important).
    pub priority: u8,
    /// Current lifecycle state.
    pub state: ShipState,
    /// Assigned berth.
    pub berth_id: Option<String>,
    pub berth_assigned_at: Option<SimTime>,
    pub processing_started_at: Option<SimTime>,
    pub processing_finished_at: Option<SimTime>,
    pub departure_time: Option<SimTime>,
}

impl Ship {
    /// Creates a ship arriving at t=0 with priority 5 and no cargo.
    pub fn new(id: impl Into<String>, ship_type: ShipType, size_teu: u32) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            ship_type,
            size_teu,
            containers_to_unload: 0,
            containers_to_load: 0,
            arrival_time: SimTime::ZERO,
            priority: 5,
            state: ShipState::Arriving,
            berth_id: None,
            berth_assigned_at: None,
            processing_started_at: None,
            processing_finished_at: None,
            departure_time: None,
        }
    }

    /// Sets the vessel name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets container counts.
    pub fn with_containers(mut self, unload: u32, load: u32) -> Self {
        self.containers_to_unload = unload;
        self.containers_to_load = load;
        self
    }

    /// Sets the arrival time.
    pub fn with_arrival(mut self, at: SimTime) -> Self {
        self.arrival_time = at;
        self
    }

    /// Sets the priority (clamped to 1..=10).
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.clamp(1, 10);
        self
    }

    /// Checks construction-time invariants.
    pub fn validate(&self) -> PortResult<()> {
        if self.id.is_empty() {
            return Err(PortError::config("ship.id", "must not be empty"));
        }
        if self.size_teu == 0 {
            return Err(PortError::config(
                format!("ship[{}].size_teu", self.id),
                "must be positive",
            ));
        }
        if !(1..=10).contains(&self.priority) {
            return Err(PortError::config(
                format!("ship[{}].priority", self.id),
                "must be within 1..=10",
            ));
        }
        Ok(())
    }

    /// Total container moves.
    #[inline]
    pub fn total_containers(&self) -> u32 {
        self.containers_to_unload + self.containers_to_load
    }

    /// Hours between arrival and berth assignment (or `now` if still waiting).
    pub fn waiting_time(&self, now: SimTime) -> f64 {
        let until = self.berth_assigned_at.unwrap_or(now);
        until.since(self.arrival_time)
    }

    /// Moves to `to`, recording the transition timestamp.
    pub fn transition(&mut self, to: ShipState, now: SimTime) -> PortResult<()> {
        if !self.state.can_transition_to(to) {
            return Err(PortError::transition(format!("ship {}", self.id), self.state, to));
        }
        match to {
            ShipState::Docking => self.berth_assigned_at = Some(now),
            ShipState::Processing => self.processing_started_at = Some(now),
            ShipState::Departing => self.processing_finished_at = Some(now),
            ShipState::Departed => self.departure_time = Some(now),
            ShipState::Arriving | ShipState::Waiting => {}
        }
        self.state = to;
        Ok(())
    }
}

impl Dispatchable for Ship {
    fn dispatch_id(&self) -> &str {
        &self.id
    }

    fn queued_at(&self) -> SimTime {
        self.arrival_time
    }
}

/// Active ships, the FIFO wait queue, and the departed archive.
#[derive(Debug, Clone, Default)]
pub struct ShipTracker {
    active: BTreeMap<String, Ship>,
    wait_queue: VecDeque<String>,
    departed: Vec<Ship>,
    abandoned: Vec<Ship>,
    arrived: usize,
}

impl ShipTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an arriving ship.
    pub fn register(&mut self, ship: Ship) -> PortResult<()> {
        ship.validate()?;
        if self.is_known(&ship.id) {
            return Err(PortError::config(
                format!("ship[{}].id", ship.id),
                "duplicate ship id",
            ));
        }
        if ship.state != ShipState::Arriving {
            return Err(PortError::transition(
                format!("ship {}", ship.id),
                ship.state,
                ShipState::Arriving,
            ));
        }
        self.arrived += 1;
        self.active.insert(ship.id.clone(), ship);
        Ok(())
    }

    /// Whether `ship_id` was ever registered.
    pub fn is_known(&self, ship_id: &str) -> bool {
        self.active.contains_key(ship_id)
            || self.departed.iter().chain(&self.abandoned).any(|s| s.id == ship_id)
    }

    /// Transitions a ship and applies queue/archive side effects.
    pub fn transition(&mut self, ship_id: &str, to: ShipState, now: SimTime) -> PortResult<()> {
        let ship = self
            .active
            .get_mut(ship_id)
            .ok_or_else(|| PortError::unknown("ship", ship_id))?;
        ship.transition(to, now)?;

        match to {
            ShipState::Waiting => self.wait_queue.push_back(ship_id.to_string()),
            ShipState::Docking => self.wait_queue.retain(|id| id != ship_id),
            ShipState::Departed => {
                if let Some(ship) = self.active.remove(ship_id) {
                    self.departed.push(ship);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Drops a ship whose call cannot continue. It keeps the state it
    /// failed in and is archived apart from departed ships.
    pub fn abandon(&mut self, ship_id: &str, now: SimTime) -> Option<&Ship> {
        let mut ship = self.active.remove(ship_id)?;
        self.wait_queue.retain(|id| id != ship_id);
        ship.departure_time = Some(now);
        self.abandoned.push(ship);
        self.abandoned.last()
    }

    /// Ships dropped by [`abandon`](Self::abandon).
    pub fn abandoned(&self) -> &[Ship] {
        &self.abandoned
    }

    /// Records the berth a waiting ship will dock at.
    pub fn assign_berth(&mut self, ship_id: &str, berth_id: &str) -> PortResult<()> {
        let ship = self
            .active
            .get_mut(ship_id)
            .ok_or_else(|| PortError::unknown("ship", ship_id))?;
        ship.berth_id = Some(berth_id.to_string());
        Ok(())
    }

    /// Active ship by id.
    pub fn get(&self, ship_id: &str) -> Option<&Ship> {
        self.active.get(ship_id)
    }

    /// Active ships in id order.
    pub fn active(&self) -> impl Iterator<Item = &Ship> {
        self.active.values()
    }

    /// Waiting ships in FIFO order.
    pub fn waiting(&self) -> Vec<&Ship> {
        self.wait_queue
            .iter()
            .filter_map(|id| self.active.get(id))
            .collect()
    }

    /// Number of waiting ships.
    pub fn waiting_count(&self) -> usize {
        self.wait_queue.len()
    }

    /// Position of a ship in the wait queue.
    pub fn queue_position(&self, ship_id: &str) -> Option<usize> {
        self.wait_queue.iter().position(|id| id == ship_id)
    }

    /// Archived ships in departure order.
    pub fn departed(&self) -> &[Ship] {
        &self.departed
    }

    /// Number of ships ever registered.
    pub fn arrived_count(&self) -> usize {
        self.arrived
    }

    /// Average waiting time over every ship that got a berth.
    pub fn average_waiting_time(&self) -> f64 {
        let waits: Vec<f64> = self
            .departed
            .iter()
            .chain(self.active.values())
            .filter_map(|s| s.berth_assigned_at.map(|at| at.since(s.arrival_time)))
            .collect();
        if waits.is_empty() {
            0.0
        } else {
            waits.iter().sum::<f64>() / waits.len() as f64
        }
    }

    /// Clears everything.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ship() -> Ship {
        Ship::new("S1", ShipType::Container, 15_000)
            .with_containers(500, 300)
            .with_arrival(SimTime(2.0))
    }

    #[test]
    fn test_full_lifecycle() {
        let mut tracker = ShipTracker::new();
        tracker.register(ship()).unwrap();

        tracker.transition("S1", ShipState::Waiting, SimTime(2.0)).unwrap();
        assert_eq!(tracker.waiting_count(), 1);
        tracker.assign_berth("S1", "B1").unwrap();
        tracker.transition("S1", ShipState::Docking, SimTime(5.0)).unwrap();
        assert_eq!(tracker.waiting_count(), 0);
        tracker.transition("S1", ShipState::Processing, SimTime(6.0)).unwrap();
        tracker.transition("S1", ShipState::Departing, SimTime(20.0)).unwrap();
        tracker.transition("S1", ShipState::Departed, SimTime(20.5)).unwrap();

        assert!(tracker.get("S1").is_none());
        let done = &tracker.departed()[0];
        assert_eq!(done.state, ShipState::Departed);
        assert_eq!(done.berth_id.as_deref(), Some("B1"));
        assert_eq!(done.departure_time, Some(SimTime(20.5)));
        assert!((tracker.average_waiting_time() - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_illegal_transition_leaves_state_unchanged() {
        let mut s = ship();
        let err = s.transition(ShipState::Processing, SimTime(1.0)).unwrap_err();
        assert!(matches!(err, PortError::InvalidTransition { .. }));
        assert_eq!(s.state, ShipState::Arriving);
        assert!(s.processing_started_at.is_none());
    }

    #[test]
    fn test_every_non_chain_transition_rejected() {
        let states = [
            ShipState::Arriving,
            ShipState::Waiting,
            ShipState::Docking,
            ShipState::Processing,
            ShipState::Departing,
            ShipState::Departed,
        ];
        for (i, &from) in states.iter().enumerate() {
            for (j, &to) in states.iter().enumerate() {
                assert_eq!(from.can_transition_to(to), j == i + 1, "{from:?} -> {to:?}");
            }
        }
        assert!(ShipState::Departed.is_terminal());
    }

    #[test]
    fn test_departed_is_terminal_in_tracker() {
        let mut tracker = ShipTracker::new();
        tracker.register(ship()).unwrap();
        for state in [
            ShipState::Waiting,
            ShipState::Docking,
            ShipState::Processing,
            ShipState::Departing,
            ShipState::Departed,
        ] {
            tracker.transition("S1", state, SimTime(3.0)).unwrap();
        }
        let err = tracker.transition("S1", ShipState::Waiting, SimTime(4.0)).unwrap_err();
        assert!(matches!(err, PortError::UnknownEntity { kind: "ship", .. }));
    }

    #[test]
    fn test_register_rejects_duplicates_and_invalid() {
        let mut tracker = ShipTracker::new();
        tracker.register(ship()).unwrap();
        assert!(tracker.register(ship()).is_err());
        assert!(tracker.register(Ship::new("S2", ShipType::Bulk, 0)).is_err());
        assert_eq!(tracker.arrived_count(), 1);
    }

    #[test]
    fn test_fifo_wait_queue() {
        let mut tracker = ShipTracker::new();
        for id in ["A", "B", "C"] {
            tracker.register(Ship::new(id, ShipType::Bulk, 1000)).unwrap();
            tracker.transition(id, ShipState::Waiting, SimTime::ZERO).unwrap();
        }
        tracker.transition("B", ShipState::Docking, SimTime(1.0)).unwrap();
        let ids: Vec<&str> = tracker.waiting().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "C"]);
        assert_eq!(tracker.queue_position("C"), Some(1));
    }

    #[test]
    fn test_abandon_leaves_queue_and_blocks_reuse_of_id() {
        let mut tracker = ShipTracker::new();
        for id in ["A", "B"] {
            tracker.register(Ship::new(id, ShipType::Bulk, 1000)).unwrap();
            tracker.transition(id, ShipState::Waiting, SimTime::ZERO).unwrap();
        }
        let dropped = tracker.abandon("A", SimTime(3.0)).unwrap();
        assert_eq!(dropped.state, ShipState::Waiting);
        assert_eq!(dropped.departure_time, Some(SimTime(3.0)));
        assert!(tracker.abandon("A", SimTime(4.0)).is_none());

        assert!(tracker.get("A").is_none());
        assert_eq!(tracker.waiting_count(), 1);
        assert!(tracker.departed().is_empty());
        assert_eq!(tracker.abandoned().len(), 1);
        assert!(tracker.register(Ship::new("A", ShipType::Bulk, 1000)).is_err());
    }

    #[test]
    fn test_ship_type_parse() {
        assert_eq!(ShipType::parse("Container"), Some(ShipType::Container));
        assert_eq!(ShipType::parse("tanker"), None);
        assert_eq!(ShipType::Mixed.to_string(), "mixed");
    }
}
