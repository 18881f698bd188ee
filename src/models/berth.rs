//! Berth model and occupancy management.
//!
//! # Invariants
//! - At most one ship occupies a berth at any time.
//! - Occupancy changes only through [`BerthManager::allocate`] and
//!   [`BerthManager::release`].
//!
//! # Suitability
//! A mixed berth accepts every ship type; any other berth requires an
//! exact type match. In both cases `ship.size_teu ≤ berth.capacity_teu`.

use serde::{Deserialize, Serialize};

use super::{Ship, ShipType};
use crate::error::{PortError, PortResult};
use crate::sim::SimTime;

/// Berth suitability: a mixed berth takes every type, any other berth
/// only its own, and the ship must fit.
#[inline]
pub fn berth_accepts(berth_type: ShipType, capacity_teu: u32, ship_type: ShipType, size_teu: u32) -> bool {
    let type_ok = berth_type == ShipType::Mixed || berth_type == ship_type;
    type_ok && size_teu <= capacity_teu
}

/// A mooring position with its quay cranes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Berth {
    /// Unique berth identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Ship class served.
    pub berth_type: ShipType,
    /// Largest ship accepted (TEU).
    pub capacity_teu: u32,
    /// Quay cranes installed.
    pub crane_count: u32,
    current_ship: Option<String>,
    occupied_since: Option<SimTime>,
    /// Cumulative occupied hours (completed visits only).
    pub total_occupation_time: f64,
    pub ships_served: u32,
}

impl Berth {
    /// Creates a free berth.
    pub fn new(id: impl Into<String>, berth_type: ShipType, capacity_teu: u32, crane_count: u32) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            berth_type,
            capacity_teu,
            crane_count,
            current_ship: None,
            occupied_since: None,
            total_occupation_time: 0.0,
            ships_served: 0,
        }
    }

    /// Sets the berth name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Checks construction-time invariants.
    pub fn validate(&self) -> PortResult<()> {
        if self.id.is_empty() {
            return Err(PortError::config("berth.id", "must not be empty"));
        }
        if self.capacity_teu == 0 {
            return Err(PortError::config(
                format!("berth[{}].capacity", self.id),
                "must be positive",
            ));
        }
        if self.crane_count == 0 {
            return Err(PortError::config(
                format!("berth[{}].crane_count", self.id),
                "must be positive",
            ));
        }
        Ok(())
    }

    /// Whether a ship of this type and size may use the berth.
    #[inline]
    pub fn accepts(&self, ship_type: ShipType, size_teu: u32) -> bool {
        berth_accepts(self.berth_type, self.capacity_teu, ship_type, size_teu)
    }

    #[inline]
    pub fn is_occupied(&self) -> bool {
        self.current_ship.is_some()
    }

    /// Ship currently moored here.
    pub fn current_ship(&self) -> Option<&str> {
        self.current_ship.as_deref()
    }

    /// Start of the current visit.
    pub fn occupied_since(&self) -> Option<SimTime> {
        self.occupied_since
    }

    /// Whether the berth suits `ship`.
    #[inline]
    pub fn is_suitable_for(&self, ship: &Ship) -> bool {
        self.accepts(ship.ship_type, ship.size_teu)
    }

    /// Occupied hours including the current visit.
    pub fn occupied_hours(&self, now: SimTime) -> f64 {
        let current = self.occupied_since.map(|t| now.since(t)).unwrap_or(0.0);
        self.total_occupation_time + current
    }

    /// Share of `elapsed` hours spent occupied.
    pub fn utilization(&self, now: SimTime, elapsed: f64) -> f64 {
        if elapsed <= 0.0 {
            return 0.0;
        }
        (self.occupied_hours(now) / elapsed).clamp(0.0, 1.0)
    }
}

/// Owns every berth and enforces single occupancy.
#[derive(Debug, Clone, Default)]
pub struct BerthManager {
    berths: Vec<Berth>,
    epoch: SimTime,
}

impl BerthManager {
    /// Creates a manager after validating each berth and id uniqueness.
    pub fn new(berths: Vec<Berth>) -> PortResult<Self> {
        for (i, berth) in berths.iter().enumerate() {
            berth.validate()?;
            if berths[..i].iter().any(|b| b.id == berth.id) {
                return Err(PortError::config(
                    format!("berth[{}].id", berth.id),
                    "duplicate berth id",
                ));
            }
        }
        Ok(Self {
            berths,
            epoch: SimTime::ZERO,
        })
    }

    /// Berth by id.
    pub fn get(&self, berth_id: &str) -> Option<&Berth> {
        self.berths.iter().find(|b| b.id == berth_id)
    }

    fn get_mut(&mut self, berth_id: &str) -> PortResult<&mut Berth> {
        self.berths
            .iter_mut()
            .find(|b| b.id == berth_id)
            .ok_or_else(|| PortError::unknown("berth", berth_id))
    }

    /// All berths in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &Berth> {
        self.berths.iter()
    }

    /// Number of berths.
    pub fn len(&self) -> usize {
        self.berths.len()
    }

    /// Whether there are no berths.
    pub fn is_empty(&self) -> bool {
        self.berths.is_empty()
    }

    /// Free suitable berth with the smallest capacity (ties by id).
    pub fn find_available_berth(&self, ship: &Ship) -> Option<&Berth> {
        self.berths
            .iter()
            .filter(|b| !b.is_occupied() && b.is_suitable_for(ship))
            .min_by(|a, b| a.capacity_teu.cmp(&b.capacity_teu).then_with(|| a.id.cmp(&b.id)))
    }

    /// Whether any berth (free or not) could ever take `ship`.
    pub fn has_suitable_berth(&self, ship: &Ship) -> bool {
        self.berths.iter().any(|b| b.is_suitable_for(ship))
    }

    /// Puts `ship` on `berth_id`.
    pub fn allocate(&mut self, berth_id: &str, ship: &Ship, now: SimTime) -> PortResult<()> {
        let berth = self.get_mut(berth_id)?;
        if let Some(current) = &berth.current_ship {
            return Err(PortError::BerthOccupied {
                berth: berth.id.clone(),
                ship: current.clone(),
            });
        }
        if !berth.is_suitable_for(ship) {
            return Err(PortError::IncompatibleBerth {
                ship: ship.id.clone(),
                berth: berth.id.clone(),
            });
        }
        berth.current_ship = Some(ship.id.clone());
        berth.occupied_since = Some(now);
        Ok(())
    }

    /// Frees a berth. Returns the ship that left.
    pub fn release(&mut self, berth_id: &str, now: SimTime) -> PortResult<String> {
        let berth = self.get_mut(berth_id)?;
        let Some(ship) = berth.current_ship.take() else {
            return Err(PortError::BerthNotOccupied(berth.id.clone()));
        };
        let since = berth.occupied_since.take().unwrap_or(now);
        berth.total_occupation_time += now.since(since);
        berth.ships_served += 1;
        Ok(ship)
    }

    /// Per-berth utilization since the epoch.
    pub fn utilization(&self, now: SimTime) -> Vec<(String, f64)> {
        let elapsed = now.since(self.epoch);
        self.berths
            .iter()
            .map(|b| (b.id.clone(), b.utilization(now, elapsed)))
            .collect()
    }

    /// Mean utilization over all berths.
    pub fn average_utilization(&self, now: SimTime) -> f64 {
        if self.berths.is_empty() {
            return 0.0;
        }
        let per = self.utilization(now);
        per.iter().map(|(_, u)| u).sum::<f64>() / per.len() as f64
    }

    /// Number of occupied berths.
    pub fn occupied_count(&self) -> usize {
        self.berths.iter().filter(|b| b.is_occupied()).count()
    }

    /// Frees every berth and clears statistics.
    pub fn reset(&mut self) {
        for berth in &mut self.berths {
            *berth = Berth {
                name: berth.name.clone(),
                ..Berth::new(berth.id.clone(), berth.berth_type, berth.capacity_teu, berth.crane_count)
            };
        }
        self.epoch = SimTime::ZERO;
    }
}
