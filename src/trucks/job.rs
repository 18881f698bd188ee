//! Truck transport jobs.

use serde::{Deserialize, Serialize};

use super::TruckType;
use crate::dispatching::Dispatchable;
use crate::sim::SimTime;

/// Direction of a move relative to the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteType {
    /// Import container leaving the terminal.
    Pickup,
    /// Export container brought to the terminal.
    Delivery,
    Internal,
    /// Empty move.
    Repositioning,
}

impl RouteType {
    /// Score adjustment; negative values go sooner.
    pub fn bias(self) -> f64 {
        match self {
            Self::Delivery => -1.0,
            Self::Pickup => -0.5,
            Self::Internal => 0.0,
            Self::Repositioning => 1.0,
        }
    }
}

/// A single origin-to-destination move.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruckJob {
    pub id: String,
    pub container_id: Option<String>,
    pub route_type: RouteType,
    pub origin: String,
    pub destination: String,
    pub truck_type: TruckType,
    /// 1 (most urgent) ..= 5.
    pub priority: u8,
    pub deadline: SimTime,
    pub created_at: SimTime,
    pub assigned_truck: Option<String>,
    pub started_at: Option<SimTime>,
    pub completed_at: Option<SimTime>,
    pub met_deadline: Option<bool>,
    pub distance_km: f64,
}

impl TruckJob {
    pub fn new(
        id: impl Into<String>,
        route_type: RouteType,
        origin: impl Into<String>,
        destination: impl Into<String>,
        created_at: SimTime,
    ) -> Self {
        Self {
            id: id.into(),
            container_id: None,
            route_type,
            origin: origin.into(),
            destination: destination.into(),
            truck_type: TruckType::Standard,
            priority: 3,
            deadline: created_at + 8.0,
            created_at,
            assigned_truck: None,
            started_at: None,
            completed_at: None,
            met_deadline: None,
            distance_km: 0.0,
        }
    }

    pub fn with_container(mut self, container_id: impl Into<String>) -> Self {
        self.container_id = Some(container_id.into());
        self
    }

    pub fn with_truck_type(mut self, truck_type: TruckType) -> Self {
        self.truck_type = truck_type;
        self
    }

    /// Sets the priority, clamped to 1..=5.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.clamp(1, 5);
        self
    }

    pub fn with_deadline(mut self, deadline: SimTime) -> Self {
        self.deadline = deadline;
        self
    }

    /// Hours left before the deadline (negative once overdue).
    pub fn hours_to_deadline(&self, now: SimTime) -> f64 {
        self.deadline.as_hours() - now.as_hours()
    }

    /// Hours from creation to truck assignment.
    pub fn wait_hours(&self) -> Option<f64> {
        self.started_at.map(|s| s.since(self.created_at))
    }
}

impl Dispatchable for TruckJob {
    fn dispatch_id(&self) -> &str {
        &self.id
    }

    fn queued_at(&self) -> SimTime {
        self.created_at
    }
}
