//! Trucks and their fuel/odometer state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Truck class. A job can only be served by its own class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TruckType {
    Standard,
    Reefer,
    Hazmat,
}

impl TruckType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Some(Self::Standard),
            "reefer" => Some(Self::Reefer),
            "hazmat" => Some(Self::Hazmat),
            _ => None,
        }
    }

    /// Prefix used in generated truck ids.
    pub fn code(self) -> &'static str {
        match self {
            Self::Standard => "STD",
            Self::Reefer => "RFR",
            Self::Hazmat => "HAZ",
        }
    }
}

impl fmt::Display for TruckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// What a truck is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TruckStatus {
    Idle,
    /// Assigned to a job, from dispatch until delivery.
    Busy,
    Refueling,
}

/// A road truck.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Truck {
    pub id: String,
    pub truck_type: TruckType,
    pub status: TruckStatus,
    /// Current location id.
    pub location: String,
    /// Tank share in [0, 1].
    pub fuel_level: f64,
    pub odometer_km: f64,
    pub km_since_service: f64,
    pub average_speed_kmh: f64,
    pub current_job: Option<String>,
    pub jobs_completed: u32,
    pub busy_hours: f64,
}

impl Truck {
    pub fn new(id: impl Into<String>, truck_type: TruckType, location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            truck_type,
            status: TruckStatus::Idle,
            location: location.into(),
            fuel_level: 1.0,
            odometer_km: 0.0,
            km_since_service: 0.0,
            average_speed_kmh: 50.0,
            current_job: None,
            jobs_completed: 0,
            busy_hours: 0.0,
        }
    }

    pub fn with_speed(mut self, kmh: f64) -> Self {
        self.average_speed_kmh = kmh;
        self
    }

    pub fn with_fuel(mut self, level: f64) -> Self {
        self.fuel_level = level.clamp(0.0, 1.0);
        self
    }

    pub fn with_km_since_service(mut self, km: f64) -> Self {
        self.km_since_service = km.max(0.0);
        self
    }

    /// Idle with at least `min_fuel` in the tank.
    pub fn is_available(&self, min_fuel: f64) -> bool {
        self.status == TruckStatus::Idle && self.fuel_level >= min_fuel
    }

    pub fn service_due(&self, interval_km: f64) -> bool {
        self.km_since_service >= interval_km
    }

    /// Books `km` of driving.
    pub fn drive(&mut self, km: f64, fuel_per_km: f64) {
        let km = km.max(0.0);
        self.odometer_km += km;
        self.km_since_service += km;
        self.fuel_level = (self.fuel_level - km * fuel_per_km).max(0.0);
    }

    pub fn refuel(&mut self) {
        self.fuel_level = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_and_fuel() {
        let mut t = Truck::new("STD-01", TruckType::Standard, "PORT_YARD").with_fuel(0.12);
        assert!(t.is_available(0.10));
        t.drive(20.0, 0.002);
        assert!((t.fuel_level - 0.08).abs() < 1e-9);
        assert!(!t.is_available(0.10));
        t.refuel();
        t.status = TruckStatus::Busy;
        assert!(!t.is_available(0.10));
        assert!((t.odometer_km - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse() {
        assert_eq!(TruckType::parse("Reefer"), Some(TruckType::Reefer));
        assert_eq!(TruckType::parse("tanker"), None);
    }
}
