//! Locations, distances and road traffic.
//!
//! # Travel time
//! `hours = haversine_km / speed × traffic × surcharge(origin) × surcharge(destination)`
//!
//! | Hour of day | Traffic factor |
//! |-------------|----------------|
//! | 07–09, 16–19 | 1.5 |
//! | 22–05 | 0.7 |
//! | otherwise | 1.0 |
//!
//! Each hourly update multiplies the base factor by U(0.9, 1.1).

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::LocationConfig;
use crate::error::{PortError, PortResult};
use crate::sim::SimTime;

/// Mean Earth radius (km).
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kind of site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationKind {
    Port,
    Terminal,
    Depot,
    Warehouse,
    Rail,
    BorderCrossing,
}

impl LocationKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "port" => Some(Self::Port),
            "terminal" => Some(Self::Terminal),
            "depot" => Some(Self::Depot),
            "warehouse" => Some(Self::Warehouse),
            "rail" => Some(Self::Rail),
            "border" | "border_crossing" => Some(Self::BorderCrossing),
            _ => None,
        }
    }

    /// Handling delay multiplier at this kind of site.
    pub fn surcharge(self) -> f64 {
        match self {
            Self::Port => 1.2,
            Self::BorderCrossing => 1.5,
            _ => 1.0,
        }
    }
}

/// A truck origin or destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub kind: LocationKind,
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(id: impl Into<String>, kind: LocationKind, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            kind,
            latitude,
            longitude,
        }
    }

    pub fn from_config(config: &LocationConfig) -> PortResult<Self> {
        let kind = LocationKind::parse(&config.kind).ok_or_else(|| {
            PortError::config(
                format!("locations[{}].kind", config.id),
                format!("unknown location kind '{}'", config.kind),
            )
        })?;
        Ok(Self::new(config.id.clone(), kind, config.latitude, config.longitude))
    }

    pub fn distance_km(&self, other: &Location) -> f64 {
        haversine_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Great-circle distance between two coordinates in degrees.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// All known locations.
#[derive(Debug, Clone, Default)]
pub struct LocationMap {
    locations: BTreeMap<String, Location>,
}

impl LocationMap {
    pub fn new(locations: impl IntoIterator<Item = Location>) -> Self {
        Self {
            locations: locations.into_iter().map(|l| (l.id.clone(), l)).collect(),
        }
    }

    pub fn from_config(configs: &[LocationConfig]) -> PortResult<Self> {
        let locations = configs
            .iter()
            .map(Location::from_config)
            .collect::<PortResult<Vec<_>>>()?;
        Ok(Self::new(locations))
    }

    /// Location by id, or [`PortError::UnknownEntity`].
    pub fn get(&self, id: &str) -> PortResult<&Location> {
        self.locations
            .get(id)
            .ok_or_else(|| PortError::unknown("location", id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.locations.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.locations.keys().map(String::as_str)
    }

    pub fn distance_km(&self, from: &str, to: &str) -> PortResult<f64> {
        Ok(self.get(from)?.distance_km(self.get(to)?))
    }

    /// Product of both endpoint surcharges.
    pub fn surcharge(&self, from: &str, to: &str) -> PortResult<f64> {
        Ok(self.get(from)?.kind.surcharge() * self.get(to)?.kind.surcharge())
    }
}

/// Time-of-day congestion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrafficModel {
    factor: f64,
}

impl Default for TrafficModel {
    fn default() -> Self {
        Self { factor: 1.0 }
    }
}

impl TrafficModel {
    /// Unperturbed factor for an hour of day.
    pub fn base_factor(hour: f64) -> f64 {
        let h = hour.rem_euclid(24.0);
        if (7.0..9.0).contains(&h) || (16.0..19.0).contains(&h) {
            1.5
        } else if h >= 22.0 || h < 5.0 {
            0.7
        } else {
            1.0
        }
    }

    /// Recomputes the factor for `now`.
    pub fn update<R: Rng>(&mut self, now: SimTime, rng: &mut R) -> f64 {
        self.factor = Self::base_factor(now.hour_of_day()) * rng.random_range(0.9..=1.1);
        self.factor
    }

    #[inline]
    pub fn factor(&self) -> f64 {
        self.factor
    }
}
