//! Land-side truck transport.
//!
//! Jobs (container moves between terminal, depots, rail hubs and inland
//! warehouses) are ranked by urgency and matched to the closest suitable
//! truck. Travel times follow great-circle distance, time-of-day traffic
//! and per-site handling surcharges.
//!
//! # Submodules
//!
//! - `location`: Sites, haversine distance, traffic model
//! - `truck`: Trucks, fuel and odometer
//! - `job`: [`TruckJob`] and route types
//! - [`rules`]: Job ranking and truck scoring
//! - `dispatcher`: [`TruckDispatcher`]

mod dispatcher;
mod job;
mod location;
pub mod rules;
mod truck;

pub use dispatcher::{DispatchStats, JobOutcome, Leg, TruckAssignment, TruckDispatcher};
pub use job::{RouteType, TruckJob};
pub use location::{haversine_km, Location, LocationKind, LocationMap, TrafficModel};
pub use truck::{Truck, TruckStatus, TruckType};
