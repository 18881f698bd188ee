//! Discrete-event simulation of a container port.
//!
//! Models vessel arrivals, berth occupancy, container handling and the
//! land-side resources behind them (yard, trucks, maintenance crews), so
//! allocation policies can be evaluated before they reach a real terminal.
//!
//! # Modules
//!
//! - **`sim`**: Logical clock, cooperative processes, resource pools, scheduler
//! - **`dispatching`**: Generic rule engine and score-ordered queues
//! - **`models`**: `Ship`, `Berth`, `Equipment` state machines and their owners
//! - **`yard`**: Container stacking with blocking-container relocation
//! - **`optimizer`**: Priority heuristic and genetic berth allocation
//! - **`maintenance`**: Crews, spare parts, windowed maintenance scheduling
//! - **`trucks`**: Locations, traffic, truck dispatch
//! - **`disruption`**: Stochastic supply-chain disruptions and recovery
//! - **`simulation`**: The port world, its processes and the control surface
//! - **`config`** / **`validation`**: Serde configuration and integrity checks
//!
//! # Example
//!
//! ```
//! use u_portsim::config::PortConfig;
//! use u_portsim::simulation::PortSimulation;
//!
//! let mut sim = PortSimulation::new(PortConfig::default().with_seed(11)).unwrap();
//! sim.run(48.0);
//! let status = sim.get_status();
//! assert!((status.time - 48.0).abs() < 1e-9);
//! assert!(status.events_processed > 0);
//! ```
//!
//! # References
//!
//! - Law (2015), "Simulation Modeling and Analysis"
//! - Bierwirth & Meisel (2010), "A survey of berth allocation and quay crane
//!   scheduling problems in container terminals"

pub mod config;
pub mod dispatching;
pub mod disruption;
pub mod error;
pub mod maintenance;
pub mod models;
pub mod optimizer;
pub mod sim;
pub mod simulation;
pub mod telemetry;
pub mod trucks;
pub mod validation;
pub mod yard;

pub use error::{PortError, PortResult};
