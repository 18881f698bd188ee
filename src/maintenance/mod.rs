//! Equipment maintenance planning.
//!
//! Condition monitoring raises tasks, a scored backlog orders them, and
//! the [`MaintenanceScheduler`] starts them when a crew, the parts and the
//! maintenance window allow it.
//!
//! # Submodules
//!
//! - `task`: [`MaintenanceTask`] and per-type defaults
//! - `crew`: Crews and their skills
//! - `parts`: Spare-part stock with reorder points
//! - [`rules`]: Backlog scoring
//! - `scheduler`: Dispatch and completion
//!
//! # Reference
//! Dekker (1996), "Applications of maintenance optimization models: a
//! review and analysis"

mod crew;
mod parts;
pub mod rules;
mod scheduler;
mod task;

pub use crew::{CrewRoster, MaintenanceCrew};
pub use parts::{PartsInventory, PendingOrder, SparePart};
pub use scheduler::{MaintenanceScheduler, MaintenanceStats, StartedTask};
pub use task::{required_skills, MaintenancePriority, MaintenanceTask, MaintenanceType};
