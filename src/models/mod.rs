//! Port domain models.
//!
//! Typed entities with validated lifecycles. Every record is a concrete
//! struct with an enumerated type/status field; validation happens once,
//! at construction.
//!
//! | Model | Lifecycle | Owner |
//! |-------|-----------|-------|
//! | [`Ship`] | ARRIVING → … → DEPARTED | [`ShipTracker`] |
//! | [`Berth`] | free ⇄ occupied | [`BerthManager`] |
//! | [`Equipment`] | OPERATIONAL/MAINTENANCE/BREAKDOWN/STANDBY/OUT_OF_SERVICE | [`EquipmentFleet`] |

mod berth;
mod calendar;
mod equipment;
mod ship;

pub use berth::{berth_accepts, Berth, BerthManager};
pub use calendar::DailyWindow;
pub use equipment::{
    ConditionRestore, Equipment, EquipmentFleet, EquipmentStatus, EquipmentType, WearModel,
};
pub use ship::{Ship, ShipState, ShipTracker, ShipType};
