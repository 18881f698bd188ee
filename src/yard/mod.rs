//! Yard stack management.
//!
//! Containers discharged from ships are stacked in yard blocks and later
//! retrieved for trucks. Retrieval resolves blocking containers by
//! relocating them before lifting the target.
//!
//! # Reference
//! Kim & Hong (2006), "A heuristic rule for relocating blocks"

mod block;
mod manager;

pub use block::{SlotPosition, StackPosition, YardBlock};
pub use manager::{Relocation, RetrievalReport, StoredLocation, YardManager, YardStats};
