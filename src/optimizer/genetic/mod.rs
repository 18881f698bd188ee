//! GA-based berth allocation.
//!
//! # Encoding
//!
//! One gene per ship: the index of its berth. The decoder turns genes
//! into timed assignments; fitness is the negated plan objective (the
//! runner minimizes).
//!
//! # Submodules
//!
//! - [`runner`]: Problem-agnostic generational GA
//!
//! # Reference
//! - Nishimura, Imai & Papadimitriou (2001), "Berth allocation planning in
//!   the public berth system by genetic algorithms"

mod chromosome;
mod problem;
pub mod runner;

pub use chromosome::{redraw_mutation, single_point_crossover, BerthChromosome};
pub use problem::{BerthAllocationProblem, DecodedPlan, ShipInfo};
pub use runner::{GaConfig, GaProblem, GaResult, GaRunner, Individual};
