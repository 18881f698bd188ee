//! Error taxonomy for the port simulation core.
//!
//! | Variant | Raised by | Recovery |
//! |---------|-----------|----------|
//! | `Configuration` | `PortConfig::validate`, constructors | fatal, never retried |
//! | `InvalidTransition` | ship/equipment state machines | surfaced, simulation continues |
//! | `ResourceUnsatisfiable` | resource pools | surfaced immediately, never blocks |
//! | `UnknownDisruption` | cascading triggers | logged and skipped |
//!
//! Optimizer infeasibility is not an error: it is reported through
//! `AllocationResult::unallocated`.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type PortResult<T> = Result<T, PortError>;

/// Errors produced by the simulation core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PortError {
    /// Static configuration is invalid. `field` names the offending field.
    #[error("invalid configuration for `{field}`: {reason}")]
    Configuration { field: String, reason: String },

    /// An entity was asked to move to a state its lifecycle does not allow.
    #[error("invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        entity: String,
        from: String,
        to: String,
    },

    /// A request can never be satisfied because it exceeds pool capacity.
    #[error("resource `{pool}` cannot satisfy request for {requested} units (capacity {capacity})")]
    ResourceUnsatisfiable {
        pool: String,
        requested: u32,
        capacity: u32,
    },

    /// A handle was released twice or never belonged to the pool.
    #[error("invalid release of resource handle {handle}")]
    InvalidRelease { handle: u64 },

    /// Outstanding grants exceed pool capacity.
    #[error("resource `{pool}` has {in_use} units outstanding but capacity {capacity}")]
    CapacityInvariant {
        pool: String,
        in_use: u32,
        capacity: u32,
    },

    /// A pool id or name does not exist.
    #[error("unknown resource pool `{0}`")]
    UnknownPool(String),

    /// Allocation attempted on a berth that already hosts a ship.
    #[error("berth `{berth}` is already occupied by ship `{ship}`")]
    BerthOccupied { berth: String, ship: String },

    /// Release attempted on a free berth.
    #[error("berth `{0}` is not occupied")]
    BerthNotOccupied(String),

    /// A ship was offered to a berth it is not suitable for.
    #[error("ship `{ship}` is not compatible with berth `{berth}`")]
    IncompatibleBerth { ship: String, berth: String },

    /// Lookup of an entity by id failed.
    #[error("unknown {kind} `{id}`")]
    UnknownEntity { kind: &'static str, id: String },

    /// No slot left in the yard (or in the candidate blocks).
    #[error("yard has no free slot for container `{0}`")]
    YardFull(String),

    /// Container is not stored in the yard.
    #[error("container `{0}` is not in the yard")]
    ContainerNotFound(String),

    /// A disruption id (usually a cascade target) is not in the template library.
    #[error("unknown disruption `{id}`")]
    UnknownDisruption { id: String },

    /// A process reported an unrecoverable condition.
    #[error("process `{process}` failed: {reason}")]
    ProcessFailed { process: String, reason: String },
}

impl PortError {
    /// Shorthand for a configuration error.
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an invalid state transition.
    pub fn transition(
        entity: impl Into<String>,
        from: impl std::fmt::Debug,
        to: impl std::fmt::Debug,
    ) -> Self {
        Self::InvalidTransition {
            entity: entity.into(),
            from: format!("{from:?}"),
            to: format!("{to:?}"),
        }
    }

    /// Shorthand for a failed lookup.
    pub fn unknown(kind: &'static str, id: impl Into<String>) -> Self {
        Self::UnknownEntity {
            kind,
            id: id.into(),
        }
    }

    /// Whether this error should stop the simulation from being constructed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_field() {
        let err = PortError::config("berths[0].crane_count", "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid configuration for `berths[0].crane_count`: must be positive"
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_transition_carries_states() {
        #[derive(Debug)]
        enum S {
            Waiting,
            Departed,
        }
        let err = PortError::transition("ship S1", S::Waiting, S::Departed);
        match &err {
            PortError::InvalidTransition { from, to, .. } => {
                assert_eq!(from, "Waiting");
                assert_eq!(to, "Departed");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!err.is_fatal());
    }
}
