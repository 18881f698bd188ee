//! Supply-chain disruptions.
//!
//! Templates describe what can go wrong and how often; events are live
//! instances that cut the capacity of supply-chain nodes until they are
//! resolved. Node capacity feeds the resource pools bound to it.
//!
//! ```
//! use u_portsim::config::DisruptionConfig;
//! use u_portsim::disruption::DisruptionModeler;
//! use u_portsim::sim::SimTime;
//!
//! let mut modeler = DisruptionModeler::new(&DisruptionConfig::default()).unwrap();
//! let id = modeler.trigger("STORM_MODERATE", None, SimTime::ZERO, None).unwrap().unwrap();
//! assert!(modeler.node("port_operations").unwrap().capacity_ratio() < 1.0);
//!
//! let at = modeler.begin_recovery(&id, SimTime(12.0)).unwrap();
//! modeler.resolve(&id, at).unwrap();
//! assert_eq!(modeler.node("port_operations").unwrap().capacity_ratio(), 1.0);
//! ```

mod event;
mod modeler;
mod network;
mod policy;
mod template;

pub use event::{DisruptionEvent, DisruptionOverrides, DisruptionState};
pub use modeler::DisruptionModeler;
pub use network::{NodeKind, SupplyChainNode};
pub use policy::{HeuristicImpactPolicy, ImpactPolicy};
pub use template::{
    best_strategy, builtin_strategies, builtin_templates, DisruptionCategory, DisruptionTemplate,
    RecoveryStrategy,
};
